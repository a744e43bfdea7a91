pub mod app;
pub mod core;
pub mod gl;
pub mod render;
pub mod window;
