pub mod backend;
pub mod context;
pub mod fbconfig;
pub mod painter;
