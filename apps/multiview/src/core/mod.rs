pub mod context;
pub mod display;
pub mod error;
