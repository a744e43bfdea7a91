pub mod error;
pub mod events;
pub mod factory;
pub mod manager;
