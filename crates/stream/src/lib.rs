pub mod event_bus;
pub mod hub;

pub use event_bus::*;
pub use hub::*;
