pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod factory;

pub use event_store::*;
pub use memory::*;
pub use postgres::*;
pub use factory::*;
