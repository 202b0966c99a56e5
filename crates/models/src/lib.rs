pub mod events;
pub mod error;

pub use events::*;
pub use error::*;
