pub mod routes;
pub mod session;
pub mod sse;

pub use routes::*;
pub use session::*;
pub use sse::*;
