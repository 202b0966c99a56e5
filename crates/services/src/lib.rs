pub mod acquisition;
pub mod provider;
pub mod binance;
pub mod coingecko;
pub mod metrics;

pub use acquisition::*;
pub use provider::*;
pub use binance::*;
pub use coingecko::*;
pub use metrics::*;
