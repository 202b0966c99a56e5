use pricefeed_models::PriceUpdateEvent;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, FromRow)]
pub struct PriceRow {
    pub timestamp: i64,
    pub price: f64,
}

impl From<PriceRow> for PriceUpdateEvent {
    fn from(row: PriceRow) -> Self {
        Self::new(row.timestamp, row.price)
    }
}
