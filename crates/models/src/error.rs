use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned non-success status: {status}")]
    UpstreamStatus { status: u16 },

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No price data available")]
    MissingPrice,

    #[error("Invalid price value: {value}")]
    InvalidPrice { value: String },

    #[error("Upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid store capacity: {0}, must be greater than zero")]
    InvalidCapacity(usize),

    #[error("Invalid poll interval: must be greater than zero")]
    InvalidInterval,
}

pub type Result<T> = std::result::Result<T, FeedError>;
