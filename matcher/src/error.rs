use thiserror::Error;

/// Rejections on order entry and cancellation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Order size must be greater than 0")]
    InvalidSize,

    #[error("Order price must be greater than 0")]
    InvalidPrice,

    #[error("Order not found: {0}")]
    NotFound(u64),

    #[error("Order {0} belongs to another user")]
    NotOwner(u64),

    #[error("Order {0} has already been executed")]
    AlreadyExecuted(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Malformed month code '{0}', expected MMYYYY")]
    Malformed(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    #[error("Month {month:02}/{year} is in the future")]
    FutureMonth { month: u32, year: i32 },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
