pub mod clock;
pub mod engine;
pub mod error;
pub mod history;
pub mod orderbook;
pub mod persistence;
pub mod ports;
pub mod sequencer;
pub mod session;
pub mod types;

pub use engine::{Ack, Exchange};
pub use error::{HistoryError, OrderError, PersistenceError};
