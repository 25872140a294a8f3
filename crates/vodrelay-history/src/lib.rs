//! Durable upload history and failure log.

mod store;

pub use store::HistoryStore;
