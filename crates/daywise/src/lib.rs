//! Imperative shell around `daywise_core`: owns the cache state, talks to
//! the events API and runs background tasks against snapshots.

mod config;
mod error;
mod store;
mod worker;

#[cfg(test)]
mod fake;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::{EventStore, FetchHandle};
pub use worker::{TaskOutcome, TaskSpec, TaskWorker};
