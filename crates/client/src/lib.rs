//! daywise_client - HTTP events client and CLI for daywise.

pub mod cli;
pub mod client;
pub mod error;
pub mod output;

pub use client::HttpEventsClient;
pub use error::{ClientError, Result};
