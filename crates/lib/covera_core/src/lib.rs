//! # covera_core
//!
//! Client runtime for the Covera policy service.
//!
//! Two pieces carry the weight:
//!
//! - [`session`] keeps a single access token valid across concurrent HTTP
//!   calls, refreshing it at most once at a time and retrying the failed
//!   request transparently.
//! - [`aggregation`] reconciles packages and applications fetched from
//!   several endpoints into one [`view::Portfolio`].
//!
//! [`client::CoveraClient`] wires everything together once per process.

pub mod aggregation;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod models;
pub mod session;
pub mod view;

pub use client::CoveraClient;
pub use config::ClientConfig;
pub use error::{ClientError, SessionError};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
