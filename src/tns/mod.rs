//! Talking to the Transient Name Server.
//!
//! [`TnsRegistry`] is the seam the submission handler depends on;
//! [`TnsClient`] implements it over the TNS bulk-report HTTP API.

mod client;

use async_trait::async_trait;
use thiserror::Error;

pub use client::TnsClient;

/// Identifier the TNS hands back for a submitted bulk report.
pub type ReportId = String;

/// Why a TNS call failed.
#[derive(Debug, Error)]
pub enum TnsError {
    /// The TNS could not be reached or answered with an HTTP error.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The TNS answered but refused the report.
    #[error("Bad request: {0}")]
    Rejected(String),
}

/// The registry a report is submitted to.
#[async_trait]
pub trait TnsRegistry: Send + Sync {
    /// Submit a serialized bulk report.
    async fn send_report(&self, payload: &str) -> Result<ReportId, TnsError>;

    /// Resolve a submitted report into the designation it earned, if any.
    async fn get_report_reply(&self, report_id: &str) -> Result<Option<String>, TnsError>;
}
