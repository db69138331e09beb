//! Session-level failures. Per-entry parse failures never show up here; they
//! are recorded as `unparseable` domains and extraction carries on.

use crate::models::Device;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The user agent's own classification disagrees with the forced device.
    #[error(
        "user agent is classified {detected} but the session is configured for {configured} (user agent: {user_agent})"
    )]
    DeviceMismatch {
        detected: Device,
        configured: Device,
        user_agent: String,
    },

    #[error("traversal did not complete within {0:?}")]
    Timeout(Duration),

    #[error("session cancelled before traversal completed")]
    Cancelled,

    #[error("traversal ended without a completion signal")]
    TraversalAborted,

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("host {0:?} is not in the allowed domain list")]
    DisallowedDomain(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("no organic entries, density is undefined")]
    EmptyOrganicSet,
}
