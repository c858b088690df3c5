use thiserror::Error;

/// Failures surfaced to the user.
///
/// Only two kinds exist: a malformed address, rejected before any network
/// call, and a fetch failure covering every step of a refresh. Network,
/// decoding and API errors all collapse into [`TrackerError::Fetch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Invalid Ethereum address: {0}")]
    InvalidAddress(String),

    #[error("Unable to fetch wallet data: {0}")]
    Fetch(String),
}

impl TrackerError {
    /// Flatten an error chain into a single fetch failure.
    pub fn fetch(err: &anyhow::Error) -> Self {
        Self::Fetch(format!("{err:#}"))
    }
}
