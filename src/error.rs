//! Error taxonomy shared across the crate

use thiserror::Error;

/// Every failure in the system maps onto one of these four kinds.
/// None of them is fatal to the process: network and auth failures leave
/// the catalog at its prior state, parse failures leave the EPG empty,
/// and playback failures park the session in its `Error` state.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Fetch/connect failure talking to the provider.
    #[error("network failure: {0}")]
    Network(String),

    /// Inactive or missing account status in the provider response.
    #[error("auth failure: {0}")]
    Auth(String),

    /// Malformed schedule markup. Callers treat this as "no EPG
    /// available", not as an error worth surfacing to the user.
    #[error("parse failure: {0}")]
    Parse(String),

    /// The media engine rejected or errored on a stream address.
    #[error("playback failure: {0}")]
    Playback(String),
}
