use thiserror::Error;

/// Errors returned by the `validate` methods of configuration structures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A numeric field must be strictly positive.
    #[error("`{0}` must be greater than 0")]
    ZeroValue(&'static str),
    /// A string field must not be empty.
    #[error("`{0}` cannot be empty")]
    EmptyValue(&'static str),
    /// The listener reconnection bounds are inverted.
    #[error("`min_reconnect_interval_ms` ({min}) cannot exceed `max_reconnect_interval_ms` ({max})")]
    ReconnectIntervalInverted { min: u64, max: u64 },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}
