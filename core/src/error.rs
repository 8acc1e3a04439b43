//! Error types for the request lifecycle.
//!
//! # Design
//! None of these errors is fatal. `ConfigError` explains why `configure`
//! refused a request; `SendError` explains why `send` did nothing. Transport
//! failures during I/O are not errors at this layer: they arrive as events,
//! consume an attempt, and reach the caller only through the `error`
//! continuation once the attempt budget is spent.

use thiserror::Error;

/// Reasons `RequestLifecycle::try_configure` rejects a request. On any of
/// these no state is retained.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A previous request has not reached a terminal outcome yet.
    #[error("lifecycle is already initialized")]
    AlreadyInitialized,

    /// One of `method`, `url`, `success`, `error` was not supplied.
    #[error("missing required parameter `{0}`")]
    MissingField(&'static str),

    /// The method is not GET, POST, PUT or DELETE.
    #[error("unsupported HTTP method: {0:?}")]
    UnsupportedMethod(String),

    /// The URL does not start with `http://` or `https://`.
    #[error("URL must start with http:// or https://, got {0:?}")]
    InvalidUrl(String),

    /// `use_credentials` was set without a username/password pair.
    #[error("credentials flag set but no credentials supplied")]
    MissingCredentials,

    /// The transport factory could not produce a handle.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reasons `RequestLifecycle::try_send` does not issue an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// `send` was called without a successful `configure`.
    #[error("HTTP client not initialized")]
    NotInitialized,

    /// Every attempt has already been spent on the current request.
    #[error("no attempts left for the current request")]
    AttemptsExhausted,
}

/// Failure reported by a `TransportFactory` while creating a handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport handle could not be created: {0}")]
    CreateFailed(String),
}
