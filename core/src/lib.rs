//! Single-request lifecycle manager over a host-supplied HTTP transport.
//!
//! # Overview
//! `RequestLifecycle` validates request parameters, drives one host transport
//! handle through open/headers/send, retries failed attempts back-to-back
//! until a fixed budget is spent, and reports the terminal outcome through
//! exactly one of two caller-supplied continuations.
//!
//! # Design
//! - The host does the I/O. A `TransportFactory` creates `Transport` handles;
//!   their outcomes come back as `TransportEvent`s that the host's event loop
//!   feeds to `RequestLifecycle::handle_event`.
//! - Single-flight: at most one handle is alive per lifecycle, and events
//!   from any other handle are dropped.
//! - Nothing here blocks, spawns, or needs a runtime; the lifecycle is a
//!   plain state machine driven from one thread.
//! - Diagnostics go through `tracing`; the library never installs a
//!   subscriber.

pub mod error;
pub mod http;
pub mod lifecycle;
pub mod transport;
pub mod types;

pub use error::{ConfigError, SendError, TransportError};
pub use http::{EventKind, HandleId, HttpMethod, ReadyState, TransportEvent, UnknownMethod};
pub use lifecycle::{LifecycleState, RequestLifecycle};
pub use transport::{Transport, TransportConfig, TransportFactory};
pub use types::{
    payload_present, resolve_attempts, resolve_timeout, Callback, Credentials, RequestConfig,
    RequestOptions, RequestParams, DEFAULT_ATTEMPTS, DEFAULT_TIMEOUT,
};
