//! The transport capability the host supplies.
//!
//! # Design
//! A `Transport` is one host-provided HTTP handle: it opens, takes headers,
//! sends, and can be aborted. It never calls back into the lifecycle
//! directly; it reports outcomes as `TransportEvent`s on the host's event
//! loop, tagged with the `HandleId` it received in its `TransportConfig`.
//! Because the lifecycle holds the handle by `&mut`, a transport cannot
//! deliver an event synchronously from inside `send`.

use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;
use crate::http::{HandleId, HttpMethod, ReadyState};
use crate::types::{Credentials, RequestConfig};

/// One host HTTP handle.
pub trait Transport {
    fn open(&mut self, method: HttpMethod, url: &str);

    fn set_request_header(&mut self, name: &str, value: &str);

    /// Start the request. `None` sends without a body.
    fn send(&mut self, payload: Option<&Value>);

    /// Cancel the current operation. Must be harmless when nothing is in
    /// flight.
    fn abort(&mut self);

    /// Enable or disable response caching. Hosts without cache control
    /// ignore it.
    fn set_cache(&mut self, _enabled: bool) {}

    fn ready_state(&self) -> ReadyState;

    /// Stop raising load and error events for this handle.
    fn detach(&mut self) {}
}

/// Settings a transport handle is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Tag for every event the handle raises.
    pub handle: HandleId,
    pub timeout: Duration,
    /// Set only when the caller raised the credentials flag.
    pub credentials: Option<Credentials>,
    /// Forwarded only when the caller supplied it.
    pub auto_encode_url: Option<bool>,
}

impl TransportConfig {
    pub(crate) fn for_request(handle: HandleId, config: &RequestConfig) -> Self {
        Self {
            handle,
            timeout: config.timeout,
            credentials: config.credentials.clone(),
            auto_encode_url: config.auto_encode_url,
        }
    }

    pub fn with_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Creates transport handles. Called once per successful `configure`.
pub trait TransportFactory {
    type Handle: Transport;

    fn create(&mut self, config: &TransportConfig) -> Result<Self::Handle, TransportError>;
}

impl<H, F> TransportFactory for F
where
    H: Transport,
    F: FnMut(&TransportConfig) -> Result<H, TransportError>,
{
    type Handle = H;

    fn create(&mut self, config: &TransportConfig) -> Result<H, TransportError> {
        self(config)
    }
}
