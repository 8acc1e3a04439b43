//! HTTP vocabulary shared between the lifecycle and the host transport.
//!
//! # Design
//! The core never performs network I/O. These types describe what the
//! lifecycle asks of a transport (`HttpMethod`) and what the transport reports
//! back (`TransportEvent`). The host's event loop owns delivery: every
//! completion, failure, or readiness change is handed to
//! `RequestLifecycle::handle_event` tagged with the `HandleId` of the
//! transport that produced it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// HTTP method for a request. Only the four verbs the lifecycle accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method name is not one of `GET`, `POST`, `PUT`,
/// `DELETE`. Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0:?}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

/// Readiness of a transport handle, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    /// Handle created, `open` not called yet.
    Created = 0,
    /// `open` called; headers may be set.
    Opened = 1,
    /// Response headers received.
    HeadersReceived = 2,
    /// Response body is streaming in.
    Loading = 3,
    /// Operation finished; a load or error event follows.
    Done = 4,
}

impl TryFrom<u8> for ReadyState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReadyState::Created),
            1 => Ok(ReadyState::Opened),
            2 => Ok(ReadyState::HeadersReceived),
            3 => Ok(ReadyState::Loading),
            4 => Ok(ReadyState::Done),
            other => Err(other),
        }
    }
}

/// Identifies one transport handle for the lifetime of a lifecycle instance.
///
/// Ids are handed out in increasing order by the lifecycle and passed to the
/// transport through `TransportConfig`, so the host can tag its events with
/// the handle that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The request completed successfully, as judged by the transport.
    Load,
    /// The request failed: network error, timeout, or a status the transport
    /// treats as failure. All are handled identically.
    Error,
    /// Readiness changed. Observability only.
    ReadyStateChanged(ReadyState),
}

/// A notification raised by a transport handle on the host's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportEvent {
    pub source: HandleId,
    pub kind: EventKind,
}

impl TransportEvent {
    pub fn load(source: HandleId) -> Self {
        Self { source, kind: EventKind::Load }
    }

    pub fn error(source: HandleId) -> Self {
        Self { source, kind: EventKind::Error }
    }

    pub fn ready_state(source: HandleId, state: ReadyState) -> Self {
        Self {
            source,
            kind: EventKind::ReadyStateChanged(state),
        }
    }
}
