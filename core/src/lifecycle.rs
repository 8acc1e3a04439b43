//! Single-flight request lifecycle with a fixed retry budget.
//!
//! # Design
//! One `RequestLifecycle` drives one logical request at a time and can be
//! reused for many requests in sequence:
//!
//! ```text
//! Idle --configure--> Configured --send--> InFlight --load------------> success, Idle
//!                                             |
//!                                       error | send (automatic)
//!                                             v
//!                                          Retrying --load------------> success, Idle
//!                                           |    ^  --error, budget 0--> failure, Idle
//!                                           +----+
//!                                    error, send (automatic)
//! ```
//!
//! `InFlight` covers the first attempt and `Retrying` every later one, so a
//! host can tell whether the request has already failed at least once.
//!
//! Request data (config, attempt budget, transport handle) lives in a single
//! `ActiveRequest`, so "initialized" and "has a config, a budget and a
//! handle" cannot disagree. Terminal outcomes drop the `ActiveRequest` before
//! the continuation runs. The continuations themselves outlive that reset
//! and are only cleared by `teardown`.
//!
//! Retries are back-to-back: no delay, no backoff, and no distinction between
//! timeouts, bad statuses and network errors.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, SendError};
use crate::http::{EventKind, HandleId, ReadyState, TransportEvent};
use crate::transport::{Transport, TransportConfig, TransportFactory};
use crate::types::{Callback, RequestConfig, RequestParams};

/// Where the lifecycle is between `configure` and a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing configured. `send` is a no-op.
    Idle,
    /// Configured, no attempt issued yet.
    Configured,
    /// An attempt is out; waiting for the transport.
    InFlight,
    /// A second or later attempt is out; every earlier one failed.
    Retrying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

struct ActiveRequest<H> {
    config: RequestConfig,
    remaining_attempts: u32,
    handle: HandleId,
    transport: H,
    state: LifecycleState,
    /// An attempt is out and the transport has not answered it yet.
    pending: bool,
}

/// Reusable manager for one HTTP request at a time.
pub struct RequestLifecycle<F: TransportFactory> {
    factory: F,
    active: Option<ActiveRequest<F::Handle>>,
    on_success: Option<Callback<F::Handle>>,
    on_error: Option<Callback<F::Handle>>,
    /// Set when the current cycle's continuation has fired; cleared by
    /// `configure`.
    completed: bool,
    next_handle: u64,
}

impl<F: TransportFactory> RequestLifecycle<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            active: None,
            on_success: None,
            on_error: None,
            completed: false,
            next_handle: 1,
        }
    }

    /// Validate `params` and arm the lifecycle. Returns `false` when the
    /// lifecycle is busy or the parameters are invalid; the reason is
    /// logged.
    pub fn configure(&mut self, params: RequestParams<F::Handle>) -> bool {
        match self.try_configure(params) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "request configuration rejected");
                false
            }
        }
    }

    /// Like [`configure`](Self::configure), but returns the rejection reason.
    ///
    /// Nothing is modified unless the whole operation succeeds, including
    /// creation of the transport handle.
    pub fn try_configure(&mut self, params: RequestParams<F::Handle>) -> Result<(), ConfigError> {
        if self.active.is_some() {
            return Err(ConfigError::AlreadyInitialized);
        }
        let config = params.validate()?;

        let handle = HandleId(self.next_handle);
        let transport = self
            .factory
            .create(&TransportConfig::for_request(handle, &config))?;
        self.next_handle += 1;

        let (on_success, on_error) = params.into_callbacks();
        self.on_success = on_success;
        self.on_error = on_error;
        self.completed = false;

        info!(
            %handle,
            method = %config.method,
            url = %config.url,
            attempts = config.attempts,
            timeout_ms = config.timeout.as_millis() as u64,
            "request configured"
        );

        self.active = Some(ActiveRequest {
            remaining_attempts: config.attempts,
            config,
            handle,
            transport,
            state: LifecycleState::Configured,
            pending: false,
        });
        Ok(())
    }

    /// Issue one attempt. Without a configured request this only logs a
    /// diagnostic.
    pub fn send(&mut self) {
        if let Err(err) = self.try_send() {
            warn!(error = %err, "send ignored");
        }
    }

    /// Issue one attempt, reporting why nothing was sent.
    ///
    /// Any operation still in flight on the handle is aborted first. The
    /// attempt budget is decremented before the payload goes out: it counts
    /// attempts spent, not attempts answered.
    pub fn try_send(&mut self) -> Result<(), SendError> {
        let active = self.active.as_mut().ok_or(SendError::NotInitialized)?;
        if active.remaining_attempts == 0 {
            return Err(SendError::AttemptsExhausted);
        }

        if active.pending {
            debug!(
                handle = %active.handle,
                ready_state = ?active.transport.ready_state(),
                "aborting operation still in flight"
            );
        }
        active.transport.abort();
        active.transport.set_cache(false);
        active.transport.open(active.config.method, &active.config.url);
        for (name, value) in &active.config.headers {
            active.transport.set_request_header(name, value);
        }

        active.remaining_attempts -= 1;
        active.pending = true;
        active.state = if active.config.attempts - active.remaining_attempts > 1 {
            LifecycleState::Retrying
        } else {
            LifecycleState::InFlight
        };
        debug!(
            handle = %active.handle,
            attempt = active.config.attempts - active.remaining_attempts,
            remaining = active.remaining_attempts,
            "sending request"
        );

        active.transport.send(active.config.payload());
        Ok(())
    }

    /// Feed one transport notification into the state machine.
    ///
    /// Events are dropped when they come from a handle other than the live
    /// one, when no attempt is in flight, or when this cycle already
    /// reached its terminal outcome.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if let EventKind::ReadyStateChanged(state) = event.kind {
            observe_ready_state(event.source, state);
            return;
        }
        if self.completed {
            debug!(
                source = %event.source,
                kind = ?event.kind,
                "ignoring event after terminal outcome"
            );
            return;
        }
        let Some(active) = self.active.as_mut() else {
            debug!(source = %event.source, kind = ?event.kind, "ignoring event: no active request");
            return;
        };
        if active.handle != event.source {
            debug!(
                source = %event.source,
                live = %active.handle,
                "ignoring event from stale transport"
            );
            return;
        }
        if active.state == LifecycleState::Configured {
            debug!(source = %event.source, kind = ?event.kind, "ignoring event: nothing sent yet");
            return;
        }

        match event.kind {
            EventKind::Load => self.finish(Outcome::Success),
            EventKind::Error if active.remaining_attempts == 0 => self.finish(Outcome::Failure),
            EventKind::Error => {
                active.pending = false;
                info!(
                    handle = %active.handle,
                    remaining = active.remaining_attempts,
                    "attempt failed, retrying"
                );
                self.send();
            }
            EventKind::ReadyStateChanged(_) => {}
        }
    }

    /// Drop the current request: config, attempt budget and transport
    /// handle. The handle is dropped without `abort`; `teardown` is the call
    /// that cancels. The continuations are kept.
    pub fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(handle = %active.handle, "request state reset");
        }
    }

    /// Dispose of the lifecycle's request and continuations.
    ///
    /// A live handle is detached and aborted first, so it raises no further
    /// events. Safe to call in any state, any number of times.
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.transport.detach();
            active.transport.abort();
        }
        self.on_success = None;
        self.on_error = None;
        self.reset();
    }

    pub fn state(&self) -> LifecycleState {
        self.active
            .as_ref()
            .map_or(LifecycleState::Idle, |active| active.state)
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Attempts left for the current request, `None` when idle.
    pub fn remaining_attempts(&self) -> Option<u32> {
        self.active.as_ref().map(|active| active.remaining_attempts)
    }

    pub fn config(&self) -> Option<&RequestConfig> {
        self.active.as_ref().map(|active| &active.config)
    }

    /// The live transport handle, `None` when idle.
    pub fn transport(&self) -> Option<&F::Handle> {
        self.active.as_ref().map(|active| &active.transport)
    }

    pub fn current_handle(&self) -> Option<HandleId> {
        self.active.as_ref().map(|active| active.handle)
    }

    /// Whether either continuation is still held.
    pub fn has_callbacks(&self) -> bool {
        self.on_success.is_some() || self.on_error.is_some()
    }

    fn finish(&mut self, outcome: Outcome) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.completed = true;

        let ActiveRequest {
            config,
            remaining_attempts,
            handle,
            transport,
            ..
        } = active;
        let spent = config.attempts - remaining_attempts;

        match outcome {
            Outcome::Success => {
                info!(%handle, attempts = spent, "request succeeded");
                if let Some(callback) = self.on_success.as_mut() {
                    callback(&transport);
                }
            }
            Outcome::Failure => {
                warn!(
                    %handle,
                    attempts = spent,
                    url = %config.url,
                    "request failed, no attempts left"
                );
                if let Some(callback) = self.on_error.as_mut() {
                    callback(&transport);
                }
            }
        }
    }
}

impl<F: TransportFactory> fmt::Debug for RequestLifecycle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLifecycle")
            .field("state", &self.state())
            .field("handle", &self.current_handle())
            .field("remaining_attempts", &self.remaining_attempts())
            .field("config", &self.config())
            .field("has_callbacks", &self.has_callbacks())
            .finish()
    }
}

fn observe_ready_state(source: HandleId, state: ReadyState) {
    let phase = match state {
        ReadyState::Created => "created",
        ReadyState::Opened => "opened, headers may be set",
        ReadyState::HeadersReceived => "headers received",
        ReadyState::Loading => "receiving body",
        ReadyState::Done => "done",
    };
    debug!(handle = %source, ready_state = state as u8, phase, "transport ready state changed");
}
