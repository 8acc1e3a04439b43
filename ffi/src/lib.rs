//! C-ABI wrapper around `reqlife-core`.
//!
//! # Overview
//! Exposes the request lifecycle through `extern "C"` functions so any
//! language with a C FFI can drive single-flight requests with retries while
//! keeping the actual I/O on its side.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary. A panic reads as `false`, `-1` or a no-op.
//! - The host supplies its transport as an `FfiTransportVTable` and reports
//!   load, error and ready-state events back through `reqlife_handle_event`.
//! - Continuations are C callbacks carried in `FfiRequestParams`. They run
//!   inside `reqlife_handle_event` and must not call back into the same
//!   lifecycle; the host configures the next request after the call returns.
//! - The caller owns the lifecycle pointer and must release it with
//!   `reqlife_free`.

pub mod types;

use std::panic::{catch_unwind, AssertUnwindSafe};

use reqlife_core::{HandleId, ReadyState, RequestLifecycle, TransportEvent};
use tracing::warn;

use types::*;

// ---------------------------------------------------------------------------
// Lifecycle handle
// ---------------------------------------------------------------------------

/// Create a lifecycle that builds its transport handles through `vtable`.
///
/// The table is copied. Returns null if `vtable` is null, if any of
/// `create`, `open`, `set_request_header`, `send` or `abort` is missing, or
/// if an internal panic occurs. The caller must free the returned pointer
/// with `reqlife_free`.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_new(vtable: *const FfiTransportVTable) -> *mut FfiRequestLifecycle {
    catch_unwind(|| {
        if vtable.is_null() {
            return std::ptr::null_mut();
        }
        let vtable = unsafe { *vtable };
        if !vtable.is_complete() {
            warn!("transport vtable is missing a required function");
            return std::ptr::null_mut();
        }
        let inner = RequestLifecycle::new(FfiTransportFactory { vtable });
        Box::into_raw(Box::new(FfiRequestLifecycle { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Tear down and free a lifecycle created by `reqlife_new`. Any in-flight
/// request is detached and aborted first; no callback fires. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_free(lc: *mut FfiRequestLifecycle) {
    if !lc.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let mut lc = unsafe { Box::from_raw(lc) };
            lc.inner.teardown();
        }));
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Validate `params` and prepare a request.
///
/// Returns false, leaving the lifecycle unchanged, if either pointer is
/// null, a request is already configured, a required field is missing or
/// invalid, or the host's `create` returned null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_configure(
    lc: *mut FfiRequestLifecycle,
    params: *const FfiRequestParams,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if lc.is_null() || params.is_null() {
            return false;
        }
        let lc = unsafe { &mut *lc };
        let params = unsafe { (*params).to_core() };
        lc.inner.configure(params)
    }))
    .unwrap_or(false)
}

/// Issue one attempt of the configured request.
///
/// Returns false if `lc` is null, nothing is configured, or the attempt
/// budget is spent.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_send(lc: *mut FfiRequestLifecycle) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if lc.is_null() {
            return false;
        }
        let lc = unsafe { &mut *lc };
        match lc.inner.try_send() {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "send refused");
                false
            }
        }
    }))
    .unwrap_or(false)
}

/// Report an event raised by the host handle `handle_id`.
///
/// `kind` is one of `REQLIFE_EVENT_LOAD`, `REQLIFE_EVENT_ERROR` or
/// `REQLIFE_EVENT_READY_STATE`; `ready_state` is read only for the last.
/// Unknown kinds and ready states are ignored. Success and error callbacks
/// run before this function returns.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_handle_event(
    lc: *mut FfiRequestLifecycle,
    handle_id: u64,
    kind: u32,
    ready_state: u8,
) {
    if lc.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let lc = unsafe { &mut *lc };
        let source = HandleId(handle_id);
        let event = match kind {
            REQLIFE_EVENT_LOAD => TransportEvent::load(source),
            REQLIFE_EVENT_ERROR => TransportEvent::error(source),
            REQLIFE_EVENT_READY_STATE => match ReadyState::try_from(ready_state) {
                Ok(state) => TransportEvent::ready_state(source, state),
                Err(raw) => {
                    warn!(handle = %source, ready_state = raw, "unknown ready state ignored");
                    return;
                }
            },
            other => {
                warn!(handle = %source, kind = other, "unknown event kind ignored");
                return;
            }
        };
        lc.inner.handle_event(event);
    }));
}

/// Drop the configured request and return to idle. The handle is released
/// through the vtable's `destroy` without being aborted, so an attempt the
/// host still has running is not cancelled; use `reqlife_teardown` for that.
/// Callbacks registered by the last configure are kept. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_reset(lc: *mut FfiRequestLifecycle) {
    if !lc.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &mut *lc }.inner.reset();
        }));
    }
}

/// Detach the handle, abort it, clear callbacks and return to idle. Safe to
/// call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_teardown(lc: *mut FfiRequestLifecycle) {
    if !lc.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &mut *lc }.inner.teardown();
        }));
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

/// True while a request is configured. False for null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_is_initialized(lc: *const FfiRequestLifecycle) -> bool {
    if lc.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*lc }.inner.is_initialized())).unwrap_or(false)
}

/// Attempts left for the configured request, or -1 when idle or null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_remaining_attempts(lc: *const FfiRequestLifecycle) -> i64 {
    if lc.is_null() {
        return -1;
    }
    catch_unwind(AssertUnwindSafe(|| {
        unsafe { &*lc }
            .inner
            .remaining_attempts()
            .map_or(-1, i64::from)
    }))
    .unwrap_or(-1)
}

/// Current lifecycle state. `Idle` for null.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_state(lc: *const FfiRequestLifecycle) -> FfiLifecycleState {
    if lc.is_null() {
        return FfiLifecycleState::Idle;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*lc }.inner.state().into()))
        .unwrap_or(FfiLifecycleState::Idle)
}

/// Id of the live host handle, or 0 when idle or null. Ids start at 1.
#[unsafe(no_mangle)]
pub extern "C" fn reqlife_current_handle(lc: *const FfiRequestLifecycle) -> u64 {
    if lc.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| {
        unsafe { &*lc }.inner.current_handle().map_or(0, |id| id.0)
    }))
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
