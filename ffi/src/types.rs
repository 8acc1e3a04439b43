//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! The host owns the transport. It hands the library a table of C function
//! pointers (`FfiTransportVTable`) and gets back opaque lifecycle pointers.
//! `FfiTransport` adapts one host handle to the core `Transport` trait, and
//! `FfiTransportFactory` creates those handles through the table. Strings
//! passed to the host are only valid for the duration of the call.

use std::collections::BTreeMap;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use reqlife_core::{
    payload_present, Credentials, HandleId, HttpMethod, LifecycleState, ReadyState,
    RequestLifecycle, RequestOptions, RequestParams, Transport, TransportConfig, TransportError,
    TransportFactory,
};
use serde_json::Value;
use tracing::warn;

/// Event kind passed to `reqlife_handle_event`: the request succeeded.
pub const REQLIFE_EVENT_LOAD: u32 = 0;
/// Event kind passed to `reqlife_handle_event`: the request failed.
pub const REQLIFE_EVENT_ERROR: u32 = 1;
/// Event kind passed to `reqlife_handle_event`: the handle's ready state
/// changed.
pub const REQLIFE_EVENT_READY_STATE: u32 = 2;

/// Opaque handle to a `RequestLifecycle`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiRequestLifecycle {
    pub(crate) inner: RequestLifecycle<FfiTransportFactory>,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// Lifecycle state as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiLifecycleState {
    Idle = 0,
    Configured = 1,
    InFlight = 2,
    Retrying = 3,
}

impl From<LifecycleState> for FfiLifecycleState {
    fn from(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Idle => FfiLifecycleState::Idle,
            LifecycleState::Configured => FfiLifecycleState::Configured,
            LifecycleState::InFlight => FfiLifecycleState::InFlight,
            LifecycleState::Retrying => FfiLifecycleState::Retrying,
        }
    }
}

// ---------------------------------------------------------------------------
// Request parameters (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// Completion callback. `handle` is the host's own transport handle that
/// produced the terminal event; `handle_id` is the id it was created with.
pub type FfiCompletionFn =
    unsafe extern "C" fn(user_data: *mut c_void, handle: *mut c_void, handle_id: u64);

#[repr(C)]
pub struct FfiCallbacks {
    pub user_data: *mut c_void,
    pub on_success: Option<FfiCompletionFn>,
    pub on_error: Option<FfiCompletionFn>,
}

/// Request parameters for `reqlife_configure`.
///
/// Null `method`/`url` and absent callbacks count as missing. `attempts <= 0`
/// and `timeout_ms == 0` select the defaults. `data` reaches the host's
/// `send` exactly as given, unless it is a falsy JSON literal (`null`,
/// `false`, `0`, `""`), in which case the request goes out without a body.
#[repr(C)]
pub struct FfiRequestParams {
    pub method: *const c_char,
    pub url: *const c_char,
    pub attempts: i64,
    pub timeout_ms: u64,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub data: *const c_char,
    pub use_credentials: bool,
    pub username: *const c_char,
    pub password: *const c_char,
    pub has_auto_encode_url: bool,
    pub auto_encode_url: bool,
    pub callbacks: FfiCallbacks,
}

/// Read a borrowed C string. Null yields `None`; invalid UTF-8 is replaced.
unsafe fn opt_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Keep the caller's payload text byte for byte. JSON text is parsed only to
/// find out whether it is a falsy literal (`null`, `false`, `0`, `""`), which
/// means "no payload".
fn payload_from_text(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) if !payload_present(&value) => value,
        _ => Value::String(text),
    }
}

impl FfiRequestParams {
    /// Convert into core parameters. The caller guarantees every non-null
    /// pointer is valid for the duration of the call.
    pub(crate) unsafe fn to_core(&self) -> RequestParams<FfiTransport> {
        let headers = if self.headers.is_null() || self.headers_len == 0 {
            None
        } else {
            let raw = std::slice::from_raw_parts(self.headers, self.headers_len as usize);
            let map: BTreeMap<String, String> = raw
                .iter()
                .filter_map(|h| Some((opt_string(h.key)?, opt_string(h.value)?)))
                .collect();
            Some(map)
        };

        let data = opt_string(self.data).map(payload_from_text);

        let credentials = match (opt_string(self.username), opt_string(self.password)) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        let options = RequestOptions {
            method: opt_string(self.method),
            url: opt_string(self.url),
            attempts: (self.attempts != 0).then_some(self.attempts),
            timeout_ms: (self.timeout_ms != 0).then_some(self.timeout_ms),
            headers,
            data,
            use_credentials: self.use_credentials,
            credentials,
            auto_encode_url: self.has_auto_encode_url.then_some(self.auto_encode_url),
        };

        let mut params = RequestParams::from_options(options);
        let user_data = self.callbacks.user_data;
        if let Some(on_success) = self.callbacks.on_success {
            params = params.on_success(move |t: &FfiTransport| unsafe {
                on_success(user_data, t.raw(), t.id().0)
            });
        }
        if let Some(on_error) = self.callbacks.on_error {
            params = params.on_error(move |t: &FfiTransport| unsafe {
                on_error(user_data, t.raw(), t.id().0)
            });
        }
        params
    }
}

// ---------------------------------------------------------------------------
// Host transport
// ---------------------------------------------------------------------------

/// Settings passed to the host's `create` function.
#[repr(C)]
pub struct FfiTransportConfig {
    pub handle_id: u64,
    pub timeout_ms: u64,
    pub with_credentials: bool,
    /// Null unless `with_credentials`.
    pub username: *const c_char,
    /// Null unless `with_credentials`.
    pub password: *const c_char,
    /// False when the caller did not supply `auto_encode_url`.
    pub has_auto_encode_url: bool,
    pub auto_encode_url: bool,
}

/// Host transport primitive as a table of C functions.
///
/// `create`, `open`, `set_request_header`, `send` and `abort` are required.
/// `set_cache`, `ready_state`, `detach` and `destroy` may be null. Events
/// are reported back with `reqlife_handle_event`, never from inside these
/// functions.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiTransportVTable {
    pub user_data: *mut c_void,
    pub create: Option<
        unsafe extern "C" fn(
            user_data: *mut c_void,
            config: *const FfiTransportConfig,
        ) -> *mut c_void,
    >,
    pub open: Option<
        unsafe extern "C" fn(handle: *mut c_void, method: FfiHttpMethod, url: *const c_char),
    >,
    pub set_request_header: Option<
        unsafe extern "C" fn(handle: *mut c_void, name: *const c_char, value: *const c_char),
    >,
    /// `payload` is null when the request has no body.
    pub send: Option<unsafe extern "C" fn(handle: *mut c_void, payload: *const c_char)>,
    pub abort: Option<unsafe extern "C" fn(handle: *mut c_void)>,
    pub set_cache: Option<unsafe extern "C" fn(handle: *mut c_void, enabled: bool)>,
    pub ready_state: Option<unsafe extern "C" fn(handle: *mut c_void) -> u8>,
    pub detach: Option<unsafe extern "C" fn(handle: *mut c_void)>,
    pub destroy: Option<unsafe extern "C" fn(handle: *mut c_void)>,
}

impl FfiTransportVTable {
    pub(crate) fn is_complete(&self) -> bool {
        self.create.is_some()
            && self.open.is_some()
            && self.set_request_header.is_some()
            && self.send.is_some()
            && self.abort.is_some()
    }
}

/// Creates host handles through the vtable.
pub struct FfiTransportFactory {
    pub(crate) vtable: FfiTransportVTable,
}

impl TransportFactory for FfiTransportFactory {
    type Handle = FfiTransport;

    fn create(&mut self, config: &TransportConfig) -> Result<FfiTransport, TransportError> {
        let create = self
            .vtable
            .create
            .ok_or_else(|| TransportError::CreateFailed("no create function".to_string()))?;

        let (username, password) = match &config.credentials {
            Some(c) => (
                Some(c_string(&c.username).map_err(TransportError::CreateFailed)?),
                Some(c_string(&c.password).map_err(TransportError::CreateFailed)?),
            ),
            None => (None, None),
        };
        let raw_config = FfiTransportConfig {
            handle_id: config.handle.0,
            timeout_ms: config.timeout.as_millis() as u64,
            with_credentials: config.with_credentials(),
            username: username.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            password: password.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            has_auto_encode_url: config.auto_encode_url.is_some(),
            auto_encode_url: config.auto_encode_url.unwrap_or(false),
        };

        let raw = unsafe { create(self.vtable.user_data, &raw_config) };
        if raw.is_null() {
            return Err(TransportError::CreateFailed("host returned a null handle".to_string()));
        }
        Ok(FfiTransport {
            vtable: self.vtable,
            raw,
            id: config.handle,
        })
    }
}

/// One host transport handle. Destroyed through the vtable when dropped.
pub struct FfiTransport {
    vtable: FfiTransportVTable,
    raw: *mut c_void,
    id: HandleId,
}

impl FfiTransport {
    pub fn raw(&self) -> *mut c_void {
        self.raw
    }

    pub fn id(&self) -> HandleId {
        self.id
    }
}

fn c_string(s: &str) -> Result<CString, String> {
    CString::new(s).map_err(|_| format!("interior NUL byte in {s:?}"))
}

/// Text form of a payload: strings go out verbatim, everything else as JSON.
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Transport for FfiTransport {
    fn open(&mut self, method: HttpMethod, url: &str) {
        let Some(open) = self.vtable.open else { return };
        match c_string(url) {
            Ok(url) => unsafe { open(self.raw, method.into(), url.as_ptr()) },
            Err(err) => warn!(handle = %self.id, %err, "url not passed to host"),
        }
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        let Some(set_header) = self.vtable.set_request_header else { return };
        match (c_string(name), c_string(value)) {
            (Ok(name), Ok(value)) => unsafe { set_header(self.raw, name.as_ptr(), value.as_ptr()) },
            _ => warn!(handle = %self.id, header = name, "header not passed to host"),
        }
    }

    fn send(&mut self, payload: Option<&Value>) {
        let Some(send) = self.vtable.send else { return };
        let body = match payload.map(|p| c_string(&payload_text(p))).transpose() {
            Ok(body) => body,
            Err(err) => {
                warn!(handle = %self.id, %err, "payload dropped");
                None
            }
        };
        let ptr = body.as_ref().map_or(std::ptr::null(), |b| b.as_ptr());
        unsafe { send(self.raw, ptr) }
    }

    fn abort(&mut self) {
        if let Some(abort) = self.vtable.abort {
            unsafe { abort(self.raw) }
        }
    }

    fn set_cache(&mut self, enabled: bool) {
        if let Some(set_cache) = self.vtable.set_cache {
            unsafe { set_cache(self.raw, enabled) }
        }
    }

    fn ready_state(&self) -> ReadyState {
        match self.vtable.ready_state {
            Some(ready_state) => {
                let raw = unsafe { ready_state(self.raw) };
                ReadyState::try_from(raw).unwrap_or(ReadyState::Created)
            }
            None => ReadyState::Created,
        }
    }

    fn detach(&mut self) {
        if let Some(detach) = self.vtable.detach {
            unsafe { detach(self.raw) }
        }
    }
}

impl Drop for FfiTransport {
    fn drop(&mut self) {
        if let Some(destroy) = self.vtable.destroy {
            unsafe { destroy(self.raw) }
        }
    }
}
