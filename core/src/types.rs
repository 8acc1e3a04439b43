//! Request parameters, their validation, and the validated snapshot.
//!
//! # Design
//! `RequestOptions` is plain serde data so a request can be described in JSON
//! (fixtures, host configuration). The `success` and `error` continuations
//! cannot be serialized and are attached in code through `RequestParams`.
//! `RequestParams::validate` is the only way to obtain a `RequestConfig`, so
//! holding a config means the request passed validation.
//!
//! Defaults are resolved by named functions rather than at the use site.
//! Non-positive attempt counts and a zero timeout fall back to the defaults,
//! and falsy payloads (`null`, `false`, `0`, `""`) are sent as "no payload".

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::http::HttpMethod;

/// Attempts granted when none, or a non-positive count, is supplied.
pub const DEFAULT_ATTEMPTS: u32 = 1;

/// Transport timeout used when none, or zero, is supplied.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Completion continuation. Receives the transport handle that produced the
/// terminal event.
pub type Callback<H> = Box<dyn FnMut(&H)>;

/// Username/password pair forwarded to the transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The data half of a request description, before validation.
///
/// Every field is optional here; `RequestParams::validate` decides what is
/// required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Signed so that zero and negative counts can be expressed; both
    /// resolve to `DEFAULT_ATTEMPTS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub use_credentials: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// `None` means "not supplied" and is not forwarded to the transport.
    /// `Some(false)` is forwarded as an explicit `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_encode_url: Option<bool>,
}

/// Everything `configure` accepts: request options plus the two
/// continuations.
pub struct RequestParams<H> {
    pub options: RequestOptions,
    pub success: Option<Callback<H>>,
    pub error: Option<Callback<H>>,
}

impl<H> Default for RequestParams<H> {
    fn default() -> Self {
        Self {
            options: RequestOptions::default(),
            success: None,
            error: None,
        }
    }
}

impl<H> fmt::Debug for RequestParams<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestParams")
            .field("options", &self.options)
            .field("success", &self.success.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

impl<H> RequestParams<H> {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self::from_options(RequestOptions {
            method: Some(method.into()),
            url: Some(url.into()),
            ..RequestOptions::default()
        })
    }

    pub fn from_options(options: RequestOptions) -> Self {
        Self {
            options,
            success: None,
            error: None,
        }
    }

    pub fn on_success(mut self, callback: impl FnMut(&H) + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnMut(&H) + 'static) -> Self {
        self.error = Some(Box::new(callback));
        self
    }

    pub fn attempts(mut self, attempts: i64) -> Self {
        self.options.attempts = Some(attempts);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    /// Add one request header. A repeated name replaces the earlier value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options
            .headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.options.data = Some(data);
        self
    }

    /// Attach credentials and raise the credentials flag.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.use_credentials = true;
        self.options.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn auto_encode_url(mut self, enabled: bool) -> Self {
        self.options.auto_encode_url = Some(enabled);
        self
    }

    /// Check the parameters and produce the immutable request snapshot.
    ///
    /// `method`, `url`, `success` and `error` are required; the method must
    /// be one of GET/POST/PUT/DELETE and the URL must start with `http://`
    /// or `https://`. Everything else is optional.
    pub fn validate(&self) -> Result<RequestConfig, ConfigError> {
        let options = &self.options;
        let method = options.method.as_deref().ok_or(ConfigError::MissingField("method"))?;
        let url = options.url.as_deref().ok_or(ConfigError::MissingField("url"))?;
        if self.success.is_none() {
            return Err(ConfigError::MissingField("success"));
        }
        if self.error.is_none() {
            return Err(ConfigError::MissingField("error"));
        }

        let method: HttpMethod = method
            .parse()
            .map_err(|_| ConfigError::UnsupportedMethod(method.to_string()))?;

        if !is_http_url(url) {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }

        let credentials = if options.use_credentials {
            Some(options.credentials.clone().ok_or(ConfigError::MissingCredentials)?)
        } else {
            None
        };

        Ok(RequestConfig {
            method,
            url: url.to_string(),
            attempts: resolve_attempts(options.attempts),
            timeout: resolve_timeout(options.timeout_ms),
            headers: options.headers.clone().unwrap_or_default(),
            data: options.data.clone(),
            credentials,
            auto_encode_url: options.auto_encode_url,
        })
    }

    pub(crate) fn into_callbacks(self) -> (Option<Callback<H>>, Option<Callback<H>>) {
        (self.success, self.error)
    }
}

/// Validated, immutable description of the active request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub method: HttpMethod,
    pub url: String,
    /// Effective attempt budget, always at least one.
    pub attempts: u32,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
    /// The payload exactly as supplied. See [`RequestConfig::payload`].
    pub data: Option<Value>,
    /// Present only when the credentials flag was set.
    pub credentials: Option<Credentials>,
    pub auto_encode_url: Option<bool>,
}

impl RequestConfig {
    /// The payload to send, or `None` when the request goes out without a
    /// body.
    pub fn payload(&self) -> Option<&Value> {
        self.data.as_ref().filter(|data| payload_present(data))
    }
}

/// Effective attempt budget: the supplied count when positive, otherwise
/// `DEFAULT_ATTEMPTS`.
pub fn resolve_attempts(attempts: Option<i64>) -> u32 {
    match attempts {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => DEFAULT_ATTEMPTS,
    }
}

/// Effective transport timeout: the supplied value when non-zero, otherwise
/// `DEFAULT_TIMEOUT`.
pub fn resolve_timeout(timeout_ms: Option<u64>) -> Duration {
    match timeout_ms {
        Some(ms) if ms > 0 => Duration::from_millis(ms),
        _ => DEFAULT_TIMEOUT,
    }
}

/// Whether `data` counts as a payload. `null`, `false`, zero and the empty
/// string do not; arrays and objects always do, even when empty.
pub fn payload_present(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(method: &str, url: &str) -> RequestParams<()> {
        RequestParams::<()>::new(method, url)
            .on_success(|_| {})
            .on_error(|_| {})
    }

    #[test]
    fn valid_params_produce_config_with_defaults() {
        let config = params("GET", "http://x/y").validate().unwrap();
        assert_eq!(config.method, HttpMethod::Get);
        assert_eq!(config.url, "http://x/y");
        assert_eq!(config.attempts, 1);
        assert_eq!(config.timeout, Duration::from_millis(3000));
        assert!(config.headers.is_empty());
        assert!(config.data.is_none());
        assert!(config.credentials.is_none());
        assert!(config.auto_encode_url.is_none());
    }

    #[test]
    fn each_required_field_is_checked() {
        let missing_method = RequestParams::<()>::from_options(RequestOptions {
            url: Some("http://x".into()),
            ..RequestOptions::default()
        })
        .on_success(|_| {})
        .on_error(|_| {});
        assert!(matches!(missing_method.validate(), Err(ConfigError::MissingField("method"))));

        let missing_url = RequestParams::<()>::from_options(RequestOptions {
            method: Some("GET".into()),
            ..RequestOptions::default()
        })
        .on_success(|_| {})
        .on_error(|_| {});
        assert!(matches!(missing_url.validate(), Err(ConfigError::MissingField("url"))));

        let missing_success = RequestParams::<()>::new("GET", "http://x").on_error(|_| {});
        assert!(matches!(missing_success.validate(), Err(ConfigError::MissingField("success"))));

        let missing_error = RequestParams::<()>::new("GET", "http://x").on_success(|_| {});
        assert!(matches!(missing_error.validate(), Err(ConfigError::MissingField("error"))));
    }

    #[test]
    fn unsupported_method_is_rejected() {
        for method in ["PATCH", "get", "HEAD", ""] {
            let err = params(method, "http://x").validate().unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedMethod(_)), "{method}");
        }
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        for url in ["ftp://bad", "x/y", "HTTP://upper", " http://leading-space", ""] {
            let err = params("POST", url).validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidUrl(_)), "{url}");
        }
        assert!(params("POST", "https://secure").validate().is_ok());
    }

    #[test]
    fn attempts_resolution() {
        assert_eq!(resolve_attempts(None), 1);
        assert_eq!(resolve_attempts(Some(0)), 1);
        assert_eq!(resolve_attempts(Some(-4)), 1);
        assert_eq!(resolve_attempts(Some(5)), 5);
        assert_eq!(resolve_attempts(Some(i64::MAX)), u32::MAX);
    }

    #[test]
    fn timeout_resolution() {
        assert_eq!(resolve_timeout(None), DEFAULT_TIMEOUT);
        assert_eq!(resolve_timeout(Some(0)), DEFAULT_TIMEOUT);
        assert_eq!(resolve_timeout(Some(250)), Duration::from_millis(250));
    }

    #[test]
    fn falsy_payloads_are_not_sent() {
        assert!(!payload_present(&json!(null)));
        assert!(!payload_present(&json!(false)));
        assert!(!payload_present(&json!(0)));
        assert!(!payload_present(&json!(0.0)));
        assert!(!payload_present(&json!("")));
        assert!(payload_present(&json!({})));
        assert!(payload_present(&json!([])));
        assert!(payload_present(&json!("x")));
        assert!(payload_present(&json!(1)));

        let config = params("POST", "http://x").data(json!("")).validate().unwrap();
        assert_eq!(config.data, Some(json!("")));
        assert!(config.payload().is_none());
    }

    #[test]
    fn credentials_require_the_pair() {
        let config = params("GET", "http://x").credentials("ana", "s3cret").validate().unwrap();
        assert_eq!(config.credentials, Some(Credentials::new("ana", "s3cret")));

        let mut flag_only = params("GET", "http://x");
        flag_only.options.use_credentials = true;
        assert!(matches!(flag_only.validate(), Err(ConfigError::MissingCredentials)));

        let mut pair_only = params("GET", "http://x");
        pair_only.options.credentials = Some(Credentials::new("ana", "s3cret"));
        assert!(pair_only.validate().unwrap().credentials.is_none());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let text = format!("{:?}", Credentials::new("ana", "s3cret"));
        assert!(text.contains("ana"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn auto_encode_url_distinguishes_absent_from_false() {
        assert_eq!(params("GET", "http://x").validate().unwrap().auto_encode_url, None);
        let config = params("GET", "http://x").auto_encode_url(false).validate().unwrap();
        assert_eq!(config.auto_encode_url, Some(false));
    }

    #[test]
    fn options_deserialize_from_camel_case_json() {
        let options: RequestOptions = serde_json::from_str(
            r#"{
                "method": "PUT",
                "url": "https://api.test/items/1",
                "attempts": 3,
                "timeoutMs": 500,
                "headers": {"x-trace": "abc"},
                "data": {"name": "widget"},
                "useCredentials": true,
                "credentials": {"username": "u", "password": "p"},
                "autoEncodeUrl": false
            }"#,
        )
        .unwrap();
        let config = RequestParams::<()>::from_options(options)
            .on_success(|_| {})
            .on_error(|_| {})
            .validate()
            .unwrap();
        assert_eq!(config.method, HttpMethod::Put);
        assert_eq!(config.attempts, 3);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.headers.get("x-trace").map(String::as_str), Some("abc"));
        assert_eq!(config.payload(), Some(&json!({"name": "widget"})));
        assert_eq!(config.credentials, Some(Credentials::new("u", "p")));
        assert_eq!(config.auto_encode_url, Some(false));
    }

    #[test]
    fn repeated_header_name_keeps_last_value() {
        let config = params("GET", "http://x")
            .header("accept", "text/plain")
            .header("accept", "application/json")
            .validate()
            .unwrap();
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers["accept"], "application/json");
    }
}
