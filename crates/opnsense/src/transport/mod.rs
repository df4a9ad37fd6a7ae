//! Transport envelope for the appliance API.
//!
//! This module provides the [`Transport`] trait and its implementations.
//! [`http::HttpTransport`] talks to a real appliance over HTTPS with basic
//! authentication. [`MockTransport`] answers from a script and records every
//! request, for tests that must not touch the network.
//!
//! A transport only moves bytes. It reports DNS, connect and timeout
//! failures as [`Error::Transport`] and hands back every HTTP answer,
//! including non-2xx ones, with the body read to completion.
//!
//! # Testing
//!
//! ```
//! use opnsense::transport::{ApiRequest, Method, MockTransport, Transport};
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::Post, "https://fw/api/firewall/filter/apply", 200, "{\"status\":\"ok\"}");
//!
//! let reply = mock.send(&ApiRequest::post("https://fw/api/firewall/filter/apply", None)).unwrap();
//! assert_eq!(reply.status, 200);
//! assert_eq!(mock.requests().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub use http::HttpTransport;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Reads.
    Get,
    /// Mutations and activation.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// A GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    /// A POST request with an optional body.
    pub fn post(url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body,
        }
    }
}

/// Coarse shape of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// Nothing but whitespace.
    Empty,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
    /// Anything else, including invalid JSON.
    Other,
}

/// A status code and the fully read body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body text.
    pub body: String,
}

impl RawResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in `200..=299`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx answer into a protocol error carrying the body.
    pub fn into_success(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Protocol {
                url: url.to_string(),
                status: self.status,
                body: self.body,
            })
        }
    }

    /// Classify the body without interpreting it.
    #[must_use]
    pub fn shape(&self) -> BodyShape {
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            return BodyShape::Empty;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(_)) => BodyShape::Array,
            Ok(Value::Object(_)) => BodyShape::Object,
            _ => BodyShape::Other,
        }
    }

    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(self.body.trim()).ok()
    }
}

/// Moves one request to the appliance and back.
pub trait Transport: Send + Sync {
    /// Send a request and read the whole answer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` when no HTTP status was received.
    fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// API key and secret, sent as HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// API key (the basic auth user).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn basic_auth(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.key, self.secret));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &mask(&self.key))
            .field("secret", &"********")
            .finish()
    }
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}****")
}

/// Everything needed to reach an appliance.
///
/// Owned by the caller and passed explicitly to [`Client::new`](crate::Client::new).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://192.168.1.1`.
    pub host: String,
    /// API credentials.
    pub credentials: Credentials,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure: bool,
}

impl ClientConfig {
    /// Create a config with the default timeout and TLS verification on.
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
            insecure: false,
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable TLS verification.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// A scripted answer for [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with a status and body.
    Respond {
        /// HTTP status code.
        status: u16,
        /// Body text.
        body: String,
    },
    /// Fail as if the network were down.
    Fail(String),
}

type ReplyQueue = HashMap<(Method, String), VecDeque<MockReply>>;

/// In-memory transport for tests.
///
/// Replies are queued per method and URL and consumed in order. A request
/// with no queued reply fails as a transport error. Clones share state, so a
/// test can keep a handle after giving one to a [`Client`](crate::Client).
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<ReplyQueue>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn reply(&self, method: Method, url: impl Into<String>, reply: MockReply) {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        replies
            .entry((method, url.into()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a status and body.
    pub fn respond(&self, method: Method, url: impl Into<String>, status: u16, body: &str) {
        self.reply(
            method,
            url,
            MockReply::Respond {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Queue a transport failure.
    pub fn fail(&self, method: Method, url: impl Into<String>, message: &str) {
        self.reply(method, url, MockReply::Fail(message.to_string()));
    }

    /// Requests seen so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// URLs seen so far, prefixed with the method.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&(request.method, request.url.clone()))
            .and_then(VecDeque::pop_front);

        match next {
            Some(MockReply::Respond { status, body }) => Ok(RawResponse { status, body }),
            Some(MockReply::Fail(message)) => Err(Error::transport(&request.url, message)),
            None => Err(Error::transport(&request.url, "no mock reply configured")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        assert_eq!(RawResponse::new(200, "  \n").shape(), BodyShape::Empty);
        assert_eq!(RawResponse::new(200, "[]").shape(), BodyShape::Array);
        assert_eq!(RawResponse::new(200, "{\"a\":1}").shape(), BodyShape::Object);
        assert_eq!(RawResponse::new(200, "<html>").shape(), BodyShape::Other);
        assert_eq!(RawResponse::new(200, "\"text\"").shape(), BodyShape::Other);
    }

    #[test]
    fn test_into_success() {
        assert!(RawResponse::new(204, "").into_success("u").is_ok());
        let err = RawResponse::new(500, "boom").into_success("u").unwrap_err();
        match err {
            Error::Protocol { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_basic_auth_header() {
        let creds = Credentials::new("key", "secret");
        assert_eq!(creds.basic_auth(), "Basic a2V5OnNlY3JldA==");
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let creds = Credentials::new("abcdefgh", "topsecret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("abcd****"));
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("efgh"));

        let config = ClientConfig::new("https://fw", creds);
        assert!(!format!("{config:?}").contains("topsecret"));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new("https://fw", Credentials::new("k", "s"))
            .timeout(Duration::from_secs(5))
            .insecure(true);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.insecure);
    }

    #[test]
    fn test_mock_replies_in_order() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "u", 200, "first");
        mock.respond(Method::Get, "u", 404, "second");

        let request = ApiRequest::get("u");
        assert_eq!(mock.send(&request).unwrap().body, "first");
        assert_eq!(mock.send(&request).unwrap().status, 404);
        assert!(matches!(mock.send(&request), Err(Error::Transport { .. })));
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn test_mock_method_is_part_of_key() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, "u", 200, "{}");
        assert!(mock.send(&ApiRequest::get("u")).is_err());
        assert!(mock.send(&ApiRequest::post("u", None)).is_ok());
        assert_eq!(mock.calls(), vec!["GET u", "POST u"]);
    }

    #[test]
    fn test_mock_fail() {
        let mock = MockTransport::new();
        mock.fail(Method::Post, "u", "connection refused");
        let err = mock.send(&ApiRequest::post("u", None)).unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_mock_clones_share_state() {
        let mock = MockTransport::new();
        let handle = mock.clone();
        mock.respond(Method::Get, "u", 200, "{}");
        handle.send(&ApiRequest::get("u")).unwrap();
        assert_eq!(mock.requests().len(), 1);
    }
}
