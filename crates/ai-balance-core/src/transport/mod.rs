//! HTTP transport seam.
//!
//! [`HttpClient`] is the only thing the fetch layer talks to. Production code
//! uses [`ProxyAwareHttpClient`]; tests inject their own implementation.

mod client;
mod resolver;
mod tunnel;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use reqwest::Url;
use serde_json::Value;

pub use client::ProxyAwareHttpClient;
pub use resolver::{order_candidates, Ipv4FirstResolver};

pub const USER_AGENT: &str = concat!("ai-balance/", env!("CARGO_PKG_VERSION"));

/// Request method. Anything outside the common set is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Custom(String),
}

impl HttpMethod {
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "GET" | "" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            _ => Self::Custom(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Custom(method) => method,
        }
    }

    /// GET and HEAD never carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Self::Get | Self::Head)
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP request envelope handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            timeout_ms: crate::config::DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Resolve the URL, append query pairs and encode the body.
    ///
    /// A `null` body is treated as no body.
    pub fn prepare(&self) -> Result<PreparedRequest, HttpError> {
        let mut url = Url::parse(&self.url).map_err(|error| {
            HttpError::new(
                HttpErrorKind::InvalidUrl,
                format!("invalid URL '{}': {error}", self.url),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::new(
                HttpErrorKind::InvalidUrl,
                format!("unsupported URL scheme '{}' in '{}'", url.scheme(), self.url),
            ));
        }
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(name, value)| (name.as_str(), value.as_str())));
        }

        let mut headers = self.headers.clone();
        let body = match (&self.body, self.method.allows_body()) {
            (Some(body), true) if !body.is_null() => Some(encode_body(body, &mut headers)),
            _ => None,
        };

        Ok(PreparedRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
        })
    }
}

/// Request ready for the wire: parsed URL, final headers, encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

/// Strings go out verbatim; anything else as JSON with a default content type.
fn encode_body(body: &Value, headers: &mut BTreeMap<String, String>) -> Vec<u8> {
    match body {
        Value::String(text) => text.clone().into_bytes(),
        other => {
            headers
                .entry(String::from("content-type"))
                .or_insert_with(|| String::from("application/json"));
            other.to_string().into_bytes()
        }
    }
}

/// Response envelope with the body already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub data: Value,
    pub headers: BTreeMap<String, String>,
}

impl HttpResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            status,
            data,
            headers: BTreeMap::new(),
        }
    }

    pub fn ok_json(data: Value) -> Self {
        Self::new(200, data)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Decode a response body: JSON when it parses, else the text, `null` when empty.
///
/// The declared content type is ignored: providers label JSON as `text/html`
/// or `text/plain`.
pub fn parse_body(bytes: &[u8]) -> Value {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
}

/// Transport failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    InvalidUrl,
    Dns,
    Connect,
    Timeout,
    ProxyConnect,
    Tls,
    Io,
    Protocol,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            HttpErrorKind::Timeout,
            format!("request timed out after {timeout_ms}ms"),
        )
    }

    pub fn io(context: &str, error: &std::io::Error) -> Self {
        Self::new(HttpErrorKind::Io, format!("{context}: {error}"))
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Protocol, message)
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport contract: perform one request, return status, decoded body and headers.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mislabeled_json_still_parses() {
        assert_eq!(parse_body(br#"{"a":1}"#), json!({ "a": 1 }));
        assert_eq!(parse_body(b"not json"), json!("not json"));
        assert_eq!(parse_body(b"  "), Value::Null);
    }

    #[test]
    fn prepare_appends_query_to_existing_query_string() {
        let prepared = HttpRequest::get("https://api.example.test/usage?team=a")
            .with_query("month", "2024-05")
            .with_query("tag", "x y")
            .prepare()
            .expect("valid request");

        assert_eq!(
            prepared.url.as_str(),
            "https://api.example.test/usage?team=a&month=2024-05&tag=x+y"
        );
    }

    #[test]
    fn json_body_gets_content_type_unless_set() {
        let prepared = HttpRequest::new(HttpMethod::Post, "https://x.test/")
            .with_body(json!({ "a": 1 }))
            .prepare()
            .expect("valid request");
        assert_eq!(prepared.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
        assert_eq!(
            prepared.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );

        let custom = HttpRequest::new(HttpMethod::Post, "https://x.test/")
            .with_header("Content-Type", "application/vnd.api+json")
            .with_body(json!([1]))
            .prepare()
            .expect("valid request");
        assert_eq!(
            custom.headers.get("content-type").map(String::as_str),
            Some("application/vnd.api+json")
        );
    }

    #[test]
    fn string_body_is_sent_verbatim_and_get_drops_body() {
        let post = HttpRequest::new(HttpMethod::Post, "https://x.test/")
            .with_body(json!("a=1&b=2"))
            .prepare()
            .expect("valid request");
        assert_eq!(post.body.as_deref(), Some(b"a=1&b=2".as_slice()));
        assert!(!post.headers.contains_key("content-type"));

        let get = HttpRequest::get("https://x.test/")
            .with_body(json!({ "ignored": true }))
            .prepare()
            .expect("valid request");
        assert_eq!(get.body, None);
    }

    #[test]
    fn invalid_or_unsupported_urls_are_rejected() {
        let error = HttpRequest::get("not a url").prepare().expect_err("invalid");
        assert_eq!(error.kind(), HttpErrorKind::InvalidUrl);

        let error = HttpRequest::get("ftp://x.test/file").prepare().expect_err("unsupported");
        assert_eq!(error.kind(), HttpErrorKind::InvalidUrl);
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!(HttpMethod::parse("post"), HttpMethod::Post);
        assert_eq!(HttpMethod::parse("PROPFIND"), HttpMethod::Custom(String::from("PROPFIND")));
        assert!(!HttpMethod::Head.allows_body());
        assert!(HttpMethod::Delete.allows_body());
    }
}
