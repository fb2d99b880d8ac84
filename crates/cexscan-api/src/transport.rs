//! Transport seam between the retry layer and the network.
//!
//! `Transport` performs exactly one HTTP exchange. Retries, timeouts and
//! cooldowns live in `RetryingHttpClient`, so tests swap the network for
//! `MockTransport` and keep every other layer real.

use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ApiError, ApiResult, TransportError};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Absolute URL including query string.
    pub url: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Error-tracking key: method plus the URL without its query string.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, endpoint_of(&self.url))
    }
}

/// URL without its query string.
pub fn endpoint_of(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Status and decoded body of one exchange.
///
/// An empty body is `Value::Null`. Error bodies that are not JSON arrive as
/// `Value::String`; a successful status with such a body never gets here.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Single HTTP exchange.
pub trait Transport: Send + Sync {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        (**self).execute(request)
    }
}

/// Arc wrapper for Transport trait objects.
pub type DynTransport = Arc<dyn Transport>;

/// Transport over reqwest.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> ApiResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("cexscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
                HttpMethod::Put => self.client.put(&request.url),
                HttpMethod::Delete => self.client.delete(&request.url),
            };
            let builder = match &request.body {
                Some(body) => builder.json(body),
                None => builder,
            };

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            debug!(method = %request.method, url = %request.url, status, "HTTP exchange complete");

            let body = decode_body(status, text)?;
            Ok(RawResponse { status, body })
        })
    }
}

/// Parse a response body. A 2xx body must be JSON so a truncated or proxied
/// page is retried instead of read as data.
fn decode_body(status: u16, text: String) -> Result<Value, TransportError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(e) if (200..300).contains(&status) => Err(TransportError::Decode(e.to_string())),
        Err(_) => Ok(Value::String(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_query() {
        let req = ApiRequest::get("https://api.example.com/pairs?user_id=42");
        assert_eq!(req.endpoint(), "GET https://api.example.com/pairs");
        let post = ApiRequest::new(HttpMethod::Post, "https://api.example.com/pairs?x=1");
        assert_ne!(post.endpoint(), req.endpoint());
        assert_eq!(endpoint_of("https://api.example.com/coins"), "https://api.example.com/coins");
    }

    #[test]
    fn test_status_classes() {
        let ok = RawResponse { status: 204, body: Value::Null };
        let server = RawResponse { status: 503, body: Value::Null };
        let client = RawResponse { status: 404, body: Value::Null };
        assert!(ok.is_success());
        assert!(server.is_server_error() && !server.is_success());
        assert!(!client.is_server_error() && !client.is_success());
    }

    #[test]
    fn test_decode_body_rejects_non_json_success() {
        assert_eq!(decode_body(200, "  ".into()).unwrap(), Value::Null);
        assert_eq!(
            decode_body(200, r#"{"success":true}"#.into()).unwrap(),
            serde_json::json!({"success": true})
        );
        assert!(matches!(
            decode_body(200, "<html>gateway</html>".into()),
            Err(TransportError::Decode(_))
        ));
        assert_eq!(
            decode_body(502, "Bad Gateway".into()).unwrap(),
            Value::String("Bad Gateway".into())
        );
    }
}
