//! Scripted transport for tests.
//!
//! Replies are queued per (method, path). Each call pops the next reply;
//! the last one stays in place and answers every further call. Requests to
//! unscripted routes get a 404.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{ApiRequest, BoxFuture, HttpMethod, RawResponse, Transport};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Status and JSON body.
    Json(u16, Value),
    /// Transport-level failure.
    Fail(TransportError),
    /// Wait, then answer with the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn ok(body: Value) -> Self {
        Self::Json(200, body)
    }

    /// Error status with a `{success: false}` body.
    pub fn status(code: u16) -> Self {
        Self::Json(code, json!({"success": false, "error": format!("HTTP {code}")}))
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self::Delay(delay, Box::new(self))
    }
}

type RouteKey = (HttpMethod, String);

/// Mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<RouteKey, VecDeque<MockReply>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reply to the route's queue.
    pub fn on(&self, method: HttpMethod, path: &str, reply: MockReply) -> &Self {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Replace the route's queue with a single reply.
    pub fn set(&self, method: HttpMethod, path: &str, reply: MockReply) -> &Self {
        self.routes
            .lock()
            .insert((method, path.to_string()), VecDeque::from([reply]));
        self
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: HttpMethod, path: &str) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|req| req.method == method && path_of(&req.url) == path)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: HttpMethod, path: &str) -> usize {
        self.calls_to(method, path).len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn next_reply(&self, request: &ApiRequest) -> Option<MockReply> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(&(request.method, path_of(&request.url)))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

/// URL path without scheme, host or query.
fn path_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => crate::transport::endpoint_of(url).to_string(),
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            self.calls.lock().push(request.clone());
            let mut reply = self
                .next_reply(&request)
                .unwrap_or_else(|| MockReply::status(404));
            loop {
                match reply {
                    MockReply::Delay(delay, inner) => {
                        tokio::time::sleep(delay).await;
                        reply = *inner;
                    }
                    MockReply::Json(status, body) => return Ok(RawResponse { status, body }),
                    MockReply::Fail(err) => return Err(err),
                }
            }
        })
    }
}
