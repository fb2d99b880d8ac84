//! HTTP layer for the cexscan backend.
//!
//! ```text
//! ApiClient (typed endpoints, envelope checks, wire normalization)
//!     │
//!     ▼
//! RetryingHttpClient (timeout, backoff + jitter, per-endpoint cooldown)
//!     │
//!     ▼
//! Transport (ReqwestTransport in production, MockTransport in tests)
//! ```

pub mod client;
pub mod error;
pub mod mock;
pub mod retry;
pub mod transport;

pub use client::{ApiClient, PairsResponse, SettingsWriteOutcome, UserRecord};
pub use error::{ApiError, ApiResult, TransportError};
pub use mock::{MockReply, MockTransport};
pub use retry::{EndpointErrorState, RetryConfig, RetryingHttpClient};
pub use transport::{
    ApiRequest, BoxFuture, DynTransport, HttpMethod, RawResponse, ReqwestTransport, Transport,
};
