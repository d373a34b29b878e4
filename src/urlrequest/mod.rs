//! High-level request API.
//!
//! - [`context`]: per-request options
//! - [`observer`]: lifecycle events and vetoes
//! - [`job`]: the [`RequestEngine`] that runs a request through its redirects
//! - [`log`]: the record a finished request produces

pub mod context;
pub mod job;
pub mod log;
pub mod observer;

pub use context::RequestOptions;
pub use job::{RequestEngine, RequestEngineBuilder, RequestResult};
pub use log::{RedirectRecord, RequestError, RequestLog, RequestSize, ResponseOutcome};
pub use observer::{BeforeRedirect, HeadersReceived, RequestObserver};
