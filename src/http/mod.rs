//! HTTP-level building blocks: headers, request/response records, content
//! decoding, timing, redirect and auth decisions.

pub mod auth;
pub mod decoder;
pub mod hostrules;
pub mod orderedheaders;
pub mod redirect;
pub mod request;
pub mod response;
pub mod timing;

// Re-exports for convenience
pub use auth::{AuthMethod, AuthState};
pub use orderedheaders::OrderedHeaderMap;
pub use redirect::RedirectResolver;
pub use request::{Request, SentRequest};
pub use response::{ErrorResponse, Response, ResponseHead};
pub use timing::{RequestStats, Timing};
