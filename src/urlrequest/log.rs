//! The terminal record of a logical request.

use crate::base::neterror::NetError;
use crate::http::request::SentRequest;
use crate::http::response::{ErrorResponse, Response};
use crate::http::timing::Timing;
use thiserror::Error;
use url::Url;

/// One followed redirect.
///
/// `response` is the redirect response itself, with its body left as
/// received (not decoded).
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectRecord {
    /// Where the redirect pointed.
    pub url: Url,
    pub response: Response,
    pub timing: Timing,
    /// Hop start and end, milliseconds since the Unix epoch.
    pub start_time: f64,
    pub end_time: f64,
}

/// How the request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Response(Response),
    Error(ErrorResponse),
}

/// Byte counts of the last hop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestSize {
    /// Header block plus payload.
    pub request: u64,
    /// Raw body as received.
    pub response: u64,
}

/// Everything a finished request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLog {
    /// What was sent on the last hop.
    pub request: SentRequest,
    pub outcome: ResponseOutcome,
    /// Followed redirects, in hop order.
    pub redirects: Vec<RedirectRecord>,
    pub size: RequestSize,
}

impl RequestLog {
    pub fn response(&self) -> Option<&Response> {
        match &self.outcome {
            ResponseOutcome::Response(r) => Some(r),
            ResponseOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorResponse> {
        match &self.outcome {
            ResponseOutcome::Error(e) => Some(e),
            ResponseOutcome::Response(_) => None,
        }
    }
}

/// A request that ended in an error.
///
/// `log` still describes what happened, including any status, headers and
/// payload received before the failure.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message} ({code})")]
pub struct RequestError {
    pub error: NetError,
    pub code: i32,
    pub message: String,
    pub log: Box<RequestLog>,
}

impl RequestError {
    pub fn new(
        response: ErrorResponse,
        request: SentRequest,
        redirects: Vec<RedirectRecord>,
        size: RequestSize,
    ) -> Self {
        Self {
            error: response.error.clone(),
            code: response.code,
            message: response.message.clone(),
            log: Box::new(RequestLog {
                request,
                outcome: ResponseOutcome::Error(response),
                redirects,
                size,
            }),
        }
    }

    pub fn is_abort(&self) -> bool {
        self.error.is_abort()
    }

    /// Partial data captured before the failure.
    pub fn partial(&self) -> Option<&ErrorResponse> {
        self.log.error()
    }
}
