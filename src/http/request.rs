//! Request descriptions.

use crate::http::orderedheaders::OrderedHeaderMap;
use bytes::Bytes;
use http::Method;
use url::Url;

/// What the caller wants sent: the logical request.
///
/// Headers are a raw `name: value` block, exactly as an API client editor
/// holds them. The URL stays a string because host rewrite rules operate on
/// it before it is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: String,
    pub payload: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: String::new(),
            payload: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn headers(mut self, raw: impl Into<String>) -> Self {
        self.headers = raw.into();
        self
    }

    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// What was actually transmitted for one hop.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method: Method,
    pub url: Url,
    pub headers: OrderedHeaderMap,
    pub payload: Option<Bytes>,
    /// Hop start, milliseconds since the Unix epoch.
    pub start_time: f64,
}

impl SentRequest {
    /// Bytes on the wire for the header block plus payload.
    pub fn size(&self) -> u64 {
        let head = self.headers.to_raw().len() as u64;
        let body = self.payload.as_ref().map(|p| p.len() as u64).unwrap_or(0);
        head + body
    }
}
