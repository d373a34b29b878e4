//! Response records.
//!
//! [`ResponseHead`] is what a transport reports when headers arrive,
//! [`CurrentResponse`] accumulates one hop, and [`Response`] /
//! [`ErrorResponse`] are the finalized, immutable forms handed to callers.

use crate::base::neterror::NetError;
use crate::http::auth::AuthState;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::timing::Timing;
use bytes::Bytes;

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub status_text: String,
    pub headers: OrderedHeaderMap,
}

/// Hop-scoped response under construction.
#[derive(Debug, Clone, Default)]
pub struct CurrentResponse {
    pub status: Option<u16>,
    pub status_text: String,
    pub headers: OrderedHeaderMap,
    pub body: Option<Bytes>,
}

impl CurrentResponse {
    pub fn set_head(&mut self, head: ResponseHead) {
        self.status = Some(head.status);
        self.status_text = head.status_text;
        self.headers = head.headers;
    }

    /// Nothing has been received for this hop yet.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.headers.is_empty() && self.body.is_none()
    }

    pub fn raw_body(&self) -> Bytes {
        self.body.clone().unwrap_or_default()
    }
}

/// A finalized response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: OrderedHeaderMap,
    /// Decoded body.
    pub payload: Bytes,
    pub timing: Timing,
    /// Sum of the measured timing phases, in milliseconds.
    pub load_time: f64,
    /// Challenge details when the status is `401`.
    pub auth: Option<AuthState>,
}

impl Response {
    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.payload.to_vec()).map_err(|_| NetError::InvalidResponse)
    }

    /// Body deserialized from JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.payload).map_err(|_| NetError::InvalidResponse)
    }
}

/// A request that ended in an error, with whatever response data had
/// already been received.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: NetError,
    pub code: i32,
    pub message: String,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Option<OrderedHeaderMap>,
    pub payload: Option<Bytes>,
}

impl ErrorResponse {
    /// Build from an error. Without an explicit message the error's own
    /// text is used, which keeps host and resolver details when the variant
    /// carries them and falls back to the per-code message otherwise.
    pub fn new(error: NetError, message: Option<String>) -> Self {
        let code = error.as_i32();
        let message = message.unwrap_or_else(|| error.to_string());
        Self {
            error,
            code,
            message,
            status: None,
            status_text: None,
            headers: None,
            payload: None,
        }
    }

    /// Attach partial data from the hop that failed.
    pub fn with_partial(mut self, current: &CurrentResponse) -> Self {
        if current.is_empty() {
            return self;
        }
        self.status = current.status;
        if current.status.is_some() {
            self.status_text = Some(current.status_text.clone());
            self.headers = Some(current.headers.clone());
        }
        self.payload = current.body.clone();
        self
    }
}
