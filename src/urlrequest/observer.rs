//! Lifecycle notifications for a request.
//!
//! For each hop, observers see `load_start`, `first_byte`,
//! `headers_received`, then `before_redirect` when the hop redirects, and
//! finally `load_end`. The two cancellable events carry a `return_value`
//! flag; an observer that clears it vetoes what comes next.

/// Payload of `headers_received`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersReceived {
    /// Response headers as a raw `name: value` block.
    pub value: String,
    /// Clear to stop processing the response; the request ends aborted.
    pub return_value: bool,
}

/// Payload of `before_redirect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeRedirect {
    /// Absolute URL the redirect points to.
    pub location: String,
    /// Clear to finalize the redirect response instead of following it.
    pub return_value: bool,
}

/// Receives request lifecycle events. Every method defaults to a no-op.
///
/// Callbacks run on the request task; they should return quickly.
pub trait RequestObserver: Send + Sync {
    fn on_load_start(&self) {}

    fn on_first_byte(&self) {}

    fn on_headers_received(&self, _event: &mut HeadersReceived) {}

    fn on_before_redirect(&self, _event: &mut BeforeRedirect) {}

    fn on_load_end(&self) {}
}
