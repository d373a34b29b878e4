//! The request engine.
//!
//! A [`RequestEngine`] owns one logical request. `send()` drives hops
//! through the configured [`TransportConnector`] until a response is final
//! or something fails, following redirects in between:
//!
//! ```text
//! Idle -> Sending -> AwaitingResponse -> Redirecting -> Sending ...
//!                                     \-> Finalizing -> Completed
//! (any non-terminal state) -> Errored | Aborted
//! ```
//!
//! The engine task runs once. Every `send()` awaits the same shared result,
//! and the terminal state transition is the single point where the result is
//! sealed, so an `abort()` racing a finishing hop yields exactly one outcome.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::cookies::bridge::CookieBridge;
use crate::cookies::parser::{CookieParser, RfcCookieParser};
use crate::http::auth::AuthState;
use crate::http::decoder::decompress;
use crate::http::hostrules::{apply_host_rules, HostRule};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::redirect::RedirectResolver;
use crate::http::request::{Request, SentRequest};
use crate::http::response::{CurrentResponse, ErrorResponse, Response};
use crate::http::timing::{now_ms, Checkpoint, RequestStats, Timing};
use crate::socket::client::HttpTransport;
use crate::socket::transport::{ActiveConnection, HopRequest, TransportConnector, TransportEvent};
use crate::urlrequest::context::RequestOptions;
use crate::urlrequest::log::{RedirectRecord, RequestError, RequestLog, RequestSize, ResponseOutcome};
use crate::urlrequest::observer::{BeforeRedirect, HeadersReceived, RequestObserver};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

pub type RequestResult = Result<RequestLog, RequestError>;

type SharedResult = Shared<BoxFuture<'static, RequestResult>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply host rules, then parse. Failing here is a configuration error.
fn effective_url(raw: &str, rules: &[HostRule]) -> Result<Url, NetError> {
    let rewritten = apply_host_rules(raw, rules);
    let url = Url::parse(&rewritten).map_err(|e| {
        tracing::debug!(url = %rewritten, error = %e, "invalid request url");
        NetError::InvalidUrl
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(NetError::DisallowedUrlScheme),
    }
}

/// Hop-scoped state. A new one is made for every hop, never reset in place.
#[derive(Debug)]
struct Hop {
    response: CurrentResponse,
    stats: RequestStats,
}

impl Hop {
    fn start(at: f64) -> Self {
        Self {
            response: CurrentResponse::default(),
            stats: RequestStats::started_at(at),
        }
    }

    fn raw_size(&self) -> u64 {
        self.response.body.as_ref().map(|b| b.len() as u64).unwrap_or(0)
    }
}

/// Builder for [`RequestEngine`].
pub struct RequestEngineBuilder {
    request: Request,
    options: RequestOptions,
    transport: Option<Arc<dyn TransportConnector>>,
    cookie_parser: Arc<dyn CookieParser>,
    observers: Vec<Arc<dyn RequestObserver>>,
}

impl RequestEngineBuilder {
    /// Use `transport` instead of the default HTTP/1.1 transport.
    pub fn transport(mut self, transport: Arc<dyn TransportConnector>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cookie_parser(mut self, parser: Arc<dyn CookieParser>) -> Self {
        self.cookie_parser = parser;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Validate the request and options.
    ///
    /// Fails on an unparsable URL (after host rules), a malformed header
    /// block or an unusable proxy address.
    pub fn build(self) -> Result<RequestEngine, NetError> {
        let mut headers = OrderedHeaderMap::parse(&self.request.headers)?;
        if self.options.default_headers {
            if !headers.contains("user-agent") {
                headers.insert("user-agent", self.options.user_agent())?;
            }
            if !headers.contains("accept") {
                headers.insert("accept", self.options.accept())?;
            }
        }

        let initial_url = effective_url(&self.request.url, &self.options.hosts)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                self.options.proxy_settings()?,
                self.options.tls_options(),
            )),
        };

        let cancel = self
            .options
            .cancellation
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();

        Ok(RequestEngine {
            inner: Arc::new(EngineInner {
                request: self.request,
                headers,
                initial_url,
                options: self.options,
                transport,
                cookie_parser: self.cookie_parser,
                observers: Mutex::new(self.observers),
                state: Mutex::new(LoadState::Idle),
                cancel,
                result: OnceLock::new(),
            }),
        })
    }
}

/// Executes one logical request: the original hop plus any redirects.
///
/// Cloning yields another handle to the same request. An engine is single
/// use; build a new one for the next request.
#[derive(Clone)]
pub struct RequestEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    /// Working copy of the caller's request.
    request: Request,
    /// Request headers with defaults applied.
    headers: OrderedHeaderMap,
    initial_url: Url,
    options: RequestOptions,
    transport: Arc<dyn TransportConnector>,
    cookie_parser: Arc<dyn CookieParser>,
    observers: Mutex<Vec<Arc<dyn RequestObserver>>>,
    state: Mutex<LoadState>,
    cancel: CancellationToken,
    result: OnceLock<SharedResult>,
}

impl RequestEngine {
    pub fn builder(request: Request, options: RequestOptions) -> RequestEngineBuilder {
        RequestEngineBuilder {
            request,
            options,
            transport: None,
            cookie_parser: Arc::new(RfcCookieParser),
            observers: Vec::new(),
        }
    }

    /// Engine on the default HTTP/1.1 transport.
    pub fn new(request: Request, options: RequestOptions) -> Result<Self, NetError> {
        Self::builder(request, options).build()
    }

    pub fn with_transport(
        request: Request,
        options: RequestOptions,
        transport: Arc<dyn TransportConnector>,
    ) -> Result<Self, NetError> {
        Self::builder(request, options).transport(transport).build()
    }

    /// Register an observer for the hops that have not started yet.
    pub fn add_observer(&self, observer: Arc<dyn RequestObserver>) {
        lock(&self.inner.observers).push(observer);
    }

    pub fn state(&self) -> LoadState {
        *lock(&self.inner.state)
    }

    pub fn options(&self) -> &RequestOptions {
        &self.inner.options
    }

    /// The URL of the first hop, host rules applied.
    pub fn url(&self) -> &Url {
        &self.inner.initial_url
    }

    /// Run the request to completion.
    ///
    /// The first call starts the request; later and concurrent calls wait
    /// for, and return, the same result.
    pub async fn send(&self) -> RequestResult {
        let handle = self
            .inner
            .result
            .get_or_init(|| {
                let task = tokio::spawn(Arc::clone(&self.inner).run());
                let fallback = self.inner.initial_request();
                async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::warn!(error = %e, "request task ended abnormally");
                            Err(RequestError::new(
                                ErrorResponse::new(NetError::Failed, Some(e.to_string())),
                                fallback,
                                Vec::new(),
                                RequestSize::default(),
                            ))
                        }
                    }
                }
                .boxed()
                .shared()
            })
            .clone();
        handle.await
    }

    /// Cancel the request.
    ///
    /// Tears down the connection of the hop in flight and settles `send()`
    /// with an abort error. Calling it again, before `send()`, or after the
    /// request finished does nothing more.
    pub fn abort(&self) {
        {
            let mut state = lock(&self.inner.state);
            if state.is_terminal() {
                return;
            }
            *state = LoadState::Aborted;
        }
        tracing::debug!(url = %self.inner.initial_url, "abort requested");
        self.inner.cancel.cancel();
    }
}

impl EngineInner {
    async fn run(self: Arc<Self>) -> RequestResult {
        let span = tracing::debug_span!(
            "request",
            method = %self.request.method,
            url = %self.request.url
        );
        let result = self.drive().instrument(span).await;
        // Terminal: observers are not needed any more.
        lock(&self.observers).clear();
        result
    }

    async fn drive(&self) -> RequestResult {
        let mut method = self.request.method.clone();
        let mut target = self.request.url.clone();
        let mut headers = self.headers.clone();
        let mut payload = self.request.payload.clone();
        let mut redirects: Vec<RedirectRecord> = Vec::new();

        loop {
            let start = now_ms();
            let url = match effective_url(&target, &self.options.hosts) {
                Ok(url) => url,
                Err(e) => {
                    let url = redirects
                        .last()
                        .map(|r| r.url.clone())
                        .unwrap_or_else(|| self.initial_url.clone());
                    let sent = SentRequest {
                        method,
                        url,
                        headers,
                        payload,
                        start_time: start,
                    };
                    return Err(self.fail(e, sent, &Hop::start(start), redirects));
                }
            };
            let sent = SentRequest {
                method: method.clone(),
                url,
                headers: headers.clone(),
                payload: payload.clone(),
                start_time: start,
            };
            let mut hop = Hop::start(start);

            if let Err(e) = self.advance(LoadState::Sending) {
                return Err(self.fail(e, sent, &hop, redirects));
            }
            tracing::debug!(hop = redirects.len(), method = %sent.method, url = %sent.url, "hop start");
            self.notify(|o| o.on_load_start());

            if let Err(e) = self.exchange(&sent, &mut hop).await {
                return Err(self.end_hop_with_error(e, sent, &hop, redirects));
            }

            let Some(status) = hop.response.status else {
                return Err(self.end_hop_with_error(NetError::InvalidResponse, sent, &hop, redirects));
            };

            if !self.options.follow_redirects || !RedirectResolver::is_redirect_status(status) {
                return self.finalize(sent, hop, redirects);
            }

            let location = hop.response.headers.get_str("location");
            let next = match RedirectResolver::resolve(status, &sent.method, &sent.url, location) {
                Ok(next) => next,
                Err(e) => {
                    tracing::debug!(status, location = ?location, "unusable redirect location");
                    return Err(self.end_hop_with_error(e, sent, &hop, redirects));
                }
            };
            if RedirectResolver::is_loop(&next.url, redirects.iter().map(|r| &r.url)) {
                tracing::debug!(url = %next.url, "redirect loop");
                return Err(self.end_hop_with_error(NetError::TooManyRedirects, sent, &hop, redirects));
            }
            if redirects.len() >= self.options.max_redirects as usize {
                tracing::debug!(limit = self.options.max_redirects, "redirect limit reached");
                return Err(self.end_hop_with_error(NetError::TooManyRedirects, sent, &hop, redirects));
            }
            if let Err(e) = self.advance(LoadState::Redirecting) {
                return Err(self.end_hop_with_error(e, sent, &hop, redirects));
            }

            let mut event = BeforeRedirect {
                location: next.url.to_string(),
                return_value: true,
            };
            self.notify(|o| o.on_before_redirect(&mut event));
            if !event.return_value {
                tracing::debug!(location = %next.url, "redirect vetoed by observer");
                return self.finalize(sent, hop, redirects);
            }

            let mut next_headers = sent.headers.clone();
            if next.drop_body {
                next_headers.remove("content-type");
                next_headers.remove("content-length");
                payload = None;
            }
            let bridge = CookieBridge::new(self.cookie_parser.as_ref());
            if let Err(e) =
                bridge.carry_over(&hop.response.headers, &sent.url, &next.url, &mut next_headers)
            {
                return Err(self.end_hop_with_error(e, sent, &hop, redirects));
            }

            let timing = Timing::from_stats(&hop.stats);
            redirects.push(RedirectRecord {
                url: next.url.clone(),
                response: Response {
                    status,
                    status_text: hop.response.status_text.clone(),
                    headers: hop.response.headers.clone(),
                    payload: hop.response.raw_body(),
                    timing,
                    load_time: timing.total(),
                    auth: None,
                },
                timing,
                start_time: sent.start_time,
                end_time: now_ms(),
            });
            tracing::debug!(status, method = %next.method, location = %next.url, "following redirect");
            self.notify(|o| o.on_load_end());

            method = next.method;
            target = next.url.to_string();
            headers = next_headers;

            // Next hop starts on a fresh turn of the scheduler.
            tokio::task::yield_now().await;
        }
    }

    /// Perform the exchange of one hop, bounded by the timeout and the
    /// cancellation token. The hop's connection is destroyed on return.
    async fn exchange(&self, sent: &SentRequest, hop: &mut Hop) -> Result<(), NetError> {
        let exchange = self.await_response(sent, hop);
        let bounded = async {
            match self.options.timeout_duration() {
                Some(limit) => tokio::time::timeout(limit, exchange)
                    .await
                    .unwrap_or(Err(NetError::TimedOut)),
                None => exchange.await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NetError::Aborted),
            result = bounded => result,
        }
    }

    async fn await_response(&self, sent: &SentRequest, hop: &mut Hop) -> Result<(), NetError> {
        let mut connection = ActiveConnection::open(
            self.transport.as_ref(),
            HopRequest {
                method: sent.method.clone(),
                url: sent.url.clone(),
                headers: sent.headers.clone(),
                payload: sent.payload.clone(),
            },
        );
        self.advance(LoadState::AwaitingResponse)?;

        loop {
            let Some(event) = connection.next_event().await else {
                return Err(if hop.response.status.is_some() {
                    NetError::ConnectionClosed
                } else {
                    NetError::EmptyResponse
                });
            };
            match event {
                TransportEvent::Checkpoint(Checkpoint::FirstByte, at) => self.first_byte(hop, at),
                TransportEvent::Checkpoint(checkpoint, at) => hop.stats.record(checkpoint, at),
                TransportEvent::Headers(head) => {
                    self.first_byte(hop, now_ms());
                    hop.response.set_head(head);
                    let mut event = HeadersReceived {
                        value: hop.response.headers.to_raw(),
                        return_value: true,
                    };
                    self.notify(|o| o.on_headers_received(&mut event));
                    if !event.return_value {
                        tracing::debug!("response vetoed by observer");
                        return Err(NetError::Aborted);
                    }
                }
                TransportEvent::Complete(body) => {
                    if hop.stats.last_received_time.is_none() {
                        hop.stats.record(Checkpoint::LastByte, now_ms());
                    }
                    hop.response.body = Some(body);
                    connection.destroy();
                    return Ok(());
                }
                TransportEvent::Failed(e) => return Err(e),
            }
        }
    }

    fn first_byte(&self, hop: &mut Hop, at: f64) {
        if hop.stats.first_receive_time.is_none() {
            hop.stats.record(Checkpoint::FirstByte, at);
            self.notify(|o| o.on_first_byte());
        }
    }

    /// Decode and seal the response of the last hop.
    fn finalize(&self, sent: SentRequest, hop: Hop, redirects: Vec<RedirectRecord>) -> RequestResult {
        if let Err(e) = self.advance(LoadState::Finalizing) {
            return Err(self.end_hop_with_error(e, sent, &hop, redirects));
        }
        let Some(status) = hop.response.status else {
            return Err(self.end_hop_with_error(NetError::InvalidResponse, sent, &hop, redirects));
        };

        let raw = hop.response.raw_body();
        let payload = match decompress(&raw, &hop.response.headers) {
            Ok(payload) => payload,
            Err(e) => return Err(self.end_hop_with_error(e, sent, &hop, redirects)),
        };

        let timing = Timing::from_stats(&hop.stats);
        let auth = if status == 401 {
            AuthState::from_headers(&hop.response.headers)
        } else {
            None
        };
        let size = RequestSize {
            request: sent.size(),
            response: raw.len() as u64,
        };

        if let Err(e) = self.advance(LoadState::Completed) {
            return Err(self.end_hop_with_error(e, sent, &hop, redirects));
        }
        tracing::debug!(status, redirects = redirects.len(), "request completed");
        self.notify(|o| o.on_load_end());

        Ok(RequestLog {
            request: sent,
            outcome: ResponseOutcome::Response(Response {
                status,
                status_text: hop.response.status_text,
                headers: hop.response.headers,
                payload,
                timing,
                load_time: timing.total(),
                auth,
            }),
            redirects,
            size,
        })
    }

    fn end_hop_with_error(
        &self,
        error: NetError,
        sent: SentRequest,
        hop: &Hop,
        redirects: Vec<RedirectRecord>,
    ) -> RequestError {
        let error = self.fail(error, sent, hop, redirects);
        self.notify(|o| o.on_load_end());
        error
    }

    /// Seal the request as failed. An abort that raced the failure wins.
    fn fail(
        &self,
        error: NetError,
        sent: SentRequest,
        hop: &Hop,
        redirects: Vec<RedirectRecord>,
    ) -> RequestError {
        let terminal = if error.is_abort() {
            LoadState::Aborted
        } else {
            LoadState::Errored
        };
        let error = match self.advance(terminal) {
            Ok(()) => error,
            Err(aborted) => aborted,
        };

        if error.is_abort() {
            tracing::debug!(url = %sent.url, "request aborted");
        } else {
            tracing::debug!(url = %sent.url, code = error.as_i32(), error = %error, "request failed");
        }

        let size = RequestSize {
            request: sent.size(),
            response: hop.raw_size(),
        };
        RequestError::new(
            ErrorResponse::new(error, None).with_partial(&hop.response),
            sent,
            redirects,
            size,
        )
    }

    /// Move to `next`. Fails with an abort error once the request was
    /// aborted from outside.
    fn advance(&self, next: LoadState) -> Result<(), NetError> {
        let mut state = lock(&self.state);
        if state.is_terminal() {
            return Err(NetError::Aborted);
        }
        if !state.can_transition_to(next) {
            tracing::warn!(from = ?*state, to = ?next, "unexpected state transition");
        }
        *state = next;
        Ok(())
    }

    fn notify(&self, mut f: impl FnMut(&dyn RequestObserver)) {
        let observers = lock(&self.observers).clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    fn initial_request(&self) -> SentRequest {
        SentRequest {
            method: self.request.method.clone(),
            url: self.initial_url.clone(),
            headers: self.headers.clone(),
            payload: self.request.payload.clone(),
            start_time: now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::ResponseHead;
    use crate::socket::transport::EventSink;
    use bytes::Bytes;
    use http::Method;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Canned responses keyed by URL path.
    #[derive(Default)]
    struct Canned {
        routes: HashMap<String, (u16, Vec<(&'static str, &'static str)>, &'static [u8])>,
        hits: AtomicUsize,
        seen: Mutex<Vec<HopRequest>>,
    }

    impl Canned {
        fn route(
            mut self,
            path: &str,
            status: u16,
            headers: &[(&'static str, &'static str)],
            body: &'static [u8],
        ) -> Self {
            self.routes
                .insert(path.to_string(), (status, headers.to_vec(), body));
            self
        }

        fn seen(&self) -> Vec<HopRequest> {
            lock(&self.seen).clone()
        }
    }

    impl TransportConnector for Canned {
        fn exchange(&self, hop: HopRequest, events: EventSink) -> BoxFuture<'static, ()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let route = self.routes.get(hop.url.path()).cloned();
            lock(&self.seen).push(hop);
            Box::pin(async move {
                let Some((status, headers, body)) = route else {
                    events.fail(NetError::ConnectionRefused);
                    return;
                };
                events.checkpoint(Checkpoint::ConnectionStart);
                events.checkpoint(Checkpoint::Connected);
                events.checkpoint(Checkpoint::Sent);
                events.checkpoint(Checkpoint::FirstByte);
                let mut map = OrderedHeaderMap::new();
                for (name, value) in headers {
                    map.append(name, value).unwrap();
                }
                events.headers(ResponseHead {
                    status,
                    status_text: String::new(),
                    headers: map,
                });
                events.complete(Bytes::from_static(body));
            })
        }
    }

    struct Stalled;

    impl TransportConnector for Stalled {
        fn exchange(&self, _hop: HopRequest, _events: EventSink) -> BoxFuture<'static, ()> {
            Box::pin(tokio::time::sleep(Duration::from_secs(60)))
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        veto_headers: bool,
        veto_redirect: bool,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            lock(&self.events).clone()
        }

        fn push(&self, event: impl Into<String>) {
            lock(&self.events).push(event.into());
        }
    }

    impl RequestObserver for Recorder {
        fn on_load_start(&self) {
            self.push("loadstart");
        }

        fn on_first_byte(&self) {
            self.push("firstbyte");
        }

        fn on_headers_received(&self, event: &mut HeadersReceived) {
            self.push("headersreceived");
            if self.veto_headers {
                event.return_value = false;
            }
        }

        fn on_before_redirect(&self, event: &mut BeforeRedirect) {
            self.push(format!("beforeredirect {}", event.location));
            if self.veto_redirect {
                event.return_value = false;
            }
        }

        fn on_load_end(&self) {
            self.push("loadend");
        }
    }

    fn engine(request: Request, options: RequestOptions, transport: Arc<Canned>) -> RequestEngine {
        RequestEngine::with_transport(request, options, transport).unwrap()
    }

    #[tokio::test]
    async fn test_event_order_across_redirect() {
        let transport = Arc::new(
            Canned::default()
                .route("/start", 302, &[("location", "/next")], b"")
                .route("/next", 200, &[], b"done"),
        );
        let recorder = Arc::new(Recorder::default());
        let engine = engine(
            Request::get("http://api.test/start"),
            RequestOptions::default(),
            transport,
        );
        engine.add_observer(recorder.clone());

        let log = engine.send().await.unwrap();
        assert_eq!(log.redirects.len(), 1);
        assert_eq!(engine.state(), LoadState::Completed);
        assert_eq!(
            recorder.events(),
            vec![
                "loadstart",
                "firstbyte",
                "headersreceived",
                "beforeredirect http://api.test/next",
                "loadend",
                "loadstart",
                "firstbyte",
                "headersreceived",
                "loadend",
            ]
        );
    }

    #[tokio::test]
    async fn test_send_is_idempotent() {
        let transport = Arc::new(Canned::default().route("/", 200, &[], b"ok"));
        let engine = engine(
            Request::get("http://api.test/"),
            RequestOptions::default(),
            transport.clone(),
        );

        let (a, b) = tokio::join!(engine.send(), engine.send());
        let c = engine.send().await;
        assert_eq!(transport.hits.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
    }

    #[tokio::test]
    async fn test_redirect_veto_finalizes_redirect_response() {
        let transport = Arc::new(
            Canned::default()
                .route("/start", 301, &[("location", "/next")], b"moved")
                .route("/next", 200, &[], b"done"),
        );
        let recorder = Arc::new(Recorder {
            veto_redirect: true,
            ..Recorder::default()
        });
        let engine = RequestEngine::builder(Request::get("http://api.test/start"), RequestOptions::default())
            .transport(transport.clone())
            .observer(recorder)
            .build()
            .unwrap();

        let log = engine.send().await.unwrap();
        assert!(log.redirects.is_empty());
        assert_eq!(log.response().unwrap().status, 301);
        assert_eq!(log.response().unwrap().payload, Bytes::from_static(b"moved"));
        assert_eq!(transport.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_headers_veto_aborts() {
        let transport = Arc::new(Canned::default().route("/", 200, &[], b"ok"));
        let recorder = Arc::new(Recorder {
            veto_headers: true,
            ..Recorder::default()
        });
        let engine = engine(Request::get("http://api.test/"), RequestOptions::default(), transport);
        engine.add_observer(recorder.clone());

        let err = engine.send().await.unwrap_err();
        assert!(err.is_abort());
        assert_eq!(err.code, -3);
        assert_eq!(engine.state(), LoadState::Aborted);
        // Headers were in before the veto.
        assert_eq!(err.partial().unwrap().status, Some(200));
        assert_eq!(recorder.events().last().map(String::as_str), Some("loadend"));
    }

    #[tokio::test]
    async fn test_missing_location_keeps_partial_response() {
        let transport = Arc::new(Canned::default().route("/", 302, &[("x-trace", "1")], b""));
        let engine = engine(Request::get("http://api.test/"), RequestOptions::default(), transport);

        let err = engine.send().await.unwrap_err();
        assert_eq!(err.error, NetError::InvalidRedirect);
        assert_eq!(err.message, "Invalid redirect");
        let partial = err.partial().unwrap();
        assert_eq!(partial.status, Some(302));
        assert_eq!(partial.headers.as_ref().unwrap().get_str("x-trace"), Some("1"));
        assert_eq!(engine.state(), LoadState::Errored);
    }

    #[tokio::test]
    async fn test_redirect_loop_detected() {
        let transport = Arc::new(
            Canned::default()
                .route("/a", 302, &[("location", "/b")], b"")
                .route("/b", 302, &[("location", "/a")], b""),
        );
        let engine = engine(Request::get("http://api.test/a"), RequestOptions::default(), transport.clone());

        let err = engine.send().await.unwrap_err();
        assert_eq!(err.code, -310);
        // /a -> /b -> /a -> /b: the second /b is the repeat.
        assert_eq!(err.log.redirects.len(), 2);
        assert_eq!(transport.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let transport = Arc::new(
            Canned::default()
                .route("/1", 302, &[("location", "/2")], b"")
                .route("/2", 302, &[("location", "/3")], b"")
                .route("/3", 302, &[("location", "/4")], b"")
                .route("/4", 200, &[], b""),
        );
        let options = RequestOptions::default().max_redirects(2);
        let engine = engine(Request::get("http://api.test/1"), options, transport);

        let err = engine.send().await.unwrap_err();
        assert_eq!(err.error, NetError::TooManyRedirects);
        assert_eq!(err.log.redirects.len(), 2);
    }

    #[tokio::test]
    async fn test_303_downgrades_post() {
        let transport = Arc::new(
            Canned::default()
                .route("/form", 303, &[("location", "/result")], b"")
                .route("/result", 200, &[], b""),
        );
        let request = Request::post("http://api.test/form")
            .headers("content-type: application/json\nx-keep: 1")
            .payload(&b"{\"a\":1}"[..]);
        let engine = engine(request, RequestOptions::default(), transport.clone());

        let log = engine.send().await.unwrap();
        assert_eq!(log.request.method, Method::GET);
        assert!(log.request.payload.is_none());

        let seen = transport.seen();
        assert_eq!(seen[1].method, Method::GET);
        assert!(seen[1].headers.get("content-type").is_none());
        assert_eq!(seen[1].headers.get_str("x-keep"), Some("1"));
    }

    #[tokio::test]
    async fn test_307_keeps_method_and_body() {
        let transport = Arc::new(
            Canned::default()
                .route("/upload", 307, &[("location", "/upload2")], b"")
                .route("/upload2", 201, &[], b""),
        );
        let request = Request::new(Method::PUT, "http://api.test/upload").payload("data");
        let engine = engine(request, RequestOptions::default(), transport.clone());

        let log = engine.send().await.unwrap();
        assert_eq!(log.response().unwrap().status, 201);
        let seen = transport.seen();
        assert_eq!(seen[1].method, Method::PUT);
        assert_eq!(seen[1].payload.as_deref(), Some(&b"data"[..]));
    }

    #[tokio::test]
    async fn test_redirect_record_keeps_raw_body() {
        let transport = Arc::new(
            Canned::default()
                .route("/", 302, &[("location", "/gz"), ("content-encoding", "gzip")], b"not gzip")
                .route("/gz", 200, &[], b"fine"),
        );
        let engine = engine(Request::get("http://api.test/"), RequestOptions::default(), transport);

        let log = engine.send().await.unwrap();
        let record = &log.redirects[0];
        assert_eq!(record.url.as_str(), "http://api.test/gz");
        assert_eq!(record.response.status, 302);
        assert_eq!(record.response.payload, Bytes::from_static(b"not gzip"));
        assert!(record.end_time >= record.start_time);
        assert_eq!(record.timing.blocked, 0.0);
    }

    #[tokio::test]
    async fn test_decode_failure_is_an_error() {
        let transport = Arc::new(Canned::default().route(
            "/",
            200,
            &[("content-encoding", "gzip")],
            b"definitely not gzip",
        ));
        let engine = engine(Request::get("http://api.test/"), RequestOptions::default(), transport);

        let err = engine.send().await.unwrap_err();
        assert_eq!(err.error, NetError::ContentDecodingFailed);
        assert_eq!(
            err.partial().unwrap().payload.as_deref(),
            Some(&b"definitely not gzip"[..])
        );
    }

    #[tokio::test]
    async fn test_follow_redirects_disabled() {
        let transport = Arc::new(Canned::default().route("/", 302, &[("location", "/next")], b""));
        let options = RequestOptions::default().follow_redirects(false);
        let engine = engine(Request::get("http://api.test/"), options, transport.clone());

        let log = engine.send().await.unwrap();
        assert!(log.redirects.is_empty());
        assert_eq!(log.response().unwrap().status, 302);
        assert_eq!(transport.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_carries_auth_state() {
        let transport = Arc::new(Canned::default().route(
            "/",
            401,
            &[("www-authenticate", "Basic realm=\"api\"")],
            b"",
        ));
        let engine = engine(Request::get("http://api.test/"), RequestOptions::default(), transport);

        let log = engine.send().await.unwrap();
        let auth = log.response().unwrap().auth.clone().unwrap();
        assert_eq!(auth.method, crate::http::auth::AuthMethod::Basic);
        assert_eq!(auth.realm.as_deref(), Some("api"));
    }

    #[tokio::test]
    async fn test_default_headers() {
        let transport = Arc::new(Canned::default().route("/", 200, &[], b""));
        let options = RequestOptions::default().default_headers(true);
        let request = Request::get("http://api.test/").headers("Accept: application/json");
        let engine = engine(request, options, transport.clone());

        engine.send().await.unwrap();
        let seen = transport.seen();
        assert_eq!(seen[0].headers.get_str("user-agent"), Some("api client"));
        assert_eq!(seen[0].headers.get_str("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_host_rules_applied() {
        let transport = Arc::new(Canned::default().route("/v1", 200, &[], b""));
        let options =
            RequestOptions::default().host_rule(HostRule::new("api.example.com", "127.0.0.1:9"));
        let engine = engine(Request::get("http://api.example.com/v1"), options, transport.clone());

        let log = engine.send().await.unwrap();
        assert_eq!(log.request.url.as_str(), "http://127.0.0.1:9/v1");
        assert_eq!(transport.seen()[0].url.host_str(), Some("127.0.0.1"));
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = RequestEngine::with_transport(
            Request::get("not a url"),
            RequestOptions::default(),
            Arc::new(Canned::default()),
        );
        assert_eq!(result.err(), Some(NetError::InvalidUrl));
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let engine = engine(
            Request::get("http://api.test/nowhere"),
            RequestOptions::default(),
            Arc::new(Canned::default()),
        );
        let err = engine.send().await.unwrap_err();
        assert_eq!(err.error, NetError::ConnectionRefused);
        assert!(err.partial().unwrap().status.is_none());
    }

    #[tokio::test]
    async fn test_timeout() {
        let options = RequestOptions::default().timeout(Duration::from_millis(20));
        let engine =
            RequestEngine::with_transport(Request::get("http://api.test/"), options, Arc::new(Stalled))
                .unwrap();
        let err = engine.send().await.unwrap_err();
        assert_eq!(err.error, NetError::TimedOut);
        assert_eq!(engine.state(), LoadState::Errored);
    }

    #[tokio::test]
    async fn test_abort_before_send() {
        let engine =
            RequestEngine::with_transport(Request::get("http://api.test/"), RequestOptions::default(), Arc::new(Stalled))
                .unwrap();
        engine.abort();
        engine.abort();
        assert_eq!(engine.state(), LoadState::Aborted);

        let err = engine.send().await.unwrap_err();
        assert!(err.is_abort());
    }

    #[tokio::test]
    async fn test_abort_mid_flight() {
        let engine =
            RequestEngine::with_transport(Request::get("http://api.test/"), RequestOptions::default(), Arc::new(Stalled))
                .unwrap();
        let handle = engine.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.abort();
        });

        let started = std::time::Instant::now();
        let err = engine.send().await.unwrap_err();
        assert!(err.is_abort());
        assert!(started.elapsed() < Duration::from_secs(5));

        // Settled requests ignore further aborts.
        engine.abort();
        assert_eq!(engine.state(), LoadState::Aborted);
    }

    #[tokio::test]
    async fn test_external_cancellation_token() {
        let token = CancellationToken::new();
        let options = RequestOptions::default().cancellation_token(token.clone());
        let engine =
            RequestEngine::with_transport(Request::get("http://api.test/"), options, Arc::new(Stalled)).unwrap();

        let send = tokio::spawn({
            let engine = engine.clone();
            async move { engine.send().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let err = send.await.unwrap().unwrap_err();
        assert_eq!(err.error, NetError::Aborted);
        assert_eq!(engine.state(), LoadState::Aborted);
    }

    #[tokio::test]
    async fn test_abort_after_completion_is_noop() {
        let transport = Arc::new(Canned::default().route("/", 200, &[], b"ok"));
        let engine = engine(Request::get("http://api.test/"), RequestOptions::default(), transport);
        let log = engine.send().await.unwrap();
        engine.abort();
        assert_eq!(engine.state(), LoadState::Completed);
        assert_eq!(engine.send().await.unwrap(), log);
    }

    #[tokio::test]
    async fn test_sizes() {
        let transport = Arc::new(Canned::default().route("/", 200, &[], b"12345"));
        let request = Request::post("http://api.test/").headers("a: b").payload("xyz");
        let engine = engine(request, RequestOptions::default(), transport);

        let log = engine.send().await.unwrap();
        assert_eq!(log.size.request, "a: b".len() as u64 + 3);
        assert_eq!(log.size.response, 5);
    }
}
