//! Default HTTP/1.1 transport.
//!
//! [`HttpTransport`] opens a fresh connection per hop through
//! [`ConnectJob`], speaks HTTP/1.1 over it with hyper, and reports progress
//! to the engine. Plain `http` targets behind a proxy are sent in absolute
//! form; `https` targets go through a `CONNECT` tunnel set up by the connect
//! job.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::response::ResponseHead;
use crate::http::timing::Checkpoint;
use crate::socket::connectjob::ConnectJob;
use crate::socket::proxy::ProxySettings;
use crate::socket::stream::MeteredSocket;
use crate::socket::tls::TlsConnectOptions;
use crate::socket::transport::{EventSink, HopRequest, TransportConnector};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HOST, PROXY_AUTHORIZATION};
use http::response::Parts;
use http::HeaderValue;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use url::Position;

/// HTTP/1.1 over TCP or TLS, optionally through an HTTP proxy.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    proxy: Option<ProxySettings>,
    tls: TlsConnectOptions,
}

impl HttpTransport {
    pub fn new(proxy: Option<ProxySettings>, tls: TlsConnectOptions) -> Self {
        Self { proxy, tls }
    }

    async fn perform(
        proxy: Option<&ProxySettings>,
        tls: &TlsConnectOptions,
        hop: HopRequest,
        events: &EventSink,
    ) -> Result<Bytes, NetError> {
        let socket = ConnectJob::connect(&hop.url, proxy, tls, events).await?;
        let absolute_form = proxy.is_some() && hop.url.scheme() == "http";
        let request = build_request(hop, if absolute_form { proxy } else { None })?;

        let io = TokioIo::new(MeteredSocket::new(socket, events.clone()));
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        let exchange = async {
            let response = sender.send_request(request).await?;
            events.checkpoint(Checkpoint::Receiving);
            let (parts, body) = response.into_parts();
            events.headers(response_head(&parts));

            let body = body.collect().await?.to_bytes();
            events.checkpoint(Checkpoint::LastByte);
            Ok::<_, NetError>(body)
        };
        tokio::pin!(exchange);
        tokio::pin!(conn);

        // The connection future drives the socket; it may finish first when
        // the server closes right after the response.
        let mut conn_done = false;
        loop {
            tokio::select! {
                result = &mut exchange => return result,
                result = &mut conn, if !conn_done => {
                    conn_done = true;
                    if let Err(e) = result {
                        tracing::debug!(error = %e, "connection failed mid-exchange");
                        return Err(e.into());
                    }
                }
            }
        }
    }
}

impl TransportConnector for HttpTransport {
    fn exchange(&self, hop: HopRequest, events: EventSink) -> BoxFuture<'static, ()> {
        let proxy = self.proxy.clone();
        let tls = self.tls.clone();
        Box::pin(async move {
            tracing::debug!(method = %hop.method, url = %hop.url, "exchange start");
            match Self::perform(proxy.as_ref(), &tls, hop, &events).await {
                Ok(body) => events.complete(body),
                Err(e) => {
                    tracing::debug!(error = %e, "exchange failed");
                    events.fail(e)
                }
            }
        })
    }
}

/// Build the hyper request for `hop`. `proxy` is set only for absolute-form
/// requests sent to an HTTP proxy.
fn build_request(
    hop: HopRequest,
    proxy: Option<&ProxySettings>,
) -> Result<http::Request<Full<Bytes>>, NetError> {
    let target = match proxy {
        Some(_) => hop.url.as_str().to_string(),
        None => hop.url[Position::BeforePath..Position::AfterQuery].to_string(),
    };

    let mut builder = http::Request::builder().method(hop.method).uri(target);
    if let Some(headers) = builder.headers_mut() {
        if !hop.headers.contains("host") {
            headers.insert(HOST, host_header(&hop.url)?);
        }
        for (name, value) in hop.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        if let Some(auth) = proxy.and_then(|p| p.authorization()) {
            if !headers.contains_key(PROXY_AUTHORIZATION) {
                let value = HeaderValue::from_str(&auth).map_err(|_| NetError::InvalidHeader)?;
                headers.insert(PROXY_AUTHORIZATION, value);
            }
        }
    }

    builder
        .body(Full::new(hop.payload.unwrap_or_default()))
        .map_err(|_| NetError::InvalidArgument)
}

fn host_header(url: &url::Url) -> Result<HeaderValue, NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?;
    let value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|_| NetError::InvalidUrl)
}

fn response_head(parts: &Parts) -> ResponseHead {
    // hyper keeps the reason phrase only when it differs from the canonical one.
    let status_text = parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .and_then(|r| std::str::from_utf8(r.as_bytes()).ok())
        .or_else(|| parts.status.canonical_reason())
        .unwrap_or("")
        .to_string();

    ResponseHead {
        status: parts.status.as_u16(),
        status_text,
        headers: OrderedHeaderMap::from_header_map(&parts.headers),
    }
}
