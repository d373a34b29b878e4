use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::timing::Checkpoint;
use crate::socket::proxy::ProxySettings;
use crate::socket::stream::SocketType;
use crate::socket::tls::TlsConnectOptions;
use crate::socket::transport::EventSink;
use boring::ssl::{SslConnector, SslMethod};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

/// Upper bound on a `CONNECT` response head.
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// Manages the connection process: DNS -> TCP -> proxy tunnel -> SSL.
/// Roughly equivalent to net::ConnectJob.
///
/// Checkpoints are reported as each phase finishes, so the hop timing sees
/// real lookup, connect and handshake durations.
pub struct ConnectJob;

impl ConnectJob {
    pub async fn connect(
        url: &Url,
        proxy: Option<&ProxySettings>,
        tls: &TlsConnectOptions,
        events: &EventSink,
    ) -> Result<SocketType, NetError> {
        let target_host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let target_port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        // With a proxy we connect to the proxy first.
        let (host, port) = match proxy {
            Some(p) => p.host_port()?,
            None => (target_host, target_port),
        };

        events.checkpoint(Checkpoint::ConnectionStart);

        // 1. DNS Resolution
        let addrs: Vec<_> = tokio::net::lookup_host(format!("{}:{}", host, port))
            .await
            .dns_context(host)?
            .collect();
        if addrs.is_empty() {
            return Err(NetError::NameNotResolvedFor {
                domain: host.to_string(),
                reason: "no addresses".to_string(),
            });
        }
        events.checkpoint(Checkpoint::LookupEnd);
        tracing::debug!(host = %host, port, addrs = addrs.len(), "resolved");

        // 2. TCP Connect (to proxy or destination), first address that answers
        let mut last_error = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }
        let mut stream = match (stream, last_error) {
            (Some(s), _) => s,
            (None, Some(e)) => return Err(e).connection_context(host, port),
            (None, None) => return Err(NetError::ConnectionFailed),
        };
        let _ = stream.set_nodelay(true);
        events.checkpoint(Checkpoint::Connected);

        let secure = url.scheme() == "https";

        // 2b. HTTPS through an HTTP proxy needs a tunnel.
        if let (Some(p), true) = (proxy, secure) {
            Self::establish_tunnel(&mut stream, target_host, target_port, p).await?;
        }

        if !secure {
            return Ok(SocketType::Tcp(stream));
        }

        // 3. SSL Handshake, always after any tunnel is established
        events.checkpoint(Checkpoint::SecureStart);
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        tls.apply_to_builder(&mut builder)?;

        let mut config = builder
            .build()
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        let domain = target_host.trim_start_matches('[').trim_end_matches(']');
        config.set_use_server_name_indication(TlsConnectOptions::should_set_sni(domain));
        if !tls.reject_unauthorized {
            config.set_verify_hostname(false);
        }

        let tls_stream = tokio_boring::connect(config, domain, stream)
            .await
            .map_err(|e| {
                tracing::debug!(host = %domain, error = %e, "ssl handshake failed");
                NetError::SslProtocolError
            })?;
        events.checkpoint(Checkpoint::SecureConnected);

        Ok(SocketType::Ssl(tls_stream))
    }

    async fn establish_tunnel(
        stream: &mut TcpStream,
        host: &str,
        port: u16,
        proxy: &ProxySettings,
    ) -> Result<(), NetError> {
        let target = format!("{}:{}", host, port);
        let mut connect_req = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n", target, target);
        if let Some(auth) = proxy.authorization() {
            connect_req.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
        }
        connect_req.push_str("\r\n");

        stream
            .write_all(connect_req.as_bytes())
            .await
            .map_err(|_| NetError::TunnelConnectionFailed)?;

        let mut response = Vec::with_capacity(512);
        let mut buf = [0u8; 512];
        while !response.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|_| NetError::TunnelConnectionFailed)?;
            if n == 0 {
                return Err(NetError::TunnelConnectionFailed);
            }
            response.extend_from_slice(&buf[..n]);
            if response.len() > MAX_TUNNEL_RESPONSE {
                return Err(NetError::ResponseHeadersTooBig);
            }
        }

        let status = parse_status_code(&response).ok_or(NetError::InvalidHttpResponse)?;
        match status {
            200..=299 => {
                tracing::debug!(target = %target, "proxy tunnel established");
                Ok(())
            }
            407 => Err(NetError::ProxyAuthRequested),
            _ => {
                tracing::warn!(target = %target, status, "proxy refused tunnel");
                Err(NetError::TunnelConnectionFailed)
            }
        }
    }
}

/// Status code from an `HTTP/1.x NNN reason` status line.
fn parse_status_code(head: &[u8]) -> Option<u16> {
    let line = head.split(|b| *b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/1.") {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code(b"HTTP/1.1 200 Connection established\r\n\r\n"), Some(200));
        assert_eq!(parse_status_code(b"HTTP/1.0 407 Proxy Auth\r\n"), Some(407));
        assert_eq!(parse_status_code(b"SSH-2.0-OpenSSH\r\n"), None);
    }

    #[tokio::test]
    async fn test_direct_connect_reports_checkpoints() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let (events, mut rx) = EventSink::channel();
        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let socket = ConnectJob::connect(&url, None, &TlsConnectOptions::default(), &events)
            .await
            .unwrap();
        assert!(!socket.is_secure());

        let mut seen = Vec::new();
        while let Ok(crate::socket::transport::TransportEvent::Checkpoint(c, _)) = rx.try_recv() {
            seen.push(c);
        }
        assert_eq!(
            seen,
            vec![Checkpoint::ConnectionStart, Checkpoint::LookupEnd, Checkpoint::Connected]
        );
    }

    #[tokio::test]
    async fn test_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events, _rx) = EventSink::channel();
        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let err = ConnectJob::connect(&url, None, &TlsConnectOptions::default(), &events)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_tunnel_rejected_with_407() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await;
        });

        let proxy = ProxySettings::new(&format!("http://{}", addr)).unwrap();
        let (events, _rx) = EventSink::channel();
        let url = Url::parse("https://secure.test/").unwrap();
        let err = ConnectJob::connect(&url, Some(&proxy), &TlsConnectOptions::default(), &events)
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ProxyAuthRequested);
    }
}
