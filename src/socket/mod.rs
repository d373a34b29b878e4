//! Socket and transport layer.
//!
//! Mirrors Chromium's `net/socket/` at the scale of one connection per hop:
//! - [`transport`]: the connector seam the request engine drives
//! - [`client`]: default HTTP/1.1 transport on hyper
//! - [`connectjob`]: DNS → TCP → proxy tunnel → TLS connection flow
//! - [`stream`]: socket types and checkpoint metering
//! - [`proxy`]: HTTP proxy settings and Basic proxy auth
//! - [`tls`]: TLS options and client certificates with BoringSSL

pub mod client;
pub mod connectjob;
pub mod proxy;
pub mod stream;
pub mod tls;
pub mod transport;

pub use client::HttpTransport;
pub use proxy::{proxy_authorization, ProxySettings};
pub use tls::{CertificateConfigurator, ClientCertificate, TlsConnectOptions};
pub use transport::{ActiveConnection, EventSink, HopRequest, TransportConnector, TransportEvent};
