use thiserror::Error;

/// Network error codes, numbered after Chromium's `net_error_list.h`.
///
/// The `Display` text doubles as the human-readable message attached to an
/// error response. Detailed variants carry the underlying failure;
/// `NetError::from(code).to_string()` gives the plain per-code message.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Generic errors
    #[error("Generic failure")]
    Failed,
    #[error("Request aborted")]
    Aborted,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Operation timed out")]
    TimedOut,

    // Connection errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Internet disconnected")]
    InternetDisconnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("SSL client auth cert needed")]
    SslClientAuthCertNeeded,
    #[error("Tunnel connection failed")]
    TunnelConnectionFailed,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("Bad SSL client auth cert")]
    BadSslClientAuthCert,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Proxy auth requested")]
    ProxyAuthRequested,
    #[error("Proxy connection failed")]
    ProxyConnectionFailed,
    #[error("SSL client auth cert no private key")]
    SslClientAuthCertNoPrivateKey,
    #[error("SSL client auth cert bad format")]
    SslClientAuthCertBadFormat,

    // Detailed connection errors
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Name not resolved for {domain}: {reason}")]
    NameNotResolvedFor { domain: String, reason: String },

    // HTTP errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Method not supported")]
    MethodNotSupported,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response headers too big")]
    ResponseHeadersTooBig,
    #[error("Content decoding failed")]
    ContentDecodingFailed,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,
    #[error("Invalid header")]
    InvalidHeader,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Failed => -2,
            NetError::Aborted => -3,
            NetError::InvalidArgument => -4,
            NetError::TimedOut => -7,

            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::InternetDisconnected => -106,
            NetError::SslProtocolError => -107,
            NetError::AddressInvalid => -108,
            NetError::AddressUnreachable => -109,
            NetError::SslClientAuthCertNeeded => -110,
            NetError::TunnelConnectionFailed => -111,
            NetError::SocketNotConnected => -112,
            NetError::BadSslClientAuthCert => -117,
            NetError::ConnectionTimedOut => -118,
            NetError::ProxyAuthRequested => -127,
            NetError::ProxyConnectionFailed => -130,
            NetError::SslClientAuthCertNoPrivateKey => -135,
            NetError::SslClientAuthCertBadFormat => -164,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidRedirect => -303,
            NetError::TooManyRedirects => -310,
            NetError::InvalidResponse => -320,
            NetError::MethodNotSupported => -322,
            NetError::EmptyResponse => -324,
            NetError::ResponseHeadersTooBig => -325,
            NetError::ContentDecodingFailed => -330,
            NetError::InvalidHttpResponse => -370,
            // Outside Chromium's blob range (-900..=-906).
            NetError::InvalidHeader => -10001,
            NetError::Unknown(code) => *code,
        }
    }

    /// Whether this error represents a caller-initiated cancellation.
    pub fn is_abort(&self) -> bool {
        matches!(self, NetError::Aborted)
    }

    /// Whether this error was produced by the socket layer rather than by
    /// request/response processing.
    pub fn is_transport(&self) -> bool {
        (-199..=-100).contains(&self.as_i32()) || matches!(self, NetError::TimedOut)
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -2 => NetError::Failed,
            -3 => NetError::Aborted,
            -4 => NetError::InvalidArgument,
            -7 => NetError::TimedOut,

            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -106 => NetError::InternetDisconnected,
            -107 => NetError::SslProtocolError,
            -108 => NetError::AddressInvalid,
            -109 => NetError::AddressUnreachable,
            -110 => NetError::SslClientAuthCertNeeded,
            -111 => NetError::TunnelConnectionFailed,
            -112 => NetError::SocketNotConnected,
            -117 => NetError::BadSslClientAuthCert,
            -118 => NetError::ConnectionTimedOut,
            -127 => NetError::ProxyAuthRequested,
            -130 => NetError::ProxyConnectionFailed,
            -135 => NetError::SslClientAuthCertNoPrivateKey,
            -164 => NetError::SslClientAuthCertBadFormat,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -302 => NetError::UnknownUrlScheme,
            -303 => NetError::InvalidRedirect,
            -310 => NetError::TooManyRedirects,
            -320 => NetError::InvalidResponse,
            -322 => NetError::MethodNotSupported,
            -324 => NetError::EmptyResponse,
            -325 => NetError::ResponseHeadersTooBig,
            -330 => NetError::ContentDecodingFailed,
            -370 => NetError::InvalidHttpResponse,
            -10001 => NetError::InvalidHeader,
            _ => NetError::Unknown(code),
        }
    }
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            ErrorKind::ConnectionReset => NetError::ConnectionReset,
            ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            ErrorKind::NotConnected => NetError::SocketNotConnected,
            ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
            _ => NetError::ConnectionFailed,
        }
    }
}

impl From<hyper::Error> for NetError {
    fn from(err: hyper::Error) -> Self {
        if err.is_incomplete_message() {
            NetError::EmptyResponse
        } else if err.is_parse() || err.is_parse_status() {
            NetError::InvalidHttpResponse
        } else if err.is_timeout() {
            NetError::TimedOut
        } else {
            // Includes `is_canceled()`: hyper cancels a queued request when
            // the connection goes away first, which is not a caller abort.
            NetError::ConnectionClosed
        }
    }
}
