use crate::base::neterror::NetError;
use base64::{engine::general_purpose, Engine as _};
use url::Url;
use zeroize::Zeroizing;

/// `Proxy-Authorization` value for Basic proxy auth.
///
/// A missing password is sent as empty: `Basic base64("user:")`.
pub fn proxy_authorization(username: &str, password: Option<&str>) -> String {
    let creds = Zeroizing::new(format!("{}:{}", username, password.unwrap_or("")));
    format!("Basic {}", general_purpose::STANDARD.encode(creds.as_bytes()))
}

/// HTTP proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Proxy URL (e.g., `http://proxy.com:8080`)
    pub url: Url,
    /// Proxy username for authentication
    pub username: Option<String>,
    /// Proxy password (zeroized on drop)
    pub password: Option<Zeroizing<String>>,
}

impl ProxySettings {
    /// Parse a proxy address. A bare `host:port` is taken as an HTTP proxy.
    ///
    /// Only plain HTTP proxies are supported; `https` targets go through a
    /// `CONNECT` tunnel on them.
    pub fn new(proxy: &str) -> Result<Self, NetError> {
        let url = match Url::parse(proxy) {
            Ok(url) if url.has_host() => url,
            _ => Url::parse(&format!("http://{}", proxy)).map_err(|_| NetError::InvalidUrl)?,
        };
        if url.scheme() != "http" {
            return Err(NetError::DisallowedUrlScheme);
        }
        if url.host_str().is_none() {
            return Err(NetError::InvalidUrl);
        }
        Ok(Self {
            url,
            username: None,
            password: None,
        })
    }

    /// Add authentication credentials.
    pub fn with_auth(mut self, user: &str, pass: Option<&str>) -> Self {
        self.username = Some(user.to_string());
        self.password = pass.map(|p| Zeroizing::new(p.to_string()));
        self
    }

    /// `Proxy-Authorization` header value, if a username is configured.
    pub fn authorization(&self) -> Option<String> {
        let user = self.username.as_deref()?;
        Some(proxy_authorization(
            user,
            self.password.as_ref().map(|p| p.as_str()),
        ))
    }

    /// Get proxy host and port.
    pub fn host_port(&self) -> Result<(&str, u16), NetError> {
        let host = self.url.host_str().ok_or(NetError::InvalidUrl)?;
        Ok((host, self.url.port().unwrap_or(80)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let expected = format!("Basic {}", general_purpose::STANDARD.encode("u:p"));
        assert_eq!(proxy_authorization("u", Some("p")), expected);
        assert_eq!(expected, "Basic dTpw");
    }

    #[test]
    fn test_password_defaults_to_empty() {
        assert_eq!(
            proxy_authorization("user", None),
            format!("Basic {}", general_purpose::STANDARD.encode("user:"))
        );
    }

    #[test]
    fn test_settings_auth() {
        let proxy = ProxySettings::new("http://proxy.local:3128").unwrap();
        assert!(proxy.authorization().is_none());

        let proxy = proxy.with_auth("u", Some("p"));
        assert_eq!(proxy.authorization().as_deref(), Some("Basic dTpw"));
        assert_eq!(proxy.host_port().unwrap(), ("proxy.local", 3128));
    }

    #[test]
    fn test_bare_host_port() {
        let proxy = ProxySettings::new("127.0.0.1:8888").unwrap();
        assert_eq!(proxy.host_port().unwrap(), ("127.0.0.1", 8888));

        let proxy = ProxySettings::new("proxy.local").unwrap();
        assert_eq!(proxy.host_port().unwrap(), ("proxy.local", 80));
    }

    #[test]
    fn test_rejects_socks() {
        assert_eq!(
            ProxySettings::new("socks5://proxy.local:1080").unwrap_err(),
            NetError::DisallowedUrlScheme
        );
    }
}
