//! Request options - per-request configuration of the engine.
//!
//! Based on Chromium's net::URLRequestContext, trimmed to what one logical
//! request needs: redirect policy, timeouts, default headers, proxy, TLS
//! and host rewrite rules. Options can be built in code or loaded from a
//! JSON object with camelCase keys.

use crate::base::neterror::NetError;
use crate::http::hostrules::HostRule;
use crate::socket::proxy::ProxySettings;
use crate::socket::tls::{CertificateConfigurator, ClientCertificate, TlsConnectOptions};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Chromium's redirect limit.
pub const DEFAULT_MAX_REDIRECTS: u32 = 20;

pub const DEFAULT_USER_AGENT: &str = "api client";
pub const DEFAULT_ACCEPT: &str = "*/*";

/// Configuration options for one logical request.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestOptions {
    /// Per-hop timeout in milliseconds. `None` or `0` waits forever.
    pub timeout: Option<u64>,

    /// Follow redirect responses.
    pub follow_redirects: bool,

    /// Redirects followed before the request fails with too many redirects.
    pub max_redirects: u32,

    /// Add `user-agent` and `accept` when the request does not set them.
    pub default_headers: bool,

    pub default_user_agent: Option<String>,

    pub default_accept: Option<String>,

    /// HTTP proxy address (`http://host:port` or `host:port`).
    pub proxy: Option<String>,

    pub proxy_username: Option<String>,

    pub proxy_password: Option<String>,

    /// Verify server certificates.
    pub validate_certificates: bool,

    /// Host rewrite rules applied to the URL of every hop.
    pub hosts: Vec<HostRule>,

    /// Client certificates presented on TLS connections.
    #[serde(skip)]
    pub certificates: Vec<ClientCertificate>,

    /// Aborts the request when cancelled.
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            default_headers: false,
            default_user_agent: None,
            default_accept: None,
            proxy: None,
            proxy_username: None,
            proxy_password: None,
            validate_certificates: true,
            hosts: Vec::new(),
            certificates: Vec::new(),
            cancellation: None,
        }
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("default_headers", &self.default_headers)
            .field("default_user_agent", &self.default_user_agent)
            .field("default_accept", &self.default_accept)
            .field("proxy", &self.proxy)
            .field("proxy_username", &self.proxy_username)
            .field("proxy_password", &self.proxy_password.as_ref().map(|_| ".."))
            .field("validate_certificates", &self.validate_certificates)
            .field("hosts", &self.hosts)
            .field("certificates", &self.certificates.len())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| {
            tracing::debug!(error = %e, "invalid request options");
            NetError::InvalidArgument
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_millis() as u64);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn default_headers(mut self, enabled: bool) -> Self {
        self.default_headers = enabled;
        self
    }

    pub fn default_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.default_user_agent = Some(user_agent.into());
        self
    }

    pub fn default_accept(mut self, accept: impl Into<String>) -> Self {
        self.default_accept = Some(accept.into());
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn proxy_auth(mut self, username: impl Into<String>, password: Option<&str>) -> Self {
        self.proxy_username = Some(username.into());
        self.proxy_password = password.map(str::to_string);
        self
    }

    pub fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    pub fn host_rule(mut self, rule: HostRule) -> Self {
        self.hosts.push(rule);
        self
    }

    pub fn certificate(mut self, certificate: ClientCertificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The per-hop deadline, if any.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn user_agent(&self) -> &str {
        self.default_user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn accept(&self) -> &str {
        self.default_accept.as_deref().unwrap_or(DEFAULT_ACCEPT)
    }

    /// Parsed proxy settings with credentials attached.
    pub fn proxy_settings(&self) -> Result<Option<ProxySettings>, NetError> {
        let Some(proxy) = self.proxy.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        let mut settings = ProxySettings::new(proxy)?;
        if let Some(user) = &self.proxy_username {
            settings = settings.with_auth(user, self.proxy_password.as_deref());
        }
        Ok(Some(settings))
    }

    /// TLS options carrying every configured client certificate.
    pub fn tls_options(&self) -> TlsConnectOptions {
        CertificateConfigurator::build(&self.certificates, self.validate_certificates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RequestOptions::default();
        assert!(options.follow_redirects);
        assert!(options.validate_certificates);
        assert!(!options.default_headers);
        assert_eq!(options.max_redirects, 20);
        assert_eq!(options.timeout_duration(), None);
        assert_eq!(options.user_agent(), "api client");
        assert_eq!(options.accept(), "*/*");
    }

    #[test]
    fn test_from_json() {
        let options = RequestOptions::from_json(
            r#"{
                "timeout": 1500,
                "followRedirects": false,
                "defaultHeaders": true,
                "defaultUserAgent": "hopnet-cli/1.0",
                "proxy": "127.0.0.1:8080",
                "proxyUsername": "u",
                "proxyPassword": "p",
                "hosts": [{"from": "api.test", "to": "127.0.0.1:9000"}]
            }"#,
        )
        .unwrap();

        assert_eq!(options.timeout_duration(), Some(Duration::from_millis(1500)));
        assert!(!options.follow_redirects);
        assert!(options.default_headers);
        assert_eq!(options.user_agent(), "hopnet-cli/1.0");
        assert_eq!(options.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert!(options.hosts[0].enabled);

        let proxy = options.proxy_settings().unwrap().unwrap();
        assert_eq!(proxy.authorization().as_deref(), Some("Basic dTpw"));
    }

    #[test]
    fn test_from_json_rejects_wrong_types() {
        assert_eq!(
            RequestOptions::from_json(r#"{"timeout": "soon"}"#).unwrap_err(),
            NetError::InvalidArgument
        );
    }

    #[test]
    fn test_zero_timeout_is_unlimited() {
        let options = RequestOptions::default().timeout(Duration::ZERO);
        assert_eq!(options.timeout_duration(), None);
    }

    #[test]
    fn test_password_not_printed() {
        let options = RequestOptions::default().proxy_auth("u", Some("secret"));
        assert!(!format!("{:?}", options).contains("secret"));
    }

    #[test]
    fn test_tls_options_follow_validation() {
        let options = RequestOptions::default()
            .validate_certificates(false)
            .certificate(ClientCertificate::p12(&b"p12"[..], None));
        let tls = options.tls_options();
        assert!(!tls.reject_unauthorized);
        assert!(tls.has_client_identity());
    }
}
