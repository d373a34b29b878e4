//! `Set-Cookie` parsing and destination matching.
//!
//! The engine does not own a cookie jar. It only needs two things from the
//! cookie layer when it follows a redirect: turn the `Set-Cookie` values of
//! the redirecting response into cookies, and keep the ones that apply to
//! the next URL. [`CookieParser`] is that seam; [`RfcCookieParser`] is the
//! default RFC 6265 implementation.

use crate::cookies::canonicalcookie::{CanonicalCookie, SameSite};
use cookie::Cookie;
use time::OffsetDateTime;
use url::Url;

/// Parses `Set-Cookie` values and matches cookies against URLs.
pub trait CookieParser: Send + Sync {
    /// Parse `Set-Cookie` header values received from `url`.
    fn parse(&self, url: &Url, set_cookie: &[&str]) -> Vec<CanonicalCookie>;

    /// Keep the cookies that would be sent to `url`.
    fn filter_for_url(&self, cookies: Vec<CanonicalCookie>, url: &Url) -> Vec<CanonicalCookie>;
}

/// RFC 6265 parsing and domain/path/secure matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct RfcCookieParser;

impl CookieParser for RfcCookieParser {
    fn parse(&self, url: &Url, set_cookie: &[&str]) -> Vec<CanonicalCookie> {
        set_cookie
            .iter()
            .filter_map(|line| parse_line(url, line))
            .collect()
    }

    fn filter_for_url(&self, cookies: Vec<CanonicalCookie>, url: &Url) -> Vec<CanonicalCookie> {
        let host = url.host_str().unwrap_or("");
        let now = OffsetDateTime::now_utc();

        let mut result: Vec<CanonicalCookie> = cookies
            .into_iter()
            .filter(|c| domain_matches(&c.domain, host, c.host_only))
            .filter(|c| path_matches(&c.path, url.path()))
            .filter(|c| !c.secure || url.scheme() == "https")
            .filter(|c| !c.is_expired(now))
            .collect();

        // Longest path first, then oldest, as browsers order the Cookie header.
        result.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.creation_time.cmp(&b.creation_time))
        });
        result
    }
}

fn parse_line(url: &Url, line: &str) -> Option<CanonicalCookie> {
    let parsed = match Cookie::parse(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparsable set-cookie");
            return None;
        }
    };
    let host = url.host_str().unwrap_or("").to_lowercase();

    let (domain, host_only) = match parsed.domain() {
        Some(d) => {
            let d = d.trim_start_matches('.').to_lowercase();
            // A server may only set cookies for itself or a parent domain.
            if !domain_matches(&d, &host, false) {
                tracing::debug!(domain = %d, host = %host, "rejecting cookie for foreign domain");
                return None;
            }
            (d, false)
        }
        None => (host, true),
    };

    let path = match parsed.path() {
        Some(p) if p.starts_with('/') => p.to_string(),
        _ => default_path(url.path()),
    };

    let same_site = match parsed.same_site() {
        Some(cookie::SameSite::Lax) => SameSite::Lax,
        Some(cookie::SameSite::Strict) => SameSite::Strict,
        Some(cookie::SameSite::None) => SameSite::NoRestriction,
        None => SameSite::Unspecified,
    };

    let now = OffsetDateTime::now_utc();
    // Max-Age wins over Expires.
    let expiration_time = match parsed.max_age() {
        Some(age) => Some(now + age),
        None => parsed.expires().and_then(|e| e.datetime()),
    };

    let cookie = CanonicalCookie {
        name: parsed.name().to_string(),
        value: parsed.value().to_string(),
        domain,
        path,
        creation_time: now,
        expiration_time,
        secure: parsed.secure().unwrap_or(false),
        http_only: parsed.http_only().unwrap_or(false),
        host_only,
        same_site,
    };

    cookie.validate_prefix(url.scheme() == "https").ok()?;
    Some(cookie)
}

/// RFC 6265 section 5.1.4 default path: the directory of the request path.
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

/// Check if cookie domain matches request host.
/// Implements RFC 6265 domain matching.
fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
    if host_only {
        return cookie_domain.eq_ignore_ascii_case(request_host);
    }

    let cookie_domain = cookie_domain.trim_start_matches('.');
    if request_host.eq_ignore_ascii_case(cookie_domain) {
        return true;
    }

    if request_host.len() > cookie_domain.len() {
        let split = request_host.len() - cookie_domain.len();
        let suffix = &request_host[split..];
        if suffix.eq_ignore_ascii_case(cookie_domain) {
            return request_host.as_bytes()[split - 1] == b'.';
        }
    }

    false
}

/// Check if request path matches cookie path.
/// Implements RFC 6265 path matching.
fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }

    if let Some(rest) = request_path.strip_prefix(cookie_path) {
        return cookie_path.ends_with('/') || rest.starts_with('/');
    }

    false
}
