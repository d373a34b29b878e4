//! Redirect decisions.
//!
//! Based on Chromium's `RedirectInfo::ComputeRedirectInfo`: which statuses
//! redirect, how the method changes, and where the next hop goes.

use crate::base::neterror::NetError;
use http::Method;
use url::Url;

/// Statuses that carry a `Location` the engine may follow.
const REDIRECT_STATUSES: [u16; 6] = [300, 301, 302, 303, 307, 308];

/// Outcome of inspecting a redirect-eligible response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Absolute destination of the next hop.
    pub url: Url,
    /// Method for the next hop.
    pub method: Method,
    /// Whether the payload (and its entity headers) must be dropped.
    pub drop_body: bool,
}

pub struct RedirectResolver;

impl RedirectResolver {
    pub fn is_redirect_status(status: u16) -> bool {
        REDIRECT_STATUSES.contains(&status)
    }

    /// 301/302/303 turn anything but GET/HEAD into a GET. 307/308 keep the
    /// method and body.
    pub fn redirect_method(status: u16, method: &Method) -> Method {
        let downgrade = matches!(status, 301..=303)
            && *method != Method::GET
            && *method != Method::HEAD;
        if downgrade {
            Method::GET
        } else {
            method.clone()
        }
    }

    /// Resolve a `Location` value against the URL of the hop that returned it.
    ///
    /// Handles absolute (`http://host/x`), root-relative (`/x`),
    /// scheme-relative (`//host/x`) and document-relative (`x`, `../x`) forms.
    pub fn resolve_location(base: &Url, location: &str) -> Result<Url, NetError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(NetError::InvalidRedirect);
        }
        let url = base.join(location).map_err(|_| NetError::InvalidRedirect)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(NetError::InvalidRedirect),
        }
    }

    /// Full decision for a redirect-eligible response.
    pub fn resolve(
        status: u16,
        method: &Method,
        base: &Url,
        location: Option<&str>,
    ) -> Result<RedirectTarget, NetError> {
        let location = location.ok_or(NetError::InvalidRedirect)?;
        let url = Self::resolve_location(base, location)?;
        let next_method = Self::redirect_method(status, method);
        let drop_body = next_method != *method;
        Ok(RedirectTarget {
            url,
            method: next_method,
            drop_body,
        })
    }

    /// A destination that was already redirected to is a loop.
    pub fn is_loop<'a>(destination: &Url, visited: impl IntoIterator<Item = &'a Url>) -> bool {
        visited.into_iter().any(|u| u.as_str() == destination.as_str())
    }
}
