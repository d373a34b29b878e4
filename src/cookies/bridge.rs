//! Cookie carry-over between redirect hops.
//!
//! When a redirecting response sets cookies, the next hop should send the
//! ones that apply to its URL. The bridge only forwards what that one
//! response asked for; it never reads or writes a cookie jar.

use crate::base::neterror::NetError;
use crate::cookies::parser::CookieParser;
use crate::http::orderedheaders::OrderedHeaderMap;
use url::Url;

pub struct CookieBridge<'a> {
    parser: &'a dyn CookieParser,
}

impl<'a> CookieBridge<'a> {
    pub fn new(parser: &'a dyn CookieParser) -> Self {
        Self { parser }
    }

    /// Rewrite the `Cookie` header of the next hop.
    ///
    /// `response_headers` belong to the redirecting response received from
    /// `current`; `next_headers` are the headers for the hop to `next`.
    /// Without a `Set-Cookie` on the response nothing changes.
    pub fn carry_over(
        &self,
        response_headers: &OrderedHeaderMap,
        current: &Url,
        next: &Url,
        next_headers: &mut OrderedHeaderMap,
    ) -> Result<(), NetError> {
        let set_cookie: Vec<&str> = response_headers
            .get_all("set-cookie")
            .into_iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if set_cookie.is_empty() {
            return Ok(());
        }

        let parsed = self.parser.parse(current, &set_cookie);
        let applicable = self.parser.filter_for_url(parsed, next);

        next_headers.remove("cookie");
        if !applicable.is_empty() {
            let value = applicable
                .iter()
                .map(|c| c.to_cookie_pair())
                .collect::<Vec<_>>()
                .join("; ");
            next_headers.insert("cookie", &value)?;
        }

        tracing::debug!(
            received = set_cookie.len(),
            forwarded = applicable.len(),
            next = %next,
            "redirect cookies carried over"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::parser::RfcCookieParser;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn response_with(cookies: &[&str]) -> OrderedHeaderMap {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("location", "/next").unwrap();
        for c in cookies {
            headers.append("set-cookie", c).unwrap();
        }
        headers
    }

    #[test]
    fn test_no_set_cookie_leaves_headers() {
        let mut next = OrderedHeaderMap::new();
        next.insert("cookie", "existing=1").unwrap();
        CookieBridge::new(&RfcCookieParser)
            .carry_over(
                &response_with(&[]),
                &url("http://a.test/"),
                &url("http://a.test/next"),
                &mut next,
            )
            .unwrap();
        assert_eq!(next.get_str("cookie"), Some("existing=1"));
    }

    #[test]
    fn test_replaces_cookie_header() {
        let mut next = OrderedHeaderMap::new();
        next.insert("cookie", "existing=1").unwrap();
        CookieBridge::new(&RfcCookieParser)
            .carry_over(
                &response_with(&["sid=abc; Path=/", "theme=dark; Path=/"]),
                &url("http://a.test/login"),
                &url("http://a.test/next"),
                &mut next,
            )
            .unwrap();
        assert_eq!(next.get_str("cookie"), Some("sid=abc; theme=dark"));
    }

    #[test]
    fn test_cross_host_drops_cookie_header() {
        let mut next = OrderedHeaderMap::new();
        next.insert("cookie", "existing=1").unwrap();
        CookieBridge::new(&RfcCookieParser)
            .carry_over(
                &response_with(&["sid=abc"]),
                &url("http://a.test/"),
                &url("http://b.test/"),
                &mut next,
            )
            .unwrap();
        assert!(next.get("cookie").is_none());
    }
}
