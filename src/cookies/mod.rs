//! Cookie handling for redirect chains.
//!
//! | Chromium (C++) | hopnet (Rust) | Responsibility |
//! |----------------|---------------|----------------|
//! | `net::CanonicalCookie` | [`CanonicalCookie`](canonicalcookie::CanonicalCookie) | Single cookie representation |
//! | `net::ParsedCookie` | [`CookieParser`](parser::CookieParser) | `Set-Cookie` parsing and URL matching |
//! | `URLRequestHttpJob::SaveCookiesAndNotifyHeadersComplete` | [`CookieBridge`](bridge::CookieBridge) | Forwarding cookies to the next hop |
//!
//! Unlike Chromium there is no cookie store here: the bridge forwards what
//! the redirecting response set and nothing else.

pub mod bridge;
pub mod canonicalcookie;
pub mod parser;

pub use bridge::CookieBridge;
pub use canonicalcookie::CanonicalCookie;
pub use parser::{CookieParser, RfcCookieParser};
