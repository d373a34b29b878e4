//! Authentication challenge classification.
//!
//! A `401` response carries a `WWW-Authenticate` challenge. The engine does
//! not answer it; it only reports which scheme the server asked for so the
//! caller can retry with credentials.

use crate::http::orderedheaders::OrderedHeaderMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Ntlm,
    Basic,
    Digest,
}

/// What a `401` response asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub method: AuthMethod,
    /// The `realm` parameter, if the challenge carried one.
    pub realm: Option<String>,
    /// The raw `WWW-Authenticate` value.
    pub challenge: String,
}

impl AuthState {
    /// Classify the challenge in `headers`. Returns `None` when the header is
    /// absent or names a scheme other than NTLM, Basic or Digest.
    pub fn from_headers(headers: &OrderedHeaderMap) -> Option<Self> {
        let challenge = headers
            .get_all("www-authenticate")
            .into_iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        if challenge.is_empty() {
            return None;
        }

        let schemes = challenge_schemes(&challenge);
        let offered = |name: &str| schemes.iter().any(|s| s.eq_ignore_ascii_case(name));
        let method = if offered("ntlm") {
            AuthMethod::Ntlm
        } else if offered("basic") {
            AuthMethod::Basic
        } else if offered("digest") {
            AuthMethod::Digest
        } else {
            return None;
        };

        Some(Self {
            method,
            realm: parse_realm(&challenge),
            challenge,
        })
    }
}

/// Leading scheme token of every challenge in a `WWW-Authenticate` list.
///
/// Items are split on commas outside quoted strings; an item whose first
/// token is a `name=value` pair is a parameter of the previous challenge.
fn challenge_schemes(challenge: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in challenge.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(&challenge[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&challenge[start..]);

    items
        .into_iter()
        .filter_map(|item| item.split_whitespace().next())
        .filter(|token| !token.contains('='))
        .collect()
}

/// Pull `realm=` out of a challenge, honoring quotes.
fn parse_realm(challenge: &str) -> Option<String> {
    let lower = challenge.to_ascii_lowercase();
    let start = lower.find("realm=")? + "realm=".len();
    let rest = &challenge[start..];

    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        Some(quoted[..end].to_string())
    } else {
        let end = rest.find(&[',', ' '][..]).unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}
