use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

/// A header map that strictly preserves insertion order.
///
/// Requests arrive from the caller as a raw header block (`name: value`
/// lines), and responses are reported back the same way, so the map parses
/// from and serializes to that form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedHeaderMap {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Parse a raw header block. Lines without a colon are ignored, lines
    /// with an invalid name or value are an error.
    pub fn parse(raw: &str) -> Result<Self, NetError> {
        let mut map = Self::new();
        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            map.append(name, value.trim())?;
        }
        Ok(map)
    }

    /// Replace any existing value for `name`, keeping its original position.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let name_header = HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
        let value_header = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;

        // HeaderName is lowercase, so equality is case-insensitive.
        if let Some(pos) = self.headers.iter().position(|(n, _)| *n == name_header) {
            self.headers[pos].1 = value_header;
            let mut idx = pos + 1;
            while idx < self.headers.len() {
                if self.headers[idx].0 == name_header {
                    self.headers.remove(idx);
                } else {
                    idx += 1;
                }
            }
        } else {
            self.headers.push((name_header, value_header));
        }
        Ok(())
    }

    /// Add a value without touching existing ones (e.g. repeated `set-cookie`).
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let name_header = HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
        let value_header = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
        self.headers.push((name_header, value_header));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        if let Ok(target) = HeaderName::from_str(name) {
            self.headers.retain(|(n, _)| *n != target);
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let target = HeaderName::from_str(name).ok()?;
        self.headers
            .iter()
            .find(|(n, _)| *n == target)
            .map(|(_, v)| v)
    }

    /// First value for `name` as a string, if it is visible ASCII.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values for `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&HeaderValue> {
        match HeaderName::from_str(name) {
            Ok(target) => self
                .headers
                .iter()
                .filter(|(n, _)| *n == target)
                .map(|(_, v)| v)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

    /// Serialize back into a raw header block, one `name: value` per line.
    pub fn to_raw(&self) -> String {
        self.headers
            .iter()
            .map(|(n, v)| format!("{}: {}", n, String::from_utf8_lossy(v.as_bytes())))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn from_header_map(map: &HeaderMap) -> Self {
        Self {
            headers: map.iter().map(|(n, v)| (n.clone(), v.clone())).collect(),
        }
    }

    /// Consumes the map and returns a standard http::HeaderMap.
    /// Note: http::HeaderMap preserves insertion order.
    pub fn to_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            map.append(name, value);
        }
        map
    }
}
