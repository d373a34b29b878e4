//! Host rewrite rules.
//!
//! Rules are applied to the request URL string before it is parsed, the
//! same way a `hosts` file redirects a name. `from` may contain `*`
//! wildcards; matching is case-insensitive and replaces every occurrence.

use regex::{NoExpand, RegexBuilder};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostRule {
    pub from: String,
    pub to: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl HostRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            enabled: true,
        }
    }

    fn apply(&self, url: &str) -> String {
        if !self.enabled || self.from.is_empty() {
            return url.to_string();
        }
        let pattern = self
            .from
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("(.*)");

        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => re.replace_all(url, NoExpand(&self.to)).into_owned(),
            Err(e) => {
                tracing::warn!(rule = %self.from, error = %e, "ignoring unusable host rule");
                url.to_string()
            }
        }
    }
}

/// Apply every enabled rule in order.
pub fn apply_host_rules(url: &str, rules: &[HostRule]) -> String {
    rules.iter().fold(url.to_string(), |acc, rule| rule.apply(&acc))
}
