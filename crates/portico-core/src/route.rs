use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maps an inbound path prefix to a downstream service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub path_prefix: String,
    pub target_service: String,
    pub strip_prefix: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteParseError {
    #[error("expected <prefix>=<service>[:keep], got {0:?}")]
    Syntax(String),

    #[error("route prefix must start with '/', got {0:?}")]
    Prefix(String),
}

impl RouteRule {
    pub fn new(prefix: &str, target_service: impl Into<String>, strip_prefix: bool) -> Self {
        Self {
            path_prefix: normalize_prefix(prefix),
            target_service: target_service.into(),
            strip_prefix,
        }
    }

    /// Prefix match on whole path segments: `/products` matches
    /// `/products` and `/products/42` but not `/productsx`.
    pub fn matches(&self, path: &str) -> bool {
        if self.path_prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.path_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path to send downstream. Only meaningful for a path that `matches`.
    pub fn rewrite<'a>(&self, path: &'a str) -> &'a str {
        if !self.strip_prefix || self.path_prefix == "/" {
            return path;
        }
        match path.strip_prefix(self.path_prefix.as_str()) {
            Some("") | None => "/",
            Some(rest) => rest,
        }
    }
}

impl FromStr for RouteRule {
    type Err = RouteParseError;

    /// `/products=product` strips the prefix, `/products=product:keep`
    /// forwards the path untouched.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (prefix, target) = raw
            .trim()
            .split_once('=')
            .ok_or_else(|| RouteParseError::Syntax(raw.to_string()))?;
        if !prefix.starts_with('/') {
            return Err(RouteParseError::Prefix(prefix.to_string()));
        }
        let (service, strip) = match target.split_once(':') {
            Some((service, "keep")) => (service, false),
            Some(_) => return Err(RouteParseError::Syntax(raw.to_string())),
            None => (target, true),
        };
        if service.is_empty() {
            return Err(RouteParseError::Syntax(raw.to_string()));
        }
        Ok(RouteRule::new(prefix, service, strip))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Static route table, fixed for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        // Stable sort: among equal prefixes the first configured rule wins.
        rules.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        Self { rules }
    }

    /// Longest matching prefix.
    pub fn resolve(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}
