//! URL equivalence for request lookup.
//!
//! Two URLs match when, after resolving them against the recording base URL,
//! dropping the ignored query parameters, stripping the base URL and
//! percent-decoding, the remaining strings are identical. There is no prefix
//! or fuzzy matching: `/inventory/managedObjects` never matches
//! `/inventory/managedObjects/42`.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Query parameters ignored unless configured otherwise.
pub const DEFAULT_IGNORED_URL_PARAMETERS: [&str; 3] = ["dateFrom", "dateTo", "_"];

/// Placeholder origin used to parse relative URLs when no base URL is known.
const FALLBACK_BASE: &str = "http://localhost";

/// Request matching overrides, stored in pact info or configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestMatchingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_url_parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Decides whether a recorded URL and a live URL address the same resource.
pub trait UrlMatcher: Send + Sync {
    fn matches(&self, recorded: &str, actual: &str) -> bool;
}

/// Default matcher: ignored parameters plus base URL stripping.
#[derive(Debug, Clone)]
pub struct DefaultUrlMatcher {
    ignore_parameters: Vec<String>,
    base_url: Option<Url>,
}

impl Default for DefaultUrlMatcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_IGNORED_URL_PARAMETERS.iter().map(|s| s.to_string()),
            None,
        )
    }
}

impl DefaultUrlMatcher {
    pub fn new<I, S>(ignore_parameters: I, base_url: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_url = base_url.and_then(|b| match Url::parse(b) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("Ignoring unparsable base URL '{}': {}", b, e);
                None
            }
        });
        Self {
            ignore_parameters: ignore_parameters.into_iter().map(Into::into).collect(),
            base_url,
        }
    }

    /// Build a matcher from layered options; earlier entries win per field.
    pub fn from_options(layers: &[Option<&RequestMatchingOptions>]) -> Self {
        let ignore = layers
            .iter()
            .flatten()
            .find_map(|o| o.ignore_url_parameters.clone())
            .unwrap_or_else(|| {
                DEFAULT_IGNORED_URL_PARAMETERS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
        let base = layers.iter().flatten().find_map(|o| o.base_url.clone());
        Self::new(ignore, base.as_deref())
    }

    pub fn ignored_parameters(&self) -> &[String] {
        &self.ignore_parameters
    }

    /// Normalized comparison form of `raw`, or `None` if it cannot be parsed.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let fallback;
        let base = match &self.base_url {
            Some(base) => base,
            None => {
                fallback = Url::parse(FALLBACK_BASE).ok()?;
                &fallback
            }
        };
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base.join(raw).ok()?,
            Err(_) => return None,
        };

        let query: Vec<String> = url
            .query_pairs()
            .filter(|(key, _)| !self.ignore_parameters.iter().any(|p| p == key))
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let decoded_path = urlencoding::decode(url.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| url.path().to_string());
        let path = self.strip_base_path(&decoded_path);

        let same_origin = self
            .base_url
            .as_ref()
            .map(|b| b.origin() == url.origin())
            .unwrap_or(true);

        let mut normalized = String::new();
        if !same_origin {
            normalized.push_str(&url.origin().ascii_serialization());
        }
        normalized.push_str(path);
        if !query.is_empty() {
            normalized.push('?');
            normalized.push_str(&query.join("&"));
        }
        Some(normalized)
    }

    fn strip_base_path<'a>(&self, path: &'a str) -> &'a str {
        let Some(base) = &self.base_url else {
            return path;
        };
        let prefix = base.path().trim_end_matches('/');
        if prefix.is_empty() {
            return path;
        }
        match path.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

impl UrlMatcher for DefaultUrlMatcher {
    fn matches(&self, recorded: &str, actual: &str) -> bool {
        match (self.normalize(recorded), self.normalize(actual)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_parameter_does_not_break_match() {
        let matcher = DefaultUrlMatcher::default();
        assert!(matcher.matches(
            "https://h/a?dateFrom=X&id=1",
            "https://h/a?dateFrom=Y&id=1"
        ));
    }

    #[test]
    fn test_other_parameter_must_match() {
        let matcher = DefaultUrlMatcher::default();
        assert!(!matcher.matches(
            "https://h/a?dateFrom=X&id=1",
            "https://h/a?dateFrom=X&id=2"
        ));
    }

    #[test]
    fn test_not_ignored_when_not_configured() {
        let matcher = DefaultUrlMatcher::new(Vec::<String>::new(), None);
        assert!(!matcher.matches("/a?dateFrom=X", "/a?dateFrom=Y"));
    }

    #[test]
    fn test_no_prefix_matching() {
        let matcher = DefaultUrlMatcher::default();
        assert!(!matcher.matches(
            "/inventory/managedObjects",
            "/inventory/managedObjects/42"
        ));
    }

    #[test]
    fn test_base_url_is_stripped() {
        let matcher = DefaultUrlMatcher::new(
            DEFAULT_IGNORED_URL_PARAMETERS,
            Some("https://tenant.example.com"),
        );
        assert!(matcher.matches(
            "https://tenant.example.com/inventory/managedObjects/42",
            "/inventory/managedObjects/42"
        ));
        assert!(!matcher.matches(
            "https://other.example.com/inventory/managedObjects/42",
            "/inventory/managedObjects/42"
        ));
    }

    #[test]
    fn test_base_url_path_prefix_is_stripped() {
        let matcher = DefaultUrlMatcher::new(
            DEFAULT_IGNORED_URL_PARAMETERS,
            Some("https://tenant.example.com/api/"),
        );
        assert_eq!(
            matcher
                .normalize("https://tenant.example.com/api/inventory")
                .as_deref(),
            Some("/inventory")
        );
    }

    #[test]
    fn test_percent_decoding() {
        let matcher = DefaultUrlMatcher::default();
        assert!(matcher.matches(
            "/inventory/managedObjects?query=name%20eq%20'x'",
            "/inventory/managedObjects?query=name eq 'x'"
        ));
        assert!(matcher.matches("/a%2Fb", "/a/b"));
    }

    #[test]
    fn test_cache_buster_removed_entirely() {
        let matcher = DefaultUrlMatcher::default();
        assert_eq!(matcher.normalize("/a?_=123").as_deref(), Some("/a"));
    }

    #[test]
    fn test_from_options_layering() {
        let call = RequestMatchingOptions {
            ignore_url_parameters: Some(vec!["x".into()]),
            base_url: None,
        };
        let config = RequestMatchingOptions {
            ignore_url_parameters: Some(vec!["y".into()]),
            base_url: Some("https://h".into()),
        };
        let matcher = DefaultUrlMatcher::from_options(&[Some(&call), None, Some(&config)]);
        assert_eq!(matcher.ignored_parameters(), ["x".to_string()]);
        assert!(matcher.matches("https://h/a", "/a"));
    }
}
