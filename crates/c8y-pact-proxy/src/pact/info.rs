//! Descriptive pact metadata.

use crate::matching::RequestMatchingOptions;
use crate::preprocessor::PreprocessorOptions;
use serde::{Deserialize, Serialize};

/// Version of the persisted pact format written by this crate.
pub const PACT_FORMAT_VERSION: &str = "1";

/// Producer or consumer of a pact, either `{"name": ...}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PactParty {
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    Plain(String),
}

impl PactParty {
    pub fn name(&self) -> &str {
        match self {
            PactParty::Named { name, .. } => name,
            PactParty::Plain(name) => name,
        }
    }
}

/// Version stamps of the system, runner and pact format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PactVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c8ypact: Option<String>,
}

impl PactVersion {
    /// Version stamps for pacts recorded by this build.
    pub fn current() -> Self {
        Self {
            system: None,
            runner: Some(format!("c8yctrl/{}", env!("CARGO_PKG_VERSION"))),
            c8ypact: Some(PACT_FORMAT_VERSION.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PactInfo {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<PactParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<PactParty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PactVersion>,
    /// Requirements the system under test must satisfy for this pact
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor: Option<PreprocessorOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_matching: Option<RequestMatchingOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_matching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_mocking: Option<bool>,
}

impl PactInfo {
    pub fn with_title<I, S>(title: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_party_accepts_both_shapes() {
        let named: PactParty = serde_json::from_value(json!({"name": "ui"})).unwrap();
        let plain: PactParty = serde_json::from_value(json!("ui")).unwrap();
        assert_eq!(named.name(), "ui");
        assert_eq!(plain.name(), "ui");
    }

    #[test]
    fn test_info_camel_case_fields() {
        let info: PactInfo = serde_json::from_value(json!({
            "title": ["suite", "test"],
            "baseUrl": "https://tenant.example.com",
            "strictMocking": false,
            "requestMatching": {"ignoreUrlParameters": ["dateFrom"]},
            "version": {"c8ypact": "1"}
        }))
        .unwrap();
        assert_eq!(info.title, vec!["suite", "test"]);
        assert_eq!(info.base_url.as_deref(), Some("https://tenant.example.com"));
        assert_eq!(info.strict_mocking, Some(false));
        assert_eq!(
            info.request_matching
                .unwrap()
                .ignore_url_parameters
                .unwrap(),
            vec!["dateFrom"]
        );
    }

    #[test]
    fn test_current_version_stamps_format() {
        let version = PactVersion::current();
        assert_eq!(version.c8ypact.as_deref(), Some(PACT_FORMAT_VERSION));
        assert!(version.runner.unwrap().starts_with("c8yctrl/"));
    }
}
