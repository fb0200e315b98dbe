//! Matching of live responses against recorded pact records.

use super::url::{DefaultUrlMatcher, UrlMatcher};
use crate::error::{PactError, Result};
use crate::pact::PactRecord;
use crate::schema::{JsonSchemaMatcher, SchemaMatcher};
use serde_json::Value;
use similar::TextDiff;
use std::sync::Arc;

/// Properties skipped at any depth unless configured otherwise.
pub const DEFAULT_IGNORED_PROPERTIES: [&str; 6] =
    ["id", "self", "date", "duration", "lastUpdated", "creationTime"];

/// What a live record is checked against, decided by the caller.
#[derive(Debug, Clone, Copy)]
pub enum MatchInput<'a> {
    /// Structural comparison against a stored record
    Record(&'a PactRecord),
    /// Validation of the response body against a JSON Schema
    Schema(&'a Value),
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Every expected property must be present in the actual record
    pub strict_matching: bool,
    /// Compare request and response headers as well
    pub compare_headers: bool,
    pub ignore_properties: Vec<String>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            strict_matching: true,
            compare_headers: false,
            ignore_properties: DEFAULT_IGNORED_PROPERTIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MatchOptions {
    pub fn lenient() -> Self {
        Self {
            strict_matching: false,
            ..Default::default()
        }
    }
}

/// Checks a live record against an expectation.
pub trait PactMatcher: Send + Sync {
    /// `Ok(())` on match, [`PactError::Matching`] with a readable diff otherwise.
    fn check(
        &self,
        actual: &PactRecord,
        expected: MatchInput<'_>,
        options: &MatchOptions,
    ) -> Result<()>;

    fn matches(
        &self,
        actual: &PactRecord,
        expected: MatchInput<'_>,
        options: &MatchOptions,
    ) -> bool {
        self.check(actual, expected, options).is_ok()
    }
}

/// Structural matcher that hands `$body` schemas and schema inputs to a
/// [`SchemaMatcher`].
pub struct DefaultPactMatcher {
    schema_matcher: Arc<dyn SchemaMatcher>,
    url_matcher: Arc<dyn UrlMatcher>,
}

impl Default for DefaultPactMatcher {
    fn default() -> Self {
        Self::new(
            Arc::new(JsonSchemaMatcher),
            Arc::new(DefaultUrlMatcher::default()),
        )
    }
}

impl DefaultPactMatcher {
    pub fn new(schema_matcher: Arc<dyn SchemaMatcher>, url_matcher: Arc<dyn UrlMatcher>) -> Self {
        Self {
            schema_matcher,
            url_matcher,
        }
    }

    fn check_record(
        &self,
        actual: &PactRecord,
        expected: &PactRecord,
        options: &MatchOptions,
    ) -> Result<()> {
        let context = describe(actual);
        let mut diffs = Vec::new();

        if let (Some(expected_url), Some(actual_url)) = (&expected.request.url, &actual.request.url)
        {
            if !self.url_matcher.matches(expected_url, actual_url) {
                diffs.push(format!(
                    "request.url: expected {expected_url}, got {actual_url}"
                ));
            }
        } else if options.strict_matching && expected.request.url.is_some() {
            diffs.push("request.url: missing in actual".to_string());
        }

        let mut expected_request = to_value(&expected.request)?;
        let mut actual_request = to_value(&actual.request)?;
        strip(&mut expected_request, &["url"], options);
        strip(&mut actual_request, &["url"], options);
        compare(&expected_request, &actual_request, "request", options, &mut diffs);

        let mut expected_response = to_value(&expected.response)?;
        let mut actual_response = to_value(&actual.response)?;
        strip(&mut expected_response, &["$body", "isOkStatusCode"], options);
        strip(&mut actual_response, &["$body", "isOkStatusCode"], options);

        if let Some(schema) = &expected.response.body_schema {
            if let Some(map) = expected_response.as_object_mut() {
                map.remove("body");
            }
            let body = actual.response.body.clone().unwrap_or(Value::Null);
            self.schema_matcher
                .validate(&body, schema)
                .map_err(|e| PactError::matching(context.clone(), e.to_string()))?;
        }
        compare(&expected_response, &actual_response, "response", options, &mut diffs);

        if diffs.is_empty() {
            return Ok(());
        }
        let mut message = diffs.join("\n");
        if let Some(diff) = body_diff(expected, actual) {
            message.push('\n');
            message.push_str(&diff);
        }
        Err(PactError::matching(context, message))
    }
}

impl PactMatcher for DefaultPactMatcher {
    fn check(
        &self,
        actual: &PactRecord,
        expected: MatchInput<'_>,
        options: &MatchOptions,
    ) -> Result<()> {
        match expected {
            MatchInput::Record(record) => self.check_record(actual, record, options),
            MatchInput::Schema(schema) => {
                let body = actual.response.body.clone().unwrap_or(Value::Null);
                self.schema_matcher
                    .validate(&body, schema)
                    .map_err(|e| PactError::matching(describe(actual), e.to_string()))
            }
        }
    }
}

fn describe(record: &PactRecord) -> String {
    format!(
        "{} {} ({})",
        record.request.method.as_deref().unwrap_or("?"),
        record.request.url.as_deref().unwrap_or("?"),
        record
            .response
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no status".to_string())
    )
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| PactError::matching("serialization", e.to_string()))
}

fn strip(value: &mut Value, keys: &[&str], options: &MatchOptions) {
    if let Some(map) = value.as_object_mut() {
        for key in keys {
            map.remove(*key);
        }
        if !options.compare_headers {
            map.remove("headers");
        }
    }
}

fn is_ignored(key: &str, options: &MatchOptions) -> bool {
    options.ignore_properties.iter().any(|p| p == key)
}

fn compare(
    expected: &Value,
    actual: &Value,
    path: &str,
    options: &MatchOptions,
    diffs: &mut Vec<String>,
) {
    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            for (key, expected_value) in expected_map {
                if is_ignored(key, options) {
                    continue;
                }
                let child = format!("{path}.{key}");
                match actual_map.get(key) {
                    Some(actual_value) => {
                        compare(expected_value, actual_value, &child, options, diffs)
                    }
                    None if options.strict_matching => {
                        diffs.push(format!("{child}: missing in actual"));
                    }
                    None => {}
                }
            }
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if options.strict_matching && expected_items.len() != actual_items.len() {
                diffs.push(format!(
                    "{path}: expected {} items, got {}",
                    expected_items.len(),
                    actual_items.len()
                ));
            }
            for (index, (e, a)) in expected_items.iter().zip(actual_items).enumerate() {
                compare(e, a, &format!("{path}.{index}"), options, diffs);
            }
        }
        (e, a) if e != a => diffs.push(format!("{path}: expected {e}, got {a}")),
        _ => {}
    }
}

fn body_diff(expected: &PactRecord, actual: &PactRecord) -> Option<String> {
    let expected_body = expected.response.body.as_ref()?;
    let actual_body = actual.response.body.as_ref()?;
    let left = serde_json::to_string_pretty(expected_body).ok()?;
    let right = serde_json::to_string_pretty(actual_body).ok()?;
    if left == right {
        return None;
    }
    Some(
        TextDiff::from_lines(&left, &right)
            .unified_diff()
            .header("expected", "actual")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pact::{PactRequest, PactResponse};
    use serde_json::json;

    fn record(status: u16, body: Value) -> PactRecord {
        PactRecord::new(
            PactRequest::new("GET", "/inventory/managedObjects/1"),
            PactResponse::new(status).with_body(body),
        )
    }

    #[test]
    fn test_strict_tolerates_extra_fields() {
        let matcher = DefaultPactMatcher::default();
        let expected = record(200, json!({"a": 1}));
        let actual = record(200, json!({"a": 1, "b": 2}));
        assert!(matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::default()));
    }

    #[test]
    fn test_strict_fails_on_changed_or_missing_field() {
        let matcher = DefaultPactMatcher::default();
        let expected = record(200, json!({"a": 1}));
        let changed = record(200, json!({"a": 2, "b": 2}));
        let missing = record(200, json!({"b": 2}));
        let options = MatchOptions::default();

        let err = matcher
            .check(&changed, MatchInput::Record(&expected), &options)
            .unwrap_err();
        assert!(err.to_string().contains("response.body.a: expected 1, got 2"));
        assert!(err.to_string().contains("GET /inventory/managedObjects/1 (200)"));

        let err = matcher
            .check(&missing, MatchInput::Record(&expected), &options)
            .unwrap_err();
        assert!(err.to_string().contains("response.body.a: missing in actual"));
    }

    #[test]
    fn test_lenient_only_compares_overlap() {
        let matcher = DefaultPactMatcher::default();
        let expected = record(200, json!({"a": 1, "onlyExpected": true}));
        let actual = record(200, json!({"a": 1, "b": 2}));
        assert!(matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::lenient()));
        assert!(!matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::default()));

        let differs = record(200, json!({"a": 3}));
        assert!(!matcher.matches(
            &differs,
            MatchInput::Record(&expected),
            &MatchOptions::lenient()
        ));
    }

    #[test]
    fn test_status_mismatch_fails() {
        let matcher = DefaultPactMatcher::default();
        let expected = record(200, json!({}));
        let actual = record(404, json!({}));
        assert!(!matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::lenient()));
    }

    #[test]
    fn test_ignored_properties_and_headers() {
        let matcher = DefaultPactMatcher::default();
        let mut expected = record(200, json!({"id": "1", "lastUpdated": "yesterday", "name": "x"}));
        let mut actual = record(200, json!({"id": "2", "lastUpdated": "today", "name": "x"}));
        expected.response.duration = Some(5);
        actual.response.duration = Some(500);
        expected
            .response
            .headers
            .insert("date".into(), "Mon".into());
        assert!(matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::default()));

        let with_headers = MatchOptions {
            compare_headers: true,
            ..Default::default()
        };
        assert!(!matcher.matches(&actual, MatchInput::Record(&expected), &with_headers));
    }

    #[test]
    fn test_url_compared_with_url_matcher() {
        let matcher = DefaultPactMatcher::default();
        let mut expected = record(200, json!({}));
        expected.request.url = Some("/measurement/measurements?dateFrom=a&source=1".into());
        let mut actual = expected.clone();
        actual.request.url = Some("/measurement/measurements?dateFrom=b&source=1".into());
        assert!(matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::default()));

        actual.request.url = Some("/measurement/measurements?source=2".into());
        assert!(!matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::default()));
    }

    #[test]
    fn test_schema_input() {
        let matcher = DefaultPactMatcher::default();
        let schema = json!({"type": "object", "required": ["name"]});
        let ok = record(200, json!({"name": "x"}));
        let bad = record(200, json!({"other": 1}));
        let lenient = MatchOptions::lenient();
        assert!(matcher.matches(&ok, MatchInput::Schema(&schema), &lenient));
        let err = matcher
            .check(&bad, MatchInput::Schema(&schema), &lenient)
            .unwrap_err();
        assert!(matches!(err, PactError::Matching { .. }));
    }

    #[test]
    fn test_body_schema_in_record_replaces_body_comparison() {
        let matcher = DefaultPactMatcher::default();
        let mut expected = record(200, json!({"name": "recorded"}));
        expected.response.body_schema = Some(json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        }));
        let actual = record(200, json!({"name": "live"}));
        assert!(matcher.matches(&actual, MatchInput::Record(&expected), &MatchOptions::lenient()));

        let wrong = record(200, json!({"name": 5}));
        assert!(!matcher.matches(&wrong, MatchInput::Record(&expected), &MatchOptions::lenient()));
    }

    #[test]
    fn test_error_includes_unified_body_diff() {
        let matcher = DefaultPactMatcher::default();
        let expected = record(200, json!({"a": 1}));
        let actual = record(200, json!({"a": 2}));
        let err = matcher
            .check(&actual, MatchInput::Record(&expected), &MatchOptions::default())
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("--- expected"));
        assert!(text.contains("+++ actual"));
    }
}
