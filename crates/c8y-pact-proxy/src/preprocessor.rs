//! Redaction of records before they are persisted or compared.
//!
//! `obfuscate` paths are overwritten with the obfuscation pattern when they
//! hold a non-null value; `ignore` paths are deleted. Paths are dotted key
//! paths relative to a record and must start with `request` or `response`.
//! Anything else, in particular the reserved pact keys, is left untouched.

use crate::error::{PactError, Result};
use crate::keypath;
use crate::pact::PactRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_OBFUSCATION_PATTERN: &str = "********";

/// Keys of a pact document that preprocessing never touches.
pub const RESERVED_KEYS: [&str; 4] = ["id", "info", "records", "pact"];

/// Record sub-trees preprocessing may modify.
const PROCESSABLE_ROOTS: [&str; 2] = ["request", "response"];

/// Preprocessor options. Unset fields fall through to the next layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessorOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscate: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscation_pattern: Option<String>,
}

impl PreprocessorOptions {
    pub fn is_empty(&self) -> bool {
        self.ignore.is_none() && self.obfuscate.is_none() && self.obfuscation_pattern.is_none()
    }
}

/// Fully resolved options after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPreprocessorOptions {
    pub ignore: Vec<String>,
    pub obfuscate: Vec<String>,
    pub obfuscation_pattern: String,
}

impl ResolvedPreprocessorOptions {
    /// Resolve layers from highest to lowest precedence; the first layer
    /// that sets a field wins, built-in empty defaults fill the rest.
    pub fn resolve(layers: &[Option<&PreprocessorOptions>]) -> Self {
        let present = || layers.iter().flatten();
        Self {
            ignore: present().find_map(|o| o.ignore.clone()).unwrap_or_default(),
            obfuscate: present()
                .find_map(|o| o.obfuscate.clone())
                .unwrap_or_default(),
            obfuscation_pattern: present()
                .find_map(|o| o.obfuscation_pattern.clone())
                .unwrap_or_else(|| DEFAULT_OBFUSCATION_PATTERN.to_string()),
        }
    }
}

/// Strategy applied to records before persistence or comparison.
pub trait PactPreprocessor: Send + Sync {
    /// Apply to a single record-like value or to every entry of `records`.
    fn apply(&self, target: &mut Value, options: Option<&PreprocessorOptions>);

    /// Typed convenience over [`PactPreprocessor::apply`].
    fn apply_to_record(
        &self,
        record: &mut PactRecord,
        options: Option<&PreprocessorOptions>,
    ) -> Result<()> {
        let mut value = serde_json::to_value(&*record)
            .map_err(|e| PactError::malformed("record", e.to_string()))?;
        self.apply(&mut value, options);
        *record = serde_json::from_value(value).map_err(|e| {
            PactError::malformed("record", format!("preprocessing broke the record: {e}"))
        })?;
        Ok(())
    }
}

/// Default preprocessor holding environment and instance defaults.
#[derive(Debug, Clone, Default)]
pub struct DefaultPreprocessor {
    env_defaults: Option<PreprocessorOptions>,
    instance_defaults: Option<PreprocessorOptions>,
}

impl DefaultPreprocessor {
    pub fn new(instance_defaults: Option<PreprocessorOptions>) -> Self {
        Self {
            env_defaults: None,
            instance_defaults,
        }
    }

    pub fn with_env_defaults(mut self, env_defaults: Option<PreprocessorOptions>) -> Self {
        self.env_defaults = env_defaults;
        self
    }

    pub fn resolve(&self, options: Option<&PreprocessorOptions>) -> ResolvedPreprocessorOptions {
        ResolvedPreprocessorOptions::resolve(&[
            options,
            self.env_defaults.as_ref(),
            self.instance_defaults.as_ref(),
        ])
    }

    fn process_record(record: &mut Value, resolved: &ResolvedPreprocessorOptions) {
        if !record.is_object() {
            return;
        }
        let pattern = Value::String(resolved.obfuscation_pattern.clone());
        for path in &resolved.obfuscate {
            if is_processable(path) {
                keypath::replace_existing(record, path, pattern.clone());
            }
        }
        for path in &resolved.ignore {
            if is_processable(path) {
                keypath::remove(record, path);
            }
        }
    }
}

fn is_processable(path: &str) -> bool {
    let root = keypath::segments(path).first().copied().unwrap_or_default();
    let allowed = !RESERVED_KEYS.contains(&root)
        && PROCESSABLE_ROOTS.contains(&root)
        && keypath::segments(path).len() > 1;
    if !allowed {
        debug!(
            "Skipping preprocessor path '{}' (only request/response sub-keys are processed)",
            path
        );
    }
    allowed
}

impl PactPreprocessor for DefaultPreprocessor {
    fn apply(&self, target: &mut Value, options: Option<&PreprocessorOptions>) {
        let resolved = self.resolve(options);
        if resolved.ignore.is_empty() && resolved.obfuscate.is_empty() {
            return;
        }
        match target.get_mut("records") {
            Some(Value::Array(records)) => {
                for record in records.iter_mut() {
                    Self::process_record(record, &resolved);
                }
            }
            _ => Self::process_record(target, &resolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(ignore: &[&str], obfuscate: &[&str]) -> PreprocessorOptions {
        PreprocessorOptions {
            ignore: Some(ignore.iter().map(|s| s.to_string()).collect()),
            obfuscate: Some(obfuscate.iter().map(|s| s.to_string()).collect()),
            obfuscation_pattern: None,
        }
    }

    fn record() -> Value {
        json!({
            "request": {
                "url": "/user/currentUser",
                "headers": {"Authorization": "Basic abc", "X-Trace": "1"}
            },
            "response": {"status": 200, "body": {"password": "secret", "name": "admin"}}
        })
    }

    #[test]
    fn test_obfuscate_and_ignore() {
        let preprocessor = DefaultPreprocessor::default();
        let mut value = record();
        preprocessor.apply(
            &mut value,
            Some(&options(
                &["request.headers.x-trace"],
                &["request.headers.authorization", "response.body.password"],
            )),
        );
        assert_eq!(value["request"]["headers"]["Authorization"], "********");
        assert!(value["request"]["headers"].get("X-Trace").is_none());
        assert_eq!(value["response"]["body"]["password"], "********");
        assert_eq!(value["response"]["body"]["name"], "admin");
    }

    #[test]
    fn test_missing_paths_are_skipped() {
        let preprocessor = DefaultPreprocessor::default();
        let mut value = record();
        let before = value.clone();
        preprocessor.apply(
            &mut value,
            Some(&options(&["response.body.missing"], &["request.body.password"])),
        );
        assert_eq!(value, before);
    }

    #[test]
    fn test_obfuscation_is_stable_under_repetition() {
        let preprocessor = DefaultPreprocessor::default();
        let opts = options(&[], &["response.body.password"]);
        let mut once = record();
        preprocessor.apply(&mut once, Some(&opts));
        let mut twice = once.clone();
        preprocessor.apply(&mut twice, Some(&opts));
        assert_eq!(once, twice);
        assert_eq!(twice["response"]["body"]["password"], "********");
    }

    #[test]
    fn test_reserved_keys_are_protected() {
        let preprocessor = DefaultPreprocessor::default();
        let mut pact = json!({
            "id": "suite__test",
            "info": {"baseUrl": "https://h"},
            "records": [record()]
        });
        preprocessor.apply(
            &mut pact,
            Some(&options(
                &["id", "info", "records", "pact", "info.baseUrl"],
                &["id", "records.0", "info.baseUrl"],
            )),
        );
        assert_eq!(pact["id"], "suite__test");
        assert_eq!(pact["info"]["baseUrl"], "https://h");
        assert_eq!(pact["records"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_applies_to_every_record_of_a_pact() {
        let preprocessor = DefaultPreprocessor::default();
        let mut pact = json!({"id": "p", "info": {}, "records": [record(), record()]});
        preprocessor.apply(&mut pact, Some(&options(&[], &["response.body.password"])));
        for record in pact["records"].as_array().unwrap() {
            assert_eq!(record["response"]["body"]["password"], "********");
        }
    }

    #[test]
    fn test_option_precedence() {
        let call = PreprocessorOptions {
            obfuscation_pattern: Some("<call>".into()),
            ..Default::default()
        };
        let env = PreprocessorOptions {
            obfuscate: Some(vec!["response.body.password".into()]),
            obfuscation_pattern: Some("<env>".into()),
            ..Default::default()
        };
        let instance = PreprocessorOptions {
            ignore: Some(vec!["request.headers.X-Trace".into()]),
            obfuscate: Some(vec!["request.headers.Authorization".into()]),
            obfuscation_pattern: Some("<instance>".into()),
        };
        let preprocessor =
            DefaultPreprocessor::new(Some(instance)).with_env_defaults(Some(env));
        let resolved = preprocessor.resolve(Some(&call));
        assert_eq!(resolved.obfuscation_pattern, "<call>");
        assert_eq!(resolved.obfuscate, vec!["response.body.password"]);
        assert_eq!(resolved.ignore, vec!["request.headers.X-Trace"]);

        let builtin = DefaultPreprocessor::default().resolve(None);
        assert_eq!(builtin.obfuscation_pattern, DEFAULT_OBFUSCATION_PATTERN);
        assert!(builtin.ignore.is_empty());
    }

    #[test]
    fn test_apply_to_record() {
        use crate::pact::{PactRequest, PactResponse};
        let mut record = PactRecord::new(
            PactRequest::new("GET", "/user/currentUser"),
            PactResponse::new(200).with_body(json!({"password": "secret"})),
        );
        DefaultPreprocessor::default()
            .apply_to_record(&mut record, Some(&options(&[], &["response.body.password"])))
            .unwrap();
        assert_eq!(record.response.body.unwrap()["password"], "********");
    }
}
