//! Configuration for the c8yctrl controller.
//!
//! Loaded from YAML, then overlaid with command line and environment values
//! collected in [`Overrides`]. Unset values fall back to built-in defaults.

mod auth;
mod listen;

use crate::matching::{RequestMatchingOptions, DEFAULT_IGNORED_URL_PARAMETERS};
use crate::pact::{MockSequencing, PactMode, RecordingMode};
use crate::preprocessor::PreprocessorOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use url::Url;

pub use auth::{AuthConfig, MockNotFoundResponse};
pub use listen::{ListenConfig, DEFAULT_PORT};

pub const DEFAULT_RESOURCE_PATH: &str = "/c8yctrl";
pub const DEFAULT_FOLDER: &str = "./c8ypact";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// Backend that requests are forwarded to. Without it only mocking works.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Folder holding one JSON file per pact
    #[serde(default = "default_folder")]
    pub folder: PathBuf,

    /// Prefix of the administrative endpoints
    #[serde(default = "default_resource_path")]
    pub resource_path: String,

    #[serde(default)]
    pub mode: PactMode,
    #[serde(default)]
    pub recording_mode: RecordingMode,
    #[serde(default = "default_true")]
    pub strict_mocking: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor: Option<PreprocessorOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_matching: Option<RequestMatchingOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_not_found_response: Option<MockNotFoundResponse>,
    /// Recorded response headers re-added on mocked responses, in addition
    /// to `content-type` and `set-cookie`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mock_response_headers: Vec<String>,
    #[serde(default)]
    pub mock_sequencing: MockSequencing,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Skip TLS certificate verification towards the backend
    #[serde(default)]
    pub tls_skip_verify: bool,
}

fn default_folder() -> PathBuf {
    PathBuf::from(DEFAULT_FOLDER)
}

fn default_resource_path() -> String {
    DEFAULT_RESOURCE_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            base_url: None,
            tenant: None,
            folder: default_folder(),
            resource_path: default_resource_path(),
            mode: PactMode::default(),
            recording_mode: RecordingMode::default(),
            strict_mocking: true,
            preprocessor: None,
            request_matching: None,
            auth: None,
            mock_not_found_response: None,
            mock_response_headers: Vec::new(),
            mock_sequencing: MockSequencing::default(),
            log_level: default_log_level(),
            tls_skip_verify: false,
        }
    }
}

/// Values taken from the command line or the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub tenant: Option<String>,
    pub folder: Option<PathBuf>,
    pub resource_path: Option<String>,
    pub mode: Option<PactMode>,
    pub recording_mode: Option<RecordingMode>,
    pub strict_mocking: Option<bool>,
    pub ignore_url_parameters: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Overlay command line and environment values.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.listen.port = port;
        }
        if overrides.base_url.is_some() {
            self.base_url = overrides.base_url;
        }
        if overrides.tenant.is_some() {
            self.tenant = overrides.tenant;
        }
        if let Some(folder) = overrides.folder {
            self.folder = folder;
        }
        if let Some(resource_path) = overrides.resource_path {
            self.resource_path = resource_path;
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(recording_mode) = overrides.recording_mode {
            self.recording_mode = recording_mode;
        }
        if let Some(strict_mocking) = overrides.strict_mocking {
            self.strict_mocking = strict_mocking;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }

        if overrides.ignore_url_parameters.is_some() {
            self.request_matching
                .get_or_insert_with(Default::default)
                .ignore_url_parameters = overrides.ignore_url_parameters;
        }

        if let Some(user) = overrides.username {
            let auth = self.auth.get_or_insert_with(Default::default);
            auth.user = user;
        }
        if let (Some(password), Some(auth)) = (overrides.password, self.auth.as_mut()) {
            auth.password = password;
        }
        if let (Some(tenant), Some(auth)) = (&self.tenant, self.auth.as_mut()) {
            if auth.tenant.is_none() {
                auth.tenant = Some(tenant.clone());
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(base_url) = &self.base_url {
            let url = Url::parse(base_url)
                .map_err(|e| anyhow::anyhow!("Invalid baseUrl '{base_url}': {e}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!(
                    "Unsupported baseUrl scheme '{}'. Currently supported: http, https",
                    url.scheme()
                );
            }
        }

        if !self.resource_path.starts_with('/')
            || self.resource_path.trim_end_matches('/').is_empty()
        {
            anyhow::bail!(
                "resourcePath must start with '/' and name a path segment, got '{}'",
                self.resource_path
            );
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            anyhow::bail!("Unknown logLevel '{}'", self.log_level);
        }

        if let Some(response) = &self.mock_not_found_response {
            if !(100..=599).contains(&response.status) {
                anyhow::bail!(
                    "mockNotFoundResponse.status must be a valid HTTP status, got {}",
                    response.status
                );
            }
        }

        if let Some(auth) = &self.auth {
            if auth.user.is_empty() {
                anyhow::bail!("auth.user must not be empty");
            }
        }

        Ok(())
    }

    /// Resource path without a trailing slash.
    pub fn resource_root(&self) -> &str {
        self.resource_path.trim_end_matches('/')
    }

    /// Request matching options with the built-in defaults filled in.
    pub fn effective_request_matching(&self) -> RequestMatchingOptions {
        let configured = self.request_matching.clone().unwrap_or_default();
        RequestMatchingOptions {
            ignore_url_parameters: configured.ignore_url_parameters.or_else(|| {
                Some(
                    DEFAULT_IGNORED_URL_PARAMETERS
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                )
            }),
            base_url: configured.base_url.or_else(|| self.base_url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.listen.port, DEFAULT_PORT);
        assert_eq!(config.resource_path, "/c8yctrl");
        assert_eq!(config.mode, PactMode::Disabled);
        assert_eq!(config.recording_mode, RecordingMode::Append);
        assert!(config.strict_mocking);
        assert_eq!(config.mock_sequencing, MockSequencing::Sequential);
        assert_eq!(
            config.effective_request_matching().ignore_url_parameters,
            Some(vec!["dateFrom".to_string(), "dateTo".to_string(), "_".to_string()])
        );
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
listen:
  host: 0.0.0.0
  port: 8181
baseUrl: https://t100.example.com
tenant: t100
folder: /tmp/pacts
resourcePath: /ctrl
mode: mock
recordingMode: replace
strictMocking: false
preprocessor:
  obfuscate: ["request.headers.Authorization"]
  obfuscationPattern: "<hidden>"
requestMatching:
  ignoreUrlParameters: ["withTotalPages"]
auth:
  user: admin
  password: secret
mockNotFoundResponse:
  status: 418
  body: {"error": "teapot"}
mockResponseHeaders: ["x-custom"]
mockSequencing: first
logLevel: debug
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.listen.socket_addr().unwrap().port(), 8181);
        assert_eq!(config.mode, PactMode::Apply);
        assert_eq!(config.recording_mode, RecordingMode::Replace);
        assert!(!config.strict_mocking);
        assert_eq!(config.resource_root(), "/ctrl");
        assert_eq!(
            config.preprocessor.as_ref().unwrap().obfuscation_pattern.as_deref(),
            Some("<hidden>")
        );
        assert_eq!(config.auth.as_ref().unwrap().password, "secret");
        assert_eq!(config.mock_not_found_response.as_ref().unwrap().status, 418);
        assert_eq!(config.mock_sequencing, MockSequencing::First);
        let matching = config.effective_request_matching();
        assert_eq!(matching.ignore_url_parameters, Some(vec!["withTotalPages".to_string()]));
        assert_eq!(matching.base_url.as_deref(), Some("https://t100.example.com"));
    }

    #[test]
    fn test_validation_errors() {
        assert!(Config::from_yaml_str("baseUrl: not a url").is_err());
        assert!(Config::from_yaml_str("baseUrl: ftp://host").is_err());
        assert!(Config::from_yaml_str("resourcePath: ctrl").is_err());
        assert!(Config::from_yaml_str("resourcePath: /").is_err());
        assert!(Config::from_yaml_str("logLevel: loud").is_err());
        assert!(Config::from_yaml_str("mockNotFoundResponse:\n  status: 1000").is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let yaml = "baseUrl: https://a.example.com\n\
                    mode: record\n\
                    preprocessor:\n  ignore: [\"request.body\"]\n";
        let mut config = Config::from_yaml_str(yaml).unwrap();
        config.apply_overrides(Overrides {
            port: Some(9000),
            base_url: Some("https://b.example.com".into()),
            tenant: Some("t200".into()),
            mode: Some(PactMode::Apply),
            ignore_url_parameters: Some(vec![]),
            username: Some("admin".into()),
            password: Some("pw".into()),
            ..Default::default()
        });
        assert_eq!(config.listen.port, 9000);
        assert_eq!(config.base_url.as_deref(), Some("https://b.example.com"));
        assert_eq!(config.mode, PactMode::Apply);
        let preprocessor = config.preprocessor.as_ref().unwrap();
        assert_eq!(preprocessor.ignore, Some(vec!["request.body".to_string()]));
        assert_eq!(preprocessor.obfuscate, None);
        assert_eq!(
            config.effective_request_matching().ignore_url_parameters,
            Some(vec![])
        );
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.user, "admin");
        assert_eq!(auth.password, "pw");
        assert_eq!(auth.tenant.as_deref(), Some("t200"));
    }
}
