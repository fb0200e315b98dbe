//! Backend credentials and mock response settings.

use crate::pact::PactAuth;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Credentials used to compute an `Authorization` header for recorded
/// requests that arrive without one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl AuthConfig {
    /// `Basic` header value; the user is prefixed with `tenant/` when a
    /// tenant is configured.
    pub fn basic_header(&self) -> String {
        let user = match &self.tenant {
            Some(tenant) if !self.user.contains('/') => format!("{}/{}", tenant, self.user),
            _ => self.user.clone(),
        };
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, self.password)))
    }

    /// Descriptor stored with recorded records. Carries no password.
    pub fn pact_auth(&self) -> PactAuth {
        PactAuth {
            user: Some(self.user.clone()),
            alias: None,
            auth_type: Some("BasicAuth".to_string()),
        }
    }
}

/// Response served when strict mocking finds no recorded record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockNotFoundResponse {
    #[serde(default = "default_not_found_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_not_found_status() -> u16 {
    404
}
