//! Error taxonomy for the pact engine.

use hyper::StatusCode;

/// Errors raised by the pact model, matchers, adapter and controller.
#[derive(Debug, thiserror::Error)]
pub enum PactError {
    /// A persisted or in-memory object failed structural validation.
    #[error("Malformed pact {id}: {reason}")]
    MalformedPact { id: String, reason: String },

    /// An actual response did not match the expected record or schema.
    #[error("Pact validation failed for {context}: {message}")]
    Matching { context: String, message: String },

    /// A pact id was requested that does not exist and recording is off.
    #[error("Pact not found: {0}")]
    NotFound(String),

    /// File-system failure in the adapter.
    #[error("Adapter I/O error during {operation} of pact {id}: {source}")]
    AdapterIo {
        operation: &'static str,
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend unreachable or errored while proxying.
    #[error("Proxy transport error for {url}: {message}")]
    ProxyTransport { url: String, message: String },

    /// A JSON Schema could not be compiled.
    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PactError {
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        PactError::MalformedPact {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn matching(context: impl Into<String>, message: impl Into<String>) -> Self {
        PactError::Matching {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn adapter_io(
        operation: &'static str,
        id: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PactError::AdapterIo {
            operation,
            id: id.into(),
            source,
        }
    }

    /// HTTP status used when the error is surfaced through the admin interface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PactError::MalformedPact { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PactError::Matching { .. } => StatusCode::CONFLICT,
            PactError::NotFound(_) => StatusCode::NOT_FOUND,
            PactError::AdapterIo { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PactError::ProxyTransport { .. } => StatusCode::BAD_GATEWAY,
            PactError::Schema(_) | PactError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        }
    }
}

pub type Result<T, E = PactError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PactError::NotFound("a".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PactError::malformed("a", "missing info").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            PactError::ProxyTransport {
                url: "http://x".into(),
                message: "refused".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_matching_message_carries_context() {
        let err = PactError::matching("GET /inventory (200)", "body.a: expected 1, got 2");
        let text = err.to_string();
        assert!(text.contains("GET /inventory (200)"));
        assert!(text.contains("body.a"));
    }

    #[test]
    fn test_adapter_io_names_operation() {
        let err = PactError::adapter_io(
            "save",
            "suite__test",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("save"));
        assert!(err.to_string().contains("suite__test"));
    }
}
