//! Tracing subscriber setup and runtime log-level control.

use crate::error::{PactError, Result};
use parking_lot::Mutex;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Read and change the active log level.
pub trait LogLevelControl: Send + Sync {
    fn level(&self) -> String;
    fn set_level(&self, level: &str) -> Result<()>;
}

/// Controls the global subscriber installed by [`init`].
pub struct ReloadLogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
    current: Mutex<String>,
}

impl LogLevelControl for ReloadLogLevel {
    fn level(&self) -> String {
        self.current.lock().clone()
    }

    fn set_level(&self, level: &str) -> Result<()> {
        let filter = EnvFilter::try_new(level)
            .map_err(|e| PactError::InvalidConfig(format!("invalid log level '{level}': {e}")))?;
        self.handle
            .reload(filter)
            .map_err(|e| PactError::InvalidConfig(format!("failed to reload log filter: {e}")))?;
        *self.current.lock() = level.to_string();
        info!("Log level set to {}", level);
        Ok(())
    }
}

/// In-memory level holder for controllers that do not own the global
/// subscriber, e.g. several controllers started by one test binary.
#[derive(Debug)]
pub struct StaticLogLevel {
    level: Mutex<String>,
}

impl StaticLogLevel {
    pub fn new(level: &str) -> Self {
        Self {
            level: Mutex::new(level.to_string()),
        }
    }
}

impl Default for StaticLogLevel {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogLevelControl for StaticLogLevel {
    fn level(&self) -> String {
        self.level.lock().clone()
    }

    fn set_level(&self, level: &str) -> Result<()> {
        LevelFilter::from_str(level)
            .map_err(|e| PactError::InvalidConfig(format!("invalid log level '{level}': {e}")))?;
        *self.level.lock() = level.to_ascii_lowercase();
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
pub fn init(default_level: &str) -> anyhow::Result<ReloadLogLevel> {
    let (directives, filter) = match std::env::var("RUST_LOG") {
        Ok(env) if !env.trim().is_empty() => (env.clone(), EnvFilter::try_new(env)?),
        _ => (default_level.to_string(), EnvFilter::try_new(default_level)?),
    };
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;
    Ok(ReloadLogLevel {
        handle,
        current: Mutex::new(directives),
    })
}

/// Emit a client supplied message at the given level.
pub fn emit(level: &str, message: &str) {
    match level.to_ascii_lowercase().as_str() {
        "error" => error!("{}", message),
        "warn" | "warning" => warn!("{}", message),
        "debug" => debug!("{}", message),
        "trace" => trace!("{}", message),
        _ => info!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_static_level_validates() {
        let control = StaticLogLevel::default();
        assert_eq!(control.level(), "info");
        control.set_level("DEBUG").unwrap();
        assert_eq!(control.level(), "debug");
        assert!(control.set_level("loud").is_err());
        assert_eq!(control.level(), "debug");
    }

    #[traced_test]
    #[test]
    fn test_emit_logs_message() {
        emit("warn", "from the test runner");
        assert!(logs_contain("from the test runner"));
    }
}
