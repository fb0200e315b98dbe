//! Pact and recording mode definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the controller captures traffic or replays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PactMode {
    /// Plain pass-through proxy, nothing recorded or mocked
    #[default]
    Disabled,
    /// Forward to the backend and record every response
    #[serde(alias = "recording")]
    Record,
    /// Serve recorded responses instead of contacting the backend
    #[serde(alias = "mock", alias = "mocking")]
    Apply,
}

impl PactMode {
    pub fn is_recording(self) -> bool {
        self == PactMode::Record
    }

    pub fn is_mocking(self) -> bool {
        self == PactMode::Apply
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PactMode::Disabled => "disabled",
            PactMode::Record => "record",
            PactMode::Apply => "apply",
        }
    }
}

impl FromStr for PactMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(PactMode::Disabled),
            "record" | "recording" => Ok(PactMode::Record),
            "apply" | "mock" | "mocking" => Ok(PactMode::Apply),
            other => Err(format!("unknown pact mode: {other}")),
        }
    }
}

impl fmt::Display for PactMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How incoming records merge into an existing pact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Add every record to the end
    #[default]
    Append,
    /// Skip records that are structurally equal to a stored one
    New,
    /// Replace the first stored record with the same request
    Replace,
    /// Clear all records when the session starts, then append
    Refresh,
}

impl RecordingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordingMode::Append => "append",
            RecordingMode::New => "new",
            RecordingMode::Replace => "replace",
            RecordingMode::Refresh => "refresh",
        }
    }
}

impl FromStr for RecordingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "append" => Ok(RecordingMode::Append),
            "new" => Ok(RecordingMode::New),
            "replace" => Ok(RecordingMode::Replace),
            "refresh" => Ok(RecordingMode::Refresh),
            other => Err(format!("unknown recording mode: {other}")),
        }
    }
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
