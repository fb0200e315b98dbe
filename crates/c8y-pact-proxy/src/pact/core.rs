//! The pact: an ordered collection of records plus metadata.

use super::id::PactId;
use super::info::{PactInfo, PactVersion};
use super::mode::RecordingMode;
use super::record::{is_ok_status, PactAuth, PactRecord, PactRequest, PactResponse};
use crate::error::{PactError, Result};
use crate::matching::UrlMatcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Which of several matching records a mocked request receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MockSequencing {
    /// Successive identical requests get successive matching records; the
    /// last one repeats once they are used up
    #[default]
    Sequential,
    /// Always the first matching record
    First,
}

/// Persisted shape of a pact.
#[derive(Debug, Deserialize)]
struct PactDocument {
    id: PactId,
    info: PactInfo,
    records: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pact {
    pub id: PactId,
    pub info: PactInfo,
    pub records: Vec<PactRecord>,
    /// Position of the `next_record` cursor
    #[serde(skip)]
    cursor: usize,
    /// Mock replay position per group of matching records, keyed by the
    /// index of the group's first record
    #[serde(skip)]
    request_cursors: HashMap<usize, usize>,
}

impl PartialEq for Pact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.info == other.info && self.records == other.records
    }
}

impl Pact {
    pub fn new(id: PactId, info: PactInfo) -> Self {
        Self {
            id,
            info,
            records: Vec::new(),
            cursor: 0,
            request_cursors: HashMap::new(),
        }
    }

    /// Build a single-record pact from a completed exchange.
    ///
    /// The id is `info.id` when set, otherwise derived from `info.title`.
    pub fn from_response(
        request: PactRequest,
        response: PactResponse,
        mut info: PactInfo,
        auth: Option<PactAuth>,
    ) -> Self {
        let id = info
            .id
            .clone()
            .map(PactId::new)
            .unwrap_or_else(|| PactId::from_title(&info.title));
        if info.version.is_none() {
            info.version = Some(PactVersion::current());
        }
        let mut record = PactRecord::new(request, response);
        record.auth = auth;
        let mut pact = Self::new(id, info);
        pact.records.push(record);
        pact
    }

    /// Parse and validate a serialized pact.
    pub fn from_value(value: Value) -> Result<Self> {
        let hint = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        let document: PactDocument =
            serde_json::from_value(value).map_err(|e| PactError::malformed(&hint, e.to_string()))?;

        let records = document
            .records
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let mut record: PactRecord = serde_json::from_value(raw).map_err(|e| {
                    PactError::malformed(document.id.as_str(), format!("record {index}: {e}"))
                })?;
                if let Some(status) = record.response.status {
                    record.response.is_ok_status_code = is_ok_status(status);
                }
                Ok(record)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pact = Self::new(document.id, document.info);
        pact.records = records;
        Ok(pact)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| PactError::malformed("<unknown>", e.to_string()))?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| PactError::malformed(self.id.as_str(), e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forward-only cursor over the records. `None` once exhausted, and it
    /// stays `None` until [`Pact::reset_cursor`] is called.
    pub fn next_record(&mut self) -> Option<&PactRecord> {
        let record = self.records.get(self.cursor)?;
        self.cursor += 1;
        Some(record)
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
        self.request_cursors.clear();
    }

    fn matching_indices(&self, request: &PactRequest, url_matcher: &dyn UrlMatcher) -> Vec<usize> {
        let Some(url) = request.url.as_deref() else {
            return Vec::new();
        };
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                let url_matches = record
                    .request
                    .url
                    .as_deref()
                    .is_some_and(|recorded| url_matcher.matches(recorded, url));
                let method_matches = match (&request.method, &record.request.method) {
                    (Some(wanted), Some(recorded)) => wanted.eq_ignore_ascii_case(recorded),
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                url_matches && method_matches
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Records whose url matches `request.url` and whose method matches when
    /// the request has one. `None` when no URL matcher is available, which
    /// means the lookup could not be evaluated at all.
    pub fn records_matching_request(
        &self,
        request: &PactRequest,
        url_matcher: Option<&dyn UrlMatcher>,
    ) -> Option<Vec<&PactRecord>> {
        let url_matcher = url_matcher?;
        Some(
            self.matching_indices(request, url_matcher)
                .into_iter()
                .map(|index| &self.records[index])
                .collect(),
        )
    }

    /// Record to serve for a mocked request, advancing the per-request
    /// replay position when sequencing is enabled.
    pub fn next_record_matching_request(
        &mut self,
        request: &PactRequest,
        url_matcher: &dyn UrlMatcher,
        sequencing: MockSequencing,
    ) -> Option<&PactRecord> {
        let indices = self.matching_indices(request, url_matcher);
        let first = *indices.first()?;
        let chosen = match sequencing {
            MockSequencing::First => first,
            MockSequencing::Sequential => {
                let position = self.request_cursors.entry(first).or_insert(0);
                let chosen = indices[(*position).min(indices.len() - 1)];
                *position += 1;
                chosen
            }
        };
        self.records.get(chosen)
    }

    /// Append `record`, unless `only_if_new` is set and an equivalent record
    /// is already stored. Returns whether the pact changed.
    pub fn append_record(&mut self, record: PactRecord, only_if_new: bool) -> bool {
        if only_if_new && self.records.iter().any(|r| r.is_equivalent(&record)) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Replace the first record with the same method and url in place, or
    /// append when there is none. Returns whether the pact changed.
    pub fn replace_record(&mut self, record: PactRecord) -> bool {
        match self
            .records
            .iter()
            .position(|r| r.request.same_endpoint(&record.request))
        {
            Some(index) if self.records[index] == record => false,
            Some(index) => {
                self.records[index] = record;
                true
            }
            None => {
                self.records.push(record);
                true
            }
        }
    }

    /// Merge an incoming record according to the recording mode.
    ///
    /// `Refresh` behaves like `Append` here; the clearing happens when the
    /// recording session starts (see [`Pact::start_session`]).
    pub fn apply_record(&mut self, record: PactRecord, mode: RecordingMode) -> bool {
        match mode {
            RecordingMode::Append | RecordingMode::Refresh => self.append_record(record, false),
            RecordingMode::New => self.append_record(record, true),
            RecordingMode::Replace => self.replace_record(record),
        }
    }

    /// Prepare the pact for a recording session in `mode`.
    /// Returns whether records were cleared.
    pub fn start_session(&mut self, mode: RecordingMode) -> bool {
        self.reset_cursor();
        if mode == RecordingMode::Refresh && !self.records.is_empty() {
            self.clear_records();
            return true;
        }
        false
    }

    /// Drop all records, keeping id and info.
    pub fn clear_records(&mut self) {
        self.records.clear();
        self.reset_cursor();
    }
}
