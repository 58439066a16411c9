//! # Cache Diagnostics
//!
//! End-to-end checks against the live store plus single-key inspection and
//! removal:
//!
//! - `run_round_trip_check` writes a synthetic entry, reads it back, compares
//!   it byte for byte and deletes it. The synthetic key is removed on every
//!   path once a write has been attempted.
//! - `inspect_key` reports what is stored under a key without touching it.
//! - `repair_key` deletes a key unconditionally. It discards data.

use super::cache_manager::CacheManager;
use super::entry::{CacheMetadata, MetadataView};
use super::stores::{CacheTtl, TtlStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Prefix of the synthetic keys written by the round-trip check
pub const DIAGNOSTIC_KEY_PREFIX: &str = "diagnostics:roundtrip:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStep {
    Availability,
    Write,
    Read,
    Compare,
    Delete,
    VerifyCleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: DiagnosticStep,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of one round-trip check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundTripReport {
    pub key: String,
    pub passed: bool,
    pub steps: Vec<StepResult>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RoundTripReport {
    fn new(key: String) -> Self {
        Self {
            key,
            passed: false,
            steps: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn pass(&mut self, step: DiagnosticStep) {
        self.steps.push(StepResult {
            step,
            passed: true,
            detail: None,
        });
    }

    fn fail<S: Into<String>>(&mut self, step: DiagnosticStep, detail: S) {
        let detail = detail.into();
        self.errors.push(format!("{:?}: {}", step, detail));
        self.steps.push(StepResult {
            step,
            passed: false,
            detail: Some(detail),
        });
    }

    pub fn step(&self, step: DiagnosticStep) -> Option<&StepResult> {
        self.steps.iter().find(|result| result.step == step)
    }
}

/// What is stored under a key, decoded as far as possible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInspection {
    pub key: String,
    pub exists: bool,
    /// Backend representation, verbatim
    pub raw: Option<String>,
    /// JSON type of the decoded document
    pub decoded_type: Option<String>,
    pub decode_error: Option<String>,
    pub ttl: TtlStatus,
    pub metadata: Option<CacheMetadata>,
    /// Store failure that prevented the inspection
    pub store_error: Option<String>,
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct CacheDiagnostics {
    manager: Arc<CacheManager>,
}

impl CacheDiagnostics {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    /// Write, read, compare and delete a synthetic entry
    pub async fn run_round_trip_check(&self) -> RoundTripReport {
        let started = Instant::now();
        let key = format!("{}{}", DIAGNOSTIC_KEY_PREFIX, Uuid::new_v4());
        let mut report = RoundTripReport::new(key.clone());

        if !self.manager.is_available().await {
            report.fail(DiagnosticStep::Availability, "no cache store is connected");
        } else if !self.manager.ping().await {
            report.fail(DiagnosticStep::Availability, "store did not answer ping");
        } else {
            report.pass(DiagnosticStep::Availability);
            self.exercise(&key, &mut report).await;
        }

        report.passed = report.errors.is_empty();
        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.passed {
            info!(key = %key, duration_ms = report.duration_ms, "Cache round-trip check passed");
        } else {
            warn!(key = %key, errors = ?report.errors, "Cache round-trip check failed");
        }
        report
    }

    async fn exercise(&self, key: &str, report: &mut RoundTripReport) {
        let sample = json!({
            "key": key,
            "writtenAt": Utc::now(),
            "text": "Zürich, 東京, São Paulo",
            "numbers": [0, -1, 40.25, 0.5],
            "nested": {"ok": true, "none": null},
        });
        let expected = sample.to_string();
        let ttl = CacheTtl::from_duration(self.manager.config().diagnostics_ttl);

        match self.manager.try_set_raw(key, &expected, ttl).await {
            Ok(()) => report.pass(DiagnosticStep::Write),
            Err(e) => report.fail(DiagnosticStep::Write, e.to_string()),
        }

        match self.manager.try_get_raw(key).await {
            Ok(Some(raw)) => {
                report.pass(DiagnosticStep::Read);
                self.compare(&expected, &sample, &raw, report);
            }
            Ok(None) => {
                report.fail(DiagnosticStep::Read, "entry not found after write");
                report.fail(DiagnosticStep::Compare, "skipped, nothing was read");
            }
            Err(e) => {
                report.fail(DiagnosticStep::Read, e.to_string());
                report.fail(DiagnosticStep::Compare, "skipped, nothing was read");
            }
        }

        // Cleanup runs whatever happened above
        match self.manager.try_delete(key).await {
            Ok(true) => report.pass(DiagnosticStep::Delete),
            Ok(false) => report.fail(DiagnosticStep::Delete, "entry was already gone"),
            Err(e) => report.fail(DiagnosticStep::Delete, e.to_string()),
        }

        match self.manager.try_exists(key).await {
            Ok(false) => report.pass(DiagnosticStep::VerifyCleanup),
            Ok(true) => {
                let retried = self.manager.delete(key).await;
                report.fail(
                    DiagnosticStep::VerifyCleanup,
                    format!("synthetic key still present after delete (retry deleted: {})", retried),
                );
            }
            Err(e) => report.fail(DiagnosticStep::VerifyCleanup, e.to_string()),
        }
    }

    fn compare(&self, expected: &str, sample: &Value, raw: &str, report: &mut RoundTripReport) {
        if raw != expected {
            report.fail(
                DiagnosticStep::Compare,
                format!("stored bytes differ: wrote {} bytes, read {}", expected.len(), raw.len()),
            );
            return;
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(decoded) if &decoded == sample => report.pass(DiagnosticStep::Compare),
            Ok(_) => report.fail(DiagnosticStep::Compare, "decoded value differs from the original"),
            Err(e) => report.fail(DiagnosticStep::Compare, format!("read value does not decode: {}", e)),
        }
    }

    /// Report existence, raw text, decoded type and metadata of `key`
    pub async fn inspect_key(&self, key: &str) -> KeyInspection {
        let mut inspection = KeyInspection {
            key: key.to_string(),
            exists: false,
            raw: None,
            decoded_type: None,
            decode_error: None,
            ttl: TtlStatus::Absent,
            metadata: None,
            store_error: None,
        };

        let raw = match self.manager.try_get_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return inspection,
            Err(e) => {
                inspection.store_error = Some(e.to_string());
                return inspection;
            }
        };

        inspection.exists = true;
        inspection.ttl = self.manager.ttl_remaining(key).await;

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                inspection.decoded_type = Some(json_type(&value).to_string());
                inspection.metadata = serde_json::from_value::<MetadataView>(value)
                    .ok()
                    .map(|view| view.metadata);
            }
            Err(e) => inspection.decode_error = Some(e.to_string()),
        }
        inspection.raw = Some(raw);

        inspection
    }

    /// Delete `key` unconditionally; returns whether something was deleted
    pub async fn repair_key(&self, key: &str) -> bool {
        let deleted = self.manager.delete(key).await;
        warn!(key = %key, deleted = deleted, "Cache key removed by repair");
        deleted
    }
}
