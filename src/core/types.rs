//! Core types used throughout scangate.
//!
//! This module defines the data model shared by the log parsers, the
//! detection cache, the engine drivers, and the scan orchestrator:
//! engine identifiers, verdicts, normalized detections, and the
//! per-request result structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use crate::core::error::ScanError;

/// Identifies an antivirus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// ClamAV (clamd + clamonacc).
    ClamAv,
    /// Trend Micro Deep Security Agent.
    TrendMicro,
    /// In-process mock engine used for testing.
    Mock,
}

impl EngineKind {
    /// Returns the stable string identifier for this engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClamAv => "clamav",
            Self::TrendMicro => "trendmicro",
            Self::Mock => "mock",
        }
    }

    /// All engines known to the gateway, in display order.
    pub const ALL: [EngineKind; 3] = [Self::ClamAv, Self::TrendMicro, Self::Mock];
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clamav" => Ok(Self::ClamAv),
            "trendmicro" => Ok(Self::TrendMicro),
            "mock" => Ok(Self::Mock),
            other => Err(ScanError::config(format!("invalid engine: {other}"))),
        }
    }
}

/// The verdict of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// No threat was detected.
    Clean,
    /// A threat was detected.
    Infected,
    /// The scan could not produce a decisive answer.
    Error,
}

impl Verdict {
    /// Returns `true` if the verdict is `Clean`.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns `true` if the verdict is `Infected`.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected)
    }

    /// Returns `true` if the verdict is decisive (`Clean` or `Infected`).
    pub fn is_decisive(&self) -> bool {
        matches!(self, Self::Clean | Self::Infected)
    }

    /// Returns the stable string form of this verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source that produced a scan result. Carried for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Real-time (on-access) scanning, observed through the engine log.
    Rts,
    /// Explicit on-demand invocation of the scan binary.
    Manual,
}

/// A normalized detection record, produced by a log parser.
///
/// The tailer feeds engine log lines through a parser; decisive infected
/// lines become `Detection`s and land in the shared cache keyed by
/// normalized absolute path.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// File path as reported by the engine log.
    pub path: String,
    /// Parsed verdict. Parsers only emit decisive infected verdicts.
    pub verdict: Verdict,
    /// Signature name, empty when the engine reports only a quarantine.
    pub signature: String,
    /// The original log line, retained for diagnostics.
    pub raw: String,
    /// Monotonic timestamp, stamped by the cache at insertion.
    pub created_at: Instant,
}

impl Detection {
    /// Creates an infected detection for the given path.
    pub fn infected(
        path: impl Into<String>,
        signature: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            verdict: Verdict::Infected,
            signature: signature.into(),
            raw: raw.into(),
            created_at: Instant::now(),
        }
    }
}

/// Per-request scan context handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Fresh identifier, unique across the process lifetime.
    pub file_id: String,
    /// On-disk path of the materialized upload.
    pub path: PathBuf,
    /// Original filename as sent by the client.
    pub original_name: String,
    /// Size of the upload in bytes.
    pub size: u64,
}

/// The result of a single driver invocation (on-demand or RTS).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Verdict reported by the driver.
    pub status: Verdict,
    /// Engine that produced the result.
    pub engine: EngineKind,
    /// Signature name, when the engine reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Which scanning path produced the result.
    pub phase: Phase,
    /// Wall-clock completion time.
    pub timestamp: DateTime<Utc>,
    /// How long the driver invocation took, in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    /// Opaque driver artifact (exit codes, raw output). Diagnostics only.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// The orchestrator's verdict for one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    /// The request's file identifier.
    pub file_id: String,
    /// Final verdict.
    pub status: Verdict,
    /// Engine that served the request.
    pub engine: EngineKind,
    /// Signature name, when one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// The underlying driver result, when the on-demand path produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_result: Option<ScanResult>,
    /// Total wall-clock time for the request, in milliseconds.
    pub total_duration: i64,
}

/// Health of a single engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    /// The engine this health report describes.
    pub engine: EngineKind,
    /// `true` when the engine's RTS log is readable.
    pub healthy: bool,
    /// Engine version, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// When the check was performed.
    pub last_check: DateTime<Utc>,
    /// Failure description, when unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineHealth {
    /// Creates a healthy report for the given engine.
    pub fn healthy(engine: EngineKind) -> Self {
        Self {
            engine,
            healthy: true,
            version: None,
            last_check: Utc::now(),
            error: None,
        }
    }

    /// Creates an unhealthy report with a failure description.
    pub fn unhealthy(engine: EngineKind, error: impl Into<String>) -> Self {
        Self {
            engine,
            healthy: false,
            version: None,
            last_check: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// Attaches a version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Static capability descriptor of an engine.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    /// The engine this descriptor describes.
    pub engine: EngineKind,
    /// Whether the engine is usable at all.
    pub available: bool,
    /// Whether the engine performs real-time on-access scanning.
    pub rts_enabled: bool,
    /// Whether an on-demand scan binary is available.
    pub manual_scan_available: bool,
}
