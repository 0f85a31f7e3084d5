//! Trend Micro Deep Security Agent driver.
//!
//! On-demand scanning invokes `dsa_scan` with `--target <path> --json` and
//! interprets the JSON report; when the output is not valid JSON a
//! case-insensitive substring match on the text decides. Real-time
//! detections are picked up by tailing the DS Agent SCTRL log into the
//! shared detection cache.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::DetectionCache;
use crate::config::DriverConfig;
use crate::core::{paths, EngineHealth, EngineInfo, EngineKind, Phase, ScanError, ScanResult, Verdict};
use crate::drivers::{log_backed_health, run_scan_command, Driver};
use crate::parsers;
use crate::tail::{LogTailer, TailerConfig};

/// Driver for the Trend Micro Deep Security Agent.
#[derive(Debug)]
pub struct TrendMicroDriver {
    config: DriverConfig,
    cache: Arc<DetectionCache>,
    tailer: Mutex<Option<LogTailer>>,
}

impl TrendMicroDriver {
    /// Creates a Trend Micro driver sharing the given detection cache.
    pub fn new(config: DriverConfig, cache: Arc<DetectionCache>) -> Self {
        Self {
            config,
            cache,
            tailer: Mutex::new(None),
        }
    }
}

/// `dsa_scan --json` report shape. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DsaScanReport {
    #[serde(default)]
    num_of_file_scanned: u64,
    #[serde(default)]
    num_of_file_skipped: u64,
    #[serde(default)]
    num_of_file_infected: u64,
    #[serde(default)]
    infected_files: Vec<DsaInfectedFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DsaInfectedFile {
    #[serde(default)]
    malware_name: String,
}

/// Interprets `dsa_scan` output.
///
/// JSON rules: a skipped file that was never scanned means the engine
/// declined (error); any infected count wins; a positive scanned count
/// means clean; anything else is an error. The text fallback treats
/// `infected`/`virus`/`malware` substrings as infected and exit code 0 as
/// clean.
fn interpret_output(output: &str, exit_code: Option<i32>) -> (Verdict, Option<String>) {
    if let Ok(report) = serde_json::from_str::<DsaScanReport>(output) {
        if report.num_of_file_skipped > 0 && report.num_of_file_scanned == 0 {
            return (Verdict::Error, None);
        }
        if report.num_of_file_infected > 0 || !report.infected_files.is_empty() {
            let signature = report
                .infected_files
                .first()
                .map(|file| file.malware_name.clone())
                .filter(|name| !name.is_empty());
            return (Verdict::Infected, signature);
        }
        if report.num_of_file_scanned > 0 {
            return (Verdict::Clean, None);
        }
        return (Verdict::Error, None);
    }

    let lower = output.to_lowercase();
    if lower.contains("infected") || lower.contains("virus") || lower.contains("malware") {
        return (Verdict::Infected, None);
    }
    if exit_code == Some(0) {
        return (Verdict::Clean, None);
    }
    (Verdict::Error, None)
}

#[async_trait]
impl Driver for TrendMicroDriver {
    fn engine(&self) -> EngineKind {
        EngineKind::TrendMicro
    }

    fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn start(&self) {
        if tokio::fs::metadata(&self.config.rts_log_path).await.is_err() {
            tracing::warn!(
                engine = %self.engine(),
                path = %self.config.rts_log_path.display(),
                "RTS log not accessible, log follower not started"
            );
            return;
        }

        let cache = Arc::clone(&self.cache);
        let tailer = LogTailer::spawn(
            self.config.rts_log_path.clone(),
            TailerConfig::default(),
            move |line| {
                if let Some(detection) = parsers::trendmicro::parse(line) {
                    let key = paths::normalize_str(&detection.path);
                    tracing::debug!(path = %key, "Cached RTS detection");
                    cache.put(key, detection);
                }
            },
        );
        *self.tailer.lock() = Some(tailer);

        tracing::info!(
            engine = %self.engine(),
            path = %self.config.rts_log_path.display(),
            "RTS log follower started"
        );
    }

    fn stop(&self) {
        if let Some(tailer) = self.tailer.lock().take() {
            tailer.stop();
        }
    }

    async fn on_demand(&self, path: &Path) -> Result<ScanResult, ScanError> {
        let started = Instant::now();

        let output = run_scan_command(
            self.engine(),
            &self.config.scan_binary,
            [
                std::ffi::OsStr::new("--target"),
                path.as_os_str(),
                std::ffi::OsStr::new("--json"),
            ],
            self.config.timeout,
        )
        .await?;

        tracing::debug!(
            engine = %self.engine(),
            exit_code = ?output.exit_code,
            output = %output.stdout,
            "On-demand scan completed"
        );

        let (status, signature) = interpret_output(&output.stdout, output.exit_code);

        Ok(ScanResult {
            status,
            engine: self.engine(),
            signature,
            phase: Phase::Manual,
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_millis() as i64,
            raw: serde_json::json!({
                "exitCode": output.exit_code,
                "stdout": output.stdout,
                "stderr": output.stderr,
            }),
        })
    }

    async fn health(&self) -> EngineHealth {
        log_backed_health(self.engine(), &self.config.rts_log_path).await
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            engine: self.engine(),
            available: true,
            rts_enabled: true,
            manual_scan_available: true,
        }
    }
}
