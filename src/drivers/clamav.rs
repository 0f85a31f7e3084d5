//! ClamAV driver.
//!
//! On-demand scanning invokes `clamdscan` with `--fdpass --stdout
//! --no-summary`, streaming the file to the clamd daemon. Exit codes map
//! `0` to clean, `1` to infected, and anything else to an error verdict;
//! the signature is parsed from the `<path>: <sig> FOUND` stdout line when
//! present. Real-time detections are picked up by tailing the clamonacc
//! log into the shared detection cache.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::DetectionCache;
use crate::config::DriverConfig;
use crate::core::{paths, EngineHealth, EngineInfo, EngineKind, Phase, ScanError, ScanResult, Verdict};
use crate::drivers::{log_backed_health, run_scan_command, Driver};
use crate::parsers;
use crate::tail::{LogTailer, TailerConfig};

/// Driver for ClamAV (clamd + clamonacc).
#[derive(Debug)]
pub struct ClamAvDriver {
    config: DriverConfig,
    cache: Arc<DetectionCache>,
    tailer: Mutex<Option<LogTailer>>,
}

impl ClamAvDriver {
    /// Creates a ClamAV driver sharing the given detection cache.
    pub fn new(config: DriverConfig, cache: Arc<DetectionCache>) -> Self {
        Self {
            config,
            cache,
            tailer: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Driver for ClamAvDriver {
    fn engine(&self) -> EngineKind {
        EngineKind::ClamAv
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
                if let Some(detection) = parsers::clamav::parse(line) {
                    let key = paths::normalize_str(&detection.path);
                    tracing::debug!(
                        path = %key,
                        signature = %detection.signature,
                        "Cached RTS detection"
                    );
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
                std::ffi::OsStr::new("--fdpass"),
                std::ffi::OsStr::new("--stdout"),
                std::ffi::OsStr::new("--no-summary"),
                path.as_os_str(),
            ],
            self.config.timeout,
        )
        .await?;

        let stdout = output.stdout.trim();
        tracing::debug!(
            engine = %self.engine(),
            exit_code = ?output.exit_code,
            output = %stdout,
            "On-demand scan completed"
        );

        // A FOUND line is authoritative regardless of the exit code.
        let (status, signature) = match stdout.lines().find_map(parsers::clamav::parse) {
            Some(detection) if !detection.signature.is_empty() => {
                (Verdict::Infected, Some(detection.signature))
            }
            Some(_) => (Verdict::Infected, None),
            None => match output.exit_code {
                Some(0) => (Verdict::Clean, None),
                Some(1) => (Verdict::Infected, None),
                _ => (Verdict::Error, None),
            },
        };

        Ok(ScanResult {
            status,
            engine: self.engine(),
            signature,
            phase: Phase::Manual,
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_millis() as i64,
            raw: serde_json::json!({
                "exitCode": output.exit_code,
                "stdout": stdout,
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
