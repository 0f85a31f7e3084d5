//! Scan orchestrator.
//!
//! Reconciles the two asynchronous verdict sources per request: the
//! synchronous on-demand binary invocation and the real-time (on-access)
//! scanner whose detections arrive through the log tailer into the shared
//! cache. The on-demand result is authoritative when decisive; otherwise
//! the orchestrator polls the cache under a size-proportional wait budget,
//! because an indecisive on-demand result almost always means RTS has
//! already quarantined the file. Every request deletes its materialized
//! file exactly once on the exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::cache::DetectionCache;
use crate::config::{Config, DriverConfig};
use crate::core::{
    paths, Detection, EngineHealth, EngineInfo, EngineKind, ScanError, ScanRequest, ScanResponse,
    ScanResult, Verdict,
};
use crate::drivers::{ArcDriver, ClamAvDriver, MockDriver, TrendMicroDriver};

/// Interval between cache probes while waiting for an RTS detection.
pub const RTS_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Orchestrates scans across the configured engine drivers.
pub struct Scanner {
    drivers: Vec<ArcDriver>,
    active_engine: EngineKind,
    config: Arc<Config>,
    cache: Arc<DetectionCache>,
}

impl Scanner {
    /// Creates a scanner with the three built-in drivers sharing `cache`.
    pub fn new(config: Arc<Config>, cache: Arc<DetectionCache>) -> Self {
        let drivers: Vec<ArcDriver> = vec![
            Arc::new(ClamAvDriver::new(config.clamav.clone(), Arc::clone(&cache))),
            Arc::new(TrendMicroDriver::new(
                config.trendmicro.clone(),
                Arc::clone(&cache),
            )),
            Arc::new(MockDriver::new(config.mock.clone())),
        ];
        Self {
            drivers,
            active_engine: config.active_engine,
            config,
            cache,
        }
    }

    /// Creates a scanner with a custom driver set. The active engine from
    /// `config` must be among the drivers.
    pub fn with_drivers(
        config: Arc<Config>,
        cache: Arc<DetectionCache>,
        drivers: Vec<ArcDriver>,
    ) -> Result<Self, ScanError> {
        if drivers.is_empty() {
            return Err(ScanError::config("at least one driver is required"));
        }
        if !drivers
            .iter()
            .any(|driver| driver.engine() == config.active_engine)
        {
            return Err(ScanError::config(format!(
                "no driver for active engine: {}",
                config.active_engine
            )));
        }
        Ok(Self {
            drivers,
            active_engine: config.active_engine,
            config,
            cache,
        })
    }

    /// Starts every driver's background log follower.
    pub async fn start(&self) {
        for driver in &self.drivers {
            driver.start().await;
        }
    }

    /// Stops all drivers and the cache sweeper. Idempotent.
    pub fn stop(&self) {
        for driver in &self.drivers {
            driver.stop();
        }
        self.cache.stop();
    }

    /// Scans one materialized upload and returns the final verdict.
    ///
    /// The file at `request.path` is removed before this returns, whatever
    /// the outcome; a file already removed by RTS quarantine is expected
    /// and ignored.
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanResponse, ScanError> {
        let started = Instant::now();
        let driver = self.active_driver();

        tracing::info!(
            file_id = %request.file_id,
            engine = %driver.engine(),
            original_name = %request.original_name,
            size = request.size,
            "Starting scan"
        );

        let outcome = self.resolve_verdict(&request, driver).await;
        self.delete_file(&request.path, &request.file_id).await;
        let (status, signature, scan_result) = outcome?;

        let response = ScanResponse {
            file_id: request.file_id.clone(),
            status,
            engine: driver.engine(),
            signature,
            scan_result,
            total_duration: started.elapsed().as_millis() as i64,
        };

        tracing::info!(
            file_id = %request.file_id,
            status = %response.status,
            duration = response.total_duration,
            "Scan completed"
        );

        Ok(response)
    }

    /// Runs the on-demand attempt and, when it is indecisive, the bounded
    /// RTS cache wait.
    async fn resolve_verdict(
        &self,
        request: &ScanRequest,
        driver: &ArcDriver,
    ) -> Result<(Verdict, Option<String>, Option<ScanResult>), ScanError> {
        let manual = driver.on_demand(&request.path).await;

        match manual {
            Ok(result) if result.status.is_decisive() => {
                let signature = result.signature.clone();
                Ok((result.status, signature, Some(result)))
            }
            indecisive => {
                let scan_result = match indecisive {
                    Ok(result) => Some(result),
                    Err(err) => {
                        tracing::debug!(
                            file_id = %request.file_id,
                            error = %err,
                            "Manual scan failed, waiting for RTS cache"
                        );
                        None
                    }
                };

                let abs_path = paths::normalize(&request.path);
                match self
                    .wait_for_rts(&abs_path, &request.file_id, request.size, driver.config())
                    .await
                {
                    Some(detection) => {
                        let signature = if detection.signature.is_empty() {
                            None
                        } else {
                            Some(detection.signature)
                        };
                        Ok((Verdict::Infected, signature, scan_result))
                    }
                    None => {
                        let max_wait = rts_wait_budget(driver.config(), request.size);
                        Err(ScanError::rts_wait_exhausted(driver.engine(), max_wait))
                    }
                }
            }
        }
    }

    /// Polls the detection cache for `abs_path` under the size-proportional
    /// wait budget. The first infected observation wins.
    async fn wait_for_rts(
        &self,
        abs_path: &str,
        file_id: &str,
        size: u64,
        config: &DriverConfig,
    ) -> Option<Detection> {
        let max_wait = rts_wait_budget(config, size);
        let mut waited = Duration::ZERO;

        while waited < max_wait {
            if let Some(detection) = self.cache.take(abs_path) {
                if detection.verdict.is_infected() {
                    tracing::info!(
                        file_id = %file_id,
                        signature = %detection.signature,
                        waited_ms = waited.as_millis() as u64,
                        "File detected by RTS"
                    );
                    return Some(detection);
                }
            }
            tokio::time::sleep(RTS_RETRY_DELAY).await;
            waited += RTS_RETRY_DELAY;
        }

        tracing::warn!(
            file_id = %file_id,
            waited_ms = max_wait.as_millis() as u64,
            "RTS wait exhausted without detection"
        );
        None
    }

    async fn delete_file(&self, path: &Path, file_id: &str) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(file_id = %file_id, path = %path.display(), "Deleted scanned file");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    file_id = %file_id,
                    path = %path.display(),
                    "File already removed (likely by RTS quarantine)"
                );
            }
            Err(err) => {
                tracing::warn!(
                    file_id = %file_id,
                    path = %path.display(),
                    error = %err,
                    "Failed to delete scanned file"
                );
            }
        }
    }

    /// Reports health of every configured engine.
    pub async fn check_health(&self) -> Vec<EngineHealth> {
        let mut results = Vec::with_capacity(self.drivers.len());
        for driver in &self.drivers {
            results.push(driver.health().await);
        }
        results
    }

    /// Reports health of the active engine.
    pub async fn active_engine_health(&self) -> EngineHealth {
        self.active_driver().health().await
    }

    /// Returns the static descriptor of every configured engine.
    pub fn engine_info(&self) -> Vec<EngineInfo> {
        self.drivers.iter().map(|driver| driver.info()).collect()
    }

    /// The engine serving scan requests.
    pub fn active_engine(&self) -> EngineKind {
        self.active_engine
    }

    /// Generates a fresh request file ID.
    pub fn generate_file_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Builds the upload path for a request: the file ID plus the original
    /// filename's final suffix, inside the configured upload directory.
    pub fn upload_path(&self, file_id: &str, original_name: &str) -> PathBuf {
        let ext = Path::new(original_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        self.config.upload_dir.join(format!("{file_id}{ext}"))
    }

    fn active_driver(&self) -> &ArcDriver {
        // Both constructors guarantee a driver for the active engine.
        self.drivers
            .iter()
            .find(|driver| driver.engine() == self.active_engine)
            .unwrap_or(&self.drivers[0])
    }
}

fn rts_wait_budget(config: &DriverConfig, size: u64) -> Duration {
    let mib = size / (1024 * 1024);
    config.rts_wait_base + config.rts_wait_per_mb * mib as u32
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("active_engine", &self.active_engine)
            .field("driver_count", &self.drivers.len())
            .finish()
    }
}
