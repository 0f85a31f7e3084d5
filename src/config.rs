//! Environment-driven configuration.
//!
//! Every knob has a default matching the packaged deployment; unparseable
//! numeric values fall back to their defaults, while values that fail
//! validation (port range, engine name, file-size floor) abort startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::{EngineKind, ScanError};

/// Per-engine driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Engine this configuration belongs to.
    pub engine: EngineKind,
    /// Log file the RTS tailer follows.
    pub rts_log_path: PathBuf,
    /// On-demand scan executable.
    pub scan_binary: PathBuf,
    /// Deadline for one on-demand invocation.
    pub timeout: Duration,
    /// Base wait budget for the RTS cache fallback.
    pub rts_wait_base: Duration,
    /// Additional wait budget per MiB of file size.
    pub rts_wait_per_mb: Duration,
}

impl DriverConfig {
    /// Returns the vendor-default configuration for `engine`.
    pub fn for_engine(engine: EngineKind) -> Self {
        let (rts_log_path, scan_binary) = match engine {
            EngineKind::ClamAv => ("/var/log/clamav/clamonacc.log", "/usr/bin/clamdscan"),
            EngineKind::TrendMicro => ("/var/log/ds_agent/ds_agent.log", "/opt/ds_agent/dsa_scan"),
            EngineKind::Mock => ("", ""),
        };
        Self {
            engine,
            rts_log_path: PathBuf::from(rts_log_path),
            scan_binary: PathBuf::from(scan_binary),
            timeout: Duration::from_millis(15_000),
            rts_wait_base: Duration::from_millis(500),
            rts_wait_per_mb: Duration::from_millis(10),
        }
    }

    /// Sets the RTS log path.
    pub fn with_rts_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rts_log_path = path.into();
        self
    }

    /// Sets the scan binary path.
    pub fn with_scan_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.scan_binary = path.into();
        self
    }

    /// Sets the on-demand timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the RTS wait base budget.
    pub fn with_rts_wait_base(mut self, base: Duration) -> Self {
        self.rts_wait_base = base;
        self
    }

    /// Sets the per-MiB RTS wait budget.
    pub fn with_rts_wait_per_mb(mut self, per_mb: Duration) -> Self {
        self.rts_wait_per_mb = per_mb;
        self
    }

    fn from_env(engine: EngineKind, prefix: &str) -> Self {
        let defaults = Self::for_engine(engine);
        Self {
            engine,
            rts_log_path: env_path(
                &format!("{prefix}_RTS_LOG_PATH"),
                defaults.rts_log_path,
            ),
            scan_binary: env_path(&format!("{prefix}_SCAN_BINARY"), defaults.scan_binary),
            timeout: env_millis(&format!("{prefix}_TIMEOUT"), defaults.timeout),
            rts_wait_base: env_millis(
                &format!("{prefix}_RTS_CACHE_BASE_DELAY"),
                defaults.rts_wait_base,
            ),
            rts_wait_per_mb: env_millis(
                &format!("{prefix}_RTS_CACHE_DELAY_PER_MB"),
                defaults.rts_wait_per_mb,
            ),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Directory where uploads are materialized for scanning.
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: u64,
    /// Engine that serves scan requests.
    pub active_engine: EngineKind,
    /// Log verbosity: `debug` or `info`.
    pub log_level: String,
    /// ClamAV driver configuration.
    pub clamav: DriverConfig,
    /// Trend Micro driver configuration.
    pub trendmicro: DriverConfig,
    /// Mock driver configuration.
    pub mock: DriverConfig,
}

impl Config {
    /// Loads configuration from the environment and validates it.
    pub fn from_env() -> Result<Self, ScanError> {
        let active_engine: EngineKind = env_string("AV_ENGINE", "clamav").parse()?;

        let config = Self {
            port: validate_port(env_i64("PORT", 3000))?,
            upload_dir: env_path("UPLOAD_DIR", PathBuf::from("/tmp/av-scanner")),
            max_file_size: validate_max_file_size(env_i64("MAX_FILE_SIZE", 104_857_600))?,
            active_engine,
            log_level: env_string("LOG_LEVEL", "info"),
            clamav: DriverConfig::from_env(EngineKind::ClamAv, "CLAMAV"),
            trendmicro: DriverConfig::from_env(EngineKind::TrendMicro, "TM"),
            mock: DriverConfig::for_engine(EngineKind::Mock),
        };

        Ok(config)
    }

    /// Returns the driver configuration for `engine`.
    pub fn driver(&self, engine: EngineKind) -> &DriverConfig {
        match engine {
            EngineKind::ClamAv => &self.clamav,
            EngineKind::TrendMicro => &self.trendmicro,
            EngineKind::Mock => &self.mock,
        }
    }
}

fn validate_port(port: i64) -> Result<u16, ScanError> {
    if !(1..=65_535).contains(&port) {
        return Err(ScanError::config(format!("invalid port: {port}")));
    }
    Ok(port as u16)
}

fn validate_max_file_size(size: i64) -> Result<u64, ScanError> {
    if size < 1 {
        return Err(ScanError::config(format!("invalid max file size: {size}")));
    }
    Ok(size as u64)
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => PathBuf::from(value),
        _ => default,
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
