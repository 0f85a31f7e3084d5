//! Mock driver for testing.
//!
//! Detects files containing the EICAR test pattern. The pattern is stored
//! as character codes and reconstructed at runtime so the source tree never
//! contains the literal string, which on-access scanners on developer
//! machines would otherwise quarantine. The mock has no log tailer and is
//! always healthy.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;

use crate::config::DriverConfig;
use crate::core::{EngineHealth, EngineInfo, EngineKind, Phase, ScanError, ScanResult, Verdict};
use crate::drivers::Driver;

/// Signature reported for EICAR matches.
pub const EICAR_SIGNATURE: &str = "EICAR-Test-File";

// EICAR test pattern as character codes.
// https://en.wikipedia.org/wiki/EICAR_test_file
const EICAR_CODES: [u8; 68] = [
    88, 53, 79, 33, 80, 37, 64, 65, 80, 91, 52, 92, 80, 90, 88, 53, 52, 40, 80, 94, 41, 55, 67,
    67, 41, 55, 125, 36, 69, 73, 67, 65, 82, 45, 83, 84, 65, 78, 68, 65, 82, 68, 45, 65, 78, 84,
    73, 86, 73, 82, 85, 83, 45, 84, 69, 83, 84, 45, 70, 73, 76, 69, 33, 36, 72, 43, 72, 42,
];

/// Returns the 68-byte EICAR test pattern.
pub fn eicar_pattern() -> Vec<u8> {
    EICAR_CODES.to_vec()
}

/// Driver that matches the EICAR pattern in file contents.
#[derive(Debug)]
pub struct MockDriver {
    config: DriverConfig,
}

impl MockDriver {
    /// Creates a mock driver.
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn engine(&self) -> EngineKind {
        EngineKind::Mock
    }

    fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn start(&self) {}

    fn stop(&self) {}

    async fn on_demand(&self, path: &Path) -> Result<ScanResult, ScanError> {
        let started = Instant::now();
        let content = tokio::fs::read(path).await?;

        let infected = content
            .windows(EICAR_CODES.len())
            .any(|window| window == EICAR_CODES);

        let (status, signature) = if infected {
            (Verdict::Infected, Some(EICAR_SIGNATURE.to_string()))
        } else {
            (Verdict::Clean, None)
        };

        Ok(ScanResult {
            status,
            engine: self.engine(),
            signature,
            phase: Phase::Manual,
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_millis() as i64,
            raw: serde_json::json!({ "bytesScanned": content.len() }),
        })
    }

    async fn health(&self) -> EngineHealth {
        EngineHealth::healthy(self.engine()).with_version("1.0.0-mock")
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            engine: self.engine(),
            available: true,
            rts_enabled: false,
            manual_scan_available: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mock_driver() -> MockDriver {
        MockDriver::new(DriverConfig::for_engine(EngineKind::Mock))
    }

    #[test]
    fn eicar_pattern_has_expected_shape() {
        let pattern = eicar_pattern();
        assert_eq!(pattern.len(), 68);
        assert!(pattern.starts_with(b"X5O!"));
        assert!(pattern.ends_with(b"H+H*"));
    }

    #[tokio::test]
    async fn clean_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clean.txt");
        std::fs::write(&path, b"clean test content").unwrap();

        let result = mock_driver().on_demand(&path).await.unwrap();
        assert_eq!(result.status, Verdict::Clean);
        assert_eq!(result.signature, None);
    }

    #[tokio::test]
    async fn eicar_file_is_infected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eicar.com");
        std::fs::write(&path, eicar_pattern()).unwrap();

        let result = mock_driver().on_demand(&path).await.unwrap();
        assert_eq!(result.status, Verdict::Infected);
        assert_eq!(result.signature.as_deref(), Some(EICAR_SIGNATURE));
    }

    #[tokio::test]
    async fn eicar_embedded_in_larger_file_is_infected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wrapped.bin");
        let mut content = b"prefix bytes ".to_vec();
        content.extend_from_slice(&eicar_pattern());
        content.extend_from_slice(b" suffix bytes");
        std::fs::write(&path, content).unwrap();

        let result = mock_driver().on_demand(&path).await.unwrap();
        assert_eq!(result.status, Verdict::Infected);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = mock_driver()
            .on_demand(&dir.path().join("gone.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
    }

    #[tokio::test]
    async fn always_healthy() {
        let driver = mock_driver();
        let health = driver.health().await;
        assert!(health.healthy);
        assert_eq!(health.version.as_deref(), Some("1.0.0-mock"));

        let info = driver.info();
        assert!(info.available);
        assert!(!info.rts_enabled);
        assert!(info.manual_scan_available);
    }
}
