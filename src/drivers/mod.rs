//! Engine drivers.
//!
//! A driver bundles everything the orchestrator needs from one antivirus
//! engine: the background RTS log tailer feeding the shared detection
//! cache, the synchronous on-demand binary invocation, and health/info
//! reporting. All drivers expose the same [`Driver`] interface, so the
//! orchestrator is independent of vendor specifics.
//!
//! ## Available drivers
//!
//! - [`clamav`] - ClamAV via `clamdscan` and the clamonacc log
//! - [`trendmicro`] - Trend Micro DS Agent via `dsa_scan` and the SCTRL log
//! - [`mock`] - In-process EICAR matcher for testing

pub mod clamav;
pub mod mock;
pub mod trendmicro;

pub use clamav::ClamAvDriver;
pub use mock::MockDriver;
pub use trendmicro::TrendMicroDriver;

use async_trait::async_trait;
use std::ffi::OsStr;
use std::fmt::Debug;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DriverConfig;
use crate::core::{EngineHealth, EngineInfo, EngineKind, ScanError, ScanResult};

/// The uniform interface every engine driver implements.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// Returns the engine this driver speaks to.
    fn engine(&self) -> EngineKind;

    /// Returns this driver's configuration.
    fn config(&self) -> &DriverConfig;

    /// Starts the background RTS log follower, when the engine has one.
    ///
    /// When the log file is not readable the driver logs a warning and
    /// starts nothing; the operation still succeeds.
    async fn start(&self);

    /// Stops the background follower and releases the log handle. Idempotent.
    fn stop(&self);

    /// Invokes the on-demand scanner against `path`.
    ///
    /// Returns an `Error` verdict when the binary exits with a code that is
    /// neither "clean" nor "infected". Returns `Err` when the binary cannot
    /// be invoked at all or exceeds the configured timeout; the
    /// orchestrator treats both the same as an indecisive result.
    async fn on_demand(&self, path: &Path) -> Result<ScanResult, ScanError>;

    /// Reports engine health. Never fails; an engine whose RTS log is not
    /// accessible reports `healthy = false`.
    async fn health(&self) -> EngineHealth;

    /// Returns the static capability descriptor for this engine.
    fn info(&self) -> EngineInfo;
}

/// A shared, dynamically dispatched driver.
pub type ArcDriver = Arc<dyn Driver>;

/// Captured output of one scan-binary invocation.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a scan binary under the configured deadline, capturing output.
/// The child is killed when the deadline elapses.
pub(crate) async fn run_scan_command<I, S>(
    engine: EngineKind,
    binary: &Path,
    args: I,
    timeout: Duration,
) -> Result<CommandOutput, ScanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = tokio::process::Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|err| ScanError::invocation(engine, binary.display().to_string(), err.to_string()))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return Err(ScanError::invocation(
                engine,
                binary.display().to_string(),
                err.to_string(),
            ))
        }
        Err(_) => return Err(ScanError::timeout(engine, timeout)),
    };

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Health check shared by the log-backed engines: healthy iff the RTS log
/// file is accessible.
pub(crate) async fn log_backed_health(engine: EngineKind, log_path: &Path) -> EngineHealth {
    match tokio::fs::metadata(log_path).await {
        Ok(_) => EngineHealth::healthy(engine),
        Err(_) => EngineHealth::unhealthy(
            engine,
            format!("RTS log not accessible: {}", log_path.display()),
        ),
    }
}
