//! Error types for scangate.
//!
//! Structured, typed errors for the failure modes the orchestrator can
//! surface. Transient on-demand failures (invocation, timeout) are handled
//! inside the orchestrator's RTS fallback; only wait exhaustion, I/O, and
//! configuration errors propagate to callers.

use std::time::Duration;
use thiserror::Error;

use crate::core::types::EngineKind;

/// The main error type for scan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The on-demand scan binary could not be invoked.
    #[error("failed to invoke scan binary '{binary}' for engine '{engine}': {message}")]
    Invocation {
        /// Engine whose binary failed.
        engine: EngineKind,
        /// Path of the binary that failed to run.
        binary: String,
        /// Description of the failure.
        message: String,
    },

    /// The on-demand scan exceeded its configured deadline.
    #[error("on-demand scan timed out after {elapsed:?} on engine '{engine}'")]
    Timeout {
        /// Engine that timed out.
        engine: EngineKind,
        /// How long the scan ran before being terminated.
        elapsed: Duration,
    },

    /// Neither the on-demand scan nor the RTS cache produced a decisive
    /// verdict within the bounded wait budget.
    #[error("scan failed: file not accessible and no RTS detection found")]
    RtsWaitExhausted {
        /// Engine that served the request.
        engine: EngineKind,
        /// How long the orchestrator waited on the cache.
        waited: Duration,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error, fatal at startup.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if the orchestrator should fall back to the RTS
    /// cache after this error.
    pub fn triggers_rts_fallback(&self) -> bool {
        matches!(
            self,
            Self::Invocation { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }

    /// Returns the engine this error is associated with, if any.
    pub fn engine(&self) -> Option<EngineKind> {
        match self {
            Self::Invocation { engine, .. }
            | Self::Timeout { engine, .. }
            | Self::RtsWaitExhausted { engine, .. } => Some(*engine),
            _ => None,
        }
    }

    /// Creates an `Invocation` error.
    pub fn invocation(
        engine: EngineKind,
        binary: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invocation {
            engine,
            binary: binary.into(),
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(engine: EngineKind, elapsed: Duration) -> Self {
        Self::Timeout { engine, elapsed }
    }

    /// Creates an `RtsWaitExhausted` error.
    pub fn rts_wait_exhausted(engine: EngineKind, waited: Duration) -> Self {
        Self::RtsWaitExhausted { engine, waited }
    }

    /// Creates a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rts_wait_exhausted_message_is_exact() {
        let err = ScanError::rts_wait_exhausted(EngineKind::TrendMicro, Duration::from_millis(500));
        assert_eq!(
            err.to_string(),
            "scan failed: file not accessible and no RTS detection found"
        );
    }

    #[test]
    fn fallback_predicate() {
        assert!(ScanError::invocation(EngineKind::ClamAv, "/usr/bin/clamdscan", "not found")
            .triggers_rts_fallback());
        assert!(ScanError::timeout(EngineKind::ClamAv, Duration::from_secs(15))
            .triggers_rts_fallback());
        assert!(!ScanError::config("bad port").triggers_rts_fallback());
    }

    #[test]
    fn engine_accessor() {
        let err = ScanError::timeout(EngineKind::Mock, Duration::from_secs(1));
        assert_eq!(err.engine(), Some(EngineKind::Mock));
        assert_eq!(ScanError::config("x").engine(), None);
    }
}
