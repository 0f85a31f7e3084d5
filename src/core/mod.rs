//! Core types and errors for scangate.
//!
//! - [`types`] - Engine identifiers, verdicts, detections, result structures
//! - [`error`] - Structured error taxonomy
//! - [`paths`] - Syntactic path normalization for cache keys

pub mod error;
pub mod paths;
pub mod types;

pub use error::ScanError;
pub use types::{
    Detection, EngineHealth, EngineInfo, EngineKind, Phase, ScanRequest, ScanResponse, ScanResult,
    Verdict,
};
