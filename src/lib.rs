//! # Scangate
//!
//! A uniform HTTP scanning gateway over locally installed antivirus
//! engines. Clients POST a file and get one verdict - `clean`, `infected`,
//! or `error` - irrespective of which engine (ClamAV, Trend Micro DS
//! Agent, or the test mock) is active.
//!
//! ## Architecture
//!
//! The hard part is reconciling two asynchronous verdict sources per
//! request:
//!
//! - the **on-demand scan**, a synchronous invocation of the vendor binary,
//!   authoritative while the file is readable; and
//! - the **real-time scanner** (RTS), which the OS invokes when the upload
//!   is written and which may quarantine the file before the on-demand
//!   binary can read it. Its verdicts arrive asynchronously through an
//!   append-only vendor log.
//!
//! The pieces, leaves first:
//!
//! - [`parsers`] - per-engine log-line recognition into normalized detections
//! - [`cache`] - shared path-keyed detection store with TTL eviction
//! - [`tail`] - polling follower for growing, possibly rotated log files
//! - [`drivers`] - uniform engine interface: tailer + on-demand + health
//! - [`scanner`] - the per-request orchestration state machine
//! - [`api`] - axum ingress: upload materialization and verdict serialization
//! - [`config`] / [`metrics`] - environment configuration and counters

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod drivers;
pub mod metrics;
pub mod parsers;
pub mod scanner;
pub mod tail;

pub use crate::cache::DetectionCache;
pub use crate::config::{Config, DriverConfig};
pub use crate::core::{
    Detection, EngineHealth, EngineInfo, EngineKind, Phase, ScanError, ScanRequest, ScanResponse,
    ScanResult, Verdict,
};
pub use crate::drivers::{ArcDriver, Driver};
pub use crate::metrics::Metrics;
pub use crate::scanner::Scanner;
