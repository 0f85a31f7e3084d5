//! Engine log-line parsers.
//!
//! Each engine has a pure function `parse(line) -> Option<Detection>` that
//! recognizes one complete log line (without trailing newline). Parsers are
//! total and side-effect free: decisive infected lines yield a normalized
//! [`Detection`](crate::core::Detection), everything else yields `None`.
//! Clean lines are deliberately not parsed into detections; clean is
//! inferred by absence combined with a successful on-demand scan.

pub mod clamav;
pub mod trendmicro;
