//! ClamAV on-access log parser.
//!
//! Recognized forms, after an optional `[YYYY-MM-DD HH:MM:SS] ` prefix:
//!
//! - `<path>: <signature> FOUND` - infected, signature captured
//! - `<path>: moved to '<dest>'` - infected with empty signature (the file
//!   was quarantined; the preceding FOUND line is authoritative, but this
//!   form is honoured too so detections survive engine restarts)
//! - `<path>: OK` and everything else - skipped

use regex::Regex;
use std::sync::LazyLock;

use crate::core::Detection;

// Matches: /path/to/file: Signature FOUND
// Path capture is greedy: "/a: b: X FOUND" parses as path "/a: b", signature
// "X". Scan directory paths must not contain ": ".
static FOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+):\s+(.+)\s+FOUND$").expect("clamav FOUND regex"));

// Matches: /path/to/file: moved to '/quarantine/file'
static MOVED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+): moved to '.+'$").expect("clamav moved regex"));

// Optional clamonacc timestamp prefix: [2025-11-21 13:53:06]
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\] ").expect("clamav timestamp regex")
});

/// Parses one ClamAV on-access log line.
pub fn parse(line: &str) -> Option<Detection> {
    let body = TIMESTAMP_RE.replace(line, "");

    if let Some(caps) = FOUND_RE.captures(&body) {
        return Some(Detection::infected(&caps[1], &caps[2], line));
    }

    if let Some(caps) = MOVED_RE.captures(&body) {
        return Some(Detection::infected(&caps[1], "", line));
    }

    None
}
