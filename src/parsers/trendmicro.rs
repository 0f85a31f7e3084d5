//! Trend Micro DS Agent SCTRL log parser.
//!
//! Single recognized form:
//!
//! ```text
//! 2025-11-21 13:53:06.726130: [ds_am/4] | [SCTRL] (0000-0000-0000, /home/ubuntu/x.file) virus found: 2, act_1st=2, ...
//! ```
//!
//! The path is everything between the comma-space and the closing
//! parenthesis, spaces included. SCTRL does not carry signature names on
//! this channel, so detections have an empty signature; the on-demand JSON
//! report supplies `malwareName` when one is available. `clean` and
//! `failed: N` variants are skipped (a failed scan must not be cached as
//! clean, and clean paths are inferred by absence).

use regex::Regex;
use std::sync::LazyLock;

use crate::core::Detection;

// Matches: (trace-id, /path/to/file) virus found:
static VIRUS_FOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\([^,]+,\s*([^)]+)\)\s*virus found:").expect("trendmicro virus found regex")
});

/// Parses one DS Agent SCTRL log line.
pub fn parse(line: &str) -> Option<Detection> {
    let caps = VIRUS_FOUND_RE.captures(line)?;
    let path = caps[1].trim().to_string();
    Some(Detection::infected(path, "", line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;

    const SAMPLE: &str = "2025-11-21 13:53:06.726130: [ds_am/4] | [SCTRL] \
        (0000-0000-0000, /home/ubuntu/xxxx.file) virus found: 2, act_1st=2, act_2nd=255, \
        act_1st_error_code=0 | scanctrl_vmpd_module.cpp:1538:scanctrl_determine_send_dispatch_result \
        | F7E01:1784DB:4451::";

    #[test]
    fn parses_virus_found_line() {
        let det = parse(SAMPLE).unwrap();
        assert_eq!(det.path, "/home/ubuntu/xxxx.file");
        assert_eq!(det.signature, "");
        assert_eq!(det.verdict, Verdict::Infected);
        assert_eq!(det.raw, SAMPLE);
    }

    #[test]
    fn preserves_spaces_in_path() {
        let line = "[SCTRL] (abc-123, /tmp/my upload dir/file one.bin) virus found: 1";
        let det = parse(line).unwrap();
        assert_eq!(det.path, "/tmp/my upload dir/file one.bin");
    }

    #[test]
    fn clean_variant_ignored() {
        assert!(parse("[SCTRL] (abc-123, /tmp/a.bin) clean").is_none());
    }

    #[test]
    fn failed_variant_ignored() {
        assert!(parse("[SCTRL] (abc-123, /tmp/a.bin) failed: 5").is_none());
    }

    #[test]
    fn unrecognized_lines_ignored() {
        assert!(parse("").is_none());
        assert!(parse("virus found: 2").is_none());
        assert!(parse("(unclosed, /tmp/a virus found: 1").is_none());
        assert!(parse("ds_agent heartbeat OK").is_none());
        assert!(parse("绝对不是一条检测日志").is_none());
    }
}
