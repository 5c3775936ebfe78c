// Time codecs for the three subtitle formats
//
// SRT: HH:MM:SS,mmm
// VTT: HH:MM:SS.mmm or MM:SS.mmm (always written with hours)
// ASS: H:MM:SS.cc (centiseconds)

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static SRT_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2}),(\d{3})$").expect("valid SRT time pattern"));

static VTT_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})$").expect("valid VTT time pattern")
});

static ASS_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})\.(\d{2})$").expect("valid ASS time pattern"));

fn field(caps: &regex::Captures<'_>, i: usize) -> Option<u64> {
    match caps.get(i) {
        Some(m) => m.as_str().parse().ok(),
        None => Some(0),
    }
}

/// Combine clock fields, rejecting out-of-range minutes or seconds and overflow
fn from_parts(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<Duration> {
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    let total = hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)?;
    Some(Duration::from_millis(total))
}

fn split(d: Duration) -> (u128, u128, u128, u128) {
    let total = d.as_millis();
    (
        total / 3_600_000,
        (total % 3_600_000) / 60_000,
        (total % 60_000) / 1_000,
        total % 1_000,
    )
}

/// Parse an SRT timestamp
pub fn parse_srt(s: &str) -> Option<Duration> {
    let caps = SRT_TIME.captures(s.trim())?;
    from_parts(field(&caps, 1)?, field(&caps, 2)?, field(&caps, 3)?, field(&caps, 4)?)
}

/// Format a duration as an SRT timestamp
pub fn format_srt(d: Duration) -> String {
    let (h, m, s, ms) = split(d);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Parse a VTT timestamp, hours optional
pub fn parse_vtt(s: &str) -> Option<Duration> {
    let caps = VTT_TIME.captures(s.trim())?;
    from_parts(field(&caps, 1)?, field(&caps, 2)?, field(&caps, 3)?, field(&caps, 4)?)
}

/// Format a duration as a VTT timestamp
pub fn format_vtt(d: Duration) -> String {
    let (h, m, s, ms) = split(d);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Parse an ASS timestamp
pub fn parse_ass(s: &str) -> Option<Duration> {
    let caps = ASS_TIME.captures(s.trim())?;
    from_parts(
        field(&caps, 1)?,
        field(&caps, 2)?,
        field(&caps, 3)?,
        field(&caps, 4)? * 10,
    )
}

/// Format a duration as an ASS timestamp. Sub-centisecond precision is truncated.
pub fn format_ass(d: Duration) -> String {
    let (h, m, s, ms) = split(d);
    format!("{}:{:02}:{:02}.{:02}", h, m, s, ms / 10)
}

/// Convert provider seconds into a duration, clamping garbage to zero
pub fn from_seconds(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_time() {
        assert_eq!(format_srt(Duration::ZERO), "00:00:00,000");
        assert_eq!(format_srt(Duration::from_millis(65_123)), "00:01:05,123");
        assert_eq!(format_srt(Duration::from_millis(3_661_500)), "01:01:01,500");
        assert_eq!(parse_srt("01:01:01,500"), Some(Duration::from_millis(3_661_500)));
        assert_eq!(parse_srt("01:01:01.500"), None);
        assert_eq!(parse_srt("00:61:00,000"), None);
    }

    #[test]
    fn test_vtt_time_short_form() {
        assert_eq!(parse_vtt("01:05.250"), Some(Duration::from_millis(65_250)));
        assert_eq!(parse_vtt("00:01:05.250"), Some(Duration::from_millis(65_250)));
        assert_eq!(format_vtt(Duration::from_millis(65_250)), "00:01:05.250");
    }

    #[test]
    fn test_ass_time_centiseconds() {
        assert_eq!(parse_ass("0:00:01.50"), Some(Duration::from_millis(1_500)));
        assert_eq!(parse_ass("10:00:00.01"), Some(Duration::from_millis(36_000_010)));
        assert_eq!(format_ass(Duration::from_millis(1_509)), "0:00:01.50");
        assert_eq!(format_ass(Duration::from_millis(36_000_010)), "10:00:00.01");
        assert_eq!(parse_ass("0:00:01.5"), None);
    }

    #[test]
    fn test_huge_hours_are_rejected() {
        assert_eq!(parse_ass("99999999999999999:00:00.00"), None);
        assert_eq!(parse_ass("999999999999999999999:00:00.00"), None);
        assert_eq!(parse_srt("99999999999999999:00:00,000"), None);
        assert_eq!(parse_vtt("999999999999999999999:00:00.000"), None);
        assert_eq!(parse_ass("1000:00:00.00"), Some(Duration::from_secs(3_600_000)));
    }

    #[test]
    fn test_from_seconds_clamps() {
        assert_eq!(from_seconds(2.5), Duration::from_millis(2_500));
        assert_eq!(from_seconds(-1.0), Duration::ZERO);
        assert_eq!(from_seconds(f64::NAN), Duration::ZERO);
    }
}
