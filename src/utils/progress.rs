//! Progress formatting helpers
//!
//! Pure functions that turn a position/duration pair into the values a UI
//! shows next to a seek bar.

/// Placeholder rendered for positions that cannot be displayed
pub const UNKNOWN_TIMESTAMP: &str = "--:--";

/// Percentage of `duration_ms` covered by `position_ms`, clamped to `[0, 100]`.
///
/// A zero or negative duration means "unknown" and yields 0.
pub fn percent(position_ms: i64, duration_ms: i64) -> f32 {
    if duration_ms <= 0 {
        return 0.0;
    }

    let pct = (position_ms as f64 / duration_ms as f64) * 100.0;
    pct.clamp(0.0, 100.0) as f32
}

/// Render milliseconds as `M:SS`.
///
/// Minutes are not capped, so a 75 minute position renders as `75:00`.
pub fn format(ms: i64) -> String {
    if ms < 0 {
        return UNKNOWN_TIMESTAMP.to_string();
    }

    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    format!("{}:{:02}", minutes, seconds)
}

/// Target position for a percentage seek, or `None` when the duration is unknown
/// or the percentage is outside `[0, 100]`.
pub fn position_for_percent(percent: f32, duration_ms: u64) -> Option<u64> {
    if duration_ms == 0 || !(0.0..=100.0).contains(&percent) {
        return None;
    }

    Some(((duration_ms as f64) * f64::from(percent) / 100.0).round() as u64)
}
