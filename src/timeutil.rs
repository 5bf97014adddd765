//! Timezone handling (spec.md §6 "Timezone" / SPEC_FULL.md §6).
//!
//! Storage always stays in `TIMESTAMPTZ` (UTC); the fixed offset
//! (`Asia/Kolkata`, `+05:30`, no DST, by default) is applied only at the
//! presentation/operating-window-check edge, per spec.md §9's "convert
//! only at the edges" note.

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike, Utc};

use crate::config::TimezoneConfig;

/// Render an instant in the configured fixed offset as `HH:MM` (24h),
/// used only to decide operating-window membership, never for storage.
pub fn local_hhmm(cfg: &TimezoneConfig, instant: DateTime<Utc>) -> NaiveTime {
    let offset = FixedOffset::east_opt(cfg.fixed_offset_minutes * 60)
        .expect("fixed_offset_minutes validated to be in range at config load");
    let local = instant.with_timezone(&offset);
    NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).expect("valid local time components")
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Whether `instant` falls inside `[window_start, window_end)` wall-clock
/// hours in the fixed timezone. A malformed setting is treated as "no
/// restriction" (the scheduler keeps creating rounds) rather than halting
/// the whole process on a typo.
pub fn within_operating_window(
    cfg: &TimezoneConfig,
    window: Option<&(String, String)>,
    instant: DateTime<Utc>,
) -> bool {
    let Some((start_raw, end_raw)) = window else {
        return true;
    };
    let (Some(start), Some(end)) = (parse_hhmm(start_raw), parse_hhmm(end_raw)) else {
        return true;
    };
    let now = local_hhmm(cfg, instant);

    if start <= end {
        now >= start && now < end
    } else {
        // Window wraps past midnight, e.g. 22:00 -> 04:00.
        now >= start || now < end
    }
}

/// Floors `instant` to the most recent round-duration boundary, aligned to
/// local midnight in the fixed offset rather than the Unix epoch (spec.md
/// §4.7 "aligned to the duration boundary").
pub fn floor_to_duration_boundary(
    cfg: &TimezoneConfig,
    instant: DateTime<Utc>,
    duration_seconds: i64,
) -> DateTime<Utc> {
    if duration_seconds <= 0 {
        return instant;
    }
    let offset_seconds = i64::from(cfg.fixed_offset_minutes) * 60;
    let local_epoch = instant.timestamp() + offset_seconds;
    let floored_local_epoch = local_epoch - local_epoch.rem_euclid(duration_seconds);
    DateTime::<Utc>::from_timestamp(floored_local_epoch - offset_seconds, 0)
        .expect("floored timestamp stays in range")
}

/// Formats a round identifier from its start instant in the fixed timezone
/// (spec.md §3: "composed from its start timestamp in a fixed timezone").
pub fn round_id_for_start(cfg: &TimezoneConfig, start_time: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(cfg.fixed_offset_minutes * 60)
        .expect("fixed_offset_minutes validated to be in range at config load");
    let local = start_time.with_timezone(&offset);
    format!("RND-{}", local.format("%Y%m%d%H%M%S%3f"))
}
