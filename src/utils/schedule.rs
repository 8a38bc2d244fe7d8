use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::models::workflow_schedule::{
    SCHEDULE_TYPE_CRON, SCHEDULE_TYPE_DAILY, SCHEDULE_TYPE_MONTHLY, SCHEDULE_TYPE_WEEKLY,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    pub time: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn parse_timezone(tz: &str) -> Option<Tz> {
    if tz.trim().is_empty() {
        return Some(chrono_tz::UTC);
    }
    tz.parse::<Tz>().ok()
}

fn parse_wall_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

fn next_daily(config: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let config: DailyConfig = serde_json::from_value(config.clone()).ok()?;
    let tz = parse_timezone(&config.timezone)?;
    let wall_clock = parse_wall_clock(&config.time)?;

    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive().and_time(wall_clock);
    // Ambiguous DST transitions resolve to the earliest valid instant.
    let candidate = tz
        .from_local_datetime(&today)
        .earliest()
        .or_else(|| tz.from_local_datetime(&today).latest())?
        .with_timezone(&Utc);

    if candidate > now {
        Some(candidate)
    } else {
        let tomorrow = today.checked_add_signed(Duration::days(1))?;
        let next = tz
            .from_local_datetime(&tomorrow)
            .earliest()
            .or_else(|| tz.from_local_datetime(&tomorrow).latest())?;
        Some(next.with_timezone(&Utc))
    }
}

/// Pure next-trigger calculator. Weekly and monthly are flat +7/+30-day
/// offsets, not calendar-aware recurrence; `cron` schedules are stored but
/// never become due.
pub fn next_run(schedule_type: &str, config: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule_type {
        SCHEDULE_TYPE_DAILY => next_daily(config, now),
        SCHEDULE_TYPE_WEEKLY => now.checked_add_signed(Duration::weeks(1)),
        SCHEDULE_TYPE_MONTHLY => now.checked_add_signed(Duration::days(30)),
        SCHEDULE_TYPE_CRON => None,
        _ => None,
    }
}

pub fn offset_to_utc(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

pub fn utc_to_offset(dt: DateTime<Utc>) -> Option<OffsetDateTime> {
    let base = OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok()?;
    base.replace_nanosecond(dt.timestamp_subsec_nanos()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn daily_today_when_time_still_ahead() {
        let now = at("2024-03-01T08:30:00Z");
        let next = next_run("daily", &json!({"time": "09:00"}), now).unwrap();
        assert_eq!(next, at("2024-03-01T09:00:00Z"));
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_elapsed() {
        let now = at("2024-03-01T09:05:00Z");
        let next = next_run("daily", &json!({"time": "09:00"}), now).unwrap();
        assert_eq!(next, at("2024-03-02T09:00:00Z"));
    }

    #[test]
    fn daily_exact_match_counts_as_elapsed() {
        let now = at("2024-03-01T09:00:00Z");
        let next = next_run("daily", &json!({"time": "09:00"}), now).unwrap();
        assert_eq!(next, at("2024-03-02T09:00:00Z"));
    }

    #[test]
    fn daily_is_idempotent_for_a_fixed_now() {
        let now = at("2024-03-01T09:05:00Z");
        let config = json!({"time": "09:00"});
        let first = next_run("daily", &config, now);
        let second = next_run("daily", &config, now);
        assert_eq!(first, second);
    }

    #[test]
    fn daily_respects_timezone() {
        // 14:30 in New York is 19:30 UTC while still on EST.
        let now = at("2024-03-01T12:00:00Z");
        let next = next_run(
            "daily",
            &json!({"time": "14:30", "timezone": "America/New_York"}),
            now,
        )
        .unwrap();
        assert_eq!(next, at("2024-03-01T19:30:00Z"));
    }

    #[test]
    fn daily_rejects_malformed_time() {
        let now = at("2024-03-01T12:00:00Z");
        assert_eq!(next_run("daily", &json!({"time": "9am"}), now), None);
        assert_eq!(next_run("daily", &json!({}), now), None);
    }

    #[test]
    fn weekly_is_a_flat_seven_day_offset() {
        let now = at("2024-03-01T10:00:00Z");
        let next = next_run("weekly", &json!({}), now).unwrap();
        assert_eq!(next, at("2024-03-08T10:00:00Z"));
    }

    #[test]
    fn monthly_is_a_flat_thirty_day_offset() {
        let now = at("2024-03-01T10:00:00Z");
        let next = next_run("monthly", &json!({}), now).unwrap();
        assert_eq!(next, at("2024-03-31T10:00:00Z"));
    }

    #[test]
    fn cron_is_never_due() {
        let now = at("2024-03-01T10:00:00Z");
        assert_eq!(next_run("cron", &json!({"expr": "0 9 * * *"}), now), None);
    }

    #[test]
    fn unknown_type_is_never_due() {
        let now = at("2024-03-01T10:00:00Z");
        assert_eq!(next_run("hourly", &json!({}), now), None);
    }

    #[test]
    fn time_offset_round_trip() {
        let utc = at("2024-03-01T09:05:42Z");
        let offset = utc_to_offset(utc).unwrap();
        assert_eq!(offset_to_utc(offset).unwrap(), utc);
    }
}
