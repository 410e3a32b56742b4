/// Time formatting helpers for rendered replies
use chrono::{DateTime, Utc};

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date_time(t: &DateTime<Utc>) -> String {
    t.format(DATE_TIME_FORMAT).to_string()
}

pub fn format_date(t: &DateTime<Utc>) -> String {
    t.format(DATE_FORMAT).to_string()
}

/// Whole days until `t`, clamped at zero
pub fn days_until(t: &DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (*t - now).num_days().max(0)
}

/// "permanent", "expired", or "2024-05-01 (12 days left)"
pub fn format_expire_time(expire_at: Option<&DateTime<Utc>>) -> String {
    format_expire_time_at(expire_at, Utc::now())
}

pub fn format_expire_time_at(expire_at: Option<&DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match expire_at {
        None => "permanent".to_string(),
        Some(t) if *t <= now => "expired".to_string(),
        Some(t) => format!("{} ({} days left)", format_date(t), days_until(t, now)),
    }
}
