use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;

/// Every chat in the household lives in one timezone; all stored timestamps
/// are naive civil time in this zone.
pub const LOCAL_TZ: Tz = chrono_tz::Asia::Jerusalem;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current time, timezone-aware.
pub fn now() -> DateTime<Tz> {
    chrono::Utc::now().with_timezone(&LOCAL_TZ)
}

/// Current civil time as stored in the database.
pub fn now_naive() -> NaiveDateTime {
    now().naive_local()
}

/// Strip the offset from an aware timestamp for storage.
pub fn to_naive(dt: DateTime<Tz>) -> NaiveDateTime {
    dt.with_timezone(&LOCAL_TZ).naive_local()
}

pub fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Lenient parse: tolerates a trailing fractional-seconds part left behind
/// by earlier schema versions.
pub fn parse_ts(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.split('.').next().unwrap_or(raw);
    NaiveDateTime::parse_from_str(trimmed, TS_FORMAT).ok()
}
