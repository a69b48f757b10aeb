// ===============================
// src/normalize.rs
// ===============================
//
// Boundary normalizers: every timestamp shape the API surfaces emit is folded
// into epoch millis here, every user date into a NaiveDate, every status into
// its display name. Nothing past this module re-checks wire field names.
//
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::PLACEHOLDER;

pub type EpochMillis = i64;

/// int64 arrives as a JSON number or (protobuf JSON) as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntLike {
    Num(i64),
    Text(String),
}

impl IntLike {
    fn value(&self) -> Option<i64> {
        match self {
            IntLike::Num(n) => Some(*n),
            IntLike::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CivilDate {
    year: i32,
    month: u32,
    day: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Iso(String),
    Epoch {
        #[serde(alias = "_seconds")]
        seconds: IntLike,
        #[serde(default, alias = "_nanos")]
        nanos: Option<IntLike>,
    },
    // SOAP-style DateTime {date:{year,month,day}, hour, minute, second}
    Civil {
        date: CivilDate,
        #[serde(default)]
        hour: u32,
        #[serde(default)]
        minute: u32,
        #[serde(default)]
        second: u32,
    },
}

impl WireTimestamp {
    fn epoch_millis(&self) -> Option<EpochMillis> {
        match self {
            WireTimestamp::Iso(s) => parse_iso(s),
            WireTimestamp::Epoch { seconds, nanos } => {
                let secs = seconds.value()?;
                let nanos = nanos.as_ref().and_then(IntLike::value).unwrap_or(0);
                secs.checked_mul(1000)?.checked_add(nanos / 1_000_000)
            }
            WireTimestamp::Civil { date, hour, minute, second } => {
                let d = NaiveDate::from_ymd_opt(date.year, date.month, date.day)?;
                let dt = d.and_hms_opt(*hour, *minute, *second)?;
                Some(Utc.from_utc_datetime(&dt).timestamp_millis())
            }
        }
    }
}

fn parse_iso(s: &str) -> Option<EpochMillis> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt).timestamp_millis());
    }
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?).timestamp_millis())
}

/// Epoch millis for an ISO string, a `{seconds, nanos}` pair (or the
/// `_seconds`/`_nanos` spelling) or a civil DateTime object. Never fails loudly.
pub fn parse_timestamp(value: &Value) -> Option<EpochMillis> {
    WireTimestamp::deserialize(value).ok()?.epoch_millis()
}

/// `DDMMYYYY` (always day-first) or `YYYY-MM-DD`; anything else goes through
/// a handful of common layouts.
pub fn parse_user_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let day = s[0..2].parse().ok()?;
        let month = s[2..4].parse().ok()?;
        let year = s[4..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if s.len() >= 10 && s.as_bytes()[4] == b'-' {
        return NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok();
    }
    const LAYOUTS: [&str; 6] = ["%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%d %B %Y", "%B %d, %Y", "%d %b %Y"];
    for layout in LAYOUTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, layout) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// clap value parser wrapper around [`parse_user_date`].
pub fn parse_date_arg(text: &str) -> Result<NaiveDate, String> {
    parse_user_date(text).ok_or_else(|| format!("invalid date '{text}' (use DDMMYYYY or YYYY-MM-DD)"))
}

/// Numeric codes go through `table` (falling back to the number itself);
/// strings are kept as they came.
pub fn normalize_status(raw: &Value, table: &[(i64, &str)]) -> String {
    match raw {
        Value::Number(n) => match n.as_i64() {
            Some(code) => table
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| code.to_string()),
            None => n.to_string(),
        },
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// `YYYY-MM-DD` (UTC) or the placeholder.
pub fn format_date(ms: Option<EpochMillis>) -> String {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `num / den * 100` with `decimals` places and a `%` suffix; placeholder
/// when the denominator is not positive.
pub fn format_percent(num: i64, den: i64, decimals: usize) -> String {
    if den <= 0 {
        return PLACEHOLDER.to_string();
    }
    format!("{:.*}%", decimals, num as f64 / den as f64 * 100.0)
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
