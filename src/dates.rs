use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Reads a `YYYY-MM-DD` date. A full date-time is accepted only when the
/// whole value parses, and then its date part is kept.
pub fn parse_date_only(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if t.contains(['T', ' ']) {
        return parse_date_time(t).map(|dt| dt.date());
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()
}

/// Accepts `T` or space separated date-times, with or without seconds, RFC 3339
/// values with an offset (normalized to UTC), and bare dates (midnight).
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(v) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(v);
        }
    }
    if let Ok(v) = DateTime::parse_from_rfc3339(t) {
        return Some(v.naive_utc());
    }
    if t.len() == 10 {
        return NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    None
}

/// First and last calendar day of `month` (1-based) in `year`.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// es-CL display form, `dd-mm-yyyy`.
pub fn format_date_es(d: NaiveDate) -> String {
    d.format("%d-%m-%Y").to_string()
}
