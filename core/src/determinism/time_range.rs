use regex::Regex;
use std::sync::OnceLock;
use time::Duration;

/// Parses look-back expressions such as `30d`, `2w`, `24h` or `1m`.
///
/// Units: `h` hours, `d` days, `w` weeks, `m` 30-day months.
pub fn parse_time_range(expr: &str) -> Option<Duration> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"^\s*(\d+)\s*([hdwm])\s*$").ok())
        .as_ref()?;
    let caps = re.captures(expr)?;
    let value: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = match caps.get(2)?.as_str() {
        "h" => Duration::HOUR,
        "d" => Duration::DAY,
        "w" => Duration::WEEK,
        "m" => Duration::days(30),
        _ => return None,
    };
    unit.checked_mul(i32::try_from(value).ok()?)
}

/// Like [`parse_time_range`] but falls back to `default` for bad input.
pub fn time_range_or(expr: &str, default: Duration) -> Duration {
    match parse_time_range(expr) {
        Some(d) => d,
        None => {
            tracing::debug!(expr, "unparsable time range, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse_time_range("24h"), Some(Duration::hours(24)));
        assert_eq!(parse_time_range("30d"), Some(Duration::days(30)));
        assert_eq!(parse_time_range("2w"), Some(Duration::weeks(2)));
        assert_eq!(parse_time_range("1m"), Some(Duration::days(30)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_time_range("yesterday"), None);
        assert_eq!(parse_time_range("5y"), None);
        assert_eq!(time_range_or("", Duration::DAY), Duration::DAY);
    }
}
