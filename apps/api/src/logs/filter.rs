use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::pagination::SortOrder;

/// Raw time-range query parameters for the log listing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TimeRangeParams {
    pub since: Option<String>,
    pub until: Option<String>,
    pub preset: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePreset {
    LastHour,
    Last24h,
    LastWeek,
    LastMonth,
}

impl TimePreset {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "last_hour" => Some(TimePreset::LastHour),
            "last_24h" => Some(TimePreset::Last24h),
            "last_week" => Some(TimePreset::LastWeek),
            "last_month" => Some(TimePreset::LastMonth),
            _ => None,
        }
    }

    pub fn span(self) -> Duration {
        match self {
            TimePreset::LastHour => Duration::hours(1),
            TimePreset::Last24h => Duration::hours(24),
            TimePreset::LastWeek => Duration::days(7),
            TimePreset::LastMonth => Duration::days(30),
        }
    }
}

/// Inclusive bounds and ordering, resolved against a fixed `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub order: SortOrder,
}

impl TimeFilter {
    pub fn resolve(params: &TimeRangeParams, now: DateTime<Utc>) -> Self {
        let mut since = params.since.as_deref().and_then(parse_timestamp);
        let mut until = params.until.as_deref().and_then(parse_timestamp);

        // A preset only applies when no explicit bound was understood.
        if since.is_none() && until.is_none() {
            if let Some(preset) = params.preset.as_deref().and_then(TimePreset::parse) {
                since = Some(now - preset.span());
                until = Some(now);
            }
        }

        Self {
            since,
            until,
            order: SortOrder::parse(params.order.as_deref()),
        }
    }
}

/// ISO-8601 timestamp. Values without an offset are taken as UTC; garbage yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn params(since: Option<&str>, until: Option<&str>, preset: Option<&str>, order: Option<&str>) -> TimeRangeParams {
        TimeRangeParams {
            since: since.map(str::to_string),
            until: until.map(str::to_string),
            preset: preset.map(str::to_string),
            order: order.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 08:30"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_preset_applies_without_explicit_bounds() {
        let filter = TimeFilter::resolve(&params(None, None, Some("last_hour"), None), now());
        assert_eq!(filter.since, Some(now() - Duration::hours(1)));
        assert_eq!(filter.until, Some(now()));
        assert_eq!(filter.order, SortOrder::Desc);
    }

    #[test]
    fn test_explicit_bound_overrides_preset() {
        let filter = TimeFilter::resolve(
            &params(Some("2024-05-01T00:00:00Z"), None, Some("last_week"), Some("asc")),
            now(),
        );
        assert_eq!(filter.since, Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()));
        assert_eq!(filter.until, None);
        assert_eq!(filter.order, SortOrder::Asc);
    }

    #[test]
    fn test_unparsable_bound_falls_back_to_preset() {
        let filter = TimeFilter::resolve(&params(Some("nonsense"), None, Some("last_month"), None), now());
        assert_eq!(filter.since, Some(now() - Duration::days(30)));
    }

    #[test]
    fn test_unknown_preset_and_order_are_ignored() {
        let filter = TimeFilter::resolve(&params(None, None, Some("last_decade"), Some("sideways")), now());
        assert_eq!(filter.since, None);
        assert_eq!(filter.until, None);
        assert_eq!(filter.order, SortOrder::Desc);
    }
}
