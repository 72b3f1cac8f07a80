use chrono::{DateTime, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartDateFormat {
    Year,       // 2024
    MonthYear,  // Jan 2024
    DayMonth,   // 12 Jan
    HourMin,    // 10:30
    HourMinSec, // 10:30:15
}

impl SmartDateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Year => "%Y",
            Self::MonthYear => "%b %Y",
            Self::DayMonth => "%d %b",
            Self::HourMin => "%H:%M",
            Self::HourMinSec => "%H:%M:%S",
        }
    }
}

/// Determines the best date format for a span of dates (in seconds).
pub fn determine_date_format(span_sec: f64) -> SmartDateFormat {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 3600.0;
    const DAY: f64 = 24.0 * HOUR;
    const MONTH: f64 = 30.0 * DAY;
    const YEAR: f64 = 365.0 * DAY;

    if span_sec > YEAR * 2.0 {
        SmartDateFormat::Year
    } else if span_sec > MONTH * 2.0 {
        SmartDateFormat::MonthYear
    } else if span_sec > DAY * 1.5 {
        SmartDateFormat::DayMonth
    } else if span_sec > MINUTE * 5.0 {
        SmartDateFormat::HourMin
    } else {
        SmartDateFormat::HourMinSec
    }
}

/// Formats a date with a chrono pattern, in `tz` when given, UTC otherwise.
pub fn format_date(date: &DateTime<Utc>, pattern: &str, tz: Option<Tz>) -> String {
    match tz {
        Some(tz) => date.with_timezone(&tz).format(pattern).to_string(),
        None => date.format(pattern).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_smart_format_thresholds() {
        assert_eq!(determine_date_format(10.0), SmartDateFormat::HourMinSec);
        assert_eq!(determine_date_format(3600.0), SmartDateFormat::HourMin);
        assert_eq!(determine_date_format(5.0 * 86400.0), SmartDateFormat::DayMonth);
        assert_eq!(determine_date_format(3.0 * 365.0 * 86400.0), SmartDateFormat::Year);
    }

    #[test]
    fn test_format_in_timezone() {
        let date = Utc.with_ymd_and_hms(2024, 1, 12, 23, 30, 0).unwrap();
        assert_eq!(format_date(&date, "%H:%M", None), "23:30");
        let paris: Tz = "Europe/Paris".parse().unwrap();
        assert_eq!(format_date(&date, "%d %H:%M", Some(paris)), "13 00:30");
    }
}
