//! Creation-date window used to filter pull requests

use crate::ConfigError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Inclusive `[start, end]` range of creation timestamps to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CrawlWindow {
    /// Builds a window from two bounds
    ///
    /// Each bound is either an RFC 3339 timestamp or a `YYYY-MM-DD` date. A
    /// bare start date means the start of that day; a bare end date covers
    /// the whole day.
    ///
    /// # Example
    ///
    /// ```
    /// use pr_crawler::config::CrawlWindow;
    ///
    /// let window = CrawlWindow::parse("2018-01-01", "2023-12-31").unwrap();
    /// let late = "2023-12-31T18:00:00Z".parse().unwrap();
    /// assert!(window.contains(late));
    /// ```
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let start_ts = parse_bound(start, NaiveTime::MIN)?;
        let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap_or(NaiveTime::MIN);
        let end_ts = parse_bound(end, end_of_day)?;

        if start_ts > end_ts {
            return Err(ConfigError::InvalidDate(format!(
                "start '{}' is after end '{}'",
                start, end
            )));
        }

        Ok(Self {
            start: start_ts,
            end: end_ts,
        })
    }

    /// Returns true if `ts` lies inside the window, bounds included
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

fn parse_bound(value: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|e| ConfigError::InvalidDate(format!("'{}': {}", value, e)))
}
