use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// An allowed time-of-day window in a named timezone. `start > end` denotes
/// an overnight window (e.g. 22:00 -> 06:00); membership is "after start OR
/// before end on the same wall-clock day".
#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, timezone: Tz) -> Self {
        Self { start, end, timezone }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local_time = at.with_timezone(&self.timezone).time();
        if self.start <= self.end {
            local_time >= self.start && local_time < self.end
        } else {
            local_time >= self.start || local_time < self.end
        }
    }

    /// The next instant, at or after `at`, when the window opens. Used by
    /// interval-mode scheduling to skip past a dead stretch instead of
    /// polling through it.
    pub fn next_start_after(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        if self.contains(at) {
            return at;
        }
        let local = at.with_timezone(&self.timezone);
        let mut date = local.date_naive();
        let mut candidate = self.local_datetime(date);
        if candidate <= local {
            date = date.succ_opt().unwrap_or(date);
            candidate = self.local_datetime(date);
        }
        candidate.with_timezone(&Utc)
    }

    fn local_datetime(&self, date: chrono::NaiveDate) -> DateTime<Tz> {
        let naive = NaiveDateTime::new(date, self.start);
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&naive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone as _};

    fn utc_at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        ))
    }

    #[test]
    fn daytime_window_excludes_outside_hours() {
        let window = TimeWindow::new(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), NaiveTime::from_hms_opt(17, 0, 0).unwrap(), chrono_tz::UTC);
        assert!(window.contains(utc_at(10, 0)));
        assert!(!window.contains(utc_at(20, 0)));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let window = TimeWindow::new(NaiveTime::from_hms_opt(22, 0, 0).unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap(), chrono_tz::UTC);
        assert!(window.contains(utc_at(23, 0)));
        assert!(window.contains(utc_at(3, 0)));
        assert!(!window.contains(utc_at(12, 0)));
    }

    #[test]
    fn next_start_after_same_day_when_before_open() {
        let window = TimeWindow::new(NaiveTime::from_hms_opt(22, 0, 0).unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap(), chrono_tz::UTC);
        let next = window.next_start_after(utc_at(12, 0));
        assert_eq!(next, utc_at(22, 0));
    }

    #[test]
    fn next_start_after_rolls_to_tomorrow_when_past_open() {
        let window = TimeWindow::new(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), NaiveTime::from_hms_opt(17, 0, 0).unwrap(), chrono_tz::UTC);
        let next = window.next_start_after(utc_at(18, 0));
        assert_eq!(next.date_naive(), utc_at(18, 0).date_naive().succ_opt().unwrap());
    }

    #[test]
    fn already_inside_window_returns_same_instant() {
        let window = TimeWindow::new(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), NaiveTime::from_hms_opt(17, 0, 0).unwrap(), chrono_tz::UTC);
        let at = utc_at(10, 0);
        assert_eq!(window.next_start_after(at), at);
    }
}
