use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};

use shared_config::AppConfig;

pub const OPENING_HOUR: u32 = 8;
pub const CLOSING_HOUR: u32 = 18;

/// Wall-clock source for the clinic. All "today"/"has this passed"
/// decisions run in the clinic's fixed UTC offset (Lima by default, no
/// DST), never in server-local time.
#[derive(Debug, Clone, Copy)]
pub struct ClinicClock {
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self { offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_utc_offset_hours)
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// True once the given clinic-local date/time is behind the clock.
    pub fn has_passed(&self, date: NaiveDate, time: NaiveTime) -> bool {
        NaiveDateTime::new(date, time) < self.now().naive_local()
    }

    /// Compact clinic-local timestamp used in receipt numbers.
    pub fn timestamp_token(&self) -> String {
        self.now().format("%Y%m%d%H%M%S").to_string()
    }
}

/// 1 = Monday .. 7 = Sunday, matching the template rows.
pub fn weekday_number(date: NaiveDate) -> i32 {
    date.weekday().number_from_monday() as i32
}

/// The clinic works Monday through Saturday.
pub fn is_weekday(date: NaiveDate) -> bool {
    date.weekday() != Weekday::Sun
}

/// Half-open business window [08:00, 18:00).
pub fn is_business_hour(time: NaiveTime) -> bool {
    (OPENING_HOUR..CLOSING_HOUR).contains(&time.hour())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_numbers() {
        // 2025-03-03 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(weekday_number(monday), 1);
        assert_eq!(weekday_number(monday + chrono::Duration::days(6)), 7);
    }

    #[test]
    fn test_saturday_is_working_day() {
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert!(is_weekday(saturday));
        assert!(!is_weekday(sunday));
    }

    #[test]
    fn test_business_hours_half_open() {
        assert!(is_business_hour(NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
        assert!(is_business_hour(NaiveTime::from_hms_opt(17, 59, 0).unwrap()));
        assert!(!is_business_hour(NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
        assert!(!is_business_hour(NaiveTime::from_hms_opt(7, 30, 0).unwrap()));
    }

    #[test]
    fn test_has_passed_uses_clinic_offset() {
        let clock = ClinicClock::new(-5);
        let yesterday = clock.today() - chrono::Duration::days(1);
        let tomorrow = clock.today() + chrono::Duration::days(1);
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        assert!(clock.has_passed(yesterday, noon));
        assert!(!clock.has_passed(tomorrow, noon));
    }

    #[test]
    fn test_timestamp_token_shape() {
        let clock = ClinicClock::new(-5);
        let token = clock.timestamp_token();
        assert_eq!(token.len(), 14);
        assert!(token.chars().all(|c| c.is_ascii_digit()));
    }
}
