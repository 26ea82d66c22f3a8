//! 重复规则
//!
//! 结构化的重复规则，可转换为 iCalendar (RFC 5545) 的 `RRULE` / `EXDATE` 行。

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// 重复频率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_ical(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// 重复截止时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<Weekday>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_month: Vec<i8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub months_of_year: Vec<u8>,
    /// 跳过的具体日期
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<DateTime<Utc>>,
}

fn ical_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// iCalendar UTC 基本格式：YYYYMMDDTHHMMSSZ
fn ical_datetime(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: None,
            count: None,
            until: None,
            days_of_week: Vec::new(),
            days_of_month: Vec::new(),
            months_of_year: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly(days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            days_of_week: days.into_iter().collect(),
            ..Self::new(Frequency::Weekly)
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_days_of_month(mut self, days: Vec<i8>) -> Self {
        self.days_of_month = days;
        self
    }

    pub fn with_months(mut self, months: Vec<u8>) -> Self {
        self.months_of_year = months;
        self
    }

    pub fn with_exception(mut self, at: DateTime<Utc>) -> Self {
        self.exceptions.push(at);
        self
    }

    /// 生成 `RRULE:` 行，值为 0 的 INTERVAL / COUNT 省略
    pub fn to_rrule(&self) -> String {
        let mut parts = vec![format!("FREQ={}", self.frequency.as_ical())];
        if let Some(interval) = self.interval.filter(|n| *n > 0) {
            parts.push(format!("INTERVAL={interval}"));
        }
        if let Some(count) = self.count.filter(|n| *n > 0) {
            parts.push(format!("COUNT={count}"));
        }
        if let Some(until) = &self.until {
            parts.push(format!("UNTIL={}", ical_datetime(until)));
        }
        if !self.days_of_week.is_empty() {
            let days: Vec<&str> = self.days_of_week.iter().copied().map(ical_weekday).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        if !self.days_of_month.is_empty() {
            parts.push(format!("BYMONTHDAY={}", join(&self.days_of_month)));
        }
        if !self.months_of_year.is_empty() {
            parts.push(format!("BYMONTH={}", join(&self.months_of_year)));
        }
        format!("RRULE:{}", parts.join(";"))
    }

    /// RRULE 行加上可选的 EXDATE 行
    pub fn to_ical_lines(&self) -> Vec<String> {
        let mut lines = vec![self.to_rrule()];
        if !self.exceptions.is_empty() {
            let dates: Vec<String> = self.exceptions.iter().map(ical_datetime).collect();
            lines.push(format!("EXDATE:{}", dates.join(",")));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_minimal_rule() {
        assert_eq!(RecurrenceRule::daily().to_rrule(), "RRULE:FREQ=DAILY");
    }

    #[test]
    fn test_full_rule() {
        let until = Utc.with_ymd_and_hms(2026, 12, 31, 23, 0, 0).unwrap();
        let rule = RecurrenceRule::weekly([Weekday::Mon, Weekday::Wed, Weekday::Fri])
            .with_interval(2)
            .with_count(10)
            .with_until(until);

        assert_eq!(
            rule.to_rrule(),
            "RRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=10;UNTIL=20261231T230000Z;BYDAY=MO,WE,FR"
        );
    }

    #[test]
    fn test_monthly_selectors() {
        let rule = RecurrenceRule::new(Frequency::Yearly)
            .with_days_of_month(vec![1, 15, -1])
            .with_months(vec![3, 9]);
        assert_eq!(
            rule.to_rrule(),
            "RRULE:FREQ=YEARLY;BYMONTHDAY=1,15,-1;BYMONTH=3,9"
        );
    }

    #[test]
    fn test_zero_interval_is_omitted() {
        let rule = RecurrenceRule::daily().with_interval(0).with_count(0);
        assert_eq!(rule.to_rrule(), "RRULE:FREQ=DAILY");
    }

    #[test]
    fn test_exceptions_become_exdate() {
        let skip = Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap();
        let lines = RecurrenceRule::daily().with_exception(skip).to_ical_lines();
        assert_eq!(lines, vec!["RRULE:FREQ=DAILY", "EXDATE:20261001T093000Z"]);
    }

    #[test]
    fn test_serde_shape() {
        let rule = RecurrenceRule::weekly([Weekday::Sat]);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["frequency"], "weekly");
        assert!(json.get("daysOfWeek").is_some());
        assert!(json.get("interval").is_none());
    }
}
