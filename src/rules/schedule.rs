//! 时间表规则 - 月份、日期、星期、时刻四个维度同时满足才算命中

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;

use super::range::{Ordinal, RangeSet};
use super::{Status, StatusRule};
use crate::error::ValidationError;

/// 星期（周日为 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    const ALL: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_sunday() as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Sun => "SUN",
            Weekday::Mon => "MON",
            Weekday::Tue => "TUE",
            Weekday::Wed => "WED",
            Weekday::Thu => "THU",
            Weekday::Fri => "FRI",
            Weekday::Sat => "SAT",
        }
    }
}

impl Ordinal for Weekday {
    fn ordinal(&self) -> u32 {
        *self as u32
    }
}

impl FromStr for Weekday {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == upper)
            .ok_or_else(|| ValidationError::new(format!("unknown day of week '{s}'")))
    }
}

/// 月份（一月为 1）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Month {
    Jan = 1,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// `month` 取值 1..=12
    pub fn from_number(month: u32) -> Option<Self> {
        month
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i as usize))
            .copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Month::Jan => "JAN",
            Month::Feb => "FEB",
            Month::Mar => "MAR",
            Month::Apr => "APR",
            Month::May => "MAY",
            Month::Jun => "JUN",
            Month::Jul => "JUL",
            Month::Aug => "AUG",
            Month::Sep => "SEP",
            Month::Oct => "OCT",
            Month::Nov => "NOV",
            Month::Dec => "DEC",
        }
    }
}

impl Ordinal for Month {
    fn ordinal(&self) -> u32 {
        *self as u32
    }
}

impl FromStr for Month {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| ValidationError::new(format!("unknown month '{s}'")))
    }
}

/// 一天中的时刻，精确到分钟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

/// `9:30` / `17:45` / `9pm` / `9:30pm` / `9:30 PM`
static TIME_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*([AaPp][Mm])?$").expect("Invalid time-of-day regex")
});

const TIME_FORMATS: &str = "H:MM, HH:MM, Ham, H:MMam, H:MM AM";

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn from_datetime(ts: &NaiveDateTime) -> Self {
        Self::new(ts.hour(), ts.minute())
    }
}

impl Ordinal for TimeOfDay {
    fn ordinal(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ValidationError::new(format!(
                "time format '{s}' is not valid, require one of {TIME_FORMATS}"
            ))
        };

        let caps = TIME_FORMAT.captures(s.trim()).ok_or_else(invalid)?;
        let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
        let minute: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse().map_err(|_| invalid())?,
            None => 0,
        };
        if minute > 59 {
            return Err(invalid());
        }

        let hour = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(meridiem) => {
                if !(1..=12).contains(&hour) {
                    return Err(invalid());
                }
                match (meridiem.as_str(), hour) {
                    ("am", 12) => 0,
                    ("am", h) => h,
                    ("pm", 12) => 12,
                    (_, h) => h + 12,
                }
            }
            // 没有 am/pm 时必须写出分钟，否则 "9" 这种写法含义不明
            None if caps.get(2).is_none() => return Err(invalid()),
            None if hour > 23 => return Err(invalid()),
            None => hour,
        };

        Ok(Self::new(hour, minute))
    }
}

/// 时间表规则
#[derive(Debug, Clone)]
pub struct ScheduleDefinition {
    pub status: Status,
    pub months: RangeSet<Month>,
    pub dates: RangeSet<u32>,
    pub days: RangeSet<Weekday>,
    pub times: RangeSet<TimeOfDay>,
}

impl ScheduleDefinition {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            months: RangeSet::Any,
            dates: RangeSet::Any,
            days: RangeSet::Any,
            times: RangeSet::Any,
        }
    }

    pub fn with_months(mut self, months: RangeSet<Month>) -> Self {
        self.months = months;
        self
    }

    pub fn with_dates(mut self, dates: RangeSet<u32>) -> Self {
        self.dates = dates;
        self
    }

    pub fn with_days(mut self, days: RangeSet<Weekday>) -> Self {
        self.days = days;
        self
    }

    pub fn with_times(mut self, times: RangeSet<TimeOfDay>) -> Self {
        self.times = times;
        self
    }

    pub fn matches(&self, timestamp: &NaiveDateTime) -> bool {
        let month = Month::from_number(timestamp.month());
        month.map_or(false, |m| self.months.in_range(&m))
            && self.dates.in_range(&timestamp.day())
            && self.days.in_range(&Weekday::from_chrono(timestamp.weekday()))
            && self.times.in_range(&TimeOfDay::from_datetime(timestamp))
    }
}

impl StatusRule for ScheduleDefinition {
    fn status(&self) -> Status {
        self.status
    }
}
