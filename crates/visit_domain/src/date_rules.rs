use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::VisitError;

/// Overdue visits past this many days are reported as severe.
pub const SEVERE_OVERDUE_AFTER_DAYS: i64 = 3;

const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";
const API_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Where a due date sits relative to "now", compared at day granularity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Urgency {
    Overdue { days: i64 },
    DueToday,
    Upcoming { days: i64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OverdueSeverity {
    Light,
    Severe,
}

impl Urgency {
    pub fn is_overdue(&self) -> bool {
        matches!(self, Urgency::Overdue { .. })
    }

    pub fn severity(&self) -> Option<OverdueSeverity> {
        match self {
            Urgency::Overdue { days } if *days > SEVERE_OVERDUE_AFTER_DAYS => {
                Some(OverdueSeverity::Severe)
            }
            Urgency::Overdue { .. } => Some(OverdueSeverity::Light),
            _ => None,
        }
    }
}

/// A validated visit cadence: the last visit plus a positive number of days.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Schedule {
    last_verified: NaiveDateTime,
    frequency_days: NonZeroU32,
    next_due: NaiveDateTime,
}

impl Schedule {
    pub fn new(last_verified: NaiveDateTime, frequency_days: i64) -> Result<Self, VisitError> {
        let frequency = u32::try_from(frequency_days)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(VisitError::InvalidFrequency(frequency_days))?;
        let next_due = last_verified
            .checked_add_signed(Duration::days(i64::from(frequency.get())))
            .ok_or(VisitError::InvalidFrequency(frequency_days))?;
        Ok(Self {
            last_verified,
            frequency_days: frequency,
            next_due,
        })
    }

    pub fn from_text(last_verified: &str, frequency_days: i64) -> Result<Self, VisitError> {
        Self::new(parse_visit_date(last_verified)?, frequency_days)
    }

    pub fn last_verified(&self) -> NaiveDateTime {
        self.last_verified
    }

    pub fn frequency_days(&self) -> u32 {
        self.frequency_days.get()
    }

    pub fn next_due(&self) -> NaiveDateTime {
        self.next_due
    }

    /// Same cadence, restarted from a new visit.
    pub fn restarted_at(&self, visited_at: NaiveDateTime) -> Result<Self, VisitError> {
        Self::new(visited_at, i64::from(self.frequency_days.get()))
    }

    pub fn urgency(&self, now: NaiveDateTime) -> Urgency {
        let late_by = now
            .date()
            .signed_duration_since(self.next_due.date())
            .num_days();
        match late_by {
            d if d > 0 => Urgency::Overdue { days: d },
            0 => Urgency::DueToday,
            d => Urgency::Upcoming { days: -d },
        }
    }

    pub fn is_pending(&self, now: NaiveDateTime) -> bool {
        self.urgency(now).is_overdue()
    }

    pub fn is_due_today(&self, now: NaiveDateTime) -> bool {
        self.urgency(now) == Urgency::DueToday
    }

    pub fn days_overdue(&self, now: NaiveDateTime) -> i64 {
        match self.urgency(now) {
            Urgency::Overdue { days } => days,
            _ => 0,
        }
    }

    pub fn days_until_due(&self, now: NaiveDateTime) -> i64 {
        match self.urgency(now) {
            Urgency::Upcoming { days } => days,
            _ => 0,
        }
    }
}

/// Parses `YYYY/MM/DD HH:MM:SS` or `DD/MM/YYYY HH:MM:SS`. The layout is picked by
/// the width of the first date field; a missing time means midnight.
pub fn parse_visit_date(input: &str) -> Result<NaiveDateTime, VisitError> {
    let mut parts = input.split_whitespace();
    let date_part = parts
        .next()
        .ok_or_else(|| VisitError::parse(input, "empty date"))?;
    let time_part = parts.next();
    if parts.next().is_some() {
        return Err(VisitError::parse(
            input,
            "expected a date and an optional time",
        ));
    }

    let date = parse_date_segment(input, date_part.trim_end_matches(','))?;
    let time = match time_part {
        Some(segment) => parse_time_segment(input, segment)?,
        None => NaiveTime::default(),
    };
    Ok(date.and_time(time))
}

pub fn next_due_date(last_verified: &str, frequency_days: i64) -> Result<NaiveDateTime, VisitError> {
    Ok(Schedule::from_text(last_verified, frequency_days)?.next_due())
}

pub fn is_pending(
    last_verified: &str,
    frequency_days: i64,
    now: NaiveDateTime,
) -> Result<bool, VisitError> {
    Ok(Schedule::from_text(last_verified, frequency_days)?.is_pending(now))
}

pub fn is_due_today(
    last_verified: &str,
    frequency_days: i64,
    now: NaiveDateTime,
) -> Result<bool, VisitError> {
    Ok(Schedule::from_text(last_verified, frequency_days)?.is_due_today(now))
}

pub fn days_overdue(
    last_verified: &str,
    frequency_days: i64,
    now: NaiveDateTime,
) -> Result<i64, VisitError> {
    Ok(Schedule::from_text(last_verified, frequency_days)?.days_overdue(now))
}

pub fn days_until_due(
    last_verified: &str,
    frequency_days: i64,
    now: NaiveDateTime,
) -> Result<i64, VisitError> {
    Ok(Schedule::from_text(last_verified, frequency_days)?.days_until_due(now))
}

/// `DD/MM/YYYY HH:MM`, as shown on visit cards.
pub fn format_date_time(date: NaiveDateTime) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

/// `DD/MM/YYYY HH:MM:SS`, the layout sent back to the visit service.
pub fn format_for_api(date: NaiveDateTime) -> String {
    date.format(API_FORMAT).to_string()
}

fn parse_date_segment(input: &str, segment: &str) -> Result<NaiveDate, VisitError> {
    let fields: Vec<&str> = segment.split('/').collect();
    let [first, second, third] = fields.as_slice() else {
        return Err(VisitError::parse(
            input,
            "date must have three `/`-separated fields",
        ));
    };
    let (year, month, day) = if first.len() == 4 {
        (*first, *second, *third)
    } else {
        (*third, *second, *first)
    };
    let year: i32 = parse_field(input, year)?;
    let month: u32 = parse_field(input, month)?;
    let day: u32 = parse_field(input, day)?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| VisitError::parse(input, "no such calendar date"))
}

fn parse_time_segment(input: &str, segment: &str) -> Result<NaiveTime, VisitError> {
    let fields: Vec<&str> = segment.split(':').collect();
    let (hour, minute, second) = match fields.as_slice() {
        [hour, minute] => (*hour, *minute, "0"),
        [hour, minute, second] => (*hour, *minute, *second),
        _ => {
            return Err(VisitError::parse(
                input,
                "time must be HH:MM or HH:MM:SS",
            ))
        }
    };
    NaiveTime::from_hms_opt(
        parse_field(input, hour)?,
        parse_field(input, minute)?,
        parse_field(input, second)?,
    )
    .ok_or_else(|| VisitError::parse(input, "time out of range"))
}

fn parse_field<T: FromStr>(input: &str, field: &str) -> Result<T, VisitError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VisitError::parse(input, "non-numeric date or time field"));
    }
    field
        .parse()
        .map_err(|_| VisitError::parse(input, "numeric field out of range"))
}
