use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::date_rules::{OverdueSeverity, Urgency};
use crate::record::VisitRecord;

/// Dashboard counters. Everything past `inactive` only counts active records.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub pending: usize,
    pub on_time: usize,
    pub on_time_percent: u32,
    pub on_time_safe: usize,
    pub due_today: usize,
    pub overdue_light: usize,
    pub overdue_severe: usize,
}

pub fn summarize(records: &[VisitRecord], now: NaiveDateTime) -> Summary {
    let mut summary = Summary {
        total: records.len(),
        ..Summary::default()
    };

    for record in records {
        if !record.active {
            summary.inactive += 1;
            continue;
        }
        summary.active += 1;

        match record.urgency(now) {
            urgency @ Urgency::Overdue { .. } => {
                summary.pending += 1;
                match urgency.severity() {
                    Some(OverdueSeverity::Severe) => summary.overdue_severe += 1,
                    _ => summary.overdue_light += 1,
                }
            }
            Urgency::DueToday => {
                summary.on_time += 1;
                summary.due_today += 1;
            }
            Urgency::Upcoming { .. } => {
                summary.on_time += 1;
                summary.on_time_safe += 1;
            }
        }
    }

    summary.on_time_percent = rounded_percent(summary.on_time, summary.active);
    summary
}

/// `part / whole * 100` rounded half up; zero when `whole` is zero.
pub fn rounded_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let percent = (part * 100 + whole / 2) / whole;
    u32::try_from(percent).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrequencyBucket {
    UpToThreeDays,
    UpToAWeek,
    UpToTwoWeeks,
    UpToAMonth,
    OverAMonth,
}

impl FrequencyBucket {
    pub const ALL: [FrequencyBucket; 5] = [
        FrequencyBucket::UpToThreeDays,
        FrequencyBucket::UpToAWeek,
        FrequencyBucket::UpToTwoWeeks,
        FrequencyBucket::UpToAMonth,
        FrequencyBucket::OverAMonth,
    ];

    /// `None` for cadences below one day, which never pass validation.
    pub fn for_days(days: i64) -> Option<Self> {
        match days {
            i64::MIN..=0 => None,
            1..=3 => Some(FrequencyBucket::UpToThreeDays),
            4..=7 => Some(FrequencyBucket::UpToAWeek),
            8..=14 => Some(FrequencyBucket::UpToTwoWeeks),
            15..=30 => Some(FrequencyBucket::UpToAMonth),
            _ => Some(FrequencyBucket::OverAMonth),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FrequencyBucket::UpToThreeDays => "1-3 days",
            FrequencyBucket::UpToAWeek => "4-7 days",
            FrequencyBucket::UpToTwoWeeks => "8-14 days",
            FrequencyBucket::UpToAMonth => "15-30 days",
            FrequencyBucket::OverAMonth => "31+ days",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrequencyCount {
    pub bucket: FrequencyBucket,
    pub count: usize,
}

/// Histogram of visit cadences; every bucket is present, in ascending order.
pub fn bucket_frequencies(records: &[VisitRecord]) -> Vec<FrequencyCount> {
    let mut counts = [0usize; FrequencyBucket::ALL.len()];
    for record in records {
        if let Some(bucket) = FrequencyBucket::for_days(i64::from(record.frequency_days())) {
            counts[bucket as usize] += 1;
        }
    }
    FrequencyBucket::ALL
        .iter()
        .zip(counts)
        .map(|(bucket, count)| FrequencyCount {
            bucket: *bucket,
            count,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusSlice {
    OnTime,
    DueToday,
    OverdueLight,
    OverdueSevere,
    Inactive,
}

impl StatusSlice {
    pub fn label(&self) -> &'static str {
        match self {
            StatusSlice::OnTime => "On time",
            StatusSlice::DueToday => "Due today",
            StatusSlice::OverdueLight => "Overdue 1-3 days",
            StatusSlice::OverdueSevere => "Overdue 4+ days",
            StatusSlice::Inactive => "Inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusShare {
    pub slice: StatusSlice,
    pub count: usize,
    pub percent: u32,
}

/// Pie chart data: each slice's count and share of all records.
pub fn status_breakdown(summary: &Summary) -> Vec<StatusShare> {
    [
        (StatusSlice::OnTime, summary.on_time_safe),
        (StatusSlice::DueToday, summary.due_today),
        (StatusSlice::OverdueLight, summary.overdue_light),
        (StatusSlice::OverdueSevere, summary.overdue_severe),
        (StatusSlice::Inactive, summary.inactive),
    ]
    .into_iter()
    .map(|(slice, count)| StatusShare {
        slice,
        count,
        percent: rounded_percent(count, summary.total),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_rules::Schedule;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    /// Record whose due date lands `due_in` days from `now()`.
    fn due_in(id: &str, active: bool, due_in: i64, frequency: i64) -> VisitRecord {
        let last = now() - Duration::days(frequency) + Duration::days(due_in);
        VisitRecord::new(
            id,
            id,
            "000",
            active,
            Schedule::new(last, frequency).unwrap(),
        )
    }

    #[test]
    fn counts_every_category() {
        let records = vec![
            due_in("safe", true, 5, 7),
            due_in("today", true, 0, 7),
            due_in("light", true, -2, 7),
            due_in("severe", true, -5, 7),
            due_in("inactive", false, -40, 7),
        ];
        let summary = summarize(&records, now());
        assert_eq!(
            summary,
            Summary {
                total: 5,
                active: 4,
                inactive: 1,
                pending: 2,
                on_time: 2,
                on_time_percent: 50,
                on_time_safe: 1,
                due_today: 1,
                overdue_light: 1,
                overdue_severe: 1,
            }
        );
    }

    #[test]
    fn overdue_boundary_is_three_days() {
        let summary = summarize(
            &[due_in("three", true, -3, 7), due_in("four", true, -4, 7)],
            now(),
        );
        assert_eq!(summary.overdue_light, 1);
        assert_eq!(summary.overdue_severe, 1);
    }

    #[test]
    fn percent_is_zero_without_active_records() {
        let records = vec![due_in("a", false, -3, 7), due_in("b", false, 2, 15)];
        let summary = summarize(&records, now());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.inactive, 2);
        assert_eq!(summary.active, 0);
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.on_time, 0);
        assert_eq!(summary.on_time_percent, 0);
        assert_eq!(summarize(&[], now()), Summary::default());
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(rounded_percent(1, 8), 13);
        assert_eq!(rounded_percent(1, 3), 33);
        assert_eq!(rounded_percent(2, 3), 67);
        assert_eq!(rounded_percent(3, 3), 100);
        assert_eq!(rounded_percent(0, 0), 0);
    }

    #[test]
    fn summary_invariants_hold_for_mixed_lists() {
        let mut records = Vec::new();
        for (idx, offset) in (-9..=9).enumerate() {
            records.push(due_in(&idx.to_string(), idx % 4 != 0, offset, 1 + idx as i64));
            let summary = summarize(&records, now());
            assert_eq!(summary.total, summary.active + summary.inactive);
            assert_eq!(summary.active, summary.pending + summary.on_time);
            assert_eq!(summary.on_time, summary.due_today + summary.on_time_safe);
            assert_eq!(
                summary.pending,
                summary.overdue_light + summary.overdue_severe
            );
            assert_eq!(
                summary.on_time_percent,
                rounded_percent(summary.on_time, summary.active)
            );
        }
    }

    #[test]
    fn buckets_cadences_with_every_bucket_present() {
        let records: Vec<_> = [2, 5, 10, 20, 45, 3, 31, 1]
            .iter()
            .enumerate()
            .map(|(idx, frequency)| due_in(&idx.to_string(), true, 1, *frequency))
            .collect();
        let histogram = bucket_frequencies(&records);
        let counts: Vec<_> = histogram.iter().map(|c| (c.bucket.label(), c.count)).collect();
        assert_eq!(
            counts,
            [
                ("1-3 days", 3),
                ("4-7 days", 1),
                ("8-14 days", 1),
                ("15-30 days", 1),
                ("31+ days", 2),
            ]
        );
        assert_eq!(
            histogram.iter().map(|c| c.count).sum::<usize>(),
            records.len()
        );

        let empty = bucket_frequencies(&[]);
        assert_eq!(empty.len(), 5);
        assert!(empty.iter().all(|c| c.count == 0));
    }

    #[test]
    fn bucket_edges() {
        assert_eq!(FrequencyBucket::for_days(0), None);
        assert_eq!(FrequencyBucket::for_days(-7), None);
        assert_eq!(FrequencyBucket::for_days(3), Some(FrequencyBucket::UpToThreeDays));
        assert_eq!(FrequencyBucket::for_days(4), Some(FrequencyBucket::UpToAWeek));
        assert_eq!(FrequencyBucket::for_days(14), Some(FrequencyBucket::UpToTwoWeeks));
        assert_eq!(FrequencyBucket::for_days(30), Some(FrequencyBucket::UpToAMonth));
        assert_eq!(FrequencyBucket::for_days(31), Some(FrequencyBucket::OverAMonth));
        assert_eq!(FrequencyBucket::for_days(365), Some(FrequencyBucket::OverAMonth));
    }

    #[test]
    fn breakdown_shares_total() {
        let records = vec![
            due_in("safe", true, 5, 7),
            due_in("today", true, 0, 7),
            due_in("light", true, -2, 7),
            due_in("inactive", false, 3, 7),
        ];
        let shares = status_breakdown(&summarize(&records, now()));
        let pairs: Vec<_> = shares.iter().map(|s| (s.slice, s.count, s.percent)).collect();
        assert_eq!(
            pairs,
            [
                (StatusSlice::OnTime, 1, 25),
                (StatusSlice::DueToday, 1, 25),
                (StatusSlice::OverdueLight, 1, 25),
                (StatusSlice::OverdueSevere, 0, 0),
                (StatusSlice::Inactive, 1, 25),
            ]
        );
    }
}
