use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::record::VisitRecord;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum VisitFilter {
    #[default]
    All,
    Pending,
    OnTime,
    Active,
    Inactive,
}

impl VisitFilter {
    pub fn matches(&self, record: &VisitRecord, now: NaiveDateTime) -> bool {
        match self {
            VisitFilter::All => true,
            VisitFilter::Pending => record.active && record.is_pending(now),
            VisitFilter::OnTime => record.active && !record.is_pending(now),
            VisitFilter::Active => record.active,
            VisitFilter::Inactive => !record.active,
        }
    }
}

impl FromStr for VisitFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(VisitFilter::All),
            "pending" => Ok(VisitFilter::Pending),
            "on-time" | "ontime" => Ok(VisitFilter::OnTime),
            "active" => Ok(VisitFilter::Active),
            "inactive" => Ok(VisitFilter::Inactive),
            other => Err(format!(
                "unknown filter `{other}` (expected all, pending, on-time, active or inactive)"
            )),
        }
    }
}

impl fmt::Display for VisitFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisitFilter::All => "all",
            VisitFilter::Pending => "pending",
            VisitFilter::OnTime => "on-time",
            VisitFilter::Active => "active",
            VisitFilter::Inactive => "inactive",
        };
        f.write_str(name)
    }
}

/// Case-insensitive match on the name, or a digits-only match on the tax id.
pub fn matches_query(record: &VisitRecord, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }

    if record.name.to_lowercase().contains(&query.to_lowercase()) {
        return true;
    }

    let query_digits = digits_only(query);
    !query_digits.is_empty() && digits_only(&record.tax_id).contains(&query_digits)
}

/// Narrows an already ordered list, keeping its order.
pub fn filter_visits(
    ordered: &[VisitRecord],
    filter: VisitFilter,
    query: &str,
    now: NaiveDateTime,
) -> Vec<VisitRecord> {
    ordered
        .iter()
        .filter(|record| filter.matches(record, now) && matches_query(record, query))
        .cloned()
        .collect()
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
