use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::date_rules::{Schedule, Urgency};
use crate::error::VisitError;

/// A visit record exactly as the visit service sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawVisitRecord {
    pub id: String,
    pub name: String,
    pub cpf: String,
    pub active: bool,
    pub last_verified_date: String,
    pub verify_frequency_in_days: i64,
}

/// A visit record whose last visit and cadence have been validated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VisitRecord {
    pub id: String,
    pub name: String,
    pub tax_id: String,
    pub active: bool,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VisitStatus {
    Inactive,
    Pending,
    OnTime,
}

impl VisitRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tax_id: impl Into<String>,
        active: bool,
        schedule: Schedule,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tax_id: tax_id.into(),
            active,
            schedule,
        }
    }

    pub fn last_verified(&self) -> NaiveDateTime {
        self.schedule.last_verified()
    }

    pub fn next_due(&self) -> NaiveDateTime {
        self.schedule.next_due()
    }

    pub fn frequency_days(&self) -> u32 {
        self.schedule.frequency_days()
    }

    pub fn urgency(&self, now: NaiveDateTime) -> Urgency {
        self.schedule.urgency(now)
    }

    pub fn is_pending(&self, now: NaiveDateTime) -> bool {
        self.schedule.is_pending(now)
    }

    pub fn status(&self, now: NaiveDateTime) -> VisitStatus {
        if !self.active {
            VisitStatus::Inactive
        } else if self.is_pending(now) {
            VisitStatus::Pending
        } else {
            VisitStatus::OnTime
        }
    }
}

impl TryFrom<RawVisitRecord> for VisitRecord {
    type Error = VisitError;

    fn try_from(raw: RawVisitRecord) -> Result<Self, Self::Error> {
        let schedule = Schedule::from_text(&raw.last_verified_date, raw.verify_frequency_in_days)?;
        Ok(Self {
            id: raw.id,
            name: raw.name,
            tax_id: raw.cpf,
            active: raw.active,
            schedule,
        })
    }
}

/// A record refused at ingestion, kept so the operator can see what was skipped.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectedRecord {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Splits a fetched batch into usable records and rejects, preserving order.
/// Each element is decoded on its own, so one malformed entry never hides the rest.
pub fn validate_records(payload: Vec<Value>) -> (Vec<VisitRecord>, Vec<RejectedRecord>) {
    let mut accepted = Vec::with_capacity(payload.len());
    let mut rejected = Vec::new();
    for value in payload {
        let id = field_text(&value, "id");
        let name = field_text(&value, "name");
        let outcome = serde_json::from_value::<RawVisitRecord>(value)
            .map_err(|e| VisitError::Decode(e.to_string()))
            .and_then(VisitRecord::try_from);
        match outcome {
            Ok(valid) => accepted.push(valid),
            Err(err) => {
                tracing::warn!(%id, %err, "rejecting visit record");
                rejected.push(RejectedRecord {
                    id,
                    name,
                    reason: err.to_string(),
                });
            }
        }
    }
    (accepted, rejected)
}

fn field_text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
