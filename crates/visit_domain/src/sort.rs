use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::record::VisitRecord;

/// Returns a new list: active before inactive, then overdue first, then by due date.
/// The sort is stable, so records sharing a due date keep their input order.
pub fn order_visits(records: &[VisitRecord], now: NaiveDateTime) -> Vec<VisitRecord> {
    let mut keyed: Vec<(bool, &VisitRecord)> = records
        .iter()
        .map(|record| (record.is_pending(now), record))
        .collect();
    keyed.sort_by(|(a_pending, a), (b_pending, b)| compare(a, *a_pending, b, *b_pending));
    keyed.into_iter().map(|(_, record)| record.clone()).collect()
}

fn compare(a: &VisitRecord, a_pending: bool, b: &VisitRecord, b_pending: bool) -> Ordering {
    b.active
        .cmp(&a.active)
        .then_with(|| b_pending.cmp(&a_pending))
        .then_with(|| a.next_due().cmp(&b.next_due()))
}
