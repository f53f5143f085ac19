use std::fmt::Write;

use chrono::NaiveDateTime;
use visit_domain::{
    date_rules::{format_date_time, OverdueSeverity, Urgency},
    filter::VisitFilter,
    metrics::{FrequencyCount, StatusShare, Summary},
    record::{RejectedRecord, VisitStatus},
    VisitRecord,
};

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeSeverity {
    Low,
    Medium,
    High,
}

impl BadgeSeverity {
    fn label(&self) -> &'static str {
        match self {
            BadgeSeverity::Low => "low",
            BadgeSeverity::Medium => "medium",
            BadgeSeverity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub text: String,
    pub severity: BadgeSeverity,
}

/// What a single visit card shows besides the raw fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub status_text: &'static str,
    pub badge: Option<Badge>,
    pub can_mark_visited: bool,
}

impl CardView {
    pub fn for_record(record: &VisitRecord, now: NaiveDateTime) -> Self {
        let status = record.status(now);
        let status_text = match status {
            VisitStatus::Inactive => "Inactive",
            VisitStatus::Pending => "Visit pending",
            VisitStatus::OnTime => "On time",
        };
        let badge = if record.active {
            badge_for(record.urgency(now))
        } else {
            None
        };
        Self {
            status_text,
            badge,
            can_mark_visited: record.active,
        }
    }
}

fn badge_for(urgency: Urgency) -> Option<Badge> {
    match (urgency, urgency.severity()) {
        (Urgency::DueToday, _) => Some(Badge {
            text: "Due today".to_string(),
            severity: BadgeSeverity::Low,
        }),
        (Urgency::Overdue { days }, Some(severity)) => Some(Badge {
            text: format!(
                "{} day{} overdue",
                days,
                if days == 1 { "" } else { "s" }
            ),
            severity: match severity {
                OverdueSeverity::Light => BadgeSeverity::Medium,
                OverdueSeverity::Severe => BadgeSeverity::High,
            },
        }),
        _ => None,
    }
}

pub fn render_card(record: &VisitRecord, now: NaiveDateTime) -> String {
    let view = CardView::for_record(record, now);
    let mut out = String::new();
    let _ = write!(out, "[{}] {} (id {})", view.status_text, record.name, record.id);
    if let Some(badge) = &view.badge {
        let _ = write!(out, "  <{} | {}>", badge.text, badge.severity.label());
    }
    out.push('\n');
    let _ = writeln!(out, "    Tax id:     {}", record.tax_id);
    let _ = writeln!(out, "    Last visit: {}", format_date_time(record.last_verified()));
    let _ = writeln!(out, "    Next visit: {}", format_date_time(record.next_due()));
    out
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "Total {} | Active {} | Inactive {} | Pending {} | On time {} ({}%)\n",
        summary.total,
        summary.active,
        summary.inactive,
        summary.pending,
        summary.on_time,
        summary.on_time_percent
    )
}

pub fn render_status_chart(shares: &[StatusShare]) -> String {
    let mut out = String::from("Status\n");
    for share in shares {
        let bar = "#".repeat(share.percent as usize * BAR_WIDTH / 100);
        let _ = writeln!(
            out,
            "  {:<18} {:>4} {:>4}%  {}",
            share.slice.label(),
            share.count,
            share.percent,
            bar
        );
    }
    out
}

pub fn render_frequency_chart(histogram: &[FrequencyCount]) -> String {
    let max = histogram.iter().map(|c| c.count).max().unwrap_or(0);
    let mut out = String::from("Visit frequency\n");
    for entry in histogram {
        let width = if max == 0 {
            0
        } else {
            entry.count * BAR_WIDTH / max
        };
        let _ = writeln!(
            out,
            "  {:<12} {:>4}  {}",
            entry.bucket.label(),
            entry.count,
            "#".repeat(width)
        );
    }
    out
}

pub fn render_list(
    visits: &[VisitRecord],
    filter: VisitFilter,
    query: &str,
    now: NaiveDateTime,
) -> String {
    let mut out = format!("Visits (filter: {filter}");
    if !query.trim().is_empty() {
        let _ = write!(out, ", search: \"{}\"", query.trim());
    }
    let _ = writeln!(out, ") - {} shown", visits.len());
    if visits.is_empty() {
        out.push_str("  No visits match.\n");
    }
    for record in visits {
        out.push_str(&render_card(record, now));
    }
    out
}

pub fn render_rejected(rejected: &[RejectedRecord]) -> String {
    if rejected.is_empty() {
        return String::new();
    }
    let mut out = format!("Skipped {} unreadable record(s):\n", rejected.len());
    for record in rejected {
        let _ = writeln!(out, "  {} ({}): {}", record.name, record.id, record.reason);
    }
    out
}

pub fn render_error(message: &str) -> String {
    format!("Error: {message}\n  Type `reload` to try again.\n")
}
