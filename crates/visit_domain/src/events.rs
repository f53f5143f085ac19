use serde::{Deserialize, Serialize};

/// Emitted once a visit has been accepted by the visit service and applied locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisitRegistered {
    pub id: String,
    pub name: String,
    pub last_verified: String,
}

/// Receives visit updates from the service. Presentation layers implement this
/// to refresh views or show feedback.
pub trait VisitEventSink: Send + Sync {
    fn visit_registered(&self, event: &VisitRegistered);
}

impl<F> VisitEventSink for F
where
    F: Fn(&VisitRegistered) + Send + Sync,
{
    fn visit_registered(&self, event: &VisitRegistered) {
        self(event)
    }
}
