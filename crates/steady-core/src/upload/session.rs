//! Server-side upload session as tracked by the orchestrator.

use super::parts::PartSet;
use super::plan::UploadPlan;

/// A session opened by the initiate call.
///
/// Only complete once `parts_completed` covers `1..=plan.part_count`.
#[derive(Debug, Clone)]
pub struct UploadSession {
    id: String,
    plan: UploadPlan,
    parts_completed: PartSet,
}

impl UploadSession {
    pub fn new(id: impl Into<String>, plan: UploadPlan) -> Self {
        Self {
            id: id.into(),
            parts_completed: PartSet::new(plan.part_count),
            plan,
        }
    }

    /// Opaque handle returned by the API.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plan(&self) -> &UploadPlan {
        &self.plan
    }

    pub fn parts_completed(&self) -> &PartSet {
        &self.parts_completed
    }

    /// Record an acknowledged part; false if it was already recorded.
    pub fn record_part(&mut self, part_number: u32) -> bool {
        self.parts_completed.insert(part_number)
    }

    pub fn is_complete(&self) -> bool {
        self.parts_completed.is_complete()
    }
}
