//! Bulk Operation Coordinator
//!
//! Applies one action across many processes with partial-failure semantics:
//! each item's transition + message enqueue is atomic as a unit, the batch as
//! a whole is not. A failed item never aborts the rest, and already-applied
//! transitions are never rolled back — the compensating action is a fresh
//! opposite transition, not an undo.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{Approval, Rejection, WorkflowEngine};
use crate::error::ErrorKind;

/// One batch member: the process and the version its caller last observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BulkItem {
    pub process_id: Uuid,
    pub expected_version: u64,
}

impl BulkItem {
    pub fn new(process_id: Uuid, expected_version: u64) -> Self {
        Self {
            process_id,
            expected_version,
        }
    }
}

/// The single action applied to every item of a batch.
#[derive(Debug, Clone)]
pub enum BulkAction {
    Approve(Approval),
    Reject(Rejection),
    Assign { reviewer_id: String, actor: String },
}

impl BulkAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Approve(_) => "approve",
            Self::Reject(_) => "reject",
            Self::Assign { .. } => "assign",
        }
    }
}

/// Per-item result. `new_version` pre-arms the caller's next command for
/// items that succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemOutcome {
    pub process_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReport {
    pub outcomes: Vec<BulkItemOutcome>,
}

impl BulkReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Processes each item independently through the workflow engine.
pub struct BulkCoordinator {
    engine: Arc<WorkflowEngine>,
}

impl BulkCoordinator {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    /// Run `action` over `items` in submission order. Items are independent;
    /// a caller may stop consuming after any prefix without affecting the
    /// transitions already applied.
    pub async fn run(&self, items: &[BulkItem], action: &BulkAction) -> BulkReport {
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            let result = match action {
                BulkAction::Approve(approval) => {
                    self.engine
                        .approve(item.process_id, item.expected_version, approval)
                        .await
                }
                BulkAction::Reject(rejection) => {
                    self.engine
                        .reject(item.process_id, item.expected_version, rejection)
                        .await
                }
                BulkAction::Assign { reviewer_id, actor } => {
                    self.engine
                        .assign_reviewer(item.process_id, item.expected_version, reviewer_id, actor)
                        .await
                }
            };

            outcomes.push(match result {
                Ok(process) => BulkItemOutcome {
                    process_id: item.process_id,
                    success: true,
                    new_version: Some(process.version),
                    error: None,
                    detail: None,
                },
                Err(e) => {
                    debug!(
                        process_id = %item.process_id,
                        action = action.name(),
                        error = %e,
                        "bulk item failed"
                    );
                    BulkItemOutcome {
                        process_id: item.process_id,
                        success: false,
                        new_version: None,
                        error: Some(e.kind()),
                        detail: Some(e.to_string()),
                    }
                }
            });
        }

        let report = BulkReport { outcomes };
        info!(
            action = action.name(),
            total = report.outcomes.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "bulk operation finished"
        );
        report
    }
}
