//! Verification Process Types
//!
//! Core entity for one user's verification attempt, plus the status state
//! machine and the audit history attached to every accepted transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::risk::RiskAssessment;

/// Lifecycle status of a verification process.
///
/// `resubmitted` is a pass-through state: an accepted resubmission re-enters
/// `in_review` in the same step, so a stored process is never at rest there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    MoreInfoRequested,
    Resubmitted,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::MoreInfoRequested => "more_info_requested",
            Self::Resubmitted => "resubmitted",
        }
    }

    /// Final for audit purposes. A rejected process can still re-enter review,
    /// but only when the rejection recorded an explicit resubmission allowance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Can this status transition to the given status?
    ///
    /// The rejected -> resubmitted edge additionally requires the
    /// resubmission-allowed flag recorded at rejection time; that check is
    /// enforced by the engine, which sees the history.
    pub fn can_transition_to(&self, target: ProcessStatus) -> bool {
        use ProcessStatus::*;
        match (self, target) {
            (Pending, InReview) => true,
            (InReview, Approved | Rejected | MoreInfoRequested) => true,
            (MoreInfoRequested, Resubmitted) => true,
            (Rejected, Resubmitted) => true,
            (Resubmitted, InReview) => true,
            _ => false,
        }
    }
}

impl FromStr for ProcessStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_review" => Ok(Self::InReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "more_info_requested" => Ok(Self::MoreInfoRequested),
            "resubmitted" => Ok(Self::Resubmitted),
            _ => Err(StatusParseError::UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusParseError {
    #[error("Unknown process status: {0}")]
    UnknownStatus(String),
}

/// Review priority, ordered low to urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which kind of account submitted the verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Designer,
    ServiceRequester,
    AdminInitiated,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Designer => "designer",
            Self::ServiceRequester => "service_requester",
            Self::AdminInitiated => "admin_initiated",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A document attached to the original submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedDocument {
    pub id: Uuid,
    /// Document category (e.g. "national_id", "portfolio", "business_license")
    pub kind: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// The submitted request payload. Immutable once the process is created;
/// resubmitted field names are recorded on the history entry instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub full_name: String,
    pub email: String,
    /// Free-form submitted fields (field identifier -> value)
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub documents: Vec<SubmittedDocument>,
}

impl VerificationRequest {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            fields: HashMap::new(),
            documents: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_document(mut self, kind: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.documents.push(SubmittedDocument {
            id: Uuid::new_v4(),
            kind: kind.into(),
            file_name: file_name.into(),
            uploaded_at: Utc::now(),
        });
        self
    }
}

/// One accepted status change. Exactly one of these is appended per version
/// increment; entries with `from == Some(to)` record audited non-status
/// mutations (reviewer assignment, risk re-scoring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<ProcessStatus>,
    pub to: ProcessStatus,
    /// Who triggered the change (admin id, user id, or "system")
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Recorded on rejection entries so a later resubmission check can honor it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_resubmission: Option<bool>,
    /// Field identifiers demanded by a more-info request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<String>,
    /// Field identifiers supplied by an accepted resubmission
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provided_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn new(from: Option<ProcessStatus>, to: ProcessStatus, actor: impl Into<String>) -> Self {
        Self {
            from,
            to,
            actor: actor.into(),
            at: Utc::now(),
            reason: None,
            allow_resubmission: None,
            required_fields: Vec::new(),
            provided_fields: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_allow_resubmission(mut self, allow: bool) -> Self {
        self.allow_resubmission = Some(allow);
        self
    }

    pub fn with_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    pub fn with_provided_fields(mut self, fields: Vec<String>) -> Self {
        self.provided_fields = fields;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Input value object for one more-info cycle. Not persisted independently;
/// it produces a transition plus a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoreInfoRequest {
    pub required_fields: Vec<String>,
    pub custom_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub notify_user: bool,
}

fn default_true() -> bool {
    true
}

impl MoreInfoRequest {
    pub fn new(required_fields: Vec<String>, custom_message: impl Into<String>) -> Self {
        Self {
            required_fields,
            custom_message: custom_message.into(),
            deadline: None,
            notify_user: true,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn silent(mut self) -> Self {
        self.notify_user = false;
        self
    }
}

/// One verification attempt tracked end-to-end.
///
/// Invariants maintained by [`VerificationProcess::apply`]:
/// - `history.len() >= 1` (creation is itself a transition into `pending`)
/// - `version == history.len()`
/// - the last history entry's `to` equals `status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationProcess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_type: UserType,
    pub request: VerificationRequest,
    pub status: ProcessStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_reviewer: Option<String>,
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter; increments once per accepted change
    pub version: u64,
}

impl VerificationProcess {
    /// Create a new process in `pending`. The creation itself is recorded as
    /// the first history entry (`from: None`), so version starts at 1.
    pub fn new(
        user_id: Uuid,
        user_type: UserType,
        priority: Priority,
        request: VerificationRequest,
        actor: impl Into<String>,
    ) -> Self {
        let creation = StatusChange::new(None, ProcessStatus::Pending, actor)
            .with_reason("verification request submitted");
        let now = creation.at;
        Self {
            id: Uuid::new_v4(),
            user_id,
            user_type,
            request,
            status: ProcessStatus::Pending,
            priority,
            risk_assessment: None,
            assigned_reviewer: None,
            history: vec![creation],
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Apply an accepted change: set status, append history, bump version.
    pub fn apply(&mut self, change: StatusChange) {
        self.status = change.to;
        self.updated_at = change.at;
        self.version += 1;
        self.history.push(change);
    }

    pub fn last_change(&self) -> Option<&StatusChange> {
        self.history.last()
    }

    /// Field identifiers still outstanding from the active more-info request.
    pub fn outstanding_fields(&self) -> &[String] {
        if self.status != ProcessStatus::MoreInfoRequested {
            return &[];
        }
        self.history
            .iter()
            .rev()
            .find(|c| c.to == ProcessStatus::MoreInfoRequested)
            .map(|c| c.required_fields.as_slice())
            .unwrap_or(&[])
    }

    /// Deadline of the active more-info request, if one was set.
    pub fn more_info_deadline(&self) -> Option<DateTime<Utc>> {
        if self.status != ProcessStatus::MoreInfoRequested {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|c| c.to == ProcessStatus::MoreInfoRequested)
            .and_then(|c| c.deadline)
    }

    /// Derived at read time; an elapsed more-info deadline never changes
    /// status by itself.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.more_info_deadline().map(|d| d < now).unwrap_or(false)
    }

    /// True when the process was rejected with resubmission explicitly allowed.
    pub fn resubmission_allowed(&self) -> bool {
        self.status == ProcessStatus::Rejected
            && self
                .last_change()
                .and_then(|c| c.allow_resubmission)
                .unwrap_or(false)
    }
}
