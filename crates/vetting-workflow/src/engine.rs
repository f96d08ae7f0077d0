//! Workflow Engine
//!
//! Validates and applies verification process state transitions, enforces the
//! version/history invariants, and emits communication events. Concurrency
//! control is optimistic: every command carries the version its caller read,
//! and the loser of a race always gets a version conflict — no merges, no
//! silent overwrites, no locks held across store round-trips.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vetting_types::{
    MessageKind, MoreInfoRequest, Priority, ProcessStatus, StatusChange, UserType,
    VerificationProcess, VerificationRequest,
};

use crate::comms::CommunicationLog;
use crate::error::{ValidationError, WorkflowError};
use crate::notify::NotificationDispatcher;
use crate::providers::RiskAssessmentProvider;
use crate::query::{Page, PageRequest, ProcessFilter};
use crate::store::ProcessStore;
use crate::taxonomy::RejectionTaxonomy;
use crate::templates::TemplateStore;

/// Input for creating a new verification process.
#[derive(Debug, Clone)]
pub struct NewProcess {
    pub user_id: Uuid,
    pub user_type: UserType,
    pub priority: Priority,
    pub request: VerificationRequest,
    /// Recorded as the creation actor; defaults to the submitting user's id
    pub submitted_by: Option<String>,
}

impl NewProcess {
    pub fn new(user_id: Uuid, user_type: UserType, request: VerificationRequest) -> Self {
        Self {
            user_id,
            user_type,
            priority: Priority::default(),
            request,
            submitted_by: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Approval command parameters.
#[derive(Debug, Clone)]
pub struct Approval {
    pub reviewer: String,
    pub review_notes: Option<String>,
    pub template_id: Option<String>,
    pub notify: bool,
}

impl Approval {
    pub fn by(reviewer: impl Into<String>) -> Self {
        Self {
            reviewer: reviewer.into(),
            review_notes: None,
            template_id: None,
            notify: true,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.review_notes = Some(notes.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }
}

/// Rejection command parameters. `reason_code` must belong to the configured
/// taxonomy; `allow_resubmission` is recorded on the history entry so a later
/// resubmission check can honor it.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub reviewer: String,
    pub reason_code: String,
    pub details: Option<String>,
    pub template_id: Option<String>,
    pub allow_resubmission: bool,
    pub notify: bool,
}

impl Rejection {
    pub fn by(reviewer: impl Into<String>, reason_code: impl Into<String>) -> Self {
        Self {
            reviewer: reviewer.into(),
            reason_code: reason_code.into(),
            details: None,
            template_id: None,
            allow_resubmission: false,
            notify: true,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn allowing_resubmission(mut self) -> Self {
        self.allow_resubmission = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }
}

/// The verification review workflow engine.
///
/// Exclusively owns `status`/`version`/`history` mutation. Every command
/// returns the updated process snapshot whose `version` pre-arms the caller's
/// next command.
pub struct WorkflowEngine {
    store: Arc<dyn ProcessStore>,
    comms: CommunicationLog,
    templates: Arc<dyn TemplateStore>,
    risk: Arc<dyn RiskAssessmentProvider>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    taxonomy: RejectionTaxonomy,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn ProcessStore>,
        comms: CommunicationLog,
        templates: Arc<dyn TemplateStore>,
        risk: Arc<dyn RiskAssessmentProvider>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        taxonomy: RejectionTaxonomy,
    ) -> Self {
        Self {
            store,
            comms,
            templates,
            risk,
            dispatcher,
            taxonomy,
        }
    }

    pub fn comms(&self) -> &CommunicationLog {
        &self.comms
    }

    pub fn taxonomy(&self) -> &RejectionTaxonomy {
        &self.taxonomy
    }

    /// Create a process in `pending`. The risk provider is consulted once;
    /// a provider failure leaves the process unscored rather than blocking
    /// creation.
    pub async fn create_process(
        &self,
        new: NewProcess,
    ) -> Result<VerificationProcess, WorkflowError> {
        let actor = new
            .submitted_by
            .unwrap_or_else(|| new.user_id.to_string());
        let mut process = VerificationProcess::new(
            new.user_id,
            new.user_type,
            new.priority,
            new.request,
            actor,
        );

        match self.risk.assess(&process.request).await {
            Ok(assessment) => process.risk_assessment = Some(assessment),
            Err(e) => {
                warn!(process_id = %process.id, error = %e, "risk assessment unavailable at creation");
            }
        }

        self.store
            .insert(&process)
            .await
            .map_err(WorkflowError::from_store)?;
        info!(
            process_id = %process.id,
            user_type = %process.user_type,
            priority = %process.priority,
            "verification process created"
        );
        Ok(process)
    }

    pub async fn get(&self, process_id: Uuid) -> Result<VerificationProcess, WorkflowError> {
        self.store
            .load(process_id)
            .await
            .map_err(WorkflowError::from_store)
    }

    pub async fn list(
        &self,
        filter: &ProcessFilter,
        page: &PageRequest,
    ) -> Result<Page<VerificationProcess>, WorkflowError> {
        self.store
            .query(filter, page)
            .await
            .map_err(WorkflowError::from_store)
    }

    /// Move a pending process into review and assign the reviewer.
    pub async fn start_review(
        &self,
        process_id: Uuid,
        expected_version: u64,
        reviewer_id: &str,
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;
        self.require_status(&process, ProcessStatus::Pending, "start reviewing")?;

        process.assigned_reviewer = Some(reviewer_id.to_string());
        process.apply(
            StatusChange::new(Some(process.status), ProcessStatus::InReview, reviewer_id)
                .with_reason("review started"),
        );
        self.persist(&process, expected_version).await?;

        info!(process_id = %process.id, reviewer = reviewer_id, "review started");
        Ok(process)
    }

    /// Approve a process under review. Enqueues exactly one approval message
    /// when `notify` is set; content resolution failures refuse the whole
    /// operation before any mutation.
    pub async fn approve(
        &self,
        process_id: Uuid,
        expected_version: u64,
        action: &Approval,
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;
        self.require_status(&process, ProcessStatus::InReview, "approve")?;

        let content = if action.notify {
            let vars = self.template_vars(&process);
            Some(self.resolve_content(
                action.template_id.as_deref(),
                action.review_notes.as_deref(),
                &vars,
            )?)
        } else {
            None
        };

        let mut change = StatusChange::new(
            Some(process.status),
            ProcessStatus::Approved,
            action.reviewer.as_str(),
        );
        if let Some(notes) = &action.review_notes {
            change = change.with_reason(notes.clone());
        }
        process.apply(change);
        self.persist(&process, expected_version).await?;

        info!(process_id = %process.id, reviewer = %action.reviewer, "process approved");

        if let Some(content) = content {
            self.queue_notification(&process, MessageKind::Approval, content)
                .await;
        }
        Ok(process)
    }

    /// Reject a process under review with a taxonomy reason code.
    pub async fn reject(
        &self,
        process_id: Uuid,
        expected_version: u64,
        action: &Rejection,
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;
        self.require_status(&process, ProcessStatus::InReview, "reject")?;

        let reason = self
            .taxonomy
            .get(&action.reason_code)
            .ok_or_else(|| ValidationError::UnknownReasonCode(action.reason_code.clone()))?;

        let content = if action.notify {
            let mut vars = self.template_vars(&process);
            vars.insert(
                "reason".to_string(),
                action.details.clone().unwrap_or_else(|| reason.label.clone()),
            );
            let fallback = action
                .details
                .clone()
                .unwrap_or_else(|| format!("Your verification request was rejected. {}", reason.label));
            Some(self.resolve_content(action.template_id.as_deref(), Some(&fallback), &vars)?)
        } else {
            None
        };

        let reason = match &action.details {
            Some(details) => format!("{}: {}", action.reason_code, details),
            None => action.reason_code.clone(),
        };
        process.apply(
            StatusChange::new(
                Some(process.status),
                ProcessStatus::Rejected,
                action.reviewer.as_str(),
            )
            .with_reason(reason)
            .with_allow_resubmission(action.allow_resubmission),
        );
        self.persist(&process, expected_version).await?;

        info!(
            process_id = %process.id,
            reviewer = %action.reviewer,
            reason = %action.reason_code,
            allow_resubmission = action.allow_resubmission,
            "process rejected"
        );

        if let Some(content) = content {
            self.queue_notification(&process, MessageKind::Rejection, content)
                .await;
        }
        Ok(process)
    }

    /// Request additional information from the user. The required field list
    /// and deadline are recorded on the history entry.
    pub async fn request_more_info(
        &self,
        process_id: Uuid,
        expected_version: u64,
        reviewer_id: &str,
        request: &MoreInfoRequest,
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;
        self.require_status(&process, ProcessStatus::InReview, "request more info from")?;

        if request.required_fields.is_empty() {
            return Err(ValidationError::NoRequiredFields.into());
        }
        if request.custom_message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        if let Some(deadline) = request.deadline {
            if deadline <= Utc::now() {
                return Err(ValidationError::DeadlineNotInFuture(deadline).into());
            }
        }

        let mut change = StatusChange::new(
            Some(process.status),
            ProcessStatus::MoreInfoRequested,
            reviewer_id,
        )
        .with_reason(request.custom_message.clone())
        .with_required_fields(request.required_fields.clone());
        if let Some(deadline) = request.deadline {
            change = change.with_deadline(deadline);
        }
        process.apply(change);
        self.persist(&process, expected_version).await?;

        info!(
            process_id = %process.id,
            reviewer = reviewer_id,
            fields = ?request.required_fields,
            "additional information requested"
        );

        if request.notify_user {
            let content = format!(
                "{}\n\nRequired: {}",
                request.custom_message,
                request.required_fields.join(", ")
            );
            self.queue_notification(&process, MessageKind::MoreInfo, content)
                .await;
        }
        Ok(process)
    }

    /// Accept a user resubmission. Valid from `more_info_requested`, or from
    /// `rejected` when the rejection allowed resubmission. The process
    /// re-enters `in_review` in a single step: one version increment, one
    /// history entry.
    pub async fn resubmit(
        &self,
        process_id: Uuid,
        expected_version: u64,
        provided_fields: &[String],
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;

        match process.status {
            ProcessStatus::MoreInfoRequested => {}
            ProcessStatus::Rejected if process.resubmission_allowed() => {}
            from => {
                return Err(WorkflowError::InvalidTransition {
                    from,
                    action: "resubmit",
                })
            }
        }

        let missing: Vec<String> = process
            .outstanding_fields()
            .iter()
            .filter(|f| !provided_fields.iter().any(|p| p == *f))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(WorkflowError::IncompleteSubmission { missing });
        }

        process.apply(
            StatusChange::new(
                Some(process.status),
                ProcessStatus::InReview,
                process.user_id.to_string(),
            )
            .with_reason("resubmission accepted")
            .with_provided_fields(provided_fields.to_vec()),
        );
        self.persist(&process, expected_version).await?;

        info!(process_id = %process.id, "resubmission accepted, back in review");
        Ok(process)
    }

    /// Set or replace the assigned reviewer on a non-terminal process.
    /// Audited as a self-transition entry so the version/history invariants
    /// hold for every accepted command.
    pub async fn assign_reviewer(
        &self,
        process_id: Uuid,
        expected_version: u64,
        reviewer_id: &str,
        actor: &str,
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;
        if process.status.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                from: process.status,
                action: "assign a reviewer to",
            });
        }

        process.assigned_reviewer = Some(reviewer_id.to_string());
        process.apply(
            StatusChange::new(Some(process.status), process.status, actor)
                .with_reason(format!("reviewer assigned: {reviewer_id}")),
        );
        self.persist(&process, expected_version).await?;

        debug!(process_id = %process.id, reviewer = reviewer_id, "reviewer assigned");
        Ok(process)
    }

    /// Re-score the process with the risk provider. Unlike creation, an
    /// explicit re-score surfaces provider failure to the caller.
    pub async fn reassess_risk(
        &self,
        process_id: Uuid,
        expected_version: u64,
    ) -> Result<VerificationProcess, WorkflowError> {
        let mut process = self.load_checked(process_id, expected_version).await?;

        let assessment = self
            .risk
            .assess(&process.request)
            .await
            .map_err(|e| WorkflowError::RiskProvider(e.to_string()))?;

        process.risk_assessment = Some(assessment);
        process.apply(
            StatusChange::new(Some(process.status), process.status, "system")
                .with_reason(format!("risk reassessed: {}", assessment.level)),
        );
        self.persist(&process, expected_version).await?;

        debug!(process_id = %process.id, level = %assessment.level, "risk reassessed");
        Ok(process)
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// Load and verify the caller's version. The store re-checks at write
    /// time; this early check gives racing callers a precise error without
    /// paying for content resolution first.
    async fn load_checked(
        &self,
        process_id: Uuid,
        expected_version: u64,
    ) -> Result<VerificationProcess, WorkflowError> {
        let process = self
            .store
            .load(process_id)
            .await
            .map_err(WorkflowError::from_store)?;
        if process.version != expected_version {
            return Err(WorkflowError::VersionConflict {
                process_id,
                expected: expected_version,
                actual: process.version,
            });
        }
        Ok(process)
    }

    fn require_status(
        &self,
        process: &VerificationProcess,
        required: ProcessStatus,
        action: &'static str,
    ) -> Result<(), WorkflowError> {
        if process.status != required {
            return Err(WorkflowError::InvalidTransition {
                from: process.status,
                action,
            });
        }
        Ok(())
    }

    async fn persist(
        &self,
        process: &VerificationProcess,
        expected_version: u64,
    ) -> Result<(), WorkflowError> {
        self.store
            .update(process, expected_version)
            .await
            .map_err(WorkflowError::from_store)
    }

    fn template_vars(&self, process: &VerificationProcess) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), process.request.full_name.clone());
        vars.insert("email".to_string(), process.request.email.clone());
        vars
    }

    /// Resolve notification content: template id first, caller-supplied text
    /// as fallback. Empty resolved content is a validation error.
    fn resolve_content(
        &self,
        template_id: Option<&str>,
        fallback: Option<&str>,
        vars: &HashMap<String, String>,
    ) -> Result<String, WorkflowError> {
        if let Some(id) = template_id {
            if let Some(template) = self.templates.get(id) {
                let rendered = template.render(vars);
                if !rendered.trim().is_empty() {
                    return Ok(rendered);
                }
            } else {
                debug!(template_id = id, "template not found, using fallback content");
            }
        }
        match fallback {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => Err(ValidationError::EmptyMessage.into()),
        }
    }

    /// Append the message to the communication log and hand it to the
    /// dispatcher. Delivery is decoupled: enqueue failures are logged and the
    /// already-applied transition stands.
    async fn queue_notification(
        &self,
        process: &VerificationProcess,
        kind: MessageKind,
        content: String,
    ) {
        let message = match self
            .comms
            .record_system_message(process.id, process.user_id, kind, content)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(process_id = %process.id, error = %e, "failed to record system message");
                return;
            }
        };
        if let Err(e) = self.dispatcher.enqueue(&message).await {
            warn!(
                message_id = %message.id,
                process_id = %process.id,
                error = %e,
                "notification dispatcher enqueue failed; message stays pending"
            );
        }
    }
}
