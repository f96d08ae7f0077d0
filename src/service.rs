//! Review Service Facade
//!
//! The operation surface UI and admin-tooling collaborators call. Queries
//! return view types sized for rendering; commands delegate to the workflow
//! engine and hand back the authoritative snapshot, so callers reconcile
//! their local cache from the response instead of assuming success.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vetting_types::{
    DeliveryStatus, MoreInfoRequest, Priority, ProcessStatus, RiskLevel, SystemMessage,
    UserMessage, UserType, VerificationProcess,
};
use vetting_workflow::{
    Approval, BulkAction, BulkCoordinator, BulkItem, BulkReport, CommunicationLog,
    InMemoryMessageStore, InMemoryProcessStore, NewProcess, NotificationDispatcher, Page,
    PageRequest, ProcessFilter, Rejection, RiskAssessmentProvider, WorkflowEngine, WorkflowError,
};

use crate::config::ReviewConfig;

/// Row-sized view of a process for the admin list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub user_type: UserType,
    pub status: ProcessStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_reviewer: Option<String>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl ProcessSummary {
    fn from_process(process: &VerificationProcess, now: DateTime<Utc>) -> Self {
        Self {
            id: process.id,
            full_name: process.request.full_name.clone(),
            email: process.request.email.clone(),
            user_type: process.user_type,
            status: process.status,
            priority: process.priority,
            risk_level: process.risk_assessment.map(|r| r.level),
            assigned_reviewer: process.assigned_reviewer.clone(),
            is_overdue: process.is_overdue(now),
            created_at: process.created_at,
            version: process.version,
        }
    }
}

/// Full process view: snapshot, derived flags, and correspondence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDetail {
    pub process: VerificationProcess,
    pub is_overdue: bool,
    pub system_messages: Vec<SystemMessage>,
    pub user_messages: Vec<UserMessage>,
}

/// The admin-facing review service.
#[derive(Clone)]
pub struct ReviewService {
    engine: Arc<WorkflowEngine>,
    coordinator: Arc<BulkCoordinator>,
}

impl ReviewService {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        let coordinator = Arc::new(BulkCoordinator::new(engine.clone()));
        Self {
            engine,
            coordinator,
        }
    }

    /// Wire the service over the in-memory stores. Production deployments
    /// construct the engine over their own store implementations and use
    /// [`ReviewService::new`].
    pub fn in_memory(
        config: ReviewConfig,
        risk: Arc<dyn RiskAssessmentProvider>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let store = Arc::new(InMemoryProcessStore::new());
        let messages = Arc::new(InMemoryMessageStore::new());
        let comms = CommunicationLog::new(messages, store.clone());
        let engine = WorkflowEngine::new(
            store,
            comms,
            Arc::new(config.templates),
            risk,
            dispatcher,
            config.taxonomy,
        );
        Self::new(Arc::new(engine))
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    pub async fn list_processes(
        &self,
        filter: &ProcessFilter,
        page: &PageRequest,
    ) -> Result<Page<ProcessSummary>, WorkflowError> {
        let now = Utc::now();
        let result = self.engine.list(filter, page).await?;
        Ok(Page {
            items: result
                .items
                .iter()
                .map(|p| ProcessSummary::from_process(p, now))
                .collect(),
            total: result.total,
            offset: result.offset,
            limit: result.limit,
        })
    }

    pub async fn process_detail(&self, process_id: Uuid) -> Result<ProcessDetail, WorkflowError> {
        let process = self.engine.get(process_id).await?;
        let system_messages = self.engine.comms().system_messages_for(process_id).await?;
        let user_messages = self.engine.comms().user_messages_for(process_id).await?;
        Ok(ProcessDetail {
            is_overdue: process.is_overdue(Utc::now()),
            process,
            system_messages,
            user_messages,
        })
    }

    // ------------------------------------------------------------------
    // commands
    // ------------------------------------------------------------------

    pub async fn submit_request(
        &self,
        new: NewProcess,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine.create_process(new).await
    }

    pub async fn start_review(
        &self,
        process_id: Uuid,
        expected_version: u64,
        reviewer_id: &str,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine
            .start_review(process_id, expected_version, reviewer_id)
            .await
    }

    pub async fn approve(
        &self,
        process_id: Uuid,
        expected_version: u64,
        action: &Approval,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine.approve(process_id, expected_version, action).await
    }

    pub async fn reject(
        &self,
        process_id: Uuid,
        expected_version: u64,
        action: &Rejection,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine.reject(process_id, expected_version, action).await
    }

    pub async fn request_more_info(
        &self,
        process_id: Uuid,
        expected_version: u64,
        reviewer_id: &str,
        request: &MoreInfoRequest,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine
            .request_more_info(process_id, expected_version, reviewer_id, request)
            .await
    }

    pub async fn resubmit(
        &self,
        process_id: Uuid,
        expected_version: u64,
        provided_fields: &[String],
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine
            .resubmit(process_id, expected_version, provided_fields)
            .await
    }

    pub async fn assign_reviewer(
        &self,
        process_id: Uuid,
        expected_version: u64,
        reviewer_id: &str,
        actor: &str,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine
            .assign_reviewer(process_id, expected_version, reviewer_id, actor)
            .await
    }

    pub async fn reassess_risk(
        &self,
        process_id: Uuid,
        expected_version: u64,
    ) -> Result<VerificationProcess, WorkflowError> {
        self.engine.reassess_risk(process_id, expected_version).await
    }

    // ------------------------------------------------------------------
    // bulk commands
    // ------------------------------------------------------------------

    pub async fn bulk_approve(&self, items: &[BulkItem], action: Approval) -> BulkReport {
        self.coordinator
            .run(items, &BulkAction::Approve(action))
            .await
    }

    pub async fn bulk_reject(&self, items: &[BulkItem], action: Rejection) -> BulkReport {
        self.coordinator
            .run(items, &BulkAction::Reject(action))
            .await
    }

    pub async fn bulk_assign(
        &self,
        items: &[BulkItem],
        reviewer_id: &str,
        actor: &str,
    ) -> BulkReport {
        self.coordinator
            .run(
                items,
                &BulkAction::Assign {
                    reviewer_id: reviewer_id.to_string(),
                    actor: actor.to_string(),
                },
            )
            .await
    }

    // ------------------------------------------------------------------
    // correspondence
    // ------------------------------------------------------------------

    pub async fn post_admin_message(
        &self,
        process_id: Uuid,
        admin_id: &str,
        content: &str,
    ) -> Result<UserMessage, WorkflowError> {
        let process = self.engine.get(process_id).await?;
        self.engine
            .comms()
            .record_user_message(UserMessage::from_admin(
                process_id,
                process.user_id,
                admin_id,
                content,
            ))
            .await
    }

    pub async fn post_user_message(
        &self,
        process_id: Uuid,
        content: &str,
    ) -> Result<UserMessage, WorkflowError> {
        let process = self.engine.get(process_id).await?;
        self.engine
            .comms()
            .record_user_message(UserMessage::from_user(process_id, process.user_id, content))
            .await
    }

    /// Callback entry point for the notification dispatcher's delivery
    /// status reports.
    pub async fn delivery_update(
        &self,
        message_id: Uuid,
        status: DeliveryStatus,
    ) -> Result<SystemMessage, WorkflowError> {
        self.engine.comms().advance_delivery(message_id, status).await
    }
}
