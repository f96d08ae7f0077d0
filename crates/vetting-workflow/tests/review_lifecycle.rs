//! Review lifecycle integration tests.
//!
//! Full runbook against the in-memory stores: create -> start review ->
//! approve/reject/more-info cycles, optimistic-concurrency races, bulk
//! partial-failure semantics, and the notification delivery log.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use vetting_types::{
    DeliveryStatus, MessageKind, MoreInfoRequest, ProcessStatus, RiskAssessment, RiskLevel,
    SystemMessage, UserType, VerificationProcess, VerificationRequest,
};
use vetting_workflow::{
    Approval, BulkAction, BulkCoordinator, BulkItem, CommunicationLog, DeliveryHandle,
    DispatchError, ErrorKind, FixedRiskProvider, InMemoryMessageStore, InMemoryProcessStore,
    NewProcess, NotificationDispatcher, Rejection, RejectionTaxonomy, RiskAssessmentProvider,
    RiskError, StaticTemplateStore, WorkflowEngine,
};

/// Dispatcher that records every enqueued message id.
#[derive(Default)]
struct RecordingDispatcher {
    enqueued: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn enqueue(&self, message: &SystemMessage) -> Result<DeliveryHandle, DispatchError> {
        self.enqueued.lock().await.push(message.id);
        Ok(DeliveryHandle(message.id))
    }
}

/// Provider that always fails, for creation-tolerance tests.
struct DownRiskProvider;

#[async_trait]
impl RiskAssessmentProvider for DownRiskProvider {
    async fn assess(
        &self,
        _request: &VerificationRequest,
    ) -> Result<RiskAssessment, RiskError> {
        Err(RiskError::Unavailable("scoring service offline".into()))
    }
}

fn engine_with(
    risk: Arc<dyn RiskAssessmentProvider>,
) -> (Arc<WorkflowEngine>, Arc<RecordingDispatcher>) {
    let store = Arc::new(InMemoryProcessStore::new());
    let messages = Arc::new(InMemoryMessageStore::new());
    let comms = CommunicationLog::new(messages, store.clone());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = WorkflowEngine::new(
        store,
        comms,
        Arc::new(StaticTemplateStore::default()),
        risk,
        dispatcher.clone(),
        RejectionTaxonomy::default(),
    );
    (Arc::new(engine), dispatcher)
}

fn test_engine() -> (Arc<WorkflowEngine>, Arc<RecordingDispatcher>) {
    engine_with(Arc::new(FixedRiskProvider::new(25, RiskLevel::Medium)))
}

fn sample_request(name: &str, email: &str) -> VerificationRequest {
    VerificationRequest::new(name, email)
        .with_field("national_id", "A-99810")
        .with_document("national_id", "id-front.jpg")
}

async fn create_pending(engine: &WorkflowEngine) -> VerificationProcess {
    engine
        .create_process(NewProcess::new(
            Uuid::new_v4(),
            UserType::Designer,
            sample_request("Dana Reyes", "dana@example.com"),
        ))
        .await
        .expect("create process")
}

async fn create_in_review(engine: &WorkflowEngine) -> VerificationProcess {
    let p = create_pending(engine).await;
    engine
        .start_review(p.id, p.version, "admin:alice")
        .await
        .expect("start review")
}

fn assert_invariants(p: &VerificationProcess) {
    assert!(!p.history.is_empty());
    assert_eq!(p.version, p.history.len() as u64);
    assert_eq!(p.history.last().map(|c| c.to), Some(p.status));
}

#[tokio::test]
async fn full_happy_path_approval() {
    let (engine, dispatcher) = test_engine();

    let p = create_pending(&engine).await;
    assert_eq!(p.status, ProcessStatus::Pending);
    assert_eq!(p.version, 1);
    assert_eq!(p.risk_assessment.map(|r| r.level), Some(RiskLevel::Medium));
    assert_invariants(&p);

    let p = engine
        .start_review(p.id, p.version, "admin:alice")
        .await
        .unwrap();
    assert_eq!(p.status, ProcessStatus::InReview);
    assert_eq!(p.assigned_reviewer.as_deref(), Some("admin:alice"));
    assert_invariants(&p);

    let p = engine
        .approve(
            p.id,
            p.version,
            &Approval::by("admin:alice").with_notes("Documents verified against the registry."),
        )
        .await
        .unwrap();
    assert_eq!(p.status, ProcessStatus::Approved);
    assert_eq!(p.version, 3);
    assert_invariants(&p);

    // Exactly one approval message, queued pending, handed to the dispatcher.
    let messages = engine.comms().system_messages_for(p.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageKind::Approval);
    assert_eq!(messages[0].delivery, DeliveryStatus::Pending);
    assert_eq!(
        messages[0].content,
        "Documents verified against the registry."
    );
    assert_eq!(dispatcher.enqueued.lock().await.len(), 1);
}

#[tokio::test]
async fn stale_reviewer_must_refresh_before_acting() {
    let (engine, _) = test_engine();
    let p = create_pending(&engine).await;

    // Reviewer A wins the race.
    let reviewed = engine
        .start_review(p.id, p.version, "admin:alice")
        .await
        .unwrap();
    assert_eq!(reviewed.version, 2);

    // Reviewer B still holds the creation-time version.
    let err = engine
        .approve(p.id, p.version, &Approval::by("admin:bob"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);

    // B re-reads and rejects with resubmission allowed.
    let fresh = engine.get(p.id).await.unwrap();
    let rejected = engine
        .reject(
            fresh.id,
            fresh.version,
            &Rejection::by("admin:bob", "incomplete_docs").allowing_resubmission(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, ProcessStatus::Rejected);
    assert_eq!(rejected.version, 3);
    assert!(rejected.resubmission_allowed());
    assert_invariants(&rejected);
}

#[tokio::test]
async fn a_stale_approve_is_never_a_double_approval() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;

    let approved = engine
        .approve(p.id, p.version, &Approval::by("admin:alice").silent())
        .await
        .unwrap();

    // Same stale version again: always a conflict, never a second approval.
    let err = engine
        .approve(p.id, p.version, &Approval::by("admin:alice").silent())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);

    let stored = engine.get(p.id).await.unwrap();
    assert_eq!(stored.version, approved.version);
    let approvals = stored
        .history
        .iter()
        .filter(|c| c.to == ProcessStatus::Approved)
        .count();
    assert_eq!(approvals, 1);
}

#[tokio::test]
async fn more_info_roundtrip_resubmits_in_one_step() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;

    let request = MoreInfoRequest::new(
        vec!["national_id".into()],
        "Please upload the back of your national ID.",
    )
    .with_deadline(Utc::now() + Duration::days(5));

    let p = engine
        .request_more_info(p.id, p.version, "admin:alice", &request)
        .await
        .unwrap();
    assert_eq!(p.status, ProcessStatus::MoreInfoRequested);
    assert_eq!(p.outstanding_fields(), ["national_id"]);
    assert_invariants(&p);

    // Missing fields: refused, nothing changes.
    let err = engine.resubmit(p.id, p.version, &[]).await.unwrap_err();
    match err {
        vetting_workflow::WorkflowError::IncompleteSubmission { missing } => {
            assert_eq!(missing, vec!["national_id".to_string()]);
        }
        other => panic!("expected IncompleteSubmission, got {other}"),
    }
    let unchanged = engine.get(p.id).await.unwrap();
    assert_eq!(unchanged.status, ProcessStatus::MoreInfoRequested);
    assert_eq!(unchanged.version, p.version);

    // Complete resubmission: back in review atomically, one entry, one bump.
    let resubmitted = engine
        .resubmit(p.id, p.version, &["national_id".to_string()])
        .await
        .unwrap();
    assert_eq!(resubmitted.status, ProcessStatus::InReview);
    assert_eq!(resubmitted.version, p.version + 1);
    assert_eq!(
        resubmitted.history.last().and_then(|c| c.reason.as_deref()),
        Some("resubmission accepted")
    );
    assert_invariants(&resubmitted);
}

#[tokio::test]
async fn rejection_gates_resubmission_on_the_recorded_flag() {
    let (engine, _) = test_engine();

    // Rejected with the flag: resubmission re-enters review.
    let p = create_in_review(&engine).await;
    let rejected = engine
        .reject(
            p.id,
            p.version,
            &Rejection::by("admin:alice", "incomplete_docs")
                .allowing_resubmission()
                .silent(),
        )
        .await
        .unwrap();
    let back = engine.resubmit(rejected.id, rejected.version, &[]).await.unwrap();
    assert_eq!(back.status, ProcessStatus::InReview);
    assert_invariants(&back);

    // Rejected without the flag: terminal.
    let q = create_in_review(&engine).await;
    let rejected = engine
        .reject(
            q.id,
            q.version,
            &Rejection::by("admin:alice", "fraud_suspected").silent(),
        )
        .await
        .unwrap();
    let err = engine
        .resubmit(rejected.id, rejected.version, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn unknown_reason_codes_are_refused() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;

    let err = engine
        .reject(p.id, p.version, &Rejection::by("admin:alice", "because"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let unchanged = engine.get(p.id).await.unwrap();
    assert_eq!(unchanged.status, ProcessStatus::InReview);
    assert_eq!(unchanged.version, p.version);
}

#[tokio::test]
async fn more_info_validation_refuses_bad_input() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;

    let no_fields = MoreInfoRequest::new(vec![], "Please provide more information.");
    let err = engine
        .request_more_info(p.id, p.version, "admin:alice", &no_fields)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let empty_message = MoreInfoRequest::new(vec!["address".into()], "   ");
    let err = engine
        .request_more_info(p.id, p.version, "admin:alice", &empty_message)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let past_deadline = MoreInfoRequest::new(vec!["address".into()], "Need your address.")
        .with_deadline(Utc::now() - Duration::hours(1));
    let err = engine
        .request_more_info(p.id, p.version, "admin:alice", &past_deadline)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // All three refusals left the process untouched.
    let unchanged = engine.get(p.id).await.unwrap();
    assert_eq!(unchanged.status, ProcessStatus::InReview);
    assert_eq!(unchanged.version, p.version);
}

#[tokio::test]
async fn bulk_approve_applies_partial_failures() {
    let (engine, _) = test_engine();
    let coordinator = BulkCoordinator::new(engine.clone());

    // Four reviewable processes plus one already decided.
    let mut items = Vec::new();
    for _ in 0..4 {
        let p = create_in_review(&engine).await;
        items.push(BulkItem::new(p.id, p.version));
    }
    let decided = create_in_review(&engine).await;
    let decided = engine
        .approve(decided.id, decided.version, &Approval::by("admin:bob").silent())
        .await
        .unwrap();
    items.push(BulkItem::new(decided.id, decided.version));

    let report = coordinator
        .run(
            &items,
            &BulkAction::Approve(Approval::by("admin:alice").silent()),
        )
        .await;

    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);

    let failure = report
        .outcomes
        .iter()
        .find(|o| !o.success)
        .expect("one failed outcome");
    assert_eq!(failure.process_id, decided.id);
    assert_eq!(failure.error, Some(ErrorKind::InvalidTransition));

    // The four successes were applied regardless of the failure.
    for outcome in report.outcomes.iter().filter(|o| o.success) {
        let stored = engine.get(outcome.process_id).await.unwrap();
        assert_eq!(stored.status, ProcessStatus::Approved);
        assert_eq!(Some(stored.version), outcome.new_version);
        assert_invariants(&stored);
    }
}

#[tokio::test]
async fn bulk_assign_races_report_version_conflicts() {
    let (engine, _) = test_engine();
    let coordinator = BulkCoordinator::new(engine.clone());

    let p = create_pending(&engine).await;
    let items = [BulkItem::new(p.id, p.version)];

    let first = coordinator
        .run(
            &items,
            &BulkAction::Assign {
                reviewer_id: "admin:alice".into(),
                actor: "admin:lead".into(),
            },
        )
        .await;
    assert_eq!(first.succeeded(), 1);

    // Same stale versions again: every item loses the race.
    let second = coordinator
        .run(
            &items,
            &BulkAction::Assign {
                reviewer_id: "admin:bob".into(),
                actor: "admin:lead".into(),
            },
        )
        .await;
    assert_eq!(second.succeeded(), 0);
    assert_eq!(second.outcomes[0].error, Some(ErrorKind::VersionConflict));

    let stored = engine.get(p.id).await.unwrap();
    assert_eq!(stored.assigned_reviewer.as_deref(), Some("admin:alice"));
}

#[tokio::test]
async fn delivery_log_enforces_the_forward_progression() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;
    engine
        .approve(
            p.id,
            p.version,
            &Approval::by("admin:alice").with_template("approval_default"),
        )
        .await
        .unwrap();

    let messages = engine.comms().system_messages_for(p.id).await.unwrap();
    let message_id = messages[0].id;

    // Skip-ahead is refused while the message is still pending.
    let err = engine
        .comms()
        .advance_delivery(message_id, DeliveryStatus::Read)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDeliveryTransition);

    // The dispatcher reports progress stage by stage.
    engine
        .comms()
        .advance_delivery(message_id, DeliveryStatus::Sent)
        .await
        .unwrap();
    engine
        .comms()
        .advance_delivery(message_id, DeliveryStatus::Delivered)
        .await
        .unwrap();
    let read = engine
        .comms()
        .advance_delivery(message_id, DeliveryStatus::Read)
        .await
        .unwrap();
    assert_eq!(read.delivery, DeliveryStatus::Read);
    assert!(read.sent_at.is_some() && read.delivered_at.is_some() && read.read_at.is_some());
}

#[tokio::test]
async fn notification_content_resolution_and_fallback() {
    let (engine, dispatcher) = test_engine();

    // Template renders with the applicant's name.
    let p = create_in_review(&engine).await;
    engine
        .approve(
            p.id,
            p.version,
            &Approval::by("admin:alice").with_template("approval_default"),
        )
        .await
        .unwrap();
    let messages = engine.comms().system_messages_for(p.id).await.unwrap();
    assert!(messages[0].content.contains("Dana Reyes"));

    // Unknown template id falls back to the review notes.
    let q = create_in_review(&engine).await;
    engine
        .approve(
            q.id,
            q.version,
            &Approval::by("admin:alice")
                .with_template("no_such_template")
                .with_notes("Welcome aboard."),
        )
        .await
        .unwrap();
    let messages = engine.comms().system_messages_for(q.id).await.unwrap();
    assert_eq!(messages[0].content, "Welcome aboard.");

    // No template and no notes: the operation is refused before any mutation.
    let r = create_in_review(&engine).await;
    let err = engine
        .approve(r.id, r.version, &Approval::by("admin:alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let unchanged = engine.get(r.id).await.unwrap();
    assert_eq!(unchanged.status, ProcessStatus::InReview);
    assert_eq!(unchanged.version, r.version);

    // Silent commands enqueue nothing.
    let before = dispatcher.enqueued.lock().await.len();
    let s = create_in_review(&engine).await;
    engine
        .approve(s.id, s.version, &Approval::by("admin:alice").silent())
        .await
        .unwrap();
    assert_eq!(dispatcher.enqueued.lock().await.len(), before);
}

#[tokio::test]
async fn creation_survives_a_down_risk_provider() {
    let (engine, _) = engine_with(Arc::new(DownRiskProvider));

    let p = create_pending(&engine).await;
    assert!(p.risk_assessment.is_none());
    assert_eq!(p.status, ProcessStatus::Pending);
    assert_invariants(&p);

    // An explicit re-score surfaces the failure.
    let err = engine.reassess_risk(p.id, p.version).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
}

#[tokio::test]
async fn reassessment_is_an_audited_self_transition() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;

    let rescored = engine.reassess_risk(p.id, p.version).await.unwrap();
    assert_eq!(rescored.status, ProcessStatus::InReview);
    assert_eq!(rescored.version, p.version + 1);
    assert_eq!(rescored.risk_assessment.map(|r| r.level), Some(RiskLevel::Medium));
    let last = rescored.history.last().unwrap();
    assert_eq!(last.from, Some(ProcessStatus::InReview));
    assert_eq!(last.to, ProcessStatus::InReview);
    assert_eq!(last.actor, "system");
    assert_invariants(&rescored);
}

#[tokio::test]
async fn reviewers_cannot_be_assigned_to_decided_processes() {
    let (engine, _) = test_engine();
    let p = create_in_review(&engine).await;
    let approved = engine
        .approve(p.id, p.version, &Approval::by("admin:alice").silent())
        .await
        .unwrap();

    let err = engine
        .assign_reviewer(approved.id, approved.version, "admin:bob", "admin:lead")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn actions_are_refused_outside_their_required_state() {
    let (engine, _) = test_engine();
    let p = create_pending(&engine).await;

    // Approve straight from pending: refused.
    let err = engine
        .approve(p.id, p.version, &Approval::by("admin:alice").silent())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    // Start review twice: the second is refused on state, not on version.
    let reviewed = engine
        .start_review(p.id, p.version, "admin:alice")
        .await
        .unwrap();
    let err = engine
        .start_review(reviewed.id, reviewed.version, "admin:bob")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(
        engine.get(p.id).await.unwrap().assigned_reviewer.as_deref(),
        Some("admin:alice")
    );
}
