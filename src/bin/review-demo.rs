//! Walk one verification process through a full review cycle against the
//! in-memory stores, logging every step.
//!
//! Run with:
//!   RUST_LOG=info cargo run --bin review-demo

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use vetting::{ReviewConfig, ReviewService};
use vetting_types::{MoreInfoRequest, Priority, UserType, VerificationRequest};
use vetting_workflow::{
    Approval, FixedRiskProvider, NewProcess, NullDispatcher, PageRequest, ProcessFilter,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let service = ReviewService::in_memory(
        ReviewConfig::load(None, None)?,
        Arc::new(FixedRiskProvider::default()),
        Arc::new(NullDispatcher),
    );

    // A designer submits a verification request.
    let request = VerificationRequest::new("Dana Reyes", "dana@example.com")
        .with_field("portfolio_url", "https://danareyes.design")
        .with_document("national_id", "id-front.jpg");
    let process = service
        .submit_request(
            NewProcess::new(Uuid::new_v4(), UserType::Designer, request)
                .with_priority(Priority::High),
        )
        .await?;
    println!(
        "submitted: {} status={} version={}",
        process.id, process.status, process.version
    );

    // An admin picks it up and asks for more information.
    let process = service
        .start_review(process.id, process.version, "admin:alice")
        .await?;
    let process = service
        .request_more_info(
            process.id,
            process.version,
            "admin:alice",
            &MoreInfoRequest::new(
                vec!["national_id_back".into()],
                "Please upload the back of your national ID.",
            ),
        )
        .await?;
    println!(
        "more info requested: status={} outstanding={:?}",
        process.status,
        process.outstanding_fields()
    );

    // The user resubmits; the process re-enters review and is approved.
    let process = service
        .resubmit(
            process.id,
            process.version,
            &["national_id_back".to_string()],
        )
        .await?;
    let process = service
        .approve(
            process.id,
            process.version,
            &Approval::by("admin:alice").with_template("approval_default"),
        )
        .await?;
    println!(
        "approved: status={} version={} history_entries={}",
        process.status,
        process.version,
        process.history.len()
    );

    // What the admin dashboard would render.
    let page = service
        .list_processes(&ProcessFilter::default(), &PageRequest::first())
        .await?;
    for summary in &page.items {
        println!(
            "  [{}] {} <{}> {} (v{})",
            summary.status, summary.full_name, summary.email, summary.priority, summary.version
        );
    }

    let detail = service.process_detail(process.id).await?;
    for message in &detail.system_messages {
        println!("  notification [{}] {}", message.delivery, message.content);
    }

    Ok(())
}
