//! Operational review workflow for user verification requests.
//!
//! Administrators evaluate identity and professional-credential submissions
//! and drive them through approval, rejection, or additional-information
//! cycles. Every decision is versioned, audited, and paired with a user
//! notification whose delivery is tracked independently.
//!
//! Crate layout:
//! - [`vetting_types`] — entities and the status/delivery state machines
//! - [`vetting_workflow`] — the engine, stores, communication log, and bulk
//!   coordinator
//! - this crate — configuration loading and the [`service::ReviewService`]
//!   facade that UI/admin-tooling collaborators link against

pub mod config;
pub mod service;

pub use config::ReviewConfig;
pub use service::{ProcessDetail, ProcessSummary, ReviewService};

// Re-export the crates behind the facade for callers that need direct access.
pub use vetting_types as types;
pub use vetting_workflow as workflow;
