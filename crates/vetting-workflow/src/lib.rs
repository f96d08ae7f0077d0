//! Review workflow engine for verification processes.
//!
//! Core subsystem of the operational review platform:
//! - [`engine::WorkflowEngine`] — validates and applies state transitions,
//!   enforces the version/history invariants, and emits communication events
//! - [`comms::CommunicationLog`] — append-only message record owning the
//!   delivery lifecycle
//! - [`bulk::BulkCoordinator`] — batch actions with partial-failure semantics
//! - [`store`] / [`postgres`] — injected persistence with optimistic
//!   version-check-and-set writes
//! - [`templates`] / [`taxonomy`] — configuration-supplied message bodies and
//!   the closed rejection reason set
//!
//! External collaborators plug in through the [`providers`] and [`notify`]
//! trait seams; the engine never blocks on risk scoring or delivery.

pub mod bulk;
pub mod comms;
pub mod engine;
pub mod error;
pub mod notify;
pub mod providers;
pub mod query;
pub mod store;
pub mod taxonomy;
pub mod templates;

#[cfg(feature = "database")]
pub mod postgres;

pub use bulk::{BulkAction, BulkCoordinator, BulkItem, BulkItemOutcome, BulkReport};
pub use comms::{CommunicationLog, InMemoryMessageStore, MessageStore};
pub use engine::{Approval, NewProcess, Rejection, WorkflowEngine};
pub use error::{ErrorKind, ValidationError, WorkflowError};
pub use notify::{DeliveryHandle, DispatchError, NotificationDispatcher, NullDispatcher};
pub use providers::{FixedRiskProvider, RiskAssessmentProvider, RiskError};
pub use query::{Page, PageRequest, ProcessFilter};
pub use store::{InMemoryProcessStore, ProcessStore, StoreError};
pub use taxonomy::{ReasonCode, RejectionTaxonomy, TaxonomyError};
pub use templates::{
    MessageScenario, MessageTemplate, StaticTemplateStore, TemplateError, TemplateStore,
};

#[cfg(feature = "database")]
pub use postgres::{PgMessageStore, PgProcessStore};
