//! Shared types for the verification review workflow.
//!
//! This crate is the single source of truth for the types crossing component
//! boundaries:
//! - the verification process entity, its status state machine, and the
//!   audited transition history
//! - system notifications with their delivery lifecycle, and two-way
//!   correspondence entries
//! - externally supplied risk assessments
//!
//! No persistence or engine logic lives here.

pub mod message;
pub mod process;
pub mod risk;

pub use message::{
    DeliveryParseError, DeliveryStatus, DeliveryTransitionError, MessageKind, SystemMessage,
    UserMessage,
};
pub use process::{
    MoreInfoRequest, Priority, ProcessStatus, StatusChange, StatusParseError, SubmittedDocument,
    UserType, VerificationProcess, VerificationRequest,
};
pub use risk::{RiskAssessment, RiskLevel, RiskParseError};
