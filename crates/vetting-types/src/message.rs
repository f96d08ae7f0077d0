//! Communication Types
//!
//! System-generated notifications with a delivery lifecycle, and free-form
//! two-way correspondence entries. Message lifecycle is independent of the
//! owning process's status; messages reference a process by id only, so
//! archiving a process never touches its message history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Delivery lifecycle of a system message.
///
/// Forward-only: pending -> sent -> delivered -> read. `failed` is terminal
/// and reachable from any non-terminal state. Skipping ahead is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Read | Self::Failed)
    }

    /// Can this status advance to the given status?
    pub fn can_advance_to(&self, target: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, target) {
            (Pending, Sent) => true,
            (Sent, Delivered) => true,
            (Delivered, Read) => true,
            (Pending | Sent | Delivered, Failed) => true,
            _ => false,
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = DeliveryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            "failed" => Ok(Self::Failed),
            _ => Err(DeliveryParseError::UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryParseError {
    #[error("Unknown delivery status: {0}")]
    UnknownStatus(String),
}

/// Status-change category a system message notifies about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Approval,
    Rejection,
    MoreInfo,
    StatusUpdate,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Rejection => "rejection",
            Self::MoreInfo => "more_info",
            Self::StatusUpdate => "status_update",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attempted backward or skip-ahead delivery advance.
#[derive(Debug, thiserror::Error)]
#[error("delivery status cannot advance from {from} to {to}")]
pub struct DeliveryTransitionError {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
}

/// System-generated notification tied to a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessage {
    pub id: Uuid,
    pub process_id: Uuid,
    pub user_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub delivery: DeliveryStatus,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

impl SystemMessage {
    pub fn new(
        process_id: Uuid,
        user_id: Uuid,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id,
            user_id,
            kind,
            content: content.into(),
            delivery: DeliveryStatus::Pending,
            queued_at: Utc::now(),
            sent_at: None,
            delivered_at: None,
            read_at: None,
            failed_at: None,
        }
    }

    /// Advance the delivery status, stamping the timestamp for the stage
    /// reached. Rejects anything but the forward progression.
    pub fn advance(&mut self, to: DeliveryStatus) -> Result<(), DeliveryTransitionError> {
        if !self.delivery.can_advance_to(to) {
            return Err(DeliveryTransitionError {
                from: self.delivery,
                to,
            });
        }
        let now = Utc::now();
        match to {
            DeliveryStatus::Sent => self.sent_at = Some(now),
            DeliveryStatus::Delivered => self.delivered_at = Some(now),
            DeliveryStatus::Read => self.read_at = Some(now),
            DeliveryStatus::Failed => self.failed_at = Some(now),
            DeliveryStatus::Pending => {}
        }
        self.delivery = to;
        Ok(())
    }
}

/// Two-way correspondence entry. Purely additive; no state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: Uuid,
    pub process_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    pub content: String,
    pub is_from_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl UserMessage {
    pub fn from_admin(
        process_id: Uuid,
        user_id: Uuid,
        admin_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id,
            user_id,
            admin_id: Some(admin_id.into()),
            content: content.into(),
            is_from_admin: true,
            created_at: Utc::now(),
        }
    }

    pub fn from_user(process_id: Uuid, user_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id,
            user_id,
            admin_id: None,
            content: content.into(),
            is_from_admin: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_progression_is_forward_only() {
        use DeliveryStatus::*;
        assert!(Pending.can_advance_to(Sent));
        assert!(Sent.can_advance_to(Delivered));
        assert!(Delivered.can_advance_to(Read));

        assert!(!Pending.can_advance_to(Read));
        assert!(!Pending.can_advance_to(Delivered));
        assert!(!Sent.can_advance_to(Pending));
        assert!(!Read.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Sent));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        use DeliveryStatus::*;
        assert!(Pending.can_advance_to(Failed));
        assert!(Sent.can_advance_to(Failed));
        assert!(Delivered.can_advance_to(Failed));
    }

    #[test]
    fn advance_stamps_each_stage_once() {
        let mut msg = SystemMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MessageKind::Approval,
            "Your verification was approved.",
        );
        assert_eq!(msg.delivery, DeliveryStatus::Pending);
        assert!(msg.sent_at.is_none());

        msg.advance(DeliveryStatus::Sent).unwrap();
        msg.advance(DeliveryStatus::Delivered).unwrap();
        msg.advance(DeliveryStatus::Read).unwrap();

        assert!(msg.sent_at.is_some());
        assert!(msg.delivered_at.is_some());
        assert!(msg.read_at.is_some());
        assert!(msg.failed_at.is_none());
    }

    #[test]
    fn skip_ahead_is_rejected_and_leaves_the_message_unchanged() {
        let mut msg = SystemMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MessageKind::Rejection,
            "Your verification was rejected.",
        );
        let err = msg.advance(DeliveryStatus::Read).unwrap_err();
        assert_eq!(err.from, DeliveryStatus::Pending);
        assert_eq!(err.to, DeliveryStatus::Read);
        assert_eq!(msg.delivery, DeliveryStatus::Pending);
        assert!(msg.read_at.is_none());
    }
}
