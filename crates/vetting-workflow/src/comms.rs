//! Communication Log
//!
//! Append-only record of system-generated and admin-authored messages tied to
//! a process. This component exclusively owns message delivery lifecycle:
//! `pending -> sent -> delivered -> read`, with `failed` terminal from any
//! non-terminal state. Backward or skip-ahead advances are rejected and
//! logged as defects.
//!
//! Messages share lifetime with their process by reference only; nothing here
//! is deleted when a process is archived.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use vetting_types::{DeliveryStatus, MessageKind, SystemMessage, UserMessage};

use crate::error::{ValidationError, WorkflowError};
use crate::store::{ProcessStore, StoreError};

/// Persistence seam for the message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append_system(&self, message: &SystemMessage) -> Result<(), StoreError>;
    async fn load_system(&self, id: Uuid) -> Result<SystemMessage, StoreError>;
    async fn update_system(&self, message: &SystemMessage) -> Result<(), StoreError>;
    async fn list_system(&self, process_id: Uuid) -> Result<Vec<SystemMessage>, StoreError>;
    async fn append_user(&self, message: &UserMessage) -> Result<(), StoreError>;
    async fn list_user(&self, process_id: Uuid) -> Result<Vec<UserMessage>, StoreError>;
}

/// In-memory append-only message store.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    system: RwLock<Vec<SystemMessage>>,
    user: RwLock<Vec<UserMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append_system(&self, message: &SystemMessage) -> Result<(), StoreError> {
        self.system.write().await.push(message.clone());
        Ok(())
    }

    async fn load_system(&self, id: Uuid) -> Result<SystemMessage, StoreError> {
        self.system
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(StoreError::MessageNotFound(id))
    }

    async fn update_system(&self, message: &SystemMessage) -> Result<(), StoreError> {
        let mut messages = self.system.write().await;
        let stored = messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or(StoreError::MessageNotFound(message.id))?;
        *stored = message.clone();
        Ok(())
    }

    async fn list_system(&self, process_id: Uuid) -> Result<Vec<SystemMessage>, StoreError> {
        Ok(self
            .system
            .read()
            .await
            .iter()
            .filter(|m| m.process_id == process_id)
            .cloned()
            .collect())
    }

    async fn append_user(&self, message: &UserMessage) -> Result<(), StoreError> {
        self.user.write().await.push(message.clone());
        Ok(())
    }

    async fn list_user(&self, process_id: Uuid) -> Result<Vec<UserMessage>, StoreError> {
        Ok(self
            .user
            .read()
            .await
            .iter()
            .filter(|m| m.process_id == process_id)
            .cloned()
            .collect())
    }
}

/// The communication log component. Owns message lifecycle; consults the
/// process store only to verify that correspondence references a real process.
#[derive(Clone)]
pub struct CommunicationLog {
    store: Arc<dyn MessageStore>,
    processes: Arc<dyn ProcessStore>,
}

impl CommunicationLog {
    pub fn new(store: Arc<dyn MessageStore>, processes: Arc<dyn ProcessStore>) -> Self {
        Self { store, processes }
    }

    /// Append a system-generated message with `pending` delivery status.
    pub async fn record_system_message(
        &self,
        process_id: Uuid,
        user_id: Uuid,
        kind: MessageKind,
        content: String,
    ) -> Result<SystemMessage, WorkflowError> {
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let message = SystemMessage::new(process_id, user_id, kind, content);
        self.store
            .append_system(&message)
            .await
            .map_err(WorkflowError::from_store)?;
        debug!(
            message_id = %message.id,
            process_id = %process_id,
            kind = %kind,
            "system message queued"
        );
        Ok(message)
    }

    /// Advance a message's delivery status, enforcing the forward-only
    /// progression. A rejected advance is a caller defect: it is logged here
    /// and returned as a typed error, never surfaced to end users.
    pub async fn advance_delivery(
        &self,
        message_id: Uuid,
        to: DeliveryStatus,
    ) -> Result<SystemMessage, WorkflowError> {
        let mut message = self
            .store
            .load_system(message_id)
            .await
            .map_err(WorkflowError::from_store)?;

        message.advance(to).map_err(|e| {
            warn!(
                message_id = %message_id,
                from = %e.from,
                to = %e.to,
                "rejected delivery status advance"
            );
            WorkflowError::InvalidDeliveryTransition {
                from: e.from,
                to: e.to,
            }
        })?;

        self.store
            .update_system(&message)
            .await
            .map_err(WorkflowError::from_store)?;
        Ok(message)
    }

    /// Append a correspondence entry. Pure append, but the referenced process
    /// must exist.
    pub async fn record_user_message(
        &self,
        message: UserMessage,
    ) -> Result<UserMessage, WorkflowError> {
        if message.content.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.processes
            .load(message.process_id)
            .await
            .map_err(WorkflowError::from_store)?;
        self.store
            .append_user(&message)
            .await
            .map_err(WorkflowError::from_store)?;
        Ok(message)
    }

    pub async fn system_messages_for(
        &self,
        process_id: Uuid,
    ) -> Result<Vec<SystemMessage>, WorkflowError> {
        self.store
            .list_system(process_id)
            .await
            .map_err(WorkflowError::from_store)
    }

    pub async fn user_messages_for(
        &self,
        process_id: Uuid,
    ) -> Result<Vec<UserMessage>, WorkflowError> {
        self.store
            .list_user(process_id)
            .await
            .map_err(WorkflowError::from_store)
    }
}
