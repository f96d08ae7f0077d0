//! Notification Dispatch Seam
//!
//! The engine only enqueues: a system message is appended to the
//! communication log with `pending` status and handed to the dispatcher.
//! Actual delivery happens asynchronously outside this crate; the dispatcher
//! reports progress back through `CommunicationLog::advance_delivery`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use vetting_types::SystemMessage;

/// Opaque handle identifying one enqueued delivery at the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryHandle(pub Uuid);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification dispatcher unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn enqueue(&self, message: &SystemMessage) -> Result<DeliveryHandle, DispatchError>;
}

/// Dispatcher that accepts everything and delivers nothing. Default wiring
/// for deployments where delivery is driven entirely by an external worker
/// polling the communication log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn enqueue(&self, message: &SystemMessage) -> Result<DeliveryHandle, DispatchError> {
        Ok(DeliveryHandle(message.id))
    }
}
