//! Mutation notifications.
//!
//! Every successful create, update and delete hands a [`MutationEvent`] to the
//! configured [`Notifier`] on a spawned task. Delivery failures are logged and
//! never undo the mutation.

use async_trait::async_trait;
use cam_core::{EntityId, EntityKind, Operation, TenantId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A completed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub entity: EntityKind,
    pub operation: Operation,
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub actor: UserId,
    pub occurred_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("Webhook responded with status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &MutationEvent) -> Result<(), NotifyError>;
}

/// Writes each event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &MutationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            entity = %event.entity,
            operation = %event.operation,
            id = %event.id,
            tenant_id = %event.tenant_id,
            actor = %event.actor,
            "Record mutated"
        );
        Ok(())
    }
}

/// POSTs each event as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &MutationEvent) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Deliver `event` in the background.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: MutationEvent) {
    tokio::spawn(async move {
        if let Err(err) = notifier.notify(&event).await {
            tracing::warn!(
                entity = %event.entity,
                operation = %event.operation,
                id = %event.id,
                error = %err,
                "Mutation notification failed"
            );
        }
    });
}
