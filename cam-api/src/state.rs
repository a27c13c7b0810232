//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Duration;

use cam_core::{AccessPolicy, Normalizer, OwnershipRules, SchemaRegistry, Scoper};
use cam_storage::{PaginatedExecutor, Storage};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchemaRegistry>,
    /// Carries the configured page-size ceiling.
    pub normalizer: Normalizer,
    pub scoper: Arc<Scoper>,
    pub executor: PaginatedExecutor,
    /// Receives an event after every committed mutation.
    pub notifier: Arc<dyn Notifier>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        policy: AccessPolicy,
        notifier: Arc<dyn Notifier>,
        max_page_size: u32,
    ) -> Self {
        Self {
            registry: Arc::new(SchemaRegistry::new()),
            normalizer: Normalizer::new(max_page_size),
            scoper: Arc::new(Scoper::new(policy, OwnershipRules::default())),
            executor: PaginatedExecutor::new(storage),
            notifier,
            start_time: std::time::Instant::now(),
        }
    }

    /// Build state from configuration: load the policy and pick the notifier.
    pub fn from_config(storage: Arc<dyn Storage>, config: &ApiConfig) -> ApiResult<Self> {
        let policy = config.load_policy()?;
        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(
                WebhookNotifier::new(url.clone(), Duration::from_secs(config.notify_timeout_secs))
                    .map_err(|e| {
                        ApiError::internal_error(format!("Failed to build webhook client: {}", e))
                    })?,
            ),
            None => Arc::new(LogNotifier),
        };
        Ok(Self::new(storage, policy, notifier, config.max_page_size))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.executor.storage()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("normalizer", &self.normalizer)
            .field("scoper", &self.scoper)
            .field("executor", &self.executor)
            .field("notifier", &"<Notifier>")
            .finish()
    }
}

crate::impl_from_ref!(Arc<SchemaRegistry>, registry);
crate::impl_from_ref!(Arc<Scoper>, scoper);
crate::impl_from_ref!(PaginatedExecutor, executor);
crate::impl_from_ref!(std::time::Instant, start_time);
