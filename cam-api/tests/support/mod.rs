//! Shared harness for driving the CAM router in-process.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use cam_api::{
    auth::test_clocks, create_api_router, generate_jwt_token, ApiConfig, AppState, AuthConfig,
    JwtSecret, MutationEvent, Notifier, NotifyError,
};
use cam_core::{AccessPolicy, CallerContext};
use cam_storage::{InMemoryStorage, Storage};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Forwards every event to a channel the test can inspect.
pub struct RecordingNotifier(pub mpsc::UnboundedSender<MutationEvent>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &MutationEvent) -> Result<(), NotifyError> {
        let _ = self.0.send(event.clone());
        Ok(())
    }
}

/// Rejects every event, like a webhook answering 500.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &MutationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Status(500))
    }
}

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<InMemoryStorage>,
    pub auth: AuthConfig,
    pub events: mpsc::UnboundedReceiver<MutationEvent>,
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JwtSecret::new(SECRET.to_string()).expect("secret"),
        clock: Arc::new(test_clocks::valid()),
        ..AuthConfig::default()
    }
}

impl TestApp {
    pub fn new(policy: AccessPolicy) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self::with_notifier(policy, Arc::new(RecordingNotifier(tx)), events)
    }

    pub fn with_failing_notifier(policy: AccessPolicy) -> Self {
        let (_tx, events) = mpsc::unbounded_channel();
        Self::with_notifier(policy, Arc::new(FailingNotifier), events)
    }

    fn with_notifier(
        policy: AccessPolicy,
        notifier: Arc<dyn Notifier>,
        events: mpsc::UnboundedReceiver<MutationEvent>,
    ) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let api_config = ApiConfig::default();
        let state = AppState::new(
            storage.clone(),
            policy,
            notifier,
            api_config.max_page_size,
        );
        let auth = auth_config();
        let router = create_api_router(state, &api_config, auth.clone());
        Self {
            router,
            storage,
            auth,
            events,
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn token(&self, caller: &CallerContext) -> String {
        generate_jwt_token(
            &self.auth,
            caller.user_id,
            Some(caller.tenant_id),
            caller.roles.iter().cloned().collect(),
        )
        .expect("token")
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<&CallerContext>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header("authorization", format!("Bearer {}", self.token(caller)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: &CallerContext) -> (StatusCode, Value) {
        self.send("GET", uri, Some(caller), None).await
    }
}

/// Ids of the rows in a list response, in order.
pub fn ids(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
