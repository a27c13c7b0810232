//! REST client for the CAM API.
//!
//! [`EntityApi`] is the seam list pages talk through; [`RestClient`] is the
//! HTTP implementation.

use crate::config::ClientConfig;
use async_trait::async_trait;
use cam_api::error::ApiError as ApiServerError;
use cam_api::routes::access::AccessResponse;
use cam_core::{EntityId, EntityKind, ListQuery, Operation, Page, Record};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl ApiClientError {
    /// HTTP status the server answered with, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiClientError::Api { status, .. } => Some(*status),
            ApiClientError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// The caller's operations per entity, as reported by `GET /api/access`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(pub AccessResponse);

impl Permissions {
    pub fn allows(&self, entity: EntityKind, operation: Operation) -> bool {
        self.0
            .permissions
            .get(entity.name())
            .is_some_and(|ops| ops.contains(&operation))
    }
}

#[async_trait]
pub trait EntityApi: Send + Sync {
    async fn list(&self, entity: EntityKind, query: &ListQuery)
        -> Result<Page<Record>, ApiClientError>;

    async fn get(
        &self,
        entity: EntityKind,
        id: EntityId,
        relations: &[String],
    ) -> Result<Record, ApiClientError>;

    async fn create(&self, entity: EntityKind, body: &Value) -> Result<Record, ApiClientError>;

    async fn update(
        &self,
        entity: EntityKind,
        id: EntityId,
        body: &Value,
    ) -> Result<Record, ApiClientError>;

    async fn delete(&self, entity: EntityKind, id: EntityId) -> Result<Record, ApiClientError>;

    async fn access(&self) -> Result<Permissions, ApiClientError>;
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let auth_header = build_auth_headers(&config.auth.jwt)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    fn collection_url(&self, entity: EntityKind) -> String {
        format!("{}/api/{}", self.base_url, entity.route())
    }

    fn record_url(&self, entity: EntityKind, id: EntityId) -> String {
        format!("{}/api/{}/{}", self.base_url, entity.route(), id)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let text = response.text().await?;
        if let Ok(api_error) = serde_json::from_str::<ApiServerError>(&text) {
            return Err(ApiClientError::Api {
                status: status.as_u16(),
                code: serde_json::to_value(api_error.code)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                message: api_error.message,
            });
        }
        Err(ApiClientError::InvalidResponse(format!(
            "HTTP {}: {}",
            status.as_u16(),
            text
        )))
    }
}

#[async_trait]
impl EntityApi for RestClient {
    async fn list(
        &self,
        entity: EntityKind,
        query: &ListQuery,
    ) -> Result<Page<Record>, ApiClientError> {
        let response = self
            .client
            .get(self.collection_url(entity))
            .headers(self.auth_header.clone())
            .query(&query.to_params())
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn get(
        &self,
        entity: EntityKind,
        id: EntityId,
        relations: &[String],
    ) -> Result<Record, ApiClientError> {
        let params: Vec<(&str, &str)> = relations.iter().map(|r| ("relations[]", r.as_str())).collect();
        let response = self
            .client
            .get(self.record_url(entity, id))
            .headers(self.auth_header.clone())
            .query(&params)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn create(&self, entity: EntityKind, body: &Value) -> Result<Record, ApiClientError> {
        let response = self
            .client
            .post(self.collection_url(entity))
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn update(
        &self,
        entity: EntityKind,
        id: EntityId,
        body: &Value,
    ) -> Result<Record, ApiClientError> {
        let response = self
            .client
            .put(self.record_url(entity, id))
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn delete(&self, entity: EntityKind, id: EntityId) -> Result<Record, ApiClientError> {
        let response = self
            .client
            .delete(self.record_url(entity, id))
            .headers(self.auth_header.clone())
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn access(&self) -> Result<Permissions, ApiClientError> {
        let response = self
            .client
            .get(format!("{}/api/access", self.base_url))
            .headers(self.auth_header.clone())
            .send()
            .await?;
        Ok(Permissions(self.parse_response(response).await?))
    }
}

fn build_auth_headers(jwt: &str) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    let value = format!("Bearer {}", jwt.trim());
    headers.insert(
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
    );
    Ok(headers)
}
