//! API Configuration Module
//!
//! CORS, page-size ceiling, access policy source and notification target.
//! Loaded from environment variables with development defaults.

use crate::error::{ApiError, ApiResult};
use cam_core::{AccessPolicy, MAX_LIMIT};
use std::path::PathBuf;

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Query Configuration
    // ========================================================================
    /// Largest page a list request may receive.
    pub max_page_size: u32,

    /// TOML access policy. `None` uses the stock policy.
    pub policy_path: Option<PathBuf>,

    // ========================================================================
    // Notifications
    // ========================================================================
    /// Webhook receiving mutation notifications. `None` only logs them.
    pub notify_webhook_url: Option<String>,

    /// Timeout for one webhook delivery, in seconds.
    pub notify_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            max_page_size: MAX_LIMIT,
            policy_path: None,
            notify_webhook_url: None,
            notify_timeout_secs: 5,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CAM_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `CAM_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `CAM_MAX_PAGE_SIZE`: Page-size ceiling (default: 100)
    /// - `CAM_POLICY_PATH`: Path to a TOML access policy
    /// - `CAM_NOTIFY_WEBHOOK_URL`: Mutation notification webhook
    /// - `CAM_NOTIFY_TIMEOUT_SECS`: Webhook timeout (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("CAM_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("CAM_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let max_page_size = std::env::var("CAM_MAX_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_page_size);

        let policy_path = std::env::var("CAM_POLICY_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let notify_webhook_url = std::env::var("CAM_NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let notify_timeout_secs = std::env::var("CAM_NOTIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.notify_timeout_secs);

        Self {
            cors_origins,
            cors_max_age_secs,
            max_page_size,
            policy_path,
            notify_webhook_url,
            notify_timeout_secs,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.org
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }

    /// Load the configured access policy, or the stock one.
    pub fn load_policy(&self) -> ApiResult<AccessPolicy> {
        let Some(path) = &self.policy_path else {
            return Ok(AccessPolicy::standard());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApiError::invalid_input(format!("Failed to read policy {}: {}", path.display(), e))
        })?;
        let policy = AccessPolicy::from_toml_str(&raw).map_err(|e| {
            ApiError::invalid_input(format!("Invalid policy {}: {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), roles = policy.roles.len(), "Loaded access policy");
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.cors_max_age_secs, 86400);
        assert_eq!(config.max_page_size, 100);
        assert!(config.policy_path.is_none());
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let config = ApiConfig {
            cors_origins: vec![
                "https://cam.example.org".to_string(),
                "*.admin.example.org".to_string(),
            ],
            ..Default::default()
        };

        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://cam.example.org"));
        assert!(config.is_origin_allowed("https://eu.admin.example.org"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(!config.is_origin_allowed("https://notadmin.example.org"));
    }

    #[test]
    fn test_load_policy_defaults_to_standard() {
        let policy = ApiConfig::default().load_policy().unwrap();
        assert_eq!(policy, AccessPolicy::standard());
    }

    #[test]
    fn test_load_policy_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[roles.Clerk.entities.allegation]
operations = ["read"]
visibility = "tenant"
"#
        )
        .unwrap();

        let config = ApiConfig {
            policy_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let policy = config.load_policy().unwrap();
        assert!(policy.roles.contains_key("Clerk"));
    }

    #[test]
    fn test_load_policy_rejects_unknown_entity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[roles.Clerk.entities.witness]
operations = ["read"]
"#
        )
        .unwrap();

        let config = ApiConfig {
            policy_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(config.load_policy().is_err());
    }
}
