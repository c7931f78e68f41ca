//! Application configuration loaded from environment variables.
//!
//! Secrets (Fitbit client secret, single-tenant Slack token) are injected as
//! environment variables by the deployment and read once at startup.

use chrono_tz::Tz;
use std::env;

/// Cloud Tasks queue that carries scheduled challenge updates.
pub const UPDATE_QUEUE_NAME: &str = "challenge-updates";

/// Path the scheduler calls back for each challenge update.
pub const UPDATE_CHALLENGE_PATH: &str = "/tasks/update-challenge";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this service (scheduler callbacks target it)
    pub base_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region for Cloud Tasks and KMS
    pub gcp_region: String,
    /// Server port
    pub port: u16,

    /// Fitbit OAuth client ID
    pub fitbit_client_id: String,
    /// Fitbit OAuth client secret
    pub fitbit_client_secret: String,
    /// Fitbit Web API base URL
    pub fitbit_api_base_url: String,

    /// Slack Web API base URL
    pub slack_api_base_url: String,
    /// Bot token for single-tenant deployments. `None` means multi-tenant.
    pub slack_token: Option<String>,
    /// Known bot user ID for single-tenant deployments
    pub slack_bot_user_id: Option<String>,

    /// Timezone challenges are evaluated in
    pub challenge_timezone: Tz,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let timezone_name =
            env::var("CHALLENGE_TIMEZONE").unwrap_or_else(|_| "America/Los_Angeles".to_string());
        let challenge_timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid("CHALLENGE_TIMEZONE", timezone_name.clone()))?;

        Ok(Self {
            base_url: env::var("BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BASE_URL"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            fitbit_client_id: env::var("FITBIT_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("FITBIT_CLIENT_ID"))?,
            fitbit_client_secret: env::var("FITBIT_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FITBIT_CLIENT_SECRET"))?,
            fitbit_api_base_url: env::var("FITBIT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.fitbit.com".to_string()),

            slack_api_base_url: env::var("SLACK_API_BASE_URL")
                .unwrap_or_else(|_| "https://slack.com/api".to_string()),
            slack_token: non_empty_var("SLACK_TOKEN"),
            slack_bot_user_id: non_empty_var("SLACK_BOT_USER_ID"),

            challenge_timezone,
        })
    }

    /// Offline configuration for tests.
    pub fn test_default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            port: 8080,
            fitbit_client_id: "test_client_id".to_string(),
            fitbit_client_secret: "test_secret".to_string(),
            fitbit_api_base_url: "http://127.0.0.1:1".to_string(),
            slack_api_base_url: "http://127.0.0.1:1".to_string(),
            slack_token: None,
            slack_bot_user_id: None,
            challenge_timezone: chrono_tz::America::Los_Angeles,
        }
    }

    /// True when a single Slack workspace is served with a fixed token.
    pub fn is_single_tenant(&self) -> bool {
        self.slack_token.is_some()
    }

    /// Full URL of the challenge update callback.
    pub fn update_challenge_url(&self) -> String {
        format!("{}{}", self.base_url, UPDATE_CHALLENGE_PATH)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
