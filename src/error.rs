// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Fitbit API error: {0}")]
    FitbitApi(String),

    #[error("Fitbit access token rejected")]
    FitbitUnauthorized,

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Slack error codes returned when the bot can't post to a conversation.
    pub const SLACK_NOT_IN_CHANNEL: &'static str = "not_in_channel";
    pub const SLACK_CHANNEL_NOT_FOUND: &'static str = "channel_not_found";

    /// True when Fitbit rejected the access token (HTTP 401).
    pub fn is_expired_credential(&self) -> bool {
        matches!(self, AppError::FitbitUnauthorized)
    }

    /// True when Slack refused a post because the bot is not a member.
    pub fn is_not_in_channel(&self) -> bool {
        matches!(
            self,
            AppError::SlackApi(code)
                if code == Self::SLACK_NOT_IN_CHANNEL || code == Self::SLACK_CHANNEL_NOT_FOUND
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::FitbitApi(msg) => {
                (StatusCode::BAD_GATEWAY, "fitbit_error", Some(msg.clone()))
            }
            AppError::FitbitUnauthorized => (StatusCode::BAD_GATEWAY, "fitbit_unauthorized", None),
            AppError::SlackApi(msg) => (StatusCode::BAD_GATEWAY, "slack_error", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
