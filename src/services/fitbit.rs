// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client.
//!
//! Handles:
//! - Daily activity summary (step count) for a user and date
//! - Refresh-token grant when an access token is rejected

use crate::error::AppError;
use crate::models::FitbitApiAccess;
use crate::time_utils::format_date;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

/// Upper bound on a single activity summary fetch.
pub const ACTIVITY_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Fitbit calls the ranking engine depends on.
#[async_trait]
pub trait ActivityApi: Send + Sync {
    /// Step count for `date`. A rejected token yields `AppError::FitbitUnauthorized`.
    async fn daily_steps(
        &self,
        fitbit_user: &str,
        access_token: &str,
        date: NaiveDate,
    ) -> Result<u64, AppError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh_access(&self, refresh_token: &str) -> Result<FitbitApiAccess, AppError>;
}

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl FitbitClient {
    /// Create a new Fitbit client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        }
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::FitbitUnauthorized);
            }

            return Err(AppError::FitbitApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::FitbitApi(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl ActivityApi for FitbitClient {
    async fn daily_steps(
        &self,
        fitbit_user: &str,
        access_token: &str,
        date: NaiveDate,
    ) -> Result<u64, AppError> {
        let url = format!(
            "{}/1/user/{}/activities/date/{}.json",
            self.base_url,
            fitbit_user,
            format_date(date)
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .timeout(ACTIVITY_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(e.to_string()))?;

        let summary: ActivitySummaryResponse = self.check_response_json(response).await?;
        Ok(summary.summary.steps)
    }

    async fn refresh_access(&self, refresh_token: &str) -> Result<FitbitApiAccess, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Token refresh request failed: {}", e)))?;

        // Only activity fetches report `FitbitUnauthorized`.
        self.check_response_json(response)
            .await
            .map_err(|e| match e {
                AppError::FitbitUnauthorized => {
                    AppError::FitbitApi("refresh token rejected".to_string())
                }
                other => other,
            })
    }
}

/// Subset of the daily activity summary response.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySummaryResponse {
    #[serde(default)]
    pub summary: Summary,
}

/// Daily totals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub steps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_without_steps_is_zero() {
        let parsed: ActivitySummaryResponse =
            serde_json::from_str(r#"{"goals":{"steps":10000},"summary":{"floors":3}}"#).unwrap();
        assert_eq!(parsed.summary.steps, 0);
    }

    #[test]
    fn refresh_response_maps_to_access() {
        let parsed: FitbitApiAccess = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","user_id":"F1","expires_in":28800,"token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(parsed.fitbit_user, "F1");
        assert_eq!(parsed.refresh_token, "r");
    }
}
