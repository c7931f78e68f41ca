// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slack Web API client and the chat capabilities it provides.
//!
//! Each capability is a narrow trait so the challenge lifecycle can be
//! exercised against in-memory fakes.

use crate::error::AppError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Page size for `conversations.members`.
const MEMBERS_PAGE_SIZE: &str = "200";

/// Posts messages to a channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post `text` (notification fallback) with optional Block Kit `blocks`.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        blocks: &[Value],
    ) -> Result<(), AppError>;
}

/// Display profile of a chat user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub image_32: String,
}

/// Looks up user profiles.
#[async_trait]
pub trait UserInfoFinder: Send + Sync {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, AppError>;
}

/// Lists a channel's members.
#[async_trait]
pub trait ConversationMemberFinder: Send + Sync {
    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, AppError>;
}

/// Identifies the bot user this app posts as.
#[async_trait]
pub trait BotIdentificator: Send + Sync {
    async fn bot_id(&self) -> Result<String, AppError>;
}

/// Replies privately to whoever issued a slash command.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond_ephemeral(&self, response_url: &str, text: &str) -> Result<(), AppError>;
}

/// Bot identity known up front (recorded at install or configured).
#[derive(Debug, Clone)]
pub struct FixedBotIdentificator {
    bot_user_id: String,
}

impl FixedBotIdentificator {
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
        }
    }
}

#[async_trait]
impl BotIdentificator for FixedBotIdentificator {
    async fn bot_id(&self) -> Result<String, AppError> {
        Ok(self.bot_user_id.clone())
    }
}

/// Envelope shared by all Web API responses.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct UserInfoBody {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    profile: UserProfile,
}

#[derive(Debug, Deserialize)]
struct MembersBody {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct AuthTestBody {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[derive(Serialize)]
struct EphemeralResponse<'a> {
    response_type: &'static str,
    replace_original: bool,
    text: &'a str,
}

/// Slack Web API client bound to one team's bot token.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(base_url: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Check HTTP status and the `ok` flag, then parse the body.
    async fn check_response_json<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SlackApi(format!(
                "{} HTTP {}: {}",
                method, status, body
            )));
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| AppError::SlackApi(format!("{} JSON parse error: {}", method, e)))?;

        if !envelope.ok {
            // The bare error code, so callers can match on it.
            return Err(AppError::SlackApi(
                envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        envelope
            .body
            .ok_or_else(|| AppError::SlackApi(format!("{}: empty response body", method)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::SlackApi(format!("{} request failed: {}", method, e)))?;

        Self::check_response_json(method, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::SlackApi(format!("{} request failed: {}", method, e)))?;

        Self::check_response_json(method, response).await
    }
}

#[async_trait]
impl Messenger for SlackClient {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        blocks: &[Value],
    ) -> Result<(), AppError> {
        let mut body = serde_json::json!({
            "channel": channel_id,
            "text": text,
        });
        if !blocks.is_empty() {
            body["blocks"] = Value::Array(blocks.to_vec());
        }

        let _: Empty = self.post_json("chat.postMessage", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl UserInfoFinder for SlackClient {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        let body: UserInfoBody = self.get_json("users.info", &[("user", user_id)]).await?;
        Ok(body.user.profile)
    }
}

#[async_trait]
impl ConversationMemberFinder for SlackClient {
    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, AppError> {
        let mut members = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("channel", channel_id), ("limit", MEMBERS_PAGE_SIZE)];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: MembersBody = self.get_json("conversations.members", &query).await?;
            members.extend(page.members);

            match page.response_metadata {
                Some(meta) if !meta.next_cursor.is_empty() => cursor = meta.next_cursor,
                _ => break,
            }
        }

        Ok(members)
    }
}

#[async_trait]
impl BotIdentificator for SlackClient {
    async fn bot_id(&self) -> Result<String, AppError> {
        let body: AuthTestBody = self.get_json("auth.test", &[]).await?;
        Ok(body.user_id)
    }
}

/// Posts ephemeral replies to slash-command response URLs.
#[derive(Clone, Default)]
pub struct ResponseUrlResponder {
    http: reqwest::Client,
}

impl ResponseUrlResponder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Responder for ResponseUrlResponder {
    async fn respond_ephemeral(&self, response_url: &str, text: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(response_url)
            .json(&EphemeralResponse {
                response_type: "ephemeral",
                replace_original: false,
                text,
            })
            .send()
            .await
            .map_err(|e| AppError::SlackApi(format!("response_url request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SlackApi(format!(
                "response_url HTTP {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_keeps_bare_code() {
        let envelope: ApiEnvelope<Empty> =
            serde_json::from_str(r#"{"ok":false,"error":"not_in_channel"}"#).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error.as_deref(), Some("not_in_channel"));
    }

    #[test]
    fn members_page_parses_cursor() {
        let envelope: ApiEnvelope<MembersBody> = serde_json::from_str(
            r#"{"ok":true,"members":["U1","U2"],"response_metadata":{"next_cursor":"abc"}}"#,
        )
        .unwrap();
        let body = envelope.body.unwrap();
        assert_eq!(body.members, vec!["U1", "U2"]);
        assert_eq!(body.response_metadata.unwrap().next_cursor, "abc");
    }

    #[tokio::test]
    async fn fixed_bot_identificator_needs_no_io() {
        let bot = FixedBotIdentificator::new("B123");
        assert_eq!(bot.bot_id().await.unwrap(), "B123");
    }
}
