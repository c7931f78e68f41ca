// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slash command routes.
//!
//! Slack posts the command as a form. User-facing outcomes (challenge already
//! active, nothing to report) are sent to `response_url`; the HTTP reply is an
//! empty 200.

use crate::error::{AppError, Result};
use crate::services::CommandContext;
use crate::AppState;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Slash command routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/commands/challenge", post(start_challenge))
        .route("/commands/standings", post(standings))
}

/// Fields of a slash command payload this service uses.
#[derive(Debug, Deserialize, Validate)]
pub struct SlashCommand {
    #[validate(length(min = 1))]
    pub team_id: String,
    #[validate(length(min = 1))]
    pub channel_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(url)]
    pub response_url: String,
    #[serde(default)]
    pub text: String,
}

impl SlashCommand {
    fn into_context(self) -> Result<CommandContext> {
        self.validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid slash command: {}", e)))?;
        Ok(CommandContext {
            team_id: self.team_id,
            channel_id: self.channel_id,
            user_id: self.user_id,
            response_url: self.response_url,
        })
    }
}

/// Open today's challenge in the channel.
async fn start_challenge(
    State(state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> Result<StatusCode> {
    let ctx = command.into_context()?;
    let outcome = state.challenges.open(&ctx).await?;
    tracing::info!(
        team_id = %ctx.team_id,
        channel_id = %ctx.channel_id,
        user_id = %ctx.user_id,
        outcome = ?outcome,
        "Challenge command handled"
    );
    Ok(StatusCode::OK)
}

/// Post the current ranking of today's challenge.
async fn standings(
    State(state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> Result<StatusCode> {
    let ctx = command.into_context()?;
    let outcome = state.challenges.standings(&ctx).await?;
    tracing::info!(
        team_id = %ctx.team_id,
        channel_id = %ctx.channel_id,
        outcome = ?outcome,
        "Standings command handled"
    );
    Ok(StatusCode::OK)
}
