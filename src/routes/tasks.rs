// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users. Any
//! non-2xx status makes Cloud Tasks redeliver the task.

use crate::config::UPDATE_CHALLENGE_PATH;
use crate::error::AppError;
use crate::middleware::require_tasks_queue;
use crate::models::ChallengeId;
use crate::services::challenge::UpdateOutcome;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    middleware,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(UPDATE_CHALLENGE_PATH, post(update_challenge))
        .route_layer(middleware::from_fn(require_tasks_queue))
}

/// Advance one challenge (called by Cloud Tasks).
async fn update_challenge(
    State(state): State<Arc<AppState>>,
    Json(id): Json<ChallengeId>,
) -> StatusCode {
    tracing::info!(
        team_id = %id.team_id,
        channel_id = %id.channel_id,
        date = %id.date,
        "Processing challenge update from Cloud Task"
    );

    match state.challenges.update(&id).await {
        Ok(outcome) => {
            match &outcome {
                UpdateOutcome::Closed { winner } => tracing::info!(
                    team_id = %id.team_id,
                    channel_id = %id.channel_id,
                    winner = ?winner.as_ref().map(|w| &w.user_id),
                    "Challenge update closed the challenge"
                ),
                other => tracing::debug!(outcome = ?other, "Challenge update done"),
            }
            StatusCode::OK
        }
        Err(AppError::BadRequest(message)) => {
            tracing::warn!(error = %message, "Rejected malformed challenge update");
            StatusCode::BAD_REQUEST
        }
        Err(e) => {
            tracing::error!(
                team_id = %id.team_id,
                channel_id = %id.channel_id,
                date = %id.date,
                error = %e,
                "Failed to update challenge"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
