// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Steps challenge model for storage and the scheduler payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Coordinates of a challenge: channel, team and local calendar date.
///
/// This is also the JSON body of every scheduled update task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct ChallengeId {
    #[validate(length(min = 1))]
    pub channel_id: String,
    #[validate(length(min = 1))]
    pub team_id: String,
    /// Local date of the challenge (YYYY-MM-DD)
    #[validate(length(equal = 10))]
    pub date: String,
}

impl ChallengeId {
    pub fn new(
        channel_id: impl Into<String>,
        team_id: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            team_id: team_id.into(),
            date: date.into(),
        }
    }

    /// Document key within the team namespace.
    ///
    /// The team is deliberately not part of the key: it is the namespace.
    pub fn key(&self) -> String {
        format!("{}:{}", self.channel_id, self.date)
    }
}

/// Persisted state of a steps challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsChallenge {
    #[serde(flatten)]
    pub id: ChallengeId,
    /// False once the winner has been announced
    pub active: bool,
    /// Chat user who opened the challenge
    pub creator_id: String,
    /// Instant the challenge was opened
    pub creation_time: DateTime<Utc>,
    /// IANA timezone governing the challenge's local day. Kept apart from
    /// `creation_time` so local-day semantics survive storage.
    pub timezone_id: String,
    /// Last computed ranking, best first
    #[serde(default)]
    pub ranked_users: Vec<UserSteps>,
}

/// A chat user and their step count for the challenge day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSteps {
    pub user_id: String,
    pub steps: u64,
}

impl UserSteps {
    pub fn new(user_id: impl Into<String>, steps: u64) -> Self {
        Self {
            user_id: user_id.into(),
            steps,
        }
    }
}
