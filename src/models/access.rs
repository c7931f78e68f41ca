// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Account linkage and credential models.

use serde::{Deserialize, Serialize};

/// Links a chat user (within a team namespace) to a Fitbit account.
///
/// Written when a user completes account linking; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAccess {
    /// Chat user ID (also used as document ID)
    pub slack_user: String,
    /// Team the user belongs to
    pub slack_team: String,
    /// Linked Fitbit user ID
    pub fitbit_user: String,
}

/// Fitbit OAuth credentials for one Fitbit account.
///
/// Stored apart from `ClientAccess` so a token refresh never rewrites the
/// linkage record. The serde names match the Fitbit token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitbitApiAccess {
    #[serde(rename = "user_id")]
    pub fitbit_user: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for FitbitApiAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitbitApiAccess")
            .field("fitbit_user", &self.fitbit_user)
            .finish_non_exhaustive()
    }
}

/// Stored form of `FitbitApiAccess` (tokens encrypted, base64).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedFitbitAccess {
    pub fitbit_user: String,
    pub access_token_encrypted: String,
    pub refresh_token_encrypted: String,
    /// When the pair was last issued (RFC 3339)
    pub updated_at: String,
}

/// The bot identity recorded for a team when the app was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub bot_user_id: String,
}

/// A team's chat access token, encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamToken {
    pub team_id: String,
    pub token_encrypted: String,
    pub updated_at: String,
}
