// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted token storage for chat teams and Fitbit accounts.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{EncryptedFitbitAccess, FitbitApiAccess, TeamToken};
use crate::services::KmsService;
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;

/// Loads a team's chat access token.
#[async_trait]
pub trait TokenLoader: Send + Sync {
    /// Fails with `AppError::NotFound` when the team never installed the app.
    async fn load_team_token(&self, team_id: &str) -> Result<String, AppError>;
}

/// Saves a team's chat access token.
#[async_trait]
pub trait TokenSaver: Send + Sync {
    async fn save_team_token(&self, team_id: &str, token: &str) -> Result<(), AppError>;
}

/// Loads and saves Fitbit token pairs.
#[async_trait]
pub trait FitbitCredentials: Send + Sync {
    async fn load_fitbit_access(
        &self,
        fitbit_user: &str,
    ) -> Result<Option<FitbitApiAccess>, AppError>;

    async fn save_fitbit_access(&self, access: &FitbitApiAccess) -> Result<(), AppError>;
}

/// KMS-encrypted token storage on top of the record store.
#[derive(Clone)]
pub struct TokenVault {
    store: Store,
    kms: KmsService,
}

impl TokenVault {
    pub fn new(store: Store, kms: KmsService) -> Self {
        Self { store, kms }
    }
}

#[async_trait]
impl TokenLoader for TokenVault {
    async fn load_team_token(&self, team_id: &str) -> Result<String, AppError> {
        let record = self
            .store
            .get_team_token(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Token for team {}", team_id)))?;

        self.kms.decrypt(&record.token_encrypted).await
    }
}

#[async_trait]
impl TokenSaver for TokenVault {
    async fn save_team_token(&self, team_id: &str, token: &str) -> Result<(), AppError> {
        let record = TeamToken {
            team_id: team_id.to_string(),
            token_encrypted: self.kms.encrypt(token).await?,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };
        self.store.put_team_token(&record).await?;
        tracing::info!(team_id, "Team token stored");
        Ok(())
    }
}

#[async_trait]
impl FitbitCredentials for TokenVault {
    async fn load_fitbit_access(
        &self,
        fitbit_user: &str,
    ) -> Result<Option<FitbitApiAccess>, AppError> {
        let Some(record) = self.store.get_fitbit_access(fitbit_user).await? else {
            return Ok(None);
        };

        let (access_token, refresh_token) = decrypt_tokens(
            &self.kms,
            &record.access_token_encrypted,
            &record.refresh_token_encrypted,
        )
        .await?;

        Ok(Some(FitbitApiAccess {
            fitbit_user: record.fitbit_user,
            access_token,
            refresh_token,
        }))
    }

    async fn save_fitbit_access(&self, access: &FitbitApiAccess) -> Result<(), AppError> {
        let (access_token_encrypted, refresh_token_encrypted) =
            encrypt_tokens(&self.kms, &access.access_token, &access.refresh_token).await?;

        let record = EncryptedFitbitAccess {
            fitbit_user: access.fitbit_user.clone(),
            access_token_encrypted,
            refresh_token_encrypted,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };
        self.store.put_fitbit_access(&record).await?;
        Ok(())
    }
}

/// Encrypt an OAuth token pair before storing.
async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: &str,
) -> Result<(String, String), AppError> {
    let encrypted_access = kms.encrypt(access_token).await?;
    let encrypted_refresh = kms.encrypt(refresh_token).await?;
    Ok((encrypted_access, encrypted_refresh))
}

/// Decrypt an OAuth token pair after retrieval.
async fn decrypt_tokens(
    kms: &KmsService,
    encrypted_access: &str,
    encrypted_refresh: &str,
) -> Result<(String, String), AppError> {
    let access_token = kms.decrypt(encrypted_access).await?;
    let refresh_token = kms.decrypt(encrypted_refresh).await?;
    Ok((access_token, refresh_token))
}
