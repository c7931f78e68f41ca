// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting stored tokens.
//!
//! Chat team tokens and Fitbit token pairs are encrypted directly with the
//! KMS key (no envelope encryption).

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "stepcurry";

    /// Key used for every stored token
    pub const TOKEN_KEY_NAME: &str = "token-encryption";

    /// Create a new KMS service.
    /// Connects to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        tracing::info!(key = %key_path, "KMS client connected");

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for tests and local runs.
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt a secret. Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Ok(BASE64.encode(plaintext));
            }
        }

        // Release builds have no mock path: a missing client is an error.
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext.
    pub async fn decrypt(&self, ciphertext_b64: &str) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 ciphertext decode failed: {}", e))
        })?;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return String::from_utf8(ciphertext).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e))
                });
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}
