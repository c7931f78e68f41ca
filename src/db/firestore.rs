// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed datastore.
//!
//! Firestore has no namespaces, so each namespace becomes a parent document
//! `tenants/{namespace}` and each kind a sub-collection beneath it:
//! `tenants/T123/StepsChallenge/C456:2019-10-11`.

use super::{Datastorer, Key, StoreError};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use serde_json::Value;
use tokio::sync::RwLock;

/// Collection holding one parent document per namespace.
const NAMESPACE_COLLECTION: &str = "tenants";

/// Field prefix the Firestore deserializer adds for document metadata.
const METADATA_PREFIX: &str = "_firestore_";

/// Firestore database client.
pub struct FirestoreDatastore {
    project_id: String,
    client: RwLock<Option<firestore::FirestoreDb>>,
}

impl FirestoreDatastore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        let client = Self::open(project_id).await?;
        Ok(Self {
            project_id: project_id.to_string(),
            client: RwLock::new(Some(client)),
        })
    }

    /// Create an offline client. Every call fails until `connect` succeeds.
    pub fn new_offline(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            client: RwLock::new(None),
        }
    }

    async fn open(project_id: &str) -> Result<firestore::FirestoreDb, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::open_emulator(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");
        Ok(client)
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn open_emulator(project_id: &str) -> Result<firestore::FirestoreDb, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );
        Ok(client)
    }

    /// Current client, or an error if offline.
    async fn client(&self) -> Result<firestore::FirestoreDb, StoreError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Unavailable("Database not connected".to_string()))
    }

    fn parent(
        client: &firestore::FirestoreDb,
        namespace: &str,
    ) -> Result<firestore::ParentPathBuilder, StoreError> {
        client
            .parent_path(NAMESPACE_COLLECTION, namespace)
            .map_err(|e| StoreError::InvalidKey(format!("{}: {}", namespace, e)))
    }
}

/// Classify a Firestore error for the retry policy.
fn map_err(context: &str, err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound(context.to_string()),
        FirestoreError::InvalidParametersError(e) => {
            StoreError::InvalidKey(format!("{}: {}", context, e))
        }
        FirestoreError::SerializeError(e) => {
            StoreError::InvalidShape(format!("{}: {}", context, e))
        }
        FirestoreError::DeserializeError(e) => {
            StoreError::InvalidShape(format!("{}: {}", context, e))
        }
        other => StoreError::Unavailable(format!("{}: {}", context, other)),
    }
}

/// Drop metadata fields the deserializer injects.
fn strip_metadata(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|k, _| !k.starts_with(METADATA_PREFIX));
    }
    value
}

#[async_trait]
impl Datastorer for FirestoreDatastore {
    async fn connect(&self) -> Result<(), StoreError> {
        let client = Self::open(&self.project_id).await?;
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn get(&self, key: &Key) -> Result<Value, StoreError> {
        key.validate()?;
        let client = self.client().await?;
        let parent = Self::parent(&client, &key.namespace)?;

        let doc: Option<Value> = client
            .fluent()
            .select()
            .by_id_in(key.kind)
            .parent(&parent)
            .obj()
            .one(&key.name)
            .await
            .map_err(|e| map_err(&key.to_string(), e))?;

        doc.map(strip_metadata)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &Key, value: &Value) -> Result<(), StoreError> {
        key.validate()?;
        if !value.is_object() {
            return Err(StoreError::InvalidShape(format!(
                "{key}: expected an object"
            )));
        }
        let client = self.client().await?;
        let parent = Self::parent(&client, &key.namespace)?;

        let _: () = client
            .fluent()
            .update()
            .in_col(key.kind)
            .document_id(&key.name)
            .parent(&parent)
            .object(value)
            .execute()
            .await
            .map_err(|e| map_err(&key.to_string(), e))?;
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        key.validate()?;
        let client = self.client().await?;
        let parent = Self::parent(&client, &key.namespace)?;

        client
            .fluent()
            .delete()
            .from(key.kind)
            .document_id(&key.name)
            .parent(&parent)
            .execute()
            .await
            .map_err(|e| map_err(&key.to_string(), e))?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        kind: &'static str,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let client = self.client().await?;
        let parent = Self::parent(&client, namespace)?;
        let context = format!("{}/{}", namespace, kind);

        let docs = client
            .fluent()
            .select()
            .from(kind)
            .parent(&parent)
            .query()
            .await
            .map_err(|e| map_err(&context, e))?;

        docs.iter()
            .map(|doc| {
                let name = doc.name.rsplit('/').next().unwrap_or_default().to_string();
                let value = firestore::FirestoreDb::deserialize_doc_to::<Value>(doc)
                    .map_err(|e| map_err(&context, e))?;
                Ok((name, strip_metadata(value)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::kinds;
    use serde_json::json;

    #[tokio::test]
    async fn offline_client_reports_unavailable() {
        let db = FirestoreDatastore::new_offline("test-project");
        let key = Key::new("T1", kinds::BOT_INFO, "bot");

        let err = db.get(&key).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_key_rejected_before_io() {
        let db = FirestoreDatastore::new_offline("test-project");
        let key = Key::new("", kinds::BOT_INFO, "bot");

        assert!(matches!(
            db.put(&key, &json!({})).await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn metadata_fields_are_dropped() {
        let value = strip_metadata(json!({
            "_firestore_id": "abc",
            "_firestore_updated": "2019-10-11T00:00:00Z",
            "bot_user_id": "B1",
        }));
        assert_eq!(value, json!({"bot_user_id": "B1"}));
    }
}
