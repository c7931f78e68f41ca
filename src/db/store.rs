// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed record operations over a `Datastorer`.
//!
//! Every backend call goes through the store retry policy. Missing records
//! surface as `None` rather than an error.

use super::{kinds, Datastorer, Key, StoreError, GLOBAL_NAMESPACE};
use crate::models::{
    BotInfo, ChallengeId, ClientAccess, EncryptedFitbitAccess, StepsChallenge, TeamToken,
};
use crate::services::retry::RetryPolicy;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Document name of a team's bot identity record.
const BOT_INFO_NAME: &str = "bot";

/// Typed store facade.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Datastorer>,
    policy: RetryPolicy<StoreError>,
}

impl Store {
    pub fn new(backend: Arc<dyn Datastorer>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::for_store(),
        }
    }

    /// Probe the backend once; used at startup.
    pub async fn self_check(&self) -> Result<(), StoreError> {
        self.query::<Value>(GLOBAL_NAMESPACE, kinds::TEAM_TOKEN)
            .await
            .map(|_| ())
    }

    // ─── Generic Operations ──────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, key: Key) -> Result<Option<T>, StoreError> {
        let backend = &self.backend;
        let key = &key;
        let result = self
            .policy
            .run("get", move || backend.get(key), move || backend.connect())
            .await;

        match result {
            Ok(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::InvalidShape(format!("{}: {}", key, e))),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put<T: Serialize>(&self, key: Key, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)
            .map_err(|e| StoreError::InvalidShape(format!("{}: {}", key, e)))?;
        let backend = &self.backend;
        let key = &key;
        let value = &value;
        self.policy
            .run(
                "put",
                move || backend.put(key, value),
                move || backend.connect(),
            )
            .await
    }

    async fn delete(&self, key: Key) -> Result<(), StoreError> {
        let backend = &self.backend;
        let key = &key;
        self.policy
            .run("delete", move || backend.delete(key), move || backend.connect())
            .await
    }

    async fn query<T: DeserializeOwned>(
        &self,
        namespace: &str,
        kind: &'static str,
    ) -> Result<Vec<(String, T)>, StoreError> {
        let backend = &self.backend;
        let rows = self
            .policy
            .run(
                "query",
                move || backend.query(namespace, kind),
                move || backend.connect(),
            )
            .await?;

        rows.into_iter()
            .map(|(name, value)| {
                serde_json::from_value(value)
                    .map(|record| (name.clone(), record))
                    .map_err(|e| {
                        StoreError::InvalidShape(format!("{}/{}/{}: {}", namespace, kind, name, e))
                    })
            })
            .collect()
    }

    // ─── Challenge Operations ────────────────────────────────────

    pub async fn get_challenge(
        &self,
        id: &ChallengeId,
    ) -> Result<Option<StepsChallenge>, StoreError> {
        self.get(challenge_key(id)).await
    }

    pub async fn put_challenge(&self, challenge: &StepsChallenge) -> Result<(), StoreError> {
        self.put(challenge_key(&challenge.id), challenge).await
    }

    // ─── Account Linkage Operations ──────────────────────────────

    /// All linked accounts in a team.
    pub async fn list_client_access(&self, team_id: &str) -> Result<Vec<ClientAccess>, StoreError> {
        Ok(self
            .query::<ClientAccess>(team_id, kinds::CLIENT_ACCESS)
            .await?
            .into_iter()
            .map(|(_, access)| access)
            .collect())
    }

    pub async fn put_client_access(&self, access: &ClientAccess) -> Result<(), StoreError> {
        self.put(
            Key::new(&access.slack_team, kinds::CLIENT_ACCESS, &access.slack_user),
            access,
        )
        .await
    }

    /// Remove a user's account link.
    pub async fn delete_client_access(
        &self,
        team_id: &str,
        slack_user: &str,
    ) -> Result<(), StoreError> {
        self.delete(Key::new(team_id, kinds::CLIENT_ACCESS, slack_user))
            .await
    }

    // ─── Credential Operations ───────────────────────────────────

    pub async fn get_fitbit_access(
        &self,
        fitbit_user: &str,
    ) -> Result<Option<EncryptedFitbitAccess>, StoreError> {
        self.get(Key::new(
            GLOBAL_NAMESPACE,
            kinds::FITBIT_API_ACCESS,
            fitbit_user,
        ))
        .await
    }

    pub async fn put_fitbit_access(&self, access: &EncryptedFitbitAccess) -> Result<(), StoreError> {
        self.put(
            Key::new(
                GLOBAL_NAMESPACE,
                kinds::FITBIT_API_ACCESS,
                &access.fitbit_user,
            ),
            access,
        )
        .await
    }

    pub async fn get_team_token(&self, team_id: &str) -> Result<Option<TeamToken>, StoreError> {
        self.get(Key::new(GLOBAL_NAMESPACE, kinds::TEAM_TOKEN, team_id))
            .await
    }

    pub async fn put_team_token(&self, token: &TeamToken) -> Result<(), StoreError> {
        self.put(
            Key::new(GLOBAL_NAMESPACE, kinds::TEAM_TOKEN, &token.team_id),
            token,
        )
        .await
    }

    // ─── Bot Identity Operations ─────────────────────────────────

    pub async fn get_bot_info(&self, team_id: &str) -> Result<Option<BotInfo>, StoreError> {
        self.get(Key::new(team_id, kinds::BOT_INFO, BOT_INFO_NAME))
            .await
    }

    pub async fn put_bot_info(&self, team_id: &str, info: &BotInfo) -> Result<(), StoreError> {
        self.put(Key::new(team_id, kinds::BOT_INFO, BOT_INFO_NAME), info)
            .await
    }
}

fn challenge_key(id: &ChallengeId) -> Key {
    Key::new(&id.team_id, kinds::STEPS_CHALLENGE, id.key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryDatastore, Op};
    use crate::models::UserSteps;
    use chrono::{TimeZone, Utc};

    fn challenge() -> StepsChallenge {
        StepsChallenge {
            id: ChallengeId::new("C1", "T1", "2019-10-11"),
            active: true,
            creator_id: "U1".to_string(),
            creation_time: Utc.with_ymd_and_hms(2019, 10, 11, 16, 0, 0).unwrap(),
            timezone_id: "America/Los_Angeles".to_string(),
            ranked_users: vec![UserSteps::new("U1", 100)],
        }
    }

    #[tokio::test]
    async fn missing_challenge_is_none() {
        let store = Store::new(Arc::new(MemoryDatastore::new()));
        let id = ChallengeId::new("C1", "T1", "2019-10-11");
        assert_eq!(store.get_challenge(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn challenge_stored_under_team_namespace() {
        let backend = Arc::new(MemoryDatastore::new());
        let store = Store::new(backend.clone());
        store.put_challenge(&challenge()).await.unwrap();

        let rows = backend
            .query("T1", kinds::STEPS_CHALLENGE)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "C1:2019-10-11");

        let loaded = store.get_challenge(&challenge().id).await.unwrap();
        assert_eq!(loaded, Some(challenge()));
    }

    #[tokio::test]
    async fn transient_failure_reconnects_and_retries() {
        let backend = Arc::new(MemoryDatastore::new());
        let store = Store::new(backend.clone());
        store.put_challenge(&challenge()).await.unwrap();

        backend.fail_next(Op::Get, StoreError::Unavailable("reset".into()));
        let loaded = store.get_challenge(&challenge().id).await.unwrap();

        assert!(loaded.is_some());
        assert_eq!(backend.calls(Op::Get), 2);
        assert_eq!(backend.calls(Op::Connect), 1);
    }

    #[tokio::test]
    async fn malformed_record_is_invalid_shape() {
        let backend = Arc::new(MemoryDatastore::new());
        let store = Store::new(backend.clone());
        backend
            .put(
                &Key::new("T1", kinds::BOT_INFO, BOT_INFO_NAME),
                &serde_json::json!({"unexpected": true}),
            )
            .await
            .unwrap();

        assert!(matches!(
            store.get_bot_info("T1").await,
            Err(StoreError::InvalidShape(_))
        ));
    }

    #[tokio::test]
    async fn self_check_probes_once() {
        let backend = Arc::new(MemoryDatastore::new());
        let store = Store::new(backend.clone());

        store.self_check().await.unwrap();
        assert_eq!(backend.calls(Op::Query), 1);
    }
}
