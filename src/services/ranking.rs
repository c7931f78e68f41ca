// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge ranking: linked channel members ordered by daily steps.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{ChallengeId, ClientAccess, FitbitApiAccess, UserSteps};
use crate::services::fitbit::ActivityApi;
use crate::services::slack::ConversationMemberFinder;
use crate::services::vault::FitbitCredentials;
use chrono::NaiveDate;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Concurrent activity fetches per ranking.
const MAX_CONCURRENT_FETCHES: usize = 4;

/// Sort by steps descending, then user ID ascending.
pub fn sort_ranking(mut users: Vec<UserSteps>) -> Vec<UserSteps> {
    users.sort_by(|a, b| {
        b.steps
            .cmp(&a.steps)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    users
}

/// Computes rankings from channel membership and Fitbit activity.
pub struct RankingEngine {
    store: Store,
    credentials: Arc<dyn FitbitCredentials>,
    activity: Arc<dyn ActivityApi>,
    /// Per-Fitbit-user mutex to serialize token refreshes.
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RankingEngine {
    pub fn new(
        store: Store,
        credentials: Arc<dyn FitbitCredentials>,
        activity: Arc<dyn ActivityApi>,
    ) -> Self {
        Self {
            store,
            credentials,
            activity,
            refresh_locks: DashMap::new(),
        }
    }

    /// Rank the linked members of the challenge channel by steps on `date`.
    ///
    /// A user whose steps can't be fetched is logged and left out.
    pub async fn rank(
        &self,
        id: &ChallengeId,
        date: NaiveDate,
        members: &dyn ConversationMemberFinder,
    ) -> Result<Vec<UserSteps>, AppError> {
        let linked: HashMap<String, ClientAccess> = self
            .store
            .list_client_access(&id.team_id)
            .await?
            .into_iter()
            .map(|access| (access.slack_user.clone(), access))
            .collect();

        let channel_members = members.channel_members(&id.channel_id).await?;

        let mut seen = HashSet::new();
        let participants: Vec<&ClientAccess> = channel_members
            .iter()
            .filter(|user| seen.insert(user.as_str()))
            .filter_map(|user| linked.get(user))
            .collect();

        tracing::debug!(
            team_id = %id.team_id,
            channel_id = %id.channel_id,
            members = channel_members.len(),
            linked = linked.len(),
            participants = participants.len(),
            "Computing ranking"
        );

        let results: Vec<(&ClientAccess, Result<u64, AppError>)> = stream::iter(participants)
            .map(|access| async move { (access, self.user_steps(access, date).await) })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut ranked = Vec::with_capacity(results.len());
        for (access, result) in results {
            match result {
                Ok(steps) => ranked.push(UserSteps::new(&access.slack_user, steps)),
                Err(e) => {
                    tracing::warn!(
                        team_id = %id.team_id,
                        user_id = %access.slack_user,
                        fitbit_user = %access.fitbit_user,
                        error = %e,
                        "Failed to fetch steps, leaving user out of ranking"
                    );
                }
            }
        }

        Ok(sort_ranking(ranked))
    }

    /// Steps for one user, refreshing a rejected access token once.
    async fn user_steps(&self, access: &ClientAccess, date: NaiveDate) -> Result<u64, AppError> {
        let credentials = self
            .credentials
            .load_fitbit_access(&access.fitbit_user)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Fitbit access for {}", access.fitbit_user))
            })?;

        match self
            .activity
            .daily_steps(&credentials.fitbit_user, &credentials.access_token, date)
            .await
        {
            Err(e) if e.is_expired_credential() => {
                tracing::info!(
                    user_id = %access.slack_user,
                    fitbit_user = %access.fitbit_user,
                    "Fitbit token expired, refreshing"
                );
                let refreshed = self.refresh(credentials).await?;
                self.activity
                    .daily_steps(&refreshed.fitbit_user, &refreshed.access_token, date)
                    .await
            }
            other => other,
        }
    }

    /// Replace a rejected token pair and persist the new one.
    async fn refresh(&self, stale: FitbitApiAccess) -> Result<FitbitApiAccess, AppError> {
        let lock = self
            .refresh_locks
            .entry(stale.fitbit_user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // A concurrent ranking may already have stored a new pair.
        if let Some(current) = self
            .credentials
            .load_fitbit_access(&stale.fitbit_user)
            .await?
        {
            if current.access_token != stale.access_token {
                return Ok(current);
            }
        }

        let mut fresh = self.activity.refresh_access(&stale.refresh_token).await?;
        fresh.fitbit_user = stale.fitbit_user;
        self.credentials.save_fitbit_access(&fresh).await?;

        tracing::info!(fitbit_user = %fresh.fitbit_user, "Fitbit token refreshed and stored");
        Ok(fresh)
    }
}
