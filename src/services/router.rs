// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-team service routing.
//!
//! A `TeamRouter` resolves a team ID to the chat capabilities bound to that
//! team's credentials. Single-tenant deployments return one fixed bundle;
//! multi-tenant deployments build a bundle on first use and cache it for the
//! life of the process.

use crate::db::Store;
use crate::error::AppError;
use crate::services::slack::{
    BotIdentificator, ConversationMemberFinder, FixedBotIdentificator, Messenger, SlackClient,
    UserInfoFinder,
};
use crate::services::vault::TokenLoader;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Chat capabilities scoped to one team.
#[derive(Clone)]
pub struct TeamServices {
    pub messenger: Arc<dyn Messenger>,
    pub user_info: Arc<dyn UserInfoFinder>,
    pub members: Arc<dyn ConversationMemberFinder>,
    pub bot: Arc<dyn BotIdentificator>,
}

impl TeamServices {
    /// All capabilities backed by one Slack client.
    pub fn from_slack(client: SlackClient, bot: Arc<dyn BotIdentificator>) -> Self {
        let client = Arc::new(client);
        Self {
            messenger: client.clone(),
            user_info: client.clone(),
            members: client,
            bot,
        }
    }
}

/// Resolves a team to its service bundle.
#[async_trait]
pub trait TeamRouter: Send + Sync {
    async fn route(&self, team_id: &str) -> Result<Arc<TeamServices>, AppError>;
}

/// One bundle for every team.
pub struct SingleTenantRouter {
    services: Arc<TeamServices>,
}

impl SingleTenantRouter {
    pub fn new(services: TeamServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

#[async_trait]
impl TeamRouter for SingleTenantRouter {
    async fn route(&self, _team_id: &str) -> Result<Arc<TeamServices>, AppError> {
        Ok(self.services.clone())
    }
}

/// Builds a bundle from a team token and the team's bot user.
pub trait ServicesBuilder: Send + Sync {
    fn build(&self, token: String, bot_user_id: String) -> TeamServices;
}

/// Builds Slack-backed bundles.
pub struct SlackServicesBuilder {
    base_url: String,
}

impl SlackServicesBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

impl ServicesBuilder for SlackServicesBuilder {
    fn build(&self, token: String, bot_user_id: String) -> TeamServices {
        TeamServices::from_slack(
            SlackClient::new(&self.base_url, token),
            Arc::new(FixedBotIdentificator::new(bot_user_id)),
        )
    }
}

/// Lazily built, cached bundle per team.
///
/// Builds for the same team are serialized by a per-team lock, so concurrent
/// first requests load credentials once. Failed builds are not cached.
pub struct MultiTenantRouter {
    store: Store,
    token_loader: Arc<dyn TokenLoader>,
    builder: Arc<dyn ServicesBuilder>,
    cache: DashMap<String, Arc<TeamServices>>,
    build_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MultiTenantRouter {
    pub fn new(
        store: Store,
        token_loader: Arc<dyn TokenLoader>,
        builder: Arc<dyn ServicesBuilder>,
    ) -> Self {
        Self {
            store,
            token_loader,
            builder,
            cache: DashMap::new(),
            build_locks: DashMap::new(),
        }
    }

    /// Number of cached teams.
    pub fn cached_teams(&self) -> usize {
        self.cache.len()
    }

    async fn build(&self, team_id: &str) -> Result<TeamServices, AppError> {
        let token = self.token_loader.load_team_token(team_id).await?;
        let bot = self
            .store
            .get_bot_info(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bot info for team {}", team_id)))?;

        Ok(self.builder.build(token, bot.bot_user_id))
    }
}

#[async_trait]
impl TeamRouter for MultiTenantRouter {
    async fn route(&self, team_id: &str) -> Result<Arc<TeamServices>, AppError> {
        if let Some(services) = self.cache.get(team_id) {
            return Ok(services.clone());
        }

        let lock = self
            .build_locks
            .entry(team_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another request may have built it while we waited.
        if let Some(services) = self.cache.get(team_id) {
            return Ok(services.clone());
        }

        let services = match self.build(team_id).await {
            Ok(services) => Arc::new(services),
            Err(e) => {
                tracing::warn!(team_id, error = %e, "Failed to build team services");
                return Err(e);
            }
        };

        self.cache.insert(team_id.to_string(), services.clone());
        tracing::info!(team_id, "Team services cached");
        Ok(services)
    }
}
