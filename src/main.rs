// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stepcurry API Server
//!
//! Runs daily steps challenges in Slack channels, ranking participants by
//! their Fitbit step counts.

use std::sync::Arc;
use stepcurry::{
    config::{Config, UPDATE_QUEUE_NAME},
    db::{FirestoreDatastore, Store},
    services::{
        router::SlackServicesBuilder,
        slack::{BotIdentificator, FixedBotIdentificator, ResponseUrlResponder, SlackClient},
        ChallengeService, CloudTasksScheduler, FitbitClient, KmsService, MultiTenantRouter,
        RankingEngine, SingleTenantRouter, TasksService, TeamRouter, TeamServices, TokenVault,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        single_tenant = config.is_single_tenant(),
        timezone = %config.challenge_timezone,
        "Starting Stepcurry API"
    );

    // Initialize Firestore and probe it once
    let datastore = FirestoreDatastore::new(&config.gcp_project_id).await?;
    let store = Store::new(Arc::new(datastore));
    store.self_check().await?;
    tracing::info!("Datastore self-check passed");

    // Initialize KMS service
    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        KmsService::TOKEN_KEY_NAME,
    )
    .await?;
    tracing::info!("KMS service initialized");
    let vault = Arc::new(TokenVault::new(store.clone(), kms));

    // Initialize Cloud Tasks service
    let scheduler = CloudTasksScheduler::new(
        &config.gcp_project_id,
        &config.gcp_region,
        UPDATE_QUEUE_NAME,
        &config.base_url,
    );
    let tasks_service = TasksService::new(Arc::new(scheduler), config.update_challenge_url());
    tracing::info!(project = %config.gcp_project_id, "Cloud Tasks service initialized");

    let router = build_team_router(&config, store.clone(), vault.clone());

    let fitbit = FitbitClient::new(
        config.fitbit_client_id.clone(),
        config.fitbit_client_secret.clone(),
        config.fitbit_api_base_url.clone(),
    );
    let ranking = RankingEngine::new(store.clone(), vault, Arc::new(fitbit));

    let challenges = ChallengeService::new(
        store.clone(),
        tasks_service,
        router,
        ranking,
        Arc::new(ResponseUrlResponder::new()),
        config.challenge_timezone,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        challenges,
    });

    // Build router
    let app = stepcurry::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Single-tenant with a configured token, otherwise per-team from the vault.
fn build_team_router(config: &Config, store: Store, vault: Arc<TokenVault>) -> Arc<dyn TeamRouter> {
    match &config.slack_token {
        Some(token) => {
            let client = SlackClient::new(&config.slack_api_base_url, token.clone());
            let bot: Arc<dyn BotIdentificator> = match &config.slack_bot_user_id {
                Some(bot_user_id) => Arc::new(FixedBotIdentificator::new(bot_user_id.clone())),
                None => Arc::new(client.clone()),
            };
            tracing::info!("Serving a single Slack team");
            Arc::new(SingleTenantRouter::new(TeamServices::from_slack(client, bot)))
        }
        None => {
            tracing::info!("Serving multiple Slack teams");
            Arc::new(MultiTenantRouter::new(
                store,
                vault,
                Arc::new(SlackServicesBuilder::new(&config.slack_api_base_url)),
            ))
        }
    }
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stepcurry=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
