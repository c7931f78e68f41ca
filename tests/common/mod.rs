// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use stepcurry::config::Config;
use stepcurry::db::{MemoryDatastore, Store};
use stepcurry::error::AppError;
use stepcurry::models::{ChallengeId, ClientAccess, FitbitApiAccess};
use stepcurry::routes::create_router;
use stepcurry::services::messages::FixedSelector;
use stepcurry::services::slack::{
    BotIdentificator, ConversationMemberFinder, Messenger, Responder, UserInfoFinder, UserProfile,
};
use stepcurry::services::tasks::TaskRequest;
use stepcurry::services::vault::{FitbitCredentials, TokenLoader};
use stepcurry::services::{
    ActivityApi, ChallengeService, Clock, CommandContext, KmsService, RankingEngine,
    SingleTenantRouter, TaskScheduler, TasksService, TeamServices, TokenVault,
};
use stepcurry::AppState;

pub const TEAM: &str = "T1";
pub const CHANNEL: &str = "C1";
pub const BOT_USER: &str = "UBOT";
pub const RESPONSE_URL: &str = "https://hooks.slack.test/commands/1";

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Local time in Los Angeles as UTC.
pub fn la(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Los_Angeles
        .with_ymd_and_hms(y, m, d, h, min, s)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn challenge_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 10, 11).unwrap()
}

pub fn challenge_id() -> ChallengeId {
    ChallengeId::new(CHANNEL, TEAM, "2019-10-11")
}

pub fn command(user_id: &str) -> CommandContext {
    CommandContext {
        team_id: TEAM.to_string(),
        channel_id: CHANNEL.to_string(),
        user_id: user_id.to_string(),
        response_url: RESPONSE_URL.to_string(),
    }
}

// ─── Clock ───────────────────────────────────────────────────────

/// Clock the test sets by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ─── Slack ───────────────────────────────────────────────────────

/// A message posted through the fake messenger.
#[derive(Debug, Clone)]
pub struct Post {
    pub channel_id: String,
    pub text: String,
    pub blocks: Vec<Value>,
}

/// In-memory Slack workspace.
#[derive(Default)]
pub struct FakeSlack {
    pub posts: Mutex<Vec<Post>>,
    /// Error code returned by every post while set.
    pub post_error: Mutex<Option<String>>,
    pub members: Mutex<HashMap<String, Vec<String>>>,
    pub members_error: Mutex<Option<String>>,
}

impl FakeSlack {
    pub fn set_members(&self, channel_id: &str, members: &[&str]) {
        self.members.lock().unwrap().insert(
            channel_id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
    }

    pub fn fail_posts_with(&self, code: &str) {
        *self.post_error.lock().unwrap() = Some(code.to_string());
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    pub fn services(self: &Arc<Self>) -> TeamServices {
        TeamServices {
            messenger: self.clone(),
            user_info: self.clone(),
            members: self.clone(),
            bot: self.clone(),
        }
    }
}

#[async_trait]
impl Messenger for FakeSlack {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        blocks: &[Value],
    ) -> Result<(), AppError> {
        if let Some(code) = self.post_error.lock().unwrap().clone() {
            return Err(AppError::SlackApi(code));
        }
        self.posts.lock().unwrap().push(Post {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            blocks: blocks.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl UserInfoFinder for FakeSlack {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        Ok(UserProfile {
            real_name: format!("Name of {}", user_id),
            image_32: format!("https://avatars.test/{}.png", user_id),
        })
    }
}

#[async_trait]
impl ConversationMemberFinder for FakeSlack {
    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, AppError> {
        if let Some(code) = self.members_error.lock().unwrap().clone() {
            return Err(AppError::SlackApi(code));
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BotIdentificator for FakeSlack {
    async fn bot_id(&self) -> Result<String, AppError> {
        Ok(BOT_USER.to_string())
    }
}

/// Records ephemeral replies.
#[derive(Default)]
pub struct FakeResponder {
    pub replies: Mutex<Vec<(String, String)>>,
}

impl FakeResponder {
    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn respond_ephemeral(&self, response_url: &str, text: &str) -> Result<(), AppError> {
        self.replies
            .lock()
            .unwrap()
            .push((response_url.to_string(), text.to_string()));
        Ok(())
    }
}

// ─── Scheduler ───────────────────────────────────────────────────

/// Records created tasks.
#[derive(Default)]
pub struct FakeScheduler {
    pub tasks: Mutex<Vec<TaskRequest>>,
    pub failures_left: Mutex<u32>,
    pub connects: AtomicU32,
}

impl FakeScheduler {
    pub fn tasks(&self) -> Vec<TaskRequest> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn scheduled_times(&self) -> Vec<DateTime<Utc>> {
        self.tasks().iter().map(|t| t.schedule_time).collect()
    }
}

#[async_trait]
impl TaskScheduler for FakeScheduler {
    async fn connect(&self) -> anyhow::Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn queue_id(&self) -> &str {
        "projects/test-project/locations/us-central1/queues/challenge-updates"
    }

    async fn create_task(&self, task: &TaskRequest) -> anyhow::Result<()> {
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                anyhow::bail!("scheduler unavailable");
            }
        }
        self.tasks.lock().unwrap().push(task.clone());
        Ok(())
    }
}

// ─── Fitbit ──────────────────────────────────────────────────────

/// Fitbit API with per-user step counts and a set of accepted tokens.
#[derive(Default)]
pub struct FakeFitbit {
    pub steps: Mutex<HashMap<String, u64>>,
    pub valid_tokens: Mutex<HashSet<String>>,
    pub failing_users: Mutex<HashSet<String>>,
    /// Refreshed tokens are not accepted either.
    pub reject_refreshed: Mutex<bool>,
    pub fetches: AtomicU32,
    pub refreshes: AtomicU32,
}

impl FakeFitbit {
    pub fn set_steps(&self, fitbit_user: &str, steps: u64) {
        self.steps
            .lock()
            .unwrap()
            .insert(fitbit_user.to_string(), steps);
    }

    pub fn accept_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityApi for FakeFitbit {
    async fn daily_steps(
        &self,
        fitbit_user: &str,
        access_token: &str,
        _date: NaiveDate,
    ) -> Result<u64, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_users.lock().unwrap().contains(fitbit_user) {
            return Err(AppError::FitbitApi("HTTP 500: upstream error".to_string()));
        }
        if !self.valid_tokens.lock().unwrap().contains(access_token) {
            return Err(AppError::FitbitUnauthorized);
        }
        Ok(self
            .steps
            .lock()
            .unwrap()
            .get(fitbit_user)
            .copied()
            .unwrap_or(0))
    }

    async fn refresh_access(&self, refresh_token: &str) -> Result<FitbitApiAccess, AppError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let access_token = format!("{}-access", refresh_token);
        if !*self.reject_refreshed.lock().unwrap() {
            self.accept_token(&access_token);
        }
        Ok(FitbitApiAccess {
            fitbit_user: String::new(),
            access_token,
            refresh_token: format!("{}-next", refresh_token),
        })
    }
}

// ─── Team tokens ─────────────────────────────────────────────────

/// Token loader that counts loads and yields mid-load.
#[derive(Default)]
pub struct CountingTokenLoader {
    pub tokens: Mutex<HashMap<String, String>>,
    pub loads: AtomicU32,
}

impl CountingTokenLoader {
    pub fn set_token(&self, team_id: &str, token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert(team_id.to_string(), token.to_string());
    }

    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenLoader for CountingTokenLoader {
    async fn load_team_token(&self, team_id: &str) -> Result<String, AppError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.tokens
            .lock()
            .unwrap()
            .get(team_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Token for team {}", team_id)))
    }
}

// ─── Harness ─────────────────────────────────────────────────────

/// Handles on every fake behind a test app.
pub struct TestHarness {
    pub datastore: Arc<MemoryDatastore>,
    pub store: Store,
    pub vault: Arc<TokenVault>,
    pub slack: Arc<FakeSlack>,
    pub fitbit: Arc<FakeFitbit>,
    pub scheduler: Arc<FakeScheduler>,
    pub responder: Arc<FakeResponder>,
    pub clock: Arc<ManualClock>,
    pub state: Arc<AppState>,
}

impl TestHarness {
    /// Link a channel member to a Fitbit account with a working token.
    pub async fn link_user(&self, slack_user: &str, fitbit_user: &str, steps: u64) {
        let access_token = format!("{}-token", fitbit_user);
        self.link_user_with_token(slack_user, fitbit_user, &access_token)
            .await;
        self.fitbit.accept_token(&access_token);
        self.fitbit.set_steps(fitbit_user, steps);
    }

    /// Link a user with `access_token`, which the fake Fitbit may not accept.
    pub async fn link_user_with_token(
        &self,
        slack_user: &str,
        fitbit_user: &str,
        access_token: &str,
    ) {
        self.store
            .put_client_access(&ClientAccess {
                slack_user: slack_user.to_string(),
                slack_team: TEAM.to_string(),
                fitbit_user: fitbit_user.to_string(),
            })
            .await
            .unwrap();
        self.vault
            .save_fitbit_access(&FitbitApiAccess {
                fitbit_user: fitbit_user.to_string(),
                access_token: access_token.to_string(),
                refresh_token: format!("{}-refresh", fitbit_user),
            })
            .await
            .unwrap();
    }

    pub fn challenges(&self) -> &ChallengeService {
        &self.state.challenges
    }
}

/// Create a test app with in-memory dependencies.
/// Returns the router and handles on every fake.
///
/// The clock starts at 2019-10-11 09:00 in Los Angeles.
pub fn create_test_app() -> (axum::Router, TestHarness) {
    let config = Config::test_default();
    let datastore = Arc::new(MemoryDatastore::new());
    let store = Store::new(datastore.clone());
    let vault = Arc::new(TokenVault::new(store.clone(), KmsService::new_mock()));

    let slack = Arc::new(FakeSlack::default());
    let fitbit = Arc::new(FakeFitbit::default());
    let scheduler = Arc::new(FakeScheduler::default());
    let responder = Arc::new(FakeResponder::default());
    let clock = Arc::new(ManualClock::new(la(2019, 10, 11, 9, 0, 0)));

    let tasks = TasksService::new(scheduler.clone(), config.update_challenge_url());
    let router = Arc::new(SingleTenantRouter::new(slack.services()));
    let credentials: Arc<dyn FitbitCredentials> = vault.clone();
    let ranking = RankingEngine::new(store.clone(), credentials, fitbit.clone());

    let challenges = ChallengeService::new(
        store.clone(),
        tasks,
        router,
        ranking,
        responder.clone(),
        config.challenge_timezone,
    )
    .with_selector(Arc::new(FixedSelector(0)))
    .with_clock(clock.clone());

    let state = Arc::new(AppState {
        config,
        store: store.clone(),
        challenges,
    });

    let harness = TestHarness {
        datastore,
        store,
        vault,
        slack,
        fitbit,
        scheduler,
        responder,
        clock,
        state: state.clone(),
    };

    (create_router(state), harness)
}
