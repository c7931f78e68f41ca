// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Steps challenge lifecycle.
//!
//! A challenge is opened on demand, refreshed hourly until 19:00 local time
//! on its day, and closed with a winner announcement at 08:00 local time the
//! following day. Every step is driven by the stored record and the clock, so
//! redelivered update tasks are harmless.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{ChallengeId, StepsChallenge, UserSteps};
use crate::services::messages::{self, RandomSelector, Selector};
use crate::services::ranking::RankingEngine;
use crate::services::router::{TeamRouter, TeamServices};
use crate::services::slack::Responder;
use crate::services::TasksService;
use crate::time_utils::{challenge_date, end_of_day_boundary, final_boundary, format_date};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use validator::Validate;

/// Delay between regular ranking updates.
pub const REGULAR_UPDATE_INTERVAL: Duration = Duration::hours(1);

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Context of a slash command invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub response_url: String,
}

/// Result of opening a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Started(ChallengeId),
    AlreadyActive,
    BotNotInChannel,
}

/// Result of a scheduled update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No such challenge; nothing is rescheduled.
    NotFound,
    /// Already closed by an earlier delivery.
    Inactive,
    /// Ranking posted and the next regular update scheduled.
    Refreshed { next_update: DateTime<Utc> },
    /// Past the end of the day; only the final update was scheduled.
    FinalScheduled { at: DateTime<Utc> },
    /// Winner announced and the challenge deactivated.
    Closed { winner: Option<UserSteps> },
}

/// Result of a standings request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandingsOutcome {
    Posted,
    NoActiveChallenge,
}

/// Owns the challenge state machine.
pub struct ChallengeService {
    store: Store,
    tasks: TasksService,
    router: Arc<dyn TeamRouter>,
    ranking: RankingEngine,
    responder: Arc<dyn Responder>,
    selector: Arc<dyn Selector>,
    clock: Arc<dyn Clock>,
    default_timezone: Tz,
}

impl ChallengeService {
    pub fn new(
        store: Store,
        tasks: TasksService,
        router: Arc<dyn TeamRouter>,
        ranking: RankingEngine,
        responder: Arc<dyn Responder>,
        default_timezone: Tz,
    ) -> Self {
        Self {
            store,
            tasks,
            router,
            ranking,
            responder,
            selector: Arc::new(RandomSelector::from_entropy()),
            clock: Arc::new(SystemClock),
            default_timezone,
        }
    }

    /// Replace the banner selector.
    pub fn with_selector(mut self, selector: Arc<dyn Selector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Timezone governing a channel's challenges.
    fn channel_timezone(&self, _channel_id: &str) -> Tz {
        self.default_timezone
    }

    /// Coordinates of today's challenge in a channel.
    fn todays_id(&self, ctx: &CommandContext, tz: Tz) -> Result<ChallengeId, AppError> {
        let date = challenge_date(self.clock.now(), tz);
        let id = ChallengeId::new(&ctx.channel_id, &ctx.team_id, format_date(date));
        id.validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid challenge coordinates: {}", e)))?;
        Ok(id)
    }

    // ─── Open ────────────────────────────────────────────────────

    /// Open today's challenge in the invoking channel.
    pub async fn open(&self, ctx: &CommandContext) -> Result<OpenOutcome, AppError> {
        let tz = self.channel_timezone(&ctx.channel_id);
        let id = self.todays_id(ctx, tz)?;

        if let Some(existing) = self.store.get_challenge(&id).await? {
            if existing.active {
                tracing::info!(
                    team_id = %id.team_id,
                    channel_id = %id.channel_id,
                    date = %id.date,
                    "Challenge already active"
                );
                self.responder
                    .respond_ephemeral(&ctx.response_url, messages::CHALLENGE_ALREADY_ACTIVE)
                    .await?;
                return Ok(OpenOutcome::AlreadyActive);
            }
        }

        let services = self.router.route(&ctx.team_id).await?;

        let announcement = messages::challenge_started(&ctx.user_id);
        if let Err(e) = services
            .messenger
            .post_message(&ctx.channel_id, &announcement, &[])
            .await
        {
            if !e.is_not_in_channel() {
                return Err(e);
            }

            let bot_user_id = services.bot.bot_id().await?;
            tracing::info!(
                team_id = %ctx.team_id,
                channel_id = %ctx.channel_id,
                "Bot is not a channel member, challenge not started"
            );
            self.responder
                .respond_ephemeral(&ctx.response_url, &messages::bot_not_in_channel(&bot_user_id))
                .await?;
            return Ok(OpenOutcome::BotNotInChannel);
        }

        let now = self.clock.now();
        let challenge = StepsChallenge {
            id: id.clone(),
            active: true,
            creator_id: ctx.user_id.clone(),
            creation_time: now,
            timezone_id: tz.name().to_string(),
            ranked_users: Vec::new(),
        };
        self.store.put_challenge(&challenge).await?;
        self.tasks.schedule_challenge_update(&id, now).await?;

        tracing::info!(
            team_id = %id.team_id,
            channel_id = %id.channel_id,
            date = %id.date,
            creator_id = %ctx.user_id,
            "Challenge started"
        );
        Ok(OpenOutcome::Started(id))
    }

    // ─── Update ──────────────────────────────────────────────────

    /// Advance a challenge according to the current time.
    pub async fn update(&self, id: &ChallengeId) -> Result<UpdateOutcome, AppError> {
        id.validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid challenge id: {}", e)))?;

        let Some(challenge) = self.store.get_challenge(id).await? else {
            tracing::info!(
                team_id = %id.team_id,
                channel_id = %id.channel_id,
                date = %id.date,
                "Challenge not found, no further updates"
            );
            return Ok(UpdateOutcome::NotFound);
        };

        if !challenge.active {
            tracing::info!(
                team_id = %id.team_id,
                channel_id = %id.channel_id,
                date = %id.date,
                "Challenge already closed"
            );
            return Ok(UpdateOutcome::Inactive);
        }

        let tz = timezone_of(&challenge)?;
        let end_of_day = end_of_day_boundary(challenge.creation_time, tz);
        let final_at = final_boundary(challenge.creation_time, tz);
        let now = self.clock.now();

        if now <= end_of_day {
            self.refresh(challenge, tz).await?;

            let next_update = now + REGULAR_UPDATE_INTERVAL;
            self.tasks.schedule_challenge_update(id, next_update).await?;
            tracing::info!(
                team_id = %id.team_id,
                channel_id = %id.channel_id,
                date = %id.date,
                next_update = %next_update,
                "Challenge refreshed, regular update scheduled"
            );
            Ok(UpdateOutcome::Refreshed { next_update })
        } else if now < final_at {
            self.tasks.schedule_challenge_update(id, final_at).await?;
            tracing::info!(
                team_id = %id.team_id,
                channel_id = %id.channel_id,
                date = %id.date,
                at = %final_at,
                "Final update scheduled"
            );
            Ok(UpdateOutcome::FinalScheduled { at: final_at })
        } else {
            let winner = self.close(challenge, tz).await?;
            Ok(UpdateOutcome::Closed { winner })
        }
    }

    // ─── Standings ───────────────────────────────────────────────

    /// Post the current ranking of today's challenge on demand.
    pub async fn standings(&self, ctx: &CommandContext) -> Result<StandingsOutcome, AppError> {
        let tz = self.channel_timezone(&ctx.channel_id);
        let id = self.todays_id(ctx, tz)?;

        match self.store.get_challenge(&id).await? {
            Some(challenge) if challenge.active => {
                let tz = timezone_of(&challenge)?;
                self.refresh(challenge, tz).await?;
                Ok(StandingsOutcome::Posted)
            }
            _ => {
                self.responder
                    .respond_ephemeral(&ctx.response_url, messages::NO_ACTIVE_CHALLENGE)
                    .await?;
                Ok(StandingsOutcome::NoActiveChallenge)
            }
        }
    }

    // ─── Shared Steps ────────────────────────────────────────────

    async fn compute_ranking(
        &self,
        challenge: &StepsChallenge,
        tz: Tz,
        services: &TeamServices,
    ) -> Result<Vec<UserSteps>, AppError> {
        let date = challenge_date(challenge.creation_time, tz);
        self.ranking
            .rank(&challenge.id, date, services.members.as_ref())
            .await
    }

    /// Recompute, store and post the ranking.
    async fn refresh(&self, mut challenge: StepsChallenge, tz: Tz) -> Result<(), AppError> {
        let services = self.router.route(&challenge.id.team_id).await?;
        let ranked = self.compute_ranking(&challenge, tz, &services).await?;

        challenge.ranked_users = ranked;
        self.store.put_challenge(&challenge).await?;

        if let Some(message) = messages::render_update(
            &challenge.ranked_users,
            services.user_info.as_ref(),
            self.selector.as_ref(),
        )
        .await
        {
            services
                .messenger
                .post_message(&challenge.id.channel_id, &message.text, &message.blocks)
                .await?;
        }
        Ok(())
    }

    /// Announce the winner, then store the final ranking as inactive.
    async fn close(
        &self,
        mut challenge: StepsChallenge,
        tz: Tz,
    ) -> Result<Option<UserSteps>, AppError> {
        let services = self.router.route(&challenge.id.team_id).await?;
        let ranked = self.compute_ranking(&challenge, tz, &services).await?;

        if let Some(message) =
            messages::render_winner(&ranked, services.user_info.as_ref(), self.selector.as_ref())
                .await
        {
            services
                .messenger
                .post_message(&challenge.id.channel_id, &message.text, &message.blocks)
                .await?;
        }

        let winner = ranked.first().cloned();
        challenge.ranked_users = ranked;
        challenge.active = false;
        self.store.put_challenge(&challenge).await?;

        tracing::info!(
            team_id = %challenge.id.team_id,
            channel_id = %challenge.id.channel_id,
            date = %challenge.id.date,
            winner = winner.as_ref().map(|w| w.user_id.as_str()).unwrap_or("none"),
            "Challenge closed"
        );
        Ok(winner)
    }
}

fn timezone_of(challenge: &StepsChallenge) -> Result<Tz, AppError> {
    challenge.timezone_id.parse::<Tz>().map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "Unknown timezone '{}' on challenge {}",
            challenge.timezone_id,
            challenge.id.key()
        ))
    })
}
