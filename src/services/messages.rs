// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat message texts and Block Kit rendering.

use crate::models::UserSteps;
use crate::services::slack::UserInfoFinder;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Mutex;

/// Banners for regular ranking updates.
pub const UPDATE_BANNERS: [&str; 5] = [
    ":rolled_up_newspaper: _Breaking news_, here is the current steps ranking",
    ":loudspeaker: Oh snap, look who's winning the race!",
    ":athletic_shoe: _The more you take, the more you leave behind_. Here's the latest steps update",
    ":thinking_face: All truly great thoughts are conceived while walking. Here's where everyone stands",
    ":fairy: Walking is a great adventure, and if you do enough of it you might get the top spot",
];

/// Banners for the final winner announcement.
pub const WINNER_BANNERS: [&str; 1] =
    [":rolled_up_newspaper: We have a winner for yesterday's steps challenge! :tada:"];

pub const CHALLENGE_ALREADY_ACTIVE: &str =
    ":warning: There's already an active steps challenge in this channel ¯\\_(ツ)_/¯";

pub const NO_ACTIVE_CHALLENGE: &str = ":warning: There's no active challenge in this channel to report on. Start one with `/challenge`";

/// Announcement posted when a challenge opens.
pub fn challenge_started(creator_id: &str) -> String {
    format!(
        "<@{}> started a steps challenge! Get moving :athletic_shoe:. If you haven't linked your Fitbit account yet, do it now and join in.",
        creator_id
    )
}

/// Ephemeral warning when the bot can't post to the channel.
pub fn bot_not_in_channel(bot_user_id: &str) -> String {
    format!(
        "I can't start a challenge in a channel or conversation I'm not a member of. Add me, <@{}>, and try again :bow:",
        bot_user_id
    )
}

/// Picks an index in `0..len`.
pub trait Selector: Send + Sync {
    fn select(&self, len: usize) -> usize;
}

/// Uniformly random choice.
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Selector for RandomSelector {
    fn select(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0..len),
            Err(_) => 0,
        }
    }
}

/// Always the same index (clamped to the range).
pub struct FixedSelector(pub usize);

impl Selector for FixedSelector {
    fn select(&self, len: usize) -> usize {
        self.0.min(len.saturating_sub(1))
    }
}

/// A rendered chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub text: String,
    pub blocks: Vec<Value>,
}

fn banner_section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text },
    })
}

/// One context block per ranked user, best first.
pub async fn render_ranking(ranked: &[UserSteps], profiles: &dyn UserInfoFinder) -> Vec<Value> {
    let mut blocks = Vec::with_capacity(ranked.len());

    for (position, entry) in ranked.iter().enumerate() {
        let profile = match profiles.user_profile(&entry.user_id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::debug!(user_id = %entry.user_id, error = %e, "No profile for ranking entry");
                None
            }
        };

        let mut text = format!("<@{}> `{}` :athletic_shoe:", entry.user_id, entry.steps);
        if position == 0 {
            text.push_str(" :tornado::rocket:");
        }

        let mut elements = Vec::with_capacity(2);
        if let Some(profile) = profile.filter(|p| !p.image_32.is_empty()) {
            elements.push(json!({
                "type": "image",
                "image_url": profile.image_32,
                "alt_text": profile.real_name,
            }));
        }
        elements.push(json!({ "type": "mrkdwn", "text": text }));

        blocks.push(json!({ "type": "context", "elements": elements }));
    }

    blocks
}

/// Ranking update, or `None` when nobody is ranked.
pub async fn render_update(
    ranked: &[UserSteps],
    profiles: &dyn UserInfoFinder,
    selector: &dyn Selector,
) -> Option<RenderedMessage> {
    if ranked.is_empty() {
        return None;
    }

    let banner = UPDATE_BANNERS[selector.select(UPDATE_BANNERS.len())];
    let mut blocks = vec![banner_section(banner)];
    blocks.extend(render_ranking(ranked, profiles).await);

    Some(RenderedMessage {
        text: banner.to_string(),
        blocks,
    })
}

/// Winner announcement, or `None` when nobody is ranked.
pub async fn render_winner(
    ranked: &[UserSteps],
    profiles: &dyn UserInfoFinder,
    selector: &dyn Selector,
) -> Option<RenderedMessage> {
    let winner = ranked.first()?;

    let banner = WINNER_BANNERS[selector.select(WINNER_BANNERS.len())];
    let winner_line = format!(
        ":trophy: Congratulations <@{}> with `{}` steps!",
        winner.user_id, winner.steps
    );

    let mut blocks = vec![banner_section(banner), banner_section(&winner_line)];
    blocks.extend(render_ranking(ranked, profiles).await);

    Some(RenderedMessage {
        text: format!("{} {}", banner, winner_line),
        blocks,
    })
}
