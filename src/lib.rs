// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stepcurry: daily steps challenges for Slack channels
//!
//! This crate provides the backend service that opens a steps challenge in a
//! channel, posts hourly Fitbit step rankings, and announces the winner the
//! next morning.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::ChallengeService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub challenges: ChallengeService,
}
