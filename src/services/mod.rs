// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod challenge;
pub mod fitbit;
pub mod kms;
pub mod messages;
pub mod ranking;
pub mod retry;
pub mod router;
pub mod slack;
pub mod tasks;
pub mod vault;

pub use challenge::{ChallengeService, Clock, CommandContext, SystemClock};
pub use fitbit::{ActivityApi, FitbitClient};
pub use kms::KmsService;
pub use ranking::RankingEngine;
pub use router::{MultiTenantRouter, SingleTenantRouter, TeamRouter, TeamServices};
pub use tasks::{CloudTasksScheduler, TaskScheduler, TasksService};
pub use vault::TokenVault;
