// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod access;
pub mod challenge;

pub use access::{BotInfo, ClientAccess, EncryptedFitbitAccess, FitbitApiAccess, TeamToken};
pub use challenge::{ChallengeId, StepsChallenge, UserSteps};
