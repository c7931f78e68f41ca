// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry-with-reconnect policy for calls against unreliable backends.
//!
//! A failed call is retried after reconnecting the backend client, up to a
//! fixed number of total attempts. Errors the policy does not consider
//! retryable propagate immediately, as do reconnection failures.

use crate::db::StoreError;
use std::fmt::Display;
use std::future::Future;

/// Total attempts for every backend call (the first call plus one retry).
pub const MAX_ATTEMPTS: u32 = 2;

/// Retry policy: a retryable-error predicate plus an attempt limit.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    is_retryable: fn(&E) -> bool,
}

// Not derived: `E` need not be `Clone`.
impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl RetryPolicy<StoreError> {
    /// Store calls retry anything but missing records and malformed keys/records.
    pub fn for_store() -> Self {
        Self::new(MAX_ATTEMPTS, StoreError::is_retryable)
    }
}

impl RetryPolicy<anyhow::Error> {
    /// Scheduler calls retry every failure.
    pub fn for_tasks() -> Self {
        Self::new(MAX_ATTEMPTS, |_| true)
    }
}

impl<E: Display> RetryPolicy<E> {
    pub fn new(max_attempts: u32, is_retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            is_retryable,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op`, calling `reconnect` before each retry.
    pub async fn run<T, Op, Fut, Rc, RcFut>(
        &self,
        operation: &str,
        mut op: Op,
        mut reconnect: Rc,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Rc: FnMut() -> RcFut,
        RcFut: Future<Output = Result<(), E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && (self.is_retryable)(&e) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %e,
                        "Backend call failed, reconnecting and retrying"
                    );
                    reconnect().await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
