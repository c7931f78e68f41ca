// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process datastore for local runs and tests.

use super::{Datastorer, Key, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

type Records = BTreeMap<(String, &'static str), BTreeMap<String, Value>>;

/// Operation names used by the failure hooks and call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Put,
    Delete,
    Query,
    Connect,
}

/// Datastore held in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryDatastore {
    records: Mutex<Records>,
    failures: Mutex<VecDeque<(Op, StoreError)>>,
    gets: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    connects: AtomicU64,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `err`.
    ///
    /// Failures are consumed in the order they were queued.
    pub fn fail_next(&self, op: Op, err: StoreError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back((op, err));
        }
    }

    /// Number of calls made for `op`, including failed ones.
    pub fn calls(&self, op: Op) -> u64 {
        self.counter(op).load(Ordering::SeqCst)
    }

    fn counter(&self, op: Op) -> &AtomicU64 {
        match op {
            Op::Get => &self.gets,
            Op::Put => &self.puts,
            Op::Delete => &self.deletes,
            Op::Query => &self.queries,
            Op::Connect => &self.connects,
        }
    }

    fn enter(&self, op: Op) -> Result<(), StoreError> {
        self.counter(op).fetch_add(1, Ordering::SeqCst);
        let mut failures = self.lock_failures()?;
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, err)) = failures.remove(pos) {
                return Err(err);
            }
        }
        Ok(())
    }

    fn lock_failures(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, VecDeque<(Op, StoreError)>>, StoreError> {
        self.failures
            .lock()
            .map_err(|_| StoreError::Unavailable("failure queue poisoned".to_string()))
    }

    fn lock_records(&self) -> Result<std::sync::MutexGuard<'_, Records>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("record map poisoned".to_string()))
    }
}

#[async_trait]
impl Datastorer for MemoryDatastore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.enter(Op::Connect)
    }

    async fn get(&self, key: &Key) -> Result<Value, StoreError> {
        self.enter(Op::Get)?;
        key.validate()?;
        self.lock_records()?
            .get(&(key.namespace.clone(), key.kind))
            .and_then(|kind| kind.get(&key.name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &Key, value: &Value) -> Result<(), StoreError> {
        self.enter(Op::Put)?;
        key.validate()?;
        if !value.is_object() {
            return Err(StoreError::InvalidShape(format!(
                "{key}: expected an object"
            )));
        }
        self.lock_records()?
            .entry((key.namespace.clone(), key.kind))
            .or_default()
            .insert(key.name.clone(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        self.enter(Op::Delete)?;
        key.validate()?;
        if let Some(kind) = self
            .lock_records()?
            .get_mut(&(key.namespace.clone(), key.kind))
        {
            kind.remove(&key.name);
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        kind: &'static str,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        self.enter(Op::Query)?;
        Ok(self
            .lock_records()?
            .get(&(namespace.to_string(), kind))
            .map(|records| {
                records
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
