//! Application state and command handlers
//!
//! [`App`] is the orchestrator: it decides which lifecycle operation each
//! table needs, runs it with a fresh [`OperationContext`], and keeps the
//! state file in step after every successful mutation.

use crate::azure::operation::OperationContext;
use crate::config::{TablesFile, Timeouts};
use crate::resource::lifecycle::{self, ReadOutcome};
use crate::resource::model::{DesiredState, ObservedState};
use crate::resource::{schema, throughput, TableApi};
use crate::state::StateFile;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What apply did to one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Replaced,
    Unchanged,
    Deleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Replaced => "replaced",
            Action::Unchanged => "unchanged",
            Action::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// Outcome of a refresh
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    /// Tables that no longer exist and were dropped from state
    pub removed: Vec<String>,
}

/// Main application state
pub struct App<A> {
    api: A,
    state: StateFile,
    timeouts: Timeouts,
    cancel: CancellationToken,
}

impl<A: TableApi> App<A> {
    pub fn new(api: A, state: StateFile, timeouts: Timeouts, cancel: CancellationToken) -> Self {
        Self {
            api,
            state,
            timeouts,
            cancel,
        }
    }

    pub fn state(&self) -> &StateFile {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn ctx(&self, timeout: Duration) -> OperationContext {
        OperationContext::with_timeout(timeout).with_cancellation(self.cancel.child_token())
    }

    /// Reconcile every configured table, in address order
    ///
    /// With `prune`, tables in state but missing from the configuration are
    /// deleted. Stops at the first failure; everything applied before it is
    /// already saved.
    pub async fn apply(&mut self, tables: &TablesFile, prune: bool) -> Result<Vec<(String, Action)>> {
        for (address, desired) in &tables.tables {
            schema::validate(desired).with_context(|| format!("Invalid configuration for {}", address))?;
        }

        let mut actions = Vec::new();

        for (address, desired) in &tables.tables {
            let action = self
                .apply_one(address, desired)
                .await
                .with_context(|| format!("Failed to apply {}", address))?;
            tracing::info!("{}: {}", address, action);
            actions.push((address.clone(), action));
        }

        if prune {
            let orphans: Vec<String> = self
                .state
                .addresses()
                .into_iter()
                .filter(|address| !tables.tables.contains_key(address))
                .collect();
            for address in orphans {
                self.destroy(&address).await?;
                actions.push((address, Action::Deleted));
            }
        }

        Ok(actions)
    }

    async fn apply_one(&mut self, address: &str, desired: &DesiredState) -> Result<Action> {
        let Some(prior) = self.state.observed(address)? else {
            self.create(address, desired).await?;
            return Ok(Action::Created);
        };

        let current = match lifecycle::read(&self.api, &self.ctx(self.timeouts.read()), &prior.id).await? {
            ReadOutcome::Present(current) => current,
            ReadOutcome::Absent => {
                tracing::warn!("{} disappeared outside of cosmotab, recreating", address);
                self.state.remove(address);
                self.save()?;
                self.create(address, desired).await?;
                return Ok(Action::Created);
            },
        };
        self.state.put(address, &current);

        if !schema::replacement_attributes(&current, desired).is_empty() {
            let new_id = lifecycle::preflight_create(&self.api, desired).await?;
            tracing::info!("Replacing {} with {}", current.id, new_id);
            let ctx = self.ctx(self.timeouts.delete());
            lifecycle::delete(&self.api, &ctx, &current.id).await?;
            self.state.remove(address);
            self.save()?;
            self.create(address, desired).await?;
            return Ok(Action::Replaced);
        }

        if !throughput::has_changed(&current.throughput, desired) {
            self.save()?;
            return Ok(Action::Unchanged);
        }

        let ctx = self.ctx(self.timeouts.update());
        let updated = lifecycle::update(&self.api, &ctx, &current, desired).await?;
        self.state.put(address, &updated);
        self.save()?;
        Ok(Action::Updated)
    }

    async fn create(&mut self, address: &str, desired: &DesiredState) -> Result<ObservedState> {
        let ctx = self.ctx(self.timeouts.create());
        let observed = lifecycle::create(&self.api, &ctx, desired).await?;
        self.state.put(address, &observed);
        self.save()?;
        Ok(observed)
    }

    /// Re-read every managed table concurrently
    pub async fn refresh(&mut self) -> Result<RefreshSummary> {
        let mut targets = Vec::new();
        for address in self.state.addresses() {
            if let Some(observed) = self.state.observed(&address)? {
                targets.push((address, observed.id));
            }
        }

        let ctx = self.ctx(self.timeouts.read());
        let api = &self.api;
        let results = join_all(targets.iter().map(|(address, id)| {
            let ctx = &ctx;
            async move { (address, lifecycle::read(api, ctx, id).await) }
        }))
        .await;

        let mut summary = RefreshSummary::default();
        let mut first_error = None;
        for (address, result) in results {
            match result {
                Ok(ReadOutcome::Present(observed)) => {
                    self.state.put(address, &observed);
                    summary.refreshed.push(address.clone());
                },
                Ok(ReadOutcome::Absent) => {
                    self.state.remove(address);
                    summary.removed.push(address.clone());
                },
                Err(err) => {
                    tracing::error!("Refreshing {} failed: {}", address, err);
                    if first_error.is_none() {
                        first_error = Some(anyhow::Error::new(err).context(format!("Failed to refresh {}", address)));
                    }
                },
            }
        }

        self.save()?;

        match first_error {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    /// Adopt an existing table under `address`
    pub async fn import(&mut self, address: &str, id: &str) -> Result<ObservedState> {
        if self.state.contains(address) {
            anyhow::bail!("{} is already managed; destroy or remove it from state first", address);
        }

        let ctx = self.ctx(self.timeouts.read());
        let observed = lifecycle::import_existing(&self.api, &ctx, id)
            .await
            .with_context(|| format!("Failed to import {}", address))?;
        self.state.put(address, &observed);
        self.save()?;
        Ok(observed)
    }

    /// Delete a managed table and forget it
    pub async fn destroy(&mut self, address: &str) -> Result<()> {
        let observed = self
            .state
            .observed(address)?
            .with_context(|| format!("{} is not in state", address))?;

        let ctx = self.ctx(self.timeouts.delete());
        lifecycle::delete(&self.api, &ctx, &observed.id)
            .await
            .with_context(|| format!("Failed to destroy {}", address))?;
        self.state.remove(address);
        self.save()?;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        self.state.save().context("Failed to save state")
    }
}
