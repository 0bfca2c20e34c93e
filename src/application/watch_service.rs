//! Monitoring facade for the presentation layer
//!
//! Wraps the session directory with persistence: the applied filter and
//! the continuous-mode preference are stored per owner so `resume_all` can
//! restart loops after a process restart.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::monitor_session::{ContinuousStatus, CycleReport, MonitorSession, SessionStatus};
use crate::application::session_directory::SessionDirectory;
use crate::domain::repositories::{AccountRepository, SavedFilterStore};
use crate::domain::{FilterPayload, MonitorError, OwnerId, SavedFilter};

pub struct WatchService {
    accounts: Arc<dyn AccountRepository>,
    filters: Arc<dyn SavedFilterStore>,
    directory: Arc<SessionDirectory>,
}

impl WatchService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        filters: Arc<dyn SavedFilterStore>,
        directory: Arc<SessionDirectory>,
    ) -> Self {
        Self {
            accounts,
            filters,
            directory,
        }
    }

    pub fn directory(&self) -> &Arc<SessionDirectory> {
        &self.directory
    }

    /// Make `payload` the owner's active filter, in memory and on disk
    pub async fn apply_filter(&self, owner: OwnerId, payload: FilterPayload) -> Result<()> {
        self.accounts
            .set_active_filter(owner, Some(&payload))
            .await
            .context("Failed to persist active filter")?;
        self.directory.get_or_create(owner).set_filter(payload).await;
        info!(owner, "Filter applied");
        Ok(())
    }

    pub async fn apply_saved_filter(&self, owner: OwnerId, filter_id: i64) -> Result<SavedFilter> {
        let saved = self
            .filters
            .get(owner, filter_id)
            .await?
            .with_context(|| format!("Saved filter {filter_id} not found"))?;
        self.apply_filter(owner, saved.payload.clone()).await?;
        Ok(saved)
    }

    pub async fn run_once(&self, owner: OwnerId) -> Result<CycleReport, MonitorError> {
        let session = self.session_with_filter(owner).await?;
        session.run_once().await
    }

    pub async fn start(&self, owner: OwnerId) -> Result<ContinuousStatus, MonitorError> {
        let session = self.session_with_filter(owner).await?;
        let status = session.start_continuous().await?;
        if let Err(e) = self.accounts.set_continuous(owner, true).await {
            warn!(owner, "Continuous preference not saved: {e:#}");
        }
        Ok(status)
    }

    pub async fn stop(&self, owner: OwnerId) -> Result<ContinuousStatus> {
        let status = match self.directory.get(owner) {
            Some(session) => session.stop_continuous(),
            None => ContinuousStatus::Stopped,
        };
        self.accounts
            .set_continuous(owner, false)
            .await
            .context("Failed to clear continuous preference")?;
        Ok(status)
    }

    pub async fn status(&self, owner: OwnerId) -> SessionStatus {
        self.directory.get_or_create(owner).status().await
    }

    /// Restart loops for owners that left continuous mode on.
    ///
    /// Owners without an active filter are skipped. Returns how many loops
    /// were started.
    pub async fn resume_all(&self) -> Result<usize> {
        let owners = self
            .accounts
            .continuous_owners()
            .await
            .context("Failed to list continuous owners")?;

        let mut resumed = 0;
        for owner in owners {
            let Some(payload) = self.accounts.active_filter(owner).await? else {
                warn!(owner, "Continuous mode set without an active filter, skipping");
                continue;
            };

            let session = self.directory.get_or_create(owner);
            session.set_filter(payload).await;
            match session.start_continuous().await {
                Ok(ContinuousStatus::Started) => resumed += 1,
                Ok(status) => info!(owner, "{status}"),
                Err(e) => warn!(owner, "Resume failed: {e}"),
            }
        }

        info!(resumed, "Continuous monitoring resumed");
        Ok(resumed)
    }

    pub async fn save_filter(&self, owner: OwnerId, name: &str, payload: &FilterPayload) -> Result<SavedFilter> {
        self.filters.save(owner, name, payload).await
    }

    pub async fn list_filters(&self, owner: OwnerId) -> Result<Vec<SavedFilter>> {
        self.filters.list(owner).await
    }

    pub async fn update_filter(&self, owner: OwnerId, id: i64, name: &str, payload: &FilterPayload) -> Result<bool> {
        self.filters.update(owner, id, name, payload).await
    }

    pub async fn delete_filter(&self, owner: OwnerId, id: i64) -> Result<bool> {
        self.filters.delete(owner, id).await
    }

    pub async fn shutdown(&self) {
        self.directory.shutdown_all().await;
    }

    /// Session for `owner`, loading the persisted filter if none is set yet
    async fn session_with_filter(&self, owner: OwnerId) -> Result<Arc<MonitorSession>, MonitorError> {
        let session = self.directory.get_or_create(owner);
        if session.filter().await.is_none() {
            let stored = self
                .accounts
                .active_filter(owner)
                .await
                .map_err(|e| MonitorError::Store(format!("{e:#}")))?;
            match stored {
                Some(payload) => session.set_filter(payload).await,
                None => return Err(MonitorError::missing_filter()),
            }
        }
        Ok(session)
    }
}
