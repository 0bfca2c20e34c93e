//! Per-owner monitor session
//!
//! A session owns the known-state snapshot of one owner, the filter they
//! applied, and at most one background polling task. Cycles of the same
//! session never overlap: the known-state lock is held from fetch to state
//! update, whether the cycle was started by the caller or by the loop.
//!
//! Cancellation is cooperative. `stop_continuous` cancels the task's token;
//! the loop notices at its next iteration or while sleeping, but a cycle
//! that is already running always finishes, notifications included.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::messages::{self, Message};
use crate::domain::repositories::AccountStore;
use crate::domain::services::{ListingExtractor, ListingFetcher, Notifier};
use crate::domain::{detect, FilterPayload, KnownState, MonitorError, OwnerId};

pub const NO_LISTINGS_FOUND: &str = "No listings found";
pub const NO_NEW_UPDATES: &str = "No new updates";

/// Collaborators shared by every session
#[derive(Clone)]
pub struct MonitorDeps {
    pub fetcher: Arc<dyn ListingFetcher>,
    pub extractor: Arc<dyn ListingExtractor>,
    pub notifier: Arc<dyn Notifier>,
    pub accounts: Arc<dyn AccountStore>,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Sleep between two continuous-mode cycles
    pub poll_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(crate::infrastructure::config::defaults::POLL_INTERVAL_SECONDS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContinuousStatus {
    Started,
    AlreadyRunning,
    Stopped,
}

impl fmt::Display for ContinuousStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Started => "Continuous monitoring started",
            Self::AlreadyRunning => "Continuous monitoring already running",
            Self::Stopped => "Continuous monitoring stopped",
        };
        f.write_str(text)
    }
}

/// Outcome of one fetch → extract → detect → notify → update cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    #[serde(rename = "listingsFound")]
    pub listings_found: usize,
    #[serde(rename = "newListings")]
    pub new_listings: usize,
    #[serde(rename = "priceDrops")]
    pub price_drops: usize,
    /// Delivery outcomes joined with " | ", or a neutral message
    pub summary: String,
}

impl CycleReport {
    fn quiet(listings_found: usize, summary: &str) -> Self {
        Self {
            listings_found,
            new_listings: 0,
            price_drops: 0,
            summary: summary.to_string(),
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

/// Snapshot for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub owner: OwnerId,
    pub running: bool,
    #[serde(rename = "filterApplied")]
    pub filter_applied: bool,
    #[serde(rename = "lastOutput")]
    pub last_output: Option<String>,
    #[serde(rename = "lastRunAt")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastCount")]
    pub last_count: usize,
}

#[derive(Debug, Default)]
struct LastRun {
    output: Option<String>,
    at: Option<DateTime<Utc>>,
    count: usize,
}

struct SessionInner {
    owner: OwnerId,
    deps: MonitorDeps,
    settings: MonitorSettings,
    filter: RwLock<Option<FilterPayload>>,
    known_state: AsyncMutex<KnownState>,
    last_run: RwLock<LastRun>,
}

impl SessionInner {
    async fn run_once(&self) -> Result<CycleReport, MonitorError> {
        let payload = self
            .filter
            .read()
            .await
            .clone()
            .ok_or_else(MonitorError::missing_filter)?;

        let mut known_state = self.known_state.lock().await;

        let listings = match self.deps.fetcher.fetch(&payload).await {
            Ok(raw) => {
                debug!(owner = self.owner, bytes = raw.len(), "Received search response");
                self.deps.extractor.extract(&raw)
            }
            Err(e) => {
                warn!(owner = self.owner, "Treating cycle as empty: {e}");
                Vec::new()
            }
        };

        if listings.is_empty() {
            drop(known_state);
            let report = CycleReport::quiet(0, NO_LISTINGS_FOUND);
            self.record(&report).await;
            return Ok(report);
        }

        debug!(owner = self.owner, count = listings.len(), "Extracted listings");
        let detection = detect(&known_state, &listings);

        let mut outcomes = Vec::new();
        if !detection.new_listings.is_empty() {
            let label = format!("{} new listing(s)", detection.new_listings.len());
            let message = messages::new_listings(&detection.new_listings);
            outcomes.push(self.deliver(&label, &message).await);
        }
        if !detection.price_drops.is_empty() {
            let label = format!("{} price drop(s)", detection.price_drops.len());
            let message = messages::price_drops(&detection.price_drops);
            outcomes.push(self.deliver(&label, &message).await);
        }

        let report = CycleReport {
            listings_found: listings.len(),
            new_listings: detection.new_listings.len(),
            price_drops: detection.price_drops.len(),
            summary: if outcomes.is_empty() {
                NO_NEW_UPDATES.to_string()
            } else {
                outcomes.join(" | ")
            },
        };

        *known_state = detection.updated_state;
        drop(known_state);

        self.record(&report).await;
        Ok(report)
    }

    /// Send one rendered message to the owner; failures become text
    async fn deliver(&self, label: &str, message: &Message) -> String {
        let recipient = match self.deps.accounts.contact_of(self.owner).await {
            Ok(Some(address)) => address,
            Ok(None) => return format!("{label}: not sent: no contact"),
            Err(e) => {
                warn!(owner = self.owner, "Contact lookup failed: {e:#}");
                return format!("{label}: not sent: contact lookup failed");
            }
        };

        match self
            .deps
            .notifier
            .send(&recipient, &message.subject, &message.body)
            .await
        {
            Ok(outcome) => format!("{label}: {outcome}"),
            Err(e) => {
                warn!(owner = self.owner, subject = %message.subject, "{e}");
                format!("{label}: {e}")
            }
        }
    }

    /// Owner must still exist and still have a contact address
    async fn verify_owner(&self) -> Result<(), MonitorError> {
        let exists = self.deps.accounts.exists(self.owner).await.map_err(|e| {
            MonitorError::identity_invalidated(self.owner, format!("account lookup failed: {e}"))
        })?;
        if !exists {
            return Err(MonitorError::identity_invalidated(self.owner, "account no longer exists"));
        }

        match self.deps.accounts.contact_of(self.owner).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(MonitorError::identity_invalidated(self.owner, "no contact address")),
            Err(e) => Err(MonitorError::identity_invalidated(
                self.owner,
                format!("contact lookup failed: {e}"),
            )),
        }
    }

    async fn record(&self, report: &CycleReport) {
        let mut last_run = self.last_run.write().await;
        last_run.output = Some(report.summary.clone());
        last_run.at = Some(Utc::now());
        last_run.count = report.listings_found;
    }

    async fn record_output(&self, output: String) {
        let mut last_run = self.last_run.write().await;
        last_run.output = Some(output);
        last_run.at = Some(Utc::now());
    }
}

async fn run_continuously(inner: Arc<SessionInner>, token: CancellationToken) {
    let owner = inner.owner;
    info!(
        owner,
        interval_secs = inner.settings.poll_interval.as_secs(),
        "Continuous monitoring started"
    );

    while !token.is_cancelled() {
        if let Err(e) = inner.verify_owner().await {
            warn!(owner, "Stopping continuous monitoring: {e}");
            inner.record_output(format!("Stopped: {e}")).await;
            break;
        }

        match inner.run_once().await {
            Ok(report) => info!(owner, listings = report.listings_found, "Cycle finished: {report}"),
            Err(e) if e.is_terminal() => {
                warn!(owner, "Stopping continuous monitoring: {e}");
                inner.record_output(format!("Stopped: {e}")).await;
                break;
            }
            Err(e) => warn!(owner, "Cycle failed: {e}"),
        }

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(inner.settings.poll_interval) => {}
        }
    }

    token.cancel();
    info!(owner, "Continuous monitoring loop exited");
}

struct ContinuousTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ContinuousTask {
    /// Running and not asked to stop
    fn is_alive(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

/// Monitoring state and background task of one owner
pub struct MonitorSession {
    inner: Arc<SessionInner>,
    task: Mutex<Option<ContinuousTask>>,
}

impl MonitorSession {
    /// Fresh session: empty known state, no filter, not running
    pub fn new(owner: OwnerId, deps: MonitorDeps, settings: MonitorSettings) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                owner,
                deps,
                settings,
                filter: RwLock::new(None),
                known_state: AsyncMutex::new(KnownState::new()),
                last_run: RwLock::new(LastRun::default()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.inner.owner
    }

    pub async fn set_filter(&self, payload: FilterPayload) {
        *self.inner.filter.write().await = Some(payload);
    }

    pub async fn filter(&self) -> Option<FilterPayload> {
        self.inner.filter.read().await.clone()
    }

    /// Copy of the known state; waits for an in-flight cycle to finish
    pub async fn known_state(&self) -> KnownState {
        self.inner.known_state.lock().await.clone()
    }

    /// Run a single cycle now.
    ///
    /// Fails only when no filter has been applied. Fetch and notification
    /// problems are folded into the returned report.
    pub async fn run_once(&self) -> Result<CycleReport, MonitorError> {
        self.inner.run_once().await
    }

    /// Launch the polling loop unless one is already alive.
    ///
    /// Returns as soon as the task is spawned; the first cycle runs in the
    /// background. A loop that was stopped but is still finishing its cycle
    /// is awaited first, so a session never has two loops at once.
    pub async fn start_continuous(&self) -> Result<ContinuousStatus, MonitorError> {
        if self.inner.filter.read().await.is_none() {
            return Err(MonitorError::missing_filter());
        }

        loop {
            let winding_down = {
                let mut slot = self.lock_task();
                let current = slot
                    .as_ref()
                    .map(|task| (task.is_alive(), task.handle.is_finished()));
                match current {
                    Some((true, _)) => {
                        debug!(owner = self.inner.owner, "Start requested while already running");
                        return Ok(ContinuousStatus::AlreadyRunning);
                    }
                    Some((false, false)) => slot.take(),
                    _ => {
                        let token = CancellationToken::new();
                        let handle = tokio::spawn(run_continuously(Arc::clone(&self.inner), token.clone()));
                        *slot = Some(ContinuousTask { token, handle });
                        return Ok(ContinuousStatus::Started);
                    }
                }
            };

            if let Some(task) = winding_down {
                debug!(owner = self.inner.owner, "Waiting for the stopped loop to finish its cycle");
                if let Err(e) = task.handle.await {
                    warn!(owner = self.inner.owner, "Previous monitoring loop ended abnormally: {e}");
                }
            }
        }
    }

    /// Request the polling loop to stop; never fails
    pub fn stop_continuous(&self) -> ContinuousStatus {
        if let Some(task) = self.lock_task().as_ref() {
            if !task.token.is_cancelled() {
                info!(owner = self.inner.owner, "Stop requested for continuous monitoring");
            }
            task.token.cancel();
        }
        ContinuousStatus::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.lock_task().as_ref().is_some_and(ContinuousTask::is_alive)
    }

    pub async fn status(&self) -> SessionStatus {
        let filter_applied = self.inner.filter.read().await.is_some();
        let last_run = self.inner.last_run.read().await;
        SessionStatus {
            owner: self.inner.owner,
            running: self.is_running(),
            filter_applied,
            last_output: last_run.output.clone(),
            last_run_at: last_run.at,
            last_count: last_run.count,
        }
    }

    /// Cancel the loop and hand back its join handle for awaiting
    pub(crate) fn detach_task(&self) -> Option<JoinHandle<()>> {
        self.lock_task().take().map(|task| {
            task.token.cancel();
            task.handle
        })
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<ContinuousTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        let slot = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            task.token.cancel();
        }
    }
}

impl fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorSession")
            .field("owner", &self.inner.owner)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
