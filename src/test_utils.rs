//! Test doubles for monitor collaborators
//!
//! The line extractor reads one `identity,price` pair per line so tests
//! can script search responses without writing HTML.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

use crate::application::monitor_session::MonitorDeps;
use crate::domain::repositories::AccountStore;
use crate::domain::services::{ListingExtractor, ListingFetcher, Notifier};
use crate::domain::{FilterPayload, ListingRecord, MonitorError, OwnerId, Price};

pub struct StubFetcher {
    response: Mutex<Result<String, MonitorError>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn returning(body: &str) -> Self {
        Self {
            response: Mutex::new(Ok(body.to_string())),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every fetch take `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_body(&self, body: &str) {
        *self.response.lock().unwrap() = Ok(body.to_string());
    }

    pub fn set_failure(&self, reason: &str) {
        *self.response.lock().unwrap() = Err(MonitorError::Transport(reason.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingFetcher for StubFetcher {
    async fn fetch(&self, _payload: &FilterPayload) -> Result<String, MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }
}

/// Parses `identity,price` lines; blank lines are skipped
pub struct LineExtractor;

impl ListingExtractor for LineExtractor {
    fn extract(&self, raw: &str) -> Vec<ListingRecord> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (identity, price) = line.split_once(',').unwrap_or((line, ""));
                let locator = Url::parse(&format!("https://auctions.test/VehicleDetail/{identity}~US")).unwrap();
                ListingRecord::new(identity, Price::parse(price), locator)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<String, MonitorError> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(MonitorError::Notification(reason));
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(format!("sent to {recipient}"))
    }
}

pub struct FakeAccounts {
    exists: AtomicBool,
    contact: Mutex<Option<String>>,
    fail_lookups: AtomicBool,
}

impl FakeAccounts {
    pub fn with_contact(address: &str) -> Self {
        Self {
            exists: AtomicBool::new(true),
            contact: Mutex::new(Some(address.to_string())),
            fail_lookups: AtomicBool::new(false),
        }
    }

    pub fn set_exists(&self, exists: bool) {
        self.exists.store(exists, Ordering::SeqCst);
    }

    pub fn set_contact(&self, address: Option<&str>) {
        *self.contact.lock().unwrap() = address.map(str::to_string);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for FakeAccounts {
    async fn exists(&self, _owner: OwnerId) -> Result<bool> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            bail!("account store unavailable");
        }
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn contact_of(&self, _owner: OwnerId) -> Result<Option<String>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            bail!("account store unavailable");
        }
        Ok(self.contact.lock().unwrap().clone())
    }
}

pub fn deps(fetcher: Arc<StubFetcher>, notifier: Arc<RecordingNotifier>, accounts: Arc<FakeAccounts>) -> MonitorDeps {
    MonitorDeps {
        fetcher,
        extractor: Arc::new(LineExtractor),
        notifier,
        accounts,
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
