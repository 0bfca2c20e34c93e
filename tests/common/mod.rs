//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use auction_watch::application::{
    AccountService, MonitorDeps, MonitorSettings, SessionDirectory, WatchService,
};
use auction_watch::domain::repositories::{AccountRepository, AccountStore, SavedFilterStore};
use auction_watch::domain::services::{ListingExtractor, ListingFetcher, Notifier};
use auction_watch::domain::{FilterPayload, ListingRecord, MonitorError, Price};
use auction_watch::infrastructure::{
    CredentialHasher, DatabaseConnection, SqliteAccountRepository, SqliteFilterRepository,
};

pub struct ScriptedFetcher {
    body: Mutex<String>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(body: &str) -> Self {
        Self {
            body: Mutex::new(body.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingFetcher for ScriptedFetcher {
    async fn fetch(&self, _payload: &FilterPayload) -> Result<String, MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.lock().unwrap().clone())
    }
}

/// One `identity,price` pair per line
pub struct CsvExtractor;

impl ListingExtractor for CsvExtractor {
    fn extract(&self, raw: &str) -> Vec<ListingRecord> {
        raw.lines()
            .filter_map(|line| line.trim().split_once(','))
            .map(|(identity, price)| {
                let locator = Url::parse(&format!("https://auctions.test/VehicleDetail/{identity}~US")).unwrap();
                ListingRecord::new(identity, Price::parse(price), locator)
            })
            .collect()
    }
}

#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<String, MonitorError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string()));
        Ok(format!("delivered to {recipient}"))
    }
}

pub struct TestApp {
    pub database: DatabaseConnection,
    pub accounts_repo: Arc<SqliteAccountRepository>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub outbox: Arc<Outbox>,
    pub directory: Arc<SessionDirectory>,
    pub accounts: AccountService,
    pub watch: WatchService,
}

impl TestApp {
    pub async fn new(body: &str, poll_interval: Duration) -> Self {
        let database = DatabaseConnection::in_memory().await.unwrap();
        database.migrate().await.unwrap();

        let accounts_repo = Arc::new(SqliteAccountRepository::new(database.pool().clone()));
        let filters: Arc<dyn SavedFilterStore> = Arc::new(SqliteFilterRepository::new(database.pool().clone()));
        let fetcher = Arc::new(ScriptedFetcher::new(body));
        let outbox = Arc::new(Outbox::default());

        let store: Arc<dyn AccountStore> = accounts_repo.clone();
        let deps = MonitorDeps {
            fetcher: fetcher.clone(),
            extractor: Arc::new(CsvExtractor),
            notifier: outbox.clone(),
            accounts: store,
        };
        let directory = Arc::new(SessionDirectory::new(deps, MonitorSettings { poll_interval }));

        let repository: Arc<dyn AccountRepository> = accounts_repo.clone();
        let accounts = AccountService::new(
            repository.clone(),
            Arc::new(CredentialHasher::new(4)),
            directory.clone(),
        )
        .unwrap();
        let watch = WatchService::new(repository, filters, directory.clone());

        Self {
            database,
            accounts_repo,
            fetcher,
            outbox,
            directory,
            accounts,
            watch,
        }
    }
}

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

pub fn payload() -> FilterPayload {
    FilterPayload::new(serde_json::json!({"PageSize": 100, "CurrentPage": 1}))
}
