//! Owner → monitor session directory
//!
//! Sessions live only in memory. Removing an owner stops its loop and
//! drops its known state, so a later `get_or_create` starts from scratch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::application::monitor_session::{MonitorDeps, MonitorSession, MonitorSettings};
use crate::domain::OwnerId;

pub struct SessionDirectory {
    sessions: RwLock<HashMap<OwnerId, Arc<MonitorSession>>>,
    deps: MonitorDeps,
    settings: MonitorSettings,
}

impl SessionDirectory {
    pub fn new(deps: MonitorDeps, settings: MonitorSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            deps,
            settings,
        }
    }

    /// Existing session for `owner`, or a fresh one with empty state
    pub fn get_or_create(&self, owner: OwnerId) -> Arc<MonitorSession> {
        if let Some(session) = self.get(owner) {
            return session;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.entry(owner).or_insert_with(|| {
            debug!(owner, "Creating monitor session");
            Arc::new(MonitorSession::new(owner, self.deps.clone(), self.settings.clone()))
        });
        Arc::clone(session)
    }

    pub fn get(&self, owner: OwnerId) -> Option<Arc<MonitorSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner)
            .cloned()
    }

    /// Stop and discard the owner's session; a no-op when there is none
    pub fn remove(&self, owner: OwnerId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&owner);

        match removed {
            Some(session) => {
                session.stop_continuous();
                info!(owner, "Monitor session removed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running_owners(&self) -> Vec<OwnerId> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut owners: Vec<_> = sessions
            .iter()
            .filter(|(_, session)| session.is_running())
            .map(|(owner, _)| *owner)
            .collect();
        owners.sort_unstable();
        owners
    }

    /// Stop every loop and wait for in-flight cycles to finish
    pub async fn shutdown_all(&self) {
        let handles: Vec<_> = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions.values().filter_map(|s| s.detach_task()).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Waiting for monitor loops to stop");
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Monitor loop ended abnormally: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FilterPayload;
    use crate::test_utils::{self, FakeAccounts, RecordingNotifier, StubFetcher};
    use serde_json::json;
    use std::time::Duration;

    fn directory(fetcher: Arc<StubFetcher>) -> SessionDirectory {
        let deps = test_utils::deps(
            fetcher,
            Arc::new(RecordingNotifier::new()),
            Arc::new(FakeAccounts::with_contact("owner@example.com")),
        );
        SessionDirectory::new(
            deps,
            MonitorSettings {
                poll_interval: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_session() {
        let dir = directory(Arc::new(StubFetcher::returning("")));

        let first = dir.get_or_create(1);
        let second = dir.get_or_create(1);
        let other = dir.get_or_create(2);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(dir.len(), 2);
    }

    #[tokio::test]
    async fn removed_owner_gets_a_fresh_session() {
        let dir = directory(Arc::new(StubFetcher::returning("A1,$5000")));
        let session = dir.get_or_create(1);
        session.set_filter(FilterPayload::new(json!({}))).await;
        session.run_once().await.unwrap();
        assert_eq!(session.known_state().await.len(), 1);

        assert!(dir.remove(1));

        let fresh = dir.get_or_create(1);
        assert!(fresh.known_state().await.is_empty());
        assert!(fresh.filter().await.is_none());
        assert!(!dir.remove(3));
    }

    #[tokio::test]
    async fn remove_stops_a_running_loop() {
        let dir = directory(Arc::new(StubFetcher::returning("A1,$5000")));
        let session = dir.get_or_create(1);
        session.set_filter(FilterPayload::new(json!({}))).await;
        session.start_continuous().await.unwrap();
        assert_eq!(dir.running_owners(), vec![1]);

        dir.remove(1);

        assert!(!session.is_running());
        assert!(dir.running_owners().is_empty());
    }

    #[tokio::test]
    async fn shutdown_waits_for_all_loops() {
        let fetcher = Arc::new(StubFetcher::returning("A1,$5000"));
        let dir = directory(fetcher.clone());
        for owner in [1, 2] {
            let session = dir.get_or_create(owner);
            session.set_filter(FilterPayload::new(json!({}))).await;
            session.start_continuous().await.unwrap();
        }

        dir.shutdown_all().await;

        assert!(dir.running_owners().is_empty());
        assert_eq!(dir.len(), 2);
    }
}
