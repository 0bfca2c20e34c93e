//! Application layer module
//!
//! Stateful services that orchestrate the domain: per-owner monitor
//! sessions, the session directory, and the account and watch facades
//! driven by the presentation layer.

pub mod account_service;
pub mod messages;
pub mod monitor_session;
pub mod session_directory;
pub mod state;
pub mod watch_service;

pub use account_service::{AccountError, AccountService, SignedIn};
pub use monitor_session::{
    ContinuousStatus, CycleReport, MonitorDeps, MonitorSession, MonitorSettings, SessionStatus,
};
pub use session_directory::SessionDirectory;
pub use state::AppContext;
pub use watch_service::WatchService;
