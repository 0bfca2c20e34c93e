//! Domain module - Core listing model and change detection
//!
//! This module contains the listing entities, the pure change detector,
//! filter payloads, and the contracts of the collaborators the monitor
//! depends on (search fetcher, HTML extractor, notifier, stores).
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod account;
pub mod change_detector;
pub mod errors;
pub mod filter;
pub mod listing;
pub mod repositories;
pub mod services;

// Re-export commonly used items for convenience
pub use account::{Account, OwnerId};
pub use change_detector::{detect, Detection, KnownState, PriceDrop};
pub use errors::MonitorError;
pub use filter::{FilterPayload, FilterSettings, SavedFilter};
pub use listing::{ListingRecord, Price};
