//! Auction Watch - auction search monitoring
//!
//! Polls an auction site's search endpoint on behalf of registered owners,
//! detects new listings and price drops against what each owner has already
//! seen, and mails them a summary.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cli::run;
