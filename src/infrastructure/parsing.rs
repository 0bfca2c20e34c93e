//! HTML parsing for auction search results
//!
//! `ListingParser` turns a search response into listing records using a
//! chain of extraction strategies, from structured rows down to raw regex
//! scraping of vehicle keys.

pub mod config;
pub mod listing_parser;

pub use config::{ListingSelectors, ParsingConfig};
pub use listing_parser::{normalize_stock_number, ListingParser};

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
