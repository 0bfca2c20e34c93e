//! Listing records and price parsing
//!
//! Auction pages show prices as display text ("$1,400 USD", "Buy Now $950").
//! Prices are parsed into whole cents once, at extraction time, so the
//! change detector only ever compares numbers.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static MONEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)").unwrap());

/// Monetary amount in whole cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Parse a display price.
    ///
    /// The first `$` amount in the text wins; otherwise every digit and
    /// decimal point in the text is kept. Returns `None` when nothing
    /// numeric remains or the amount does not fit.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(captures) = MONEY_PATTERN.captures(text) {
            return Self::parse_amount(&captures[1]);
        }

        let digits: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        Self::parse_amount(&digits)
    }

    fn parse_amount(amount: &str) -> Option<Self> {
        let amount = amount.replace(',', "");
        let mut parts = amount.split('.');
        let whole = parts.next().unwrap_or_default();
        let fraction = parts.next().unwrap_or_default();
        if parts.next().is_some() || (whole.is_empty() && fraction.is_empty()) {
            return None;
        }
        if fraction.len() > 2 {
            return None;
        }

        let dollars: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };

        dollars.checked_mul(100)?.checked_add(cents).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = self.0 / 100;
        let cents = self.0 % 100;

        let digits = dollars.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        if cents == 0 {
            write!(f, "${grouped}")
        } else {
            write!(f, "${grouped}.{cents:02}")
        }
    }
}

/// One vehicle listing as extracted from a search result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Stable key used to recognise the same listing across polls
    pub identity: String,
    /// `None` when the page showed no parsable price
    pub price: Option<Price>,
    /// Detail page of the listing
    pub locator: Url,
    /// Image URL, empty when the page had none
    #[serde(rename = "mediaReference")]
    pub media_reference: String,
    pub title: Option<String>,
}

impl ListingRecord {
    pub fn new(identity: impl Into<String>, price: Option<Price>, locator: Url) -> Self {
        Self {
            identity: identity.into(),
            price,
            locator,
            media_reference: String::new(),
            title: None,
        }
    }

    #[must_use]
    pub fn with_media(mut self, media_reference: impl Into<String>) -> Self {
        self.media_reference = media_reference.into();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Price for display, "n/a" when unknown
    pub fn price_label(&self) -> String {
        self.price.map_or_else(|| "n/a".to_string(), |p| p.to_string())
    }
}
