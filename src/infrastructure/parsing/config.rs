//! Parsing configuration for search result extraction
//!
//! Each selector slot holds a list of fallbacks tried in order.

use serde::{Deserialize, Serialize};

use crate::infrastructure::config::defaults;

/// Main parsing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// Base URL for resolving relative links
    pub base_url: String,

    /// Image host used when a row carries no image
    pub image_resizer_url: String,

    /// Records kept from one response
    pub max_listings: usize,

    pub selectors: ListingSelectors,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::SEARCH_BASE_URL.to_string(),
            image_resizer_url: "https://vis.iaai.com/resizer".to_string(),
            max_listings: defaults::MAX_LISTINGS,
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors for search result rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// One element per vehicle
    pub row: Vec<String>,

    /// Title anchor carrying the detail link
    pub title_link: Vec<String>,

    /// Label cells of the key/value data list
    pub data_label: Vec<String>,

    /// Value cell that must directly follow a label
    pub data_value: Vec<String>,

    /// Action links showing Buy Now / Current Bid amounts
    pub action_link: Vec<String>,

    pub image: Vec<String>,

    /// JSON blobs embedded in the page
    pub embedded_json: Vec<String>,

    /// Hidden input holding the vehicle id list
    pub hidden_ids: Vec<String>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            row: vec![
                "div.table-row.table-row-border".to_string(),
                "div.table-row".to_string(),
            ],
            title_link: vec![
                r#"h4 a[href^="/VehicleDetail/"]"#.to_string(),
                r#"a[href*="/VehicleDetail/"]"#.to_string(),
            ],
            data_label: vec![".data-list__label".to_string()],
            data_value: vec![".data-list__value".to_string()],
            action_link: vec![
                r#"ul.data-list--action a[href^="/VehicleDetail/"]"#.to_string(),
                "ul.data-list--action a".to_string(),
            ],
            image: vec!["img[data-src]".to_string(), "img[src]".to_string()],
            embedded_json: vec![r#"script[type="application/json"]"#.to_string()],
            hidden_ids: vec!["#VehicleDetails".to_string(), r#"input[name="VehicleDetails"]"#.to_string()],
        }
    }
}
