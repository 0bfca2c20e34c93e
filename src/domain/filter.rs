//! Search filters
//!
//! The monitor treats `FilterPayload` as an opaque JSON body that is sent
//! verbatim with every search request. `FilterSettings` is the structured
//! form the presentation layer edits; it knows how to build the payload
//! shape the auction site's advanced search expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::account::OwnerId;

/// Opaque search request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPayload(Value);

impl FilterPayload {
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    pub const fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for FilterPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Saved filter configuration, scoped to one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: i64,
    #[serde(rename = "ownerId")]
    pub owner_id: OwnerId,
    pub name: String,
    pub payload: FilterPayload,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Inventory types in the order the site itself lists them
const INVENTORY_TYPES: [&str; 2] = ["Automobiles", "Motorcycles"];
/// Fuel types in the order the site itself lists them
const FUEL_TYPES: [&str; 2] = ["Electric", "Other"];

const DEFAULT_YEAR_FROM: i64 = 1900;
const DEFAULT_YEAR_TO: i64 = 2027;
const PAGE_SIZE: u32 = 100;

/// User-editable search settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
    pub min_bid: Option<i64>,
    pub max_bid: Option<i64>,
    pub odo_from: Option<i64>,
    pub odo_to: Option<i64>,
    pub inventory_types: Vec<String>,
    pub fuel_types: Vec<String>,
}

impl FilterSettings {
    /// Whether the user set anything at all
    pub fn has_any(&self) -> bool {
        [
            self.year_from,
            self.year_to,
            self.min_bid,
            self.max_bid,
            self.odo_from,
            self.odo_to,
        ]
        .iter()
        .any(Option::is_some)
            || self.inventory_types.iter().any(|t| !t.trim().is_empty())
            || self.fuel_types.iter().any(|t| !t.trim().is_empty())
    }

    /// Build the advanced-search request body.
    ///
    /// One `Searches` entry per facet value or numeric range. The auction
    /// type is always "Buy Now"; a missing year range searches all years.
    pub fn to_payload(&self) -> FilterPayload {
        let mut searches = Vec::new();

        for fuel in ordered(&FUEL_TYPES, &self.fuel_types) {
            push_facet(&mut searches, "FuelTypeDesc", fuel);
        }
        push_long_range(&mut searches, "ODOValue", self.odo_from, self.odo_to);
        push_facet(&mut searches, "AuctionType", "Buy Now");
        push_long_range(&mut searches, "MinimumBidAmount", self.min_bid, self.max_bid);
        if self.year_from.is_none() && self.year_to.is_none() {
            push_long_range(&mut searches, "Year", Some(DEFAULT_YEAR_FROM), Some(DEFAULT_YEAR_TO));
        } else {
            push_long_range(&mut searches, "Year", self.year_from, self.year_to);
        }
        for inventory in ordered(&INVENTORY_TYPES, &self.inventory_types) {
            push_facet(&mut searches, "InventoryTypes", inventory);
        }

        FilterPayload::new(json!({
            "Searches": searches,
            "ZipCode": "",
            "miles": 0,
            "PageSize": PAGE_SIZE,
            "CurrentPage": 1,
            "Sort": [{
                "IsGeoSort": false,
                "SortField": "AuctionDateTime",
                "IsDescending": false
            }],
            "ShowRecommendations": false,
            "SaleStatusFilters": [{ "SaleStatus": 1, "IsSelected": true }],
            "BidStatusFilters": [{ "BidStatus": 6, "IsSelected": true }]
        }))
    }
}

fn ordered<'a>(known: &'a [&'a str], selected: &[String]) -> impl Iterator<Item = &'a str> {
    let selected: Vec<String> = selected.iter().map(|s| s.trim().to_lowercase()).collect();
    known
        .iter()
        .copied()
        .filter(move |k| selected.iter().any(|s| s == &k.to_lowercase()))
}

fn push_facet(searches: &mut Vec<Value>, group: &str, value: &str) {
    searches.push(json!({
        "Facets": [{ "Group": group, "Value": value }],
        "FullSearch": null,
        "LongRanges": null
    }));
}

fn push_long_range(searches: &mut Vec<Value>, name: &str, from: Option<i64>, to: Option<i64>) {
    if from.is_none() && to.is_none() {
        return;
    }
    let from_value = from.unwrap_or(0);
    let to_value = to.or(from).unwrap_or(0);
    searches.push(json!({
        "Facets": null,
        "FullSearch": null,
        "LongRanges": [{ "From": from_value, "Name": name, "To": to_value }]
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_names(payload: &FilterPayload) -> Vec<String> {
        payload.as_json()["Searches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| {
                if s["Facets"].is_array() {
                    format!("{}={}", s["Facets"][0]["Group"].as_str().unwrap(), s["Facets"][0]["Value"].as_str().unwrap())
                } else {
                    s["LongRanges"][0]["Name"].as_str().unwrap().to_string()
                }
            })
            .collect()
    }

    #[test]
    fn empty_settings_search_all_years_buy_now() {
        let settings = FilterSettings::default();
        assert!(!settings.has_any());

        let payload = settings.to_payload();
        assert_eq!(search_names(&payload), ["AuctionType=Buy Now", "Year"]);
        let year = &payload.as_json()["Searches"][1]["LongRanges"][0];
        assert_eq!(year["From"], 1900);
        assert_eq!(year["To"], 2027);
        assert_eq!(payload.as_json()["PageSize"], 100);
    }

    #[test]
    fn entries_follow_site_order() {
        let settings = FilterSettings {
            year_from: Some(2020),
            year_to: Some(2026),
            max_bid: Some(1500),
            odo_to: Some(50_000),
            inventory_types: vec!["motorcycles".into(), "Automobiles".into()],
            fuel_types: vec!["Other".into(), "Electric".into(), "Diesel".into()],
            ..FilterSettings::default()
        };
        assert!(settings.has_any());

        assert_eq!(
            search_names(&settings.to_payload()),
            [
                "FuelTypeDesc=Electric",
                "FuelTypeDesc=Other",
                "ODOValue",
                "AuctionType=Buy Now",
                "MinimumBidAmount",
                "Year",
                "InventoryTypes=Automobiles",
                "InventoryTypes=Motorcycles",
            ]
        );
    }

    #[test]
    fn open_ended_range_fills_missing_bound() {
        let settings = FilterSettings {
            min_bid: Some(500),
            ..FilterSettings::default()
        };
        let payload = settings.to_payload();
        let bid = payload.as_json()["Searches"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["LongRanges"][0]["Name"] == "MinimumBidAmount")
            .unwrap()
            .clone();
        assert_eq!(bid["LongRanges"][0]["From"], 500);
        assert_eq!(bid["LongRanges"][0]["To"], 500);
    }

    #[test]
    fn payload_round_trips_as_plain_json() {
        let payload = FilterPayload::new(json!({"PageSize": 100}));
        let text = serde_json::to_string(&payload).unwrap();
        assert_eq!(text, r#"{"PageSize":100}"#);
    }
}
