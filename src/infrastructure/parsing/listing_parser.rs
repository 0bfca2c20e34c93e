//! Search result parser
//!
//! Strategies, tried in order until one yields records:
//! 1. structured result rows (title, stock number, price, image)
//! 2. JSON blobs embedded in `<script type="application/json">`
//! 3. the hidden vehicle id list
//! 4. vehicle keys scraped from image and detail URLs
//!
//! A record's identity is its normalised stock number when one is known,
//! otherwise its absolute detail link.

use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::config::ParsingConfig;
use super::{ParsingError, ParsingResult};
use crate::domain::services::ListingExtractor;
use crate::domain::{ListingRecord, Price};

static DETAIL_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/VehicleDetail/([A-Za-z0-9]+)~US").unwrap());
static IMAGE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"imageKeys=([A-Za-z0-9]+)~SID~I1").unwrap());
static TAGGED_STOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Stock\s*#\s*[:\-]?\s*(\d{5,})").unwrap());
static PRICE_ACTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)buy\s+now|current\s+bid|bid").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const STOCK_LABEL: &str = "Stock #:";
const MIN_STOCK_DIGITS: usize = 5;

const STOCK_KEYS: &[&str] = &[
    "stockNumber", "StockNumber", "stockNo", "StockNo", "stockNum", "StockNum",
    "stockNbr", "StockNbr", "stock_number", "stock", "Stock",
];
const LABELLED_STOCK_KEYS: &[&str] = &[
    "stockLabel", "StockLabel", "displayStock", "DisplayStock",
    "vehicleDescription", "VehicleDescription", "title", "Title",
];
const PRICE_KEYS: &[&str] = &["price", "Price", "buyNowPrice", "BuyNowPrice", "currentBid", "CurrentBid"];

/// Digits-only stock number, or `None` when fewer than five digits remain.
///
/// A labelled form such as `Stock #: 31234567` inside longer text wins over
/// collecting every digit.
pub fn normalize_stock_number(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(captures) = TAGGED_STOCK.captures(value) {
        return Some(captures[1].to_string());
    }

    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= MIN_STOCK_DIGITS).then_some(digits)
}

struct CompiledSelectors {
    row: Vec<Selector>,
    title_link: Vec<Selector>,
    data_label: Vec<Selector>,
    data_value: Vec<Selector>,
    action_link: Vec<Selector>,
    image: Vec<Selector>,
    embedded_json: Vec<Selector>,
    hidden_ids: Vec<Selector>,
}

/// Extracts listing records from a search response
pub struct ListingParser {
    base_url: Url,
    image_resizer_url: String,
    max_listings: usize,
    selectors: CompiledSelectors,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL: {}", config.base_url))?;
        let s = &config.selectors;

        Ok(Self {
            base_url,
            image_resizer_url: config.image_resizer_url.clone(),
            max_listings: config.max_listings.max(1),
            selectors: CompiledSelectors {
                row: Self::compile_selectors(&s.row)?,
                title_link: Self::compile_selectors(&s.title_link)?,
                data_label: Self::compile_selectors(&s.data_label)?,
                data_value: Self::compile_selectors(&s.data_value)?,
                action_link: Self::compile_selectors(&s.action_link)?,
                image: Self::compile_selectors(&s.image)?,
                embedded_json: Self::compile_selectors(&s.embedded_json)?,
                hidden_ids: Self::compile_selectors(&s.hidden_ids)?,
            },
        })
    }

    /// Compile fallbacks, keeping the ones that parse
    fn compile_selectors(selector_strings: &[String]) -> Result<Vec<Selector>> {
        let mut selectors = Vec::new();
        let mut errors = Vec::new();

        for selector_str in selector_strings {
            match Selector::parse(selector_str) {
                Ok(selector) => selectors.push(selector),
                Err(e) => {
                    let error = ParsingError::invalid_selector(selector_str, &e.to_string());
                    warn!("{error}");
                    errors.push(error.to_string());
                }
            }
        }

        if selectors.is_empty() {
            return Err(anyhow!("No valid selectors compiled. Errors: {}", errors.join(", ")));
        }
        Ok(selectors)
    }

    pub fn extract_from_rows(&self, html: &Html) -> Vec<ListingRecord> {
        for row_selector in &self.selectors.row {
            let rows: Vec<ElementRef<'_>> = html.select(row_selector).collect();
            if rows.is_empty() {
                continue;
            }

            let mut seen = HashSet::new();
            let mut records = Vec::new();
            for (index, row) in rows.into_iter().enumerate() {
                match self.parse_row(row) {
                    Ok(record) => {
                        if seen.insert(record.locator.to_string()) {
                            records.push(record);
                        }
                    }
                    Err(e) => debug!("Skipping result row {index}: {e}"),
                }
                if records.len() >= self.max_listings {
                    break;
                }
            }
            if !records.is_empty() {
                return records;
            }
        }
        Vec::new()
    }

    fn parse_row(&self, row: ElementRef<'_>) -> ParsingResult<ListingRecord> {
        let title_link = first_in(row, &self.selectors.title_link)
            .ok_or_else(|| ParsingError::required_field("detail link"))?;
        let href = title_link
            .value()
            .attr("href")
            .ok_or_else(|| ParsingError::required_field_with_context("href", "title link"))?;
        let locator = self.resolve(href)?;
        let key = vehicle_key(locator.as_str());

        let title = Some(text_of(title_link)).filter(|t| !t.is_empty());
        let stock = self
            .labelled_value(row, STOCK_LABEL)
            .and_then(|v| normalize_stock_number(&v));

        let price = self
            .selectors
            .action_link
            .iter()
            .flat_map(|selector| row.select(selector))
            .map(text_of)
            .find(|text| PRICE_ACTION.is_match(text))
            .and_then(|text| Price::parse(&text));

        let image = first_in(row, &self.selectors.image)
            .and_then(|img| img.value().attr("data-src").or_else(|| img.value().attr("src")))
            .filter(|src| !src.trim().is_empty())
            .and_then(|src| self.resolve(src).ok())
            .map(|url| url.to_string())
            .or_else(|| key.as_deref().map(|k| self.resizer_image(k)))
            .unwrap_or_default();

        let identity = stock.unwrap_or_else(|| locator.to_string());
        let mut record = ListingRecord::new(identity, price, locator).with_media(image);
        if let Some(title) = title {
            record = record.with_title(title);
        }
        Ok(record)
    }

    /// Text of the value cell directly after the label reading `label`
    fn labelled_value(&self, row: ElementRef<'_>, label: &str) -> Option<String> {
        let cell = self
            .selectors
            .data_label
            .iter()
            .flat_map(|selector| row.select(selector))
            .find(|cell| text_of(*cell).eq_ignore_ascii_case(label))?;

        let next = cell.next_siblings().find_map(ElementRef::wrap)?;
        if !self.selectors.data_value.iter().any(|s| s.matches(&next)) {
            return None;
        }
        Some(text_of(next)).filter(|v| !v.is_empty())
    }

    pub fn extract_from_embedded_json(&self, html: &Html) -> Vec<ListingRecord> {
        let mut vehicles = Vec::new();
        let blocks = self
            .selectors
            .embedded_json
            .iter()
            .flat_map(|selector| html.select(selector));

        for (index, block) in blocks.enumerate() {
            let text: String = block.text().collect();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(text) {
                Ok(value) => collect_embedded(&value, &mut vehicles),
                Err(e) => debug!(
                    "{}",
                    ParsingError::InvalidJson {
                        index,
                        reason: e.to_string()
                    }
                ),
            }
        }

        let mut seen = HashSet::new();
        vehicles
            .into_iter()
            .filter(|v| seen.insert(v.key.clone()))
            .filter_map(|v| self.record_for_key(&v.key, v.stock, v.price))
            .take(self.max_listings)
            .collect()
    }

    pub fn extract_from_hidden_ids(&self, html: &Html) -> Vec<ListingRecord> {
        let Some(raw) = self
            .selectors
            .hidden_ids
            .iter()
            .find_map(|selector| html.select(selector).next())
            .and_then(|input| input.value().attr("value"))
        else {
            return Vec::new();
        };

        let entries: Vec<Value> = match serde_json::from_str(raw) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Hidden vehicle id list is not a JSON array: {e}");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        entries
            .iter()
            .filter_map(|entry| entry.get("Id").and_then(Value::as_str))
            .filter_map(|id| id.split('~').next())
            .map(str::trim)
            .filter(|key| !key.is_empty() && seen.insert(key.to_string()))
            .filter_map(|key| self.record_for_key(key, None, None))
            .take(self.max_listings)
            .collect()
    }

    /// Last resort: vehicle keys from image resizer and detail URLs
    pub fn extract_from_keys(&self, raw: &str) -> Vec<ListingRecord> {
        let mut seen = HashSet::new();
        IMAGE_KEY
            .captures_iter(raw)
            .chain(DETAIL_KEY.captures_iter(raw))
            .filter_map(|captures| captures.get(1).map(|m| m.as_str()))
            .filter(|key| seen.insert(key.to_string()))
            .filter_map(|key| self.record_for_key(key, None, None))
            .take(self.max_listings)
            .collect()
    }

    fn record_for_key(&self, key: &str, stock: Option<String>, price: Option<Price>) -> Option<ListingRecord> {
        let locator = match self.detail_url(key) {
            Ok(url) => url,
            Err(e) => {
                debug!("{e}");
                return None;
            }
        };
        let identity = stock.unwrap_or_else(|| locator.to_string());
        Some(ListingRecord::new(identity, price, locator).with_media(self.resizer_image(key)))
    }

    fn detail_url(&self, key: &str) -> ParsingResult<Url> {
        self.resolve(&format!("/VehicleDetail/{key}~US"))
    }

    fn resizer_image(&self, key: &str) -> String {
        format!(
            "{}?imageKeys={key}~SID~I1&width=400&height=300",
            self.image_resizer_url
        )
    }

    fn resolve(&self, href: &str) -> ParsingResult<Url> {
        self.base_url
            .join(href.trim())
            .map_err(|e| ParsingError::url_resolution_failed(href, &e.to_string()))
    }
}

impl ListingExtractor for ListingParser {
    fn extract(&self, raw: &str) -> Vec<ListingRecord> {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        let html = Html::parse_document(raw);

        let records = self.extract_from_rows(&html);
        if !records.is_empty() {
            debug!("Extracted {} listings from result rows", records.len());
            return records;
        }

        let records = self.extract_from_embedded_json(&html);
        if !records.is_empty() {
            debug!("Extracted {} listings from embedded JSON", records.len());
            return records;
        }

        let records = self.extract_from_hidden_ids(&html);
        if !records.is_empty() {
            debug!("Extracted {} listings from hidden id list", records.len());
            return records;
        }

        let records = self.extract_from_keys(raw);
        debug!("Extracted {} listings from vehicle keys", records.len());
        records
    }
}

struct EmbeddedVehicle {
    key: String,
    stock: Option<String>,
    price: Option<Price>,
}

fn collect_embedded(node: &Value, out: &mut Vec<EmbeddedVehicle>) {
    match node {
        Value::Array(items) => items.iter().for_each(|item| collect_embedded(item, out)),
        Value::Object(map) => {
            let name = map
                .get("name")
                .filter(|v| !v.is_null())
                .or_else(|| map.get("Name"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty());

            if let Some(key) = name {
                let stock = first_value(map, STOCK_KEYS)
                    .and_then(|v| normalize_stock_number(&v))
                    .or_else(|| first_value(map, LABELLED_STOCK_KEYS).and_then(|v| normalize_stock_number(&v)));
                out.push(EmbeddedVehicle {
                    key: key.to_string(),
                    stock,
                    price: first_value(map, PRICE_KEYS).and_then(|v| Price::parse(&v)),
                });
            }

            map.values().for_each(|value| collect_embedded(value, out));
        }
        _ => {}
    }
}

/// First non-null value among `keys`, rendered as text
fn first_value(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

fn first_in<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|selector| scope.select(selector).next())
}

fn text_of(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn vehicle_key(link: &str) -> Option<String> {
    DETAIL_KEY.captures(link).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RESULT_ROWS: &str = r#"
        <html><body>
        <div class="table-row table-row-border">
          <h4 class="heading-7"><a href="/VehicleDetail/41234567~US">2019 Toyota   Camry</a></h4>
          <ul class="data-list">
            <li><span class="data-list__label">Stock #:</span>
                <span class="data-list__value">31234567</span></li>
          </ul>
          <ul class="data-list data-list--action">
            <li><a href="/VehicleDetail/41234567~US">Watch</a></li>
            <li><a href="/VehicleDetail/41234567~US">Buy Now $5,000</a></li>
          </ul>
          <img data-src="https://vis.iaai.com/resizer?imageKeys=41234567~SID~I1&amp;width=161" />
        </div>
        <div class="table-row table-row-border">
          <h4><a href="/VehicleDetail/41234568~US">2015 Honda Civic</a></h4>
          <ul class="data-list data-list--action">
            <li><a href="/VehicleDetail/41234568~US">Current Bid</a></li>
          </ul>
        </div>
        <div class="table-row table-row-border">
          <h4><a href="/VehicleDetail/41234568~US">2015 Honda Civic</a></h4>
        </div>
        <div class="table-row table-row-border"><p>advert</p></div>
        </body></html>
    "#;

    fn parser() -> ListingParser {
        ListingParser::new().unwrap()
    }

    #[rstest]
    #[case("31234567", Some("31234567"))]
    #[case("Stock #: 31234567", Some("31234567"))]
    #[case("2019 Camry Stock# - 30011223 (Run & Drive)", Some("30011223"))]
    #[case("31-234", Some("31234"))]
    #[case("1234", None)]
    #[case("   ", None)]
    fn normalizes_stock_numbers(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_stock_number(input).as_deref(), expected);
    }

    #[test]
    fn result_rows_yield_full_records() {
        let records = parser().extract(RESULT_ROWS);

        assert_eq!(records.len(), 2);
        let camry = &records[0];
        assert_eq!(camry.identity, "31234567");
        assert_eq!(camry.price, Some(Price::from_dollars(5000)));
        assert_eq!(camry.title.as_deref(), Some("2019 Toyota Camry"));
        assert_eq!(camry.locator.as_str(), "https://www.iaai.com/VehicleDetail/41234567~US");
        assert_eq!(
            camry.media_reference,
            "https://vis.iaai.com/resizer?imageKeys=41234567~SID~I1&width=161"
        );
    }

    #[test]
    fn row_without_stock_falls_back_to_link_and_resizer() {
        let records = parser().extract(RESULT_ROWS);

        let civic = &records[1];
        assert_eq!(civic.identity, "https://www.iaai.com/VehicleDetail/41234568~US");
        assert_eq!(civic.price, None);
        assert_eq!(
            civic.media_reference,
            "https://vis.iaai.com/resizer?imageKeys=41234568~SID~I1&width=400&height=300"
        );
    }

    #[test]
    fn embedded_json_is_walked_recursively() {
        let html = r#"
            <script type="application/json">not json</script>
            <script type="application/json">
              {"results": {"items": [
                {"Name": "41000001", "StockNumber": "31000001", "BuyNowPrice": 1500},
                {"name": "41000002", "title": "Stock #: 31000002", "price": null},
                {"Name": "41000001", "StockNumber": "31000001"}
              ]}}
            </script>"#;

        let records = parser().extract(html);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identity, "31000001");
        assert_eq!(records[0].price, Some(Price::from_dollars(1500)));
        assert_eq!(records[1].identity, "31000002");
        assert_eq!(records[1].price, None);
        assert_eq!(records[1].locator.as_str(), "https://www.iaai.com/VehicleDetail/41000002~US");
    }

    #[test]
    fn hidden_id_list_is_used_when_nothing_else_matches() {
        let html = r#"<input type="hidden" id="VehicleDetails"
            value="[{&quot;Id&quot;:&quot;44226123~US&quot;},{&quot;Id&quot;:&quot;44226124~US&quot;}]">"#;

        let records = parser().extract(html);

        let identities: Vec<_> = records.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(
            identities,
            [
                "https://www.iaai.com/VehicleDetail/44226123~US",
                "https://www.iaai.com/VehicleDetail/44226124~US"
            ]
        );
    }

    #[test]
    fn vehicle_keys_are_the_last_resort() {
        let html = r#"<div><span data-img="imageKeys=A1B2C3~SID~I1"></span>
            <span>/VehicleDetail/44226124~US</span><span>/VehicleDetail/A1B2C3~US</span></div>"#;

        let records = parser().extract(html);

        assert_eq!(records.len(), 2);
        assert!(records[0].identity.ends_with("/VehicleDetail/A1B2C3~US"));
        assert!(records[1].identity.ends_with("/VehicleDetail/44226124~US"));
    }

    #[test]
    fn markup_without_listings_yields_nothing() {
        assert!(parser().extract("").is_empty());
        assert!(parser().extract("<html><body><p>No results</p></body></html>").is_empty());
        assert!(parser().extract("{ definitely not html").is_empty());
    }

    #[test]
    fn listing_limit_is_respected() {
        let config = ParsingConfig {
            max_listings: 3,
            ..ParsingConfig::default()
        };
        let parser = ListingParser::with_config(&config).unwrap();
        let html: String = (0..10)
            .map(|i| format!("<a href=\"/VehicleDetail/4400000{i}~US\">car</a>"))
            .collect();

        assert_eq!(parser.extract(&html).len(), 3);
    }

    #[test]
    fn broken_selectors_are_rejected() {
        let mut config = ParsingConfig::default();
        config.selectors.row = vec!["div[".to_string()];
        assert!(ListingParser::with_config(&config).is_err());
    }
}
