//! Change detection between polling cycles
//!
//! `detect` is a pure function: it never mutates the state it is given and
//! never fails. The caller swaps in `Detection::updated_state` once the
//! cycle has completed.

use std::collections::HashMap;

use serde::Serialize;

use super::listing::{ListingRecord, Price};

/// Latest observation per listing identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownState {
    entries: HashMap<String, ListingRecord>,
}

impl KnownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&ListingRecord> {
        self.entries.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListingRecord> {
        self.entries.values()
    }

    fn observe(&mut self, record: ListingRecord) {
        self.entries.insert(record.identity.clone(), record);
    }
}

impl FromIterator<ListingRecord> for KnownState {
    fn from_iter<I: IntoIterator<Item = ListingRecord>>(iter: I) -> Self {
        let mut state = Self::new();
        for record in iter {
            state.observe(record);
        }
        state
    }
}

/// A listing whose price went down since the previous observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceDrop {
    pub record: ListingRecord,
    #[serde(rename = "oldPrice")]
    pub old_price: Price,
    #[serde(rename = "newPrice")]
    pub new_price: Price,
}

/// Result of comparing one fetch against the known state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub new_listings: Vec<ListingRecord>,
    pub price_drops: Vec<PriceDrop>,
    pub updated_state: KnownState,
}

impl Detection {
    pub fn has_changes(&self) -> bool {
        !self.new_listings.is_empty() || !self.price_drops.is_empty()
    }
}

/// Diff a fresh fetch against the known state.
///
/// Records are visited in fetch order, so both output buckets keep the
/// page's display order. Each record is compared with the state as already
/// updated by earlier records of the same fetch; a listing repeated within
/// one page is therefore reported at most once. Listings missing from
/// `current` stay in the state untouched.
///
/// A record without a parsable price never produces a price drop and keeps
/// the previously known price in the updated state.
pub fn detect(known: &KnownState, current: &[ListingRecord]) -> Detection {
    let mut updated_state = known.clone();
    let mut new_listings = Vec::new();
    let mut price_drops = Vec::new();

    for record in current {
        let previous_price = updated_state
            .get(&record.identity)
            .map(|previous| previous.price);

        match (previous_price, record.price) {
            (None, _) => new_listings.push(record.clone()),
            (Some(Some(old_price)), Some(new_price)) if new_price < old_price => {
                price_drops.push(PriceDrop {
                    record: record.clone(),
                    old_price,
                    new_price,
                });
            }
            _ => {}
        }

        let mut next = record.clone();
        if next.price.is_none() {
            next.price = previous_price.flatten();
        }
        updated_state.observe(next);
    }

    Detection {
        new_listings,
        price_drops,
        updated_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use url::Url;

    fn listing(identity: &str, dollars: Option<u64>) -> ListingRecord {
        let locator = Url::parse(&format!("https://www.iaai.com/VehicleDetail/{identity}~US")).unwrap();
        ListingRecord::new(identity, dollars.map(Price::from_dollars), locator)
    }

    #[test]
    fn unseen_listing_is_new() {
        let detection = detect(&KnownState::new(), &[listing("A1", Some(5000))]);

        assert_eq!(detection.new_listings, vec![listing("A1", Some(5000))]);
        assert!(detection.price_drops.is_empty());
        assert_eq!(
            detection.updated_state.get("A1").and_then(|r| r.price),
            Some(Price::from_dollars(5000))
        );
    }

    #[test]
    fn lower_price_is_a_drop() {
        let known: KnownState = [listing("A1", Some(5000))].into_iter().collect();
        let detection = detect(&known, &[listing("A1", Some(4500))]);

        assert!(detection.new_listings.is_empty());
        assert_eq!(detection.price_drops.len(), 1);
        let drop = &detection.price_drops[0];
        assert_eq!(drop.old_price, Price::from_dollars(5000));
        assert_eq!(drop.new_price, Price::from_dollars(4500));
        assert_eq!(drop.record.identity, "A1");
    }

    #[test]
    fn unchanged_price_reports_nothing() {
        let known: KnownState = [listing("A1", Some(5000))].into_iter().collect();
        let detection = detect(&known, &[listing("A1", Some(5000))]);

        assert!(!detection.has_changes());
        assert_eq!(detection.updated_state, known);
    }

    #[test]
    fn price_increase_is_recorded_but_not_reported() {
        let known: KnownState = [listing("A1", Some(4000))].into_iter().collect();
        let detection = detect(&known, &[listing("A1", Some(5000))]);

        assert!(!detection.has_changes());
        assert_eq!(
            detection.updated_state.get("A1").and_then(|r| r.price),
            Some(Price::from_dollars(5000))
        );
    }

    #[test]
    fn unparsable_price_keeps_previous_value() {
        let known: KnownState = [listing("A1", Some(5000))].into_iter().collect();
        let detection = detect(&known, &[listing("A1", None)]);

        assert!(!detection.has_changes());
        assert_eq!(
            detection.updated_state.get("A1").and_then(|r| r.price),
            Some(Price::from_dollars(5000))
        );
    }

    #[test]
    fn new_listing_without_price_is_still_new() {
        let detection = detect(&KnownState::new(), &[listing("A1", None)]);
        assert_eq!(detection.new_listings.len(), 1);
        assert!(detection.updated_state.contains("A1"));
    }

    #[test]
    fn absent_listings_are_kept() {
        let known: KnownState = [listing("A1", Some(5000)), listing("B2", Some(7000))]
            .into_iter()
            .collect();
        let detection = detect(&known, &[listing("A1", Some(5000))]);

        assert!(!detection.has_changes());
        assert!(detection.updated_state.contains("B2"));
    }

    #[test]
    fn buckets_preserve_fetch_order() {
        let known: KnownState = [listing("D", Some(900)), listing("B", Some(900))]
            .into_iter()
            .collect();
        let current = [
            listing("C", Some(100)),
            listing("D", Some(800)),
            listing("A", Some(100)),
            listing("B", Some(700)),
        ];
        let detection = detect(&known, &current);

        let new_ids: Vec<_> = detection.new_listings.iter().map(|r| r.identity.as_str()).collect();
        let drop_ids: Vec<_> = detection.price_drops.iter().map(|d| d.record.identity.as_str()).collect();
        assert_eq!(new_ids, ["C", "A"]);
        assert_eq!(drop_ids, ["D", "B"]);
    }

    #[test]
    fn duplicate_in_one_fetch_is_new_once() {
        let current = [listing("A1", Some(5000)), listing("A1", Some(5000))];
        let detection = detect(&KnownState::new(), &current);
        assert_eq!(detection.new_listings.len(), 1);
        assert_eq!(detection.updated_state.len(), 1);
    }

    fn arb_listing() -> impl Strategy<Value = ListingRecord> {
        ("[A-F][0-9]", proptest::option::of(0u64..20_000))
            .prop_map(|(identity, dollars)| listing(&identity, dollars))
    }

    fn arb_state() -> impl Strategy<Value = KnownState> {
        proptest::collection::vec(arb_listing(), 0..12).prop_map(|records| records.into_iter().collect())
    }

    proptest! {
        #[test]
        fn every_fetched_identity_lands_in_updated_state(
            known in arb_state(),
            current in proptest::collection::vec(arb_listing(), 0..12),
        ) {
            let detection = detect(&known, &current);
            for record in &current {
                let stored = detection.updated_state.get(&record.identity);
                prop_assert!(stored.is_some());
                let stored = stored.unwrap();
                prop_assert_eq!(&stored.locator, &record.locator);
                if record.price.is_some() {
                    // the last occurrence of an identity wins
                    let last = current.iter().rev().find(|r| r.identity == record.identity).unwrap();
                    if last.price.is_some() {
                        prop_assert_eq!(stored.price, last.price);
                    }
                }
            }
        }

        #[test]
        fn detection_is_deterministic(
            known in arb_state(),
            current in proptest::collection::vec(arb_listing(), 0..12),
        ) {
            let first = detect(&known, &current);
            let second = detect(&known, &current);
            prop_assert_eq!(first.new_listings, second.new_listings);
            prop_assert_eq!(first.price_drops, second.price_drops);
        }

        #[test]
        fn known_state_never_shrinks(
            known in arb_state(),
            current in proptest::collection::vec(arb_listing(), 0..12),
        ) {
            let detection = detect(&known, &current);
            prop_assert!(detection.updated_state.len() >= known.len());
        }
    }
}
