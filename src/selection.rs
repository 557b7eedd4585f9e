// Working selection of scanned items
// Copy-on-write: every mutation builds a new Selection, the old one is never touched

use crate::db::InventoryRecord;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered list of scanned records; duplicates allowed, identity is position
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    entries: Arc<[InventoryRecord]>,
}

impl Default for Selection {
    fn default() -> Self {
        Selection::from_records(Vec::new())
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<InventoryRecord>) -> Self {
        Selection {
            entries: records.into(),
        }
    }

    pub fn entries(&self) -> &[InventoryRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InventoryRecord> {
        self.entries.get(index)
    }

    pub fn appended(&self, record: InventoryRecord) -> Selection {
        let mut next = Vec::with_capacity(self.entries.len() + 1);
        next.extend_from_slice(&self.entries);
        next.push(record);
        Selection::from_records(next)
    }

    /// New selection without the entry at `index`, or `None` when out of range
    pub fn removed(&self, index: usize) -> Option<Selection> {
        if index >= self.entries.len() {
            return None;
        }
        let mut next = self.entries.to_vec();
        next.remove(index);
        Some(Selection::from_records(next))
    }

    pub fn totals(&self) -> SelectionTotals {
        SelectionTotals::of(&self.entries)
    }
}

/// Running totals over a selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionTotals {
    pub count: usize,
    pub total_quantity: i64,
    pub total_area: f64,
}

impl SelectionTotals {
    pub fn of(records: &[InventoryRecord]) -> Self {
        records.iter().fold(SelectionTotals::default(), |acc, r| SelectionTotals {
            count: acc.count + 1,
            total_quantity: acc.total_quantity.saturating_add(r.quantity),
            total_area: acc.total_area + r.area_square_meters,
        })
    }

    /// Total area with two decimals, as shown to the operator
    pub fn display_area(&self) -> String {
        format!("{:.2}", self.total_area)
    }
}

/// First record whose barcode equals the trimmed code, ignoring case
pub fn lookup<'a>(records: &'a [InventoryRecord], code: &str) -> Option<&'a InventoryRecord> {
    let query = code.trim();
    if query.is_empty() {
        return None;
    }
    records.iter().find(|r| r.matches_code(query))
}

/// Whole-number quantity typed by the operator, limited to the 32-bit range
pub fn parse_quantity(text: &str) -> Result<i64> {
    text.trim()
        .parse::<i32>()
        .map(i64::from)
        .map_err(|_| Error::InvalidQuantity(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(barcode: &str, qty: i64, area: f64) -> InventoryRecord {
        InventoryRecord::new("P", barcode, 1, 1, qty, area)
    }

    fn batch() -> Vec<InventoryRecord> {
        vec![
            InventoryRecord::new("Granite A", "SF001", 90, 300, 1, 2.5),
            InventoryRecord::new("Granite B", "sf001", 60, 120, 4, 1.0),
            InventoryRecord::new("Marble", "MB-7", 30, 30, 2, 0.5),
        ]
    }

    #[test]
    fn test_lookup_case_insensitive_and_trimmed() {
        let records = batch();

        let upper = lookup(&records, "SF001").unwrap();
        let lower = lookup(&records, "sf001 ").unwrap();

        assert_eq!(upper, lower);
        // first match wins
        assert_eq!(upper.product_name, "Granite A");
    }

    #[test]
    fn test_lookup_is_exact() {
        let records = batch();

        assert!(lookup(&records, "SF00").is_none());
        assert!(lookup(&records, "MB-77").is_none());
        assert!(lookup(&records, "   ").is_none());
    }

    #[test]
    fn test_append_then_totals_counts_once() {
        let selection = Selection::new().appended(record("A", 3, 1.25));
        let totals = selection.totals();

        assert_eq!(totals.count, 1);
        assert_eq!(totals.total_quantity, 3);
        assert_eq!(totals.total_area, 1.25);
        assert_eq!(totals.display_area(), "1.25");
    }

    #[test]
    fn test_duplicates_are_separate_entries() {
        let selection = Selection::new()
            .appended(record("A", 1, 1.0))
            .appended(record("A", 1, 1.0));

        assert_eq!(selection.len(), 2);
        assert_eq!(selection.totals().total_quantity, 2);
    }

    #[test]
    fn test_removed_leaves_original_untouched() {
        let original = Selection::from_records(vec![record("A", 1, 1.0), record("B", 2, 2.0)]);
        let next = original.removed(0).unwrap();

        assert_eq!(original.len(), 2);
        assert_eq!(next.entries(), &[record("B", 2, 2.0)]);
    }

    #[test]
    fn test_display_area_rounds_to_two_places() {
        let totals = SelectionTotals::of(&[record("A", 1, 0.125), record("B", 1, 1.0 / 3.0)]);

        assert_eq!(totals.display_area(), "0.46");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 4 ").unwrap(), 4);
        assert!(matches!(parse_quantity("four"), Err(Error::InvalidQuantity(_))));
        assert!(matches!(parse_quantity(""), Err(Error::InvalidQuantity(_))));
        assert_eq!(parse_quantity("-2147483648").unwrap(), i32::MIN as i64);
        assert!(matches!(parse_quantity("2147483648"), Err(Error::InvalidQuantity(_))));
        assert!(matches!(
            parse_quantity("9223372036854775807"),
            Err(Error::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let selection = Selection::new()
            .appended(record("A", i64::MAX, 1.0))
            .appended(record("B", 5, 1.0));

        let totals = selection.totals();

        assert_eq!(totals.count, 2);
        assert_eq!(totals.total_quantity, i64::MAX);
        assert_eq!(totals.display_area(), "2.00");
    }

    proptest! {
        /// Property: out-of-range removal never changes the selection
        #[test]
        fn out_of_range_removal_is_rejected(len in 0usize..10, extra in 0usize..100) {
            let selection = Selection::from_records(
                (0..len).map(|i| record(&format!("B{}", i), i as i64, 1.0)).collect(),
            );

            prop_assert!(selection.removed(len + extra).is_none());
            prop_assert_eq!(selection.len(), len);
        }

        /// Property: totals equal the plain sums over the entries
        #[test]
        fn totals_match_sums(qtys in prop::collection::vec(0i64..1000, 0..30)) {
            let selection = qtys
                .iter()
                .fold(Selection::new(), |s, q| s.appended(record("X", *q, 0.5)));
            let totals = selection.totals();

            prop_assert_eq!(totals.count, qtys.len());
            prop_assert_eq!(totals.total_quantity, qtys.iter().sum::<i64>());
            prop_assert!((totals.total_area - 0.5 * qtys.len() as f64).abs() < 1e-9);
        }
    }
}
