//! Percentage cards and scientific expression rows.
//!
//! Every row is an independent unit: raw input strings in, a derived result
//! string out. Results are never stored; each read recomputes from the raw
//! inputs, so there is no cached value to go stale. Row identity is
//! positional within its card.

use serde::{Deserialize, Serialize};

use crate::expr;
use crate::format;

/// Result text for the divide-by-zero row conditions. Anything else that
/// fails to parse shows the zero placeholder instead.
pub const ERROR_TEXT: &str = "Error";

/// The four fixed percentage formulas.
///
/// The serde tags are the persisted card keys and must stay stable across
/// snapshot versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CardKind {
    /// "X is what % of Y": `(x/y)*100`, shown with a `%` suffix.
    #[serde(rename = "type1")]
    WhatPercentOf,
    /// "What is X% of Y": `(x/100)*y`.
    #[serde(rename = "type2")]
    PercentOf,
    /// "Change from X to Y": `((y-x)/|x|)*100`, sign-prefixed, `%` suffix.
    #[serde(rename = "type3")]
    PercentChange,
    /// "X is Y% of what": `x/(y/100)`.
    #[serde(rename = "type4")]
    ReversePercent,
}

impl CardKind {
    pub const ALL: [CardKind; 4] = [
        CardKind::WhatPercentOf,
        CardKind::PercentOf,
        CardKind::PercentChange,
        CardKind::ReversePercent,
    ];

    /// The persisted card key (`type1`..`type4`).
    pub fn tag(self) -> &'static str {
        match self {
            CardKind::WhatPercentOf => "type1",
            CardKind::PercentOf => "type2",
            CardKind::PercentChange => "type3",
            CardKind::ReversePercent => "type4",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "type1" => Some(CardKind::WhatPercentOf),
            "type2" => Some(CardKind::PercentOf),
            "type3" => Some(CardKind::PercentChange),
            "type4" => Some(CardKind::ReversePercent),
            _ => None,
        }
    }

    /// Card heading shown above the rows.
    pub fn label(self) -> &'static str {
        match self {
            CardKind::WhatPercentOf => "X is what % of Y",
            CardKind::PercentOf => "What is X% of Y",
            CardKind::PercentChange => "Change from X to Y",
            CardKind::ReversePercent => "X is Y% of what?",
        }
    }

    /// Whether this card's result carries a `%` suffix.
    fn percent_result(self) -> bool {
        matches!(self, CardKind::WhatPercentOf | CardKind::PercentChange)
    }

    /// The zero placeholder shown before both inputs parse.
    fn placeholder(self) -> &'static str {
        if self.percent_result() {
            "0.00%"
        } else {
            "0.00"
        }
    }
}

/// One percentage row: two raw input strings. The result is derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowEntry {
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
}

impl RowEntry {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    /// The derived result for this row under the given formula.
    pub fn result(&self, kind: CardKind) -> String {
        compute_row_result(kind, &self.x, &self.y)
    }
}

/// Compute a row result from raw inputs.
///
/// A missing or unparsable input yields the zero placeholder, not an error;
/// [`ERROR_TEXT`] is reserved for the divide-by-zero formula conditions.
pub fn compute_row_result(kind: CardKind, x: &str, y: &str) -> String {
    let (Some(x), Some(y)) = (parse_input(x), parse_input(y)) else {
        return kind.placeholder().to_string();
    };

    match kind {
        CardKind::WhatPercentOf => {
            if y == 0.0 {
                ERROR_TEXT.to_string()
            } else {
                format!("{}%", format::format_row_number((x / y) * 100.0))
            }
        }
        CardKind::PercentOf => format::format_row_number((x / 100.0) * y),
        CardKind::PercentChange => {
            if x == 0.0 {
                ERROR_TEXT.to_string()
            } else {
                let res = ((y - x) / x.abs()) * 100.0;
                let sign = if res > 0.0 { "+" } else { "" };
                format!("{sign}{}%", format::format_row_number(res))
            }
        }
        CardKind::ReversePercent => {
            if y == 0.0 {
                ERROR_TEXT.to_string()
            } else {
                format::format_row_number(x / (y / 100.0))
            }
        }
    }
}

fn parse_input(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// The four percentage cards and their rows.
///
/// Rows within a card are ordered; a card may reach zero rows while the
/// session is live, but a restore always leaves at least one blank row so
/// the card stays usable.
#[derive(Debug, Clone)]
pub struct Cards {
    rows: [Vec<RowEntry>; 4],
}

impl Default for Cards {
    fn default() -> Self {
        Self {
            rows: std::array::from_fn(|_| vec![RowEntry::default()]),
        }
    }
}

impl Cards {
    /// Every card starts with one blank row.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(kind: CardKind) -> usize {
        CardKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default()
    }

    pub fn rows(&self, kind: CardKind) -> &[RowEntry] {
        &self.rows[Self::slot(kind)]
    }

    pub fn row_mut(&mut self, kind: CardKind, index: usize) -> Option<&mut RowEntry> {
        self.rows[Self::slot(kind)].get_mut(index)
    }

    /// Append a blank row to a card; returns its index.
    pub fn add_row(&mut self, kind: CardKind) -> usize {
        let rows = &mut self.rows[Self::slot(kind)];
        rows.push(RowEntry::default());
        rows.len() - 1
    }

    /// Remove one row. Siblings are untouched; removing the last row of a
    /// card is allowed.
    pub fn delete_row(&mut self, kind: CardKind, index: usize) {
        let rows = &mut self.rows[Self::slot(kind)];
        if index < rows.len() {
            rows.remove(index);
        }
    }

    /// Replace a card's rows from a restored snapshot. An empty list
    /// becomes a single blank row; a card is never restored unusable.
    pub fn restore(&mut self, kind: CardKind, mut entries: Vec<RowEntry>) {
        if entries.is_empty() {
            entries.push(RowEntry::default());
        }
        self.rows[Self::slot(kind)] = entries;
    }

    pub fn row_count(&self, kind: CardKind) -> usize {
        self.rows[Self::slot(kind)].len()
    }
}

/// One scientific row: a raw expression string. The evaluated result is
/// derived on read and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SciRow {
    pub raw: String,
}

impl SciRow {
    /// Display form of the derived result (`= 42`, `= ` when blank).
    pub fn result_text(&self) -> String {
        expr::result_text(&self.raw)
    }
}

/// Ordered collection of scientific expression rows.
#[derive(Debug, Clone, Default)]
pub struct SciRows {
    rows: Vec<SciRow>,
}

impl SciRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[SciRow] {
        &self.rows
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut SciRow> {
        self.rows.get_mut(index)
    }

    /// Append a blank row; returns its index.
    pub fn add_blank(&mut self) -> usize {
        self.rows.push(SciRow::default());
        self.rows.len() - 1
    }

    pub fn delete(&mut self, index: usize) {
        if index < self.rows.len() {
            self.rows.remove(index);
        }
    }

    /// Assign a restored raw expression to the row at `index`.
    ///
    /// Deferred restore assignments may land after the user has deleted the
    /// row; a missing target is a lookup miss, not a fault. Returns whether
    /// the assignment landed.
    pub fn assign(&mut self, index: usize, raw: String) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.raw = raw;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_what_percent_of() {
        assert_eq!(
            compute_row_result(CardKind::WhatPercentOf, "50", "200"),
            "25.00%"
        );
    }

    #[test]
    fn test_what_percent_of_zero_denominator_is_error() {
        assert_eq!(compute_row_result(CardKind::WhatPercentOf, "50", "0"), "Error");
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(compute_row_result(CardKind::PercentOf, "15", "80"), "12.00");
        // No divide in this formula, so zero inputs compute normally.
        assert_eq!(compute_row_result(CardKind::PercentOf, "15", "0"), "0.00");
    }

    #[test]
    fn test_percent_change_signs() {
        assert_eq!(
            compute_row_result(CardKind::PercentChange, "-50", "50"),
            "+200.00%"
        );
        assert_eq!(
            compute_row_result(CardKind::PercentChange, "100", "50"),
            "-50.00%"
        );
        assert_eq!(
            compute_row_result(CardKind::PercentChange, "50", "50"),
            "0.00%"
        );
    }

    #[test]
    fn test_percent_change_from_zero_is_error() {
        assert_eq!(compute_row_result(CardKind::PercentChange, "0", "50"), "Error");
    }

    #[test]
    fn test_reverse_percent() {
        assert_eq!(
            compute_row_result(CardKind::ReversePercent, "30", "60"),
            "50.00"
        );
        assert_eq!(compute_row_result(CardKind::ReversePercent, "30", "0"), "Error");
    }

    #[test]
    fn test_missing_input_is_placeholder_not_error() {
        assert_eq!(compute_row_result(CardKind::WhatPercentOf, "", "200"), "0.00%");
        assert_eq!(compute_row_result(CardKind::PercentOf, "abc", "80"), "0.00");
        assert_eq!(compute_row_result(CardKind::PercentChange, "", ""), "0.00%");
        assert_eq!(compute_row_result(CardKind::ReversePercent, "30", " "), "0.00");
    }

    #[test]
    fn test_rows_are_independent() {
        let mut cards = Cards::new();
        cards.add_row(CardKind::WhatPercentOf);
        if let Some(row) = cards.row_mut(CardKind::WhatPercentOf, 1) {
            row.x = "50".to_string();
            row.y = "200".to_string();
        }

        assert_eq!(cards.rows(CardKind::WhatPercentOf)[0].result(CardKind::WhatPercentOf), "0.00%");
        assert_eq!(cards.rows(CardKind::WhatPercentOf)[1].result(CardKind::WhatPercentOf), "25.00%");
    }

    #[test]
    fn test_delete_row_can_empty_a_card() {
        let mut cards = Cards::new();
        cards.delete_row(CardKind::PercentOf, 0);
        assert_eq!(cards.row_count(CardKind::PercentOf), 0);
        // Out-of-range deletes are ignored.
        cards.delete_row(CardKind::PercentOf, 5);
    }

    #[test]
    fn test_restore_never_leaves_a_card_empty() {
        let mut cards = Cards::new();
        cards.restore(CardKind::PercentChange, Vec::new());
        assert_eq!(cards.row_count(CardKind::PercentChange), 1);
        assert_eq!(cards.rows(CardKind::PercentChange)[0], RowEntry::default());

        cards.restore(
            CardKind::PercentChange,
            vec![RowEntry::new("1", "2"), RowEntry::new("3", "4")],
        );
        assert_eq!(cards.row_count(CardKind::PercentChange), 2);
    }

    #[test]
    fn test_sci_assign_tolerates_missing_target() {
        let mut sci = SciRows::new();
        sci.add_blank();
        assert!(sci.assign(0, "1+2".to_string()));
        assert!(!sci.assign(3, "4*5".to_string()));
        assert_eq!(sci.rows()[0].raw, "1+2");
    }

    #[test]
    fn test_card_tags_round_trip() {
        for kind in CardKind::ALL {
            assert_eq!(CardKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(CardKind::from_tag("type9"), None);
    }
}
