//! Session snapshot codec: capture, per-entry validation, and restore
//! replay.
//!
//! One snapshot document carries the whole interactive session: theme and
//! mode flags, every percentage card's rows, every scientific row's raw
//! expression, and the audit tape. The snapshot only exists transiently
//! (built and serialized on each save tick, parsed and replayed once at
//! startup); the live components stay the source of truth.
//!
//! Restore is deliberately forgiving: a single malformed record (bad audit
//! entry, unknown card key) is skipped with a log line and the rest of the
//! restore continues. Only a document that fails to parse at all aborts the
//! restore, and that degrades to a fresh start.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::{AuditEntry, AuditTape};
use crate::engine::Operator;
use crate::rows::{CardKind, Cards, RowEntry, SciRows};
use crate::theme::{Mode, ThemeState, SCI_MIN_WIDTH};

/// Idle window after the last qualifying event before a save fires.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Base delay for the staggered scientific-row restore; row `i` is
/// assigned after `base * (i + 1)`.
pub const SCI_RESTORE_DELAY_BASE: Duration = Duration::from_millis(100);

/// The persisted session document.
///
/// Field names are the stored keys; they must stay stable. Collections
/// holding foreign data (`cards` values, `auditData`) stay as raw JSON
/// values so one bad record can be skipped without failing the whole
/// document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub theme: String,
    #[serde(default, rename = "darkMode")]
    pub dark_mode: bool,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub cards: BTreeMap<String, Vec<Value>>,
    #[serde(default, rename = "sciRows")]
    pub sci_rows: Vec<String>,
    #[serde(default, rename = "auditData")]
    pub audit_data: Vec<Value>,
}

/// One deferred scientific-row assignment produced by restore.
///
/// The assignments form an explicit task queue: each is scheduled
/// independently with an increasing delay so concurrently-settling row
/// widgets never race, and each tolerates its target row having been
/// deleted in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub struct SciAssign {
    pub index: usize,
    pub value: String,
    pub delay: Duration,
}

impl Snapshot {
    /// Capture the live session into a snapshot document.
    pub fn capture(
        theme: &ThemeState,
        cards: &Cards,
        sci: &SciRows,
        tape: &AuditTape,
    ) -> Self {
        let mut card_map = BTreeMap::new();
        for kind in CardKind::ALL {
            let rows: Vec<Value> = cards
                .rows(kind)
                .iter()
                .filter_map(|row| serde_json::to_value(row).ok())
                .collect();
            card_map.insert(kind.tag().to_string(), rows);
        }

        Self {
            theme: theme.theme.clone(),
            dark_mode: theme.dark_mode,
            mode: theme.mode,
            cards: card_map,
            sci_rows: sci.rows().iter().map(|row| row.raw.clone()).collect(),
            audit_data: tape
                .entries()
                .iter()
                .filter_map(|entry| serde_json::to_value(entry).ok())
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Replay a parsed snapshot into the live components.
///
/// Returns the deferred scientific-row assignments still to be applied;
/// everything else is restored synchronously. `terminal_width` drives the
/// scientific-mode guard: below the two-panel threshold the mode is left
/// at standard so the restored panel cannot come back invisible.
pub fn restore(
    snapshot: &Snapshot,
    theme: &mut ThemeState,
    cards: &mut Cards,
    sci: &mut SciRows,
    tape: &mut AuditTape,
    terminal_width: u16,
) -> Vec<SciAssign> {
    // Theme and dark mode first: the theme setter may force dark mode for
    // the aurora family, matching live behavior.
    theme.dark_mode = snapshot.dark_mode;
    if !theme.set_theme(&snapshot.theme) {
        tracing::warn!(theme = %snapshot.theme, "unrecognized theme, keeping default");
    }

    if snapshot.mode == Mode::Scientific {
        if terminal_width >= SCI_MIN_WIDTH {
            theme.mode = Mode::Scientific;
        } else {
            tracing::info!(
                terminal_width,
                "skipping scientific mode restore on narrow layout"
            );
        }
    }

    // Replay the tape oldest-first through the normal append path so the
    // stored newest-first order is reproduced.
    for value in snapshot.audit_data.iter().rev() {
        match audit_entry_from_value(value) {
            Some(entry) => tape.push(entry),
            None => tracing::warn!(%value, "skipping malformed audit entry"),
        }
    }

    for (key, rows) in &snapshot.cards {
        let Some(kind) = CardKind::from_tag(key) else {
            tracing::warn!(card = %key, "skipping unknown card type");
            continue;
        };
        let entries: Vec<RowEntry> = rows.iter().map(row_from_value).collect();
        cards.restore(kind, entries);
    }

    sci.clear();
    let mut assigns = Vec::with_capacity(snapshot.sci_rows.len());
    for (index, raw) in snapshot.sci_rows.iter().enumerate() {
        sci.add_blank();
        assigns.push(SciAssign {
            index,
            value: raw.clone(),
            delay: SCI_RESTORE_DELAY_BASE * (index as u32 + 1),
        });
    }
    assigns
}

/// Validate one stored audit record: all four fields present, the operator
/// known, every number finite.
fn audit_entry_from_value(value: &Value) -> Option<AuditEntry> {
    let obj = value.as_object()?;
    let a = finite(obj.get("a")?)?;
    let b = finite(obj.get("b")?)?;
    let res = finite(obj.get("res")?)?;
    let op = Operator::from_tag(obj.get("op")?.as_str()?)?;
    Some(AuditEntry::new(a, b, op, res))
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

/// Coerce one stored card row. Missing or non-string fields become empty
/// inputs rather than dropping the row.
fn row_from_value(value: &Value) -> RowEntry {
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    RowEntry {
        x: field("x"),
        y: field("y"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WIDE: u16 = 120;

    fn populated_session() -> (ThemeState, Cards, SciRows, AuditTape) {
        let mut theme = ThemeState::default();
        theme.set_theme("theme-forest");
        theme.mode = Mode::Scientific;

        let mut cards = Cards::new();
        if let Some(row) = cards.row_mut(CardKind::WhatPercentOf, 0) {
            row.x = "50".to_string();
            row.y = "200".to_string();
        }
        cards.add_row(CardKind::PercentChange);
        if let Some(row) = cards.row_mut(CardKind::PercentChange, 1) {
            row.x = "-50".to_string();
            row.y = "50".to_string();
        }

        let mut sci = SciRows::new();
        let first = sci.add_blank();
        sci.assign(first, "1+2".to_string());
        let second = sci.add_blank();
        sci.assign(second, "sqrt_like".to_string());

        let mut tape = AuditTape::new();
        tape.push(AuditEntry::new(5.0, 3.0, Operator::Add, 8.0));
        tape.push(AuditEntry::new(8.0, 2.0, Operator::Multiply, 16.0));

        (theme, cards, sci, tape)
    }

    fn apply(
        snapshot: &Snapshot,
        width: u16,
    ) -> (ThemeState, Cards, SciRows, AuditTape, Vec<SciAssign>) {
        let mut theme = ThemeState::default();
        let mut cards = Cards::new();
        let mut sci = SciRows::new();
        let mut tape = AuditTape::new();
        let assigns = restore(snapshot, &mut theme, &mut cards, &mut sci, &mut tape, width);
        (theme, cards, sci, tape, assigns)
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let (theme, cards, sci, tape) = populated_session();
        let json = Snapshot::capture(&theme, &cards, &sci, &tape)
            .to_json()
            .unwrap();
        let parsed = Snapshot::from_json(&json).unwrap();

        let (theme2, cards2, sci2, tape2, assigns) = apply(&parsed, WIDE);

        assert_eq!(theme2.theme, "theme-forest");
        assert_eq!(theme2.mode, Mode::Scientific);
        assert_eq!(
            cards2.rows(CardKind::WhatPercentOf),
            cards.rows(CardKind::WhatPercentOf)
        );
        assert_eq!(
            cards2.rows(CardKind::PercentChange),
            cards.rows(CardKind::PercentChange)
        );

        // The tape comes back in the same newest-first order.
        assert_eq!(tape2.entries(), tape.entries());

        // Sci rows exist but their values arrive via the deferred queue.
        assert_eq!(sci2.len(), 2);
        assert_eq!(assigns.len(), 2);
        assert_eq!(assigns[0].value, "1+2");
        assert_eq!(assigns[1].value, "sqrt_like");
    }

    #[test]
    fn test_sci_assign_delays_are_staggered() {
        let (theme, cards, sci, tape) = populated_session();
        let snapshot = Snapshot::capture(&theme, &cards, &sci, &tape);
        let (_, _, _, _, assigns) = apply(&snapshot, WIDE);

        assert_eq!(assigns[0].delay, SCI_RESTORE_DELAY_BASE);
        assert_eq!(assigns[1].delay, SCI_RESTORE_DELAY_BASE * 2);
    }

    #[test]
    fn test_malformed_audit_entries_are_skipped_individually() {
        let snapshot = Snapshot {
            audit_data: vec![
                json!({"a": 1.0, "b": 2.0, "op": "+", "res": 3.0}),
                json!({"a": 1.0, "b": 2.0, "res": 3.0}),          // op missing
                json!({"a": 1.0, "b": 2.0, "op": "^", "res": 3.0}), // unknown op
                json!({"a": "x", "b": 2.0, "op": "+", "res": 3.0}), // non-numeric
                json!({"a": 4.0, "b": 5.0, "op": "*", "res": 20.0}),
                json!("not even an object"),
            ],
            ..Default::default()
        };

        let (_, _, _, tape, _) = apply(&snapshot, WIDE);

        assert_eq!(tape.len(), 2);
        // Stored order was newest-first; replay reproduces it.
        assert_eq!(tape.entries()[0].res, 3.0);
        assert_eq!(tape.entries()[1].res, 20.0);
    }

    #[test]
    fn test_non_finite_audit_numbers_are_rejected() {
        // JSON has no literal infinity; a null res models the same hole.
        let snapshot = Snapshot {
            audit_data: vec![json!({"a": 1.0, "b": 0.0, "op": "/", "res": null})],
            ..Default::default()
        };
        let (_, _, _, tape, _) = apply(&snapshot, WIDE);
        assert!(tape.is_empty());
    }

    #[test]
    fn test_unknown_card_type_is_skipped() {
        let mut cards_map = BTreeMap::new();
        cards_map.insert(
            "type9".to_string(),
            vec![json!({"x": "1", "y": "2"})],
        );
        cards_map.insert(
            "type2".to_string(),
            vec![json!({"x": "15", "y": "80"})],
        );
        let snapshot = Snapshot {
            cards: cards_map,
            ..Default::default()
        };

        let (_, cards, _, _, _) = apply(&snapshot, WIDE);
        assert_eq!(cards.rows(CardKind::PercentOf), &[RowEntry::new("15", "80")]);
    }

    #[test]
    fn test_empty_card_list_restores_one_blank_row() {
        let mut cards_map = BTreeMap::new();
        cards_map.insert("type1".to_string(), Vec::new());
        let snapshot = Snapshot {
            cards: cards_map,
            ..Default::default()
        };

        let (_, cards, _, _, _) = apply(&snapshot, WIDE);
        assert_eq!(cards.rows(CardKind::WhatPercentOf), &[RowEntry::default()]);
    }

    #[test]
    fn test_invalid_theme_falls_back_to_default() {
        let snapshot = Snapshot {
            theme: "theme-neon".to_string(),
            dark_mode: true,
            ..Default::default()
        };

        let (theme, _, _, _, _) = apply(&snapshot, WIDE);
        assert_eq!(theme.theme, "");
        assert!(theme.dark_mode);
    }

    #[test]
    fn test_scientific_mode_skipped_on_narrow_terminal() {
        let snapshot = Snapshot {
            mode: Mode::Scientific,
            ..Default::default()
        };

        let (theme, _, _, _, _) = apply(&snapshot, SCI_MIN_WIDTH - 1);
        assert_eq!(theme.mode, Mode::Standard);

        let (theme, _, _, _, _) = apply(&snapshot, SCI_MIN_WIDTH);
        assert_eq!(theme.mode, Mode::Scientific);
    }

    #[test]
    fn test_missing_row_fields_become_blank_inputs() {
        let mut cards_map = BTreeMap::new();
        cards_map.insert(
            "type3".to_string(),
            vec![json!({"x": "7"}), json!({"y": 42})],
        );
        let snapshot = Snapshot {
            cards: cards_map,
            ..Default::default()
        };

        let (_, cards, _, _, _) = apply(&snapshot, WIDE);
        let rows = cards.rows(CardKind::PercentChange);
        assert_eq!(rows[0], RowEntry::new("7", ""));
        // A non-string field coerces to empty rather than dropping the row.
        assert_eq!(rows[1], RowEntry::default());
    }

    #[test]
    fn test_document_without_optional_fields_parses() {
        let parsed = Snapshot::from_json("{}").unwrap();
        let (theme, cards, sci, tape, assigns) = apply(&parsed, WIDE);

        assert_eq!(theme, ThemeState::default());
        assert_eq!(cards.rows(CardKind::WhatPercentOf).len(), 1);
        assert!(sci.is_empty());
        assert!(tape.is_empty());
        assert!(assigns.is_empty());
    }
}
