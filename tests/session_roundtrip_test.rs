//! End-to-end session persistence tests.
//!
//! These drive the real snapshot store on disk: populate an app, let it
//! save, then restore into a fresh app and compare what came back,
//! including the deferred scientific-row assignments and the malformed
//! snapshot cases.

use tally::app::{Action, App, AppMessage};
use tally::engine::Operator;
use tally::rows::CardKind;
use tally::storage::SnapshotStore;
use tally::theme::Mode;

fn app_at(path: &std::path::Path) -> App {
    let mut app = App::with_store(SnapshotStore::at(path));
    app.update_terminal_dimensions(120, 40);
    app
}

/// Apply deferred restore assignments synchronously, as the event loop
/// would after each delay fires.
fn drain_assigns(app: &mut App, assigns: Vec<tally::session::SciAssign>) {
    for assign in assigns {
        app.handle_message(AppMessage::AssignSciRow {
            index: assign.index,
            value: assign.value,
        });
    }
}

#[test]
fn test_session_round_trip_preserves_rows_and_tape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut app = app_at(&path);

    // One row in each of two distinct card types.
    if let Some(row) = app.cards.row_mut(CardKind::WhatPercentOf, 0) {
        row.x = "50".to_string();
        row.y = "200".to_string();
    }
    if let Some(row) = app.cards.row_mut(CardKind::PercentChange, 0) {
        row.x = "-50".to_string();
        row.y = "50".to_string();
    }

    // One expression row.
    let idx = app.sci.add_blank();
    app.sci.assign(idx, "10 / 4 + 1".to_string());

    // Two audit entries through the real keypad path.
    for action in [
        Action::Digit('5'),
        Action::Op(Operator::Add),
        Action::Digit('3'),
        Action::Equals,
        Action::Op(Operator::Multiply),
        Action::Digit('2'),
        Action::Equals,
    ] {
        app.apply_action(action);
    }
    assert_eq!(app.tape.len(), 2);

    app.save_session();

    // A brand-new app over the same store.
    let mut restored = app_at(&path);
    let assigns = restored.load_session();

    assert_eq!(
        restored.cards.rows(CardKind::WhatPercentOf),
        app.cards.rows(CardKind::WhatPercentOf)
    );
    assert_eq!(
        restored.cards.rows(CardKind::PercentChange),
        app.cards.rows(CardKind::PercentChange)
    );

    // Tape order is identical, newest first.
    assert_eq!(restored.tape.entries(), app.tape.entries());
    assert_eq!(restored.tape.entries()[0].res, 16.0);
    assert_eq!(restored.tape.entries()[1].res, 8.0);

    // The sci row exists immediately; its value lands via the deferred
    // queue.
    assert_eq!(restored.sci.len(), 1);
    assert_eq!(restored.sci.rows()[0].raw, "");
    drain_assigns(&mut restored, assigns);
    assert_eq!(restored.sci.rows()[0].raw, "10 / 4 + 1");
}

#[test]
fn test_cold_start_without_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_at(&dir.path().join("session.json"));

    let assigns = app.load_session();
    assert!(assigns.is_empty());

    // Default initialization: one blank row per card, nothing else.
    for kind in CardKind::ALL {
        assert_eq!(app.cards.row_count(kind), 1);
    }
    assert!(app.tape.is_empty());
    assert!(app.sci.is_empty());
}

#[test]
fn test_unparsable_snapshot_falls_back_to_fresh_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{not json at all").unwrap();

    let mut app = app_at(&path);
    let assigns = app.load_session();

    assert!(assigns.is_empty());
    for kind in CardKind::ALL {
        assert_eq!(app.cards.row_count(kind), 1);
    }
    assert!(app.tape.is_empty());
}

#[test]
fn test_malformed_audit_entries_skip_without_aborting_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    // Hand-written snapshot: one bad op, one non-finite result, one good
    // entry, plus row data that must still come through.
    let json = r#"{
        "theme": "theme-teal",
        "darkMode": false,
        "mode": "standard",
        "cards": {"type2": [{"x": "15", "y": "80"}]},
        "sciRows": ["2^3"],
        "auditData": [
            {"a": 1.0, "b": 2.0, "res": 3.0},
            {"a": 1.0, "b": 2.0, "op": "+", "res": null},
            {"a": 8.0, "b": 2.0, "op": "*", "res": 16.0}
        ]
    }"#;
    std::fs::write(&path, json).unwrap();

    let mut app = app_at(&path);
    let assigns = app.load_session();

    // Only the valid entry survives.
    assert_eq!(app.tape.len(), 1);
    assert_eq!(app.tape.entries()[0].res, 16.0);

    // Restore of the remaining data was not aborted.
    assert_eq!(app.theme.theme, "theme-teal");
    assert_eq!(app.cards.rows(CardKind::PercentOf)[0].x, "15");
    assert_eq!(assigns.len(), 1);
    drain_assigns(&mut app, assigns);
    assert_eq!(app.sci.rows()[0].raw, "2^3");
}

#[test]
fn test_tape_capacity_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut app = app_at(&path);
    // 101 completed computations: i + 0 = i.
    for i in 0..101 {
        for c in i.to_string().chars() {
            app.apply_action(Action::Digit(c));
        }
        app.apply_action(Action::Op(Operator::Add));
        app.apply_action(Action::Digit('0'));
        app.apply_action(Action::Equals);
        app.apply_action(Action::Clear);
    }

    assert_eq!(app.tape.len(), 100);
    // The first computation (a = 0) has been evicted.
    assert_eq!(app.tape.entries()[99].a, 1.0);
    assert_eq!(app.tape.entries()[0].a, 100.0);

    app.save_session();
    let mut restored = app_at(&path);
    restored.load_session();

    assert_eq!(restored.tape.entries(), app.tape.entries());
}

#[test]
fn test_scientific_mode_restore_respects_narrow_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut app = app_at(&path);
    app.toggle_mode();
    assert_eq!(app.theme.mode, Mode::Scientific);
    app.save_session();

    // Wide terminal: scientific mode comes back.
    let mut wide = app_at(&path);
    wide.load_session();
    assert_eq!(wide.theme.mode, Mode::Scientific);

    // Narrow terminal: the mode restore is skipped so the panel is never
    // restored invisible.
    let mut narrow = App::with_store(SnapshotStore::at(&path));
    narrow.update_terminal_dimensions(80, 24);
    narrow.load_session();
    assert_eq!(narrow.theme.mode, Mode::Standard);
}

#[test]
fn test_deferred_assignment_tolerates_deleted_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut app = app_at(&path);
    let first = app.sci.add_blank();
    app.sci.assign(first, "1+1".to_string());
    let second = app.sci.add_blank();
    app.sci.assign(second, "2+2".to_string());
    app.save_session();

    let mut restored = app_at(&path);
    let assigns = restored.load_session();
    assert_eq!(assigns.len(), 2);

    // The user deletes the second row before its assignment fires.
    restored.sci.delete(1);
    drain_assigns(&mut restored, assigns);

    // The surviving row got its value; the stale assignment was a no-op.
    assert_eq!(restored.sci.len(), 1);
    assert_eq!(restored.sci.rows()[0].raw, "1+1");
}
