//! Application state and the single action-dispatch switch.
//!
//! `App` owns every component (the calculator engine, the audit tape, the
//! row registries, the theme flags) and is the only place state
//! transitions happen. Key events are mapped (in `main`) to the closed
//! [`Action`] enum and dispatched through [`App::apply_action`]; deferred
//! work arrives as [`AppMessage`]s over the app channel.

use std::time::{Duration, Instant};

use color_eyre::Result;
use tokio::sync::mpsc;

use crate::audit::AuditTape;
use crate::engine::{CalcError, Calculator, MemoryAction, Operator};
use crate::format;
use crate::rows::{CardKind, Cards, SciRows};
use crate::session::{self, SciAssign, Snapshot, SAVE_DEBOUNCE};
use crate::storage::SnapshotStore;
use crate::theme::{Mode, ThemeState};

/// How long a toast notice stays on screen.
pub const TOAST_DURATION: Duration = Duration::from_millis(2000);

/// Keypad actions: the closed input surface of the arithmetic engine.
///
/// Every concrete input (key press, future click map) funnels into this
/// enum and through one dispatch switch; the engine never sees raw events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Digit(char),
    Op(Operator),
    Equals,
    Percent,
    ToggleSign,
    Memory(MemoryAction),
    Clear,
    Backspace,
}

/// Messages delivered asynchronously through the app channel.
#[derive(Debug, Clone)]
pub enum AppMessage {
    /// Deferred restore assignment for one scientific row. Fire-and-forget:
    /// the target row may be gone by the time it lands, which is a no-op.
    AssignSciRow { index: usize, value: String },
}

/// Which field of a percentage row is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    X,
    Y,
}

/// Which input surface currently receives keystrokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    /// The calculator keypad.
    Keypad,
    /// One input field of one percentage row.
    Card {
        kind: CardKind,
        row: usize,
        field: RowField,
    },
    /// One scientific expression row.
    Sci { row: usize },
    /// The audit tape, with one entry selected.
    Tape { entry: usize },
}

/// A transient notice shown at the bottom of the screen.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    shown_at: Instant,
}

/// Top-level application state.
pub struct App {
    pub calc: Calculator,
    pub tape: AuditTape,
    pub cards: Cards,
    pub sci: SciRows,
    pub theme: ThemeState,
    pub focus: Focus,
    pub toast: Option<Toast>,
    pub needs_redraw: bool,
    pub should_quit: bool,
    pub terminal_width: u16,
    pub terminal_height: u16,
    pub message_tx: mpsc::UnboundedSender<AppMessage>,
    pub message_rx: Option<mpsc::UnboundedReceiver<AppMessage>>,
    store: SnapshotStore,
    save_deadline: Option<Instant>,
}

impl App {
    pub fn new() -> Result<Self> {
        Ok(Self::with_store(SnapshotStore::open_default()?))
    }

    /// Build an app over an explicit snapshot store (tests).
    pub fn with_store(store: SnapshotStore) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        Self {
            calc: Calculator::new(),
            tape: AuditTape::new(),
            cards: Cards::new(),
            sci: SciRows::new(),
            theme: ThemeState::default(),
            focus: Focus::Keypad,
            toast: None,
            needs_redraw: true,
            should_quit: false,
            terminal_width: 80,
            terminal_height: 24,
            message_tx,
            message_rx: Some(message_rx),
            store,
            save_deadline: None,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn update_terminal_dimensions(&mut self, width: u16, height: u16) {
        self.terminal_width = width;
        self.terminal_height = height;
        self.mark_dirty();
    }

    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            shown_at: Instant::now(),
        });
        self.mark_dirty();
    }

    // =========================================================
    // Keypad dispatch
    // =========================================================

    /// Apply one keypad action. Every action restarts the save debounce.
    pub fn apply_action(&mut self, action: Action) {
        match action {
            Action::Digit(d) => self.calc.digit(d),
            Action::Op(op) => {
                if let Err(e) = self.calc.operator(op, &mut self.tape) {
                    self.notice(e);
                }
            }
            Action::Equals => {
                if let Err(e) = self.calc.equals(&mut self.tape) {
                    self.notice(e);
                }
            }
            Action::Percent => self.calc.percent(),
            Action::ToggleSign => self.calc.toggle_sign(),
            Action::Memory(mem) => {
                self.calc.memory(mem);
                let toast = match mem {
                    MemoryAction::Clear => "Memory Cleared".to_string(),
                    MemoryAction::Recall => format!(
                        "Memory Recalled: {}",
                        format::format_number(self.calc.memory_value())
                    ),
                    MemoryAction::Add => "Added to Memory".to_string(),
                    MemoryAction::Subtract => "Subtracted from Memory".to_string(),
                };
                self.show_toast(toast);
            }
            Action::Clear => self.calc.clear(),
            Action::Backspace => self.calc.backspace(),
        }
        self.mark_dirty();
        self.schedule_save();
    }

    fn notice(&mut self, error: CalcError) {
        self.show_toast(error.to_string());
    }

    // =========================================================
    // Audit tape interactions
    // =========================================================

    /// "Use": inject a historical result as the calculator's current value.
    pub fn use_audit_entry(&mut self, index: usize) {
        if let Some(entry) = self.tape.get(index) {
            self.calc.use_value(entry.res);
            self.focus = Focus::Keypad;
            self.mark_dirty();
            self.schedule_save();
        }
    }

    pub fn copy_audit_entry(&mut self, index: usize) {
        if let Some(entry) = self.tape.get(index) {
            let text = entry.result_text();
            self.copy_text(&text);
        }
    }

    pub fn clear_tape(&mut self) {
        self.tape.clear();
        if let Focus::Tape { .. } = self.focus {
            self.focus = Focus::Keypad;
        }
        self.mark_dirty();
        self.schedule_save();
    }

    // =========================================================
    // Row editing
    // =========================================================

    /// Characters a percentage-row input accepts (a decimal literal,
    /// optionally in exponent form).
    fn is_row_input_char(c: char) -> bool {
        c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')
    }

    /// Type one character into the focused input surface.
    pub fn edit_focused_char(&mut self, c: char) {
        match self.focus {
            Focus::Card { kind, row, field } => {
                if !Self::is_row_input_char(c) {
                    return;
                }
                if let Some(entry) = self.cards.row_mut(kind, row) {
                    match field {
                        RowField::X => entry.x.push(c),
                        RowField::Y => entry.y.push(c),
                    }
                    self.mark_dirty();
                    self.schedule_save();
                }
            }
            Focus::Sci { row } => {
                if let Some(entry) = self.sci.row_mut(row) {
                    entry.raw.push(c);
                    self.mark_dirty();
                    self.schedule_save();
                }
            }
            Focus::Keypad | Focus::Tape { .. } => {}
        }
    }

    /// Delete the last character of the focused input surface.
    pub fn edit_focused_backspace(&mut self) {
        match self.focus {
            Focus::Card { kind, row, field } => {
                if let Some(entry) = self.cards.row_mut(kind, row) {
                    match field {
                        RowField::X => entry.x.pop(),
                        RowField::Y => entry.y.pop(),
                    };
                    self.mark_dirty();
                    self.schedule_save();
                }
            }
            Focus::Sci { row } => {
                if let Some(entry) = self.sci.row_mut(row) {
                    entry.raw.pop();
                    self.mark_dirty();
                    self.schedule_save();
                }
            }
            Focus::Keypad | Focus::Tape { .. } => {}
        }
    }

    /// Add a row to the focused surface and focus it.
    pub fn add_row_at_focus(&mut self) {
        match self.focus {
            Focus::Card { kind, .. } => {
                let row = self.cards.add_row(kind);
                self.focus = Focus::Card {
                    kind,
                    row,
                    field: RowField::X,
                };
            }
            Focus::Sci { .. } => {
                let row = self.sci.add_blank();
                self.focus = Focus::Sci { row };
            }
            Focus::Keypad | Focus::Tape { .. } => return,
        }
        self.mark_dirty();
        self.schedule_save();
    }

    /// Delete the focused row. Siblings are untouched.
    pub fn delete_row_at_focus(&mut self) {
        match self.focus {
            Focus::Card { kind, row, field } => {
                self.cards.delete_row(kind, row);
                let count = self.cards.row_count(kind);
                if count == 0 {
                    self.focus = Focus::Keypad;
                } else {
                    self.focus = Focus::Card {
                        kind,
                        row: row.min(count - 1),
                        field,
                    };
                }
            }
            Focus::Sci { row } => {
                self.sci.delete(row);
                if self.sci.is_empty() {
                    self.focus = Focus::Keypad;
                } else {
                    self.focus = Focus::Sci {
                        row: row.min(self.sci.len() - 1),
                    };
                }
            }
            Focus::Keypad | Focus::Tape { .. } => return,
        }
        self.mark_dirty();
        self.schedule_save();
    }

    /// Copy the focused row's derived result.
    pub fn copy_focused_result(&mut self) {
        match self.focus {
            Focus::Card { kind, row, .. } => {
                if let Some(entry) = self.cards.rows(kind).get(row) {
                    let text = entry.result(kind);
                    self.copy_text(&text);
                }
            }
            Focus::Sci { row } => {
                if let Some(entry) = self.sci.rows().get(row) {
                    let text = entry.result_text().trim_start_matches('=').trim().to_string();
                    self.copy_text(&text);
                }
            }
            Focus::Keypad | Focus::Tape { .. } => {}
        }
    }

    // =========================================================
    // Focus movement
    // =========================================================

    /// Cycle keypad → rows → tape → keypad.
    pub fn focus_next_panel(&mut self) {
        self.focus = match self.focus {
            Focus::Keypad => match self.theme.mode {
                Mode::Standard => Focus::Card {
                    kind: CardKind::ALL[0],
                    row: 0,
                    field: RowField::X,
                },
                Mode::Scientific => {
                    if self.sci.is_empty() {
                        self.sci.add_blank();
                    }
                    Focus::Sci { row: 0 }
                }
            },
            Focus::Card { .. } | Focus::Sci { .. } => Focus::Tape { entry: 0 },
            Focus::Tape { .. } => Focus::Keypad,
        };
        // A card focus is only valid while the card still has rows.
        if let Focus::Card { kind, .. } = self.focus {
            if self.cards.row_count(kind) == 0 {
                self.cards.add_row(kind);
            }
        }
        self.mark_dirty();
    }

    /// Move the focus down one row (or tape entry).
    pub fn focus_down(&mut self) {
        match self.focus {
            Focus::Card { kind, row, field } => {
                if row + 1 < self.cards.row_count(kind) {
                    self.focus = Focus::Card {
                        kind,
                        row: row + 1,
                        field,
                    };
                } else {
                    // Walk into the next card that has rows.
                    let pos = CardKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
                    for next in CardKind::ALL.iter().skip(pos + 1) {
                        if self.cards.row_count(*next) > 0 {
                            self.focus = Focus::Card {
                                kind: *next,
                                row: 0,
                                field,
                            };
                            break;
                        }
                    }
                }
            }
            Focus::Sci { row } => {
                if row + 1 < self.sci.len() {
                    self.focus = Focus::Sci { row: row + 1 };
                }
            }
            Focus::Tape { entry } => {
                if entry + 1 < self.tape.len() {
                    self.focus = Focus::Tape { entry: entry + 1 };
                }
            }
            Focus::Keypad => {}
        }
        self.mark_dirty();
    }

    /// Move the focus up one row (or tape entry).
    pub fn focus_up(&mut self) {
        match self.focus {
            Focus::Card { kind, row, field } => {
                if row > 0 {
                    self.focus = Focus::Card {
                        kind,
                        row: row - 1,
                        field,
                    };
                } else {
                    let pos = CardKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
                    for prev in CardKind::ALL.iter().take(pos).rev() {
                        let count = self.cards.row_count(*prev);
                        if count > 0 {
                            self.focus = Focus::Card {
                                kind: *prev,
                                row: count - 1,
                                field,
                            };
                            break;
                        }
                    }
                }
            }
            Focus::Sci { row } => {
                if row > 0 {
                    self.focus = Focus::Sci { row: row - 1 };
                }
            }
            Focus::Tape { entry } => {
                if entry > 0 {
                    self.focus = Focus::Tape { entry: entry - 1 };
                }
            }
            Focus::Keypad => {}
        }
        self.mark_dirty();
    }

    /// Switch between the X and Y fields of a focused percentage row.
    pub fn focus_field(&mut self, field: RowField) {
        if let Focus::Card { kind, row, .. } = self.focus {
            self.focus = Focus::Card { kind, row, field };
            self.mark_dirty();
        }
    }

    // =========================================================
    // Theme and mode
    // =========================================================

    pub fn toggle_mode(&mut self) {
        let next = match self.theme.mode {
            Mode::Standard => Mode::Scientific,
            Mode::Scientific => Mode::Standard,
        };
        self.theme.mode = next;
        if next == Mode::Scientific && self.sci.is_empty() {
            self.sci.add_blank();
        }
        // The old panel's focus no longer points at anything visible.
        self.focus = Focus::Keypad;
        self.mark_dirty();
        self.schedule_save();
    }

    pub fn toggle_dark_mode(&mut self) {
        self.theme.toggle_dark_mode();
        self.mark_dirty();
        self.schedule_save();
    }

    pub fn next_theme(&mut self) {
        self.theme.next_theme();
        self.mark_dirty();
        self.schedule_save();
    }

    // =========================================================
    // Clipboard
    // =========================================================

    /// Copy a result to the system clipboard, stripping display-only
    /// characters. Fire-and-forget: failures surface as a toast only.
    pub fn copy_text(&mut self, text: &str) {
        let raw: String = text.chars().filter(|c| *c != '%' && *c != ',').collect();
        if raw.is_empty() {
            return;
        }
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(raw)) {
            Ok(()) => self.show_toast("Copied to clipboard!"),
            Err(e) => {
                tracing::warn!("clipboard copy failed: {e}");
                self.show_toast("Copy failed");
            }
        }
    }

    // =========================================================
    // Persistence
    // =========================================================

    /// Restart the save debounce window.
    pub fn schedule_save(&mut self) {
        self.save_deadline = Some(Instant::now() + SAVE_DEBOUNCE);
    }

    pub fn save_pending(&self) -> bool {
        self.save_deadline.is_some()
    }

    /// Periodic housekeeping: expire the toast, flush a due save.
    pub fn tick(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.shown_at.elapsed() >= TOAST_DURATION {
                self.toast = None;
                self.mark_dirty();
            }
        }

        if let Some(deadline) = self.save_deadline {
            if Instant::now() >= deadline {
                self.save_deadline = None;
                self.save_session();
            }
        }
    }

    /// Serialize the session and write it out. Failures are logged, never
    /// propagated; a failed autosave must not disturb the session.
    pub fn save_session(&mut self) {
        let snapshot = Snapshot::capture(&self.theme, &self.cards, &self.sci, &self.tape);
        match snapshot.to_json() {
            Ok(json) => {
                if let Err(e) = self.store.save(&json) {
                    tracing::warn!("Autosave failed: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize snapshot: {e}"),
        }
    }

    /// Load and replay the persisted snapshot, if any.
    ///
    /// Returns the deferred scientific-row assignments still to be applied
    /// (empty on a cold start or a failed restore; both fall back to the
    /// default blank-row initialization already in place).
    pub fn load_session(&mut self) -> Vec<SciAssign> {
        let json = match self.store.load() {
            Ok(Some(json)) => json,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read snapshot: {e}");
                return Vec::new();
            }
        };

        match Snapshot::from_json(&json) {
            Ok(snapshot) => session::restore(
                &snapshot,
                &mut self.theme,
                &mut self.cards,
                &mut self.sci,
                &mut self.tape,
                self.terminal_width,
            ),
            Err(e) => {
                tracing::warn!("Restore failed, starting fresh: {e}");
                Vec::new()
            }
        }
    }

    /// Schedule the deferred restore assignments on the runtime.
    ///
    /// Each assignment is an independent fire-and-forget task; nothing is
    /// cancelled if the user edits or deletes rows while they are in
    /// flight; the handler tolerates the miss.
    pub fn schedule_sci_restore(&self, assigns: Vec<SciAssign>) {
        for assign in assigns {
            let tx = self.message_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(assign.delay).await;
                let _ = tx.send(AppMessage::AssignSciRow {
                    index: assign.index,
                    value: assign.value,
                });
            });
        }
    }

    /// Full startup restore: load, replay, schedule deferred assignments.
    pub fn restore_session(&mut self) {
        let assigns = self.load_session();
        self.schedule_sci_restore(assigns);
        self.mark_dirty();
    }

    /// Handle one message from the app channel.
    pub fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::AssignSciRow { index, value } => {
                if !self.sci.assign(index, value) {
                    tracing::debug!(index, "deferred sci assignment target gone");
                }
                self.mark_dirty();
                self.schedule_save();
            }
        }
    }
}
