//! Chained-arithmetic state machine for the main calculator.
//!
//! The engine owns a single [`Calculator`] value and applies keypad
//! transitions to it. It has no view knowledge: the shell maps key events
//! to transition calls and renders the read-only accessors back out.
//!
//! Numeric semantics follow the display conventions of a desk calculator:
//! division by zero aborts the transition (the state is left untouched and
//! the caller shows a notice), any non-finite result is clamped to zero,
//! and results round-trip through the canonical `f64` display form;
//! floating-point artifacts like `0.1 + 0.2` are accepted, not corrected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditEntry, AuditTape};
use crate::format;

/// Most digits a number under edit may hold (digits only, sign and decimal
/// point excluded).
pub const INPUT_LENGTH_LIMIT: usize = 15;

/// A pending or completed binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    /// The persisted tag, shared with the snapshot format.
    pub fn tag(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Subtract),
            "*" => Some(Operator::Multiply),
            "/" => Some(Operator::Divide),
            _ => None,
        }
    }

    /// Display symbol: `×`/`÷`/`−` instead of the internal tags.
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '−',
            Operator::Multiply => '×',
            Operator::Divide => '÷',
        }
    }
}

/// Memory register actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAction {
    Clear,
    Recall,
    Add,
    Subtract,
}

/// Failures the engine signals to the shell instead of mutating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("Cannot divide by zero")]
    DivideByZero,
}

/// The calculator state machine.
///
/// Invariant: `operator` is set iff a binary operation is pending, and
/// `previous_value` is set iff `operator` is. `current_value` is always a
/// valid partial-or-complete decimal literal: never empty, never a bare
/// `-`.
#[derive(Debug, Clone, PartialEq)]
pub struct Calculator {
    current_value: String,
    previous_value: Option<f64>,
    operator: Option<Operator>,
    reset_next: bool,
    memory_value: f64,
}

impl Default for Calculator {
    fn default() -> Self {
        Self {
            current_value: "0".to_string(),
            previous_value: None,
            operator: None,
            reset_next: false,
            memory_value: 0.0,
        }
    }
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw decimal string under edit.
    pub fn current_value(&self) -> &str {
        &self.current_value
    }

    /// Numeric value of the string under edit.
    pub fn numeric(&self) -> f64 {
        self.current_value.parse().unwrap_or(0.0)
    }

    /// True when the memory register holds a non-zero value (drives the
    /// `M` indicator).
    pub fn memory_set(&self) -> bool {
        self.memory_value != 0.0
    }

    pub fn memory_value(&self) -> f64 {
        self.memory_value
    }

    /// Grouped display form of the value under edit. A trailing decimal
    /// point the user just typed is preserved.
    pub fn display_value(&self) -> String {
        let has_dot = self.current_value.ends_with('.');
        let value = self.numeric();
        let mut formatted = format::format_number(value);
        if has_dot {
            formatted.push('.');
        }
        formatted
    }

    /// Preview line above the display: `12 ×` while an operation is
    /// pending, empty otherwise.
    pub fn preview_text(&self) -> String {
        match (self.previous_value, self.operator) {
            (Some(prev), Some(op)) => {
                format!("{} {}", format::format_number(prev), op.symbol())
            }
            _ => String::new(),
        }
    }

    /// Enter one digit or the decimal point.
    ///
    /// Anything that would break the literal is silently dropped: digits
    /// past the length limit, a second decimal point. Typing over `0` or
    /// `-0` replaces the zero in place, keeping the sign.
    pub fn digit(&mut self, d: char) {
        if self.reset_next {
            self.current_value = d.to_string();
            self.reset_next = false;
            return;
        }

        let digit_count = self
            .current_value
            .chars()
            .filter(char::is_ascii_digit)
            .count();
        if digit_count >= INPUT_LENGTH_LIMIT {
            return;
        }

        if d == '.' {
            if !self.current_value.contains('.') {
                self.current_value.push('.');
            }
        } else if self.current_value == "0" || self.current_value == "-0" {
            self.current_value = if self.current_value.starts_with('-') {
                format!("-{d}")
            } else {
                d.to_string()
            };
        } else {
            self.current_value.push(d);
        }
    }

    /// Start (or chain) a binary operation.
    ///
    /// If an operation is already pending and the right operand has been
    /// typed, the pending operation is evaluated first, without logging,
    /// so `2 + 3 *` continues from `5`. Division by zero in that chained
    /// step leaves the operands as they were but the new operator is still
    /// armed; the error is reported for the shell's notice.
    pub fn operator(&mut self, op: Operator, tape: &mut AuditTape) -> Result<(), CalcError> {
        let mut chained = Ok(());
        if self.operator.is_some() && !self.reset_next {
            chained = self.equals_inner(tape, false);
        }
        self.previous_value = Some(self.numeric());
        self.operator = Some(op);
        self.reset_next = true;
        chained
    }

    /// Evaluate the pending operation and log it on the audit tape.
    ///
    /// A no-op when nothing is pending, so a second equals after the first
    /// does nothing. Division by zero aborts with the state unchanged and
    /// nothing logged.
    pub fn equals(&mut self, tape: &mut AuditTape) -> Result<(), CalcError> {
        self.equals_inner(tape, true)
    }

    fn equals_inner(&mut self, tape: &mut AuditTape, log_history: bool) -> Result<(), CalcError> {
        let (Some(op), Some(prev)) = (self.operator, self.previous_value) else {
            return Ok(());
        };

        let current = self.numeric();
        let result = apply(prev, current, op)?;

        // Log before touching any state so an aborted transition can never
        // leave a phantom entry behind.
        if log_history {
            tape.push(AuditEntry::new(prev, current, op, result));
        }

        self.current_value = result.to_string();
        self.previous_value = None;
        self.operator = None;
        self.reset_next = true;
        Ok(())
    }

    /// Divide the value under edit by 100.
    ///
    /// Percent acts as a terminal unary op on a bare number: it arms
    /// `reset_next` so a following digit starts fresh, but only when no
    /// operation is pending and no reset was already due, which keeps
    /// `2 + 50 %` chainable. That asymmetry is intentional.
    pub fn percent(&mut self) {
        let Ok(value) = self.current_value.parse::<f64>() else {
            return;
        };
        self.current_value = (value / 100.0).to_string();
        if !self.reset_next && self.operator.is_none() {
            self.reset_next = true;
        }
    }

    /// Flip the sign of the value under edit. Zero stays unsigned.
    pub fn toggle_sign(&mut self) {
        if self.current_value == "0" || self.current_value == "0." {
            return;
        }
        if let Some(stripped) = self.current_value.strip_prefix('-') {
            self.current_value = stripped.to_string();
        } else {
            self.current_value = format!("-{}", self.current_value);
        }
    }

    /// Apply a memory register action.
    pub fn memory(&mut self, action: MemoryAction) {
        match action {
            MemoryAction::Clear => {
                self.memory_value = 0.0;
            }
            MemoryAction::Recall => {
                self.current_value = self.memory_value.to_string();
                self.reset_next = true;
            }
            MemoryAction::Add => {
                if let Ok(value) = self.current_value.parse::<f64>() {
                    self.memory_value += value;
                    self.reset_next = true;
                }
            }
            MemoryAction::Subtract => {
                if let Ok(value) = self.current_value.parse::<f64>() {
                    self.memory_value -= value;
                    self.reset_next = true;
                }
            }
        }
    }

    /// Reset the working state. The memory register survives Clear.
    pub fn clear(&mut self) {
        self.current_value = "0".to_string();
        self.previous_value = None;
        self.operator = None;
        self.reset_next = false;
    }

    /// Drop the last typed character. Inert right after an evaluation;
    /// deleting the final digit (or leaving a bare `-`) normalizes back to
    /// `0`.
    pub fn backspace(&mut self) {
        if self.reset_next {
            return;
        }
        self.current_value.pop();
        if self.current_value.is_empty() || self.current_value == "-" {
            self.current_value = "0".to_string();
        }
    }

    /// Inject a historical result from the audit tape ("Use"). A one-way
    /// read: the tape itself is never touched.
    pub fn use_value(&mut self, value: f64) {
        self.current_value = value.to_string();
        self.reset_next = true;
    }
}

/// Apply one binary operation with the engine's numeric semantics:
/// division by zero is an error, any non-finite result clamps to zero.
fn apply(a: f64, b: f64, op: Operator) -> Result<f64, CalcError> {
    let result = match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => {
            if b == 0.0 {
                return Err(CalcError::DivideByZero);
            }
            a / b
        }
    };
    if !result.is_finite() {
        return Ok(0.0);
    }
    Ok(result)
}
