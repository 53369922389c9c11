//! Bridge to the external expression evaluator behind scientific rows.
//!
//! Anything the evaluator cannot handle (syntax errors, non-numeric
//! results, unknown identifiers) is "no result", never an error that
//! propagates. The one exception surfaced to the user is an expression
//! over the hard length limit, which gets its own marker text.

/// Hard cap on expression length, guarding the evaluator against
/// pathological input.
pub const MAX_EXPR_LEN: usize = 1000;

/// Outcome of evaluating one raw expression string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExprResult {
    /// Empty input, or anything the evaluator rejected.
    Blank,
    /// A finite numeric result.
    Value(f64),
    /// Input over [`MAX_EXPR_LEN`].
    TooLong,
}

/// Evaluate a raw expression.
pub fn evaluate(raw: &str) -> ExprResult {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ExprResult::Blank;
    }
    if raw.len() > MAX_EXPR_LEN {
        return ExprResult::TooLong;
    }

    match evalexpr::eval(trimmed) {
        Ok(value) => match value.as_number() {
            Ok(n) if n.is_finite() => ExprResult::Value(n),
            _ => ExprResult::Blank,
        },
        Err(e) => {
            tracing::debug!("expression rejected: {e}");
            ExprResult::Blank
        }
    }
}

/// Display form of a row result: `= ` when blank, `= 1,234.5` otherwise.
pub fn result_text(raw: &str) -> String {
    match evaluate(raw) {
        ExprResult::Blank => "= ".to_string(),
        ExprResult::Value(n) => format!("= {}", crate::format::format_number(n)),
        ExprResult::TooLong => "= ERR: TOO LONG".to_string(),
    }
}
