//! UI rendering for the tally calculator.
//!
//! One frame = three surfaces:
//! - Left panel: percentage cards (standard mode) or scientific rows
//! - Right panel: calculator display + keypad legend, audit tape below
//! - Bottom: keybind hints, with toast notices overlaid on the right

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Focus, RowField};
use crate::rows::CardKind;
use crate::theme::Mode;

// ============================================================================
// Main UI Rendering
// ============================================================================

/// Render the whole frame.
pub fn render(frame: &mut Frame, app: &App) {
    let size = frame.area();

    // Paint the themed background before anything else.
    let background = Block::default().style(Style::default().bg(app.theme.bg()).fg(app.theme.fg()));
    frame.render_widget(background, size);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),   // Panels
            Constraint::Length(1), // Hints / toast
        ])
        .split(size);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[0]);

    match app.theme.mode {
        Mode::Standard => render_cards(frame, panels[0], app),
        Mode::Scientific => render_sci_rows(frame, panels[0], app),
    }

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Calculator
            Constraint::Min(5),    // Audit tape
        ])
        .split(panels[1]);

    render_calculator(frame, right[0], app);
    render_tape(frame, right[1], app);
    render_hints(frame, chunks[1], app);
}

fn panel_block<'a>(app: &App, title: &'a str, focused: bool) -> Block<'a> {
    let border_style = if focused {
        Style::default()
            .fg(app.theme.accent())
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(app.theme.accent())
    };
    let border_type = if focused {
        BorderType::Thick
    } else {
        BorderType::Rounded
    };
    Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(title)
}

// ============================================================================
// Calculator Panel
// ============================================================================

fn render_calculator(frame: &mut Frame, area: Rect, app: &App) {
    let focused = matches!(app.focus, Focus::Keypad);
    let block = panel_block(app, " Calculator ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let dim = Style::default().add_modifier(Modifier::DIM);
    let display_style = Style::default().add_modifier(Modifier::BOLD);

    let memory_marker = if app.calc.memory_set() { "M" } else { " " };
    let display = fit_display(&app.calc.display_value(), inner.width.saturating_sub(3));

    let lines = vec![
        Line::from(Span::styled(app.calc.preview_text(), dim)).alignment(Alignment::Right),
        Line::from(Span::styled(display, display_style)).alignment(Alignment::Right),
        Line::default(),
        Line::from(vec![
            Span::styled(memory_marker, Style::default().fg(app.theme.accent())),
            Span::raw("  "),
            Span::styled(mode_label(app), dim),
            Span::raw("  "),
            Span::styled(theme_label(app), dim),
        ]),
        Line::from(Span::styled(
            "0-9 . + - * / = % | n ± | c clear",
            dim,
        )),
    ];

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Truncate an over-long display value from the left, keeping the least
/// significant digits visible while typing.
fn fit_display(value: &str, width: u16) -> String {
    let width = width as usize;
    if value.width() <= width {
        return value.to_string();
    }
    let skip = value.chars().count().saturating_sub(width.saturating_sub(1));
    let tail: String = value.chars().skip(skip).collect();
    format!("…{tail}")
}

fn mode_label(app: &App) -> &'static str {
    match app.theme.mode {
        Mode::Standard => "standard",
        Mode::Scientific => "scientific",
    }
}

fn theme_label(app: &App) -> String {
    if app.theme.theme.is_empty() {
        "default".to_string()
    } else {
        app.theme
            .theme
            .trim_start_matches("theme-")
            .to_string()
    }
}

// ============================================================================
// Percentage Cards Panel
// ============================================================================

fn render_cards(frame: &mut Frame, area: Rect, app: &App) {
    let focused = matches!(app.focus, Focus::Card { .. });
    let block = panel_block(app, " Percentage Tools ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let dim = Style::default().add_modifier(Modifier::DIM);
    let mut lines: Vec<Line> = Vec::new();

    for kind in CardKind::ALL {
        lines.push(Line::from(Span::styled(
            kind.label(),
            Style::default()
                .fg(app.theme.accent())
                .add_modifier(Modifier::BOLD),
        )));

        if app.cards.rows(kind).is_empty() {
            lines.push(Line::from(Span::styled("  (no rows)", dim)));
        }
        for (row_idx, row) in app.cards.rows(kind).iter().enumerate() {
            let (x_focused, y_focused) = match app.focus {
                Focus::Card { kind: k, row: r, field } if k == kind && r == row_idx => {
                    (field == RowField::X, field == RowField::Y)
                }
                _ => (false, false),
            };
            lines.push(Line::from(vec![
                Span::raw("  X "),
                input_span(app, &row.x, x_focused),
                Span::raw("  Y "),
                input_span(app, &row.y, y_focused),
                Span::raw("  = "),
                Span::styled(
                    row.result(kind),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]));
        }
        lines.push(Line::default());
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn input_span<'a>(app: &App, value: &'a str, focused: bool) -> Span<'a> {
    let shown = if value.is_empty() { "____" } else { value };
    if focused {
        Span::styled(
            shown,
            Style::default()
                .fg(app.theme.bg())
                .bg(app.theme.accent())
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(shown, Style::default().add_modifier(Modifier::UNDERLINED))
    }
}

// ============================================================================
// Scientific Rows Panel
// ============================================================================

fn render_sci_rows(frame: &mut Frame, area: Rect, app: &App) {
    let focused = matches!(app.focus, Focus::Sci { .. });
    let block = panel_block(app, " Scientific ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let dim = Style::default().add_modifier(Modifier::DIM);
    let mut lines: Vec<Line> = Vec::new();

    if app.sci.is_empty() {
        lines.push(Line::from(Span::styled("  (no rows, Ctrl+N adds one)", dim)));
    }
    for (row_idx, row) in app.sci.rows().iter().enumerate() {
        let row_focused = matches!(app.focus, Focus::Sci { row: r } if r == row_idx);
        lines.push(Line::from(vec![
            Span::raw("  "),
            input_span(app, &row.raw, row_focused),
        ]));
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(row.result_text(), Style::default().add_modifier(Modifier::BOLD)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

// ============================================================================
// Audit Tape Panel
// ============================================================================

fn render_tape(frame: &mut Frame, area: Rect, app: &App) {
    let focused = matches!(app.focus, Focus::Tape { .. });
    let title = format!(" Audit Tape ({}) ", app.tape.len());
    let block = panel_block(app, &title, focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let dim = Style::default().add_modifier(Modifier::DIM);
    let selected = match app.focus {
        Focus::Tape { entry } => Some(entry),
        _ => None,
    };

    // Keep the selected entry in view: the tape is newest-first, so just
    // scroll the window down to the selection.
    let visible = (inner.height as usize) / 2;
    let first = match selected {
        Some(entry) if visible > 0 => entry.saturating_sub(visible - 1),
        _ => 0,
    };

    let mut lines: Vec<Line> = Vec::new();
    if app.tape.is_empty() {
        lines.push(Line::from(Span::styled("  (empty)", dim)));
    }
    for (idx, entry) in app.tape.entries().iter().enumerate().skip(first) {
        let marker = if selected == Some(idx) { "▸ " } else { "  " };
        let result_style = if selected == Some(idx) {
            Style::default()
                .fg(app.theme.accent())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        lines.push(Line::from(Span::styled(
            format!("{marker}{}", entry.equation()),
            dim,
        )));
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(entry.result_text(), result_style),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

// ============================================================================
// Hints and Toasts
// ============================================================================

fn render_hints(frame: &mut Frame, area: Rect, app: &App) {
    let dim = Style::default().add_modifier(Modifier::DIM);
    let hints = match app.focus {
        Focus::Keypad => {
            "Tab panels | Ctrl+A/S/R/X memory | Ctrl+G mode | Ctrl+T dark | Ctrl+E theme | Ctrl+C quit"
        }
        Focus::Card { .. } => {
            "←/→ field | ↑/↓ rows | c copy | Ctrl+N add | Ctrl+D delete | Tab panels"
        }
        Focus::Sci { .. } => "↑/↓ rows | Ctrl+Y copy | Ctrl+N add | Ctrl+D delete | Tab panels",
        Focus::Tape { .. } => "↑/↓ select | Enter use | c copy | Ctrl+U clear tape | Tab panels",
    };
    frame.render_widget(Paragraph::new(Line::from(Span::styled(hints, dim))), area);

    if let Some(toast) = &app.toast {
        let width = (toast.message.width() as u16).min(area.width);
        let toast_area = Rect {
            x: area.x + area.width.saturating_sub(width),
            y: area.y,
            width,
            height: 1,
        };
        frame.render_widget(
            Paragraph::new(Span::styled(
                toast.message.clone(),
                Style::default()
                    .fg(app.theme.bg())
                    .bg(app.theme.accent())
                    .add_modifier(Modifier::BOLD),
            )),
            toast_area,
        );
    }
}
