use tally::app::{Action, App, AppMessage, Focus, RowField};
use tally::engine::{MemoryAction, Operator};
use tally::ui;

use color_eyre::Result;
use crossterm::{
    cursor::Show,
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tokio::sync::mpsc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("tally {}", VERSION);
        std::process::exit(0);
    }

    color_eyre::install()?;
    init_logging();
    setup_panic_hook();

    let runtime = tokio::runtime::Runtime::new()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new()?;

    let size = terminal.size()?;
    app.update_terminal_dimensions(size.width, size.height);

    // Main event loop; the session restore runs inside the runtime so the
    // staggered row assignments can be scheduled.
    let result = runtime.block_on(run_app(&mut terminal, &mut app));

    // Flush any pending state before leaving.
    app.save_session();

    restore_terminal(&mut terminal)?;
    result
}

/// Route logs to a file next to the snapshot; a TUI cannot log to the
/// terminal it draws on. Logging is best-effort: failure to open the file
/// just disables it.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let Some(dir) = dirs::data_dir().or_else(dirs::home_dir) else {
        return;
    };
    let path = dir.join("tally").join("tally.log");
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = std::fs::File::create(&path) else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

/// Setup panic hook to restore the terminal on panic
fn setup_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = execute!(io::stdout(), Show);
        original_hook(panic_info);
    }));
}

/// Restore terminal to normal mode
fn restore_terminal<B: ratatui::backend::Backend + std::io::Write>(
    terminal: &mut Terminal<B>,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    // Replay the previous session now that a runtime is available for the
    // deferred row assignments.
    app.restore_session();

    let mut event_stream = EventStream::new();

    // Take the message receiver from the app (we need ownership for select!)
    let mut message_rx: Option<mpsc::UnboundedReceiver<AppMessage>> = app.message_rx.take();

    loop {
        if app.needs_redraw {
            terminal.draw(|f| {
                ui::render(f, &*app);
            })?;
            app.needs_redraw = false;
        }

        // 16ms tick drives toast expiry and the debounced save.
        let timeout = tokio::time::sleep(std::time::Duration::from_millis(16));

        tokio::select! {
            _ = timeout => {
                app.tick();
            }

            event_result = event_stream.next() => {
                if let Some(Ok(event)) = event_result {
                    match event {
                        Event::Resize(width, height) => {
                            app.update_terminal_dimensions(width, height);
                        }
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            handle_key(app, key.code, key.modifiers);
                        }
                        _ => {}
                    }
                }
            }

            // Deferred work (staggered restore assignments)
            msg = async {
                match &mut message_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Some(msg) = msg {
                    app.handle_message(msg);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Map one key press onto the app.
///
/// The keypad surface funnels into the closed [`Action`] enum; everything
/// else (focus movement, row editing, theme keys) calls the app directly.
fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Global keybinds (always active)
    if modifiers.contains(KeyModifiers::CONTROL) {
        match code {
            KeyCode::Char('c') => {
                app.quit();
                return;
            }
            KeyCode::Char('g') => {
                app.toggle_mode();
                return;
            }
            KeyCode::Char('t') => {
                app.toggle_dark_mode();
                return;
            }
            KeyCode::Char('e') => {
                app.next_theme();
                return;
            }
            KeyCode::Char('n') => {
                app.add_row_at_focus();
                return;
            }
            KeyCode::Char('d') => {
                app.delete_row_at_focus();
                return;
            }
            KeyCode::Char('u') => {
                app.clear_tape();
                return;
            }
            KeyCode::Char('y') => {
                app.copy_focused_result();
                return;
            }
            // Memory register: Ctrl+X clear, Ctrl+R recall, Ctrl+A add,
            // Ctrl+S subtract.
            KeyCode::Char('x') => {
                app.apply_action(Action::Memory(MemoryAction::Clear));
                return;
            }
            KeyCode::Char('r') => {
                app.apply_action(Action::Memory(MemoryAction::Recall));
                return;
            }
            KeyCode::Char('a') => {
                app.apply_action(Action::Memory(MemoryAction::Add));
                return;
            }
            KeyCode::Char('s') => {
                app.apply_action(Action::Memory(MemoryAction::Subtract));
                return;
            }
            _ => {}
        }
    }

    if code == KeyCode::Tab {
        app.focus_next_panel();
        return;
    }

    match app.focus {
        Focus::Keypad => handle_keypad_key(app, code),
        Focus::Card { .. } => match code {
            KeyCode::Up => app.focus_up(),
            KeyCode::Down => app.focus_down(),
            KeyCode::Left => app.focus_field(RowField::X),
            KeyCode::Right => app.focus_field(RowField::Y),
            KeyCode::Backspace => app.edit_focused_backspace(),
            KeyCode::Esc => {
                app.focus = Focus::Keypad;
                app.mark_dirty();
            }
            KeyCode::Char('c') => app.copy_focused_result(),
            KeyCode::Char(c) => app.edit_focused_char(c),
            _ => {}
        },
        Focus::Sci { .. } => match code {
            KeyCode::Up => app.focus_up(),
            KeyCode::Down => app.focus_down(),
            KeyCode::Backspace => app.edit_focused_backspace(),
            KeyCode::Esc => {
                app.focus = Focus::Keypad;
                app.mark_dirty();
            }
            KeyCode::Char(c) => app.edit_focused_char(c),
            _ => {}
        },
        Focus::Tape { entry } => match code {
            KeyCode::Up => app.focus_up(),
            KeyCode::Down => app.focus_down(),
            KeyCode::Enter => app.use_audit_entry(entry),
            KeyCode::Char('c') => app.copy_audit_entry(entry),
            KeyCode::Esc => {
                app.focus = Focus::Keypad;
                app.mark_dirty();
            }
            _ => {}
        },
    }
}

/// The keypad: a direct transcription of the calculator's input surface.
fn handle_keypad_key(app: &mut App, code: KeyCode) {
    let action = match code {
        KeyCode::Char(d @ '0'..='9') => Action::Digit(d),
        KeyCode::Char('.') => Action::Digit('.'),
        KeyCode::Char('+') => Action::Op(Operator::Add),
        KeyCode::Char('-') => Action::Op(Operator::Subtract),
        KeyCode::Char('*') => Action::Op(Operator::Multiply),
        KeyCode::Char('/') => Action::Op(Operator::Divide),
        KeyCode::Char('=') | KeyCode::Enter => Action::Equals,
        KeyCode::Char('%') => Action::Percent,
        KeyCode::Char('n') => Action::ToggleSign,
        KeyCode::Char('c') | KeyCode::Esc => Action::Clear,
        KeyCode::Backspace => Action::Backspace,
        _ => return,
    };
    app.apply_action(action);
}
