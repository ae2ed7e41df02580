//! The full-screen event-loop session interface.
//!
//! The same Idle/Querying state machine as the blocking REPL, restated
//! reactively: keystrokes, resizes, stream fragments, and stream completion
//! all arrive as events. Fragments are appended to the current streaming
//! text and rendered incrementally; completion commits through the shared
//! session core exactly like the blocking form. A command submitted while a
//! turn is in flight is rejected with a notice.

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unicode_width::UnicodeWidthStr;

use crate::core::session::{
    classify_input, describe_error, Command, CommandOutcome, InputKind, SessionCore,
};
use crate::provider::{ApiError, StreamSink};
use crate::ui::markdown::{render_markdown, render_plain};
use crate::ui::theme::Theme;

const INPUT_HEIGHT: u16 = 3;

#[derive(Debug)]
enum StreamEvent {
    Fragment(String),
    Done(Result<String, ApiError>),
}

/// The live-display sink: forwards each fragment into the event loop the
/// moment it is parsed.
struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl StreamSink for ChannelSink {
    fn push_fragment(&mut self, fragment: &str) {
        let _ = self.tx.send(StreamEvent::Fragment(fragment.to_string()));
    }
}

enum EntryKind {
    User,
    Assistant,
    Notice,
    Error,
}

struct Entry {
    kind: EntryKind,
    text: String,
}

struct App {
    core: Arc<SessionCore>,
    theme: Theme,
    markdown: bool,
    entries: Vec<Entry>,
    input: String,
    current_stream: String,
    loading: bool,
    cancel: Option<CancellationToken>,
    scroll_offset: u16,
    auto_scroll: bool,
}

impl App {
    fn new(core: Arc<SessionCore>, theme: Theme, markdown: bool) -> Self {
        App {
            core,
            theme,
            markdown,
            entries: Vec::new(),
            input: String::new(),
            current_stream: String::new(),
            loading: false,
            cancel: None,
            scroll_offset: 0,
            auto_scroll: true,
        }
    }

    fn push(&mut self, kind: EntryKind, text: impl Into<String>) {
        self.entries.push(Entry {
            kind,
            text: text.into(),
        });
    }

    fn build_display_lines(&self) -> Vec<Line<'static>> {
        let (_, model) = self.core.active_names();
        let mut lines = Vec::new();

        for entry in &self.entries {
            match entry.kind {
                EntryKind::User => {
                    lines.push(Line::from(vec![
                        Span::styled("you> ", self.theme.user_prefix),
                        Span::styled(entry.text.clone(), self.theme.user_prefix),
                    ]));
                    lines.push(Line::default());
                }
                EntryKind::Assistant => {
                    lines.push(Line::from(Span::styled(
                        format!("{model}>"),
                        self.theme.assistant_prefix,
                    )));
                    let rendered = if self.markdown {
                        render_markdown(&entry.text, &self.theme)
                    } else {
                        render_plain(&entry.text)
                    };
                    lines.extend(rendered.lines);
                    lines.push(Line::default());
                }
                EntryKind::Notice => {
                    for text_line in entry.text.lines() {
                        lines.push(Line::from(Span::styled(
                            text_line.to_string(),
                            self.theme.notice,
                        )));
                    }
                    lines.push(Line::default());
                }
                EntryKind::Error => {
                    lines.push(Line::from(Span::styled(
                        entry.text.clone(),
                        self.theme.error,
                    )));
                    lines.push(Line::default());
                }
            }
        }

        if self.loading {
            lines.push(Line::from(Span::styled(
                format!("{model}>"),
                self.theme.assistant_prefix,
            )));
            if self.current_stream.is_empty() {
                lines.push(Line::from(Span::styled(
                    "Thinking...",
                    self.theme.streaming,
                )));
            } else {
                // Partial markdown renders unstably while tokens arrive;
                // stream plain and render the final text on commit.
                lines.extend(render_plain(&self.current_stream).lines);
            }
        }

        lines
    }

    fn max_scroll_offset(&self, available_height: u16) -> u16 {
        let total = self.build_display_lines().len() as u16;
        total.saturating_sub(available_height)
    }

    fn scroll_to_bottom(&mut self, available_height: u16) {
        self.scroll_offset = self.max_scroll_offset(available_height);
    }
}

pub async fn run(
    core: Arc<SessionCore>,
    theme: Theme,
    markdown: bool,
) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, core, theme, markdown).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    core: Arc<SessionCore>,
    theme: Theme,
    markdown: bool,
) -> Result<(), Box<dyn Error>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
    let mut app = App::new(core.clone(), theme, markdown);

    loop {
        terminal.draw(|f| ui(f, &app))?;
        let chat_height = chat_viewport_height(terminal)?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Esc => break,
                    KeyCode::Enter => {
                        if handle_submit(&mut app, &core, &tx, chat_height) {
                            break;
                        }
                    }
                    KeyCode::Char(c) => app.input.push(c),
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Up => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(1);
                    }
                    KeyCode::Down => {
                        let max = app.max_scroll_offset(chat_height);
                        app.scroll_offset = app.scroll_offset.saturating_add(1).min(max);
                        if app.scroll_offset >= max {
                            app.auto_scroll = true;
                        }
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(3);
                    }
                    MouseEventKind::ScrollDown => {
                        let max = app.max_scroll_offset(chat_height);
                        app.scroll_offset = app.scroll_offset.saturating_add(3).min(max);
                        if app.scroll_offset >= max {
                            app.auto_scroll = true;
                        }
                    }
                    _ => {}
                },
                // Layout geometry is recomputed on the next draw; an
                // in-flight stream is untouched.
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        while let Ok(stream_event) = rx.try_recv() {
            match stream_event {
                StreamEvent::Fragment(fragment) => {
                    app.current_stream.push_str(&fragment);
                }
                StreamEvent::Done(result) => {
                    app.loading = false;
                    app.cancel = None;
                    match result {
                        Ok(text) => app.push(EntryKind::Assistant, text),
                        Err(err) => {
                            let (_, model) = app.core.active_names();
                            app.push(EntryKind::Error, describe_error(&model, &err));
                        }
                    }
                    app.current_stream.clear();
                }
            }
            if app.auto_scroll {
                app.scroll_to_bottom(chat_height);
            }
        }
    }

    // Leaving the session entirely; tear down any in-flight stream task.
    if let Some(cancel) = app.cancel.take() {
        cancel.cancel();
    }
    Ok(())
}

/// Handles Enter. Returns true when the session should end.
fn handle_submit(
    app: &mut App,
    core: &Arc<SessionCore>,
    tx: &mpsc::UnboundedSender<StreamEvent>,
    chat_height: u16,
) -> bool {
    let input = app.input.trim().to_string();
    if input.is_empty() {
        return false;
    }

    // One turn in flight at a time: reject rather than queue or interleave.
    if app.loading {
        app.push(
            EntryKind::Notice,
            "Wait for the current response to finish.",
        );
        return false;
    }
    app.input.clear();

    match classify_input(&input) {
        InputKind::Message => {
            app.push(EntryKind::User, input.clone());
            app.loading = true;
            app.current_stream.clear();
            app.auto_scroll = true;
            app.scroll_to_bottom(chat_height);

            let cancel = CancellationToken::new();
            app.cancel = Some(cancel.clone());

            let core = core.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut sink = ChannelSink { tx: tx.clone() };
                tokio::select! {
                    result = core.send_turn(&input, &mut sink) => {
                        let _ = tx.send(StreamEvent::Done(result));
                    }
                    _ = cancel.cancelled() => {}
                }
            });
        }
        InputKind::Command(command) => {
            let is_clear = command == Command::Clear;
            match core.dispatch_command(command) {
                CommandOutcome::Exit => return true,
                CommandOutcome::Notice(text) => {
                    if is_clear {
                        app.entries.clear();
                        app.scroll_offset = 0;
                    }
                    app.push(EntryKind::Notice, text);
                }
            }
        }
        InputKind::UnknownCommand(command) => {
            app.push(EntryKind::Error, format!("Unknown command: {command}"));
        }
    }
    if app.auto_scroll {
        app.scroll_to_bottom(chat_height);
    }
    false
}

fn chat_viewport_height(
    terminal: &Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<u16, Box<dyn Error>> {
    let size = terminal.size()?;
    // Minus the input area and the chat title row.
    Ok(size.height.saturating_sub(INPUT_HEIGHT).saturating_sub(1))
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(INPUT_HEIGHT)])
        .split(f.area());

    let (provider, model) = app.core.active_names();
    let lines = app.build_display_lines();

    let available_height = chunks[0].height.saturating_sub(1);
    let max_offset = (lines.len() as u16).saturating_sub(available_height);
    let scroll_offset = if app.auto_scroll {
        max_offset
    } else {
        app.scroll_offset.min(max_offset)
    };

    let chat = Paragraph::new(Text::from(lines))
        .block(Block::default().title(Span::styled(
            format!(" {provider}/{model} "),
            app.theme.title,
        )))
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset, 0));
    f.render_widget(chat, chunks[0]);

    let input_title = if app.loading {
        " Streaming... "
    } else {
        " Enter to send · /help for commands · Ctrl+C to quit "
    };
    let input = Paragraph::new(app.input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.theme.input_border)
                .title(Span::styled(input_title, app.theme.notice)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(input, chunks[1]);

    let cursor_x = chunks[1].x + 1 + app.input.width() as u16;
    f.set_cursor_position((cursor_x.min(chunks[1].right().saturating_sub(2)), chunks[1].y + 1));
}
