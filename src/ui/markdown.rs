//! Markdown-to-terminal rendering.
//!
//! Takes a complete or partial text blob, produces styled text, and never
//! fails the caller: unknown constructs pass through as plain text, and
//! callers that disable markdown get [`render_plain`]. The same renderer
//! feeds both front ends — the TUI consumes the [`Text`] directly, the
//! blocking REPL converts it to ANSI with [`text_to_ansi`].

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::ui::theme::Theme;

pub fn render_markdown(input: &str, theme: &Theme) -> Text<'static> {
    let mut renderer = Renderer::new(theme);
    let parser = Parser::new_ext(input, Options::ENABLE_STRIKETHROUGH);
    for event in parser {
        renderer.event(event);
    }
    renderer.finish()
}

pub fn render_plain(input: &str) -> Text<'static> {
    Text::from(
        input
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect::<Vec<_>>(),
    )
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

struct Renderer<'t> {
    theme: &'t Theme,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    list_stack: Vec<Option<u64>>,
    quote_depth: usize,
    code_buf: Option<String>,
    needs_blank: bool,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme) -> Self {
        Renderer {
            theme,
            lines: Vec::new(),
            spans: Vec::new(),
            style_stack: Vec::new(),
            list_stack: Vec::new(),
            quote_depth: 0,
            code_buf: None,
            needs_blank: false,
        }
    }

    fn current_style(&self) -> Style {
        self.style_stack
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn begin_block(&mut self) {
        if self.needs_blank && !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.needs_blank = false;
    }

    fn flush_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = Vec::new();
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "▌ ".repeat(self.quote_depth),
                self.theme.md_blockquote,
            ));
        }
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.spans
            .push(Span::styled(text.to_string(), self.current_style()));
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(buf) = self.code_buf.as_mut() {
                    buf.push_str(&text);
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                self.spans
                    .push(Span::styled(format!("`{code}`"), self.theme.md_code));
            }
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.begin_block();
                self.lines
                    .push(Line::from(Span::styled("─".repeat(40), self.theme.md_rule)));
                self.needs_blank = true;
            }
            // Raw HTML and anything else passes through untouched.
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.begin_block(),
            Tag::Heading { level, .. } => {
                self.begin_block();
                self.style_stack.push(self.theme.md_heading);
                let marker = "#".repeat(heading_depth(level));
                self.push_text(&format!("{marker} "));
            }
            Tag::BlockQuote(_) => {
                self.begin_block();
                self.quote_depth += 1;
            }
            Tag::List(start) => {
                if self.list_stack.is_empty() {
                    self.begin_block();
                }
                self.list_stack.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let indent = "  ".repeat(self.list_stack.len().saturating_sub(1));
                let marker = match self.list_stack.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.spans.push(Span::raw(marker));
            }
            Tag::CodeBlock(_) => {
                self.begin_block();
                self.code_buf = Some(String::new());
            }
            Tag::Emphasis => self.style_stack.push(self.theme.md_emphasis),
            Tag::Strong => self.style_stack.push(self.theme.md_strong),
            Tag::Strikethrough => self
                .style_stack
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => self.style_stack.push(self.theme.md_link),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                self.needs_blank = true;
            }
            TagEnd::Heading(_) => {
                self.style_stack.pop();
                self.flush_line();
                self.needs_blank = true;
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.needs_blank = true;
            }
            TagEnd::List(_) => {
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.needs_blank = true;
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::CodeBlock => {
                if let Some(buf) = self.code_buf.take() {
                    for line in buf.lines() {
                        self.lines.push(Line::from(Span::styled(
                            format!("  {line}"),
                            self.theme.md_code,
                        )));
                    }
                }
                self.needs_blank = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.style_stack.pop();
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush_line();
        Text::from(self.lines)
    }
}

/// Converts rendered text to an ANSI string for the non-TUI paths. Only the
/// attributes the themes use are mapped; unknown colors degrade to plain
/// text rather than failing.
pub fn text_to_ansi(text: &Text<'_>) -> String {
    let mut out = String::new();
    for (i, line) in text.lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for span in &line.spans {
            let codes = sgr_codes(&span.style);
            if codes.is_empty() {
                out.push_str(&span.content);
            } else {
                let joined = codes
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(";");
                out.push_str(&format!("\x1b[{joined}m{}\x1b[0m", span.content));
            }
        }
    }
    out
}

/// Styles a single run of text for plain-terminal output. Shared by the
/// blocking REPL for prompts, notices, and errors.
pub fn paint(text: &str, style: Style) -> String {
    let codes = sgr_codes(&style);
    if codes.is_empty() {
        return text.to_string();
    }
    let joined = codes
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(";");
    format!("\x1b[{joined}m{text}\x1b[0m")
}

fn sgr_codes(style: &Style) -> Vec<u8> {
    let mut codes = Vec::new();
    let modifiers = style.add_modifier;
    if modifiers.contains(Modifier::BOLD) {
        codes.push(1);
    }
    if modifiers.contains(Modifier::ITALIC) {
        codes.push(3);
    }
    if modifiers.contains(Modifier::UNDERLINED) {
        codes.push(4);
    }
    if modifiers.contains(Modifier::CROSSED_OUT) {
        codes.push(9);
    }
    if let Some(fg) = ansi_fg(style.fg) {
        codes.push(fg);
    }
    codes
}

fn ansi_fg(color: Option<Color>) -> Option<u8> {
    match color? {
        Color::Black => Some(30),
        Color::Red => Some(31),
        Color::Green => Some(32),
        Color::Yellow => Some(33),
        Color::Blue => Some(34),
        Color::Magenta => Some(35),
        Color::Cyan => Some(36),
        Color::Gray => Some(37),
        Color::DarkGray => Some(90),
        Color::LightRed => Some(91),
        Color::LightGreen => Some(92),
        Color::LightYellow => Some(93),
        Color::LightBlue => Some(94),
        Color::LightMagenta => Some(95),
        Color::LightCyan => Some(96),
        Color::White => Some(97),
        _ => None,
    }
}
