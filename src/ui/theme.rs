//! Immutable style tables.
//!
//! Both front ends receive a [`Theme`] at construction instead of reaching
//! into process-wide mutable tables; the renderers stay free of global state.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub user_prefix: Style,
    pub assistant_prefix: Style,
    pub assistant_text: Style,
    pub notice: Style,
    pub error: Style,
    pub streaming: Style,
    pub input_border: Style,
    pub title: Style,

    // Markdown rendering styles.
    pub md_heading: Style,
    pub md_code: Style,
    pub md_emphasis: Style,
    pub md_strong: Style,
    pub md_blockquote: Style,
    pub md_link: Style,
    pub md_rule: Style,

    pub spinner_frames: &'static [&'static str],
    pub spinner_interval_ms: u64,
}

impl Theme {
    pub fn dark() -> Self {
        Theme {
            user_prefix: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            assistant_prefix: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            assistant_text: Style::default().fg(Color::White),
            notice: Style::default().fg(Color::DarkGray),
            error: Style::default().fg(Color::Red),
            streaming: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            input_border: Style::default().fg(Color::Yellow),
            title: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),

            md_heading: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            md_code: Style::default().fg(Color::Yellow),
            md_emphasis: Style::default().add_modifier(Modifier::ITALIC),
            md_strong: Style::default().add_modifier(Modifier::BOLD),
            md_blockquote: Style::default().fg(Color::DarkGray),
            md_link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            md_rule: Style::default().fg(Color::DarkGray),

            spinner_frames: &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
            spinner_interval_ms: 80,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::dark()
    }
}
