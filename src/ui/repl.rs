//! The blocking read-eval session loop.
//!
//! Two states: Idle (reading a line) and Querying (a turn in flight).
//! Querying runs the network call concurrently with a spinner task; both
//! share one completion signal, and the engine waits for the spinner to
//! acknowledge the stop and erase itself before the reply is rendered, so
//! the indicator never overlaps the final text. Ctrl-C at any point prints a
//! farewell and terminates the process immediately.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::sync::oneshot;
use tokio::time::{interval, Duration};

use crate::core::session::{
    classify_input, describe_error, CommandOutcome, InputKind, NullSink, SessionCore,
};
use crate::ui::markdown::{paint, render_markdown, render_plain, text_to_ansi};
use crate::ui::theme::Theme;

pub async fn run(
    core: Arc<SessionCore>,
    theme: Theme,
    markdown: bool,
) -> Result<(), Box<dyn Error>> {
    spawn_interrupt_handler();

    let (provider, model) = core.active_names();
    println!(
        "{}",
        paint(&format!("Session with {provider}/{model}"), theme.title)
    );
    println!(
        "{}",
        paint("Type /help for commands, /exit to leave.", theme.notice)
    );
    println!();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", paint("you>", theme.user_prefix));
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // stdin closed
        };
        let input = line.trim().to_string();
        if input.is_empty() {
            continue;
        }

        match classify_input(&input) {
            InputKind::Message => {
                if let Err(message) = execute_query(&core, &theme, markdown, &input).await {
                    println!("{}", paint(&message, theme.error));
                }
            }
            InputKind::Command(command) => match core.dispatch_command(command) {
                CommandOutcome::Notice(text) => println!("{}", paint(&text, theme.notice)),
                CommandOutcome::Exit => {
                    println!("{}", paint("Goodbye!", theme.notice));
                    break;
                }
            },
            InputKind::UnknownCommand(command) => {
                println!(
                    "{}",
                    paint(&format!("Unknown command: {command}"), theme.error)
                );
            }
        }
    }
    Ok(())
}

/// One-shot mode: a single turn against an empty history, rendered like a
/// session reply. The error message is returned instead of printed so the
/// caller can fail the process.
pub async fn run_single(
    core: &SessionCore,
    theme: &Theme,
    markdown: bool,
    prompt: &str,
) -> Result<(), Box<dyn Error>> {
    spawn_interrupt_handler();
    execute_query(core, theme, markdown, prompt)
        .await
        .map_err(Into::into)
}

/// Runs a turn with the progress indicator and renders the reply. Returns
/// the user-facing message on failure; history rollback already happened in
/// the session core.
async fn execute_query(
    core: &SessionCore,
    theme: &Theme,
    markdown: bool,
    input: &str,
) -> Result<(), String> {
    let (done_tx, done_rx) = oneshot::channel();
    let spinner = tokio::spawn(spin(
        theme.spinner_frames,
        theme.spinner_interval_ms,
        done_rx,
    ));

    let result = core.send_turn(input, &mut NullSink).await;

    let _ = done_tx.send(());
    let _ = spinner.await;

    match result {
        Ok(text) => {
            let (_, model) = core.active_names();
            println!("{}", paint(&format!("{model}>"), theme.assistant_prefix));
            let rendered = if markdown {
                render_markdown(&text, theme)
            } else {
                render_plain(&text)
            };
            println!("{}", text_to_ansi(&rendered));
            println!();
            Ok(())
        }
        Err(err) => {
            let (_, model) = core.active_names();
            Err(describe_error(&model, &err))
        }
    }
}

async fn spin(frames: &'static [&'static str], interval_ms: u64, mut done: oneshot::Receiver<()>) {
    let mut ticker = interval(Duration::from_millis(interval_ms));
    let mut frame = 0usize;
    loop {
        tokio::select! {
            _ = &mut done => break,
            _ = ticker.tick() => {
                print!("\r{} thinking...", frames[frame % frames.len()]);
                let _ = io::stdout().flush();
                frame += 1;
            }
        }
    }
    // Erase the indicator before the caller renders anything.
    print!("\r                \r");
    let _ = io::stdout().flush();
}

fn spawn_interrupt_handler() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nGoodbye!");
            std::process::exit(0);
        }
    });
}
