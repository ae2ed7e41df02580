//! Ask is a terminal client for conversing with remote AI models.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`provider`] implements the uniform streaming contract over each
//!   backend's wire framing, plus model discovery and error classification.
//! - [`core`] owns conversation state, provider/model resolution,
//!   configuration, and the session engine shared by both front ends.
//! - [`ui`] renders output: the blocking read-eval loop, the full-screen
//!   event-loop interface, and markdown-to-terminal rendering.
//! - [`api`] defines the wire payloads exchanged with the backends.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`cli::run`], which dispatches into the one-shot query path,
//! [`ui::repl`], or [`ui::tui`].

pub mod api;
pub mod cli;
pub mod core;
pub mod provider;
pub mod ui;
