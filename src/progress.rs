//! Progress relay: renders backend-streamed build status to the terminal.
//!
//! The relay is the only writer of progress output. It owns a bounded event
//! channel and at most one background task; the channel closing (all senders
//! dropped once the solve call returns) is the sole termination signal.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use clap::ValueEnum;
use indicatif::{MultiProgress, ProgressBar};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::constants::PROGRESS_CHANNEL_CAPACITY;
use crate::error::BuildError;

/// How build progress is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProgressMode {
    /// No channel, no background task; the relay is inert.
    None,
    /// Line-oriented rendering to stdout.
    Plain,
    /// Interactive console when stderr is a terminal, plain otherwise.
    #[default]
    Auto,
    /// Force interactive rendering; falls back to plain with a warning when
    /// no terminal is available.
    Tty,
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Plain => "plain",
            Self::Auto => "auto",
            Self::Tty => "tty",
        };
        f.write_str(s)
    }
}

/// One step or log update of a running build, emitted by the backend.
/// Events are rendered in arrival order and never batched or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub vertex: String,
    pub phase: ProgressPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Started,
    Log,
    Cached,
    Completed,
    Errored,
}

/// Handle on the relay's background task. Constructed before the solve call
/// is issued and joined after it returns.
pub struct ProgressRelay {
    task: Option<JoinHandle<Result<(), BuildError>>>,
}

impl ProgressRelay {
    /// Starts the relay for the given mode. Returns the handle plus the
    /// sender the backend call writes events into; `None` in silent mode,
    /// where the caller must not wait on the relay either.
    pub fn start(mode: ProgressMode) -> (Self, Option<Sender<ProgressEvent>>) {
        match mode {
            ProgressMode::None => (Self { task: None }, None),
            ProgressMode::Plain => Self::with_writer(io::stdout()),
            ProgressMode::Auto => {
                if io::stderr().is_terminal() {
                    Self::interactive()
                } else {
                    Self::with_writer(io::stdout())
                }
            }
            ProgressMode::Tty => {
                if io::stderr().is_terminal() {
                    Self::interactive()
                } else {
                    tracing::warn!("no terminal available, falling back to plain progress");
                    Self::with_writer(io::stdout())
                }
            }
        }
    }

    /// Starts a plain-rendering relay over an arbitrary writer.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> (Self, Option<Sender<ProgressEvent>>) {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let task = tokio::spawn(render_plain(rx, writer));
        (Self { task: Some(task) }, Some(tx))
    }

    fn interactive() -> (Self, Option<Sender<ProgressEvent>>) {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let task = tokio::spawn(render_interactive(rx, MultiProgress::new()));
        (Self { task: Some(task) }, Some(tx))
    }

    /// Waits for the background task to drain the channel and exit. Returns
    /// immediately in silent mode.
    pub async fn finish(self) -> Result<(), BuildError> {
        match self.task {
            None => Ok(()),
            Some(task) => task
                .await
                .map_err(|err| BuildError::Render(io::Error::other(err)))?,
        }
    }
}

/// Renders events line by line until the channel closes.
async fn render_plain<W: Write + Send>(
    mut rx: Receiver<ProgressEvent>,
    mut writer: W,
) -> Result<(), BuildError> {
    while let Some(event) = rx.recv().await {
        let detail = event.detail.as_deref().unwrap_or_default();
        let result = match event.phase {
            ProgressPhase::Started => writeln!(writer, "=> {}", event.vertex),
            ProgressPhase::Log => writeln!(writer, "   {}", detail),
            ProgressPhase::Cached => writeln!(writer, "=> CACHED {}", event.vertex),
            ProgressPhase::Completed => writeln!(writer, "=> DONE {}", event.vertex),
            ProgressPhase::Errored => {
                writeln!(writer, "=> ERROR {}: {}", event.vertex, detail)
            }
        };
        result.and_then(|_| writer.flush()).map_err(BuildError::Render)?;
    }
    Ok(())
}

/// Renders events as one live spinner per vertex until the channel closes.
async fn render_interactive(
    mut rx: Receiver<ProgressEvent>,
    multi: MultiProgress,
) -> Result<(), BuildError> {
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();
    while let Some(event) = rx.recv().await {
        let bar = bars.entry(event.vertex.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar.set_message(event.vertex.clone());
            bar
        });
        match event.phase {
            ProgressPhase::Started => bar.set_message(event.vertex.clone()),
            ProgressPhase::Log => {
                if let Some(line) = event.detail {
                    bar.set_message(format!("{}: {}", event.vertex, line));
                }
            }
            ProgressPhase::Cached => bar.finish_with_message(format!("{} CACHED", event.vertex)),
            ProgressPhase::Completed => bar.finish_with_message(format!("{} DONE", event.vertex)),
            ProgressPhase::Errored => {
                let detail = event.detail.unwrap_or_default();
                bar.abandon_with_message(format!("{} ERROR: {}", event.vertex, detail));
            }
        }
    }
    Ok(())
}
