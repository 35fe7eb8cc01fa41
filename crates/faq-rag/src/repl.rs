//! Console turn loop
//!
//! Reads one line at a time, hands utterances to [`ChatEngine::respond`] and
//! prints the reply. Input acquisition lives here; the engine never touches
//! the console.

use async_trait::async_trait;
use std::future::Future;
use std::io::{BufRead, Write};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;

use crate::engine::ChatEngine;
use crate::error::{Error, Result};

/// Shown when the user submits a blank line
pub const EMPTY_INPUT_WARNING: &str = "Please enter a question, or type 'exit' to quit.";

/// Parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnCommand {
    /// "quit" or "exit"
    Exit,
    /// Blank line
    Empty,
    /// `/clear`
    ClearHistory,
    Utterance(String),
}

impl TurnCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return TurnCommand::Empty;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            return TurnCommand::Exit;
        }
        if trimmed.eq_ignore_ascii_case("/clear") {
            return TurnCommand::ClearHistory;
        }
        TurnCommand::Utterance(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitingForInput,
    Processing,
    Exited,
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Command,
    EndOfInput,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub turns: usize,
    pub reason: ExitReason,
}

/// Source of console lines for the turn loop
///
/// `next_line` must be cancel-safe: the loop drops it when shutdown wins.
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator; `None` at end of input
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;
}

#[async_trait]
impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

/// Lines read on a dedicated OS thread and forwarded over a channel
///
/// The reader thread is detached, so a read blocked on the terminal never
/// holds up runtime shutdown.
pub struct ConsoleInput {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl ConsoleInput {
    /// Read from the process's standard input
    pub fn stdin() -> Result<Self> {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);

        std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(|e| Error::internal(format!("Failed to start input thread: {}", e)))?;

        Ok(Self { lines: rx })
    }
}

#[async_trait]
impl LineSource for ConsoleInput {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.lines.recv().await.transpose()
    }
}

/// Drives the WaitingForInput / Processing cycle until exit
pub struct TurnLoop<'a> {
    engine: &'a mut ChatEngine,
    bot_label: String,
    state: LoopState,
}

impl<'a> TurnLoop<'a> {
    pub fn new(engine: &'a mut ChatEngine, bot_label: impl Into<String>) -> Self {
        Self {
            engine,
            bot_label: bot_label.into(),
            state: LoopState::WaitingForInput,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until a sentinel, end of input, or `shutdown` resolves
    ///
    /// `shutdown` races both the pending read and the in-flight turn.
    pub async fn run<L, W, S>(&mut self, mut input: L, output: &mut W, shutdown: S) -> Result<LoopSummary>
    where
        L: LineSource,
        W: Write,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut turns = 0;

        let reason = loop {
            self.state = LoopState::WaitingForInput;
            write!(output, "You: ")?;
            output.flush()?;

            let line = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    writeln!(output)?;
                    break ExitReason::Interrupted;
                }
                line = input.next_line() => line?,
            };

            let Some(line) = line else {
                writeln!(output)?;
                break ExitReason::EndOfInput;
            };

            let utterance = match TurnCommand::parse(&line) {
                TurnCommand::Exit => break ExitReason::Command,
                TurnCommand::Empty => {
                    writeln!(output, "{}", EMPTY_INPUT_WARNING)?;
                    continue;
                }
                TurnCommand::ClearHistory => {
                    self.engine.reset_history();
                    writeln!(output, "Conversation history cleared.")?;
                    continue;
                }
                TurnCommand::Utterance(utterance) => utterance,
            };

            self.state = LoopState::Processing;
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    writeln!(output)?;
                    break ExitReason::Interrupted;
                }
                outcome = self.engine.respond(&utterance) => outcome,
            };

            turns += 1;
            writeln!(output, "{}: {}", self.bot_label, outcome.response)?;
        };

        self.state = LoopState::Exited;
        writeln!(output, "Goodbye! ({} turn(s) this session)", turns)?;
        tracing::info!("Chat loop exited after {} turn(s): {:?}", turns, reason);

        Ok(LoopSummary { turns, reason })
    }
}
