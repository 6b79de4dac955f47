use crate::state::ShellState;
use anyhow::Result;
use std::fmt;
use std::io::Write;

/// One parsed input line, ready for dispatch.
///
/// `arguments[0]` is the program name. The parser never produces a command
/// without one; a hand-built command with no arguments has an empty program
/// name and no operands, and no factory claims it except the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program name followed by its arguments, after `$$` expansion.
    pub arguments: Vec<String>,
    /// File to connect to standard input (`< path`).
    pub input_path: Option<String>,
    /// File to connect to standard output (`> path`).
    pub output_path: Option<String>,
    /// Whether `&` appeared on the line.
    pub background: bool,
}

impl Command {
    /// Name of the program to run.
    pub fn program(&self) -> &str {
        self.arguments.first().map_or("", String::as_str)
    }

    /// Arguments after the program name.
    pub fn operands(&self) -> &[String] {
        self.arguments.get(1..).unwrap_or_default()
    }

    /// Whether the command really runs in the background.
    ///
    /// A requested `&` is dropped while foreground-only mode is on.
    pub fn runs_in_background(&self, foreground_only: bool) -> bool {
        self.background && !foreground_only
    }
}

/// How a foreground child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRecord {
    /// Child exited normally with this code.
    ExitedWith(i32),
    /// Child was terminated by this signal number.
    KilledBySignal(i32),
}

impl Default for ExitRecord {
    fn default() -> Self {
        ExitRecord::ExitedWith(0)
    }
}

impl fmt::Display for ExitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitRecord::ExitedWith(code) => write!(f, "Exit Value: {code}"),
            ExitRecord::KilledBySignal(signal) => write!(f, "Terminated by Signal: {signal}"),
        }
    }
}

/// Object-safe trait for anything the shell can dispatch a [`Command`] to.
///
/// Implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Runs the command, writing user-visible messages to `stdout`.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, state: &mut ShellState) -> Result<()>;
}

/// Factory that tries to claim a parsed [`Command`].
///
/// Returns `None` when the factory doesn't recognize the program name.
pub trait CommandFactory {
    /// Attempt to create an executable for `command`.
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>>;
}
