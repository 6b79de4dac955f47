use crate::command::{Command, CommandFactory};
use crate::io_adapters::LineSource;
use crate::launcher::LaunchError;
use crate::state::ShellState;
use crate::{parser, reaper};
use anyhow::{Result, anyhow};
use nix::sys::signal::{Signal, kill};
use std::io::Write;

/// Prompt written before every read.
pub const PROMPT: &str = ": ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and the external launcher.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The read-eval loop: reads a line, parses it, dispatches it to the first
/// factory that claims it, then sweeps finished children.
///
/// See [`Default`] for the factories included out of the box.
pub struct Shell {
    state: ShellState,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Shell {
    /// Create a shell with a custom set of command factories.
    pub fn new(state: ShellState, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { state, commands }
    }

    /// Create a shell over `state` with the default builtins and launcher.
    pub fn with_state(state: ShellState) -> Self {
        use crate::builtin::*;
        use crate::launcher::ExternalCommand;
        Self::new(
            state,
            vec![
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Status>::default()),
                Box::new(Factory::<ExternalCommand>::default()),
            ],
        )
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Handle one input line: parse, dispatch, then reap.
    ///
    /// Blank and comment lines are skipped without dispatching or reaping.
    /// Only fatal errors are returned; everything else is reported on
    /// `stdout` and the shell carries on.
    pub fn run_line(&mut self, line: &str, stdout: &mut dyn Write) -> Result<()> {
        let Some(command) = parser::parse_line(line, self.state.self_pid.as_raw()) else {
            return Ok(());
        };
        self.dispatch(&command, stdout)?;
        reaper::sweep(stdout, &mut self.state)?;
        Ok(())
    }

    fn dispatch(&mut self, command: &Command, stdout: &mut dyn Write) -> Result<()> {
        tracing::debug!(?command, "dispatch");
        let executable = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(command))
            .ok_or_else(|| anyhow!("command not found: {}", command.program()))?;

        match executable.execute(stdout, &mut self.state) {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast_ref::<LaunchError>() {
                Some(err) if !err.is_fatal() => {
                    writeln!(stdout, "{err}")?;
                    Ok(())
                }
                _ => Err(e),
            },
        }
    }

    /// Run until `exit` or end of input, then shut down.
    pub fn repl(&mut self, input: &mut dyn LineSource, stdout: &mut dyn Write) -> Result<()> {
        while self.state.running {
            match input.read_line(PROMPT)? {
                Some(line) => self.run_line(&line, stdout)?,
                None => {
                    tracing::debug!("end of input");
                    self.state.running = false;
                }
            }
        }
        self.shutdown(stdout)
    }

    /// Ask every background child still tracked to terminate, then reap
    /// whatever has already finished. Best-effort: children that are gone or
    /// slow to exit are not waited for.
    pub fn shutdown(&mut self, stdout: &mut dyn Write) -> Result<()> {
        for &pid in &self.state.background_children {
            tracing::debug!(%pid, "terminating background child");
            if let Err(e) = kill(pid, Signal::SIGTERM) {
                tracing::warn!(%pid, error = %e, "could not signal background child");
            }
        }
        reaper::sweep(stdout, &mut self.state)?;
        Ok(())
    }
}

impl Default for Shell {
    /// Create a shell for the current process with the default set of commands:
    /// - built-ins: `cd`, `exit`, `status`
    /// - external command launcher
    fn default() -> Self {
        Self::with_state(ShellState::new())
    }
}
