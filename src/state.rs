use crate::command::ExitRecord;
use crate::signals;
use nix::unistd::{Pid, getpid};
use std::collections::{HashMap, HashSet};
use std::env as stdenv;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide interpreter state, created once at startup and passed by
/// reference to every component.
///
/// Only `foreground_only` is shared with signal context, which is why it is
/// an atomic living outside this struct.
#[derive(Debug)]
pub struct ShellState {
    /// Interpreter's own pid, used for `$$` expansion.
    pub self_pid: Pid,
    /// Outcome of the most recent foreground command.
    pub last_exit_status: ExitRecord,
    /// Cleared by `exit`; ends the read-eval loop.
    pub running: bool,
    /// Background children that have not been reaped yet.
    pub background_children: HashSet<Pid>,
    /// Snapshot of the process environment (only `HOME` is consulted).
    pub vars: HashMap<String, String>,
    foreground_only: &'static AtomicBool,
}

impl ShellState {
    /// Capture the current process into a fresh state wired to the global
    /// foreground-only flag toggled by the stop-signal handler.
    pub fn new() -> Self {
        Self::with_flag(signals::foreground_only_flag())
    }

    /// Build a state reading foreground-only mode from `flag`.
    pub fn with_flag(flag: &'static AtomicBool) -> Self {
        Self {
            self_pid: getpid(),
            last_exit_status: ExitRecord::default(),
            running: true,
            background_children: HashSet::new(),
            vars: stdenv::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            foreground_only: flag,
        }
    }

    /// Whether `&` is currently ignored.
    pub fn foreground_only(&self) -> bool {
        self.foreground_only.load(Ordering::SeqCst)
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}
