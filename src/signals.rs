//! Signal dispositions of the interpreter and of its children.
//!
//! The interpreter ignores `SIGINT` and uses `SIGTSTP` to toggle
//! foreground-only mode. The handler touches nothing but an atomic flag and a
//! raw `write(2)` of a precomputed message.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicBool, Ordering};

/// Printed when the stop signal switches foreground-only mode on.
pub const ENTER_FOREGROUND_ONLY: &[u8] = b"Entering foreground-only mode (& is now ignored)\n";
/// Printed when the stop signal switches foreground-only mode off.
pub const EXIT_FOREGROUND_ONLY: &[u8] = b"Exiting foreground-only mode\n";

static FOREGROUND_ONLY: AtomicBool = AtomicBool::new(false);

/// The flag flipped by the `SIGTSTP` handler.
pub fn foreground_only_flag() -> &'static AtomicBool {
    &FOREGROUND_ONLY
}

/// Flip `flag` and return the notice describing the new mode.
///
/// Async-signal-safe: a single atomic read-modify-write, no allocation.
pub fn toggle_foreground_only(flag: &AtomicBool) -> &'static [u8] {
    if flag.fetch_xor(true, Ordering::SeqCst) {
        EXIT_FOREGROUND_ONLY
    } else {
        ENTER_FOREGROUND_ONLY
    }
}

extern "C" fn handle_stop(_signal: libc::c_int) {
    // errno belongs to whatever the main flow was doing when interrupted.
    let saved = Errno::last_raw();
    let notice = toggle_foreground_only(&FOREGROUND_ONLY);
    write_raw(libc::STDOUT_FILENO, notice);
    Errno::set_raw(saved);
}

/// Write `bytes` straight to `fd`, bypassing std's buffered and locked
/// handles. Safe to call from a signal handler or a freshly forked child.
pub(crate) fn write_raw(fd: libc::c_int, bytes: &[u8]) {
    let mut written = 0;
    while written < bytes.len() {
        let rest = &bytes[written..];
        let n = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };
        if n <= 0 {
            // Retry on EINTR; any other error drops the rest of the message.
            if n < 0 && Errno::last() == Errno::EINTR {
                continue;
            }
            return;
        }
        written += n as usize;
    }
}

/// Install the interpreter's own dispositions: ignore `SIGINT`, toggle
/// foreground-only mode on `SIGTSTP`.
///
/// `SA_RESTART` makes a read or `waitpid` interrupted by the toggle resume
/// instead of failing with `EINTR`.
pub fn install() -> Result<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::SA_RESTART, SigSet::all());
    let toggle = SigAction::new(
        SigHandler::Handler(handle_stop),
        SaFlags::SA_RESTART,
        SigSet::all(),
    );
    unsafe {
        sigaction(Signal::SIGINT, &ignore).context("failed to ignore SIGINT")?;
        sigaction(Signal::SIGTSTP, &toggle).context("failed to install SIGTSTP handler")?;
    }
    tracing::debug!("signal dispositions installed");
    Ok(())
}

/// What a freshly forked child does with `SIGINT` before `exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptDisposition {
    /// Restore the OS default so Ctrl-C terminates the child.
    Default,
    /// Keep the ignored disposition inherited from the interpreter.
    Inherit,
}

/// Foreground children become interruptible; background children stay immune.
pub fn child_interrupt_disposition(background: bool, foreground_only: bool) -> InterruptDisposition {
    if background && !foreground_only {
        InterruptDisposition::Inherit
    } else {
        InterruptDisposition::Default
    }
}

/// Apply `disposition` in the current (child) process.
pub(crate) fn apply_child_disposition(disposition: InterruptDisposition) -> nix::Result<()> {
    if disposition == InterruptDisposition::Default {
        let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        unsafe { sigaction(Signal::SIGINT, &default) }?;
    }
    Ok(())
}
