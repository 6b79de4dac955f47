use crate::launcher::termination;
use crate::state::ShellState;
use anyhow::Result;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::Write;

/// Reclaim every child that has already terminated, without blocking.
///
/// Each reaped child is reported as `Child <pid> terminated` followed by its
/// status line and removed from the background set. Returns the reaped pids.
pub fn sweep(stdout: &mut dyn Write, state: &mut ShellState) -> Result<Vec<Pid>> {
    let mut reaped = Vec::new();
    loop {
        let status = match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(status) => status,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "reap sweep aborted");
                break;
            }
        };

        let Some((pid, record)) = termination(status) else {
            tracing::trace!(?status, "not a termination");
            continue;
        };

        let was_background = state.background_children.remove(&pid);
        tracing::debug!(%pid, %record, was_background, "reaped");
        writeln!(stdout, "Child {pid} terminated")?;
        writeln!(stdout, "{record}")?;
        reaped.push(pid);
    }
    stdout.flush()?;
    Ok(reaped)
}
