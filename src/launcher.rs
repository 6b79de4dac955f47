use crate::command::{Command, CommandFactory, ExecutableCommand, ExitRecord};
use crate::shell::Factory;
use crate::signals::{self, InterruptDisposition};
use crate::state::ShellState;
use anyhow::Result;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::libc;
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup2, fork};
use std::ffi::{CString, NulError};
use std::io::Write;
use std::os::fd::RawFd;

/// Failures of the launcher itself, as opposed to failures of the program it runs.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The command has no program name.
    #[error("no program to run")]
    Empty,
    /// No child process could be created.
    #[error("unable to fork: {0}")]
    Fork(#[source] Errno),
    /// An argument or path cannot be handed to `exec`.
    #[error("{program}: argument contains a NUL byte")]
    InvalidArgument {
        program: String,
        #[source]
        source: NulError,
    },
    /// Waiting on the foreground child failed.
    #[error("waiting for child {pid} failed: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },
}

impl LaunchError {
    /// Whether the interpreter cannot go on after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LaunchError::Fork(_))
    }
}

/// Command that is not a builtin: run in a forked child via `execvp`.
pub struct ExternalCommand {
    command: Command,
}

impl ExternalCommand {
    pub fn new(command: Command) -> Self {
        Self { command }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        Some(Box::new(ExternalCommand::new(command.clone())))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, state: &mut ShellState) -> Result<()> {
        let foreground_only = state.foreground_only();
        let background = self.command.runs_in_background(foreground_only);
        let disposition =
            signals::child_interrupt_disposition(self.command.background, foreground_only);
        let prepared = PreparedCommand::new(&self.command)?;

        // The child must not inherit unwritten output.
        stdout.flush()?;

        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => prepared.exec(disposition),
            ForkResult::Parent { child } => {
                tracing::debug!(pid = %child, program = self.command.program(), background, "spawned");
                if background {
                    writeln!(stdout, "Background pid is {child}")?;
                    stdout.flush()?;
                    state.background_children.insert(child);
                } else {
                    let record = wait_foreground(child)?;
                    tracing::debug!(pid = %child, %record, "foreground child finished");
                    state.last_exit_status = record;
                }
            }
        }
        Ok(())
    }
}

/// A redirection opened in the child just before `exec`.
struct Redirect {
    path: CString,
    flags: OFlag,
    target: RawFd,
    failure: Vec<u8>,
}

impl Redirect {
    fn new(path: &str, flags: OFlag, target: RawFd) -> Result<Self, NulError> {
        Ok(Self {
            path: CString::new(path)?,
            flags,
            target,
            failure: format!("Failed to open {path}\n").into_bytes(),
        })
    }

    fn apply(&self) -> nix::Result<()> {
        let fd = open(self.path.as_c_str(), self.flags, Mode::from_bits_truncate(0o666))?;
        if fd != self.target {
            dup2(fd, self.target)?;
            close(fd)?;
        }
        Ok(())
    }
}

/// Everything the child needs, allocated before `fork` so the child only
/// makes raw system calls.
struct PreparedCommand {
    program: CString,
    argv: Vec<CString>,
    /// Null-terminated pointers into `argv`, as `execvp(3)` takes them.
    argv_ptrs: Vec<*const libc::c_char>,
    redirects: Vec<Redirect>,
    not_found: Vec<u8>,
}

impl PreparedCommand {
    fn new(command: &Command) -> Result<Self, LaunchError> {
        let program = command.program();
        let invalid = |source| LaunchError::InvalidArgument {
            program: program.to_string(),
            source,
        };

        let argv = command
            .arguments
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;

        let mut redirects = Vec::new();
        if let Some(path) = &command.input_path {
            redirects.push(
                Redirect::new(path, OFlag::O_RDONLY, libc::STDIN_FILENO).map_err(invalid)?,
            );
        }
        if let Some(path) = &command.output_path {
            let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
            redirects.push(Redirect::new(path, flags, libc::STDOUT_FILENO).map_err(invalid)?);
        }

        let argv0 = argv.first().cloned().ok_or(LaunchError::Empty)?;
        // Points into the heap buffers of `argv`, which stay put when `argv` moves.
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        Ok(Self {
            program: argv0,
            argv,
            argv_ptrs,
            redirects,
            not_found: format!("{program}: No such file or directory\n").into_bytes(),
        })
    }

    /// Child side of the fork. Never returns: either `exec` succeeds or the
    /// child reports the problem and exits with status 1.
    fn exec(&self, disposition: InterruptDisposition) -> ! {
        // Failing to reset SIGINT is not a reason to skip the program.
        let _ = signals::apply_child_disposition(disposition);

        for redirect in &self.redirects {
            if redirect.apply().is_err() {
                signals::write_raw(libc::STDOUT_FILENO, &redirect.failure);
                unsafe { libc::_exit(1) }
            }
        }

        unsafe { libc::execvp(self.program.as_ptr(), self.argv_ptrs.as_ptr()) };
        signals::write_raw(libc::STDOUT_FILENO, &self.not_found);
        unsafe { libc::_exit(1) }
    }
}

/// Block until `child` terminates.
fn wait_foreground(child: Pid) -> Result<ExitRecord, LaunchError> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Some((_, record)) = termination(status) {
                    return Ok(record);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(source) => return Err(LaunchError::Wait { pid: child, source }),
        }
    }
}

/// The pid and outcome of a wait status that reports a terminated child.
///
/// Stops, continues and "still alive" are not terminations.
pub(crate) fn termination(status: WaitStatus) -> Option<(Pid, ExitRecord)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid, ExitRecord::ExitedWith(code))),
        WaitStatus::Signaled(pid, signal, _) => {
            Some((pid, ExitRecord::KilledBySignal(signal as i32)))
        }
        _ => None,
    }
}
