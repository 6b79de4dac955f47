use crate::command::{Command, CommandFactory, ExecutableCommand};
use crate::shell::Factory;
use crate::state::ShellState;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in the interpreter's process; they never fork and never touch
/// `last_exit_status`.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "status".
    fn name() -> &'static str;

    /// Executes the command against the shell state.
    ///
    /// An error is reported to the user and the loop continues.
    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, state: &mut ShellState) -> Result<()> {
        if let Err(e) = T::execute(*self, stdout, state) {
            writeln!(stdout, "{e}")?;
        }
        Ok(())
    }
}

struct InvalidArgs {
    output: String,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _state: &mut ShellState) -> Result<()> {
        stdout.write_all(self.output.as_bytes())?;
        if !self.output.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        let name = command.program();
        if name != T::name() {
            return None;
        }
        // Every word is positional: `exit -1`, `cd -dir` and `cd help` are not flags.
        let args: Vec<&str> = std::iter::once("--")
            .chain(command.operands().iter().map(String::as_str))
            .collect();
        Some(match T::from_args(&[name], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, .. }) => Box::new(InvalidArgs { output }),
        })
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; only the first one is used. Defaults to $HOME when omitted.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<()> {
        let target = match self.args.into_iter().next() {
            Some(t) => PathBuf::from(t),
            None => match state.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => {
                    tracing::debug!("cd: HOME is not set");
                    return Err(anyhow!("Invalid directory."));
                }
            },
        };

        env::set_current_dir(&target).map_err(|e| {
            tracing::debug!(target = %target.display(), error = %e, "cd failed");
            anyhow!("Invalid directory.")
        })
    }
}

#[derive(FromArgs)]
/// Exit the shell, terminating any background jobs it started.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<()> {
        state.running = false;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the exit value or terminating signal of the last foreground command.
pub struct Status {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<()> {
        writeln!(stdout, "{}", state.last_exit_status)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ExitRecord;
    use crate::parser::parse_line;
    use std::env as stdenv;
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    static FLAG: AtomicBool = AtomicBool::new(false);

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn state() -> ShellState {
        ShellState::with_flag(&FLAG)
    }

    fn run_line<T: BuiltinCommand + 'static>(line: &str, state: &mut ShellState) -> String {
        let command = parse_line(line, 1).unwrap();
        let cmd = Factory::<T>::default()
            .try_create(&command)
            .expect("factory should claim its own name");
        let mut out = Vec::new();
        cmd.execute(&mut out, state).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_factory_ignores_other_names() {
        let command = parse_line("ls cd status", 1).unwrap();
        assert!(Factory::<Cd>::default().try_create(&command).is_none());
        assert!(Factory::<Exit>::default().try_create(&command).is_none());
        assert!(Factory::<Status>::default().try_create(&command).is_none());
    }

    #[test]
    fn test_status_defaults_to_exit_zero() {
        let mut state = state();
        assert_eq!(run_line::<Status>("status", &mut state), "Exit Value: 0\n");
    }

    #[test]
    fn test_status_reports_last_record() {
        let mut state = state();
        state.last_exit_status = ExitRecord::ExitedWith(7);
        assert_eq!(run_line::<Status>("status", &mut state), "Exit Value: 7\n");

        state.last_exit_status = ExitRecord::KilledBySignal(9);
        assert_eq!(
            run_line::<Status>("status extra args", &mut state),
            "Terminated by Signal: 9\n"
        );
    }

    #[test]
    fn test_exit_stops_the_loop() {
        let mut state = state();
        assert_eq!(run_line::<Exit>("exit", &mut state), "");
        assert!(!state.running);
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();

        let mut state = state();
        let line = format!("cd {} ignored", canonical_temp.display());
        assert_eq!(run_line::<Cd>(&line, &mut state), "");
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();

        stdenv::set_current_dir(&orig).expect("failed to restore cwd");
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();

        let mut state = state();
        state.set_var("HOME", canonical_temp.to_string_lossy().to_string());
        assert_eq!(run_line::<Cd>("cd", &mut state), "");
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();

        stdenv::set_current_dir(&orig).expect("failed to restore cwd");
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_nonexistent_path_reports_and_continues() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let mut state = state();
        let line = format!("cd nonexistent_dir_for_cd_test_{}", std::process::id());
        assert_eq!(run_line::<Cd>(&line, &mut state), "Invalid directory.\n");
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert!(state.running);
    }

    #[test]
    fn test_dash_words_are_arguments_not_flags() {
        let mut state = state();
        state.last_exit_status = ExitRecord::ExitedWith(3);
        assert_eq!(run_line::<Status>("status -x", &mut state), "Exit Value: 3\n");
        assert_eq!(run_line::<Status>("status --help", &mut state), "Exit Value: 3\n");
        assert!(state.running);

        assert_eq!(run_line::<Exit>("exit -1", &mut state), "");
        assert!(!state.running);

        let mut state = ShellState::with_flag(&FLAG);
        assert_eq!(run_line::<Exit>("exit --help", &mut state), "");
        assert!(!state.running);
    }

    #[test]
    fn test_cd_into_dash_and_help_named_directories() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("-dashdir")).unwrap();
        fs::create_dir(canonical_temp.join("help")).unwrap();

        let mut state = state();
        stdenv::set_current_dir(&canonical_temp).unwrap();
        let dash_out = run_line::<Cd>("cd -dashdir", &mut state);
        let dash_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(&canonical_temp).unwrap();
        let help_out = run_line::<Cd>("cd help", &mut state);
        let help_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        let missing_out = run_line::<Cd>("cd --no-such-dir", &mut state);

        stdenv::set_current_dir(&orig).expect("failed to restore cwd");
        assert_eq!(dash_out, "");
        assert_eq!(dash_cwd, canonical_temp.join("-dashdir"));
        assert_eq!(help_out, "");
        assert_eq!(help_cwd, canonical_temp.join("help"));
        assert_eq!(missing_out, "Invalid directory.\n");
    }

    #[test]
    fn test_factory_tolerates_empty_command() {
        let command = Command {
            arguments: Vec::new(),
            input_path: None,
            output_path: None,
            background: false,
        };
        assert!(Factory::<Cd>::default().try_create(&command).is_none());
        assert!(Factory::<Exit>::default().try_create(&command).is_none());
        assert!(Factory::<Status>::default().try_create(&command).is_none());
    }
}
