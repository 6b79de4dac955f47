use argh::FromArgs;
use smallsh::{EditorInput, PlainInput, Shell, signals};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(FromArgs)]
/// A small interactive shell with redirection, background jobs and a
/// foreground-only mode toggled by Ctrl-Z.
struct Options {
    #[argh(option, default = "String::from(\"warn\")")]
    /// log filter used when RUST_LOG is not set, e.g. "debug" or "smallsh=trace".
    log_level: String,

    #[argh(switch)]
    /// read plain lines from stdin even when it is a terminal.
    plain: bool,
}

fn main() -> ExitCode {
    let options: Options = argh::from_env();

    // Logs go to stderr so they never mix with the prompt protocol on stdout.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("smallsh: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> anyhow::Result<()> {
    signals::install()?;

    let mut shell = Shell::default();
    let mut stdout = io::stdout();
    tracing::debug!(pid = %shell.state().self_pid, "shell started");

    if !options.plain && io::stdin().is_terminal() {
        let mut input = EditorInput::new()?;
        shell.repl(&mut input, &mut stdout)
    } else {
        let mut input = PlainInput::new(io::stdin().lock(), io::stdout());
        shell.repl(&mut input, &mut stdout)
    }
}
