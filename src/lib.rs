//! A small interactive shell.
//!
//! Each input line is parsed into a [`command::Command`] and run either as a
//! builtin (`cd`, `exit`, `status`) inside the shell's own process or as an
//! external program in a forked child, with `<`/`>` redirection, `&`
//! background jobs and `$$` expansion to the shell's pid. `SIGINT` is ignored
//! by the shell itself; `SIGTSTP` toggles a foreground-only mode in which `&`
//! is ignored.
//!
//! The main entry point is [`Shell`], which drives the read-eval loop over a
//! [`LineSource`].

mod builtin;
pub mod command;
mod io_adapters;
mod launcher;
mod lexer;
mod parser;
mod reaper;
mod shell;
pub mod signals;
pub mod state;

pub use io_adapters::{EditorInput, LineSource, PlainInput};
pub use launcher::LaunchError;
pub use parser::parse_line;
pub use shell::{PROMPT, Shell};
