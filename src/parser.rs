use crate::command::Command;
use crate::lexer::{self, Token};

/// Accumulates a [`Command`] while walking the token stream.
struct CommandBuilder {
    tokens: Vec<Token>,
    pos: usize,
    pid: String,
}

impl CommandBuilder {
    fn from(tokens: Vec<Token>, self_pid: i32) -> Self {
        CommandBuilder {
            tokens,
            pos: 0,
            pid: self_pid.to_string(),
        }
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Take the token following a redirection operator as its path.
    ///
    /// Whatever token comes next is the path, operators included; a trailing
    /// operator leaves the redirection unset.
    fn redirect_target(&mut self) -> Option<String> {
        let target = self.consume()?.into_text();
        tracing::trace!(%target, "redirection target");
        Some(target)
    }

    fn build(mut self) -> Option<Command> {
        let mut arguments = Vec::new();
        let mut input_path = None;
        let mut output_path = None;
        let mut background = false;

        while let Some(token) = self.consume() {
            match token {
                Token::RedirectLeft => {
                    if let Some(path) = self.redirect_target() {
                        input_path = Some(path);
                    }
                }
                Token::RedirectRight => {
                    if let Some(path) = self.redirect_target() {
                        output_path = Some(path);
                    }
                }
                Token::Ampersand => background = true,
                Token::Word(w) => arguments.push(expand_pid(&w, &self.pid)),
            }
        }

        if arguments.is_empty() {
            return None;
        }

        Some(Command {
            arguments,
            input_path,
            output_path,
            background,
        })
    }
}

/// Replace the first `$$` in `word` with `pid`.
pub fn expand_pid(word: &str, pid: &str) -> String {
    word.replacen("$$", pid, 1)
}

/// Parse one input line into a [`Command`].
///
/// Returns `None` for blank and comment lines, and for lines made only of
/// operators (e.g. `&` or `< file`), which have no program to run.
pub fn parse_line(line: &str, self_pid: i32) -> Option<Command> {
    if lexer::is_blank_or_comment(line) {
        return None;
    }
    CommandBuilder::from(lexer::split_into_tokens(line), self_pid).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID: i32 = 12345;

    fn args(cmd: &Command) -> Vec<&str> {
        cmd.arguments.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_blank_and_comment_lines_produce_nothing() {
        for line in ["", "   ", "\t\n", "#", "# ls -la", "   # indented"] {
            assert_eq!(parse_line(line, PID), None, "line {line:?}");
        }
    }

    #[test]
    fn test_simple_command() {
        let cmd = parse_line("ls -la /tmp\n", PID).unwrap();
        assert_eq!(cmd.program(), "ls");
        assert_eq!(args(&cmd), ["ls", "-la", "/tmp"]);
        assert_eq!(cmd.input_path, None);
        assert_eq!(cmd.output_path, None);
        assert!(!cmd.background);
    }

    #[test]
    fn test_redirections_and_background() {
        let cmd = parse_line("wc -l < junk > junk2 &", PID).unwrap();
        assert_eq!(args(&cmd), ["wc", "-l"]);
        assert_eq!(cmd.input_path.as_deref(), Some("junk"));
        assert_eq!(cmd.output_path.as_deref(), Some("junk2"));
        assert!(cmd.background);
    }

    #[test]
    fn test_ampersand_anywhere_sets_background() {
        let cmd = parse_line("sleep & 5", PID).unwrap();
        assert_eq!(args(&cmd), ["sleep", "5"]);
        assert!(cmd.background);
    }

    #[test]
    fn test_trailing_redirection_is_ignored() {
        let cmd = parse_line("cat <", PID).unwrap();
        assert_eq!(args(&cmd), ["cat"]);
        assert_eq!(cmd.input_path, None);

        let cmd = parse_line("ls >", PID).unwrap();
        assert_eq!(cmd.output_path, None);
    }

    #[test]
    fn test_redirection_consumes_following_operator() {
        let cmd = parse_line("ls > &", PID).unwrap();
        assert_eq!(cmd.output_path.as_deref(), Some("&"));
        assert!(!cmd.background);
    }

    #[test]
    fn test_last_redirection_wins() {
        let cmd = parse_line("cat < a < b > c > d", PID).unwrap();
        assert_eq!(cmd.input_path.as_deref(), Some("b"));
        assert_eq!(cmd.output_path.as_deref(), Some("d"));
    }

    #[test]
    fn test_operators_inside_words_are_literal() {
        let cmd = parse_line("echo a&b x>y", PID).unwrap();
        assert_eq!(args(&cmd), ["echo", "a&b", "x>y"]);
        assert!(!cmd.background);
    }

    #[test]
    fn test_pid_expansion() {
        let cmd = parse_line("echo $$ file$$.txt $$$$ plain $", PID).unwrap();
        assert_eq!(
            args(&cmd),
            ["echo", "12345", "file12345.txt", "12345$$", "plain", "$"]
        );
    }

    #[test]
    fn test_pid_expansion_in_redirect_paths_is_not_applied() {
        let cmd = parse_line("ls > out$$", PID).unwrap();
        assert_eq!(cmd.output_path.as_deref(), Some("out$$"));
    }

    #[test]
    fn test_operator_only_line_has_no_command() {
        assert_eq!(parse_line("&", PID), None);
        assert_eq!(parse_line("< in > out", PID), None);
    }
}
