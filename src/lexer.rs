//! Lexical analysis of one input line.
//!
//! Words are separated by runs of whitespace. There is no quoting or
//! escaping: `<`, `>` and `&` are operators only when they form a whole
//! word on their own, otherwise they are ordinary text.

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Any word that is not an operator.
    Word(String),
    /// Input redirection symbol, `<`.
    RedirectLeft,
    /// Output redirection symbol, `>`.
    RedirectRight,
    /// Background marker, `&`.
    Ampersand,
}

impl Token {
    fn classify(word: &str) -> Self {
        match word {
            "<" => Token::RedirectLeft,
            ">" => Token::RedirectRight,
            "&" => Token::Ampersand,
            w => Token::Word(w.to_string()),
        }
    }

    /// The source text of the token.
    pub fn into_text(self) -> String {
        match self {
            Token::Word(w) => w,
            Token::RedirectLeft => "<".to_string(),
            Token::RedirectRight => ">".to_string(),
            Token::Ampersand => "&".to_string(),
        }
    }
}

/// Whether the line carries nothing to run: blank, or a `#` comment.
pub fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// The main entry point to perform lexical analysis.
///
/// Comment lines are not special here; callers filter them out with
/// [`is_blank_or_comment`] first.
pub fn split_into_tokens(line: &str) -> Vec<Token> {
    line.split_whitespace().map(Token::classify).collect()
}
