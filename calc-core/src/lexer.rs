use colored::Colorize;
use std::{fmt, iter::Peekable, str::Chars};

/// What a token is, independent of where it appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number(i64),
    Plus,
    Minus,
    Star,
    Slash,
    OpenParen,
    CloseParen,
}

/// A token plus the 1-based column it started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub column: usize,
}

/// A frontend error: what went wrong and where. It carries a pre-rendered
/// caret diagnostic so a driver can point at the offending column without
/// knowing anything about terminal styling.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub column: usize,
    nice_message: String,
}

impl ParseError {
    pub(crate) fn new(message: String, text: &str, column: usize) -> ParseError {
        let indent = " ".repeat(column.saturating_sub(1) + 2);

        let mut nice_message = String::from("\n");
        nice_message.push_str(&format!("  {}\n", text.bright_white()));
        nice_message.push_str(&indent);
        nice_message.push_str(&format!(
            "{}\n",
            format!("^ parse error at column {}", column).bright_red()
        ));
        nice_message.push_str(&indent);
        nice_message.push_str(&format!("{}\n", message.bright_red()));

        ParseError {
            message,
            column,
            nice_message,
        }
    }

    /// The caret-annotated diagnostic, ready for terminal display.
    pub fn nice_message(&self) -> &str {
        &self.nice_message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at column {}: {}", self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Tokenises one line of input: decimal numbers, `+ - * / ( )`, and
/// whitespace, which is skipped.
pub struct Lexer<'a> {
    text: &'a str,
    characters: Peekable<Chars<'a>>,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Lexer<'a> {
        Lexer {
            text,
            characters: text.chars().peekable(),
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while let Some(&character) = self.characters.peek() {
            if character.is_whitespace() {
                self.next_character();
                continue;
            }

            let column = self.column;
            let kind = if character.is_ascii_digit() {
                self.number(column)?
            } else {
                self.next_character();
                match character {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '(' => TokenKind::OpenParen,
                    ')' => TokenKind::CloseParen,
                    _ => {
                        return Err(ParseError::new(
                            format!("unexpected character {:?}", character),
                            self.text,
                            column,
                        ));
                    }
                }
            };
            tokens.push(Token { kind, column });
        }

        Ok(tokens)
    }

    fn next_character(&mut self) -> Option<char> {
        let character = self.characters.next();
        if character.is_some() {
            self.column += 1;
        }
        character
    }

    fn number(&mut self, column: usize) -> Result<TokenKind, ParseError> {
        let mut digits = String::new();
        while let Some(&character) = self.characters.peek() {
            if !character.is_ascii_digit() {
                break;
            }
            digits.push(character);
            self.next_character();
        }

        match digits.parse::<i64>() {
            Ok(value) => Ok(TokenKind::Number(value)),
            Err(_) => Err(ParseError::new(
                format!("the number {} does not fit in 64 bits", digits),
                self.text,
                column,
            )),
        }
    }
}
