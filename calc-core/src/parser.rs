//! Recursive-descent parser for the infix expression grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | '(' expr ')'
//! ```

use crate::ast::{BinOp, Expr};
use crate::lexer::{Lexer, ParseError, Token, TokenKind};

/// Tokenise and parse one line of input into an expression tree.
pub fn parse_expression(text: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        text,
        tokens,
        position: 0,
    };

    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(token, "expected end of input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error_at(&self, token: Token, message: &str) -> ParseError {
        ParseError::new(message.to_string(), self.text, token.column)
    }

    /// An error at the column just past the end of the input, for when the
    /// line ends mid-expression.
    fn error_at_end(&self, message: &str) -> ParseError {
        let end_column = self.text.chars().count() + 1;
        ParseError::new(message.to_string(), self.text, end_column)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.factor()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Number(value),
                ..
            }) => Ok(Expr::Number(value)),
            Some(Token {
                kind: TokenKind::OpenParen,
                ..
            }) => {
                let expr = self.expr()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::CloseParen,
                        ..
                    }) => Ok(expr),
                    Some(token) => Err(self.error_at(token, "expected ')'")),
                    None => Err(self.error_at_end("expected ')'")),
                }
            }
            Some(token) => Err(self.error_at(token, "expected a number or '('")),
            None => Err(self.error_at_end("expected a number or '('")),
        }
    }
}
