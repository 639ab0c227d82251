// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recursive descent parser for the condition language.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or    := and (OR and)*
//! and   := not (AND not)*
//! not   := (NOT | '!') not | cmp
//! cmp   := atom (cmpop atom)?
//! atom  := '(' or ')' | ident | number | string
//! ```

use crate::ast::{CmpOp, Expr};
use crate::error::ParseError;
use crate::token::{lex, Spanned, Token};

/// Parses `input` into an [`Expr`].
///
/// # Errors
///
/// [`ParseError`] for lexical errors, grammar violations, and trailing
/// input.
pub(crate) fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(spanned) => Err(ParseError::UnexpectedToken {
            found: spanned.token.describe(),
            at: spanned.at,
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek().map(|s| &s.token), Some(Token::Or)) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek().map(|s| &s.token), Some(Token::And)) {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek().map(|s| &s.token), Some(Token::Not)) {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_atom()?;
        let op = match self.peek().map(|s| &s.token) {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::Le) => CmpOp::Le,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_atom()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(ParseError::UnexpectedEnd);
        };
        match spanned.token {
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(ParseError::UnexpectedToken {
                        found: other.token.describe(),
                        at: other.at,
                    }),
                    None => Err(ParseError::UnexpectedEnd),
                }
            }
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::Num(x) => Ok(Expr::Num(x)),
            Token::Str(s) => Ok(Expr::Str(s)),
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                at: spanned.at,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(input: &str) -> Expr {
        parse(input).expect("parse")
    }

    #[test]
    fn precedence_not_over_and_over_or() {
        // a OR b AND NOT c  ==  a OR (b AND (NOT c))
        assert_eq!(
            p("a OR b AND NOT c"),
            Expr::Or(
                Box::new(Expr::Ident("a".into())),
                Box::new(Expr::And(
                    Box::new(Expr::Ident("b".into())),
                    Box::new(Expr::Not(Box::new(Expr::Ident("c".into())))),
                )),
            )
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            p("(a OR b) AND c"),
            Expr::And(
                Box::new(Expr::Or(
                    Box::new(Expr::Ident("a".into())),
                    Box::new(Expr::Ident("b".into())),
                )),
                Box::new(Expr::Ident("c".into())),
            )
        );
    }

    #[test]
    fn comparison_binds_tighter_than_not() {
        assert_eq!(
            p("NOT x == 1"),
            Expr::Not(Box::new(Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Ident("x".into())),
                Box::new(Expr::Num(1.0)),
            )))
        );
    }

    #[test]
    fn double_negation_nests() {
        assert_eq!(
            p("!!x"),
            Expr::Not(Box::new(Expr::Not(Box::new(Expr::Ident("x".into())))))
        );
    }

    #[test]
    fn trailing_input_is_an_error() {
        assert!(matches!(
            parse("a b"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(parse(""), Err(ParseError::UnexpectedEnd));
        assert_eq!(parse("a AND"), Err(ParseError::UnexpectedEnd));
    }

    #[test]
    fn dangling_paren_is_an_error() {
        assert_eq!(parse("(a OR b"), Err(ParseError::UnexpectedEnd));
        assert!(matches!(
            parse("a)"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }
}
