// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parsed condition expressions.

use crate::error::ParseError;
use crate::parser;

/// Comparison operator. For strings only `Eq`/`Ne` are defined; every
/// other combination involving a string (and any type-mismatched pair)
/// evaluates to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

/// A parsed condition expression.
///
/// Precedence: `NOT` binds tighter than `AND`, `AND` tighter than `OR`;
/// comparisons bind tighter than all three; parentheses override.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A flag key reference; evaluates to the flag's value (Absent when
    /// unknown).
    Ident(String),
    /// Numeric literal.
    Num(f64),
    /// String literal.
    Str(String),
    /// Logical negation of the operand's truthiness.
    Not(Box<Expr>),
    /// Short-circuit conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Comparison of two atom values.
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses an expression from source text.
    ///
    /// # Errors
    ///
    /// [`ParseError`] for any malformed input.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        parser::parse(input)
    }

    /// Returns the expression with every identifier prefixed.
    ///
    /// The namespace facade uses this to rewrite `dark_mode` into
    /// `app.dark_mode` before evaluating against the root store; `prefix`
    /// must already carry its trailing separator.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        match self {
            Self::Ident(name) => Self::Ident(format!("{prefix}{name}")),
            Self::Num(_) | Self::Str(_) => self.clone(),
            Self::Not(inner) => Self::Not(Box::new(inner.prefixed(prefix))),
            Self::And(lhs, rhs) => Self::And(
                Box::new(lhs.prefixed(prefix)),
                Box::new(rhs.prefixed(prefix)),
            ),
            Self::Or(lhs, rhs) => Self::Or(
                Box::new(lhs.prefixed(prefix)),
                Box::new(rhs.prefixed(prefix)),
            ),
            Self::Cmp(op, lhs, rhs) => Self::Cmp(
                *op,
                Box::new(lhs.prefixed(prefix)),
                Box::new(rhs.prefixed(prefix)),
            ),
        }
    }
}

impl std::str::FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
