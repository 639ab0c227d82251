// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parse errors for the condition language.
//!
//! Malformed expressions are the only failure mode `check` can surface;
//! evaluation itself never raises (type-mismatched comparisons yield
//! `false`, Absent flags are falsy).

use thiserror::Error;

/// A malformed condition expression. `at` is a byte offset into the
/// source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// A character outside the language.
    #[error("unexpected character {ch:?} at byte {at}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset of the character.
        at: usize,
    },
    /// A string literal with no closing quote.
    #[error("unterminated string literal starting at byte {at}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        at: usize,
    },
    /// A numeric literal that does not parse.
    #[error("malformed number at byte {at}")]
    MalformedNumber {
        /// Byte offset where the number started.
        at: usize,
    },
    /// A token that does not fit the grammar at this position.
    #[error("unexpected {found} at byte {at}")]
    UnexpectedToken {
        /// Description of the offending token.
        found: String,
        /// Byte offset of the token.
        at: usize,
    },
    /// The expression ended where the grammar required more input.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}
