// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! vexil-expr: the condition expression language for vexil stores.
//!
//! A small boolean sub-language over flag keys:
//!
//! ```text
//! dark_mode AND visits > 3
//! tier == 'gold' OR NOT trial_expired
//! ```
//!
//! Atoms are identifiers (flag keys), numeric literals, and quoted string
//! literals. Comparisons are `==`, `!=`, `>`, `<`, `>=`, `<=`; logic is
//! `AND`/`OR`/`NOT` (case-insensitive, `!` aliases `NOT`) with `NOT` >
//! `AND` > `OR` and parentheses. Evaluation never raises: Absent flags
//! are falsy (and compare as zero), and type-mismatched comparisons are
//! `false`.
//!
//! The [`Check`] trait wires `check(expr)` onto [`vexil_core::FlagStore`]
//! and [`vexil_core::Namespace`]; the namespace implementation rewrites
//! identifiers with the namespace prefix first.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod ast;
mod check;
mod error;
mod eval;
mod parser;
mod token;

// Re-exports for stable public API
/// Parsed expression tree and comparison operators.
pub use ast::{CmpOp, Expr};
/// Condition evaluation on stores and namespaces.
pub use check::Check;
/// Malformed-expression errors.
pub use error::ParseError;
