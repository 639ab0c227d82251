// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The `Check` seam: condition evaluation on stores and namespaces.

use vexil_core::{FlagStore, Namespace};

use crate::ast::Expr;
use crate::error::ParseError;

/// Evaluates condition expressions against a flag source.
pub trait Check {
    /// Parses `expr` and evaluates its truthiness against current state.
    ///
    /// # Errors
    ///
    /// [`ParseError`] when the expression is malformed. Evaluation itself
    /// never fails.
    fn check(&self, expr: &str) -> Result<bool, ParseError>;
}

impl Check for FlagStore {
    fn check(&self, expr: &str) -> Result<bool, ParseError> {
        let parsed = Expr::parse(expr)?;
        Ok(parsed.eval(&|key: &str| self.get(key)))
    }
}

impl Check for Namespace {
    /// Identifiers are rewritten with the namespace prefix before
    /// evaluation, so `ns.check("x > 1")` reads `<prefix>.x` on the root.
    fn check(&self, expr: &str) -> Result<bool, ParseError> {
        let parsed = Expr::parse(expr)?.prefixed(self.prefix());
        let root = self.root();
        Ok(parsed.eval(&|key: &str| root.get(key)))
    }
}
