// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Evaluation of condition expressions against a flag lookup.
//!
//! Evaluation never raises:
//! - truthiness: `Bool(false)`, `Num(0)`, `Str("")`, and Absent are falsy;
//! - an Absent comparison operand is treated as `Num(0)`;
//! - string operands support only `==`/`!=`; any other comparison
//!   involving a string, and any type-mismatched pair, yields `false`.

use vexil_core::{truthy, FlagValue};

use crate::ast::{CmpOp, Expr};

impl Expr {
    /// Evaluates the expression's truthiness. `lookup` resolves flag keys
    /// to their current value (`None` for Absent).
    pub fn eval<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<FlagValue>,
    {
        match self {
            Self::Ident(name) => truthy(lookup(name).as_ref()),
            Self::Num(x) => FlagValue::Num(*x).is_truthy(),
            Self::Str(s) => !s.is_empty(),
            Self::Not(inner) => !inner.eval(lookup),
            Self::And(lhs, rhs) => lhs.eval(lookup) && rhs.eval(lookup),
            Self::Or(lhs, rhs) => lhs.eval(lookup) || rhs.eval(lookup),
            Self::Cmp(op, lhs, rhs) => {
                compare(*op, lhs.eval_value(lookup), rhs.eval_value(lookup))
            }
        }
    }

    /// Evaluates the expression as a value, for use as a comparison
    /// operand. Only identifiers can be Absent; logical sub-expressions
    /// collapse to their boolean truthiness.
    fn eval_value<F>(&self, lookup: &F) -> Option<FlagValue>
    where
        F: Fn(&str) -> Option<FlagValue>,
    {
        match self {
            Self::Ident(name) => lookup(name),
            Self::Num(x) => Some(FlagValue::Num(*x)),
            Self::Str(s) => Some(FlagValue::Str(s.clone())),
            Self::Not(_) | Self::And(..) | Self::Or(..) | Self::Cmp(..) => {
                Some(FlagValue::Bool(self.eval(lookup)))
            }
        }
    }
}

/// Comparison with the Absent-as-zero rule and false-on-mismatch.
fn compare(op: CmpOp, lhs: Option<FlagValue>, rhs: Option<FlagValue>) -> bool {
    let lhs = lhs.unwrap_or(FlagValue::Num(0.0));
    let rhs = rhs.unwrap_or(FlagValue::Num(0.0));
    match (&lhs, &rhs) {
        (FlagValue::Num(a), FlagValue::Num(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Lt => a < b,
            CmpOp::Ge => a >= b,
            CmpOp::Le => a <= b,
        },
        (FlagValue::Str(a), FlagValue::Str(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        (FlagValue::Bool(a), FlagValue::Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        _ => false,
    }
}
