//! Yield policy conditions
//!
//! A condition is a side-effect free expression over two documents, bound to
//! the names `source` and `target`:
//!
//! ```text
//! target.spec.level > source.spec.level and source.status.occupied == false
//! ```
//!
//! Conditions are compiled once when the policy is registered and evaluated on
//! every enforcement pass.

mod errors;
mod eval;
mod lexer;
mod parser;

pub use errors::{ConditionError, ConditionResult};
pub use eval::{compare, is_truthy};
pub use parser::{BinaryOp, Expr, Root, Segment};

use eval::Scope;
use parser::Parser;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    text: String,
    expr: Expr,
}

impl Condition {
    pub fn compile(text: &str) -> ConditionResult<Self> {
        let expr = Parser::parse(text)?;
        Ok(Self {
            text: text.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against full document values
    pub fn evaluate(&self, source: &Value, target: &Value) -> ConditionResult<Value> {
        eval::evaluate(&self.expr, &Scope { source, target })
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> ConditionResult<Self> {
        Self::compile(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
