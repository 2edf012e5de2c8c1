//! Operator overloading for predicate composition.
//!
//! This module provides implementations of `BitAnd` (&), `BitOr` (|), and `Not` (!)
//! for predicates, allowing intuitive syntax like:
//!
//! ```ignore
//! let predicate = Expr::variable("returning") & !Expr::contains("segments", "vip");
//! ```
//!
//! Chained `&` and `|` flatten into a single n-ary node.

use crate::context::Context;
use crate::error::RuleError;
use crate::predicate::{And, BoxedPredicate, Constant, Contains, Not, Or, Predicate, Variable};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not as StdNot};
use std::sync::Arc;

/// Wrapper enabling operator overloading on shared predicates.
#[derive(Clone)]
pub struct Expr {
    predicate: BoxedPredicate,
    chain: Chain,
}

#[derive(Clone)]
enum Chain {
    Leaf,
    And(Vec<BoxedPredicate>),
    Or(Vec<BoxedPredicate>),
}

impl Expr {
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        Expr::from_shared(Arc::new(predicate))
    }

    pub fn from_shared(predicate: BoxedPredicate) -> Self {
        Expr {
            predicate,
            chain: Chain::Leaf,
        }
    }

    pub fn constant(value: bool) -> Self {
        Expr::new(Constant(value))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::new(Variable::new(name))
    }

    pub fn contains(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::new(Contains::new(name, value))
    }

    pub fn into_inner(self) -> BoxedPredicate {
        self.predicate
    }

    fn conjuncts(self) -> Vec<BoxedPredicate> {
        match self.chain {
            Chain::And(operands) => operands,
            _ => vec![self.predicate],
        }
    }

    fn disjuncts(self) -> Vec<BoxedPredicate> {
        match self.chain {
            Chain::Or(operands) => operands,
            _ => vec![self.predicate],
        }
    }
}

// Both sides contribute at least one operand, so there are always two.
fn split(mut operands: Vec<BoxedPredicate>) -> (BoxedPredicate, BoxedPredicate, Vec<BoxedPredicate>) {
    let rest = operands.split_off(2);
    let right = operands.remove(1);
    let left = operands.remove(0);

    (left, right, rest)
}

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Self::Output {
        let mut operands = self.conjuncts();
        operands.extend(rhs.conjuncts());

        let (left, right, rest) = split(operands.clone());

        Expr {
            predicate: Arc::new(And::new(left, right, rest)),
            chain: Chain::And(operands),
        }
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Self::Output {
        let mut operands = self.disjuncts();
        operands.extend(rhs.disjuncts());

        let (left, right, rest) = split(operands.clone());

        Expr {
            predicate: Arc::new(Or::new(left, right, rest)),
            chain: Chain::Or(operands),
        }
    }
}

impl StdNot for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::new(Not(self.predicate))
    }
}

impl From<Expr> for BoxedPredicate {
    fn from(expr: Expr) -> Self {
        expr.predicate
    }
}

#[async_trait]
impl Predicate for Expr {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        self.predicate.test(context).await
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        self.predicate.print(context).await
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate)
    }
}
