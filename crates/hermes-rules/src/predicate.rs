//! Predicate algebra for deciding whether a rule applies.
//!
//! Predicates are immutable and can be shared across rules. Each one can
//! be tested against a [`Context`], printed with its variables resolved
//! (for diagnostics), or rendered statically through `Display`.
//!
//! `And` and `Or` start all operands at once and settle as soon as the
//! outcome is known. An operand that fails inside them counts as `false`
//! and its error is not propagated, whereas a failing `Variable`,
//! `Contains` or `Not` at the top of a predicate does propagate.

use crate::context::Context;
use crate::error::RuleError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::future::try_join_all;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A boolean expression evaluated against a context.
#[async_trait]
pub trait Predicate: fmt::Display + Send + Sync {
    /// Evaluate the predicate.
    async fn test(&self, context: &Context) -> Result<bool, RuleError>;

    /// Render the predicate with its variables resolved.
    async fn print(&self, context: &Context) -> Result<String, RuleError>;
}

/// A shared predicate for dynamic dispatch.
pub type BoxedPredicate = Arc<dyn Predicate>;

/// Combine predicates into a single conjunction.
///
/// No operands yields `constant(true)` and a single operand is returned
/// as is.
pub fn all_of(mut predicates: Vec<BoxedPredicate>) -> BoxedPredicate {
    match predicates.len() {
        0 => Arc::new(Constant(true)),
        1 => predicates.remove(0),
        _ => Arc::new(And { operands: predicates }),
    }
}

/// Combine predicates into a single disjunction.
///
/// No operands yields `constant(false)` and a single operand is returned
/// as is.
pub fn any_of(mut predicates: Vec<BoxedPredicate>) -> BoxedPredicate {
    match predicates.len() {
        0 => Arc::new(Constant(false)),
        1 => predicates.remove(0),
        _ => Arc::new(Or { operands: predicates }),
    }
}

/// A predicate with a fixed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant(pub bool);

#[async_trait]
impl Predicate for Constant {
    async fn test(&self, _context: &Context) -> Result<bool, RuleError> {
        Ok(self.0)
    }

    async fn print(&self, _context: &Context) -> Result<String, RuleError> {
        Ok(self.to_string())
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constant({})", self.0)
    }
}

/// Holds when the named variable is exactly boolean `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Predicate for Variable {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        let value = context.get_variable(&self.name).await?;

        Ok(matches!(value, Some(Value::Bool(true))))
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        let value = context.get_variable(&self.name).await?;

        Ok(format!("variable('{}' = {})", self.name, render(value.as_ref())))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variable('{}')", self.name)
    }
}

/// Holds when the named variable is a list containing `value`.
///
/// Only scalars are compared; a list or object `value` never matches,
/// since membership is by identity rather than structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Contains {
    name: String,
    value: Value,
}

impl Contains {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Predicate for Contains {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        let value = context.get_variable(&self.name).await?;

        Ok(match value {
            Some(Value::Array(items)) => items.iter().any(|item| same_value(item, &self.value)),
            _ => false,
        })
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        let value = context.get_variable(&self.name).await?;

        Ok(format!("{} contains {}", to_json(value.as_ref()), self.value))
    }
}

impl fmt::Display for Contains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} contains {}", self.name, self.value)
    }
}

/// Logical negation.
#[derive(Clone)]
pub struct Not(pub BoxedPredicate);

impl Not {
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        Not(Arc::new(predicate))
    }
}

#[async_trait]
impl Predicate for Not {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        Ok(!self.0.test(context).await?)
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        Ok(format!("not({})", self.0.print(context).await?))
    }
}

impl fmt::Display for Not {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not({})", self.0)
    }
}

/// Short-circuit conjunction of two or more operands.
#[derive(Clone)]
pub struct And {
    operands: Vec<BoxedPredicate>,
}

impl And {
    pub fn new(left: BoxedPredicate, right: BoxedPredicate, rest: Vec<BoxedPredicate>) -> Self {
        let mut operands = vec![left, right];
        operands.extend(rest);

        Self { operands }
    }

    pub fn operands(&self) -> &[BoxedPredicate] {
        &self.operands
    }
}

#[async_trait]
impl Predicate for And {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        let mut pending: FuturesUnordered<_> = self
            .operands
            .iter()
            .map(|operand| operand.test(context))
            .collect();

        while let Some(result) = pending.next().await {
            if !settle(result) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        Ok(print_all(&self.operands, context).await?.join(" and "))
    }
}

impl fmt::Display for And {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.operands, " and ")
    }
}

/// Short-circuit disjunction of two or more operands.
#[derive(Clone)]
pub struct Or {
    operands: Vec<BoxedPredicate>,
}

impl Or {
    pub fn new(left: BoxedPredicate, right: BoxedPredicate, rest: Vec<BoxedPredicate>) -> Self {
        let mut operands = vec![left, right];
        operands.extend(rest);

        Self { operands }
    }

    pub fn operands(&self) -> &[BoxedPredicate] {
        &self.operands
    }
}

#[async_trait]
impl Predicate for Or {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        let mut pending: FuturesUnordered<_> = self
            .operands
            .iter()
            .map(|operand| operand.test(context))
            .collect();

        while let Some(result) = pending.next().await {
            if settle(result) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        Ok(print_all(&self.operands, context).await?.join(" or "))
    }
}

impl fmt::Display for Or {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.operands, " or ")
    }
}

#[async_trait]
impl Predicate for BoxedPredicate {
    async fn test(&self, context: &Context) -> Result<bool, RuleError> {
        self.as_ref().test(context).await
    }

    async fn print(&self, context: &Context) -> Result<String, RuleError> {
        self.as_ref().print(context).await
    }
}

// Operand failures inside a composite count as `false`.
fn settle(result: Result<bool, RuleError>) -> bool {
    result.unwrap_or_else(|error| {
        tracing::debug!("Operand failed and was treated as false: {}", error);
        false
    })
}

async fn print_all(operands: &[BoxedPredicate], context: &Context) -> Result<Vec<String>, RuleError> {
    try_join_all(operands.iter().map(|operand| operand.print(context))).await
}

fn join(f: &mut fmt::Formatter<'_>, operands: &[BoxedPredicate], separator: &str) -> fmt::Result {
    for (index, operand) in operands.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", operand)?;
    }
    Ok(())
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(_), _) | (Value::Object(_), _) => false,
        _ => left == right,
    }
}

fn to_json(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_string(), Value::to_string)
}

// String coercion of a variable value, as used in diagnostics.
fn render(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => render(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
        Some(Value::Number(number)) => match number.as_f64() {
            // Integral floats print without a fractional part
            Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e21 => {
                if float == 0.0 {
                    "0".to_string()
                } else {
                    format!("{:.0}", float)
                }
            }
            _ => number.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{VariableMap, constant, deferred};
    use serde_json::json;

    /// Never settles; lets tests observe short-circuiting.
    struct Pending;

    #[async_trait]
    impl Predicate for Pending {
        async fn test(&self, _context: &Context) -> Result<bool, RuleError> {
            futures::future::pending().await
        }

        async fn print(&self, _context: &Context) -> Result<String, RuleError> {
            futures::future::pending().await
        }
    }

    impl fmt::Display for Pending {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("pending")
        }
    }

    fn context() -> Context {
        let mut variables = VariableMap::new();
        variables.insert("yes".to_string(), constant(true));
        variables.insert("no".to_string(), constant(false));
        variables.insert("one".to_string(), constant(1));
        variables.insert("text".to_string(), constant("true"));
        variables.insert("list".to_string(), constant(json!(["foo", 1, true, {"a": 1}])));
        variables.insert(
            "broken".to_string(),
            deferred(|| async { Err(anyhow::anyhow!("boom")) }),
        );
        Context::new(variables)
    }

    fn t() -> BoxedPredicate {
        Arc::new(Constant(true))
    }

    fn f() -> BoxedPredicate {
        Arc::new(Constant(false))
    }

    fn pending() -> BoxedPredicate {
        Arc::new(Pending)
    }

    fn broken() -> BoxedPredicate {
        Arc::new(Variable::new("broken"))
    }

    #[tokio::test]
    async fn test_constant() {
        let ctx = context();

        assert_eq!(Constant(true).test(&ctx).await, Ok(true));
        assert_eq!(Constant(false).test(&ctx).await, Ok(false));
        assert_eq!(Constant(true).print(&ctx).await, Ok("constant(true)".to_string()));
        assert_eq!(Constant(false).to_string(), "constant(false)");
    }

    #[tokio::test]
    async fn test_variable_requires_exact_true() {
        let ctx = context();

        assert_eq!(Variable::new("yes").test(&ctx).await, Ok(true));
        assert_eq!(Variable::new("no").test(&ctx).await, Ok(false));
        assert_eq!(Variable::new("one").test(&ctx).await, Ok(false));
        assert_eq!(Variable::new("text").test(&ctx).await, Ok(false));
        assert_eq!(Variable::new("missing").test(&ctx).await, Ok(false));
    }

    #[tokio::test]
    async fn test_variable_rendering() {
        let ctx = context();

        assert_eq!(Variable::new("yes").to_string(), "variable('yes')");
        assert_eq!(
            Variable::new("yes").print(&ctx).await,
            Ok("variable('yes' = true)".to_string())
        );
        assert_eq!(
            Variable::new("list").print(&ctx).await,
            Ok("variable('list' = foo,1,true,[object Object])".to_string())
        );
        assert_eq!(
            Variable::new("missing").print(&ctx).await,
            Ok("variable('missing' = undefined)".to_string())
        );
    }

    #[test]
    fn test_render_integral_floats() {
        assert_eq!(render(Some(&json!(2.0))), "2");
        assert_eq!(render(Some(&json!(-0.0))), "0");
        assert_eq!(render(Some(&json!(2.5))), "2.5");
        assert_eq!(render(Some(&json!(7))), "7");
        assert_eq!(render(Some(&json!([1.0, 2.5]))), "1,2.5");
    }

    #[tokio::test]
    async fn test_contains() {
        let ctx = context();

        assert_eq!(Contains::new("list", "foo").test(&ctx).await, Ok(true));
        assert_eq!(Contains::new("list", 1.0).test(&ctx).await, Ok(true));
        assert_eq!(Contains::new("list", true).test(&ctx).await, Ok(true));
        assert_eq!(Contains::new("list", "bar").test(&ctx).await, Ok(false));
        assert_eq!(Contains::new("list", json!({"a": 1})).test(&ctx).await, Ok(false));
        assert_eq!(Contains::new("text", "t").test(&ctx).await, Ok(false));
        assert_eq!(Contains::new("missing", "foo").test(&ctx).await, Ok(false));
    }

    #[tokio::test]
    async fn test_contains_rendering() {
        let ctx = context();
        let predicate = Contains::new("list", "foo");

        assert_eq!(predicate.to_string(), "list contains \"foo\"");
        assert_eq!(
            predicate.print(&ctx).await,
            Ok("[\"foo\",1,true,{\"a\":1}] contains \"foo\"".to_string())
        );
        assert_eq!(
            Contains::new("missing", 1).print(&ctx).await,
            Ok("undefined contains 1".to_string())
        );
    }

    #[tokio::test]
    async fn test_not() {
        let ctx = context();

        assert_eq!(Not::new(Constant(true)).test(&ctx).await, Ok(false));
        assert_eq!(Not::new(Constant(false)).test(&ctx).await, Ok(true));
        assert_eq!(Not::new(Variable::new("yes")).to_string(), "not(variable('yes'))");
        assert_eq!(
            Not::new(Variable::new("yes")).print(&ctx).await,
            Ok("not(variable('yes' = true))".to_string())
        );
    }

    #[tokio::test]
    async fn test_bare_predicates_propagate_failures() {
        let ctx = context();

        assert!(broken().test(&ctx).await.is_err());
        assert!(Not(broken()).test(&ctx).await.is_err());
        assert!(Contains::new("broken", 1).test(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_and() {
        let ctx = context();

        assert_eq!(And::new(t(), t(), vec![t()]).test(&ctx).await, Ok(true));
        assert_eq!(And::new(t(), f(), vec![t()]).test(&ctx).await, Ok(false));
        assert_eq!(And::new(f(), f(), vec![]).test(&ctx).await, Ok(false));
    }

    #[tokio::test]
    async fn test_and_short_circuits_on_false() {
        let ctx = context();

        let predicate = And::new(f(), pending(), vec![pending()]);
        assert_eq!(predicate.test(&ctx).await, Ok(false));

        let predicate = And::new(pending(), pending(), vec![f()]);
        assert_eq!(predicate.test(&ctx).await, Ok(false));
    }

    #[tokio::test]
    async fn test_and_treats_failures_as_false() {
        let ctx = context();

        assert_eq!(And::new(t(), broken(), vec![]).test(&ctx).await, Ok(false));
        assert_eq!(And::new(broken(), pending(), vec![]).test(&ctx).await, Ok(false));
    }

    #[tokio::test]
    async fn test_or() {
        let ctx = context();

        assert_eq!(Or::new(f(), f(), vec![f()]).test(&ctx).await, Ok(false));
        assert_eq!(Or::new(f(), t(), vec![f()]).test(&ctx).await, Ok(true));
    }

    #[tokio::test]
    async fn test_or_short_circuits_on_true() {
        let ctx = context();

        let predicate = Or::new(t(), pending(), vec![pending()]);
        assert_eq!(predicate.test(&ctx).await, Ok(true));
    }

    #[tokio::test]
    async fn test_or_treats_failures_as_false() {
        let ctx = context();

        assert_eq!(Or::new(broken(), f(), vec![]).test(&ctx).await, Ok(false));
        assert_eq!(Or::new(broken(), t(), vec![]).test(&ctx).await, Ok(true));
    }

    #[tokio::test]
    async fn test_composite_rendering() {
        let ctx = context();
        let yes: BoxedPredicate = Arc::new(Variable::new("yes"));
        let no: BoxedPredicate = Arc::new(Variable::new("no"));

        let and = And::new(yes.clone(), no.clone(), vec![t()]);
        assert_eq!(and.to_string(), "variable('yes') and variable('no') and constant(true)");
        assert_eq!(
            and.print(&ctx).await,
            Ok("variable('yes' = true) and variable('no' = false) and constant(true)".to_string())
        );

        let or = Or::new(yes, no, vec![]);
        assert_eq!(or.to_string(), "variable('yes') or variable('no')");
    }

    #[tokio::test]
    async fn test_all_of() {
        let ctx = context();

        let empty = all_of(vec![]);
        assert_eq!(empty.to_string(), "constant(true)");
        assert_eq!(empty.test(&ctx).await, Ok(true));

        assert_eq!(all_of(vec![f()]).to_string(), "constant(false)");
        assert_eq!(all_of(vec![t(), f()]).test(&ctx).await, Ok(false));
    }

    #[tokio::test]
    async fn test_any_of() {
        let ctx = context();

        assert_eq!(any_of(vec![]).test(&ctx).await, Ok(false));
        assert_eq!(any_of(vec![f(), t()]).test(&ctx).await, Ok(true));
    }
}
