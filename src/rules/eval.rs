//! # Rule Evaluator
//!
//! Total evaluation of a parsed rule against a context. Every node has a
//! defined boolean result for every input:
//!
//! - a comparison whose operand cannot be resolved (anonymous identity,
//!   missing field, missing query parameter) is `false`, whatever the
//!   operator
//! - a comparison across mismatched types is `false`
//! - `null = null` is `true` only when both sides resolve explicitly to null
//!
//! Unauthenticated requests are therefore rejected by rules, not by errors.

use regex::Regex;
use serde_json::Value;

use super::ast::{CmpOp, Expr, Operand, RequestRef};
use super::context::RuleContext;
use super::parser::ParsedRule;

/// Evaluate a parsed rule against a context. Never fails.
pub fn evaluate(rule: &ParsedRule, ctx: &RuleContext) -> bool {
    eval_expr(rule.expr(), ctx)
}

fn eval_expr(expr: &Expr, ctx: &RuleContext) -> bool {
    match expr {
        Expr::Const(b) => *b,
        Expr::And(a, b) => eval_expr(a, ctx) && eval_expr(b, ctx),
        Expr::Or(a, b) => eval_expr(a, ctx) || eval_expr(b, ctx),
        Expr::Cmp { lhs, op, rhs } => {
            let lhs = resolve(lhs, ctx);
            let rhs = resolve(rhs, ctx);
            match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => compare(&lhs, *op, &rhs),
                // Unresolvable operand: the comparison is false, not an error.
                _ => false,
            }
        }
    }
}

/// A resolved operand value. Objects are unrepresentable on purpose: whole
/// objects are not comparable, so a reference landing on one resolves to
/// nothing and the comparison fails closed.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Resolved>),
}

fn resolve(operand: &Operand, ctx: &RuleContext) -> Option<Resolved> {
    match operand {
        Operand::Null => Some(Resolved::Null),
        Operand::Bool(b) => Some(Resolved::Bool(*b)),
        Operand::Number(n) => Some(Resolved::Number(*n)),
        Operand::Text(s) => Some(Resolved::Text(s.clone())),
        Operand::List(items) => {
            let resolved: Vec<Resolved> =
                items.iter().filter_map(|item| resolve(item, ctx)).collect();
            Some(Resolved::List(resolved))
        }
        Operand::Field(path) => {
            let record = ctx.record()?;
            from_json(walk(record, path)?)
        }
        Operand::Request(RequestRef::Auth(path)) => {
            let claims = ctx.auth()?;
            let first = claims.get(path.first()?.as_str())?;
            let rest = &path[1..];
            from_json(if rest.is_empty() {
                first
            } else {
                walk(first, rest)?
            })
        }
        Operand::Request(RequestRef::Query(name)) => {
            ctx.query_param(name).map(|v| Resolved::Text(v.to_string()))
        }
    }
}

/// Walk a dotted path into a JSON value.
fn walk<'a>(mut value: &'a Value, path: &[String]) -> Option<&'a Value> {
    for segment in path {
        value = value.as_object()?.get(segment)?;
    }
    Some(value)
}

fn from_json(value: &Value) -> Option<Resolved> {
    match value {
        Value::Null => Some(Resolved::Null),
        Value::Bool(b) => Some(Resolved::Bool(*b)),
        Value::Number(n) => n.as_f64().map(Resolved::Number),
        Value::String(s) => Some(Resolved::Text(s.clone())),
        Value::Array(items) => Some(Resolved::List(
            items.iter().filter_map(from_json).collect(),
        )),
        Value::Object(_) => None,
    }
}

fn compare(lhs: &Resolved, op: CmpOp, rhs: &Resolved) -> bool {
    match op {
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::Ne => !values_equal(lhs, rhs),
        CmpOp::Gt => ordering(lhs, rhs).map(|o| o > 0).unwrap_or(false),
        CmpOp::Ge => ordering(lhs, rhs).map(|o| o >= 0).unwrap_or(false),
        CmpOp::Lt => ordering(lhs, rhs).map(|o| o < 0).unwrap_or(false),
        CmpOp::Le => ordering(lhs, rhs).map(|o| o <= 0).unwrap_or(false),
        CmpOp::Like => like_match(lhs, rhs),
        CmpOp::NotLike => match (lhs, rhs) {
            (Resolved::Text(_), Resolved::Text(_)) => !like_match(lhs, rhs),
            // Type mismatch is false for the negated form too.
            _ => false,
        },
        CmpOp::In => match rhs {
            Resolved::List(items) => items.iter().any(|item| values_equal(lhs, item)),
            _ => false,
        },
    }
}

fn values_equal(lhs: &Resolved, rhs: &Resolved) -> bool {
    match (lhs, rhs) {
        (Resolved::Null, Resolved::Null) => true,
        (Resolved::Bool(a), Resolved::Bool(b)) => a == b,
        (Resolved::Number(a), Resolved::Number(b)) => a == b,
        (Resolved::Text(a), Resolved::Text(b)) => a == b,
        (Resolved::List(a), Resolved::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => false,
    }
}

/// Ordering for `>` `>=` `<` `<=`. Numbers compare numerically; text
/// compares lexicographically, which also orders RFC3339 date strings.
fn ordering(lhs: &Resolved, rhs: &Resolved) -> Option<i8> {
    match (lhs, rhs) {
        (Resolved::Number(a), Resolved::Number(b)) => {
            a.partial_cmp(b).map(|o| o as i8)
        }
        (Resolved::Text(a), Resolved::Text(b)) => Some(a.cmp(b) as i8),
        _ => None,
    }
}

/// `~` matching: case-insensitive, `%` as a multi-character wildcard.
/// Without a wildcard the pattern matches anywhere in the value.
fn like_match(lhs: &Resolved, rhs: &Resolved) -> bool {
    let (Resolved::Text(value), Resolved::Text(pattern)) = (lhs, rhs) else {
        return false;
    };

    if !pattern.contains('%') {
        return value.to_lowercase().contains(&pattern.to_lowercase());
    }

    let body: String = pattern
        .split('%')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("(?is)^{}$", body)) {
        Ok(re) => re.is_match(value),
        // Escaped segments always form a valid pattern; stay total anyway.
        Err(_) => false,
    }
}
