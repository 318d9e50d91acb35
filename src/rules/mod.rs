//! # Access Rule Engine
//!
//! A small boolean expression language gating every record operation.
//! Rules are parsed once when a collection is defined or altered, cached on
//! the compiled collection, and evaluated against a per-request context.
//!
//! Design constraints:
//! - Evaluation is total: every node has a defined result for every input,
//!   type mismatches evaluate to `false`, never to an error.
//! - Evaluation is pure: no I/O, no mutation, safe to run inline with every
//!   request and at event publish time.
//! - An absent rule denies the operation for non-admin identities
//!   (fail-closed).
//!
//! Client list filters reuse the same grammar, restricted to field, literal
//! and `@request.*` operands, and are always intersected with the view rule.

mod ast;
mod context;
mod errors;
mod eval;
mod parser;
mod token;

pub use ast::{CmpOp, Expr, Operand, RequestRef};
pub use context::RuleContext;
pub use errors::{RuleError, RuleResult};
pub use eval::evaluate;
pub use parser::{parse_filter, parse_rule, ParsedRule};
