//! # Rule Expression AST
//!
//! The parsed form of an access rule or list filter. Closed node set; the
//! evaluator dispatches over these tags with a defined result for every
//! input, which keeps evaluation total.

/// A boolean rule expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant expression (`true` denies nothing, `false` everything)
    Const(bool),
    /// Logical AND, short-circuiting
    And(Box<Expr>, Box<Expr>),
    /// Logical OR, short-circuiting
    Or(Box<Expr>, Box<Expr>),
    /// A single comparison
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `~` case-insensitive containment, `%` wildcards
    Like,
    /// `!~`
    NotLike,
    /// `in` membership
    In,
}

impl CmpOp {
    /// The operator as written in rule source
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Like => "~",
            CmpOp::NotLike => "!~",
            CmpOp::In => "in",
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Literal list, e.g. `['draft', 'review']`
    List(Vec<Operand>),
    /// Record field path (`title`, `record.title`, `meta.color`)
    Field(Vec<String>),
    /// `@request.*` reference
    Request(RequestRef),
}

/// A `@request` reference
#[derive(Debug, Clone, PartialEq)]
pub enum RequestRef {
    /// `@request.auth.<path>`: requesting identity claim
    Auth(Vec<String>),
    /// `@request.query.<name>`: request query parameter
    Query(String),
}

impl Expr {
    /// Whether any operand references `@request` state.
    ///
    /// Used to decide if a cached per-collection result can be shared across
    /// identities (it cannot when this is true).
    pub fn references_request(&self) -> bool {
        match self {
            Expr::Const(_) => false,
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.references_request() || b.references_request()
            }
            Expr::Cmp { lhs, rhs, .. } => {
                operand_references_request(lhs) || operand_references_request(rhs)
            }
        }
    }
}

fn operand_references_request(op: &Operand) -> bool {
    match op {
        Operand::Request(_) => true,
        Operand::List(items) => items.iter().any(operand_references_request),
        _ => false,
    }
}
