//! # Rule Parser
//!
//! Recursive-descent parser producing the rule AST. Parsing happens once,
//! at collection define/alter time; requests only ever evaluate the cached
//! result, so a malformed rule can never reject a record request at runtime.
//!
//! Grammar:
//!
//! ```text
//! rule       := or
//! or         := and ( '||' and )*
//! and        := primary ( '&&' primary )*
//! primary    := '(' or ')' | comparison | 'true' | 'false'
//! comparison := operand op operand
//! operand    := 'null' | number | string | bool | list | reference
//! list       := '[' operand ( ',' operand )* ']'
//! reference  := field-path | '@request.auth.' path | '@request.query.' name
//! ```

use super::ast::{CmpOp, Expr, Operand, RequestRef};
use super::errors::{RuleError, RuleResult};
use super::token::{tokenize, Token};

/// A parsed, cached rule expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    expr: Expr,
    source: String,
}

impl ParsedRule {
    /// The parsed expression tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// The original rule source, for catalog persistence and admin responses.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parse an access rule.
pub fn parse_rule(input: &str) -> RuleResult<ParsedRule> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(RuleError::UnexpectedToken(extra.describe()));
    }
    Ok(ParsedRule {
        expr,
        source: input.to_string(),
    })
}

/// Parse a client-supplied list filter.
///
/// Filters share the rule grammar; the executor intersects the result with
/// the view rule, so a filter can only ever narrow visibility.
pub fn parse_filter(input: &str) -> RuleResult<ParsedRule> {
    if input.trim().is_empty() {
        return Err(RuleError::UnexpectedEnd);
    }
    parse_rule(input)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> RuleResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> RuleResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.parse_primary()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> RuleResult<Expr> {
        if self.peek() == Some(&Token::LParen) {
            self.advance();
            let expr = self.parse_or()?;
            match self.advance() {
                Some(Token::RParen) => return Ok(expr),
                Some(other) => return Err(RuleError::UnexpectedToken(other.describe())),
                None => return Err(RuleError::UnexpectedEnd),
            }
        }

        let lhs = self.parse_operand()?;

        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Like) => CmpOp::Like,
            Some(Token::NotLike) => CmpOp::NotLike,
            Some(Token::In) => CmpOp::In,
            _ => {
                // A bare boolean literal stands alone as a constant rule.
                return match lhs {
                    Operand::Bool(b) => Ok(Expr::Const(b)),
                    other => Err(RuleError::UnexpectedToken(describe_operand(&other))),
                };
            }
        };
        self.advance();

        let rhs = self.parse_operand()?;
        Ok(Expr::Cmp { lhs, op, rhs })
    }

    fn parse_operand(&mut self) -> RuleResult<Operand> {
        match self.advance() {
            Some(Token::Null) => Ok(Operand::Null),
            Some(Token::True) => Ok(Operand::Bool(true)),
            Some(Token::False) => Ok(Operand::Bool(false)),
            Some(Token::Number(n)) => Ok(Operand::Number(n)),
            Some(Token::Str(s)) => Ok(Operand::Text(s)),
            Some(Token::LBracket) => self.parse_list(),
            Some(Token::Ident(ident)) => parse_reference(&ident),
            Some(other) => Err(RuleError::UnexpectedToken(other.describe())),
            None => Err(RuleError::UnexpectedEnd),
        }
    }

    fn parse_list(&mut self) -> RuleResult<Operand> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.advance();
            return Ok(Operand::List(items));
        }
        loop {
            items.push(self.parse_operand()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(Operand::List(items)),
                Some(other) => return Err(RuleError::UnexpectedToken(other.describe())),
                None => return Err(RuleError::UnexpectedEnd),
            }
        }
    }
}

/// Classify a dotted identifier into a field path or a `@request` reference.
fn parse_reference(ident: &str) -> RuleResult<Operand> {
    if let Some(rest) = ident.strip_prefix('@') {
        let segments: Vec<&str> = rest.split('.').collect();
        return match segments.as_slice() {
            ["request", "auth", path @ ..] if !path.is_empty() => Ok(Operand::Request(
                RequestRef::Auth(path.iter().map(|s| s.to_string()).collect()),
            )),
            ["request", "query", name] => {
                Ok(Operand::Request(RequestRef::Query(name.to_string())))
            }
            ["request"] | ["request", "auth"] | ["request", "query"] => {
                Err(RuleError::IncompleteReference(ident.to_string()))
            }
            _ => Err(RuleError::UnknownReference(ident.to_string())),
        };
    }

    // `record.` is an optional explicit prefix for field paths.
    let path = ident.strip_prefix("record.").unwrap_or(ident);
    if path.is_empty() || path == "record" {
        return Err(RuleError::IncompleteReference(ident.to_string()));
    }
    let segments: Vec<String> = path.split('.').map(|s| s.to_string()).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(RuleError::UnexpectedToken(ident.to_string()));
    }
    Ok(Operand::Field(segments))
}

fn describe_operand(op: &Operand) -> String {
    match op {
        Operand::Null => "null".into(),
        Operand::Bool(b) => b.to_string(),
        Operand::Number(n) => n.to_string(),
        Operand::Text(s) => format!("'{}'", s),
        Operand::List(_) => "[...]".into(),
        Operand::Field(path) => path.join("."),
        Operand::Request(RequestRef::Auth(path)) => format!("@request.auth.{}", path.join(".")),
        Operand::Request(RequestRef::Query(name)) => format!("@request.query.{}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ownership_rule() {
        let rule = parse_rule("record.author = @request.auth.id").unwrap();
        assert_eq!(
            rule.expr(),
            &Expr::Cmp {
                lhs: Operand::Field(vec!["author".into()]),
                op: CmpOp::Eq,
                rhs: Operand::Request(RequestRef::Auth(vec!["id".into()])),
            }
        );
        assert_eq!(rule.source(), "record.author = @request.auth.id");
    }

    #[test]
    fn test_parse_bare_field_prefix_optional() {
        let with_prefix = parse_rule("record.status = 'public'").unwrap();
        let without = parse_rule("status = 'public'").unwrap();
        assert_eq!(with_prefix.expr(), without.expr());
    }

    #[test]
    fn test_parse_precedence_and_binds_tighter() {
        let rule = parse_rule("a = 1 || b = 2 && c = 3").unwrap();
        match rule.expr() {
            Expr::Or(lhs, rhs) => {
                assert!(matches!(**lhs, Expr::Cmp { .. }));
                assert!(matches!(**rhs, Expr::And(_, _)));
            }
            other => panic!("expected Or at root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parenthesized_group() {
        let rule = parse_rule("(a = 1 || b = 2) && c = 3").unwrap();
        match rule.expr() {
            Expr::And(lhs, _) => assert!(matches!(**lhs, Expr::Or(_, _))),
            other => panic!("expected And at root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_constant_rule() {
        assert_eq!(parse_rule("true").unwrap().expr(), &Expr::Const(true));
        assert_eq!(parse_rule("false").unwrap().expr(), &Expr::Const(false));
    }

    #[test]
    fn test_parse_in_list() {
        let rule = parse_rule("status in ['draft', 'review']").unwrap();
        match rule.expr() {
            Expr::Cmp { op: CmpOp::In, rhs: Operand::List(items), .. } => {
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected In comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_incomplete_auth_reference() {
        assert_eq!(
            parse_rule("@request.auth = null"),
            Err(RuleError::IncompleteReference("@request.auth".into()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_reference() {
        assert!(matches!(
            parse_rule("@collection.users.id = 1"),
            Err(RuleError::UnknownReference(_))
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        assert!(matches!(
            parse_rule("a = 1 b"),
            Err(RuleError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(parse_rule(""), Err(RuleError::UnexpectedEnd));
    }

    #[test]
    fn test_parse_rejects_bare_field() {
        assert!(matches!(
            parse_rule("published"),
            Err(RuleError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_parse_filter_rejects_blank() {
        assert_eq!(parse_filter("   "), Err(RuleError::UnexpectedEnd));
    }
}
