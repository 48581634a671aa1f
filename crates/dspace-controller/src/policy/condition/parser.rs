//! Parser: recursive descent over condition tokens
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / %`, unary minus, then literals, parentheses and paths.

use super::errors::{ConditionError, ConditionResult};
use super::lexer::{Lexer, Token, TokenKind};
use serde_json::Value;

/// Document a path starts from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Root {
    Source,
    Target,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Field(String),
    /// Array index; negative counts from the end
    Index(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path { root: Root, segments: Vec<Segment> },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Deepest nesting of parentheses, `not` and unary minus
pub const MAX_DEPTH: usize = 128;

/// Longest condition accepted, in tokens
pub const MAX_TOKENS: usize = 4096;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Parse a complete condition expression
    pub fn parse(input: &str) -> ConditionResult<Expr> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        if let Some(tok) = tokens.get(MAX_TOKENS) {
            return Err(ConditionError::ParseError {
                line: tok.line,
                col: tok.col,
                message: format!("condition is longer than {} tokens", MAX_TOKENS),
            });
        }
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };

        let expr = parser.parse_or()?;
        if !parser.check(TokenKind::Eof) {
            let tok = parser.peek();
            return Err(ConditionError::ParseError {
                line: tok.line,
                col: tok.col,
                message: format!("unexpected '{}' after expression", tok.text),
            });
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> ConditionResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ConditionResult<Expr> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ConditionResult<Expr> {
        if self.check(TokenKind::Not) {
            self.advance();
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ConditionResult<Expr> {
        let left = self.parse_additive()?;
        let Some(op) = comparison_op(self.peek_kind()) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;

        if comparison_op(self.peek_kind()).is_some() {
            let tok = self.peek();
            return Err(ConditionError::ParseError {
                line: tok.line,
                col: tok.col,
                message: "comparisons cannot be chained; use 'and'".into(),
            });
        }
        Ok(binary(op, left, right))
    }

    fn parse_additive(&mut self) -> ConditionResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ConditionResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ConditionResult<Expr> {
        if self.check(TokenKind::Minus) {
            self.advance();
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ConditionResult<Expr> {
        match self.peek_kind() {
            TokenKind::NumberLiteral => {
                let text = self.advance().text.clone();
                Ok(Expr::Literal(number_literal(&text)))
            }
            TokenKind::StringLiteral => {
                let text = self.advance().text.clone();
                Ok(Expr::Literal(Value::String(text)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenKind::OpenParen => {
                self.advance();
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::Dot => {
                // jq-style `.source.level`
                self.advance();
                self.parse_path()
            }
            TokenKind::Identifier => self.parse_path(),
            TokenKind::Eof => Err(ConditionError::UnexpectedEof("expression".into())),
            _ => {
                let tok = self.peek();
                Err(ConditionError::UnexpectedToken {
                    expected: "expression".into(),
                    found: tok.text.clone(),
                })
            }
        }
    }

    fn parse_path(&mut self) -> ConditionResult<Expr> {
        let tok = self.expect(TokenKind::Identifier)?;
        let root = match tok.text.as_str() {
            "source" => Root::Source,
            "target" => Root::Target,
            other => {
                return Err(ConditionError::ParseError {
                    line: tok.line,
                    col: tok.col,
                    message: format!("unknown name '{}'; paths start at 'source' or 'target'", other),
                })
            }
        };

        let mut segments = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    segments.push(Segment::Field(self.expect_field_name()?));
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    segments.push(self.parse_subscript()?);
                    self.expect(TokenKind::CloseBracket)?;
                }
                _ => break,
            }
        }

        Ok(Expr::Path { root, segments })
    }

    /// Field after a dot: an identifier, a keyword used as a name, or a quoted string
    fn expect_field_name(&mut self) -> ConditionResult<String> {
        match self.peek_kind() {
            TokenKind::Identifier
            | TokenKind::StringLiteral
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Not
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => Ok(self.advance().text.clone()),
            TokenKind::Eof => Err(ConditionError::UnexpectedEof("field name".into())),
            _ => {
                let tok = self.peek();
                Err(ConditionError::UnexpectedToken {
                    expected: "field name".into(),
                    found: tok.text.clone(),
                })
            }
        }
    }

    fn parse_subscript(&mut self) -> ConditionResult<Segment> {
        if self.check(TokenKind::StringLiteral) {
            return Ok(Segment::Field(self.advance().text.clone()));
        }

        let negative = self.check(TokenKind::Minus);
        if negative {
            self.advance();
        }
        let tok = self.expect(TokenKind::NumberLiteral)?;
        let index = tok.text.parse::<i64>().map_err(|_| ConditionError::ParseError {
            line: tok.line,
            col: tok.col,
            message: format!("array index '{}' is not an integer", tok.text),
        })?;
        Ok(Segment::Index(if negative { -index } else { index }))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn descend(&mut self) -> ConditionResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let tok = self.peek();
            return Err(ConditionError::ParseError {
                line: tok.line,
                col: tok.col,
                message: format!("expression nests deeper than {} levels", MAX_DEPTH),
            });
        }
        Ok(())
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> ConditionResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(ConditionError::UnexpectedEof(format!("{}", kind)))
        } else {
            let tok = self.peek();
            Err(ConditionError::UnexpectedToken {
                expected: format!("{}", kind),
                found: tok.text.clone(),
            })
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn comparison_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Eq => Some(BinaryOp::Eq),
        TokenKind::Ne => Some(BinaryOp::Ne),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Le => Some(BinaryOp::Le),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Ge => Some(BinaryOp::Ge),
        _ => None,
    }
}

/// Integral literals stay integers so they print and compare like JSON input
fn number_literal(text: &str) -> Value {
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(root: Root, fields: &[&str]) -> Expr {
        Expr::Path {
            root,
            segments: fields.iter().map(|f| Segment::Field(f.to_string())).collect(),
        }
    }

    #[test]
    fn test_parse_simple_comparison() {
        let expr = Parser::parse("source.level > target.level").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Gt,
                path(Root::Source, &["level"]),
                path(Root::Target, &["level"])
            )
        );
    }

    #[test]
    fn test_leading_dot_accepted() {
        assert_eq!(
            Parser::parse(".source.spec.level").unwrap(),
            path(Root::Source, &["spec", "level"])
        );
    }

    #[test]
    fn test_subscripts() {
        let expr = Parser::parse(r#"target["obs"].items[-1]"#).unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                root: Root::Target,
                segments: vec![
                    Segment::Field("obs".into()),
                    Segment::Field("items".into()),
                    Segment::Index(-1),
                ],
            }
        );
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 == 7 or false  =>  ((1 + (2 * 3)) == 7) or false
        let expr = Parser::parse("1 + 2 * 3 == 7 or false").unwrap();
        let expected = binary(
            BinaryOp::Or,
            binary(
                BinaryOp::Eq,
                binary(
                    BinaryOp::Add,
                    Expr::Literal(json!(1)),
                    binary(BinaryOp::Mul, Expr::Literal(json!(2)), Expr::Literal(json!(3))),
                ),
                Expr::Literal(json!(7)),
            ),
            Expr::Literal(json!(false)),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        let expr = Parser::parse("not source.a == 1 and true").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary { op: BinaryOp::And, ref left, .. } if matches!(**left, Expr::Not(_))
        ));
    }

    #[test]
    fn test_parentheses_and_negation() {
        let expr = Parser::parse("-(source.x - 1)").unwrap();
        assert!(matches!(expr, Expr::Neg(_)));
    }

    #[test]
    fn test_keyword_field_names() {
        assert_eq!(
            Parser::parse("source.status.not").unwrap(),
            path(Root::Source, &["status", "not"])
        );
    }

    #[test]
    fn test_chained_comparison_rejected() {
        assert!(matches!(
            Parser::parse("1 < 2 < 3"),
            Err(ConditionError::ParseError { .. })
        ));
    }

    #[test]
    fn test_unknown_root_rejected() {
        let err = Parser::parse("other.level > 1").unwrap_err();
        assert!(err.to_string().contains("unknown name 'other'"));
    }

    #[test]
    fn test_incomplete_input() {
        assert!(matches!(
            Parser::parse("source.level >"),
            Err(ConditionError::UnexpectedEof(_))
        ));
        assert!(matches!(
            Parser::parse("(true"),
            Err(ConditionError::UnexpectedEof(_))
        ));
        assert!(matches!(Parser::parse(""), Err(ConditionError::UnexpectedEof(_))));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(Parser::parse("true false").is_err());
    }

    #[test]
    fn test_fractional_index_rejected() {
        assert!(Parser::parse("source.items[1.5]").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |n: usize| format!("{}true{}", "(".repeat(n), ")".repeat(n));
        assert!(Parser::parse(&nested(MAX_DEPTH)).is_ok());
        assert!(matches!(
            Parser::parse(&nested(MAX_DEPTH + 1)),
            Err(ConditionError::ParseError { .. })
        ));
        assert!(Parser::parse(&nested(200_000)).is_err());

        let negations = format!("{}1", "-".repeat(MAX_DEPTH + 1));
        assert!(Parser::parse(&negations).is_err());
        let nots = format!("{}true", "not ".repeat(MAX_DEPTH + 1));
        assert!(Parser::parse(&nots).is_err());
    }

    #[test]
    fn test_token_limit() {
        let chain = |n: usize| vec!["1"; n].join(" + ");
        assert!(Parser::parse(&chain(1000)).is_ok());
        assert!(matches!(
            Parser::parse(&chain(MAX_TOKENS)),
            Err(ConditionError::ParseError { .. })
        ));
    }
}
