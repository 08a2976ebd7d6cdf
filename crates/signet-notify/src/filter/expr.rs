//! Boolean predicate expressions over webhook payloads.
//!
//! Implements the `"linq"` filter format (the name is part of the wire
//! contract carried over from earlier deployments): a small expression
//! language with dotted field paths, string/number/bool/null literals,
//! comparison operators, and boolean connectives.
//!
//! ```text
//! foo == "bar"
//! event_name == "user.created" && attempts < 3
//! user.plan != null || legacy
//! !(region == "eu" && amount >= 100)
//! ```
//!
//! Field paths resolve against the payload's JSON serialization; a missing
//! field resolves to `null`, which is falsy, so sparse payloads never
//! error.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FilterError;

use super::FilterEvaluator;

/// Evaluator for the `"linq"` predicate expression format.
pub struct ExprEvaluator;

#[async_trait]
impl FilterEvaluator for ExprEvaluator {
    fn format(&self) -> &str {
        "linq"
    }

    async fn matches(&self, expression: &str, payload: &Value) -> Result<bool, FilterError> {
        let expr = parse(expression)?;
        Ok(truthy(&expr.eval(payload)))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(Vec<String>),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

fn parse(expression: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(expression)
        .map_err(|message| FilterError::invalid(expression, message))?;
    if tokens.is_empty() {
        return Err(FilterError::invalid(expression, "empty expression"));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or().map_err(|message| FilterError::invalid(expression, message))?;
    if parser.pos != parser.tokens.len() {
        return Err(FilterError::invalid(expression, "unexpected trailing input"));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            },
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            },
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            },
            '=' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Eq),
                    _ => return Err("expected '==' after '='".to_string()),
                }
            },
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            },
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            },
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            },
            '&' => {
                chars.next();
                match chars.next() {
                    Some('&') => tokens.push(Token::And),
                    _ => return Err("expected '&&' after '&'".to_string()),
                }
            },
            '|' => {
                chars.next();
                match chars.next() {
                    Some('|') => tokens.push(Token::Or),
                    _ => return Err("expected '||' after '|'".to_string()),
                }
            },
            '"' => {
                chars.next();
                let mut out = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('"') => out.push('"'),
                            Some('\\') => out.push('\\'),
                            Some('n') => out.push('\n'),
                            Some('t') => out.push('\t'),
                            Some(other) => return Err(format!("invalid escape '\\{other}'")),
                            None => return Err("unterminated string literal".to_string()),
                        },
                        Some(other) => out.push(other),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(out));
            },
            c if c.is_ascii_digit() || c == '-' => {
                let mut raw = String::new();
                if c == '-' {
                    raw.push(c);
                    chars.next();
                    if !chars.peek().is_some_and(char::is_ascii_digit) {
                        return Err("expected digits after '-'".to_string());
                    }
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        raw.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num =
                    raw.parse::<f64>().map_err(|_| format!("invalid number literal {raw:?}"))?;
                tokens.push(Token::Num(num));
            },
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut raw = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' || d == '.' {
                        raw.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match raw.as_str() {
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    "null" => tokens.push(Token::Null),
                    _ => {
                        let segments: Vec<String> =
                            raw.split('.').map(str::to_string).collect();
                        if segments.iter().any(String::is_empty) {
                            return Err(format!("invalid field path {raw:?}"));
                        }
                        tokens.push(Token::Path(segments));
                    },
                }
            },
            other => return Err(format!("unexpected character {other:?}")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let left = self.parse_primary()?;

        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(left),
        };
        self.next();

        let right = self.parse_primary()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            },
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            )),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Path(segments)) => Ok(Expr::Path(segments)),
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

impl Expr {
    /// Evaluates the expression against a payload.
    ///
    /// Missing paths yield `Null`; boolean connectives operate on
    /// truthiness, so evaluation never fails at runtime.
    fn eval(&self, payload: &Value) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Path(segments) => resolve_path(payload, segments).cloned().unwrap_or(Value::Null),
            Self::Not(inner) => Value::Bool(!truthy(&inner.eval(payload))),
            Self::And(left, right) => {
                Value::Bool(truthy(&left.eval(payload)) && truthy(&right.eval(payload)))
            },
            Self::Or(left, right) => {
                Value::Bool(truthy(&left.eval(payload)) || truthy(&right.eval(payload)))
            },
            Self::Compare(op, left, right) => {
                Value::Bool(compare(*op, &left.eval(payload), &right.eval(payload)))
            },
        }
    }
}

fn resolve_path<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, key| current.get(key))
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_eq(left, right),
        CmpOp::Ne => !loose_eq(left, right),
        CmpOp::Lt => partial_order(left, right).is_some_and(|o| o.is_lt()),
        CmpOp::Le => partial_order(left, right).is_some_and(|o| o.is_le()),
        CmpOp::Gt => partial_order(left, right).is_some_and(|o| o.is_gt()),
        CmpOp::Ge => partial_order(left, right).is_some_and(|o| o.is_ge()),
    }
}

/// Structural equality with numbers compared by value, so `1` equals
/// `1.0` the way it does in the payload's JSON.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// Ordering is defined for number pairs and string pairs only; mixed or
/// unordered types compare as false.
fn partial_order(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return Some(l.cmp(r));
    }
    None
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
