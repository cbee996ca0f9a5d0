//! Recursive-descent parser producing the filter AST.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use super::CompileError;
use super::lexer::{Spanned, Token, tokenize};

/// Variables exposed to expressions, resolved once at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Variable {
    Path,
    Hour,
    Minute,
    Day,
    Date,
    Weekday,
    /// Unknown names only fail when evaluated.
    Unknown(String),
}

impl Variable {
    fn from_name(name: &str) -> Self {
        match name {
            "path" | "p" => Self::Path,
            "hour" | "h" => Self::Hour,
            "min" | "m" => Self::Minute,
            "day" | "D" => Self::Day,
            "date" | "d" => Self::Date,
            "weekday" | "w" => Self::Weekday,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    And,
    Or,
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

impl BinaryOp {
    pub(crate) const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// Right-hand side of `=~` / `!~`.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    /// Literal pattern, compiled with the expression.
    Static(Regex),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Variable(Variable),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Match {
        negated: bool,
        subject: Box<Expr>,
        pattern: Pattern,
    },
}

/// Deepest allowed nesting of parentheses and prefix operators.
const MAX_NESTING: usize = 128;

pub(crate) fn parse_expression(input: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };

    if parser.tokens.is_empty() {
        return Err(CompileError::new("empty expression", 0));
    }

    let expr = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(CompileError::new(
            format!("unexpected '{}' after expression", extra.token.symbol()),
            extra.position,
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|s| &s.token) {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Match | Token::NotMatch) => {
                    let negated = self.advance().token == Token::NotMatch;
                    left = self.parse_match(left, negated)?;
                    continue;
                }
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_match(&mut self, subject: Expr, negated: bool) -> Result<Expr, CompileError> {
        let position = self.position();
        let pattern = match self.parse_additive()? {
            Expr::Str(source) => Pattern::Static(Regex::new(&source).map_err(|e| {
                CompileError::new(format!("invalid regular expression: {e}"), position)
            })?),
            other => Pattern::Dynamic(Box::new(other)),
        };
        Ok(Expr::Match {
            negated,
            subject: Box::new(subject),
            pattern,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|s| &s.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|s| &s.token) {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(CompileError::new(
                "expression nested too deeply",
                self.position(),
            ));
        }
        self.depth += 1;
        let expr = self.parse_prefixed();
        self.depth -= 1;
        expr
    }

    fn parse_prefixed(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Negate, Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let Some(spanned) = self.tokens.get(self.pos).cloned() else {
            return Err(CompileError::new("unexpected end of expression", self.end));
        };
        self.pos += 1;

        match spanned.token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(date_literal(&s).map_or(Expr::Str(s), Expr::Number)),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                _ => Expr::Variable(Variable::from_name(&name)),
            }),
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(CompileError::new("expected ')'", self.position()));
                }
                Ok(inner)
            }
            other => Err(CompileError::new(
                format!("unexpected '{}'", other.symbol()),
                spanned.position,
            )),
        }
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> &Spanned {
        let spanned = &self.tokens[self.pos];
        self.pos += 1;
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|s| s.token == *token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.end, |s| s.position)
    }
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Converts a date-looking string literal to UTC epoch seconds.
#[expect(
    clippy::cast_precision_loss,
    reason = "epoch seconds of parseable dates fit in an f64 mantissa"
)]
fn date_literal(s: &str) -> Option<f64> {
    let naive = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        });

    let secs = match naive {
        Some(naive) => naive.and_utc().timestamp(),
        None => DateTime::parse_from_rfc3339(s).ok()?.timestamp(),
    };
    Some(secs as f64)
}
