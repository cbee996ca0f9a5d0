//! Expression evaluation against a single timestamp.

use std::borrow::Cow;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use regex::Regex;

use super::EvalError;
use super::parser::{BinaryOp, Expr, Pattern, UnaryOp, Variable};

/// Value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value<'a> {
    Number(f64),
    Str(Cow<'a, str>),
    Bool(bool),
}

impl Value<'_> {
    pub(crate) const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Bool(_) => "boolean",
        }
    }
}

/// Variables visible to one evaluation: the record path and one of its
/// timestamps. Calendar attributes are taken in UTC.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Environment<'a> {
    pub path: &'a str,
    pub time: DateTime<Utc>,
}

impl<'a> Environment<'a> {
    #[expect(
        clippy::cast_precision_loss,
        reason = "bodyfile epoch seconds fit in an f64 mantissa"
    )]
    fn lookup(&self, variable: &Variable) -> Result<Value<'a>, EvalError> {
        Ok(match variable {
            Variable::Path => Value::Str(Cow::Borrowed(self.path)),
            Variable::Hour => Value::Number(f64::from(self.time.hour())),
            Variable::Minute => Value::Number(f64::from(self.time.minute())),
            Variable::Day => Value::Number(f64::from(self.time.day())),
            Variable::Date => Value::Number(self.time.timestamp() as f64),
            Variable::Weekday => Value::Str(Cow::Borrowed(weekday_name(self.time.weekday()))),
            Variable::Unknown(name) => return Err(EvalError::UnknownVariable(name.clone())),
        })
    }
}

pub(crate) const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

impl Expr {
    pub(crate) fn eval<'a>(&'a self, env: &Environment<'a>) -> Result<Value<'a>, EvalError> {
        match self {
            Self::Number(n) => Ok(Value::Number(*n)),
            Self::Str(s) => Ok(Value::Str(Cow::Borrowed(s))),
            Self::Bool(b) => Ok(Value::Bool(*b)),
            Self::Variable(variable) => env.lookup(variable),
            Self::Unary(UnaryOp::Not, operand) => match operand.eval(env)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(mismatch("!", &[&other])),
            },
            Self::Unary(UnaryOp::Negate, operand) => match operand.eval(env)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(mismatch("-", &[&other])),
            },
            Self::Binary(op @ (BinaryOp::And | BinaryOp::Or), left, right) => {
                let short_circuit = matches!(op, BinaryOp::Or);
                if expect_bool(op.symbol(), left.eval(env)?)? == short_circuit {
                    return Ok(Value::Bool(short_circuit));
                }
                Ok(Value::Bool(expect_bool(op.symbol(), right.eval(env)?)?))
            }
            Self::Binary(op, left, right) => binary(*op, left.eval(env)?, right.eval(env)?),
            Self::Match {
                negated,
                subject,
                pattern,
            } => {
                let subject = subject.eval(env)?;
                let Value::Str(text) = &subject else {
                    return Err(mismatch("=~", &[&subject]));
                };
                let found = match pattern {
                    Pattern::Static(regex) => regex.is_match(text),
                    Pattern::Dynamic(expr) => match expr.eval(env)? {
                        Value::Str(source) => Regex::new(&source)
                            .map_err(|e| EvalError::InvalidRegex(e.to_string()))?
                            .is_match(text),
                        other => return Err(mismatch("=~", &[&subject, &other])),
                    },
                };
                Ok(Value::Bool(found != *negated))
            }
        }
    }
}

fn binary<'a>(op: BinaryOp, left: Value<'a>, right: Value<'a>) -> Result<Value<'a>, EvalError> {
    use std::cmp::Ordering;

    let ordering = |left: &Value<'_>, right: &Value<'_>| -> Result<Option<Ordering>, EvalError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            _ => Err(mismatch(op.symbol(), &[left, right])),
        }
    };

    let value = match op {
        BinaryOp::Eq => Value::Bool(left == right),
        BinaryOp::Ne => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(ordering(&left, &right)? == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            ordering(&left, &right)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(ordering(&left, &right)? == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            ordering(&left, &right)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::Str(a), Value::Str(b)) => Value::Str(Cow::Owned(format!("{a}{b}"))),
            (left, right) => return Err(mismatch("+", &[&left, &right])),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                return Err(mismatch(op.symbol(), &[&left, &right]));
            };
            let (a, b) = (*a, *b);
            if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Value::Number(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })
        }
        BinaryOp::And | BinaryOp::Or => {
            let a = expect_bool(op.symbol(), left)?;
            let b = expect_bool(op.symbol(), right)?;
            Value::Bool(if op == BinaryOp::And { a && b } else { a || b })
        }
    };
    Ok(value)
}

fn expect_bool(op: &'static str, value: Value<'_>) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(mismatch(op, &[&other])),
    }
}

fn mismatch(op: &'static str, operands: &[&Value<'_>]) -> EvalError {
    EvalError::TypeMismatch {
        op,
        operands: operands
            .iter()
            .map(|v| v.type_name())
            .collect::<Vec<_>>()
            .join(" and "),
    }
}
