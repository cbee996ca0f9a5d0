//! Tokenizer for filter expressions.

use std::iter::Peekable;
use std::str::CharIndices;

use super::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl Token {
    /// Operator spelling used in error messages.
    pub(crate) const fn symbol(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Ident(_) => "identifier",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Match => "=~",
            Self::NotMatch => "!~",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
        }
    }
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        if ch.is_whitespace() {
            continue;
        }

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '&' if follows(&mut chars, '&') => Token::And,
            '|' if follows(&mut chars, '|') => Token::Or,
            '&' | '|' => {
                return Err(CompileError::new(format!("expected '{ch}{ch}'"), position));
            }
            '<' if follows(&mut chars, '=') => Token::Le,
            '<' => Token::Lt,
            '>' if follows(&mut chars, '=') => Token::Ge,
            '>' => Token::Gt,
            '=' if follows(&mut chars, '=') => Token::Eq,
            '=' if follows(&mut chars, '~') => Token::Match,
            '=' => return Err(CompileError::new("expected '==' or '=~'", position)),
            '!' if follows(&mut chars, '=') => Token::Ne,
            '!' if follows(&mut chars, '~') => Token::NotMatch,
            '!' => Token::Not,
            '\'' | '"' => {
                // Contents are verbatim: backslashes stay literal for paths and regexes.
                let start = position + ch.len_utf8();
                let mut end = None;
                for (idx, c) in chars.by_ref() {
                    if c == ch {
                        end = Some(idx);
                        break;
                    }
                }
                let end =
                    end.ok_or_else(|| CompileError::new("unterminated string literal", position))?;
                Token::Str(input[start..end].to_string())
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = position + c.len_utf8();
                while let Some((idx, next)) =
                    chars.next_if(|(_, n)| n.is_ascii_digit() || *n == '.')
                {
                    end = idx + next.len_utf8();
                }
                let text = &input[position..end];
                let value = text.parse().map_err(|_| {
                    CompileError::new(format!("invalid number literal '{text}'"), position)
                })?;
                Token::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = position + c.len_utf8();
                while let Some((idx, next)) =
                    chars.next_if(|(_, n)| n.is_alphanumeric() || *n == '_')
                {
                    end = idx + next.len_utf8();
                }
                Token::Ident(input[position..end].to_string())
            }
            other => {
                return Err(CompileError::new(
                    format!("unexpected character '{other}'"),
                    position,
                ));
            }
        };

        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

/// Consumes the next character if it is `expected`.
fn follows(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    chars.next_if(|(_, c)| *c == expected).is_some()
}
