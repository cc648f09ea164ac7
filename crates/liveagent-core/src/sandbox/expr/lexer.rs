//! Tokenizer for the safe expression grammar.

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `=`; only tokenized so the parser can name it in an error.
    Assign,
    /// `;`; same.
    Semicolon,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x:?}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
            Token::Dot => f.write_str("."),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::DoubleStar => f.write_str("**"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::Percent => f.write_str("%"),
            Token::EqEq => f.write_str("=="),
            Token::NotEq => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
            Token::Assign => f.write_str("="),
            Token::Semicolon => f.write_str(";"),
        }
    }
}

/// A token plus its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && peek_is_digit(&chars, i + 1)) {
            let (token, next) = lex_number(source, &chars, i)?;
            tokens.push(Spanned { token, offset });
            i = next;
            continue;
        }

        if c == '_' || c.is_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].1 == '_' || chars[i].1.is_alphanumeric()) {
                i += 1;
            }
            let end = chars.get(i).map_or(source.len(), |(o, _)| *o);
            tokens.push(Spanned {
                token: Token::Ident(source[chars[start].0..end].to_string()),
                offset,
            });
            continue;
        }

        if c == '"' || c == '\'' {
            let (s, next) = lex_string(&chars, i, c)?;
            tokens.push(Spanned {
                token: Token::Str(s),
                offset,
            });
            i = next;
            continue;
        }

        let next = chars.get(i + 1).map(|(_, n)| *n);
        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::DoubleStar, 2),
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            ('.', _) => (Token::Dot, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('=', _) => (Token::Assign, 1),
            (';', _) => (Token::Semicolon, 1),
            _ => {
                return Err(ParseError::new(
                    format!("invalid character {c:?}"),
                    offset,
                ))
            }
        };
        tokens.push(Spanned { token, offset });
        i += width;
    }

    Ok(tokens)
}

fn peek_is_digit(chars: &[(usize, char)], i: usize) -> bool {
    chars.get(i).is_some_and(|(_, c)| c.is_ascii_digit())
}

fn lex_number(
    source: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(Token, usize), ParseError> {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i].1 == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].1.is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j].1, '+' | '-') {
            j += 1;
        }
        if peek_is_digit(chars, j) {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
        }
    }

    let offset = chars[start].0;
    let end = chars.get(i).map_or(source.len(), |(o, _)| *o);
    let text: String = source[offset..end].chars().filter(|c| *c != '_').collect();

    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| ParseError::new(format!("invalid number {text:?}: {e}"), offset))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| ParseError::new(format!("invalid integer {text:?}: {e}"), offset))?
    };
    Ok((token, i))
}

fn lex_string(
    chars: &[(usize, char)],
    start: usize,
    quote: char,
) -> Result<(String, usize), ParseError> {
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((out, i + 1));
        }
        if c == '\\' {
            let escaped = chars
                .get(i + 1)
                .map(|(_, e)| *e)
                .ok_or_else(|| ParseError::new("unterminated string literal", chars[start].0))?;
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
            i += 2;
            continue;
        }
        if c == '\n' {
            break;
        }
        out.push(c);
        i += 1;
    }
    Err(ParseError::new(
        "unterminated string literal",
        chars[start].0,
    ))
}
