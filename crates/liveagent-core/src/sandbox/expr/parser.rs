//! Recursive-descent parser.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary `+ -`, `**`, then calls/subscripts/attributes.

use serde_json::{json, Value};

use super::ast::{BinOp, BoolOp, CmpOp, Expr, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use super::ParseError;

/// Words that would introduce a statement or unsupported construct.
const UNSUPPORTED_WORDS: &[&str] = &[
    "lambda", "if", "else", "for", "while", "def", "class", "return", "yield", "del", "pass",
    "global", "nonlocal", "with", "try", "except", "raise", "assert", "async", "await", "is",
];

/// Bound on simultaneously open groups and prefix operators.
const MAX_DEPTH: usize = 100;

/// Bound on operator and postfix links (`a + b`, `x or y`, `.a`, `[i]`,
/// `()`) across the whole expression. With [`MAX_DEPTH`] this caps the tree
/// height, so evaluating and dropping the tree stays within a thread's stack.
const MAX_LINKS: usize = 256;

pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        links: 0,
        end: source.len(),
    };
    let expr = parser.expression()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(ParseError::new(
            format!("unexpected {} after expression", describe(&extra.token)),
            extra.offset,
        ));
    }
    Ok(expr)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Assign => "'=' (assignment is not allowed)".to_string(),
        Token::Semicolon => "';' (statements are not allowed)".to_string(),
        other => format!("'{other}'"),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    links: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|s| s.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = match self.peek() {
            Some(tok) => describe(tok),
            None => "end of input".to_string(),
        };
        Err(ParseError::new(
            format!("expected '{expected}', found {found}"),
            self.offset(),
        ))
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new("expression nested too deeply", self.offset()));
        }
        Ok(())
    }

    /// Count one chain link. Links are never released: a chain nested as
    /// the left operand of another still adds to the same tree path.
    fn link(&mut self) -> Result<(), ParseError> {
        self.links += 1;
        if self.links > MAX_LINKS {
            return Err(ParseError::new("expression nested too deeply", self.offset()));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.or_expr();
        self.depth -= 1;
        expr
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.peek_ident("or") {
            self.pos += 1;
            self.link()?;
            let right = self.and_expr()?;
            left = Expr::Bool {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        while self.peek_ident("and") {
            self.pos += 1;
            self.link()?;
            let right = self.not_expr()?;
            left = Expr::Bool {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek_ident("not") {
            self.pos += 1;
            self.enter()?;
            let operand = self.not_expr();
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek()? {
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::Ne,
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            Token::Ident(w) if w == "in" => CmpOp::In,
            Token::Ident(w) if w == "not" => {
                let next_is_in = matches!(
                    self.tokens.get(self.pos + 1).map(|s| &s.token),
                    Some(Token::Ident(n)) if n == "in"
                );
                if !next_is_in {
                    return None;
                }
                self.pos += 1;
                CmpOp::NotIn
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.link()?;
            let right = self.term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::DoubleSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            self.link()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.unary();
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if self.eat(&Token::DoubleStar) {
            self.enter()?;
            // right-associative, and the exponent may carry its own sign
            let exponent = self.unary();
            self.depth -= 1;
            return Ok(binary(BinOp::Pow, base, exponent?));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if matches!(
                self.peek(),
                Some(Token::LParen | Token::LBracket | Token::Dot)
            ) {
                self.link()?;
            }
            match self.peek() {
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.sequence(&Token::RParen)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let offset = self.offset();
                    let attr = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        _ => {
                            return Err(ParseError::new(
                                "expected attribute name after '.'",
                                offset,
                            ))
                        }
                    };
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        let token = self
            .advance()
            .ok_or_else(|| ParseError::new("unexpected end of input", offset))?;

        match token {
            Token::Int(i) => Ok(Expr::Literal(json!(i))),
            Token::Float(f) => Ok(Expr::Literal(json!(f))),
            Token::Str(s) => {
                // adjacent literals concatenate
                let mut s = s;
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::Ident(word) => self.word(word, offset),
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.expression()?;
                if self.eat(&Token::RParen) {
                    return Ok(first);
                }
                self.expect(&Token::Comma)?;
                let mut items = vec![first];
                items.extend(self.sequence(&Token::RParen)?);
                Ok(Expr::Tuple(items))
            }
            Token::LBracket => Ok(Expr::List(self.sequence(&Token::RBracket)?)),
            Token::LBrace => self.dict(),
            other => Err(ParseError::new(
                format!("unexpected {}", describe(&other)),
                offset,
            )),
        }
    }

    fn word(&mut self, word: String, offset: usize) -> Result<Expr, ParseError> {
        match word.as_str() {
            "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
            "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
            "None" | "null" => Ok(Expr::Literal(Value::Null)),
            "import" => Ok(Expr::Import {
                module: self.dotted_name()?,
            }),
            "from" => {
                let module = self.dotted_name()?;
                if !self.peek_ident("import") {
                    return Err(ParseError::new("expected 'import'", self.offset()));
                }
                self.pos += 1;
                let name = self.dotted_name()?;
                Ok(Expr::Import {
                    module: format!("{module}.{name}"),
                })
            }
            "and" | "or" | "not" | "in" => Err(ParseError::new(
                format!("unexpected keyword '{word}'"),
                offset,
            )),
            w if UNSUPPORTED_WORDS.contains(&w) => Err(ParseError::new(
                format!("'{w}' is not supported in expressions"),
                offset,
            )),
            _ => Ok(Expr::Name(word)),
        }
    }

    fn dotted_name(&mut self) -> Result<String, ParseError> {
        let offset = self.offset();
        let mut name = match self.advance() {
            Some(Token::Ident(n)) => n,
            _ => return Err(ParseError::new("expected module name", offset)),
        };
        while self.eat(&Token::Dot) {
            let offset = self.offset();
            match self.advance() {
                Some(Token::Ident(n)) => {
                    name.push('.');
                    name.push_str(&n);
                }
                _ => return Err(ParseError::new("expected module name", offset)),
            }
        }
        Ok(name)
    }

    fn dict(&mut self) -> Result<Expr, ParseError> {
        let mut pairs = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Dict(pairs));
            }
            let key = self.expression()?;
            self.expect(&Token::Colon)?;
            let value = self.expression()?;
            pairs.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                return Ok(Expr::Dict(pairs));
            }
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_mul_over_add() {
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary {
                op: BinOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. })),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_power_is_right_associative_and_binds_over_unary() {
        // -2 ** 2 parses as -(2 ** 2)
        let expr = parse("-2 ** 2").unwrap();
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Neg, .. }));

        let expr = parse("2 ** 3 ** 2").unwrap();
        match expr {
            Expr::Binary {
                op: BinOp::Pow,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinOp::Pow, .. })),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_not_in_comparison() {
        let expr = parse("'a' not in names").unwrap();
        match expr {
            Expr::Compare { rest, .. } => assert_eq!(rest[0].0, CmpOp::NotIn),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_tuple_and_parenthesized() {
        assert!(matches!(parse("(1)").unwrap(), Expr::Literal(_)));
        assert!(matches!(parse("(1,)").unwrap(), Expr::Tuple(items) if items.len() == 1));
        assert!(matches!(parse("()").unwrap(), Expr::Tuple(items) if items.is_empty()));
    }

    #[test]
    fn test_import_forms_parse_to_import_node() {
        assert_eq!(
            parse("import os.path").unwrap(),
            Expr::Import {
                module: "os.path".into()
            }
        );
        assert_eq!(
            parse("from os import system").unwrap(),
            Expr::Import {
                module: "os.system".into()
            }
        );
    }

    #[test]
    fn test_assignment_is_rejected() {
        let err = parse("x = 1").unwrap_err();
        assert!(err.message.contains("assignment"), "{err}");
    }

    #[test]
    fn test_statement_separator_is_rejected() {
        let err = parse("1; 2").unwrap_err();
        assert!(err.message.contains("statements"), "{err}");
    }

    #[test]
    fn test_lambda_is_unsupported() {
        let err = parse("lambda: 1").unwrap_err();
        assert!(err.message.contains("lambda"));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(parse("[1, 2").is_err());
        assert!(parse("len(x").is_err());
        assert!(parse("{'a': 1").is_err());
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let src = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&src).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_long_operator_chains_are_bounded() {
        for src in [
            format!("1{}", "+1".repeat(200_000)),
            format!("2{}", "*2".repeat(200_000)),
            format!("x{}", " or x".repeat(200_000)),
            format!("x{}", ".a".repeat(200_000)),
            format!("x{}", "[0]".repeat(200_000)),
            format!("f{}", "()".repeat(200_000)),
        ] {
            let err = parse(&src).unwrap_err();
            assert!(err.message.contains("nested too deeply"), "{err}");
        }
    }

    #[test]
    fn test_moderate_chains_still_parse() {
        assert!(parse(&format!("1{}", " + 1".repeat(200))).is_ok());
        assert!(parse(&format!("row{}", "['a']".repeat(200))).is_ok());
    }

    #[test]
    fn test_chains_nested_in_groups_share_the_bound() {
        // short chains in nested groups stack along the left spine
        let mut src = "1".to_string();
        for _ in 0..60 {
            src = format!("({src}{})", "+1".repeat(10));
        }
        let err = parse(&src).unwrap_err();
        assert!(err.message.contains("nested too deeply"), "{err}");
    }
}
