//! Residual expression parser.
//!
//! After grammar substitution the filter clause only holds vault keys,
//! literals, function calls, boolean and comparison operators, and
//! parentheses. This module turns that text into an `Expr`.

use crate::{
    error::QueryError,
    expr::{CompareOp, Expr, Literal, LogicalOp},
    guard,
    value::parse_number_literal,
    vault::{KEY_END, KEY_PREFIX, UNQUOTED_MARK, VaultKey},
};
use std::{iter::Peekable, str::Chars};

/// Deepest nesting the parser accepts. Parentheses, call argument lists,
/// `!` and each chained comparison count as one level.
pub const MAX_NESTING: usize = 256;

///
/// Token
///

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Key(VaultKey),
    // `.name` step directly after a key
    Member(String),
    Number(f64),
    Word(String),
    Compare(CompareOp),
    And,
    Or,
    Bang,
    Minus,
    LParen,
    RParen,
    Comma,
}

/// Parse residual query text. Loose equality becomes strict when `strict`
/// is set.
pub(crate) fn parse_residual(text: &str, strict: bool) -> Result<Expr, QueryError> {
    let tokens = lex(text)?;
    if tokens.is_empty() {
        return Ok(Expr::boolean(true));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        strict,
    };
    let expr = parser.parse_or()?;

    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(QueryError::syntax(format!(
            "unexpected token {}",
            describe(token)
        ))),
    }
}

//
// lexer
//

fn lex(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            KEY_PREFIX => {
                chars.next();
                let digits = take_while(&mut chars, |c| c.is_ascii_digit());
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| QueryError::syntax("malformed protected token"))?;
                let key = match chars.next() {
                    Some(UNQUOTED_MARK) => VaultKey::new(index).unquoted(),
                    Some(KEY_END) => VaultKey::new(index),
                    _ => return Err(QueryError::syntax("malformed protected token")),
                };
                tokens.push(Token::Key(key));
            }
            '.' if matches!(tokens.last(), Some(Token::Key(_) | Token::Member(_))) => {
                chars.next();
                let segment = take_while(&mut chars, |c| c.is_alphanumeric() || c == '_' || c == '$');
                if segment.is_empty() {
                    return Err(QueryError::syntax("expected a member name after `.`"));
                }
                tokens.push(Token::Member(segment));
            }
            '0'..='9' | '.' => {
                let literal = take_while(&mut chars, |c| {
                    c.is_ascii_alphanumeric() || c == '.' || c == '_'
                });
                let number = parse_number_literal(&literal).ok_or_else(|| {
                    QueryError::syntax(format!("invalid number `{literal}`"))
                })?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let word = take_while(&mut chars, |c| c.is_alphanumeric() || c == '_' || c == '$');
                tokens.push(Token::Word(word));
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let mut symbol = String::from(ch);
                while let Some(next) = chars.next_if_eq(&'=') {
                    symbol.push(next);
                }
                let token = match symbol.as_str() {
                    "!" => Token::Bang,
                    "==" => Token::Compare(CompareOp::Eq),
                    "!=" => Token::Compare(CompareOp::Ne),
                    "===" => Token::Compare(CompareOp::StrictEq),
                    "!==" => Token::Compare(CompareOp::StrictNe),
                    "<" => Token::Compare(CompareOp::Lt),
                    "<=" => Token::Compare(CompareOp::Lte),
                    ">" => Token::Compare(CompareOp::Gt),
                    ">=" => Token::Compare(CompareOp::Gte),
                    other => {
                        return Err(QueryError::syntax(format!("unknown operator `{other}`")));
                    }
                };
                tokens.push(token);
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if_eq(&ch).is_none() {
                    return Err(QueryError::syntax(format!("unknown operator `{ch}`")));
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            other => {
                return Err(QueryError::syntax(format!("unexpected character `{other}`")));
            }
        }
    }

    Ok(tokens)
}

fn take_while(chars: &mut Peekable<Chars<'_>>, pred: impl Fn(char) -> bool) -> String {
    let mut out = String::new();
    while let Some(c) = chars.next_if(|c| pred(*c)) {
        out.push(c);
    }

    out
}

fn describe(token: &Token) -> String {
    match token {
        Token::Key(_) => "literal".to_string(),
        Token::Member(name) => format!("`.{name}`"),
        Token::Number(n) => Literal::Number(*n).to_string(),
        Token::Word(word) => format!("`{word}`"),
        Token::Compare(op) => format!("`{}`", op.symbol()),
        Token::And => "`&&`".to_string(),
        Token::Or => "`||`".to_string(),
        Token::Bang => "`!`".to_string(),
        Token::Minus => "`-`".to_string(),
        Token::LParen => "`(`".to_string(),
        Token::RParen => "`)`".to_string(),
        Token::Comma => "`,`".to_string(),
    }
}

///
/// Parser
///
/// Recursive descent, lowest precedence first:
/// `||`, `&&`, equality, relational, unary, primary.
/// `depth` tracks open nesting levels against `MAX_NESTING`.
///

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    strict: bool,
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

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), QueryError> {
        if self.eat(expected) {
            return Ok(());
        }

        Err(match self.peek() {
            Some(found) => QueryError::syntax(format!(
                "expected {}, found {}",
                describe(expected),
                describe(found)
            )),
            None => QueryError::syntax(format!(
                "expected {}, found end of query",
                describe(expected)
            )),
        })
    }

    fn nest(&mut self) -> Result<(), QueryError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(QueryError::syntax(format!(
                "expression nests deeper than {MAX_NESTING} levels"
            )));
        }

        Ok(())
    }

    const fn unnest(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::logical(LogicalOp::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = Expr::logical(LogicalOp::And, left, right);
        }

        Ok(left)
    }

    // Chained comparisons fold left, so every extra link deepens the tree.
    fn parse_equality(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_relational()?;
        let mut links = 0;
        while let Some(Token::Compare(
            op @ (CompareOp::Eq | CompareOp::Ne | CompareOp::StrictEq | CompareOp::StrictNe),
        )) = self.peek()
        {
            let op = if self.strict { op.strict() } else { *op };
            self.pos += 1;
            self.nest()?;
            links += 1;
            let right = self.parse_relational()?;
            left = Expr::compare(op, left, right);
        }
        self.unnest(links);

        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_unary()?;
        let mut links = 0;
        while let Some(Token::Compare(
            op @ (CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte),
        )) = self.peek()
        {
            let op = *op;
            self.pos += 1;
            self.nest()?;
            links += 1;
            let right = self.parse_unary()?;
            left = Expr::compare(op, left, right);
        }
        self.unnest(links);

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&Token::Bang) {
            self.nest()?;
            let inner = self.parse_unary()?;
            self.unnest(1);

            return Ok(Expr::negate(inner));
        }
        if self.eat(&Token::Minus) {
            return match self.advance() {
                Some(Token::Number(n)) => Ok(Expr::number(-n)),
                _ => Err(QueryError::syntax("`-` must precede a number")),
            };
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, QueryError> {
        match self.advance() {
            Some(Token::Key(key)) => {
                let mut path = Vec::new();
                while let Some(Token::Member(name)) = self.peek() {
                    path.push(name.clone());
                    self.pos += 1;
                }

                Ok(Expr::member(Expr::Protected(key), path))
            }
            Some(Token::Number(n)) => Ok(Expr::number(n)),
            Some(Token::Word(word)) => {
                if self.eat(&Token::LParen) {
                    self.nest()?;
                    let args = self.parse_args()?;
                    self.unnest(1);

                    return Ok(Expr::call(word, args));
                }

                Ok(guard::raw(&word))
            }
            Some(Token::LParen) => {
                self.nest()?;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                self.unnest(1);

                Ok(inner)
            }
            Some(token) => Err(QueryError::syntax(format!(
                "unexpected token {}",
                describe(&token)
            ))),
            None => Err(QueryError::syntax("unexpected end of query")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, QueryError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_or()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }
}
