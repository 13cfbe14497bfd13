//! Recursive-descent parser for embedded script blocks.
//!
//! Precedence, loosest first: `.`, then `+ -`, then `* /`, then unary `-`.

use super::EvalError;
use super::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Echo(Vec<Expr>),
    Assign { name: String, value: Expr },
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Concat,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Var(String),
    Array(Vec<(Option<Expr>, Expr)>),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn parse(mut self) -> Result<Vec<Stmt>, EvalError> {
        let mut statements = Vec::new();

        loop {
            while self.eat(&TokenKind::Semicolon) {}
            if self.at(&TokenKind::Eof) {
                return Ok(statements);
            }

            statements.push(self.statement()?);

            // The last statement may omit its semicolon
            if !self.eat(&TokenKind::Semicolon) && !self.at(&TokenKind::Eof) {
                let token = self.peek();
                return Err(EvalError::new(
                    format!("expected ';', found {}", token.kind.describe()),
                    token.line,
                ));
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, EvalError> {
        if let TokenKind::Ident(name) = &self.peek().kind
            && name.eq_ignore_ascii_case("echo")
        {
            self.advance();
            let mut values = vec![self.expression()?];
            while self.eat(&TokenKind::Comma) {
                values.push(self.expression()?);
            }
            return Ok(Stmt::Echo(values));
        }

        if let TokenKind::Var(name) = &self.peek().kind
            && self.peek_next().kind == TokenKind::Assign
        {
            let name = name.clone();
            self.advance();
            self.advance();
            let value = self.expression()?;
            return Ok(Stmt::Assign { name, value });
        }

        Ok(Stmt::Expr(self.expression()?))
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.additive()?;
        while self.at(&TokenKind::Dot) {
            let line = self.advance().line;
            let rhs = self.additive()?;
            lhs = binary(BinaryOp::Concat, lhs, rhs, line);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let line = self.advance().line;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs, line);
        }
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            let line = self.advance().line;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, line);
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.at(&TokenKind::Minus) {
            let line = self.advance().line;
            let operand = self.unary()?;
            return Ok(Expr {
                kind: ExprKind::Neg(Box::new(operand)),
                line,
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let token = self.advance();
        let line = token.line;

        let kind = match token.kind {
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Int(i) => ExprKind::Int(i),
            TokenKind::Float(f) => ExprKind::Float(f),
            TokenKind::Var(name) => ExprKind::Var(name),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => ExprKind::Array(self.array_items()?),
            TokenKind::Ident(name) => match name.to_ascii_lowercase().as_str() {
                "true" => ExprKind::Bool(true),
                "false" => ExprKind::Bool(false),
                "null" => ExprKind::Null,
                _ => {
                    if !self.at(&TokenKind::LParen) {
                        return Err(EvalError::new(
                            format!("undefined constant '{}'", name),
                            line,
                        ));
                    }
                    self.advance();
                    ExprKind::Call {
                        name,
                        args: self.call_args()?,
                    }
                }
            },
            other => {
                return Err(EvalError::new(
                    format!("unexpected {}", other.describe()),
                    line,
                ));
            }
        };

        Ok(Expr { kind, line })
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(TokenKind::Comma)?;
        }
    }

    fn array_items(&mut self) -> Result<Vec<(Option<Expr>, Expr)>, EvalError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&TokenKind::RBracket) {
                return Ok(items);
            }
            let first = self.expression()?;
            let item = if self.eat(&TokenKind::Arrow) {
                (Some(first), self.expression()?)
            } else {
                (None, first)
            };
            items.push(item);

            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RBracket)?;
                return Ok(items);
            }
        }
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), EvalError> {
        if self.eat(&kind) {
            return Ok(());
        }
        let token = self.peek();
        Err(EvalError::new(
            format!(
                "expected {}, found {}",
                kind.describe(),
                token.kind.describe()
            ),
            token.line,
        ))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, line: usize) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        line,
    }
}
