use crate::script::ast::{BinaryOp, Expr, Lit, ScriptAst, Stmt, UnaryOp};
use crate::script::error::ScriptError;
use crate::script::lexer::{Span, Token, TokenKind, lex};

/// Deepest expression tree the parser builds. Counts parentheses, call arguments, unary
/// operators and every operator in a chain, so lowering and drop stay shallow too.
const MAX_NESTING: usize = 128;

/// Parse a whole script.
///
/// Top level is a sequence of statements and `setup { ... }` / `step { ... }` blocks. Loose
/// statements are appended to the step body in source order, interleaved with `step` blocks.
pub(crate) fn parse_script(src: &str) -> Result<ScriptAst, ScriptError> {
    let tokens = lex(src)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut ast = ScriptAst::default();
    let mut saw_setup = false;

    loop {
        p.skip_seps();
        if p.peek().kind == TokenKind::Eof {
            break;
        }
        if let Some(block) = p.block_header() {
            let offset = p.span().start;
            p.bump();
            p.expect(TokenKind::LBrace)?;
            let body = p.parse_block_body()?;
            match block {
                Block::Setup => {
                    if saw_setup {
                        return Err(ScriptError::new(offset, "duplicate setup block"));
                    }
                    saw_setup = true;
                    ast.setup = body;
                }
                Block::Step => ast.step.extend(body),
            }
            continue;
        }
        ast.step.push(p.parse_stmt()?);
        p.end_stmt()?;
    }

    Ok(ast)
}

#[derive(Clone, Copy)]
enum Block {
    Setup,
    Step,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ScriptError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(ScriptError::new(
                self.span().start,
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ScriptError::new(
                self.span().start,
                "expression nested too deeply",
            ));
        }
        Ok(())
    }

    fn skip_seps(&mut self) {
        while self.consume(TokenKind::Sep) {}
    }

    fn block_header(&self) -> Option<Block> {
        let TokenKind::Ident(name) = &self.peek().kind else {
            return None;
        };
        if *self.peek_at(1) != TokenKind::LBrace {
            return None;
        }
        match name.as_str() {
            "setup" => Some(Block::Setup),
            "step" => Some(Block::Step),
            _ => None,
        }
    }

    fn end_stmt(&mut self) -> Result<(), ScriptError> {
        match &self.peek().kind {
            TokenKind::Sep => {}
            TokenKind::Eof | TokenKind::RBrace => return Ok(()),
            other => {
                return Err(ScriptError::new(
                    self.span().start,
                    format!("expected end of statement, found {other:?}"),
                ));
            }
        }
        self.bump();
        Ok(())
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        let mut out = Vec::new();
        loop {
            self.skip_seps();
            if self.consume(TokenKind::RBrace) {
                return Ok(out);
            }
            if self.peek().kind == TokenKind::Eof {
                return Err(ScriptError::new(self.span().start, "unclosed block"));
            }
            if self.block_header().is_some() {
                return Err(ScriptError::new(
                    self.span().start,
                    "blocks cannot be nested",
                ));
            }
            out.push(self.parse_stmt()?);
            self.end_stmt()?;
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ScriptError> {
        let t = self.bump().clone();
        match t.kind {
            TokenKind::Let => {
                let name = self.parse_ident()?;
                self.expect(TokenKind::Assign)?;
                let value = self.parse_or()?;
                Ok(Stmt::Let {
                    name,
                    value,
                    offset: t.span.start,
                })
            }
            TokenKind::Ident(name) => {
                if self.consume(TokenKind::Assign) {
                    let value = self.parse_or()?;
                    return Ok(Stmt::Assign {
                        name,
                        value,
                        offset: t.span.start,
                    });
                }
                if self.consume(TokenKind::LParen) {
                    let args = self.parse_args()?;
                    return Ok(Stmt::Command {
                        name,
                        args,
                        offset: t.span.start,
                    });
                }
                Err(ScriptError::new(
                    self.span().start,
                    format!("expected '(' or '=' after '{name}'"),
                ))
            }
            other => Err(ScriptError::new(
                t.span.start,
                format!("expected statement, found {other:?}"),
            )),
        }
    }

    fn parse_ident(&mut self) -> Result<String, ScriptError> {
        let t = self.bump().clone();
        match t.kind {
            TokenKind::Ident(s) => Ok(s),
            other => Err(ScriptError::new(
                t.span.start,
                format!("expected identifier, found {other:?}"),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut e = self.parse_and()?;
        while self.consume(TokenKind::OrOr) {
            self.descend()?;
            let r = self.parse_and()?;
            e = binary(BinaryOp::Or, e, r);
        }
        self.depth = base;
        Ok(e)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut e = self.parse_equality()?;
        while self.consume(TokenKind::AndAnd) {
            self.descend()?;
            let r = self.parse_equality()?;
            e = binary(BinaryOp::And, e, r);
        }
        self.depth = base;
        Ok(e)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut e = self.parse_comparison()?;
        loop {
            let op = if self.consume(TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.consume(TokenKind::Ne) {
                BinaryOp::Ne
            } else {
                break;
            };
            self.descend()?;
            let r = self.parse_comparison()?;
            e = binary(op, e, r);
        }
        self.depth = base;
        Ok(e)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut e = self.parse_term()?;
        loop {
            let op = if self.consume(TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.consume(TokenKind::Le) {
                BinaryOp::Le
            } else if self.consume(TokenKind::Gt) {
                BinaryOp::Gt
            } else if self.consume(TokenKind::Ge) {
                BinaryOp::Ge
            } else {
                break;
            };
            self.descend()?;
            let r = self.parse_term()?;
            e = binary(op, e, r);
        }
        self.depth = base;
        Ok(e)
    }

    fn parse_term(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut e = self.parse_factor()?;
        loop {
            let op = if self.consume(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.consume(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            self.descend()?;
            let r = self.parse_factor()?;
            e = binary(op, e, r);
        }
        self.depth = base;
        Ok(e)
    }

    fn parse_factor(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut e = self.parse_unary()?;
        loop {
            let op = if self.consume(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.consume(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.consume(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            self.descend()?;
            let r = self.parse_unary()?;
            e = binary(op, e, r);
        }
        self.depth = base;
        Ok(e)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        let op = if self.consume(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.consume(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_primary();
        };
        self.descend()?;
        let e = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            expr: Box::new(e),
        })
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.consume(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.consume(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let t = self.bump().clone();
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Lit(Lit::F64(v))),
            TokenKind::True => Ok(Expr::Lit(Lit::Bool(true))),
            TokenKind::False => Ok(Expr::Lit(Lit::Bool(false))),
            TokenKind::Ident(name) => {
                if self.consume(TokenKind::LParen) {
                    self.descend()?;
                    let args = self.parse_args()?;
                    self.depth -= 1;
                    return Ok(Expr::Call {
                        func: name,
                        args,
                        offset: t.span.start,
                    });
                }
                Ok(Expr::Name {
                    name,
                    offset: t.span.start,
                })
            }
            TokenKind::LParen => {
                self.descend()?;
                let e = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                self.depth -= 1;
                Ok(e)
            }
            other => Err(ScriptError::new(
                t.span.start,
                format!("unexpected token {other:?}"),
            )),
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
