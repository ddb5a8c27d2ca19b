//! Recursive-descent parser: single-token lookahead, building `ast::Stmt`/
//! `ast::Expr` from the lexer's token stream (spec §4.2).
//!
//! Statement dispatch mirrors the teacher's `parser::parse_operation`
//! (`match pair.as_rule() { ... }`, one arm per construct), adapted from
//! pest `Pairs` dispatch to `Token` dispatch since Altar's lexer/parser
//! split is hand-rolled (see `lexer/mod.rs`'s module doc for why).

use crate::ast::{self, BinOp, CompareOp, Const, Expr, SetValue, Stmt, StmtKind, UnaryOp};
use crate::error::{AltarResult, Error, Position};
use crate::lexer::{Token, TokenKind};
use smallvec::smallvec;

pub fn parse(tokens: Vec<Token>, name: Option<&str>) -> AltarResult<ast::Template> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        template_name: name,
    };
    let body = parser.parse_body(&[])?;
    parser.expect_kind(TokenKind::Eof, "end of template")?;

    let mut extends = None;
    let mut blocks = Vec::new();
    collect(&body, &mut extends, &mut blocks);

    Ok(ast::Template {
        body,
        blocks,
        extends,
        name: name.map(|s| s.to_string()),
    })
}

fn collect(body: &[Stmt], extends: &mut Option<Expr>, blocks: &mut Vec<ast::Block>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Extends(e) => {
                if extends.is_none() {
                    *extends = Some(e.clone());
                }
            }
            StmtKind::Block(b) => {
                collect(&b.body, extends, blocks);
                blocks.push(b.clone());
            }
            StmtKind::If {
                branches,
                else_body,
            } => {
                for (_, body) in branches {
                    collect(body, extends, blocks);
                }
                if let Some(b) = else_body {
                    collect(b, extends, blocks);
                }
            }
            StmtKind::For {
                body, else_body, ..
            } => {
                collect(body, extends, blocks);
                if let Some(b) = else_body {
                    collect(b, extends, blocks);
                }
            }
            StmtKind::Macro { body, .. }
            | StmtKind::CallBlock { body, .. }
            | StmtKind::Filter { body, .. } => {
                collect(body, extends, blocks);
            }
            StmtKind::Set {
                value: SetValue::Block(b),
                ..
            } => collect(b, extends, blocks),
            _ => {}
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    template_name: Option<&'a str>,
}

const STMT_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "endif", "for", "endfor", "block", "endblock", "extends", "include",
    "import", "from", "set", "endset", "macro", "endmacro", "call", "endcall", "raw", "endraw",
    "filter", "endfilter", "do",
];

impl<'a> Parser<'a> {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn cur_pos(&self) -> Position {
        let t = self.cur();
        Position::new(self.template_name, t.line, t.column)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> AltarResult<Token> {
        if self.cur().kind == kind {
            Ok(self.bump())
        } else {
            Err(Error::parse(
                format!("expected {what}, found {:?} '{}'", self.cur().kind, self.cur().value),
                self.cur_pos(),
            ))
        }
    }

    fn expect_punct(&mut self, p: &str) -> AltarResult<()> {
        if self.cur().kind == TokenKind::Punct && self.cur().value == p {
            self.bump();
            Ok(())
        } else {
            Err(Error::parse(
                format!("expected '{p}', found '{}'", self.cur().value),
                self.cur_pos(),
            ))
        }
    }

    fn is_name(&self, value: &str) -> bool {
        self.cur().kind == TokenKind::Name && self.cur().value == value
    }

    fn eat_name(&mut self, value: &str) -> bool {
        if self.is_name(value) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// True if the current position is `BlockStart NAME` for one of
    /// `names`, without consuming anything.
    fn peek_block_stmt(&self, names: &[&str]) -> Option<String> {
        if self.cur().kind != TokenKind::BlockStart {
            return None;
        }
        let next = self.tokens.get(self.pos + 1)?;
        if next.kind == TokenKind::Name && names.contains(&next.value.as_str()) {
            Some(next.value.clone())
        } else {
            None
        }
    }

    fn expect_block_end(&mut self) -> AltarResult<()> {
        self.expect_kind(TokenKind::BlockEnd, "'%}'").map(|_| ())
    }

    fn expect_variable_end(&mut self) -> AltarResult<()> {
        self.expect_kind(TokenKind::VariableEnd, "'}}'").map(|_| ())
    }

    /// Parses statements until EOF or a `{% <name> %}` whose name is in
    /// `enders`; the ender's `BlockStart` is left unconsumed so the caller
    /// can see which ender matched.
    fn parse_body(&mut self, enders: &[&str]) -> AltarResult<Vec<Stmt>> {
        let mut out = Vec::new();
        loop {
            if self.at_eof() {
                return Ok(out);
            }
            if !enders.is_empty() && self.peek_block_stmt(enders).is_some() {
                return Ok(out);
            }
            match &self.cur().kind {
                TokenKind::Text => {
                    let t = self.bump();
                    if !t.value.is_empty() {
                        out.push(Stmt::new(StmtKind::Text(t.value), t.line, t.column));
                    }
                }
                TokenKind::RawContent => {
                    let t = self.bump();
                    out.push(Stmt::new(StmtKind::Raw(t.value), t.line, t.column));
                }
                TokenKind::VariableStart => {
                    let start = self.bump();
                    let expr = self.parse_expr()?;
                    self.expect_variable_end()?;
                    out.push(Stmt::new(StmtKind::Output(expr), start.line, start.column));
                }
                TokenKind::BlockStart => {
                    out.push(self.parse_block_stmt()?);
                }
                other => {
                    return Err(Error::parse(
                        format!("unexpected token {other:?}"),
                        self.cur_pos(),
                    ));
                }
            }
        }
    }

    fn parse_block_stmt(&mut self) -> AltarResult<Stmt> {
        let start = self.cur().clone();
        self.bump(); // BlockStart
        let name_tok = self.expect_kind(TokenKind::Name, "statement name")?;
        let name = name_tok.value;
        if !STMT_KEYWORDS.contains(&name.as_str()) {
            return Err(Error::parse(
                format!("unknown statement '{name}'"),
                self.cur_pos(),
            ));
        }
        let kind = match name.as_str() {
            "if" => self.parse_if()?,
            "for" => self.parse_for()?,
            "block" => self.parse_block()?,
            "extends" => {
                let expr = self.parse_expr()?;
                self.expect_block_end()?;
                StmtKind::Extends(expr)
            }
            "include" => self.parse_include()?,
            "import" => self.parse_import()?,
            "from" => self.parse_from_import()?,
            "set" => self.parse_set()?,
            "macro" => self.parse_macro()?,
            "call" => self.parse_call_block()?,
            "raw" => self.parse_raw()?,
            "filter" => self.parse_filter_block()?,
            "do" => {
                let expr = self.parse_expr()?;
                self.expect_block_end()?;
                StmtKind::Do(expr)
            }
            other => {
                return Err(Error::parse(
                    format!("'{other}' may not start a statement here"),
                    self.cur_pos(),
                ));
            }
        };
        Ok(Stmt::new(kind, start.line, start.column))
    }

    fn parse_if(&mut self) -> AltarResult<StmtKind> {
        let mut branches = smallvec![];
        let cond = self.parse_expr()?;
        self.expect_block_end()?;
        let body = self.parse_body(&["elif", "else", "endif"])?;
        branches.push((cond, body));

        loop {
            let which = self.peek_block_stmt(&["elif", "else", "endif"]).unwrap();
            self.bump(); // BlockStart
            self.bump(); // name
            match which.as_str() {
                "elif" => {
                    let cond = self.parse_expr()?;
                    self.expect_block_end()?;
                    let body = self.parse_body(&["elif", "else", "endif"])?;
                    branches.push((cond, body));
                }
                "else" => {
                    self.expect_block_end()?;
                    let else_body = self.parse_body(&["endif"])?;
                    self.bump(); // BlockStart
                    self.bump(); // endif
                    self.expect_block_end()?;
                    return Ok(StmtKind::If {
                        branches,
                        else_body: Some(else_body),
                    });
                }
                "endif" => {
                    self.expect_block_end()?;
                    return Ok(StmtKind::If {
                        branches,
                        else_body: None,
                    });
                }
                _ => unreachable!(),
            }
        }
    }

    fn parse_for(&mut self) -> AltarResult<StmtKind> {
        let mut targets = vec![self.expect_kind(TokenKind::Name, "loop variable")?.value];
        while self.cur().kind == TokenKind::Punct && self.cur().value == "," {
            self.bump();
            targets.push(self.expect_kind(TokenKind::Name, "loop variable")?.value);
        }
        if !self.eat_name("in") {
            return Err(Error::parse("expected 'in' in for loop", self.cur_pos()));
        }
        let iter = self.parse_expr()?;
        let filter = if self.eat_name("if") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_block_end()?;
        let body = self.parse_body(&["else", "endfor"])?;
        let which = self.peek_block_stmt(&["else", "endfor"]).unwrap();
        self.bump();
        self.bump();
        let else_body = if which == "else" {
            self.expect_block_end()?;
            let b = self.parse_body(&["endfor"])?;
            self.bump();
            self.bump();
            Some(b)
        } else {
            None
        };
        self.expect_block_end()?;
        Ok(StmtKind::For {
            targets,
            iter,
            body,
            else_body,
            filter,
        })
    }

    fn parse_block(&mut self) -> AltarResult<StmtKind> {
        let name = self.expect_kind(TokenKind::Name, "block name")?.value;
        let scoped = self.eat_name("scoped");
        self.expect_block_end()?;
        let body = self.parse_body(&["endblock"])?;
        self.bump();
        self.bump();
        if self.cur().kind == TokenKind::Name {
            self.bump(); // optional repeated block name after endblock
        }
        self.expect_block_end()?;
        Ok(StmtKind::Block(ast::Block { name, body, scoped }))
    }

    fn parse_raw(&mut self) -> AltarResult<StmtKind> {
        self.expect_block_end()?;
        let text = if self.cur().kind == TokenKind::RawContent {
            self.bump().value
        } else {
            String::new()
        };
        self.bump(); // BlockStart
        self.bump(); // endraw
        self.expect_block_end()?;
        Ok(StmtKind::Raw(text))
    }

    fn parse_include(&mut self) -> AltarResult<StmtKind> {
        let template = self.parse_expr()?;
        let mut ignore_missing = false;
        let mut with_context = true;
        loop {
            if self.eat_name("ignore") {
                if !self.eat_name("missing") {
                    return Err(Error::parse("expected 'missing' after 'ignore'", self.cur_pos()));
                }
                ignore_missing = true;
            } else if self.eat_name("with") {
                self.eat_name("context");
                with_context = true;
            } else if self.eat_name("without") {
                self.eat_name("context");
                with_context = false;
            } else {
                break;
            }
        }
        self.expect_block_end()?;
        Ok(StmtKind::Include {
            template,
            with_context,
            ignore_missing,
        })
    }

    fn parse_import(&mut self) -> AltarResult<StmtKind> {
        let template = self.parse_expr()?;
        if !self.eat_name("as") {
            return Err(Error::parse("expected 'as' in import", self.cur_pos()));
        }
        let alias = self.expect_kind(TokenKind::Name, "import alias")?.value;
        let with_context = self.parse_context_suffix()?;
        self.expect_block_end()?;
        Ok(StmtKind::Import {
            template,
            alias,
            with_context,
        })
    }

    fn parse_from_import(&mut self) -> AltarResult<StmtKind> {
        let template = self.parse_expr()?;
        if !self.eat_name("import") {
            return Err(Error::parse("expected 'import' in from-import", self.cur_pos()));
        }
        let mut names = Vec::new();
        loop {
            let n = self.expect_kind(TokenKind::Name, "imported name")?.value;
            let alias = if self.eat_name("as") {
                Some(self.expect_kind(TokenKind::Name, "import alias")?.value)
            } else {
                None
            };
            names.push((n, alias));
            if self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                self.bump();
                continue;
            }
            break;
        }
        let with_context = self.parse_context_suffix()?;
        self.expect_block_end()?;
        Ok(StmtKind::FromImport {
            template,
            names,
            with_context,
        })
    }

    fn parse_context_suffix(&mut self) -> AltarResult<bool> {
        if self.eat_name("with") {
            self.eat_name("context");
            Ok(true)
        } else if self.eat_name("without") {
            self.eat_name("context");
            Ok(false)
        } else {
            Ok(false)
        }
    }

    fn parse_set(&mut self) -> AltarResult<StmtKind> {
        let target = self.expect_kind(TokenKind::Name, "set target")?.value;
        if self.cur().kind == TokenKind::Operator && self.cur().value == "=" {
            self.bump();
            let value = self.parse_expr()?;
            self.expect_block_end()?;
            Ok(StmtKind::Set {
                target,
                value: SetValue::Expr(value),
            })
        } else {
            self.expect_block_end()?;
            let body = self.parse_body(&["endset"])?;
            self.bump();
            self.bump();
            self.expect_block_end()?;
            Ok(StmtKind::Set {
                target,
                value: SetValue::Block(body),
            })
        }
    }

    fn parse_params(&mut self) -> AltarResult<Vec<(String, Option<Expr>)>> {
        let mut params = Vec::new();
        self.expect_punct("(")?;
        while !(self.cur().kind == TokenKind::Punct && self.cur().value == ")") {
            let name = self.expect_kind(TokenKind::Name, "parameter name")?.value;
            let default = if self.cur().kind == TokenKind::Operator && self.cur().value == "=" {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push((name, default));
            if self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                self.bump();
            } else {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    fn parse_macro(&mut self) -> AltarResult<StmtKind> {
        let name = self.expect_kind(TokenKind::Name, "macro name")?.value;
        let params = self.parse_params()?;
        self.expect_block_end()?;
        let body = self.parse_body(&["endmacro"])?;
        self.bump();
        self.bump();
        self.expect_block_end()?;
        Ok(StmtKind::Macro { name, params, body })
    }

    fn parse_call_block(&mut self) -> AltarResult<StmtKind> {
        let call_params = if self.cur().kind == TokenKind::Punct && self.cur().value == "(" {
            self.parse_params()?.into_iter().map(|(n, _)| n).collect()
        } else {
            Vec::new()
        };
        let call = self.parse_expr()?;
        self.expect_block_end()?;
        let body = self.parse_body(&["endcall"])?;
        self.bump();
        self.bump();
        self.expect_block_end()?;
        Ok(StmtKind::CallBlock {
            call,
            call_params,
            body,
        })
    }

    fn parse_filter_block(&mut self) -> AltarResult<StmtKind> {
        let name = self.expect_kind(TokenKind::Name, "filter name")?.value;
        let args = if self.cur().kind == TokenKind::Punct && self.cur().value == "(" {
            self.parse_call_args()?.0
        } else {
            Vec::new()
        };
        self.expect_block_end()?;
        let body = self.parse_body(&["endfilter"])?;
        self.bump();
        self.bump();
        self.expect_block_end()?;
        Ok(StmtKind::Filter { name, args, body })
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> AltarResult<Expr> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> AltarResult<Expr> {
        let value = self.parse_or()?;
        if self.eat_name("if") {
            let cond = self.parse_or()?;
            let else_ = if self.eat_name("else") {
                self.parse_conditional()?
            } else {
                Expr::Const(Const::None)
            };
            Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(value),
                else_: Box::new(else_),
            })
        } else {
            Ok(value)
        }
    }

    fn parse_or(&mut self) -> AltarResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_name("or") {
            let right = self.parse_and()?;
            left = Expr::BinOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> AltarResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_name("and") {
            let right = self.parse_not()?;
            left = Expr::BinOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> AltarResult<Expr> {
        if self.eat_name("not") {
            let operand = self.parse_not()?;
            Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            })
        } else {
            self.parse_compare()
        }
    }

    fn parse_compare(&mut self) -> AltarResult<Expr> {
        let left = self.parse_additive()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = if self.cur().kind == TokenKind::Operator {
                match self.cur().value.as_str() {
                    "==" => Some(CompareOp::Eq),
                    "!=" => Some(CompareOp::Ne),
                    "<" => Some(CompareOp::Lt),
                    "<=" => Some(CompareOp::Le),
                    ">" => Some(CompareOp::Gt),
                    ">=" => Some(CompareOp::Ge),
                    _ => None,
                }
            } else {
                None
            };
            if let Some(op) = op {
                self.bump();
                ops.push(op);
                comparators.push(self.parse_additive()?);
                continue;
            }
            if self.is_name("in") {
                self.bump();
                ops.push(CompareOp::In);
                comparators.push(self.parse_additive()?);
                continue;
            }
            if self.is_name("not") && self.peek_is_name_at(1, "in") {
                self.bump();
                self.bump();
                ops.push(CompareOp::NotIn);
                comparators.push(self.parse_additive()?);
                continue;
            }
            break;
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
                comparators,
            })
        }
    }

    fn peek_is_name_at(&self, offset: usize, value: &str) -> bool {
        self.tokens
            .get(self.pos + offset)
            .is_some_and(|t| t.kind == TokenKind::Name && t.value == value)
    }

    fn parse_additive(&mut self) -> AltarResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.cur().kind == TokenKind::Operator && self.cur().value == "+" {
                Some(BinOp::Add)
            } else if self.cur().kind == TokenKind::Operator && self.cur().value == "-" {
                Some(BinOp::Sub)
            } else {
                None
            };
            match op {
                Some(op) => {
                    self.bump();
                    let right = self.parse_multiplicative()?;
                    left = Expr::BinOp {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> AltarResult<Expr> {
        let mut left = self.parse_concat()?;
        loop {
            let op = if self.cur().kind == TokenKind::Operator {
                match self.cur().value.as_str() {
                    "*" => Some(BinOp::Mul),
                    "/" => Some(BinOp::Div),
                    "//" => Some(BinOp::FloorDiv),
                    "%" => Some(BinOp::Mod),
                    _ => None,
                }
            } else {
                None
            };
            match op {
                Some(op) => {
                    self.bump();
                    let right = self.parse_concat()?;
                    left = Expr::BinOp {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> AltarResult<Expr> {
        let first = self.parse_unary_power()?;
        if self.cur().kind == TokenKind::Operator && self.cur().value == "~" {
            let mut parts = vec![first];
            while self.cur().kind == TokenKind::Operator && self.cur().value == "~" {
                self.bump();
                parts.push(self.parse_unary_power()?);
            }
            Ok(Expr::Concat(parts))
        } else {
            Ok(first)
        }
    }

    fn parse_unary_power(&mut self) -> AltarResult<Expr> {
        if self.cur().kind == TokenKind::Operator && self.cur().value == "-" {
            self.bump();
            let operand = self.parse_unary_power()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.cur().kind == TokenKind::Operator && self.cur().value == "+" {
            self.bump();
            let operand = self.parse_unary_power()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Pos,
                operand: Box::new(operand),
            });
        }
        let base = self.parse_filtered_postfix()?;
        if self.cur().kind == TokenKind::Operator && self.cur().value == "**" {
            self.bump();
            let exp = self.parse_unary_power()?;
            Ok(Expr::BinOp {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exp),
            })
        } else {
            Ok(base)
        }
    }

    /// postfix chain, then `|filter` chain, then an optional single
    /// `is [not] test`, applied in that order (tightest to loosest).
    fn parse_filtered_postfix(&mut self) -> AltarResult<Expr> {
        let mut value = self.parse_postfix()?;
        while self.cur().kind == TokenKind::Operator && self.cur().value == "|" {
            self.bump();
            let name = self.expect_kind(TokenKind::Name, "filter name")?.value;
            let (args, kwargs) = if self.cur().kind == TokenKind::Punct && self.cur().value == "(" {
                self.parse_call_args()?
            } else {
                (Vec::new(), Vec::new())
            };
            value = Expr::Filter {
                value: Box::new(value),
                name,
                args,
                kwargs,
            };
        }
        if self.is_name("is") {
            self.bump();
            let negated = self.eat_name("not");
            let name = self.expect_kind(TokenKind::Name, "test name")?.value;
            let args = if self.cur().kind == TokenKind::Punct && self.cur().value == "(" {
                self.parse_call_args()?.0
            } else {
                Vec::new()
            };
            value = Expr::Test {
                value: Box::new(value),
                name,
                args,
                negated,
            };
        }
        Ok(value)
    }

    fn parse_postfix(&mut self) -> AltarResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.cur().kind == TokenKind::Punct && self.cur().value == "." {
                self.bump();
                let attr = self.expect_kind(TokenKind::Name, "attribute name")?.value;
                expr = Expr::Getattr(Box::new(expr), attr);
            } else if self.cur().kind == TokenKind::Punct && self.cur().value == "[" {
                self.bump();
                expr = self.parse_subscript(expr)?;
            } else if self.cur().kind == TokenKind::Punct && self.cur().value == "(" {
                let (args, kwargs) = self.parse_call_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args: args.into_iter().collect(),
                    kwargs,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_subscript(&mut self, obj: Expr) -> AltarResult<Expr> {
        // `[` already consumed.
        if self.cur().kind == TokenKind::Punct && self.cur().value == ":" {
            return self.parse_slice_tail(obj, None);
        }
        let first = self.parse_expr()?;
        if self.cur().kind == TokenKind::Punct && self.cur().value == ":" {
            return self.parse_slice_tail(obj, Some(first));
        }
        self.expect_punct("]")?;
        Ok(Expr::Getitem(Box::new(obj), Box::new(first)))
    }

    fn parse_slice_tail(&mut self, obj: Expr, start: Option<Expr>) -> AltarResult<Expr> {
        self.expect_punct(":")?;
        let stop = if self.cur().kind == TokenKind::Punct && (self.cur().value == ":" || self.cur().value == "]") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let step = if self.cur().kind == TokenKind::Punct && self.cur().value == ":" {
            self.bump();
            if self.cur().kind == TokenKind::Punct && self.cur().value == "]" {
                None
            } else {
                Some(self.parse_expr()?)
            }
        } else {
            None
        };
        self.expect_punct("]")?;
        Ok(Expr::Slice {
            obj: Box::new(obj),
            start: start.map(Box::new),
            stop: stop.map(Box::new),
            step: step.map(Box::new),
        })
    }

    fn parse_call_args(&mut self) -> AltarResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !(self.cur().kind == TokenKind::Punct && self.cur().value == ")") {
            if self.cur().kind == TokenKind::Name
                && self
                    .tokens
                    .get(self.pos + 1)
                    .is_some_and(|t| t.kind == TokenKind::Operator && t.value == "=")
            {
                let name = self.bump().value;
                self.bump(); // '='
                let value = self.parse_expr()?;
                kwargs.push((name, value));
            } else {
                args.push(self.parse_expr()?);
            }
            if self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                self.bump();
            } else {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok((args, kwargs))
    }

    fn parse_atom(&mut self) -> AltarResult<Expr> {
        let tok = self.cur().clone();
        match tok.kind {
            TokenKind::Number => {
                self.bump();
                if tok.value.contains('.') || tok.value.contains(['e', 'E']) {
                    let f: f64 = tok.value.parse().map_err(|_| {
                        Error::parse(format!("invalid float literal '{}'", tok.value), self.cur_pos())
                    })?;
                    Ok(Expr::Const(Const::Float(f)))
                } else {
                    let i: i64 = tok.value.parse().map_err(|_| {
                        Error::parse(format!("invalid integer literal '{}'", tok.value), self.cur_pos())
                    })?;
                    Ok(Expr::Const(Const::Int(i)))
                }
            }
            TokenKind::String => {
                self.bump();
                Ok(Expr::Const(Const::Str(tok.value)))
            }
            TokenKind::Name => match tok.value.as_str() {
                "true" | "True" => {
                    self.bump();
                    Ok(Expr::Const(Const::Bool(true)))
                }
                "false" | "False" => {
                    self.bump();
                    Ok(Expr::Const(Const::Bool(false)))
                }
                "none" | "None" | "null" => {
                    self.bump();
                    Ok(Expr::Const(Const::None))
                }
                "super" => {
                    self.bump();
                    self.expect_punct("(")?;
                    self.expect_punct(")")?;
                    Ok(Expr::Super)
                }
                "caller" => {
                    self.bump();
                    let (args, _) = self.parse_call_args()?;
                    Ok(Expr::Caller(args))
                }
                "self" => {
                    self.bump();
                    self.expect_punct(".")?;
                    let block = self.expect_kind(TokenKind::Name, "block name")?.value;
                    self.expect_punct("(")?;
                    self.expect_punct(")")?;
                    Ok(Expr::SelfBlock(block))
                }
                _ => {
                    self.bump();
                    Ok(Expr::Name(tok.value))
                }
            },
            TokenKind::Punct if tok.value == "(" => {
                self.bump();
                let first = self.parse_expr()?;
                if self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                    let mut items = vec![first];
                    while self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                        self.bump();
                        if self.cur().kind == TokenKind::Punct && self.cur().value == ")" {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                    self.expect_punct(")")?;
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect_punct(")")?;
                    Ok(first)
                }
            }
            TokenKind::Punct if tok.value == "[" => {
                self.bump();
                let mut items = Vec::new();
                while !(self.cur().kind == TokenKind::Punct && self.cur().value == "]") {
                    items.push(self.parse_expr()?);
                    if self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::List(items))
            }
            TokenKind::Punct if tok.value == "{" => {
                self.bump();
                let mut entries = Vec::new();
                while !(self.cur().kind == TokenKind::Punct && self.cur().value == "}") {
                    let key = self.parse_expr()?;
                    self.expect_punct(":")?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if self.cur().kind == TokenKind::Punct && self.cur().value == "," {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect_punct("}")?;
                Ok(Expr::Dict(entries))
            }
            _ => Err(Error::parse(
                format!("unexpected token '{}' in expression", tok.value),
                self.cur_pos(),
            )),
        }
    }
}
