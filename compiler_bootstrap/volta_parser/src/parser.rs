//! Recursive-descent parser implementing the grammar:
//!
//! ```text
//! expression   -> logical_or (("=" | "+=" | "-=" | "*=" | "/=" | "%=") expression)?
//! logical_or   -> logical_and ("or" logical_and)*
//! logical_and  -> comparison ("and" comparison)*
//! comparison   -> addition (("==" | "!=" | "<" | "<=" | ">" | ">=") addition)*
//! addition     -> term (("+" | "-") term)*
//! term         -> unary (("*" | "/" | "%") unary)*
//! unary        -> ("-" | "+" | "not" | "addrof") unary | postfix
//! postfix      -> primary (".field" | ".method(args)" | "::method(args)" | "[index]" | "++" | "--")*
//! primary      -> literal | identifier | call | grouping | array_literal | struct_literal
//! ```
//!
//! Errors abandon the enclosing top-level declaration: a statement or
//! expression that fails to parse propagates up to [`Parser::parse_item`],
//! which records one diagnostic and resynchronizes at the next token that
//! can start a declaration.

use crate::ast::*;
use volta_common::{Diagnostics, Span};
use volta_lexer::{Token, TokenType};

/// `Err(())` marks a parse failure already recorded in `self.diagnostics`;
/// the caller either propagates it or backtracks.
type PResult<T> = Result<T, ()>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Diagnostics,
    next_id: NodeId,
}

/// Parse a complete token stream into a [`Program`], collecting diagnostics
/// for every malformed declaration along the way.
pub fn parse(tokens: Vec<Token>) -> (Program, Diagnostics) {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    (program, parser.diagnostics)
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, diagnostics: Diagnostics::new(), next_id: 0 }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn make_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr { kind: Box::new(kind), span, id: self.fresh_id() }
    }

    fn peek(&self) -> &TokenType {
        &self.tokens[self.pos].value
    }

    fn peek_at(&self, offset: usize) -> &TokenType {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.value)
            .unwrap_or(&TokenType::EndOfFile)
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), TokenType::EndOfFile)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tt: &TokenType) -> bool {
        self.peek() == tt
    }

    fn match_token(&mut self, tt: &TokenType) -> bool {
        if self.check(tt) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.error_at(message, self.current_span());
    }

    fn expect(&mut self, tt: &TokenType, message: &str) -> PResult<Token> {
        if self.check(tt) {
            Ok(self.advance())
        } else {
            self.error(message.to_string());
            Err(())
        }
    }

    fn expect_identifier(&mut self, context: &str) -> PResult<(String, Span)> {
        match self.peek().clone() {
            TokenType::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                Ok((name, span))
            }
            _ => {
                self.error(format!("expected an identifier {}", context));
                Err(())
            }
        }
    }

    fn expect_integer(&mut self, context: &str) -> PResult<i64> {
        match self.peek().clone() {
            TokenType::Integer(n) => {
                self.advance();
                Ok(n)
            }
            _ => {
                self.error(format!("expected an integer literal {}", context));
                Err(())
            }
        }
    }

    // ---- top level ----

    pub fn parse_program(&mut self) -> Program {
        let start_span = self.current_span();
        let mut items = Vec::new();
        while !self.is_at_end() {
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(()) => self.synchronize(),
            }
        }
        let span = start_span.combine(self.previous_span());
        Program { items, span }
    }

    fn starts_item(&self) -> bool {
        matches!(
            self.peek(),
            TokenType::KwFn | TokenType::KwStruct | TokenType::KwExtern | TokenType::KwImport | TokenType::KwPub
        )
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() && !self.starts_item() {
            self.advance();
        }
    }

    fn parse_item(&mut self) -> PResult<Item> {
        let is_pub = self.match_token(&TokenType::KwPub);
        match self.peek().clone() {
            TokenType::KwFn => Ok(Item::Function(self.parse_function(is_pub)?)),
            TokenType::KwStruct => Ok(Item::Struct(self.parse_struct(is_pub)?)),
            TokenType::KwExtern => {
                if is_pub {
                    self.error("'pub' is not valid before 'extern'");
                }
                Ok(Item::Extern(self.parse_extern_block()?))
            }
            TokenType::KwImport => {
                if is_pub {
                    self.error("'pub' is not valid before 'import'");
                }
                Ok(Item::Import(self.parse_import()?))
            }
            _ => {
                self.error("expected a top-level declaration ('fn', 'struct', 'extern', or 'import')");
                Err(())
            }
        }
    }

    fn parse_function(&mut self, is_pub: bool) -> PResult<Function> {
        let start = self.current_span();
        self.expect(&TokenType::KwFn, "expected 'fn'")?;
        let (name, _) = self.expect_identifier("after 'fn'")?;
        self.expect(&TokenType::LParen, "expected '(' after function name")?;
        let params = self.parse_param_list()?;
        self.expect(&TokenType::RParen, "expected ')' after parameter list")?;
        let return_type = if self.match_token(&TokenType::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = start.combine(body.span);
        Ok(Function { name, params, return_type, body, is_pub, span, id: self.fresh_id() })
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(&TokenType::RParen) {
            return Ok(params);
        }
        loop {
            params.push(self.parse_param()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
            if self.check(&TokenType::RParen) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let start = self.current_span();

        if self.check(&TokenType::KwMut) && matches!(self.peek_at(1), TokenType::KwSelf) {
            self.advance();
            self.advance();
            return Ok(Param::SelfParam { is_mut: true, span: start.combine(self.previous_span()) });
        }
        if self.check(&TokenType::KwSelf) {
            self.advance();
            return Ok(Param::SelfParam { is_mut: false, span: start });
        }

        let mut is_ref = false;
        let mut is_mut_ref = false;
        if self.match_token(&TokenType::KwRef) {
            is_ref = true;
            if self.match_token(&TokenType::KwMut) {
                is_mut_ref = true;
            }
        } else if self.check(&TokenType::KwMut) && matches!(self.peek_at(1), TokenType::KwRef) {
            self.advance();
            self.advance();
            is_ref = true;
            is_mut_ref = true;
        }

        let (name, _) = self.expect_identifier("in parameter list")?;
        self.expect(&TokenType::Colon, "expected ':' after parameter name")?;
        let ty = self.parse_type()?;
        let span = start.combine(self.previous_span());
        Ok(Param::Named { name, ty, is_ref, is_mut_ref, span })
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        if self.match_token(&TokenType::LBracket) {
            let elem = self.parse_type()?;
            self.expect(&TokenType::Semicolon, "expected ';' in array type")?;
            let size = self.expect_integer("as the array size")?;
            self.expect(&TokenType::RBracket, "expected ']' after array type")?;
            Ok(TypeExpr::Array(Box::new(elem), size as u32))
        } else {
            let (name, _) = self.expect_identifier("as a type name")?;
            Ok(TypeExpr::Named(name))
        }
    }

    fn parse_struct(&mut self, is_pub: bool) -> PResult<StructDecl> {
        let start = self.current_span();
        self.expect(&TokenType::KwStruct, "expected 'struct'")?;
        let (name, _) = self.expect_identifier("after 'struct'")?;
        self.expect(&TokenType::LBrace, "expected '{' after struct name")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check(&TokenType::RBrace) && !self.is_at_end() {
            let field_span = self.current_span();
            let member_pub = self.match_token(&TokenType::KwPub);
            if self.check(&TokenType::KwFn) {
                methods.push(self.parse_function(member_pub)?);
            } else {
                let (fname, _) = self.expect_identifier("as a field name")?;
                self.expect(&TokenType::Colon, "expected ':' after field name")?;
                let ty = self.parse_type()?;
                self.match_token(&TokenType::Comma);
                let span = field_span.combine(self.previous_span());
                fields.push(FieldDecl { name: fname, ty, is_pub: member_pub, span });
            }
        }
        self.expect(&TokenType::RBrace, "expected '}' to close struct body")?;
        let span = start.combine(self.previous_span());
        Ok(StructDecl { name, is_pub, fields, methods, span, id: self.fresh_id() })
    }

    fn parse_extern_block(&mut self) -> PResult<ExternBlock> {
        let start = self.current_span();
        self.expect(&TokenType::KwExtern, "expected 'extern'")?;
        let abi = match self.peek().clone() {
            TokenType::Str(s) | TokenType::RawStr(s) => {
                self.advance();
                s
            }
            _ => {
                self.error("expected an ABI string after 'extern'");
                return Err(());
            }
        };
        self.expect(&TokenType::LBrace, "expected '{' to open extern block")?;
        let mut functions = Vec::new();
        while !self.check(&TokenType::RBrace) && !self.is_at_end() {
            functions.push(self.parse_extern_fn_sig()?);
        }
        self.expect(&TokenType::RBrace, "expected '}' to close extern block")?;
        let span = start.combine(self.previous_span());
        Ok(ExternBlock { abi, functions, span })
    }

    fn parse_extern_fn_sig(&mut self) -> PResult<ExternFnSig> {
        let start = self.current_span();
        self.expect(&TokenType::KwFn, "expected 'fn' in extern block")?;
        let (name, _) = self.expect_identifier("after 'fn'")?;
        self.expect(&TokenType::LParen, "expected '(' after function name")?;
        let params = self.parse_param_list()?;
        self.expect(&TokenType::RParen, "expected ')' after parameter list")?;
        let return_type = if self.match_token(&TokenType::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenType::Semicolon, "expected ';' after extern function signature")?;
        let span = start.combine(self.previous_span());
        Ok(ExternFnSig { name, params, return_type, span })
    }

    fn parse_import(&mut self) -> PResult<ImportDecl> {
        let start = self.current_span();
        self.expect(&TokenType::KwImport, "expected 'import'")?;
        let (first, _) = self.expect_identifier("as a module path segment")?;
        let mut path = vec![first];
        while self.match_token(&TokenType::Dot) {
            let (seg, _) = self.expect_identifier("as a module path segment")?;
            path.push(seg);
        }
        self.expect(&TokenType::LBrace, "expected '{' after module path")?;
        let mut symbols = Vec::new();
        if !self.check(&TokenType::RBrace) {
            loop {
                let (sym, _) = self.expect_identifier("as an imported symbol name")?;
                symbols.push(sym);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                if self.check(&TokenType::RBrace) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RBrace, "expected '}' after imported symbols")?;
        self.expect(&TokenType::Semicolon, "expected ';' after import statement")?;
        let span = start.combine(self.previous_span());
        Ok(ImportDecl { path, symbols, span })
    }

    // ---- statements ----

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.current_span();
        self.expect(&TokenType::LBrace, "expected '{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenType::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenType::RBrace, "expected '}' to close block")?;
        let span = start.combine(self.previous_span());
        Ok(Block { stmts, span })
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        if self.check(&TokenType::KwIf) {
            return self.parse_if_stmt();
        }

        let start = self.current_span();
        let kind = match self.peek().clone() {
            TokenType::KwLet => self.parse_let_stmt()?,
            TokenType::KwReturn => self.parse_return_stmt()?,
            TokenType::KwWhile => self.parse_while_stmt()?,
            TokenType::KwFor => self.parse_for_stmt()?,
            TokenType::KwBreak => {
                self.advance();
                self.expect(&TokenType::Semicolon, "expected ';' after 'break'")?;
                StmtKind::Break
            }
            TokenType::KwContinue => {
                self.advance();
                self.expect(&TokenType::Semicolon, "expected ';' after 'continue'")?;
                StmtKind::Continue
            }
            TokenType::LBrace => StmtKind::Block(self.parse_block()?),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&TokenType::Semicolon, "expected ';' after expression")?;
                StmtKind::Expr(expr)
            }
        };
        let span = start.combine(self.previous_span());
        Ok(Stmt { kind, span, id: self.fresh_id() })
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenType::KwIf, "expected 'if'")?;
        let cond = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let else_branch = if self.match_token(&TokenType::KwElse) {
            if self.check(&TokenType::KwIf) {
                Some(ElseBranch::If(Box::new(self.parse_if_stmt()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let span = start.combine(self.previous_span());
        Ok(Stmt { kind: StmtKind::If { cond, then_block, else_branch }, span, id: self.fresh_id() })
    }

    fn parse_let_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenType::KwLet, "expected 'let'")?;
        let is_mut = self.match_token(&TokenType::KwMut);
        let (name, _) = self.expect_identifier("after 'let'")?;
        let ty = if self.match_token(&TokenType::Colon) { Some(self.parse_type()?) } else { None };
        let init = if self.match_token(&TokenType::Eq) { Some(self.parse_expression()?) } else { None };
        self.expect(&TokenType::Semicolon, "expected ';' after let statement")?;
        Ok(StmtKind::Let { name, is_mut, ty, init })
    }

    fn parse_return_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenType::KwReturn, "expected 'return'")?;
        let value = if self.check(&TokenType::Semicolon) { None } else { Some(self.parse_expression()?) };
        self.expect(&TokenType::Semicolon, "expected ';' after return statement")?;
        Ok(StmtKind::Return(value))
    }

    fn parse_while_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenType::KwWhile, "expected 'while'")?;
        let cond = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(StmtKind::While { cond, body })
    }

    fn parse_for_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenType::KwFor, "expected 'for'")?;
        let (var, _) = self.expect_identifier("after 'for'")?;
        self.expect(&TokenType::KwIn, "expected 'in' in for statement")?;
        let start_expr = self.parse_addition()?;
        let inclusive = if self.match_token(&TokenType::DotDotEq) {
            true
        } else {
            self.expect(&TokenType::DotDot, "expected '..' or '..=' in for-loop range")?;
            false
        };
        let end_expr = self.parse_addition()?;
        let body = self.parse_block()?;
        Ok(StmtKind::For { var, start: start_expr, end: end_expr, inclusive, body })
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> PResult<Expr> {
        let expr = self.parse_logical_or()?;
        if let Some(op) = self.match_compound_assign_op() {
            let value = self.parse_expression()?;
            let span = expr.span.combine(value.span);
            return Ok(self.make_expr(ExprKind::CompoundAssign { op, target: Box::new(expr), value: Box::new(value) }, span));
        }
        if self.match_token(&TokenType::Eq) {
            let value = self.parse_expression()?;
            let span = expr.span.combine(value.span);
            return Ok(self.make_expr(ExprKind::Assign { target: Box::new(expr), value: Box::new(value) }, span));
        }
        Ok(expr)
    }

    fn match_compound_assign_op(&mut self) -> Option<BinaryOp> {
        let op = match self.peek() {
            TokenType::PlusEq => BinaryOp::Add,
            TokenType::MinusEq => BinaryOp::Sub,
            TokenType::StarEq => BinaryOp::Mul,
            TokenType::SlashEq => BinaryOp::Div,
            TokenType::PercentEq => BinaryOp::Mod,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.check(&TokenType::KwOr) {
            self.advance();
            let right = self.parse_logical_and()?;
            let span = left.span.combine(right.span);
            left = self.make_expr(ExprKind::Binary { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right) }, span);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check(&TokenType::KwAnd) {
            self.advance();
            let right = self.parse_comparison()?;
            let span = left.span.combine(right.span);
            left = self.make_expr(ExprKind::Binary { op: BinaryOp::And, left: Box::new(left), right: Box::new(right) }, span);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_addition()?;
        loop {
            let op = match self.peek() {
                TokenType::EqEq => BinaryOp::Eq,
                TokenType::NotEq => BinaryOp::Ne,
                TokenType::Lt => BinaryOp::Lt,
                TokenType::LtEq => BinaryOp::Le,
                TokenType::Gt => BinaryOp::Gt,
                TokenType::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_addition()?;
            let span = left.span.combine(right.span);
            left = self.make_expr(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Ok(left)
    }

    fn parse_addition(&mut self) -> PResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            let span = left.span.combine(right.span);
            left = self.make_expr(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenType::Star => BinaryOp::Mul,
                TokenType::Slash => BinaryOp::Div,
                TokenType::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span.combine(right.span);
            left = self.make_expr(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let op = match self.peek() {
            TokenType::Minus => Some(UnaryOp::Neg),
            TokenType::Plus => Some(UnaryOp::Pos),
            TokenType::KwNot => Some(UnaryOp::Not),
            TokenType::KwAddrOf => Some(UnaryOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.combine(operand.span);
            return Ok(self.make_expr(ExprKind::Unary { op, operand: Box::new(operand) }, span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                TokenType::Dot => {
                    self.advance();
                    let (name, _) = self.expect_identifier("after '.'")?;
                    if self.check(&TokenType::LParen) {
                        self.advance();
                        let args = self.parse_arg_list()?;
                        self.expect(&TokenType::RParen, "expected ')' after argument list")?;
                        let span = expr.span.combine(self.previous_span());
                        expr = self.make_expr(
                            ExprKind::InstanceMethodCall { receiver: Box::new(expr), method: name, args },
                            span,
                        );
                    } else {
                        let span = expr.span.combine(self.previous_span());
                        expr = self.make_expr(ExprKind::FieldAccess { object: Box::new(expr), field: name }, span);
                    }
                }
                TokenType::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenType::RBracket, "expected ']' after index expression")?;
                    let span = expr.span.combine(self.previous_span());
                    expr = self.make_expr(ExprKind::Index { array: Box::new(expr), index: Box::new(index) }, span);
                }
                TokenType::PlusPlus => {
                    self.advance();
                    let span = expr.span.combine(self.previous_span());
                    expr = self.make_expr(ExprKind::Increment(Box::new(expr)), span);
                }
                TokenType::MinusMinus => {
                    self.advance();
                    let span = expr.span.combine(self.previous_span());
                    expr = self.make_expr(ExprKind::Decrement(Box::new(expr)), span);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_arg_list(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(&TokenType::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
            if self.check(&TokenType::RParen) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        match self.peek().clone() {
            TokenType::Integer(n) => {
                self.advance();
                Ok(self.make_expr(ExprKind::IntLiteral(n), start))
            }
            TokenType::Float(text) => {
                self.advance();
                match text.parse::<f64>() {
                    Ok(value) => Ok(self.make_expr(ExprKind::FloatLiteral(value), start)),
                    Err(_) => {
                        self.error(format!("invalid float literal '{}'", text));
                        Err(())
                    }
                }
            }
            TokenType::Str(s) | TokenType::RawStr(s) => {
                self.advance();
                Ok(self.make_expr(ExprKind::StringLiteral(s), start))
            }
            TokenType::True => {
                self.advance();
                Ok(self.make_expr(ExprKind::BoolLiteral(true), start))
            }
            TokenType::False => {
                self.advance();
                Ok(self.make_expr(ExprKind::BoolLiteral(false), start))
            }
            TokenType::KwSelf => {
                self.advance();
                Ok(self.make_expr(ExprKind::Variable("self".to_string()), start))
            }
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenType::RParen, "expected ')' after expression")?;
                let span = start.combine(self.previous_span());
                Ok(self.make_expr(ExprKind::Grouping(Box::new(inner)), span))
            }
            TokenType::LBracket => self.parse_array_literal(),
            TokenType::Identifier(name) => {
                self.advance();
                if self.check(&TokenType::ColonColon) {
                    self.advance();
                    let (method, _) = self.expect_identifier("after '::'")?;
                    self.expect(&TokenType::LParen, "expected '(' after static method name")?;
                    let args = self.parse_arg_list()?;
                    self.expect(&TokenType::RParen, "expected ')' after argument list")?;
                    let span = start.combine(self.previous_span());
                    Ok(self.make_expr(ExprKind::StaticMethodCall { type_name: name, method, args }, span))
                } else if self.check(&TokenType::LParen) {
                    self.advance();
                    let args = self.parse_arg_list()?;
                    self.expect(&TokenType::RParen, "expected ')' after argument list")?;
                    let span = start.combine(self.previous_span());
                    Ok(self.make_expr(ExprKind::Call { callee: name, args }, span))
                } else if self.check(&TokenType::LBrace) && starts_with_uppercase(&name) {
                    self.parse_struct_literal_or_variable(name, start)
                } else {
                    Ok(self.make_expr(ExprKind::Variable(name), start))
                }
            }
            _ => {
                self.error("expected an expression");
                Err(())
            }
        }
    }

    /// `Name { field: expr, .. }` is only valid where a struct literal makes
    /// sense. The name must start uppercase (the struct-naming convention) to
    /// even attempt it; the attempt itself runs with diagnostics suppressed
    /// and backtracks to a plain variable reference on failure, so `if Flag {`
    /// where `Flag` is a capitalized local still parses as a condition
    /// followed by a block.
    fn parse_struct_literal_or_variable(&mut self, name: String, start: Span) -> PResult<Expr> {
        let checkpoint = self.pos;
        self.diagnostics.suppress_errors(true);
        let attempt = self.try_parse_struct_literal_fields();
        self.diagnostics.suppress_errors(false);
        match attempt {
            Ok(fields) => {
                let span = start.combine(self.previous_span());
                Ok(self.make_expr(ExprKind::StructLiteral { type_name: name, fields }, span))
            }
            Err(()) => {
                self.pos = checkpoint;
                Ok(self.make_expr(ExprKind::Variable(name), start))
            }
        }
    }

    fn try_parse_struct_literal_fields(&mut self) -> PResult<Vec<(String, Expr)>> {
        self.expect(&TokenType::LBrace, "expected '{'")?;
        let mut fields = Vec::new();
        if !self.check(&TokenType::RBrace) {
            loop {
                let (field_name, _) = self.expect_identifier("as a struct literal field name")?;
                self.expect(&TokenType::Colon, "expected ':' after field name")?;
                let value = self.parse_expression()?;
                fields.push((field_name, value));
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                if self.check(&TokenType::RBrace) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RBrace, "expected '}' to close struct literal")?;
        Ok(fields)
    }

    fn parse_array_literal(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.expect(&TokenType::LBracket, "expected '['")?;
        if self.check(&TokenType::RBracket) {
            self.advance();
            let span = start.combine(self.previous_span());
            return Ok(self.make_expr(ExprKind::ArrayLiteral(ArrayLiteralKind::Elements(Vec::new())), span));
        }

        let first = self.parse_expression()?;
        if self.match_token(&TokenType::Semicolon) {
            let count = self.expect_integer("as the repeat count")?;
            self.expect(&TokenType::RBracket, "expected ']' after array repeat literal")?;
            let span = start.combine(self.previous_span());
            return Ok(self.make_expr(
                ExprKind::ArrayLiteral(ArrayLiteralKind::Repeat { value: Box::new(first), count: count as u32 }),
                span,
            ));
        }

        let mut elements = vec![first];
        while self.match_token(&TokenType::Comma) {
            if self.check(&TokenType::RBracket) {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        self.expect(&TokenType::RBracket, "expected ']' after array literal")?;
        let span = start.combine(self.previous_span());
        Ok(self.make_expr(ExprKind::ArrayLiteral(ArrayLiteralKind::Elements(elements)), span))
    }
}

fn starts_with_uppercase(name: &str) -> bool {
    name.chars().next().map_or(false, |c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use volta_lexer::Lexer;

    fn parse_src(src: &str) -> (Program, Diagnostics) {
        let mut lexer = Lexer::new(src, 0);
        let tokens = lexer.tokenize().unwrap();
        parse(tokens)
    }

    #[test]
    fn parses_minimal_main() {
        let (program, diags) = parse_src("fn main() -> i32 { return 0; }");
        assert!(!diags.has_errors());
        assert_eq!(program.items.len(), 1);
        match &program.items[0] {
            Item::Function(f) => {
                assert_eq!(f.name, "main");
                assert!(f.params.is_empty());
                assert_eq!(f.body.stmts.len(), 1);
            }
            _ => panic!("expected a function item"),
        }
    }

    #[test]
    fn parses_struct_with_method_and_ref_param() {
        let src = r#"
            struct Counter {
                pub value: i32
                fn bump(mut self, ref amount: i32) -> i32 {
                    self.value += amount;
                    return self.value;
                }
            }
        "#;
        let (program, diags) = parse_src(src);
        assert!(!diags.has_errors());
        match &program.items[0] {
            Item::Struct(s) => {
                assert_eq!(s.fields.len(), 1);
                assert_eq!(s.methods.len(), 1);
                assert_eq!(s.methods[0].params.len(), 2);
                assert!(matches!(s.methods[0].params[0], Param::SelfParam { is_mut: true, .. }));
            }
            _ => panic!("expected a struct item"),
        }
    }

    #[test]
    fn parses_for_loop_inclusive_range() {
        let (program, diags) = parse_src("fn main() { for i in 0..=9 { } }");
        assert!(!diags.has_errors());
        match &program.items[0] {
            Item::Function(f) => match &f.body.stmts[0].kind {
                StmtKind::For { var, inclusive, .. } => {
                    assert_eq!(var, "i");
                    assert!(*inclusive);
                }
                _ => panic!("expected a for statement"),
            },
            _ => panic!("expected a function item"),
        }
    }

    #[test]
    fn parses_import_statement() {
        let (program, diags) = parse_src("import std.io { println, print };");
        assert!(!diags.has_errors());
        match &program.items[0] {
            Item::Import(i) => {
                assert_eq!(i.path, vec!["std".to_string(), "io".to_string()]);
                assert_eq!(i.symbols, vec!["println".to_string(), "print".to_string()]);
            }
            _ => panic!("expected an import item"),
        }
    }

    #[test]
    fn static_and_instance_calls_are_distinct_nodes() {
        let (program, diags) = parse_src("fn main() { let a = Math::add(1, 2); let b = a.to_string(); }");
        assert!(!diags.has_errors());
        match &program.items[0] {
            Item::Function(f) => {
                match &f.body.stmts[0].kind {
                    StmtKind::Let { init: Some(expr), .. } => {
                        assert!(matches!(*expr.kind, ExprKind::StaticMethodCall { .. }));
                    }
                    _ => panic!("expected a let statement with an initializer"),
                }
                match &f.body.stmts[1].kind {
                    StmtKind::Let { init: Some(expr), .. } => {
                        assert!(matches!(*expr.kind, ExprKind::InstanceMethodCall { .. }));
                    }
                    _ => panic!("expected a let statement with an initializer"),
                }
            }
            _ => panic!("expected a function item"),
        }
    }

    #[test]
    fn operator_precedence_binds_term_tighter_than_addition() {
        let (program, diags) = parse_src("fn main() { let x = 1 + 2 * 3; }");
        assert!(!diags.has_errors());
        match &program.items[0] {
            Item::Function(f) => match &f.body.stmts[0].kind {
                StmtKind::Let { init: Some(expr), .. } => match &*expr.kind {
                    ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                        assert!(matches!(*right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
                    }
                    _ => panic!("expected top-level '+' binary expression"),
                },
                _ => panic!("expected a let statement with an initializer"),
            },
            _ => panic!("expected a function item"),
        }
    }

    #[test]
    fn capitalized_condition_variable_is_not_mistaken_for_struct_literal() {
        let (program, diags) = parse_src("fn main() { if Flag { return 1; } }");
        assert!(!diags.has_errors());
        match &program.items[0] {
            Item::Function(f) => match &f.body.stmts[0].kind {
                StmtKind::If { cond, then_block, .. } => {
                    assert!(matches!(*cond.kind, ExprKind::Variable(_)));
                    assert_eq!(then_block.stmts.len(), 1);
                }
                _ => panic!("expected an if statement"),
            },
            _ => panic!("expected a function item"),
        }
    }

    #[test]
    fn unterminated_declaration_recovers_at_next_item() {
        let (program, diags) = parse_src("fn broken( { } fn main() -> i32 { return 0; } ");
        assert!(diags.has_errors());
        assert_eq!(program.items.len(), 1);
        match &program.items[0] {
            Item::Function(f) => assert_eq!(f.name, "main"),
            _ => panic!("expected a function item"),
        }
    }
}
