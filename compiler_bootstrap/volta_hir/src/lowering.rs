//! AST-to-HIR lowering: a single recursive pass that desugars compound
//! assignment, increment/decrement, and `for` loops, and rewrites
//! struct-shaped dot-calls into static method calls.

use crate::hir::*;
use hashbrown::HashSet;
use volta_common::Span;
use volta_parser::ast::{self, ArrayLiteralKind, BinaryOp, Expr, ExprKind, NodeId, Stmt, StmtKind, TypeExpr};

pub fn lower_program(program: ast::Program) -> HirProgram {
    let struct_names: HashSet<String> = program
        .items
        .iter()
        .filter_map(|item| match item {
            ast::Item::Struct(s) => Some(s.name.clone()),
            _ => None,
        })
        .collect();

    let next_id = max_node_id(&program) + 1;
    let mut lowering = Lowering { struct_names, next_id };

    let items = program
        .items
        .into_iter()
        .map(|item| lowering.lower_item(item))
        .collect();

    HirProgram { items }
}

struct Lowering {
    struct_names: HashSet<String>,
    next_id: NodeId,
}

impl Lowering {
    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn lower_item(&mut self, item: ast::Item) -> HirItem {
        match item {
            ast::Item::Function(f) => HirItem::Function(self.lower_function(f)),
            ast::Item::Struct(s) => HirItem::Struct(self.lower_struct(s)),
            ast::Item::Extern(e) => HirItem::Extern(self.lower_extern(e)),
            ast::Item::Import(i) => HirItem::Import(HirImportDecl { path: i.path, symbols: i.symbols, span: i.span }),
        }
    }

    fn lower_function(&mut self, f: ast::Function) -> HirFunction {
        HirFunction {
            name: f.name,
            params: f.params,
            return_type: f.return_type,
            body: self.lower_block(f.body),
            is_pub: f.is_pub,
            span: f.span,
            id: f.id,
        }
    }

    fn lower_struct(&mut self, s: ast::StructDecl) -> HirStructDecl {
        HirStructDecl {
            name: s.name,
            is_pub: s.is_pub,
            fields: s.fields.into_iter().map(|f| (f.name, f.ty, f.is_pub)).collect(),
            methods: s.methods.into_iter().map(|m| self.lower_function(m)).collect(),
            span: s.span,
            id: s.id,
        }
    }

    fn lower_extern(&mut self, e: ast::ExternBlock) -> HirExternBlock {
        HirExternBlock {
            abi: e.abi,
            functions: e
                .functions
                .into_iter()
                .map(|sig| HirExternFnSig { name: sig.name, params: sig.params, return_type: sig.return_type, span: sig.span })
                .collect(),
            span: e.span,
        }
    }

    fn lower_block(&mut self, block: ast::Block) -> Vec<HirStmt> {
        block.stmts.into_iter().flat_map(|s| self.lower_stmt(s)).collect()
    }

    /// Most statements lower to exactly one `HirStmt`; `for` expands into
    /// a `let` followed by a `while`, both wrapped in a `Block` so the
    /// caller still gets a single element back.
    fn lower_stmt(&mut self, stmt: Stmt) -> Vec<HirStmt> {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::Let { name, is_mut, ty, init } => {
                let dimensions = ty.as_ref().map(array_dimensions).unwrap_or_default();
                let ty = ty.map(flatten_array_type);
                vec![HirStmt::VarDecl {
                    name,
                    is_mut,
                    ty,
                    init: init.map(|e| self.lower_expr(e)),
                    dimensions,
                    span,
                }]
            }
            StmtKind::Return(value) => vec![HirStmt::Return(value.map(|e| self.lower_expr(e)), span)],
            StmtKind::If { cond, then_block, else_branch } => {
                let else_body = match else_branch {
                    None => Vec::new(),
                    Some(ast::ElseBranch::Block(b)) => self.lower_block(b),
                    Some(ast::ElseBranch::If(nested)) => self.lower_stmt(*nested),
                };
                vec![HirStmt::If { cond: self.lower_expr(cond), then_body: self.lower_block(then_block), else_body, span }]
            }
            StmtKind::While { cond, body } => {
                vec![HirStmt::While { cond: self.lower_expr(cond), body: self.lower_block(body), increment: None, span }]
            }
            StmtKind::For { var, start, end, inclusive, body } => vec![self.desugar_for(var, start, end, inclusive, body, span)],
            StmtKind::Break => vec![HirStmt::Break(span)],
            StmtKind::Continue => vec![HirStmt::Continue(span)],
            StmtKind::Block(b) => vec![HirStmt::Block(self.lower_block(b))],
            StmtKind::Expr(e) => vec![HirStmt::ExprStmt(self.lower_expr(e))],
        }
    }

    /// `for i in a..b { body }` / `for i in a..=b { body }` becomes:
    /// `{ let mut i = a; while i < b (or <=) { body; } }` with the loop's
    /// `i = i + 1` step carried in the `while`'s increment slot rather than
    /// appended to the body, so `continue` still reaches it.
    fn desugar_for(&mut self, var: String, start: Expr, end: Expr, inclusive: bool, body: ast::Block, span: Span) -> HirStmt {
        let start = self.lower_expr(start);
        let end = self.lower_expr(end);
        let body = self.lower_block(body);

        let cmp_op = if inclusive { BinaryOp::Le } else { BinaryOp::Lt };
        let cond_var_ref = self.var_ref(&var, span);
        let cond = self.make_expr(
            ExprKind::Binary { op: cmp_op, left: Box::new(cond_var_ref), right: Box::new(end) },
            span,
        );
        let increment_target = self.var_ref(&var, span);
        let add_left = self.var_ref(&var, span);
        let add_right = self.make_expr(ExprKind::IntLiteral(1), span);
        let increment_value = self.make_expr(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(add_left),
                right: Box::new(add_right),
            },
            span,
        );
        let increment = self.make_expr(
            ExprKind::Assign {
                target: Box::new(increment_target),
                value: Box::new(increment_value),
            },
            span,
        );

        let var_decl = HirStmt::VarDecl { name: var, is_mut: true, ty: None, init: Some(start), dimensions: Vec::new(), span };
        let while_stmt = HirStmt::While { cond, body, increment: Some(increment), span };
        HirStmt::Block(vec![var_decl, while_stmt])
    }

    fn var_ref(&mut self, name: &str, span: Span) -> Expr {
        let id = self.fresh_id();
        Expr { kind: Box::new(ExprKind::Variable(name.to_string())), span, id }
    }

    fn make_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = self.fresh_id();
        Expr { kind: Box::new(kind), span, id }
    }

    /// Deep-clones an expression tree, assigning every node a fresh id.
    /// Used where the desugared form reads an lvalue a second time (e.g.
    /// `x += e` needs both a write target and a read of the prior value).
    fn retag_fresh(&mut self, expr: &Expr) -> Expr {
        let kind = match &*expr.kind {
            ExprKind::Unary { op, operand } => ExprKind::Unary { op: *op, operand: Box::new(self.retag_fresh(operand)) },
            ExprKind::Binary { op, left, right } => {
                ExprKind::Binary { op: *op, left: Box::new(self.retag_fresh(left)), right: Box::new(self.retag_fresh(right)) }
            }
            ExprKind::Grouping(inner) => ExprKind::Grouping(Box::new(self.retag_fresh(inner))),
            ExprKind::FieldAccess { object, field } => {
                ExprKind::FieldAccess { object: Box::new(self.retag_fresh(object)), field: field.clone() }
            }
            ExprKind::Index { array, index } => {
                ExprKind::Index { array: Box::new(self.retag_fresh(array)), index: Box::new(self.retag_fresh(index)) }
            }
            ExprKind::Variable(name) => ExprKind::Variable(name.clone()),
            ExprKind::IntLiteral(n) => ExprKind::IntLiteral(*n),
            ExprKind::FloatLiteral(n) => ExprKind::FloatLiteral(*n),
            ExprKind::StringLiteral(s) => ExprKind::StringLiteral(s.clone()),
            ExprKind::BoolLiteral(b) => ExprKind::BoolLiteral(*b),
            ExprKind::NullLiteral => ExprKind::NullLiteral,
            // Only lvalues (variable/field/index chains, possibly grouped)
            // are ever re-read by desugaring; anything else is structurally
            // cloned as-is without deeper rewriting.
            other => other.clone(),
        };
        self.make_expr(kind, expr.span)
    }

    fn lower_expr(&mut self, expr: Expr) -> Expr {
        let span = expr.span;
        let id = expr.id;
        let kind = match *expr.kind {
            ExprKind::CompoundAssign { op, target, value } => {
                let target = self.lower_expr(*target);
                let value = self.lower_expr(*value);
                let read = self.retag_fresh(&target);
                let binary = self.make_expr(ExprKind::Binary { op, left: Box::new(read), right: Box::new(value) }, span);
                ExprKind::Assign { target: Box::new(target), value: Box::new(binary) }
            }
            ExprKind::Increment(target) => {
                let target = self.lower_expr(*target);
                let read = self.retag_fresh(&target);
                let one = self.make_expr(ExprKind::IntLiteral(1), span);
                let binary = self.make_expr(ExprKind::Binary { op: BinaryOp::Add, left: Box::new(read), right: Box::new(one) }, span);
                ExprKind::Assign { target: Box::new(target), value: Box::new(binary) }
            }
            ExprKind::Decrement(target) => {
                let target = self.lower_expr(*target);
                let read = self.retag_fresh(&target);
                let one = self.make_expr(ExprKind::IntLiteral(1), span);
                let binary = self.make_expr(ExprKind::Binary { op: BinaryOp::Sub, left: Box::new(read), right: Box::new(one) }, span);
                ExprKind::Assign { target: Box::new(target), value: Box::new(binary) }
            }
            ExprKind::InstanceMethodCall { receiver, method, args } => {
                let receiver = self.lower_expr(*receiver);
                let args = args.into_iter().map(|a| self.lower_expr(a)).collect();
                match &*receiver.kind {
                    ExprKind::Variable(name) if self.struct_names.contains(name) => {
                        ExprKind::StaticMethodCall { type_name: name.clone(), method, args }
                    }
                    _ => ExprKind::InstanceMethodCall { receiver: Box::new(receiver), method, args },
                }
            }
            ExprKind::StaticMethodCall { type_name, method, args } => {
                ExprKind::StaticMethodCall { type_name, method, args: args.into_iter().map(|a| self.lower_expr(a)).collect() }
            }
            ExprKind::Call { callee, args } => ExprKind::Call { callee, args: args.into_iter().map(|a| self.lower_expr(a)).collect() },
            ExprKind::Unary { op, operand } => ExprKind::Unary { op, operand: Box::new(self.lower_expr(*operand)) },
            ExprKind::Binary { op, left, right } => {
                ExprKind::Binary { op, left: Box::new(self.lower_expr(*left)), right: Box::new(self.lower_expr(*right)) }
            }
            ExprKind::Grouping(inner) => ExprKind::Grouping(Box::new(self.lower_expr(*inner))),
            ExprKind::FieldAccess { object, field } => ExprKind::FieldAccess { object: Box::new(self.lower_expr(*object)), field },
            ExprKind::Index { array, index } => {
                ExprKind::Index { array: Box::new(self.lower_expr(*array)), index: Box::new(self.lower_expr(*index)) }
            }
            ExprKind::ArrayLiteral(kind) => ExprKind::ArrayLiteral(self.lower_array_literal(kind)),
            ExprKind::StructLiteral { type_name, fields } => ExprKind::StructLiteral {
                type_name,
                fields: fields.into_iter().map(|(name, value)| (name, self.lower_expr(value))).collect(),
            },
            ExprKind::Assign { target, value } => {
                ExprKind::Assign { target: Box::new(self.lower_expr(*target)), value: Box::new(self.lower_expr(*value)) }
            }
            other @ (ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::NullLiteral
            | ExprKind::Variable(_)
            | ExprKind::Range { .. }) => other,
        };
        Expr { kind: Box::new(kind), span, id }
    }

    fn lower_array_literal(&mut self, kind: ArrayLiteralKind) -> ArrayLiteralKind {
        match kind {
            ArrayLiteralKind::Elements(elements) => {
                ArrayLiteralKind::Elements(elements.into_iter().map(|e| self.lower_expr(e)).collect())
            }
            ArrayLiteralKind::Repeat { value, count } => {
                ArrayLiteralKind::Repeat { value: Box::new(self.lower_expr(*value)), count }
            }
        }
    }
}

/// Dimension vector for a (possibly nested) array type, outermost first.
/// `i32` and other non-array types have no dimensions.
fn array_dimensions(ty: &TypeExpr) -> Vec<u32> {
    let mut dims = Vec::new();
    let mut current = ty;
    while let TypeExpr::Array(elem, size) = current {
        dims.push(*size);
        current = elem;
    }
    dims
}

/// Flattens `[[T; n]; m]` to `[T; n * m]`; non-array and single-dimension
/// array types are returned unchanged.
fn flatten_array_type(ty: TypeExpr) -> TypeExpr {
    let dims = array_dimensions(&ty);
    if dims.len() <= 1 {
        return ty;
    }
    let mut base = &ty;
    while let TypeExpr::Array(elem, _) = base {
        base = elem;
    }
    let total: u32 = dims.iter().product();
    TypeExpr::Array(Box::new(base.clone()), total)
}

fn max_node_id(program: &ast::Program) -> NodeId {
    let mut max = 0;
    for item in &program.items {
        match item {
            ast::Item::Function(f) => max_in_function(f, &mut max),
            ast::Item::Struct(s) => {
                max = max.max(s.id);
                for m in &s.methods {
                    max_in_function(m, &mut max);
                }
            }
            ast::Item::Extern(_) | ast::Item::Import(_) => {}
        }
    }
    max
}

fn max_in_function(f: &ast::Function, max: &mut NodeId) {
    *max = (*max).max(f.id);
    max_in_block(&f.body, max);
}

fn max_in_block(block: &ast::Block, max: &mut NodeId) {
    for stmt in &block.stmts {
        max_in_stmt(stmt, max);
    }
}

fn max_in_stmt(stmt: &Stmt, max: &mut NodeId) {
    *max = (*max).max(stmt.id);
    match &stmt.kind {
        StmtKind::Let { init, .. } => {
            if let Some(e) = init {
                max_in_expr(e, max);
            }
        }
        StmtKind::Return(value) => {
            if let Some(e) = value {
                max_in_expr(e, max);
            }
        }
        StmtKind::If { cond, then_block, else_branch } => {
            max_in_expr(cond, max);
            max_in_block(then_block, max);
            match else_branch {
                Some(ast::ElseBranch::Block(b)) => max_in_block(b, max),
                Some(ast::ElseBranch::If(nested)) => max_in_stmt(nested, max),
                None => {}
            }
        }
        StmtKind::While { cond, body } => {
            max_in_expr(cond, max);
            max_in_block(body, max);
        }
        StmtKind::For { start, end, body, .. } => {
            max_in_expr(start, max);
            max_in_expr(end, max);
            max_in_block(body, max);
        }
        StmtKind::Block(b) => max_in_block(b, max),
        StmtKind::Expr(e) => max_in_expr(e, max),
        StmtKind::Break | StmtKind::Continue => {}
    }
}

fn max_in_expr(expr: &Expr, max: &mut NodeId) {
    *max = (*max).max(expr.id);
    match &*expr.kind {
        ExprKind::Unary { operand, .. } => max_in_expr(operand, max),
        ExprKind::Binary { left, right, .. } => {
            max_in_expr(left, max);
            max_in_expr(right, max);
        }
        ExprKind::Grouping(inner) => max_in_expr(inner, max),
        ExprKind::Call { args, .. } => args.iter().for_each(|a| max_in_expr(a, max)),
        ExprKind::StaticMethodCall { args, .. } => args.iter().for_each(|a| max_in_expr(a, max)),
        ExprKind::InstanceMethodCall { receiver, args, .. } => {
            max_in_expr(receiver, max);
            args.iter().for_each(|a| max_in_expr(a, max));
        }
        ExprKind::FieldAccess { object, .. } => max_in_expr(object, max),
        ExprKind::Index { array, index } => {
            max_in_expr(array, max);
            max_in_expr(index, max);
        }
        ExprKind::ArrayLiteral(ArrayLiteralKind::Elements(elements)) => elements.iter().for_each(|e| max_in_expr(e, max)),
        ExprKind::ArrayLiteral(ArrayLiteralKind::Repeat { value, .. }) => max_in_expr(value, max),
        ExprKind::StructLiteral { fields, .. } => fields.iter().for_each(|(_, v)| max_in_expr(v, max)),
        ExprKind::Assign { target, value } => {
            max_in_expr(target, max);
            max_in_expr(value, max);
        }
        ExprKind::CompoundAssign { target, value, .. } => {
            max_in_expr(target, max);
            max_in_expr(value, max);
        }
        ExprKind::Increment(inner) | ExprKind::Decrement(inner) => max_in_expr(inner, max),
        ExprKind::Range { start, end, .. } => {
            max_in_expr(start, max);
            max_in_expr(end, max);
        }
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::NullLiteral
        | ExprKind::Variable(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volta_lexer::Lexer;
    use volta_parser::parse;

    fn lower_src(src: &str) -> HirProgram {
        let mut lexer = Lexer::new(src, 0);
        let tokens = lexer.tokenize().unwrap();
        let (program, diags) = parse(tokens);
        assert!(!diags.has_errors(), "{:?}", diags.messages());
        lower_program(program)
    }

    #[test]
    fn desugars_compound_assign() {
        let hir = lower_src("fn main() { let mut x = 0; x += 1; }");
        match &hir.items[0] {
            HirItem::Function(f) => match &f.body[1] {
                HirStmt::ExprStmt(e) => assert!(matches!(*e.kind, ExprKind::Assign { .. })),
                other => panic!("expected an expression statement, got {:?}", other),
            },
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn desugars_for_loop_into_let_and_while() {
        let hir = lower_src("fn main() { for i in 0..10 { } }");
        match &hir.items[0] {
            HirItem::Function(f) => match &f.body[0] {
                HirStmt::Block(stmts) => {
                    assert!(matches!(stmts[0], HirStmt::VarDecl { .. }));
                    match &stmts[1] {
                        HirStmt::While { increment, .. } => assert!(increment.is_some()),
                        other => panic!("expected a while statement, got {:?}", other),
                    }
                }
                other => panic!("expected a block, got {:?}", other),
            },
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn rewrites_dot_call_on_struct_name_to_static_method_call() {
        let src = "struct Point { x: i32 } fn main() { let p = Point.new(1, 2); }";
        let hir = lower_src(src);
        match &hir.items[1] {
            HirItem::Function(f) => match &f.body[0] {
                HirStmt::VarDecl { init: Some(e), .. } => {
                    assert!(matches!(*e.kind, ExprKind::StaticMethodCall { .. }));
                }
                other => panic!("expected a var decl, got {:?}", other),
            },
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn flattens_multi_dimensional_array_type() {
        let hir = lower_src("fn main() { let m: [[i32; 4]; 3] = [[0; 4]; 3]; }");
        match &hir.items[0] {
            HirItem::Function(f) => match &f.body[0] {
                HirStmt::VarDecl { ty: Some(TypeExpr::Array(elem, size)), dimensions, .. } => {
                    assert_eq!(*size, 12);
                    assert!(matches!(**elem, TypeExpr::Named(ref n) if n == "i32"));
                    assert_eq!(dimensions, &vec![3, 4]);
                }
                other => panic!("expected a flattened array var decl, got {:?}", other),
            },
            _ => panic!("expected a function"),
        }
    }
}
