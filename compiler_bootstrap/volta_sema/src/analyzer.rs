//! Semantic analysis over a desugared HIR program: struct registration,
//! function registry construction, and per-expression type checking.

use hashbrown::HashMap;
use volta_common::{Diagnostics, Span};
use volta_hir::{HirExternBlock, HirFunction, HirItem, HirProgram, HirStmt, HirStructDecl};
use volta_parser::ast::{ArrayLiteralKind, BinaryOp, Expr, ExprKind, NodeId, Param, TypeExpr, UnaryOp};
use volta_types::{MethodSignature, PrimitiveKind, Type, TypeId, TypeRegistry};

use crate::symbol::{FunctionParameter, FunctionRegistry, FunctionSignature, ParamMode, SymbolTable};

/// Where a field-access expression's field lives, for HIR-to-MIR lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAccessInfo {
    pub struct_type: TypeId,
    pub field_index: usize,
}

pub struct AnalysisOutput {
    pub expr_types: HashMap<NodeId, TypeId>,
    pub field_access: HashMap<NodeId, FieldAccessInfo>,
    pub functions: FunctionRegistry,
    pub diagnostics: Diagnostics,
}

pub struct SemanticAnalyzer {
    diagnostics: Diagnostics,
    symbols: SymbolTable,
    expr_types: HashMap<NodeId, TypeId>,
    field_access: HashMap<NodeId, FieldAccessInfo>,
    current_return_type: Option<TypeId>,
    in_loop: u32,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            symbols: SymbolTable::new(),
            expr_types: HashMap::new(),
            field_access: HashMap::new(),
            current_return_type: None,
            in_loop: 0,
        }
    }

    /// Runs the three registration sub-passes and then analyzes every
    /// function and method body. `imported` supplies public function
    /// signatures collected from other modules, for cross-module calls.
    pub fn analyze(
        mut self,
        program: &HirProgram,
        types: &mut TypeRegistry,
        imported: Option<&FunctionRegistry>,
    ) -> AnalysisOutput {
        self.register_struct_types(program, types);
        self.resolve_unresolved_types(program, types);
        self.build_function_registry(program, types);
        crate::builtins::seed(&mut self.symbols.functions, types);
        if let Some(imported) = imported {
            self.symbols.functions.merge_public_from(imported);
        }

        for item in &program.items {
            match item {
                HirItem::Function(f) => self.analyze_function(f, types, None),
                HirItem::Struct(s) => {
                    let owner = types.get_struct(&s.name);
                    for method in &s.methods {
                        self.analyze_function(method, types, owner);
                    }
                }
                HirItem::Extern(_) | HirItem::Import(_) => {}
            }
        }

        AnalysisOutput {
            expr_types: self.expr_types,
            field_access: self.field_access,
            functions: self.symbols.functions,
            diagnostics: self.diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // ---- sub-pass 1: register struct types ----------------------------

    fn register_struct_types(&mut self, program: &HirProgram, types: &mut TypeRegistry) {
        for item in &program.items {
            if let HirItem::Struct(s) = item {
                types.register_struct_stub(&s.name);
            }
        }
        for item in &program.items {
            if let HirItem::Struct(s) = item {
                self.complete_struct(s, types);
            }
        }
    }

    fn complete_struct(&mut self, s: &HirStructDecl, types: &mut TypeRegistry) {
        let mut fields = Vec::with_capacity(s.fields.len());
        for (name, ty, _is_pub) in &s.fields {
            let field_ty = self.resolve_type_expr(ty, types, s.span);
            fields.push((name.clone(), field_ty));
        }
        if let Err(err) = types.register_struct(&s.name, fields) {
            self.diagnostics.error_at(err.to_string(), s.span);
        }
    }

    // ---- sub-pass 2: resolve unresolved types --------------------------

    /// Walks every registered struct's fields looking for names that never
    /// resolved to a primitive or a struct. A name that still names nothing
    /// after every struct in this module has been registered is an error.
    fn resolve_unresolved_types(&mut self, program: &HirProgram, types: &mut TypeRegistry) {
        for item in &program.items {
            if let HirItem::Struct(s) = item {
                let Some(id) = types.get_struct(&s.name) else { continue };
                let Some(struct_ty) = types.struct_type(id) else { continue };
                let unresolved: Vec<(String, String)> = struct_ty
                    .fields
                    .iter()
                    .filter_map(|(field_name, field_type)| match types.get(*field_type) {
                        Type::Unresolved(name) => Some((field_name.clone(), name.clone())),
                        _ => None,
                    })
                    .collect();
                for (field_name, type_name) in unresolved {
                    if types.get_struct(&type_name).is_none() {
                        self.diagnostics.error_at(
                            format!(
                                "field '{}' of struct '{}' has unknown type '{}'",
                                field_name, s.name, type_name
                            ),
                            s.span,
                        );
                    }
                }
            }
        }
    }

    // ---- sub-pass 3: build function registry ---------------------------

    fn build_function_registry(&mut self, program: &HirProgram, types: &mut TypeRegistry) {
        for item in &program.items {
            match item {
                HirItem::Function(f) => {
                    let sig = self.function_signature(f, types, None);
                    if !self.symbols.functions.register(sig) {
                        self.diagnostics.error_at(format!("function '{}' is already defined", f.name), f.span);
                    }
                }
                HirItem::Struct(s) => {
                    let owner = types.get_struct(&s.name);
                    for method in &s.methods {
                        let sig = self.function_signature(method, types, owner);
                        if let Some(owner_id) = owner {
                            let has_self = sig.has_self;
                            let has_mut_self = sig.has_mut_self;
                            let is_public = sig.is_pub;
                            let param_types = sig
                                .params
                                .iter()
                                .skip(if has_self { 1 } else { 0 })
                                .map(|p| p.type_id)
                                .collect();
                            let method_sig = MethodSignature {
                                name: sig.name.clone(),
                                param_types,
                                return_type: sig.return_type,
                                has_self,
                                has_mut_self,
                                is_public,
                            };
                            types.add_method(owner_id, method_sig);
                        }
                        let key = format!("{}::{}", s.name, method.name);
                        self.symbols.functions.register(FunctionSignature { name: key, ..sig });
                    }
                }
                HirItem::Extern(block) => self.register_extern(block, types),
                HirItem::Import(_) => {}
            }
        }
    }

    fn register_extern(&mut self, block: &HirExternBlock, types: &mut TypeRegistry) {
        for sig in &block.functions {
            let mut params = Vec::with_capacity(sig.params.len());
            for p in &sig.params {
                if let Param::Named { name, ty, is_ref, is_mut_ref, span } = p {
                    let type_id = self.resolve_type_expr(ty, types, *span);
                    params.push(FunctionParameter { name: name.clone(), type_id, mode: param_mode(*is_ref, *is_mut_ref) });
                }
            }
            let return_type = sig
                .return_type
                .as_ref()
                .map(|t| self.resolve_type_expr(t, types, sig.span))
                .unwrap_or_else(|| types.get_primitive(PrimitiveKind::Void));
            let registered = self.symbols.functions.register(FunctionSignature {
                name: sig.name.clone(),
                params,
                return_type,
                is_extern: true,
                is_pub: true,
                owner: None,
                has_self: false,
                has_mut_self: false,
            });
            if !registered {
                self.diagnostics.error_at(format!("function '{}' is already defined", sig.name), sig.span);
            }
        }
    }

    fn function_signature(
        &mut self,
        f: &HirFunction,
        types: &mut TypeRegistry,
        owner: Option<TypeId>,
    ) -> FunctionSignature {
        let mut params = Vec::with_capacity(f.params.len());
        let mut has_self = false;
        let mut has_mut_self = false;
        for p in &f.params {
            match p {
                Param::SelfParam { is_mut, .. } => {
                    has_self = true;
                    has_mut_self = *is_mut;
                    let owner_ty = owner.unwrap_or_else(|| types.get_opaque());
                    let type_id = types.get_pointer(owner_ty);
                    params.push(FunctionParameter {
                        name: "self".to_string(),
                        type_id,
                        mode: if *is_mut { ParamMode::MutRef } else { ParamMode::Ref },
                    });
                }
                Param::Named { name, ty, is_ref, is_mut_ref, span } => {
                    let type_id = self.resolve_type_expr(ty, types, *span);
                    params.push(FunctionParameter { name: name.clone(), type_id, mode: param_mode(*is_ref, *is_mut_ref) });
                }
            }
        }
        let return_type = f
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t, types, f.span))
            .unwrap_or_else(|| types.get_primitive(PrimitiveKind::Void));
        FunctionSignature {
            name: f.name.clone(),
            params,
            return_type,
            is_extern: false,
            is_pub: f.is_pub,
            owner,
            has_self,
            has_mut_self,
        }
    }

    fn resolve_type_expr(&mut self, ty: &TypeExpr, types: &mut TypeRegistry, span: Span) -> TypeId {
        match ty {
            TypeExpr::Named(name) => match types.parse_type_name(name) {
                Some(id) => id,
                None => types.get_unresolved(name),
            },
            TypeExpr::Array(elem, size) => {
                let elem_ty = self.resolve_type_expr(elem, types, span);
                types.get_array(elem_ty, *size)
            }
        }
    }

    // ---- main pass: function/method bodies -----------------------------

    fn analyze_function(&mut self, f: &HirFunction, types: &mut TypeRegistry, owner: Option<TypeId>) {
        self.symbols.enter_scope();
        for p in &f.params {
            match p {
                Param::SelfParam { is_mut, .. } => {
                    let owner_ty = owner.unwrap_or_else(|| types.get_opaque());
                    let ptr_ty = types.get_pointer(owner_ty);
                    self.symbols.define("self", ptr_ty, *is_mut);
                }
                Param::Named { name, ty, is_ref, is_mut_ref, .. } => {
                    let type_id = self.resolve_type_expr(ty, types, f.span);
                    let is_mut = *is_mut_ref || !*is_ref;
                    self.symbols.define(name, type_id, is_mut);
                }
            }
        }
        let return_type = f
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t, types, f.span))
            .unwrap_or_else(|| types.get_primitive(PrimitiveKind::Void));
        let previous_return_type = self.current_return_type.replace(return_type);
        for stmt in &f.body {
            self.analyze_stmt(stmt, types);
        }
        self.current_return_type = previous_return_type;
        self.symbols.exit_scope();
    }

    fn analyze_stmt(&mut self, stmt: &HirStmt, types: &mut TypeRegistry) {
        match stmt {
            HirStmt::VarDecl { name, is_mut, ty, init, span, .. } => {
                let declared = ty.as_ref().map(|t| self.resolve_type_expr(t, types, *span));
                let init_ty = init.as_ref().map(|e| self.infer_expr(e, types));
                let final_ty = match (declared, init_ty) {
                    (Some(d), Some(i)) => {
                        if !self.assignable(i, d, types) {
                            self.diagnostics.error_at(
                                format!(
                                    "cannot initialize '{}' of type {} with value of type {}",
                                    name,
                                    types.display(d),
                                    types.display(i)
                                ),
                                *span,
                            );
                        }
                        d
                    }
                    (Some(d), None) => d,
                    (None, Some(i)) => i,
                    (None, None) => types.get_opaque(),
                };
                if !self.symbols.define(name, final_ty, *is_mut) {
                    self.diagnostics.error_at(format!("'{}' is already declared in this scope", name), *span);
                }
            }
            HirStmt::ExprStmt(e) => {
                self.infer_expr(e, types);
            }
            HirStmt::Return(value, span) => {
                let return_type = self.current_return_type;
                match (value, return_type) {
                    (Some(e), Some(expected)) => {
                        let actual = self.infer_expr(e, types);
                        if !self.assignable(actual, expected, types) {
                            self.diagnostics.error_at(
                                format!(
                                    "return type mismatch: expected {}, found {}",
                                    types.display(expected),
                                    types.display(actual)
                                ),
                                *span,
                            );
                        }
                    }
                    (None, Some(expected)) => {
                        let void = types.get_primitive(PrimitiveKind::Void);
                        if expected != void {
                            self.diagnostics.error_at("missing return value".to_string(), *span);
                        }
                    }
                    (Some(e), None) => {
                        self.infer_expr(e, types);
                    }
                    (None, None) => {}
                }
            }
            HirStmt::If { cond, then_body, else_body, span } => {
                self.check_bool_condition(cond, types, *span);
                self.symbols.enter_scope();
                for s in then_body {
                    self.analyze_stmt(s, types);
                }
                self.symbols.exit_scope();
                self.symbols.enter_scope();
                for s in else_body {
                    self.analyze_stmt(s, types);
                }
                self.symbols.exit_scope();
            }
            HirStmt::While { cond, body, increment, span } => {
                self.check_bool_condition(cond, types, *span);
                self.in_loop += 1;
                self.symbols.enter_scope();
                for s in body {
                    self.analyze_stmt(s, types);
                }
                if let Some(inc) = increment {
                    self.infer_expr(inc, types);
                }
                self.symbols.exit_scope();
                self.in_loop -= 1;
            }
            HirStmt::Block(stmts) => {
                self.symbols.enter_scope();
                for s in stmts {
                    self.analyze_stmt(s, types);
                }
                self.symbols.exit_scope();
            }
            HirStmt::Break(span) | HirStmt::Continue(span) => {
                if self.in_loop == 0 {
                    self.diagnostics.error_at("'break'/'continue' outside of a loop".to_string(), *span);
                }
            }
        }
    }

    fn check_bool_condition(&mut self, cond: &Expr, types: &mut TypeRegistry, span: Span) {
        let cond_ty = self.infer_expr(cond, types);
        let bool_ty = types.get_primitive(PrimitiveKind::Bool);
        if cond_ty != bool_ty {
            self.diagnostics.error_at(format!("condition must be bool, found {}", types.display(cond_ty)), span);
        }
    }

    // ---- expressions ----------------------------------------------------

    fn infer_expr(&mut self, expr: &Expr, types: &mut TypeRegistry) -> TypeId {
        let ty = self.infer_expr_kind(expr, types);
        self.expr_types.insert(expr.id, ty);
        ty
    }

    fn infer_expr_kind(&mut self, expr: &Expr, types: &mut TypeRegistry) -> TypeId {
        match expr.kind.as_ref() {
            ExprKind::IntLiteral(_) => types.get_primitive(PrimitiveKind::I32),
            ExprKind::FloatLiteral(_) => types.get_primitive(PrimitiveKind::F32),
            ExprKind::StringLiteral(_) => types.get_primitive(PrimitiveKind::String),
            ExprKind::BoolLiteral(_) => types.get_primitive(PrimitiveKind::Bool),
            ExprKind::NullLiteral => {
                let opaque = types.get_opaque();
                types.get_pointer(opaque)
            }
            ExprKind::Variable(name) => match self.symbols.lookup(name) {
                Some(sym) => sym.type_id,
                None => {
                    self.diagnostics.error_at(format!("undefined variable '{}'", name), expr.span);
                    types.get_opaque()
                }
            },
            ExprKind::Unary { op, operand } => self.infer_unary(*op, operand, expr.span, types),
            ExprKind::Binary { op, left, right } => self.infer_binary(*op, left, right, expr.span, types),
            ExprKind::Grouping(inner) => self.infer_expr(inner, types),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr.span, types),
            ExprKind::StaticMethodCall { type_name, method, args } => {
                self.infer_static_method_call(type_name, method, args, expr.span, types)
            }
            ExprKind::InstanceMethodCall { receiver, method, args } => {
                self.infer_instance_method_call(receiver, method, args, expr.span, types)
            }
            ExprKind::FieldAccess { object, field } => self.infer_field_access(expr.id, object, field, expr.span, types),
            ExprKind::Index { array, index } => self.infer_index(array, index, expr.span, types),
            ExprKind::ArrayLiteral(kind) => self.infer_array_literal(kind, expr.span, types),
            ExprKind::StructLiteral { type_name, fields } => self.infer_struct_literal(type_name, fields, expr.span, types),
            ExprKind::Assign { target, value } => self.infer_assign(target, value, expr.span, types),
            ExprKind::Range { start, end, .. } => {
                self.infer_expr(start, types);
                self.infer_expr(end, types);
                types.get_opaque()
            }
            ExprKind::CompoundAssign { .. } | ExprKind::Increment(_) | ExprKind::Decrement(_) => {
                self.diagnostics.error_at("compound assignment survived HIR desugaring".to_string(), expr.span);
                types.get_opaque()
            }
        }
    }

    fn infer_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span, types: &mut TypeRegistry) -> TypeId {
        let operand_ty = self.infer_expr(operand, types);
        match op {
            UnaryOp::Neg | UnaryOp::Pos => {
                if !is_signed_or_float(types.get(operand_ty)) {
                    self.diagnostics.error_at(
                        format!("unary '{}' requires a signed integer or float operand", op),
                        span,
                    );
                }
                operand_ty
            }
            UnaryOp::Not => {
                let bool_ty = types.get_primitive(PrimitiveKind::Bool);
                if operand_ty != bool_ty {
                    self.diagnostics.error_at("'not' requires a bool operand".to_string(), span);
                }
                bool_ty
            }
            UnaryOp::AddrOf => {
                if !self.is_mutable_lvalue(operand) {
                    self.diagnostics.error_at("'addrof' requires a mutable variable".to_string(), span);
                }
                types.get_pointer(operand_ty)
            }
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Span, types: &mut TypeRegistry) -> TypeId {
        let lt = self.infer_expr(left, types);
        let rt = self.infer_expr(right, types);
        let bool_ty = types.get_primitive(PrimitiveKind::Bool);
        match op {
            BinaryOp::And | BinaryOp::Or => {
                if lt != bool_ty || rt != bool_ty {
                    self.diagnostics.error_at(format!("'{}' requires bool operands", op), span);
                }
                bool_ty
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let both_numeric = is_numeric(types.get(lt)) && is_numeric(types.get(rt));
                if (both_numeric && lt == rt) || (!both_numeric && lt == rt) {
                    bool_ty
                } else {
                    self.diagnostics.error_at(
                        format!("cannot compare {} and {}", types.display(lt), types.display(rt)),
                        span,
                    );
                    bool_ty
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !is_numeric(types.get(lt)) || !is_numeric(types.get(rt)) || lt != rt {
                    self.diagnostics.error_at(
                        format!("cannot compare {} and {}", types.display(lt), types.display(rt)),
                        span,
                    );
                }
                bool_ty
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if !is_numeric(types.get(lt)) || !is_numeric(types.get(rt)) || lt != rt {
                    self.diagnostics.error_at(
                        format!(
                            "mismatched operand types for '{}': {} and {}",
                            op,
                            types.display(lt),
                            types.display(rt)
                        ),
                        span,
                    );
                }
                lt
            }
        }
    }

    fn infer_call(&mut self, callee: &str, args: &[Expr], span: Span, types: &mut TypeRegistry) -> TypeId {
        // `len` takes a fixed-size array of any element type, which
        // `FunctionRegistry` has no way to express as a single signature.
        // Its result is a compile-time constant (the array's declared
        // size), so it is resolved here rather than through the registry.
        if callee == "len" {
            let arg_types: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a, types)).collect();
            if arg_types.len() != 1 || !matches!(types.get(arg_types[0]), Type::Array(_, _)) {
                self.diagnostics.error_at("'len' takes a single array argument".to_string(), span);
                return types.get_opaque();
            }
            return types.get_primitive(PrimitiveKind::I32);
        }
        let Some(sig) = self.symbols.functions.get(callee).cloned() else {
            self.diagnostics.error_at(format!("undefined function '{}'", callee), span);
            for a in args {
                self.infer_expr(a, types);
            }
            return types.get_opaque();
        };
        self.check_call_args(&sig.name, &sig.params, args, span, types);
        sig.return_type
    }

    fn infer_static_method_call(
        &mut self,
        type_name: &str,
        method: &str,
        args: &[Expr],
        span: Span,
        types: &mut TypeRegistry,
    ) -> TypeId {
        let Some(struct_id) = types.get_struct(type_name) else {
            self.diagnostics.error_at(format!("unknown type '{}'", type_name), span);
            for a in args {
                self.infer_expr(a, types);
            }
            return types.get_opaque();
        };
        let Some(method_sig) = types.struct_type(struct_id).and_then(|s| s.method(method)).cloned() else {
            self.diagnostics.error_at(format!("'{}' has no method '{}'", type_name, method), span);
            for a in args {
                self.infer_expr(a, types);
            }
            return types.get_opaque();
        };
        if method_sig.has_self {
            self.diagnostics.error_at(format!("'{}::{}' takes self; call it as an instance method", type_name, method), span);
        }
        self.check_call_arg_types(&method_sig.param_types, args, span, types);
        method_sig.return_type
    }

    fn infer_instance_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        span: Span,
        types: &mut TypeRegistry,
    ) -> TypeId {
        let receiver_ty = self.infer_expr(receiver, types);
        let struct_id = match types.get(receiver_ty) {
            Type::Struct(_) => Some(receiver_ty),
            Type::Pointer(pointee) => match types.get(*pointee) {
                Type::Struct(_) => Some(*pointee),
                _ => None,
            },
            _ => None,
        };
        let Some(struct_id) = struct_id else {
            self.diagnostics.error_at(format!("'{}' is not a struct", types.display(receiver_ty)), span);
            for a in args {
                self.infer_expr(a, types);
            }
            return types.get_opaque();
        };
        let Some(method_sig) = types.struct_type(struct_id).and_then(|s| s.method(method)).cloned() else {
            self.diagnostics.error_at(format!("no method '{}' on {}", method, types.display(struct_id)), span);
            for a in args {
                self.infer_expr(a, types);
            }
            return types.get_opaque();
        };
        if method_sig.has_mut_self && !self.is_mutable_lvalue(receiver) {
            self.diagnostics.error_at(format!("'{}' requires a mutable receiver", method), span);
        }
        self.check_call_arg_types(&method_sig.param_types, args, span, types);
        method_sig.return_type
    }

    fn check_call_args(
        &mut self,
        name: &str,
        params: &[FunctionParameter],
        args: &[Expr],
        span: Span,
        types: &mut TypeRegistry,
    ) {
        if params.len() != args.len() {
            self.diagnostics.error_at(
                format!("'{}' expects {} argument(s), found {}", name, params.len(), args.len()),
                span,
            );
        }
        for (i, arg) in args.iter().enumerate() {
            let arg_ty = self.infer_expr(arg, types);
            let Some(param) = params.get(i) else { continue };
            match param.mode {
                ParamMode::MutRef => {
                    if !self.is_mutable_lvalue(arg) {
                        self.diagnostics.error_at(
                            format!("argument {} to '{}' must be a mutable variable", i + 1, name),
                            arg.span,
                        );
                    }
                }
                ParamMode::Ref => {
                    if !is_lvalue(arg) {
                        self.diagnostics.error_at(format!("argument {} to '{}' must be an lvalue", i + 1, name), arg.span);
                    }
                }
                ParamMode::Value => {
                    if !self.assignable(arg_ty, param.type_id, types) {
                        self.diagnostics.error_at(
                            format!(
                                "argument {} to '{}' has type {}, expected {}",
                                i + 1,
                                name,
                                types.display(arg_ty),
                                types.display(param.type_id)
                            ),
                            arg.span,
                        );
                    }
                }
            }
        }
    }

    fn check_call_arg_types(&mut self, param_types: &[TypeId], args: &[Expr], span: Span, types: &mut TypeRegistry) {
        if param_types.len() != args.len() {
            self.diagnostics.error_at(
                format!("expected {} argument(s), found {}", param_types.len(), args.len()),
                span,
            );
        }
        for (i, arg) in args.iter().enumerate() {
            let arg_ty = self.infer_expr(arg, types);
            if let Some(&expected) = param_types.get(i) {
                if !self.assignable(arg_ty, expected, types) {
                    self.diagnostics.error_at(
                        format!(
                            "argument {} has type {}, expected {}",
                            i + 1,
                            types.display(arg_ty),
                            types.display(expected)
                        ),
                        arg.span,
                    );
                }
            }
        }
    }

    fn infer_field_access(&mut self, id: NodeId, object: &Expr, field: &str, span: Span, types: &mut TypeRegistry) -> TypeId {
        let object_ty = self.infer_expr(object, types);
        let struct_id = match types.get(object_ty) {
            Type::Struct(_) => Some(object_ty),
            Type::Pointer(pointee) => match types.get(*pointee) {
                Type::Struct(_) => Some(*pointee),
                _ => None,
            },
            _ => None,
        };
        let Some(struct_id) = struct_id else {
            self.diagnostics.error_at(format!("'{}' is not a struct", types.display(object_ty)), span);
            return types.get_opaque();
        };
        let Some(struct_ty) = types.struct_type(struct_id) else {
            return types.get_opaque();
        };
        match struct_ty.fields.iter().position(|(n, _)| n == field) {
            Some(index) => {
                let field_ty = struct_ty.fields[index].1;
                self.field_access.insert(id, FieldAccessInfo { struct_type: struct_id, field_index: index });
                field_ty
            }
            None => {
                self.diagnostics.error_at(format!("no field '{}' on {}", field, types.display(struct_id)), span);
                types.get_opaque()
            }
        }
    }

    fn infer_index(&mut self, array: &Expr, index: &Expr, span: Span, types: &mut TypeRegistry) -> TypeId {
        let array_ty = self.infer_expr(array, types);
        let index_ty = self.infer_expr(index, types);
        if !matches!(types.get(index_ty), Type::Primitive(k) if k.is_integer()) {
            self.diagnostics.error_at("array index must be an integer".to_string(), span);
        }
        match types.get(array_ty) {
            Type::Array(elem, _) => *elem,
            _ => {
                self.diagnostics.error_at(format!("'{}' is not an array", types.display(array_ty)), span);
                types.get_opaque()
            }
        }
    }

    fn infer_array_literal(&mut self, kind: &ArrayLiteralKind, _span: Span, types: &mut TypeRegistry) -> TypeId {
        match kind {
            ArrayLiteralKind::Elements(elements) => {
                if elements.is_empty() {
                    let opaque = types.get_opaque();
                    return types.get_array(opaque, 0);
                }
                let first_ty = self.infer_expr(&elements[0], types);
                for e in &elements[1..] {
                    let t = self.infer_expr(e, types);
                    if t != first_ty {
                        self.diagnostics.error_at(
                            format!("array elements must share a type: {} vs {}", types.display(first_ty), types.display(t)),
                            e.span,
                        );
                    }
                }
                types.get_array(first_ty, elements.len() as u32)
            }
            ArrayLiteralKind::Repeat { value, count } => {
                let value_ty = self.infer_expr(value, types);
                types.get_array(value_ty, *count)
            }
        }
    }

    fn infer_struct_literal(
        &mut self,
        type_name: &str,
        fields: &[(String, Expr)],
        span: Span,
        types: &mut TypeRegistry,
    ) -> TypeId {
        let Some(struct_id) = types.get_struct(type_name) else {
            self.diagnostics.error_at(format!("unknown struct '{}'", type_name), span);
            for (_, e) in fields {
                self.infer_expr(e, types);
            }
            return types.get_opaque();
        };
        let declared_fields: Vec<(String, TypeId)> = types.struct_type(struct_id).map(|s| s.fields.clone()).unwrap_or_default();
        for (name, value) in fields {
            let value_ty = self.infer_expr(value, types);
            match declared_fields.iter().find(|(n, _)| n == name) {
                Some((_, expected)) => {
                    if !self.assignable(value_ty, *expected, types) {
                        self.diagnostics.error_at(
                            format!(
                                "field '{}' of '{}' has type {}, found {}",
                                name,
                                type_name,
                                types.display(*expected),
                                types.display(value_ty)
                            ),
                            value.span,
                        );
                    }
                }
                None => {
                    self.diagnostics.error_at(format!("'{}' has no field '{}'", type_name, name), value.span);
                }
            }
        }
        for (name, _) in &declared_fields {
            if !fields.iter().any(|(n, _)| n == name) {
                self.diagnostics.error_at(format!("missing field '{}' in literal for '{}'", name, type_name), span);
            }
        }
        struct_id
    }

    fn infer_assign(&mut self, target: &Expr, value: &Expr, span: Span, types: &mut TypeRegistry) -> TypeId {
        let target_ty = self.infer_expr(target, types);
        let value_ty = self.infer_expr(value, types);
        if !self.is_mutable_lvalue(target) {
            self.diagnostics.error_at("assignment target is not mutable".to_string(), span);
        }
        if !self.assignable(value_ty, target_ty, types) {
            self.diagnostics.error_at(
                format!("cannot assign {} to {}", types.display(value_ty), types.display(target_ty)),
                span,
            );
        }
        target_ty
    }

    /// Whether a variable, field, or indexed access rooted in a mutable
    /// variable (or a mutable pointer receiver) can be written to.
    fn is_mutable_lvalue(&self, expr: &Expr) -> bool {
        match expr.kind.as_ref() {
            ExprKind::Variable(name) => self.symbols.lookup(name).map(|s| s.is_mut).unwrap_or(false),
            ExprKind::FieldAccess { object, .. } => self.is_mutable_lvalue(object),
            ExprKind::Index { array, .. } => self.is_mutable_lvalue(array),
            ExprKind::Grouping(inner) => self.is_mutable_lvalue(inner),
            _ => false,
        }
    }

    /// Can a value of type `from` be used where `to` is expected, either
    /// because the types match exactly or because of numeric widening.
    fn assignable(&self, from: TypeId, to: TypeId, types: &TypeRegistry) -> bool {
        if from == to {
            return true;
        }
        if is_null_pointer(types.get(from)) && matches!(types.get(to), Type::Pointer(_)) {
            return true;
        }
        match (types.get(from), types.get(to)) {
            (Type::Primitive(f), Type::Primitive(t)) => numeric_widens(*f, *t),
            _ => false,
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn param_mode(is_ref: bool, is_mut_ref: bool) -> ParamMode {
    if is_mut_ref {
        ParamMode::MutRef
    } else if is_ref {
        ParamMode::Ref
    } else {
        ParamMode::Value
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(expr.kind.as_ref(), ExprKind::Variable(_) | ExprKind::FieldAccess { .. } | ExprKind::Index { .. })
}

fn is_numeric(ty: &Type) -> bool {
    matches!(ty, Type::Primitive(k) if k.is_integer() || k.is_float())
}

fn is_signed_or_float(ty: &Type) -> bool {
    matches!(ty, Type::Primitive(k) if k.is_signed() || k.is_float())
}

fn is_null_pointer(ty: &Type) -> bool {
    matches!(ty, Type::Pointer(_))
}

fn int_width(kind: PrimitiveKind) -> u32 {
    match kind {
        PrimitiveKind::I8 | PrimitiveKind::U8 => 8,
        PrimitiveKind::I16 | PrimitiveKind::U16 => 16,
        PrimitiveKind::I32 | PrimitiveKind::U32 => 32,
        PrimitiveKind::I64 | PrimitiveKind::U64 => 64,
        _ => 0,
    }
}

fn float_width(kind: PrimitiveKind) -> u32 {
    match kind {
        PrimitiveKind::F32 => 32,
        PrimitiveKind::F64 => 64,
        _ => 0,
    }
}

/// Same-signedness integer to a wider integer; float to a wider float;
/// integer to a float wide enough to hold it. Everything else (including
/// any signed/unsigned mix) is not an implicit conversion.
fn numeric_widens(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    if from.is_integer() && to.is_integer() {
        return from.is_signed() == to.is_signed() && int_width(to) >= int_width(from);
    }
    if from.is_float() && to.is_float() {
        return float_width(to) >= float_width(from);
    }
    if from.is_integer() && to.is_float() {
        return float_width(to) >= int_width(from).min(32);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use volta_lexer::Lexer;

    fn analyze(src: &str) -> (AnalysisOutput, TypeRegistry) {
        let mut lexer = Lexer::new(src, 0);
        let tokens = lexer.tokenize().unwrap();
        let (program, diagnostics) = volta_parser::parse(tokens);
        assert!(!diagnostics.has_errors(), "parse errors: {:?}", diagnostics.messages());
        let hir = volta_hir::lower_program(program);
        let mut types = TypeRegistry::new();
        let output = SemanticAnalyzer::new().analyze(&hir, &mut types, None);
        (output, types)
    }

    #[test]
    fn binds_literal_and_variable_types() {
        let (output, _) = analyze("fn main() { let x = 1; let y: i32 = x; }");
        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics.messages());
    }

    #[test]
    fn rejects_mismatched_arithmetic_operands() {
        let (output, _) = analyze("fn main() { let x: i32 = 1; let y: i64 = 2; let z = x + y; }");
        assert!(output.diagnostics.has_errors());
    }

    #[test]
    fn allows_widening_int_to_wider_int_on_assignment() {
        let (output, _) = analyze("fn main() { let x: i32 = 1; let y: i64 = x; }");
        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics.messages());
    }

    #[test]
    fn rejects_break_outside_loop() {
        let (output, _) = analyze("fn main() { break; }");
        assert!(output.diagnostics.has_errors());
    }

    #[test]
    fn struct_field_access_resolves_index() {
        let (output, types) = analyze(
            "struct Point { x: i32, y: i32 } fn main() { let p = Point { x: 1, y: 2 }; let a = p.x; }",
        );
        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics.messages());
        let point = types.get_struct("Point").unwrap();
        assert!(output.field_access.values().any(|info| info.struct_type == point && info.field_index == 0));
    }

    #[test]
    fn static_method_call_type_checks_against_signature() {
        let (output, _) = analyze(
            "struct Point { x: i32, y: i32, pub fn new(x: i32, y: i32) -> Point { return Point { x: x, y: y }; } } \
             fn main() { let p = Point::new(1, 2); }",
        );
        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics.messages());
    }

    #[test]
    fn for_loop_desugars_and_type_checks() {
        let (output, _) = analyze("fn main() { let mut total: i32 = 0; for i in 0..10 { total = total + i; } }");
        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics.messages());
    }
}
