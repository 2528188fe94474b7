//! HIR-to-MIR lowering.
//!
//! Takes a type-checked HIR program, its per-expression type map, and the
//! function registry semantic analysis built, and produces an SSA [`Program`].
//! Struct and array variables (and any `ref`/`mut ref` parameter) live behind
//! a pointer for their whole lifetime; plain immutable scalar locals are kept
//! as direct SSA values and never get an `Alloca`.

use hashbrown::HashMap;

use volta_common::diagnostics::Diagnostics;
use volta_common::Span;
use volta_hir::hir::{HirFunction, HirItem, HirProgram, HirStmt};
use volta_parser::ast::{ArrayLiteralKind, BinaryOp, Expr, ExprKind, NodeId, UnaryOp};
use volta_sema::{FieldAccessInfo, FunctionParameter, FunctionRegistry, FunctionSignature, ParamMode};
use volta_types::{PrimitiveKind, Type, TypeId, TypeRegistry};

use crate::builder::MirBuilder;
use crate::ir::{Constant, Function, Instruction, Opcode, Program, Terminator, Value, GC_MALLOC};

/// A local name is either a mutable/aggregate slot (access through
/// `Load`/`Store`) or an immutable scalar bound directly to its SSA value.
#[derive(Clone)]
enum Binding {
    Slot(Value),
    Direct(Value),
}

struct LoopFrame {
    break_label: String,
    continue_label: String,
}

pub struct LoweringOutput {
    pub program: Program,
    pub diagnostics: Diagnostics,
}

pub struct Lowering<'a> {
    types: &'a mut TypeRegistry,
    expr_types: &'a HashMap<NodeId, TypeId>,
    field_access: &'a HashMap<NodeId, FieldAccessInfo>,
    functions: &'a FunctionRegistry,
    diagnostics: Diagnostics,
    /// Dimension vector a `let` declaration recorded for a multi-dimensional
    /// array local, keyed by its name. Reset per function; only declarations
    /// in that function are ever visible here, so a nested index chain can
    /// recover the shape the HIR flattened away.
    array_dims: HashMap<String, Vec<u32>>,
}

impl<'a> Lowering<'a> {
    pub fn new(
        types: &'a mut TypeRegistry,
        expr_types: &'a HashMap<NodeId, TypeId>,
        field_access: &'a HashMap<NodeId, FieldAccessInfo>,
        functions: &'a FunctionRegistry,
    ) -> Self {
        Self { types, expr_types, field_access, functions, diagnostics: Diagnostics::new(), array_dims: HashMap::new() }
    }

    pub fn lower_program(mut self, hir: &HirProgram) -> LoweringOutput {
        let mut program = Program::default();
        program.functions.push(self.malloc_declaration());

        let mut declared_externs: HashMap<String, ()> = HashMap::new();
        for item in &hir.items {
            match item {
                HirItem::Function(f) => {
                    if let Some(sig) = self.functions.get(&f.name).cloned() {
                        program.functions.push(self.lower_function(f, &sig, f.name.clone()));
                    }
                }
                HirItem::Struct(s) => {
                    for method in &s.methods {
                        let key = format!("{}::{}", s.name, method.name);
                        if let Some(sig) = self.functions.get(&key).cloned() {
                            let mir_name = format!("{}__{}", s.name, method.name);
                            program.functions.push(self.lower_function(method, &sig, mir_name));
                        }
                    }
                }
                HirItem::Extern(block) => {
                    for sig in &block.functions {
                        if let Some(fsig) = self.functions.get(&sig.name).cloned() {
                            program.functions.push(self.extern_stub(&fsig));
                            declared_externs.insert(sig.name.clone(), ());
                        }
                    }
                }
                HirItem::Import(_) => {}
            }
        }

        // Builtins are callable without a source `extern` block (they're
        // implicitly available, per `volta_sema::builtins`), so the extern
        // declaration they need in the final program is synthesized here
        // rather than collected from the HIR the way explicit ones are.
        for name in volta_sema::builtins::BUILTIN_NAMES {
            if declared_externs.contains_key(*name) {
                continue;
            }
            if let Some(fsig) = self.functions.get(*name).cloned() {
                program.functions.push(self.extern_stub(&fsig));
            }
        }

        LoweringOutput { program, diagnostics: self.diagnostics }
    }

    fn malloc_declaration(&mut self) -> Function {
        let i64_ty = self.types.get_primitive(PrimitiveKind::I64);
        let opaque = self.types.get_opaque();
        let ptr_ty = self.types.get_pointer(opaque);
        Function { name: GC_MALLOC.to_string(), params: vec![Value::Param(0, i64_ty)], return_type: ptr_ty, blocks: Vec::new() }
    }

    fn extern_stub(&mut self, sig: &FunctionSignature) -> Function {
        let params = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| Value::Param(i as u32, self.mir_param_type(p, false)))
            .collect();
        Function { name: sig.name.clone(), params, return_type: sig.return_type, blocks: Vec::new() }
    }

    fn is_aggregate(&self, ty: TypeId) -> bool {
        matches!(self.types.get(ty), Type::Struct(_) | Type::Array(_, _))
    }

    /// The parameter's MIR-visible type: a `self` receiver is already a
    /// pointer to its owning struct; every other `ref`/`mut ref` parameter or
    /// aggregate-by-value parameter is passed as a pointer to its declared
    /// type; everything else passes by value.
    fn mir_param_type(&mut self, param: &FunctionParameter, is_self: bool) -> TypeId {
        if is_self {
            return param.type_id;
        }
        if param.mode != ParamMode::Value || self.is_aggregate(param.type_id) {
            self.types.get_pointer(param.type_id)
        } else {
            param.type_id
        }
    }

    fn lower_function(&mut self, f: &HirFunction, sig: &FunctionSignature, mir_name: String) -> Function {
        self.array_dims.clear();
        let mut mir_params = Vec::with_capacity(sig.params.len());
        for (i, p) in sig.params.iter().enumerate() {
            let is_self = p.name == "self";
            mir_params.push(Value::Param(i as u32, self.mir_param_type(p, is_self)));
        }

        let mut builder = MirBuilder::new(mir_name, mir_params.clone(), sig.return_type);
        let mut scopes: Vec<HashMap<String, Binding>> = vec![HashMap::new()];
        let mut loop_stack: Vec<LoopFrame> = Vec::new();

        for (i, p) in sig.params.iter().enumerate() {
            let is_self = p.name == "self";
            let value = mir_params[i].clone();
            if is_self {
                scopes.last_mut().unwrap().insert(p.name.clone(), Binding::Slot(value));
                continue;
            }
            if p.mode != ParamMode::Value || self.is_aggregate(p.type_id) {
                // Already arrives as a pointer; use it directly as the slot.
                scopes.last_mut().unwrap().insert(p.name.clone(), Binding::Slot(value));
            } else {
                let slot_ty = self.types.get_pointer(p.type_id);
                let slot = builder.emit(Opcode::Alloca, Some(slot_ty), vec![]).unwrap();
                builder.emit(Opcode::Store, None, vec![slot.clone(), value]);
                scopes.last_mut().unwrap().insert(p.name.clone(), Binding::Slot(slot));
            }
        }

        for stmt in &f.body {
            self.lower_stmt(stmt, &mut builder, &mut scopes, &mut loop_stack);
        }

        let current = builder.current_block();
        if !builder.is_terminated(current) {
            let void = self.types.get_primitive(PrimitiveKind::Void);
            if sig.return_type == void {
                builder.terminate(Terminator::Return(None));
            } else {
                self.diagnostics.error_at(
                    format!("function '{}' does not return a value on every path", f.name),
                    f.span,
                );
                builder.terminate(Terminator::Unreachable);
            }
        }

        builder.finish()
    }

    fn lower_block(
        &mut self,
        stmts: &[HirStmt],
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        loop_stack: &mut Vec<LoopFrame>,
    ) {
        scopes.push(HashMap::new());
        for stmt in stmts {
            self.lower_stmt(stmt, builder, scopes, loop_stack);
        }
        scopes.pop();
    }

    fn lower_stmt(
        &mut self,
        stmt: &HirStmt,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        loop_stack: &mut Vec<LoopFrame>,
    ) {
        match stmt {
            HirStmt::VarDecl { name, is_mut, init, dimensions, span, .. } => {
                let var_ty = match init {
                    Some(e) => self.expr_type(e.id),
                    None => self.types.get_primitive(PrimitiveKind::Void),
                };
                if dimensions.len() > 1 {
                    self.array_dims.insert(name.clone(), dimensions.clone());
                }
                let aggregate = self.is_aggregate(var_ty);
                if *is_mut || aggregate || init.is_none() {
                    let slot_ty = self.types.get_pointer(var_ty);
                    let slot = builder.emit(Opcode::Alloca, Some(slot_ty), vec![]).unwrap();
                    if let Some(init_expr) = init {
                        let value = self.lower_expr(init_expr, builder, scopes, *span);
                        let converted = self.convert_value(value, var_ty, builder);
                        builder.emit(Opcode::Store, None, vec![slot.clone(), converted]);
                    }
                    scopes.last_mut().unwrap().insert(name.clone(), Binding::Slot(slot));
                } else {
                    let value = self.lower_expr(init.as_ref().unwrap(), builder, scopes, *span);
                    let converted = self.convert_value(value, var_ty, builder);
                    scopes.last_mut().unwrap().insert(name.clone(), Binding::Direct(converted));
                }
            }
            HirStmt::ExprStmt(e) => {
                self.lower_expr(e, builder, scopes, e.span);
            }
            HirStmt::Return(value, span) => {
                let ret = value.as_ref().map(|e| self.lower_expr(e, builder, scopes, *span));
                builder.terminate(Terminator::Return(ret));
            }
            HirStmt::If { cond, then_body, else_body, span } => {
                self.lower_if(cond, then_body, else_body, *span, builder, scopes, loop_stack);
            }
            HirStmt::While { cond, body, increment, span } => {
                self.lower_while(cond, body, increment.as_ref(), *span, builder, scopes, loop_stack);
            }
            HirStmt::Block(stmts) => {
                self.lower_block(stmts, builder, scopes, loop_stack);
            }
            HirStmt::Break(_) => {
                if let Some(frame) = loop_stack.last() {
                    builder.branch_to(frame.break_label.clone());
                }
            }
            HirStmt::Continue(_) => {
                if let Some(frame) = loop_stack.last() {
                    builder.branch_to(frame.continue_label.clone());
                }
            }
        }
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_body: &[HirStmt],
        else_body: &[HirStmt],
        span: Span,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        loop_stack: &mut Vec<LoopFrame>,
    ) {
        let cond_value = self.lower_expr(cond, builder, scopes, span);
        let then_label = builder.fresh_label("if.then");
        let has_else = !else_body.is_empty();
        let else_label = if has_else { builder.fresh_label("if.else") } else { builder.fresh_label("if.merge") };
        let merge_label = if has_else { builder.fresh_label("if.merge") } else { else_label.clone() };

        builder.terminate(Terminator::CondBranch { cond: cond_value, then_label: then_label.clone(), else_label: else_label.clone() });

        let then_block = builder.new_block(then_label);
        builder.switch_to(then_block);
        self.lower_block(then_body, builder, scopes, loop_stack);
        let then_terminated = builder.is_terminated(builder.current_block());
        if !then_terminated {
            builder.branch_to(merge_label.clone());
        }

        let else_terminated = if has_else {
            let else_block = builder.new_block(else_label);
            builder.switch_to(else_block);
            self.lower_block(else_body, builder, scopes, loop_stack);
            let terminated = builder.is_terminated(builder.current_block());
            if !terminated {
                builder.branch_to(merge_label.clone());
            }
            terminated
        } else {
            false
        };

        if then_terminated && else_terminated {
            // No reachable edge enters the merge block; it stays empty and
            // unreachable rather than becoming a dead fallthrough target.
            let merge_block = builder.new_block(merge_label);
            builder.switch_to(merge_block);
            builder.terminate(Terminator::Unreachable);
        } else {
            let merge_block = builder.new_block(merge_label);
            builder.switch_to(merge_block);
        }
    }

    fn lower_while(
        &mut self,
        cond: &Expr,
        body: &[HirStmt],
        increment: Option<&Expr>,
        span: Span,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        loop_stack: &mut Vec<LoopFrame>,
    ) {
        let cond_label = builder.fresh_label("while.cond");
        let body_label = builder.fresh_label("while.body");
        let end_label = builder.fresh_label("while.end");
        let incr_label = increment.map(|_| builder.fresh_label("while.incr"));
        let continue_label = incr_label.clone().unwrap_or_else(|| cond_label.clone());

        builder.branch_to(cond_label.clone());

        let cond_block = builder.new_block(cond_label.clone());
        builder.switch_to(cond_block);
        let cond_value = self.lower_expr(cond, builder, scopes, span);
        builder.terminate(Terminator::CondBranch { cond: cond_value, then_label: body_label.clone(), else_label: end_label.clone() });

        let body_block = builder.new_block(body_label);
        builder.switch_to(body_block);
        loop_stack.push(LoopFrame { break_label: end_label.clone(), continue_label: continue_label.clone() });
        self.lower_block(body, builder, scopes, loop_stack);
        loop_stack.pop();
        if !builder.is_terminated(builder.current_block()) {
            builder.branch_to(continue_label.clone());
        }

        if let (Some(incr_label), Some(incr_expr)) = (incr_label, increment) {
            let incr_block = builder.new_block(incr_label);
            builder.switch_to(incr_block);
            self.lower_expr(incr_expr, builder, scopes, span);
            builder.branch_to(cond_label);
        }

        let end_block = builder.new_block(end_label);
        builder.switch_to(end_block);
    }

    fn expr_type(&self, id: NodeId) -> TypeId {
        self.expr_types.get(&id).copied().unwrap_or_else(|| {
            // Should always be present for a well-typed program; fall back to
            // void rather than panicking on a malformed one.
            0
        })
    }

    fn is_signed_or_float(&self, ty: TypeId) -> (bool, bool) {
        match self.types.get(ty) {
            Type::Primitive(k) => (k.is_signed(), k.is_float()),
            _ => (true, false),
        }
    }

    fn lower_expr(
        &mut self,
        expr: &Expr,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        let ty = self.expr_type(expr.id);
        match &*expr.kind {
            ExprKind::IntLiteral(v) => Value::Constant(Constant::Int(*v), ty),
            ExprKind::FloatLiteral(v) => Value::Constant(Constant::Float(*v), ty),
            ExprKind::StringLiteral(s) => Value::Constant(Constant::Str(s.clone()), ty),
            ExprKind::BoolLiteral(b) => Value::Constant(Constant::Bool(*b), ty),
            ExprKind::NullLiteral => Value::Constant(Constant::Null, ty),

            ExprKind::Variable(name) => match self.lookup(scopes, name) {
                Some(Binding::Direct(v)) => v,
                Some(Binding::Slot(slot)) => builder.emit(Opcode::Load, Some(ty), vec![slot]).unwrap(),
                None => Value::Constant(Constant::Null, ty),
            },

            ExprKind::Grouping(inner) => self.lower_expr(inner, builder, scopes, span),

            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, ty, builder, scopes, span),
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, ty, builder, scopes, span),

            ExprKind::Call { callee, args } => self.lower_call(callee, args, ty, builder, scopes, span),
            ExprKind::StaticMethodCall { type_name, method, args } => {
                let target = format!("{}__{}", type_name, method);
                let sig_key = format!("{}::{}", type_name, method);
                self.lower_method_call(&target, &sig_key, None, args, ty, builder, scopes, span)
            }
            ExprKind::InstanceMethodCall { receiver, method, args } => {
                let struct_name = self.struct_name_of(self.expr_type(receiver.id));
                let target = struct_name.as_ref().map(|n| format!("{}__{}", n, method));
                let sig_key = struct_name.map(|n| format!("{}::{}", n, method));
                let receiver_ptr = self.lower_lvalue_ptr(receiver, builder, scopes, span);
                match (target, sig_key) {
                    (Some(target), Some(sig_key)) => {
                        self.lower_method_call(&target, &sig_key, Some(receiver_ptr), args, ty, builder, scopes, span)
                    }
                    _ => Value::Constant(Constant::Null, ty),
                }
            }

            ExprKind::FieldAccess { .. } => {
                let ptr = self.lower_lvalue_ptr(expr, builder, scopes, span);
                builder.emit(Opcode::Load, Some(ty), vec![ptr]).unwrap()
            }
            ExprKind::Index { .. } => {
                let ptr = self.lower_lvalue_ptr(expr, builder, scopes, span);
                builder.emit(Opcode::Load, Some(ty), vec![ptr]).unwrap()
            }

            ExprKind::ArrayLiteral(kind) => self.lower_array_literal(kind, ty, builder, scopes, span),
            ExprKind::StructLiteral { fields, .. } => self.lower_struct_literal(fields, ty, builder, scopes, span),

            ExprKind::Assign { target, value } => {
                let val = self.lower_expr(value, builder, scopes, span);
                let target_ty = self.expr_type(target.id);
                let converted = self.convert_value(val, target_ty, builder);
                self.store_to_lvalue(target, converted.clone(), builder, scopes, span);
                converted
            }

            // Desugared away before HIR; never reached by a well-formed program.
            ExprKind::CompoundAssign { .. } | ExprKind::Increment(_) | ExprKind::Decrement(_) | ExprKind::Range { .. } => {
                Value::Constant(Constant::Null, ty)
            }
        }
    }

    fn lookup(&self, scopes: &[HashMap<String, Binding>], name: &str) -> Option<Binding> {
        scopes.iter().rev().find_map(|s| s.get(name).cloned())
    }

    fn struct_name_of(&self, ty: TypeId) -> Option<String> {
        match self.types.get(ty) {
            Type::Struct(s) => Some(s.name.clone()),
            Type::Pointer(inner) => self.struct_name_of(*inner),
            _ => None,
        }
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        result_ty: TypeId,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        match op {
            UnaryOp::Pos => self.lower_expr(operand, builder, scopes, span),
            UnaryOp::AddrOf => self.lower_lvalue_ptr(operand, builder, scopes, span),
            UnaryOp::Not => {
                let v = self.lower_expr(operand, builder, scopes, span);
                builder.emit(Opcode::Not, Some(result_ty), vec![v]).unwrap()
            }
            UnaryOp::Neg => {
                let v = self.lower_expr(operand, builder, scopes, span);
                let (_, is_float) = self.is_signed_or_float(result_ty);
                if is_float {
                    let zero = Value::Constant(Constant::Float(0.0), result_ty);
                    builder.emit(Opcode::FSub, Some(result_ty), vec![zero, v]).unwrap()
                } else {
                    let zero = Value::Constant(Constant::Int(0), result_ty);
                    builder.emit(Opcode::ISub, Some(result_ty), vec![zero, v]).unwrap()
                }
            }
        }
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        result_ty: TypeId,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.lower_expr(left, builder, scopes, span);
            let r = self.lower_expr(right, builder, scopes, span);
            let opcode = if op == BinaryOp::And { Opcode::And } else { Opcode::Or };
            return builder.emit(opcode, Some(result_ty), vec![l, r]).unwrap();
        }

        let operand_ty = self.expr_type(left.id);
        let (is_signed, is_float) = self.is_signed_or_float(operand_ty);
        let l = self.lower_expr(left, builder, scopes, span);
        let r = self.lower_expr(right, builder, scopes, span);

        let opcode = match op {
            BinaryOp::Add => if is_float { Opcode::FAdd } else { Opcode::IAdd },
            BinaryOp::Sub => if is_float { Opcode::FSub } else { Opcode::ISub },
            BinaryOp::Mul => if is_float { Opcode::FMul } else { Opcode::IMul },
            BinaryOp::Div => if is_float { Opcode::FDiv } else if is_signed { Opcode::IDiv } else { Opcode::UDiv },
            BinaryOp::Mod => if is_signed { Opcode::IRem } else { Opcode::URem },
            BinaryOp::Eq => if is_float { Opcode::FCmpOeq } else { Opcode::ICmpEq },
            BinaryOp::Ne => if is_float { Opcode::FCmpOne } else { Opcode::ICmpNe },
            BinaryOp::Lt => if is_float { Opcode::FCmpOlt } else if is_signed { Opcode::ICmpSlt } else { Opcode::ICmpUlt },
            BinaryOp::Le => if is_float { Opcode::FCmpOle } else if is_signed { Opcode::ICmpSle } else { Opcode::ICmpUle },
            BinaryOp::Gt => if is_float { Opcode::FCmpOgt } else if is_signed { Opcode::ICmpSgt } else { Opcode::ICmpUgt },
            BinaryOp::Ge => if is_float { Opcode::FCmpOge } else if is_signed { Opcode::ICmpSge } else { Opcode::ICmpUge },
            BinaryOp::And | BinaryOp::Or => unreachable!(),
        };
        builder.emit(opcode, Some(result_ty), vec![l, r]).unwrap()
    }

    fn lower_call(
        &mut self,
        callee: &str,
        args: &[Expr],
        result_ty: TypeId,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        // An array's length is fixed at its declared size, so `len` never
        // reaches the runtime as a call; it folds to the size MIR already
        // knows from the argument's type.
        if callee == "len" {
            if let [arg] = args {
                let arg_ty = self.expr_type(arg.id);
                self.lower_expr(arg, builder, scopes, span);
                let size = match self.types.get(arg_ty) {
                    Type::Array(_, n) => Some(*n),
                    _ => None,
                };
                if let Some(n) = size {
                    let i32_ty = self.types.get_primitive(PrimitiveKind::I32);
                    return Value::Constant(Constant::Int(n as i64), i32_ty);
                }
            }
        }
        let sig = self.functions.get(callee).cloned();
        let operands = self.lower_args(&sig, args, builder, scopes, span);
        let result = if result_ty == self.types.get_primitive(PrimitiveKind::Void) { None } else { Some(result_ty) };
        let value = builder.emit(Opcode::Call, result, operands);
        let block = builder.current_block();
        if let Some(instr) = builder_last_instruction(builder, block) {
            instr.call_target = Some(callee.to_string());
        }
        value.unwrap_or(Value::Constant(Constant::Null, result_ty))
    }

    fn lower_method_call(
        &mut self,
        target: &str,
        sig_key: &str,
        receiver: Option<Value>,
        args: &[Expr],
        result_ty: TypeId,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        let sig = self.functions.get(sig_key).cloned();
        let mut operands = Vec::new();
        if let Some(r) = receiver {
            operands.push(r);
        }
        let arg_params = sig.as_ref().map(|s| {
            let skip = if s.has_self { 1 } else { 0 };
            s.params.iter().skip(skip).cloned().collect::<Vec<_>>()
        });
        operands.extend(self.lower_args_for(arg_params.as_deref(), args, builder, scopes, span));

        let result = if result_ty == self.types.get_primitive(PrimitiveKind::Void) { None } else { Some(result_ty) };
        let value = builder.emit(Opcode::Call, result, operands);
        let block = builder.current_block();
        if let Some(instr) = builder_last_instruction(builder, block) {
            instr.call_target = Some(target.to_string());
        }
        value.unwrap_or(Value::Constant(Constant::Null, result_ty))
    }

    fn lower_args(
        &mut self,
        sig: &Option<FunctionSignature>,
        args: &[Expr],
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Vec<Value> {
        self.lower_args_for(sig.as_ref().map(|s| s.params.as_slice()), args, builder, scopes, span)
    }

    /// Lowers a call's arguments, threading each through a pointer instead of
    /// a loaded value when the declared parameter is `ref`/`mut ref` or an
    /// aggregate, per the callee's own parameter modes.
    fn lower_args_for(
        &mut self,
        params: Option<&[FunctionParameter]>,
        args: &[Expr],
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Vec<Value> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| {
                let param = params.and_then(|p| p.get(i));
                let by_ref = param.map(|p| p.mode != ParamMode::Value).unwrap_or(false);
                let aggregate = param.map(|p| self.is_aggregate(p.type_id)).unwrap_or(false);
                if by_ref || aggregate {
                    self.lower_lvalue_ptr(arg, builder, scopes, span)
                } else {
                    let value = self.lower_expr(arg, builder, scopes, span);
                    match param {
                        Some(p) => self.convert_value(value, p.type_id, builder),
                        None => value,
                    }
                }
            })
            .collect()
    }

    fn lower_array_literal(
        &mut self,
        kind: &ArrayLiteralKind,
        array_ty: TypeId,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        let (elem_ty, count) = match self.types.get(array_ty) {
            Type::Array(e, n) => (*e, *n),
            _ => (array_ty, 0),
        };
        let elements: Vec<Value> = match kind {
            ArrayLiteralKind::Elements(es) => es.iter().map(|e| self.lower_expr(e, builder, scopes, span)).collect(),
            ArrayLiteralKind::Repeat { value, count } => {
                let v = self.lower_expr(value, builder, scopes, span);
                (0..*count).map(|_| v.clone()).collect()
            }
        };

        let ptr = self.heap_alloc(array_ty, builder);
        let i64_ty = self.types.get_primitive(PrimitiveKind::I64);
        for (i, value) in elements.into_iter().enumerate() {
            let idx = Value::Constant(Constant::Int(i as i64), i64_ty);
            let elem_ptr_ty = self.types.get_pointer(elem_ty);
            let elem_ptr = builder.emit(Opcode::GetElementPtr, Some(elem_ptr_ty), vec![ptr.clone(), idx]).unwrap();
            let converted = self.convert_value(value, elem_ty, builder);
            builder.emit(Opcode::Store, None, vec![elem_ptr, converted]);
        }
        let _ = count;
        ptr
    }

    fn lower_struct_literal(
        &mut self,
        fields: &[(String, Expr)],
        struct_ty: TypeId,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        let ptr = self.heap_alloc(struct_ty, builder);
        let field_defs: Vec<(String, TypeId)> = match self.types.struct_type(struct_ty) {
            Some(s) => s.fields.clone(),
            None => Vec::new(),
        };
        for (name, value_expr) in fields {
            let index = field_defs.iter().position(|(n, _)| n == name).unwrap_or(0);
            let field_ty = field_defs.get(index).map(|(_, t)| *t).unwrap_or(struct_ty);
            let value = self.lower_expr(value_expr, builder, scopes, span);
            let converted = self.convert_value(value, field_ty, builder);
            let field_ptr_ty = self.types.get_pointer(field_ty);
            let mut instr = Instruction::new(Opcode::GetFieldPtr, Some(Value::Local(0, field_ptr_ty)), vec![ptr.clone()]);
            instr.field_index = Some(index);
            let field_ptr = builder.emit_with_fresh_result(instr, field_ptr_ty);
            builder.emit(Opcode::Store, None, vec![field_ptr, converted]);
        }
        ptr
    }

    fn heap_alloc(&mut self, ty: TypeId, builder: &mut MirBuilder) -> Value {
        let i64_ty = self.types.get_primitive(PrimitiveKind::I64);
        let size = self.size_of(ty) as i64;
        let size_value = Value::Constant(Constant::Int(size), i64_ty);
        let opaque = self.types.get_opaque();
        let opaque_ptr_ty = self.types.get_pointer(opaque);
        let mut instr = Instruction::new(Opcode::Call, Some(Value::Local(0, opaque_ptr_ty)), vec![size_value]);
        instr.call_target = Some(GC_MALLOC.to_string());
        let raw = builder.emit_with_fresh_result(instr, opaque_ptr_ty);
        let target_ptr_ty = self.types.get_pointer(ty);
        builder.emit(Opcode::Bitcast, Some(target_ptr_ty), vec![raw]).unwrap()
    }

    /// The number of bytes a value of `ty` occupies, for the size argument to
    /// the allocator. Every pointer-sized primitive and `ptr` is 8 bytes on
    /// the target this program is eventually handed off to.
    fn size_of(&self, ty: TypeId) -> u32 {
        match self.types.get(ty) {
            Type::Primitive(PrimitiveKind::I8) | Type::Primitive(PrimitiveKind::U8) => 1,
            Type::Primitive(PrimitiveKind::I16) | Type::Primitive(PrimitiveKind::U16) => 2,
            Type::Primitive(PrimitiveKind::I32) | Type::Primitive(PrimitiveKind::U32) | Type::Primitive(PrimitiveKind::F32) => 4,
            Type::Primitive(PrimitiveKind::I64)
            | Type::Primitive(PrimitiveKind::U64)
            | Type::Primitive(PrimitiveKind::F64)
            | Type::Primitive(PrimitiveKind::String) => 8,
            Type::Primitive(PrimitiveKind::Bool) => 1,
            Type::Primitive(PrimitiveKind::Void) => 0,
            Type::Pointer(_) => 8,
            Type::Array(elem, n) => self.size_of(*elem) * n,
            Type::Struct(s) => s.fields.iter().map(|(_, t)| self.size_of(*t)).sum(),
            Type::Generic(_, _) | Type::Opaque | Type::Unresolved(_) => 8,
        }
    }

    /// Unwraps a (possibly nested) `Index` expression into its innermost
    /// base and the ordered list of index expressions, outermost dimension
    /// first. `m[i][j]` parses as `Index(Index(m, i), j)`; this returns
    /// `(m, [i, j])`.
    fn index_chain(expr: &Expr) -> (&Expr, Vec<&Expr>) {
        match &*expr.kind {
            ExprKind::Index { array, index } => {
                let (root, mut indices) = Self::index_chain(array);
                indices.push(index);
                (root, indices)
            }
            _ => (expr, Vec::new()),
        }
    }

    /// Row-major flattened offset for a chain of indices against the
    /// dimension vector recorded when `root` was declared, so `m[i][j]`
    /// reaches the same cell as a single-dimension `m[i*cols + j]` would.
    /// A single index, or a root with no recorded dimensions, degrades to
    /// the plain index value (every operand is still widened to `I64`, the
    /// type `GetElementPtr` expects).
    fn flatten_index_chain(
        &mut self,
        root: &Expr,
        index_exprs: &[&Expr],
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        let i64_ty = self.types.get_primitive(PrimitiveKind::I64);
        if index_exprs.len() == 1 {
            let idx = self.lower_expr(index_exprs[0], builder, scopes, span);
            return self.convert_value(idx, i64_ty, builder);
        }

        let dims = match &*root.kind {
            ExprKind::Variable(name) => self.array_dims.get(name).cloned(),
            _ => None,
        };
        let strides: Vec<u32> = match &dims {
            Some(dims) if dims.len() == index_exprs.len() => {
                let mut strides = vec![1u32; dims.len()];
                for k in (0..dims.len() - 1).rev() {
                    strides[k] = strides[k + 1] * dims[k + 1];
                }
                strides
            }
            // No recorded shape (or a chain deeper than the declared
            // dimensions) to weight by; fall back to treating every level
            // as stride 1 rather than guessing at a shape we don't have.
            _ => vec![1u32; index_exprs.len()],
        };

        let mut total: Option<Value> = None;
        for (idx_expr, stride) in index_exprs.iter().zip(strides.iter()) {
            let idx = self.lower_expr(*idx_expr, builder, scopes, span);
            let idx = self.convert_value(idx, i64_ty, builder);
            let term = if *stride == 1 {
                idx
            } else {
                let stride_value = Value::Constant(Constant::Int(*stride as i64), i64_ty);
                builder.emit(Opcode::IMul, Some(i64_ty), vec![idx, stride_value]).unwrap()
            };
            total = Some(match total {
                None => term,
                Some(acc) => builder.emit(Opcode::IAdd, Some(i64_ty), vec![acc, term]).unwrap(),
            });
        }
        total.unwrap()
    }

    /// Produces a pointer to the storage an lvalue expression denotes,
    /// without loading it. Used for `=`'s target, `&`, and by-reference
    /// call arguments.
    fn lower_lvalue_ptr(
        &mut self,
        expr: &Expr,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) -> Value {
        match &*expr.kind {
            ExprKind::Variable(name) => match self.lookup(scopes, name) {
                Some(Binding::Slot(slot)) => slot,
                Some(Binding::Direct(v)) => v,
                None => Value::Constant(Constant::Null, self.expr_type(expr.id)),
            },
            ExprKind::Grouping(inner) => self.lower_lvalue_ptr(inner, builder, scopes, span),
            ExprKind::FieldAccess { object, .. } => {
                let info = self.field_access.get(&expr.id).cloned();
                let base = self.lower_lvalue_ptr(object, builder, scopes, span);
                let field_ty = self.expr_type(expr.id);
                let field_ptr_ty = self.types.get_pointer(field_ty);
                let mut instr = Instruction::new(Opcode::GetFieldPtr, Some(Value::Local(0, field_ptr_ty)), vec![base]);
                instr.field_index = info.map(|i| i.field_index);
                builder.emit_with_fresh_result(instr, field_ptr_ty)
            }
            ExprKind::Index { .. } => {
                let (root, index_exprs) = Self::index_chain(expr);
                let base = self.lower_lvalue_ptr(root, builder, scopes, span);
                let flat = self.flatten_index_chain(root, &index_exprs, builder, scopes, span);
                let elem_ty = self.expr_type(expr.id);
                let elem_ptr_ty = self.types.get_pointer(elem_ty);
                builder.emit(Opcode::GetElementPtr, Some(elem_ptr_ty), vec![base, flat]).unwrap()
            }
            _ => self.lower_expr(expr, builder, scopes, span),
        }
    }

    fn store_to_lvalue(
        &mut self,
        target: &Expr,
        value: Value,
        builder: &mut MirBuilder,
        scopes: &mut Vec<HashMap<String, Binding>>,
        span: Span,
    ) {
        match &*target.kind {
            ExprKind::Variable(name) => {
                let binding = self.lookup(scopes, name);
                match binding {
                    Some(Binding::Slot(slot)) => {
                        builder.emit(Opcode::Store, None, vec![slot, value]);
                    }
                    Some(Binding::Direct(_)) => {
                        scopes.iter_mut().rev().find(|s| s.contains_key(name)).map(|s| s.insert(name.clone(), Binding::Direct(value)));
                    }
                    None => {}
                }
            }
            _ => {
                let ptr = self.lower_lvalue_ptr(target, builder, scopes, span);
                builder.emit(Opcode::Store, None, vec![ptr, value]);
            }
        }
    }

    /// Inserts the integer/float conversion opcode `value`'s type needs to
    /// become `target`, or returns it unchanged if no conversion applies.
    fn convert_value(&mut self, value: Value, target: TypeId, builder: &mut MirBuilder) -> Value {
        let source = value.type_id();
        if source == target {
            return value;
        }
        let (src_kind, dst_kind) = match (self.types.get(source), self.types.get(target)) {
            (Type::Primitive(a), Type::Primitive(b)) => (*a, *b),
            _ => return value,
        };

        if src_kind.is_integer() && dst_kind.is_integer() {
            let src_bits = primitive_bits(src_kind);
            let dst_bits = primitive_bits(dst_kind);
            let opcode = if dst_bits < src_bits {
                Opcode::Trunc
            } else if dst_bits > src_bits {
                if src_kind.is_signed() { Opcode::SExt } else { Opcode::ZExt }
            } else {
                return value;
            };
            builder.emit(opcode, Some(target), vec![value]).unwrap()
        } else if src_kind.is_float() && dst_kind.is_float() {
            let opcode = if primitive_bits(dst_kind) < primitive_bits(src_kind) { Opcode::FPTrunc } else { Opcode::FPExt };
            builder.emit(opcode, Some(target), vec![value]).unwrap()
        } else if src_kind.is_integer() && dst_kind.is_float() {
            let opcode = if src_kind.is_signed() { Opcode::SIToFP } else { Opcode::UIToFP };
            builder.emit(opcode, Some(target), vec![value]).unwrap()
        } else if src_kind.is_float() && dst_kind.is_integer() {
            let opcode = if dst_kind.is_signed() { Opcode::FPToSI } else { Opcode::FPToUI };
            builder.emit(opcode, Some(target), vec![value]).unwrap()
        } else {
            value
        }
    }
}

fn primitive_bits(kind: PrimitiveKind) -> u32 {
    match kind {
        PrimitiveKind::I8 | PrimitiveKind::U8 => 8,
        PrimitiveKind::I16 | PrimitiveKind::U16 => 16,
        PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 32,
        PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 64,
        PrimitiveKind::Bool => 1,
        PrimitiveKind::Void | PrimitiveKind::String => 0,
    }
}

fn builder_last_instruction(builder: &mut MirBuilder, block: usize) -> Option<&mut Instruction> {
    builder.block_mut(block).instructions.last_mut()
}
