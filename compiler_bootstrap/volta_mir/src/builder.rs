//! Incremental construction of a single [`Function`]'s basic blocks.

use hashbrown::HashMap;

use crate::ir::{BasicBlock, Function, Instruction, Opcode, Terminator, Value, ValueId};
use volta_types::TypeId;

pub struct MirBuilder {
    name: String,
    params: Vec<Value>,
    return_type: TypeId,
    blocks: Vec<BasicBlock>,
    current: usize,
    next_value: ValueId,
    label_counters: HashMap<String, u32>,
}

impl MirBuilder {
    pub fn new(name: impl Into<String>, params: Vec<Value>, return_type: TypeId) -> Self {
        let next_value = params.len() as ValueId;
        Self {
            name: name.into(),
            params,
            return_type,
            blocks: vec![BasicBlock::new("entry")],
            current: 0,
            next_value,
            label_counters: HashMap::new(),
        }
    }

    pub fn fresh_value(&mut self, ty: TypeId) -> Value {
        let id = self.next_value;
        self.next_value += 1;
        Value::Local(id, ty)
    }

    /// A monotonically increasing, prefix-scoped block label, e.g.
    /// `if.then.0`, `if.then.1`.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        let counter = self.label_counters.entry(prefix.to_string()).or_insert(0);
        let label = format!("{}.{}", prefix, counter);
        *counter += 1;
        label
    }

    pub fn new_block(&mut self, label: impl Into<String>) -> usize {
        self.blocks.push(BasicBlock::new(label));
        self.blocks.len() - 1
    }

    pub fn switch_to(&mut self, block: usize) {
        self.current = block;
    }

    pub fn current_block(&self) -> usize {
        self.current
    }

    pub fn is_terminated(&self, block: usize) -> bool {
        self.blocks[block].is_terminated()
    }

    pub fn emit(&mut self, opcode: Opcode, result_ty: Option<TypeId>, operands: Vec<Value>) -> Option<Value> {
        let result = result_ty.map(|t| self.fresh_value(t));
        self.blocks[self.current].instructions.push(Instruction::new(opcode, result.clone(), operands));
        result
    }

    pub fn emit_instruction(&mut self, instruction: Instruction) -> Option<Value> {
        let result = instruction.result.clone();
        self.blocks[self.current].instructions.push(instruction);
        result
    }

    /// Pushes `instruction` after replacing its placeholder result with a
    /// freshly allocated value of `result_ty`. Lets callers build up an
    /// `Instruction`'s non-result fields (`field_index`, `call_target`)
    /// before the value id exists.
    pub fn emit_with_fresh_result(&mut self, mut instruction: Instruction, result_ty: TypeId) -> Value {
        let result = self.fresh_value(result_ty);
        instruction.result = Some(result.clone());
        self.blocks[self.current].instructions.push(instruction);
        result
    }

    pub fn block_mut(&mut self, index: usize) -> &mut BasicBlock {
        &mut self.blocks[index]
    }

    /// Sets the current block's terminator, unless it already has one
    /// (statements after an unconditional jump are dead and must not emit a
    /// second terminator).
    pub fn terminate(&mut self, terminator: Terminator) {
        if !self.blocks[self.current].is_terminated() {
            self.blocks[self.current].terminator = Some(terminator);
        }
    }

    pub fn branch_to(&mut self, label: impl Into<String>) {
        self.terminate(Terminator::Branch(label.into()));
    }

    pub fn finish(self) -> Function {
        Function { name: self.name, params: self.params, return_type: self.return_type, blocks: self.blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Constant;

    #[test]
    fn fresh_value_ids_start_after_the_last_parameter() {
        let params = vec![Value::Param(0, 1), Value::Param(1, 1)];
        let mut builder = MirBuilder::new("f", params, 1);
        match builder.fresh_value(1) {
            Value::Local(id, _) => assert_eq!(id, 2),
            other => panic!("expected a Local value, got {other:?}"),
        }
    }

    #[test]
    fn fresh_label_counts_separately_per_prefix() {
        let mut builder = MirBuilder::new("f", vec![], 1);
        assert_eq!(builder.fresh_label("if.then"), "if.then.0");
        assert_eq!(builder.fresh_label("if.then"), "if.then.1");
        assert_eq!(builder.fresh_label("if.else"), "if.else.0");
    }

    #[test]
    fn terminate_does_not_overwrite_an_existing_terminator() {
        let mut builder = MirBuilder::new("f", vec![], 1);
        builder.branch_to("a");
        builder.terminate(Terminator::Return(None));
        let f = builder.finish();
        assert!(matches!(f.blocks[0].terminator, Some(Terminator::Branch(ref l)) if l == "a"));
    }

    #[test]
    fn emit_with_fresh_result_allocates_after_setting_non_result_fields() {
        let mut builder = MirBuilder::new("f", vec![], 1);
        let mut instr = Instruction::new(Opcode::Call, None, vec![Value::Constant(Constant::Int(1), 1)]);
        instr.call_target = Some("len".to_string());
        let result = builder.emit_with_fresh_result(instr, 1);
        let f = builder.finish();
        assert_eq!(f.blocks[0].instructions[0].call_target.as_deref(), Some("len"));
        assert_eq!(f.blocks[0].instructions[0].result, Some(result));
    }

    #[test]
    fn finish_preserves_params_and_return_type() {
        let params = vec![Value::Param(0, 3)];
        let builder = MirBuilder::new("add_one", params.clone(), 3);
        let f = builder.finish();
        assert_eq!(f.name, "add_one");
        assert_eq!(f.params, params);
        assert_eq!(f.return_type, 3);
    }
}
