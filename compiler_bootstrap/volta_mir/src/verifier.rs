//! Structural checks an MIR program must satisfy before it is handed to a
//! backend: unique block labels, a single definition per SSA value, every
//! operand defined before its use, and a well-formed terminator in every
//! reachable block.

use hashbrown::HashSet;

use volta_common::diagnostics::Diagnostics;
use volta_common::{Position, Span};

use crate::ir::{Function, Program, Terminator, Value};

fn no_span() -> Span {
    Span::single(Position::start(), 0)
}

pub fn verify_program(program: &Program, diagnostics: &mut Diagnostics) -> bool {
    let before = diagnostics.error_count();
    for function in &program.functions {
        verify_function(function, diagnostics);
    }
    diagnostics.error_count() == before
}

fn verify_function(function: &Function, diagnostics: &mut Diagnostics) {
    if function.is_extern() {
        return;
    }

    let mut labels = HashSet::new();
    for (i, block) in function.blocks.iter().enumerate() {
        if !labels.insert(block.label.clone()) {
            diagnostics.error_at(format!("function '{}' has a duplicate block label '{}'", function.name, block.label), no_span());
        }
        if i == 0 && block.label != "entry" {
            diagnostics.warning_at(format!("function '{}' does not open with an 'entry' block", function.name), no_span());
        }
    }

    // `Value::Param` operands need no check (always valid); only `Local`
    // results and uses participate in the single-definition / defined-before-
    // use tracking below.
    let mut defined = HashSet::new();

    for block in &function.blocks {
        for instr in &block.instructions {
            for operand in &instr.operands {
                if let Value::Local(id, _) = operand {
                    if !defined.contains(id) {
                        diagnostics.error_at(
                            format!("function '{}' uses value %{} in block '{}' before it is defined", function.name, id, block.label),
                            no_span(),
                        );
                    }
                }
            }
            if let Some(Value::Local(id, _)) = &instr.result {
                if defined.contains(id) {
                    diagnostics.error_at(
                        format!("function '{}' redefines value %{} in block '{}'", function.name, id, block.label),
                        no_span(),
                    );
                }
                defined.insert(*id);
            }
        }

        match &block.terminator {
            None => {
                diagnostics.error_at(format!("block '{}' in function '{}' has no terminator", block.label, function.name), no_span());
            }
            Some(term) => verify_terminator(function, block.label.as_str(), term, &labels, diagnostics),
        }
    }
}

fn verify_terminator(function: &Function, block_label: &str, terminator: &Terminator, labels: &HashSet<String>, diagnostics: &mut Diagnostics) {
    let check_target = |label: &str, diagnostics: &mut Diagnostics| {
        if !labels.contains(label) {
            diagnostics.error_at(
                format!("block '{}' in function '{}' branches to unknown block '{}'", block_label, function.name, label),
                no_span(),
            );
        }
    };

    match terminator {
        Terminator::Return(_) | Terminator::Unreachable => {}
        Terminator::Branch(target) => check_target(target, diagnostics),
        Terminator::CondBranch { then_label, else_label, .. } => {
            check_target(then_label, diagnostics);
            check_target(else_label, diagnostics);
        }
        Terminator::Switch { cases, default, .. } => {
            check_target(default, diagnostics);
            for (_, label) in cases {
                check_target(label, diagnostics);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, Instruction, Opcode};

    fn void_function(blocks: Vec<BasicBlock>) -> Function {
        Function { name: "f".into(), params: vec![], return_type: 0, blocks }
    }

    #[test]
    fn extern_functions_are_not_checked() {
        let f = Function { name: "puts".into(), params: vec![], return_type: 0, blocks: vec![] };
        let program = Program { functions: vec![f] };
        let mut diags = Diagnostics::new();
        assert!(verify_program(&program, &mut diags));
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let block = BasicBlock::new("entry");
        let program = Program { functions: vec![void_function(vec![block])] };
        let mut diags = Diagnostics::new();
        assert!(!verify_program(&program, &mut diags));
    }

    #[test]
    fn branch_to_unknown_block_is_an_error() {
        let mut block = BasicBlock::new("entry");
        block.terminator = Some(Terminator::Branch("nowhere".into()));
        let program = Program { functions: vec![void_function(vec![block])] };
        let mut diags = Diagnostics::new();
        assert!(!verify_program(&program, &mut diags));
    }

    #[test]
    fn use_before_def_is_an_error() {
        let mut block = BasicBlock::new("entry");
        block.instructions.push(Instruction::new(Opcode::IAdd, Some(Value::Local(1, 0)), vec![Value::Local(5, 0), Value::Local(0, 0)]));
        block.terminator = Some(Terminator::Return(None));
        let program = Program { functions: vec![void_function(vec![block])] };
        let mut diags = Diagnostics::new();
        assert!(!verify_program(&program, &mut diags));
    }

    #[test]
    fn well_formed_function_passes() {
        let mut block = BasicBlock::new("entry");
        block.instructions.push(Instruction::new(Opcode::IAdd, Some(Value::Local(0, 0)), vec![Value::Constant(crate::ir::Constant::Int(1), 0), Value::Constant(crate::ir::Constant::Int(2), 0)]));
        block.terminator = Some(Terminator::Return(Some(Value::Local(0, 0))));
        let program = Program { functions: vec![void_function(vec![block])] };
        let mut diags = Diagnostics::new();
        assert!(verify_program(&program, &mut diags));
    }
}
