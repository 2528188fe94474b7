//! Orchestrates the compiler core's phases over a fixed, caller-ordered list
//! of source modules: lex, parse, lower to HIR, analyze, lower to MIR,
//! verify, merge. Diagnostics from any phase halt the pipeline before the
//! next phase runs; discovering source files and resolving the import graph
//! into that ordered list is the caller's responsibility, not this crate's.

use volta_common::diagnostics::Diagnostics;
use volta_common::{Position, Span};
use volta_hir::hir::HirProgram;
use volta_lexer::lexer::Lexer;
use volta_mir::{merge_modules, verify_program, Lowering, Program as MirProgram};
use volta_parser::ast::Program as AstProgram;
use volta_parser::parser::parse;
use volta_sema::{AnalysisOutput, FunctionRegistry, SemanticAnalyzer};
use volta_types::TypeRegistry;

/// One compilation unit as the driver receives it: a module name already
/// resolved per the `std/io.vlt` → `std.io` naming rule, and its source text.
pub struct SourceModule {
    pub name: String,
    pub source: String,
}

pub struct CompileResult {
    pub program: Option<MirProgram>,
    pub diagnostics: Diagnostics,
}

impl CompileResult {
    pub fn succeeded(&self) -> bool {
        self.program.is_some() && !self.diagnostics.has_errors()
    }
}

/// Converts a source file path to its module name: strips the extension,
/// drops a leading `./`, and replaces `/` with `.`.
pub fn module_name_from_path(path: &str) -> String {
    let without_prefix = path.strip_prefix("./").unwrap_or(path);
    let without_ext = without_prefix.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(without_prefix);
    without_ext.replace('/', ".")
}

pub fn compile(modules: Vec<SourceModule>) -> CompileResult {
    let mut diagnostics = Diagnostics::new();
    let mut types = TypeRegistry::new();

    log::info!("lexing {} module(s)", modules.len());
    let mut token_lists = Vec::with_capacity(modules.len());
    for (file_id, module) in modules.iter().enumerate() {
        let mut lexer = Lexer::new(&module.source, file_id as u32);
        match lexer.tokenize() {
            Ok(tokens) => token_lists.push(tokens),
            Err(err) => diagnostics.error_at(err.to_string(), Span::single(Position::start(), file_id as u32)),
        }
    }
    if diagnostics.has_errors() {
        return CompileResult { program: None, diagnostics };
    }

    log::info!("parsing {} module(s)", modules.len());
    let mut asts: Vec<AstProgram> = Vec::with_capacity(modules.len());
    for tokens in token_lists {
        let (program, module_diagnostics) = parse(tokens);
        diagnostics.extend(module_diagnostics);
        asts.push(program);
    }
    if diagnostics.has_errors() {
        return CompileResult { program: None, diagnostics };
    }

    log::info!("lowering {} module(s) to HIR", asts.len());
    let hirs: Vec<HirProgram> = asts.into_iter().map(volta_hir::lowering::lower_program).collect();

    log::info!("running semantic analysis");
    let mut exported = FunctionRegistry::new();
    let mut module_outputs: Vec<(AnalysisOutput, &HirProgram)> = Vec::with_capacity(hirs.len());
    for hir in &hirs {
        let analyzer = SemanticAnalyzer::new();
        let output = analyzer.analyze(hir, &mut types, Some(&exported));
        exported.merge_public_from(&output.functions);
        diagnostics.extend(output.diagnostics.clone());
        module_outputs.push((output, hir));
    }
    if diagnostics.has_errors() {
        return CompileResult { program: None, diagnostics };
    }

    log::info!("lowering {} module(s) to MIR", module_outputs.len());
    let mut mir_modules = Vec::with_capacity(module_outputs.len());
    for (output, hir) in &module_outputs {
        let lowering = Lowering::new(&mut types, &output.expr_types, &output.field_access, &output.functions);
        let result = lowering.lower_program(hir);
        diagnostics.extend(result.diagnostics);
        mir_modules.push(result.program);
    }
    if diagnostics.has_errors() {
        return CompileResult { program: None, diagnostics };
    }

    log::info!("verifying {} MIR module(s)", mir_modules.len());
    for module in &mir_modules {
        verify_program(module, &mut diagnostics);
    }
    if diagnostics.has_errors() {
        return CompileResult { program: None, diagnostics };
    }

    let merged = merge_modules(mir_modules);
    CompileResult { program: Some(merged), diagnostics }
}
