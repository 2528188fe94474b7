//! Minimal entry point: compiles each path given on the command line as its
//! own module, in the order given, and prints diagnostics. No flag parsing
//! beyond the bare file list; a project-level CLI is a separate concern.

use std::fs;
use std::process::ExitCode;

use volta_driver::{compile, module_name_from_path, SourceModule};

fn main() -> ExitCode {
    env_logger::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: voltac <file.vlt>...");
        return ExitCode::FAILURE;
    }

    let mut modules = Vec::with_capacity(paths.len());
    for path in &paths {
        if !(path.ends_with(".vlt") || path.ends_with(".volta")) {
            log::warn!("skipping '{}': unrecognized source extension", path);
            continue;
        }
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                eprintln!("error: could not read '{}': {}", path, err);
                return ExitCode::FAILURE;
            }
        };
        modules.push(SourceModule { name: module_name_from_path(path), source });
    }

    let module_names: Vec<String> = modules.iter().map(|m| m.name.clone()).collect();
    let result = compile(modules);
    let mut rendered = String::new();
    let _ = result.diagnostics.print_all(&mut rendered, &module_names);
    if !rendered.is_empty() {
        eprint!("{}", rendered);
    }

    if result.diagnostics.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
