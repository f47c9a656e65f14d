//! Command implementations.

use std::path::Path;
use std::process::ExitCode;

use abcforge_asm::{EmitOptions, Program, emit};
use abcforge_rewrite::{ModuleId, ModuleSet, dump};
use tracing::debug;

fn load_program(path: &Path) -> Result<Program, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("cannot parse {}: {e}", path.display()))
}

/// `abcforge dump <program>`: print every module's tables.
pub fn dump_command(path: &Path) -> ExitCode {
    let program = match load_program(path) {
        Ok(program) => program,
        Err(message) => return fail(&message),
    };
    let set = match ModuleSet::build(&program) {
        Ok(set) => set,
        Err(e) => return fail(&format!("cannot build module set: {e}")),
    };

    print!("{}", dump::dump(&set));
    ExitCode::SUCCESS
}

/// `abcforge asm <program> -o <file>`: commit pending module edits, then
/// emit the binary container.
pub fn asm_command(path: &Path, output: &Path, debug_info: bool) -> ExitCode {
    let mut program = match load_program(path) {
        Ok(program) => program,
        Err(message) => return fail(&message),
    };

    let mut set = match ModuleSet::build(&program) {
        Ok(set) => set,
        Err(e) => return fail(&format!("cannot build module set: {e}")),
    };
    for index in 0..set.modules.len() {
        let module = ModuleId(index as u32);
        if let Err(e) = set.commit(&mut program, module) {
            return fail(&format!("cannot commit module edits: {e}"));
        }
    }

    let options = EmitOptions {
        emit_debug_info: debug_info,
        code_profile: None,
    };
    let bytes = match emit(&program, &options) {
        Ok(bytes) => bytes,
        Err(e) => return fail(&format!("emission failed: {e}")),
    };
    debug!(size = bytes.len(), output = %output.display(), "container emitted");

    if let Err(e) = std::fs::write(output, &bytes) {
        return fail(&format!("cannot write {}: {e}", output.display()));
    }
    println!("wrote {} ({} bytes)", output.display(), bytes.len());
    ExitCode::SUCCESS
}

fn fail(message: &str) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::FAILURE
}
