mod cli;
mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match matches.subcommand() {
        Some(("dump", m)) => {
            let program: &PathBuf = m.get_one("program").expect("required arg");
            commands::dump_command(program)
        }
        Some(("asm", m)) => {
            let program: &PathBuf = m.get_one("program").expect("required arg");
            let output: &PathBuf = m.get_one("output").expect("required arg");
            let debug_info = !m.get_flag("no_debug_info");
            commands::asm_command(program, output, debug_info)
        }
        _ => unreachable!("clap should have caught this"),
    }
}
