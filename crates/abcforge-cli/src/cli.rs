//! CLI definition.

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, value_parser};

/// Program JSON file (positional).
fn program_arg() -> Arg {
    Arg::new("program")
        .value_name("PROGRAM")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Program file (JSON-serialized symbolic program)")
}

pub fn build_cli() -> Command {
    Command::new("abcforge")
        .about("Inspect, rewrite, and emit compiled bytecode modules")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging (RUST_LOG overrides)"),
        )
        .subcommand(
            Command::new("dump")
                .about("Print the module tables of every module in a program")
                .arg(program_arg()),
        )
        .subcommand(
            Command::new("asm")
                .about("Commit pending module edits and emit a binary container")
                .arg(program_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Output container path"),
                )
                .arg(
                    Arg::new("no_debug_info")
                        .long("no-debug-info")
                        .action(ArgAction::SetTrue)
                        .help("Skip per-function debug items"),
                ),
        )
}
