//! Command line arguments for the quill toolchain.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// quill - compile, inspect and run NEO smart contracts
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a JSON syntax tree into an AVM script
    #[command(alias = "c")]
    Compile(CompileArgs),

    /// Print the instructions of a compiled script
    #[command(alias = "d", alias = "disassemble")]
    Disasm(DisasmArgs),

    /// Invoke a method of a compiled contract
    #[command(alias = "invoke")]
    Run(RunArgs),

    /// Start the interactive shell
    #[command(alias = "i")]
    Repl,
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Syntax tree of the module, as JSON
    pub input: PathBuf,

    /// Where to write the script; hex goes to stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the script as hex text instead of raw bytes
    #[arg(long)]
    pub hex: bool,

    /// Compile options, as JSON
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Allow `deploy` to run more than once
    #[arg(long)]
    pub no_deploy_guard: bool,

    /// Print the listing after compiling
    #[arg(short, long, alias = "disassemble")]
    pub listing: bool,
}

#[derive(Args, Debug)]
pub struct DisasmArgs {
    /// Compiled script, raw or hex
    pub script: PathBuf,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Compiled script, raw or hex; a `.json` syntax tree is compiled first
    pub script: PathBuf,

    /// Method to invoke
    pub method: String,

    /// Parameters as JSON values; bare words are strings
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub params: Vec<String>,

    /// Maximum number of instructions to execute
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Print storage after the run
    #[arg(short, long)]
    pub storage: bool,
}
