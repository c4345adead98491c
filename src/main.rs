// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! quill - a NEO smart contract toolchain
//!
//! This is the main entry point for the quill CLI/REPL.
//!
//! ## Features
//!
//! - Compiles JSON syntax trees into AVM scripts
//! - Disassembles compiled scripts
//! - Invokes contract methods on the reference VM
//! - Interactive shell with history

mod artifacts;
mod cli;
mod repl;

use clap::Parser;
use cli::{Cli, Commands, CompileArgs, DisasmArgs, RunArgs};
use owo_colors::OwoColorize;
use quill_compiler::{CompileOptions, ExecutionEngine, Severity, VmConfig, compile, disassembler};
use std::fs;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "quill=debug,quill_compiler=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Some(Commands::Compile(args)) => run_compile(args),
        Some(Commands::Disasm(args)) => run_disasm(args),
        Some(Commands::Run(args)) => run_invoke(args),
        Some(Commands::Repl) | None => return run_repl(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}: {}", "Error".red().bold(), message);
            ExitCode::FAILURE
        }
    }
}

/// Start the interactive REPL
fn run_repl() -> ExitCode {
    match repl::Repl::new() {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

fn run_compile(args: &CompileArgs) -> Result<(), String> {
    let program = artifacts::load_program(&args.input)?;
    let mut options = match &args.options {
        Some(path) => artifacts::load_options(path)?,
        None => CompileOptions::default(),
    };
    if args.no_deploy_guard {
        options.guard_deploy = false;
    }

    let output = compile(&program, &options).map_err(|e| e.to_string())?;
    for diagnostic in &output.diagnostics {
        print_diagnostic(diagnostic);
    }
    if args.listing {
        for line in disassembler::disassemble(&output.script).map_err(|e| e.to_string())? {
            eprintln!("{}", line.dimmed());
        }
    }

    match &args.output {
        Some(path) => {
            let contents = if args.hex {
                hex::encode(&output.script).into_bytes()
            } else {
                output.script.clone()
            };
            fs::write(path, contents).map_err(|e| format!("cannot write '{}': {}", path.display(), e))?;
            eprintln!(
                "{} {} ({} bytes)",
                "Compiled".green().bold(),
                path.display(),
                output.script.len()
            );
        }
        None => println!("{}", hex::encode(&output.script)),
    }
    Ok(())
}

fn run_disasm(args: &DisasmArgs) -> Result<(), String> {
    let script = artifacts::read_script(&args.script)?;
    let listing = disassembler::disassemble(&script).map_err(|e| e.to_string())?;
    for line in listing {
        match &line.operand {
            Some(operand) => println!(
                "{} {} {}",
                format!("{:04}", line.pc).dimmed(),
                line.mnemonic.cyan(),
                operand
            ),
            None => println!("{} {}", format!("{:04}", line.pc).dimmed(), line.mnemonic.cyan()),
        }
    }
    Ok(())
}

fn run_invoke(args: &RunArgs) -> Result<(), String> {
    let script = if args.script.extension().is_some_and(|ext| ext == "json") {
        let program = artifacts::load_program(&args.script)?;
        compile(&program, &CompileOptions::default())
            .map_err(|e| e.to_string())?
            .script
    } else {
        artifacts::read_script(&args.script)?
    };
    let params = args
        .params
        .iter()
        .map(|p| artifacts::parse_param(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = VmConfig::default();
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    let mut engine = ExecutionEngine::with_config(config);
    let result = engine.invoke(&script, &args.method, params);

    for message in engine.logs() {
        eprintln!("{} {}", "log:".dimmed(), message);
    }
    if args.storage {
        for (key, value) in engine.storage() {
            eprintln!("{} {} = {}", "storage:".dimmed(), hex::encode(key), hex::encode(value));
        }
    }

    match result.map_err(|e| format!("{} after {} steps", e, engine.steps()))? {
        Some(item) => println!("{}", artifacts::format_item(&item)),
        None => println!("{}", "(empty stack)".dimmed()),
    }
    Ok(())
}

fn print_diagnostic(diagnostic: &quill_compiler::Diagnostic) {
    let text = diagnostic.to_string();
    match diagnostic.severity {
        Severity::Error => eprintln!("{}", text.red()),
        Severity::Warning => eprintln!("{}", text.yellow()),
    }
}
