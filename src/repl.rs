// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive shell for compiling contracts and invoking their methods.
//!
//! A loaded contract keeps one engine, so storage written by `deploy`
//! is visible to later calls until `.reset`.

use crate::artifacts::{self, format_item, parse_param, split_params};
use owo_colors::OwoColorize;
use quill_compiler::{CompileOptions, ExecutionEngine, compile, disassembler};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// REPL configuration constants
const HISTORY_FILE: &str = ".quill_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Open,
    Disasm,
    Storage,
    Logs,
    Reset,
    Guard,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let command = match cmd.as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "version" | "v" => ReplCommand::Version,
            "load" | "l" => ReplCommand::Load,
            "open" | "o" => ReplCommand::Open,
            "disasm" | "d" => ReplCommand::Disasm,
            "storage" | "s" => ReplCommand::Storage,
            "logs" => ReplCommand::Logs,
            "reset" => ReplCommand::Reset,
            "guard" => ReplCommand::Guard,
            _ => return None,
        };
        Some((command, arg))
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Compile a JSON syntax tree and load it"),
            (".open <file>", "Load a compiled script, raw or hex"),
            (".disasm", "List the instructions of the loaded script"),
            (".storage", "Show contract storage"),
            (".logs", "Show messages the contract logged"),
            (".reset", "Clear storage and logs"),
            (".guard on|off", "Toggle the deploy guard for .load"),
        ]
    }
}

/// Completion of commands and the loaded contract's methods
#[derive(Default)]
struct QuillHelper {
    words: Vec<String>,
}

impl QuillHelper {
    fn new() -> Self {
        let mut helper = Self::default();
        helper.set_methods(&[]);
        helper
    }

    fn set_methods(&mut self, methods: &[String]) {
        self.words = ReplCommand::all_commands()
            .iter()
            .filter_map(|(cmd, _)| cmd.split_whitespace().next())
            .map(String::from)
            .chain(methods.iter().cloned())
            .collect();
    }
}

impl Completer for QuillHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only the first word is completed
        if line[..pos].contains(char::is_whitespace) {
            return Ok((pos, vec![]));
        }
        let word = &line[..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches: Vec<Pair> = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for QuillHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() || line.len() < 2 || line.contains(char::is_whitespace) {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(line) && w.len() > line.len())
            .map(|w| w[line.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for QuillHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }
        let Some((method, rest)) = line.split_once(' ') else {
            return Cow::Owned(line.bright_green().to_string());
        };

        // Method name, then parameters colored by kind
        let mut result = String::with_capacity(line.len() * 2);
        result.push_str(&method.bright_green().to_string());
        result.push(' ');
        let mut in_string = false;
        for c in rest.chars() {
            let colored = match c {
                '"' => {
                    in_string = !in_string;
                    c.to_string().green().to_string()
                }
                _ if in_string => c.to_string().green().to_string(),
                '[' | ']' | '{' | '}' => c.to_string().yellow().to_string(),
                c if c.is_ascii_digit() || c == '-' => c.to_string().yellow().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }
        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for QuillHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();

        if !is_balanced(input) || input.trim_end().ends_with('\\') {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

/// Check if the brackets and braces of JSON parameters are balanced
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }

        match c {
            '"' => in_string = !in_string,
            _ if in_string => {}
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(c) {
                    return true; // Unbalanced, let parameter parsing report it
                }
            }
            _ => {}
        }
    }

    stack.is_empty() && !in_string
}

impl Helper for QuillHelper {}

/// The loaded contract
struct Contract {
    script: Vec<u8>,
    methods: Vec<String>,
}

/// The interactive REPL for quill
pub struct Repl {
    engine: ExecutionEngine,
    contract: Option<Contract>,
    options: CompileOptions,
    editor: Editor<QuillHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new() -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(QuillHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let _ = editor.load_history(&history_path);

        Ok(Self {
            engine: ExecutionEngine::new(),
            contract: None,
            options: CompileOptions::default(),
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    if trimmed.starts_with('.') {
                        print_error(&format!("unknown command '{}'", trimmed));
                        continue;
                    }

                    self.invoke_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        let version = env!("CARGO_PKG_VERSION");
        println!();
        println!(
            "  {} {} {}",
            "quill".bright_cyan().bold(),
            "v".dimmed(),
            version.bright_yellow()
        );
        println!("  {}", "NEO smart contract shell".dimmed());
        println!();
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn format_prompt(&self) -> String {
        match &self.contract {
            Some(_) => format!("{} ", "quill>".bright_green().bold()),
            None => format!("{} ", "quill>".dimmed()),
        }
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => self.print_version(),
            ReplCommand::Load | ReplCommand::Open => match arg {
                Some(path) => {
                    let loaded = if cmd == ReplCommand::Load {
                        self.compile_file(Path::new(path))
                    } else {
                        artifacts::read_script(Path::new(path)).map(|script| (script, Vec::new()))
                    };
                    match loaded {
                        Ok((script, methods)) => self.set_contract(script, methods),
                        Err(message) => print_error(&message),
                    }
                }
                None => print_error("a file path is required"),
            },
            ReplCommand::Disasm => match &self.contract {
                Some(contract) => match disassembler::listing(&contract.script) {
                    Ok(listing) => println!("{}", listing),
                    Err(e) => print_error(&e.to_string()),
                },
                None => print_error("no contract loaded"),
            },
            ReplCommand::Storage => {
                if self.engine.storage().is_empty() {
                    println!("{}", "(empty)".dimmed());
                }
                for (key, value) in self.engine.storage() {
                    println!(
                        "  {} = {}",
                        format_item(&key.clone().into()),
                        hex::encode(value).dimmed()
                    );
                }
            }
            ReplCommand::Logs => {
                for message in self.engine.logs() {
                    println!("  {}", message);
                }
            }
            ReplCommand::Reset => {
                self.engine = ExecutionEngine::new();
                println!("{}", "Storage cleared".dimmed());
            }
            ReplCommand::Guard => match arg {
                Some("on") => self.options.guard_deploy = true,
                Some("off") => self.options.guard_deploy = false,
                _ => println!(
                    "deploy guard is {}",
                    if self.options.guard_deploy { "on" } else { "off" }
                ),
            },
        }
        CommandResult::Continue
    }

    /// Compiles a syntax tree file into a script and its method names.
    fn compile_file(&self, path: &Path) -> Result<(Vec<u8>, Vec<String>), String> {
        let program = artifacts::load_program(path)?;
        let output = compile(&program, &self.options).map_err(|e| e.to_string())?;
        for diagnostic in &output.diagnostics {
            println!("{}", diagnostic.to_string().yellow());
        }
        Ok((output.script, output.entry_points))
    }

    /// Methods are unknown for a script opened without its syntax tree.
    fn set_contract(&mut self, script: Vec<u8>, methods: Vec<String>) {
        println!(
            "{} {} bytes, methods: {}",
            "Loaded".green().bold(),
            script.len(),
            if methods.is_empty() { "-".to_string() } else { methods.join(", ") }
        );
        if let Some(helper) = self.editor.helper_mut() {
            helper.set_methods(&methods);
        }
        self.engine = ExecutionEngine::new();
        self.contract = Some(Contract { script, methods });
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
        println!("{}", "Invoking:".white().bold());
        println!();
        println!(
            "  {:16} {}",
            "method [params]".yellow(),
            "Call a method; parameters are JSON values".dimmed()
        );
        if let Some(contract) = &self.contract {
            println!("  {:16} {}", "methods".yellow(), contract.methods.join(", ").dimmed());
        }
        println!();
    }

    fn print_version(&self) {
        let version = env!("CARGO_PKG_VERSION");
        println!();
        println!("{}: {}", "quill".bright_cyan().bold(), version.yellow());
        println!();
    }

    fn invoke_and_print(&mut self, input: &str) {
        let Some(contract) = &self.contract else {
            print_error("no contract loaded, use .load or .open");
            return;
        };
        let mut words = split_params(input).into_iter();
        let Some(method) = words.next() else {
            return;
        };
        let params = match words.map(|w| parse_param(&w)).collect::<Result<Vec<_>, _>>() {
            Ok(params) => params,
            Err(message) => return print_error(&message),
        };

        let logged = self.engine.logs().len();
        let result = self.engine.invoke(&contract.script, &method, params);
        for message in &self.engine.logs()[logged..] {
            println!("{} {}", "log:".dimmed(), message);
        }
        match result {
            Ok(Some(item)) => println!("{}", format_item(&item)),
            Ok(None) => println!("{}", "(empty stack)".dimmed()),
            Err(e) => print_error(&format!("{} after {} steps", e, self.engine.steps())),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Print a formatted error message
fn print_error(message: &str) {
    eprintln!("{}: {}", "Error".red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert!(matches!(
            ReplCommand::parse(".help"),
            Some((ReplCommand::Help, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".exit"),
            Some((ReplCommand::Exit, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".load token.json"),
            Some((ReplCommand::Load, Some("token.json")))
        ));
        assert!(matches!(
            ReplCommand::parse(".guard off"),
            Some((ReplCommand::Guard, Some("off")))
        ));
        assert!(ReplCommand::parse("transfer 1 2").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("add 1 2"));
        assert!(is_balanced("send [1, {\"a\": 2}]"));
        assert!(!is_balanced("send [1, 2"));
        assert!(!is_balanced("name \"unterminated"));
        assert!(is_balanced("name \"with [bracket\""));
    }
}
