//! Shell line handling.
//!
//! Lines starting with `:` are shell commands:
//! - `:help` - Show help
//! - `:commands [pattern]` - List interpreter commands
//! - `:load <file>` - Evaluate a script file
//! - `:quit` - Leave the shell
//!
//! Everything else is evaluated by the interpreter and its result printed.

use std::fs;

use nu_ansi_term::{Color, Style};
use tether::{Error, Interpreter, NativeType, NativeValue};
use tracing::debug;

/// Result of handling one line
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Succeeded, optionally with output to display
    Ok { display: Option<String> },
    /// Failed with an error message
    Error(String),
    /// User asked to leave the shell
    Exit,
    /// Show help
    Help,
    /// The interpreter is gone
    Closed,
}

impl CommandResult {
    fn ok_display(display: impl Into<String>) -> Self {
        CommandResult::Ok {
            display: Some(display.into()),
        }
    }

    fn ok_none() -> Self {
        CommandResult::Ok { display: None }
    }

    fn from_error(err: Error) -> Self {
        match err {
            Error::Closed => CommandResult::Closed,
            other => CommandResult::Error(other.to_string()),
        }
    }
}

/// Handle one line of input
pub fn execute(input: &str, interp: &Interpreter) -> CommandResult {
    let input = input.trim();

    if input.is_empty() {
        return CommandResult::ok_none();
    }

    match input.strip_prefix(':') {
        Some(meta) => execute_meta(meta, interp),
        None => evaluate(input, interp),
    }
}

fn evaluate(script: &str, interp: &Interpreter) -> CommandResult {
    match interp.evaluate_into(NativeType::Bytes, script) {
        Ok(NativeValue::Bytes(result)) if result.is_empty() => CommandResult::ok_none(),
        Ok(NativeValue::Bytes(result)) => {
            CommandResult::ok_display(String::from_utf8_lossy(&result).into_owned())
        }
        Ok(_) => CommandResult::ok_none(),
        Err(err) => CommandResult::from_error(err),
    }
}

fn execute_meta(meta: &str, interp: &Interpreter) -> CommandResult {
    let (command, arg) = match meta.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (meta, ""),
    };

    match command {
        "help" | "h" | "?" => CommandResult::Help,
        "quit" | "q" => CommandResult::Exit,
        "commands" | "c" => cmd_commands(arg, interp),
        "load" | "l" => cmd_load(arg, interp),
        _ => CommandResult::Error(format!(
            "unknown shell command ':{}' (type :help)",
            command
        )),
    }
}

fn cmd_commands(pattern: &str, interp: &Interpreter) -> CommandResult {
    let names = match command_names(interp, pattern) {
        Ok(names) => names,
        Err(err) => return CommandResult::from_error(err),
    };
    if names.is_empty() {
        return CommandResult::ok_display("(no matching commands)");
    }
    CommandResult::ok_display(names.join("\n"))
}

fn cmd_load(path: &str, interp: &Interpreter) -> CommandResult {
    if path.is_empty() {
        return CommandResult::Error("usage: :load <file>".to_string());
    }
    let script = match fs::read(path) {
        Ok(script) => script,
        Err(e) => return CommandResult::Error(format!("couldn't read {}: {}", path, e)),
    };
    debug!(path, bytes = script.len(), "loading script");
    match interp.evaluate_bytes(script) {
        Ok(()) => CommandResult::ok_none(),
        Err(err) => CommandResult::from_error(err),
    }
}

/// Names of the interpreter's commands matching a glob pattern (all when
/// empty), sorted.
pub fn command_names(interp: &Interpreter, pattern: &str) -> Result<Vec<String>, Error> {
    let query = if pattern.is_empty() {
        "info commands".to_string()
    } else {
        format!("info commands {{{}}}", pattern)
    };
    let listing = interp.evaluate_as::<String>(&query)?;
    let mut names = split_list(&listing);
    names.sort();
    Ok(names)
}

/// Split a list result into elements, honouring `{}` grouping.
fn split_list(list: &str) -> Vec<String> {
    let mut elements = Vec::new();
    let mut chars = list.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut element = String::new();
        if c == '{' {
            chars.next();
            let mut depth = 1;
            for c in chars.by_ref() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                element.push(c);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                element.push(c);
                chars.next();
            }
        }
        elements.push(element);
    }
    elements
}

/// Format help text
pub fn format_help() -> String {
    let cmd_style = Style::new().bold().fg(Color::Cyan);
    let arg_style = Style::new().fg(Color::Yellow);

    let mut help = String::new();
    help.push_str(&format!(
        "{}\n\n",
        Style::new().bold().paint("tether shell")
    ));
    help.push_str("Lines are evaluated by the interpreter; non-empty results are printed.\n\n");

    let commands = [
        (":help", "", "Show this help message (alias: :h, :?)"),
        (":commands", "[pattern]", "List interpreter commands (alias: :c)"),
        (":load", "<file>", "Evaluate a script file (alias: :l)"),
        (":quit", "", "Leave the shell (alias: :q)"),
    ];
    for (cmd, args, desc) in commands {
        help.push_str(&format!(
            "  {:<12} {:<12} {}\n",
            cmd_style.paint(cmd),
            arg_style.paint(args),
            desc
        ));
    }
    help.push_str("\nThe script command `exit` stops the interpreter and the shell.\n");
    help
}
