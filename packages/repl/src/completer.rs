use reedline::{Completer, Span, Suggestion};
use tether::Interpreter;
use tracing::debug;

use crate::commands::command_names;

const META_COMMANDS: [(&str, &str); 4] = [
    (":help", "Show help"),
    (":commands", "List interpreter commands"),
    (":load", "Evaluate a script file"),
    (":quit", "Leave the shell"),
];

/// Completes command names. Script commands come from the interpreter
/// itself, so commands registered after startup are offered too.
pub struct ReplCompleter {
    interp: Interpreter,
}

impl ReplCompleter {
    pub fn new(interp: Interpreter) -> Self {
        Self { interp }
    }

    fn script_commands(&self, prefix: &str) -> Vec<String> {
        let pattern = format!("{}*", escape_glob(prefix));
        match command_names(&self.interp, &pattern) {
            Ok(names) => names,
            Err(err) => {
                debug!(error = %err, "command completion unavailable");
                Vec::new()
            }
        }
    }
}

impl Completer for ReplCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let line_to_pos = &line[..pos];

        // Only the first word of a command is completed: at line start or
        // after a `;` or `[`.
        let start = line_to_pos
            .rfind(|c: char| c.is_whitespace() || c == ';' || c == '[')
            .map(|i| i + 1)
            .unwrap_or(0);
        let before = line_to_pos[..start].trim_end();
        if !(before.is_empty() || before.ends_with(';') || before.ends_with('[')) {
            return Vec::new();
        }
        let prefix = &line_to_pos[start..];
        let span = Span::new(start, pos);

        if start == 0 && prefix.starts_with(':') {
            return META_COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(prefix))
                .map(|(cmd, desc)| suggestion(cmd, Some(desc), span))
                .collect();
        }

        self.script_commands(prefix)
            .iter()
            .map(|name| suggestion(name, None, span))
            .collect()
    }
}

fn suggestion(value: &str, description: Option<&str>, span: Span) -> Suggestion {
    Suggestion {
        value: value.to_string(),
        description: description.map(str::to_string),
        style: None,
        extra: None,
        span,
        append_whitespace: true,
        match_indices: None,
    }
}

fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether::{Init, InterpreterConfig};

    fn values(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.value.as_str()).collect()
    }

    #[test]
    fn completes_script_and_shell_commands() {
        let (interp, done) = Interpreter::spawn(InterpreterConfig::default(), Init::None).unwrap();
        interp.register_command("greet", || {}).unwrap();
        let mut completer = ReplCompleter::new(interp.clone());

        assert_eq!(values(&completer.complete("gr", 2)), vec!["greet"]);
        assert_eq!(values(&completer.complete("set x [in", 9)), vec!["incr", "info"]);
        assert!(completer.complete("set in", 6).is_empty());

        let meta = completer.complete(":c", 2);
        assert_eq!(values(&meta), vec![":commands"]);
        assert_eq!(meta[0].span, Span::new(0, 2));

        interp.evaluate("exit").unwrap();
        done.wait();
        assert!(completer.complete("gr", 2).is_empty());
    }

    #[test]
    fn glob_characters_are_literal() {
        assert_eq!(escape_glob("a*b?"), "a\\*b\\?");
    }
}
