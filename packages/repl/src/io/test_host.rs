//! In-memory host for driving the shell in tests.

use std::collections::VecDeque;

use super::{InputLine, IoError, IoHost, Output, OutputStyle, PromptConfig, Signal};

enum Scripted {
    Line(String),
    Signal(Signal),
}

/// Replays a fixed sequence of lines and signals and records everything the
/// shell writes. Once the script runs out it reports end of input, so a
/// shell loop always terminates.
#[derive(Default)]
pub struct TestHost {
    script: VecDeque<Scripted>,
    pending: Option<Scripted>,
    outputs: Vec<Output>,
    prompts: Vec<PromptConfig>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut host = Self::new();
        for line in lines {
            host.push_line(line);
        }
        host
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.script.push_back(Scripted::Line(line.into()));
        self
    }

    pub fn push_signal(&mut self, signal: Signal) -> &mut Self {
        self.script.push_back(Scripted::Signal(signal));
        self
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Text of every output with the given style, in order.
    pub fn texts(&self, style: OutputStyle) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|o| o.style == style)
            .map(|o| o.text.as_str())
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.texts(OutputStyle::Error)
    }

    pub fn prompts(&self) -> &[PromptConfig] {
        &self.prompts
    }
}

impl IoHost for TestHost {
    fn wait_for_input(&mut self) -> Result<(), IoError> {
        self.pending = Some(
            self.script
                .pop_front()
                .unwrap_or(Scripted::Signal(Signal::Eof)),
        );
        Ok(())
    }

    fn read_input(&mut self) -> Result<Option<InputLine>, IoError> {
        match self.pending.take() {
            Some(Scripted::Line(line)) => Ok(Some(InputLine { line })),
            other => {
                self.pending = other;
                Ok(None)
            }
        }
    }

    fn read_signal(&mut self) -> Result<Option<Signal>, IoError> {
        match self.pending.take() {
            Some(Scripted::Signal(signal)) => Ok(Some(signal)),
            other => {
                self.pending = other;
                Ok(None)
            }
        }
    }

    fn write_output(&mut self, output: Output) -> Result<(), IoError> {
        self.outputs.push(output);
        Ok(())
    }

    fn write_prompt(&mut self, config: PromptConfig) -> Result<(), IoError> {
        self.prompts.push(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_lines_then_reports_eof() {
        let mut host = TestHost::with_lines(["first"]);

        host.wait_for_input().unwrap();
        assert!(host.read_signal().unwrap().is_none());
        assert_eq!(host.read_input().unwrap().unwrap().line, "first");

        host.wait_for_input().unwrap();
        assert!(host.read_input().unwrap().is_none());
        assert!(matches!(host.read_signal().unwrap(), Some(Signal::Eof)));
    }

    #[test]
    fn signals_keep_their_position() {
        let mut host = TestHost::new();
        host.push_signal(Signal::Interrupt).push_line("after");

        host.wait_for_input().unwrap();
        assert!(matches!(host.read_signal().unwrap(), Some(Signal::Interrupt)));
        host.wait_for_input().unwrap();
        assert_eq!(host.read_input().unwrap().unwrap().line, "after");
    }

    #[test]
    fn records_output_by_style() {
        let mut host = TestHost::new();
        host.write_output(Output::normal("42")).unwrap();
        host.write_output(Output::error("oops")).unwrap();
        assert_eq!(host.texts(OutputStyle::Normal), vec!["42"]);
        assert_eq!(host.errors(), vec!["oops"]);
        assert_eq!(host.outputs().len(), 2);
    }
}
