use std::collections::VecDeque;

/// The interpreter's single seam to the terminal.
///
/// Everything the core prints goes through [`Console::print`]; input lines
/// are pulled one at a time with the current prompt character. A real
/// console mirrors both directions to the transcript log; tests script the
/// input and collect the output.
pub trait Console {
    /// Print `s` on the terminal (and into the log, when there is one).
    fn print(&mut self, s: &str);

    /// Fetch the next input line, prompting with `prompt` when given.
    /// Returns `None` at end of input.
    fn read_line(&mut self, prompt: Option<char>) -> Option<String>;
}

/// A scripted console: canned input lines and captured output.
///
/// Prompts and consumed input lines are echoed into the output, so the
/// capture reads like the transcript log of an interactive session.
pub struct BufferConsole {
    input: VecDeque<String>,
    output: String,
}

impl BufferConsole {
    #[must_use]
    pub fn new(script: &str) -> Self {
        Self {
            input: script.lines().map(String::from).collect(),
            output: String::new(),
        }
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.output
    }
}

impl Console for BufferConsole {
    fn print(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn read_line(&mut self, prompt: Option<char>) -> Option<String> {
        if let Some(p) = prompt {
            self.output.push(p);
        }
        let line = self.input.pop_front()?;
        self.output.push_str(&line);
        self.output.push('\n');
        Some(line)
    }
}

#[test]
fn test_buffer_console_echo() {
    let mut console = BufferConsole::new("first\nsecond");
    assert_eq!(console.read_line(Some('*')), Some("first".to_string()));
    console.print("ok\n");
    assert_eq!(console.read_line(None), Some("second".to_string()));
    assert_eq!(console.read_line(Some('*')), None);
    assert_eq!(console.output(), "*first\nok\nsecond\n*");
}
