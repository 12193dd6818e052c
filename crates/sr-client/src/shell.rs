//! Interactive command parsing

/// A command typed at the client prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Start,
    Stop,
    Status,
    Test,
    Help,
    Quit,
    /// Blank line
    Empty,
    Unknown(String),
}

impl ShellCommand {
    /// Parse one input line. Matching ignores case and surrounding space.
    pub fn parse(line: &str) -> Self {
        let word = line.trim().to_ascii_lowercase();
        match word.as_str() {
            "" => ShellCommand::Empty,
            "start" => ShellCommand::Start,
            "stop" => ShellCommand::Stop,
            "status" => ShellCommand::Status,
            "test" => ShellCommand::Test,
            "help" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            _ => ShellCommand::Unknown(line.trim().to_string()),
        }
    }
}
