//! Terminal output for the interactive client

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use sr_protocol::{Message, MessageKind};

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// One-line description of a message relayed from another client
pub fn describe_message(msg: &Message) -> String {
    match msg.kind() {
        MessageKind::ScreenData => format!(
            "[{}] {} bytes from {}",
            msg.kind(),
            msg.payload().len(),
            msg.sender_id()
        ),
        _ if msg.payload().is_empty() => format!("[{}] from {}", msg.kind(), msg.sender_id()),
        _ => format!(
            "[{}] from {}: {}",
            msg.kind(),
            msg.sender_id(),
            msg.payload_text()
        ),
    }
}

/// Help text for the interactive shell
pub fn help_text() -> &'static str {
    "Commands:\n  \
     start   - announce that this client started sharing\n  \
     stop    - announce that this client stopped sharing\n  \
     status  - show connection status\n  \
     test    - send a test screen data frame\n  \
     help    - show this help\n  \
     quit    - disconnect and exit (alias: exit)"
}
