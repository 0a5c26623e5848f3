use super::dialogs::SaveWarning;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Lets an operator look at a post-save warning before the run goes on.
///
/// Warnings never abort a run; the prompt only pauses it.
pub trait OperatorPrompt {
    fn acknowledge(&mut self, warning: SaveWarning, message: &str);
}

/// Continues immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl OperatorPrompt for AutoConfirm {
    fn acknowledge(&mut self, warning: SaveWarning, message: &str) {
        debug!(%warning, message, "Auto-confirmed warning");
    }
}

/// Prints the warning on stderr and waits for Enter on stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl OperatorPrompt for TerminalPrompt {
    fn acknowledge(&mut self, warning: SaveWarning, message: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "\n[{warning}] {message}");
        let _ = write!(stderr, "Press Enter to continue...");
        let _ = stderr.flush();
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            debug!(error = %e, "Could not read operator confirmation");
        }
    }
}
