//! Interactive overwrite confirmation on the controlling terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use async_trait::async_trait;
use modelsync_core::OverridePrompt;
use tracing::warn;

/// Asks on stderr and reads the answer from stdin.
pub(crate) struct StdinPrompt;

#[async_trait]
impl OverridePrompt for StdinPrompt {
    async fn confirm(&self, message: &str) -> bool {
        if !io::stdin().is_terminal() {
            eprintln!("{message}; keeping the existing file (pass --yes to overwrite)");
            return false;
        }
        let message = message.to_owned();
        tokio::task::spawn_blocking(move || {
            ask(&message, &mut io::stdin().lock(), &mut io::stderr())
        })
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "prompt task failed");
            false
        })
    }
}

fn ask<R: BufRead, W: Write>(message: &str, input: &mut R, output: &mut W) -> bool {
    if write!(output, "{message}. Overwrite? [y/N] ")
        .and_then(|()| output.flush())
        .is_err()
    {
        return false;
    }
    let mut line = String::new();
    input.read_line(&mut line).is_ok() && is_affirmative(&line)
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
    }

    #[test]
    fn ask_writes_the_question_and_reads_one_line() {
        let mut input = io::Cursor::new(b"yes\nignored\n".to_vec());
        let mut output = Vec::new();
        assert!(ask("File already exists: a.pt", &mut input, &mut output));
        let shown = String::from_utf8(output).expect("utf8");
        assert_eq!(shown, "File already exists: a.pt. Overwrite? [y/N] ");
    }
}
