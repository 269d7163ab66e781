//! Terminal credential prompts.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::{mpsc, oneshot, Mutex};

use examrun_client::CredentialPrompt;

pub const EMAIL_PROMPT: &str = "Email (blank line to skip):";

/// A pending request for one line of input.
pub type LineRequest = oneshot::Sender<Option<String>>;

fn non_blank(line: Option<String>) -> Option<String> {
    line.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
}

/// Reads the email straight from stdin. For commands that use stdin for
/// nothing else.
pub struct StdinPrompt {
    lines: Mutex<tokio::io::Lines<BufReader<Stdin>>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl CredentialPrompt for StdinPrompt {
    async fn ask_email(&self) -> Option<String> {
        println!("{EMAIL_PROMPT}");
        let line = self.lines.lock().await.next_line().await.ok().flatten();
        non_blank(line)
    }

    fn report_failure(&self, message: &str) {
        eprintln!("Login failed: {message}");
    }
}

/// Asks the input loop of `examrun take` for the next line.
///
/// The loop owns stdin. While a request is pending it hands the next line
/// to the prompt instead of reading it as a command.
pub struct BridgedPrompt {
    requests: mpsc::Sender<LineRequest>,
}

impl BridgedPrompt {
    pub fn new(requests: mpsc::Sender<LineRequest>) -> Self {
        Self { requests }
    }
}

#[async_trait]
impl CredentialPrompt for BridgedPrompt {
    async fn ask_email(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        self.requests.send(tx).await.ok()?;
        non_blank(rx.await.ok().flatten())
    }

    fn report_failure(&self, message: &str) {
        eprintln!("Login failed: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bridged_prompt_waits_for_the_loop() {
        let (tx, mut rx) = mpsc::channel(1);
        let prompt = BridgedPrompt::new(tx);

        let answer = tokio::spawn(async move { prompt.ask_email().await });
        let request = rx.recv().await.unwrap();
        request.send(Some("  a@b.c ".into())).unwrap();
        assert_eq!(answer.await.unwrap().as_deref(), Some("a@b.c"));
    }

    #[tokio::test]
    async fn blank_line_or_closed_loop_cancels() {
        let (tx, mut rx) = mpsc::channel(1);
        let prompt = BridgedPrompt::new(tx);

        let answer = tokio::spawn(async move { prompt.ask_email().await });
        rx.recv().await.unwrap().send(Some("   ".into())).unwrap();
        assert_eq!(answer.await.unwrap(), None);

        let prompt = BridgedPrompt::new(mpsc::channel(1).0);
        assert_eq!(prompt.ask_email().await, None);
    }
}
