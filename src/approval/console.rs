use std::io::BufRead;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use crate::approval::ApprovalChannel;
use crate::drafting::Draft;
use crate::error::{AppError, Result};

const RULE: &str = "----------------------------------------------------------------------";

/// Lines typed by the user; the channel closes at end of input.
type Input = mpsc::UnboundedReceiver<String>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Shows the draft on a terminal and reads `yes`/`no` back.
pub struct ConsoleApproval {
    io: Mutex<(Input, Output)>,
}

impl ConsoleApproval {
    pub fn new(input: Input, output: Output) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    /// Prompt on stdout and read answers from stdin.
    ///
    /// Stdin is read on a detached OS thread. Waiting on the channel can be
    /// cancelled by a timeout, and a read still blocked at exit does not hold
    /// up runtime shutdown.
    pub fn stdio() -> Self {
        Self::new(
            forward_lines(std::io::BufReader::new(std::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }
}

/// Read `reader` line by line on its own thread, sending each line into the
/// returned channel. The channel closes on end of input or a read error.
pub fn forward_lines<R>(reader: R) -> Input
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stopped reading console input");
                    break;
                }
            }
        }
    });
    rx
}

/// `Some(true)` for yes, `Some(false)` for no, `None` for anything else.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl ApprovalChannel for ConsoleApproval {
    async fn decide(&self, draft: &Draft) -> Result<bool> {
        let mut guard = self.io.lock().await;
        let (input, output) = &mut *guard;

        let preview = format!(
            "\nEMAIL PREVIEW\n\nSUBJECT: {}\n\n{RULE}\n{}\n{RULE}\n",
            draft.subject, draft.body
        );
        output.write_all(preview.as_bytes()).await?;

        loop {
            output
                .write_all(b"\nDo you approve sending this email? (yes/no): ")
                .await?;
            output.flush().await?;

            let Some(line) = input.recv().await else {
                return Err(AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "input closed before a decision was made",
                )));
            };

            match parse_answer(&line) {
                Some(approved) => return Ok(approved),
                None => output.write_all(b"Please enter 'yes' or 'no'\n").await?,
            }
        }
    }
}
