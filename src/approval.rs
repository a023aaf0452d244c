//! Yes/no confirmation before staged changes are applied.

use futures_util::FutureExt;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::thread;
use tokio::sync::oneshot;
use tracing::info;

/// Outcome of the approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
    /// Interrupted before an answer arrived.
    Cancelled,
}

/// Asks the user whether to apply staged changes, unless pre-approved.
///
/// Only `y` and `yes` approve (any case, surrounding whitespace ignored).
/// Anything else, an empty line or end of input rejects.
///
/// # Example
///
/// ```
/// use llm_tool::approval::{ApprovalGate, Decision};
/// use std::io::Cursor;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let gate = ApprovalGate::new(false);
/// let mut output = Vec::new();
///
/// let decision = gate.confirm(Cursor::new("Yes\n"), &mut output, std::future::pending()).await?;
/// assert_eq!(decision, Decision::Approved);
/// # Ok(())
/// # }
/// ```
pub struct ApprovalGate {
    auto_approve: bool,
}

impl ApprovalGate {
    /// `auto_approve` skips the prompt entirely (`--yes`).
    pub fn new(auto_approve: bool) -> Self {
        Self { auto_approve }
    }

    /// Prompts on `output` and reads one line of `input`.
    ///
    /// The line is read on its own thread so that `cancel` can interrupt a
    /// prompt that is still waiting. A `cancel` that is already complete wins
    /// over an answer that is already available.
    pub async fn confirm<R, W, C>(&self, input: R, output: &mut W, cancel: C) -> io::Result<Decision>
    where
        R: BufRead + Send + 'static,
        W: Write + ?Sized,
        C: Future<Output = ()>,
    {
        if self.auto_approve {
            if cancel.now_or_never().is_some() {
                info!("Cancelled before pre-approved changes were applied");
                return Ok(Decision::Cancelled);
            }
            info!("Changes pre-approved");
            return Ok(Decision::Approved);
        }

        write!(output, "\nApply these changes? [y/N] ")?;
        output.flush()?;

        let (tx, rx) = oneshot::channel();
        thread::spawn(move || {
            let mut input = input;
            let _ = tx.send(read_answer(&mut input));
        });

        let answer = tokio::select! {
            biased;
            _ = cancel => {
                writeln!(output)?;
                info!("Cancelled at the approval prompt");
                return Ok(Decision::Cancelled);
            }
            answer = rx => answer.map_err(|_| io::Error::other("approval input reader stopped"))??,
        };

        let Some(line) = answer else {
            // No terminal to answer from.
            writeln!(output)?;
            info!("No answer on input, rejecting changes");
            return Ok(Decision::Rejected);
        };

        let decision = if is_affirmative(&line) {
            Decision::Approved
        } else {
            Decision::Rejected
        };
        info!("User answered {:?}", decision);
        Ok(decision)
    }
}

/// One line of input, or `None` at end of input.
fn read_answer<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    match input.read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
