//! Two-phase input for message submission.
//!
//! A `+CMGS` that passes validation does not finish immediately. The session
//! prompts with `> `, captures raw bytes up to Ctrl-Z, and only then emits
//! `+CMGS: <ref>` and the terminal result code. Sub-commands that followed
//! `+CMGS` on the same line wait until the body has arrived.
//!
//! ```text
//! AwaitingCommand --begin--> Prompting --prompt_sent--> CapturingBody
//!        ^                                                    |
//!        +------resume------ Complete <-------complete--------+
//!        +-------------------------abort----------------------+
//! ```

use std::collections::VecDeque;

use atsim_protocol::SubCommand;

use crate::registry::Submission;

/// Where the session is in the submission protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    /// Normal line framing.
    #[default]
    AwaitingCommand,
    /// Submission accepted, prompt not yet written.
    Prompting,
    /// Raw bytes are being collected until Ctrl-Z.
    CapturingBody,
    /// Body received; deferred output not yet written.
    Complete,
}

/// A submission waiting for its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    /// What the accepted `+CMGS` asked for.
    pub submission: Submission,
    /// Sub-commands of the same line still to run.
    pub remaining: VecDeque<SubCommand>,
}

/// State machine for prompt / body capture / completion.
#[derive(Debug, Default)]
pub struct TwoPhaseInput {
    state: InputState,
    pending: Option<PendingSubmission>,
}

impl TwoPhaseInput {
    /// Create a controller in [`InputState::AwaitingCommand`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> InputState {
        self.state
    }

    /// Check if raw bytes should bypass line framing.
    pub fn is_capturing(&self) -> bool {
        self.state == InputState::CapturingBody
    }

    /// Accept a validated submission.
    pub fn begin(&mut self, submission: Submission, remaining: VecDeque<SubCommand>) {
        tracing::debug!(
            "submission accepted, {} sub-command(s) deferred",
            remaining.len()
        );
        self.pending = Some(PendingSubmission {
            submission,
            remaining,
        });
        self.state = InputState::Prompting;
    }

    /// The prompt has been written; start capturing.
    pub fn prompt_sent(&mut self) {
        if self.state == InputState::Prompting {
            self.state = InputState::CapturingBody;
        }
    }

    /// Finish capture with the bytes preceding Ctrl-Z.
    ///
    /// Returns the trimmed body and the pending submission, or `None` when no
    /// capture is in progress.
    pub fn complete(&mut self, raw: &[u8]) -> Option<(String, PendingSubmission)> {
        if !self.is_capturing() {
            return None;
        }
        let pending = self.pending.take()?;
        self.state = InputState::Complete;
        let body = String::from_utf8_lossy(raw).trim().to_string();
        Some((body, pending))
    }

    /// Deferred output has been written; resume line framing.
    pub fn resume(&mut self) {
        if self.state == InputState::Complete {
            self.state = InputState::AwaitingCommand;
        }
    }

    /// Drop any submission in progress without output.
    pub fn abort(&mut self) -> Option<PendingSubmission> {
        self.state = InputState::AwaitingCommand;
        self.pending.take()
    }
}
