//! UI-agnostic presentation state.
//!
//! Both front ends (terminal UI and the one-shot command) validate input here
//! before anything reaches the workflow, and read back what to display.

use anyhow::Result;

use crate::artifact::{ArtifactInfo, ArtifactStore, Promotion};
use crate::error::InputError;
use crate::state::SessionState;
use crate::workflow::{CycleOutcome, ExecutionReport, Transition, WorkflowController};

/// Outcome of the most recent cycle as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Generated(String),
    Failed(String),
    /// The user answered "ok"; no further cycles run.
    Accepted,
}

/// What accepted feedback asks for.
#[derive(Debug)]
pub enum FeedbackOutcome {
    /// Run another cycle with this state.
    Revise(SessionState),
    /// The diagram is final.
    Done,
}

#[derive(Debug, Default)]
pub struct DiagramSession {
    original_prompt: Option<String>,
    state: Option<SessionState>,
    feedback_rounds: u32,
    image: Option<ArtifactInfo>,
    last_report: Option<ExecutionReport>,
    status: Status,
}

impl DiagramSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session from a description.
    ///
    /// Returns the state to hand to the workflow; it comes back through
    /// [`record`](Self::record).
    pub fn begin(&mut self, description: &str) -> Result<SessionState, InputError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(InputError::EmptyDescription);
        }

        self.original_prompt = Some(description.to_string());
        self.state = None;
        self.feedback_rounds = 0;
        self.image = None;
        self.last_report = None;
        self.status = Status::Idle;
        Ok(SessionState::new(description))
    }

    /// Attach feedback to the current session for the next cycle.
    ///
    /// `ok` (any case) accepts the current diagram and ends the session
    /// instead of revising it.
    pub fn feedback(&mut self, text: &str) -> Result<FeedbackOutcome, InputError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InputError::EmptyFeedback);
        }
        if self.is_finished() {
            return Err(InputError::AlreadyAccepted);
        }
        let Some(state) = self.state.as_mut().filter(|s| s.latest_code().is_some()) else {
            return Err(InputError::NoDiagramYet);
        };

        state.feedback = text.to_string();
        if WorkflowController::route(text) == Transition::End {
            self.status = Status::Accepted;
            return Ok(FeedbackOutcome::Done);
        }

        let state = self.state.take().ok_or(InputError::NoDiagramYet)?;
        self.feedback_rounds += 1;
        Ok(FeedbackOutcome::Revise(state))
    }

    pub fn is_finished(&self) -> bool {
        self.status == Status::Accepted
    }

    /// Take back the state after a cycle and remember what happened.
    pub fn record(&mut self, outcome: CycleOutcome) {
        self.state = Some(outcome.state);
        match outcome.result {
            Ok(report) => {
                self.status = if report.succeeded() {
                    Status::Generated(report.summary())
                } else {
                    Status::Failed(report.summary())
                };
                if let Promotion::Updated(info) = &report.promotion {
                    self.image = Some(info.clone());
                }
                self.last_report = Some(report);
            }
            Err(e) => {
                self.status = Status::Failed(format!("Error: {:#}", e));
            }
        }
    }

    /// Forget everything and delete the artifact ("start new diagram").
    pub fn reset(&mut self, artifacts: &ArtifactStore) -> Result<()> {
        *self = Self::default();
        artifacts.clear()
    }

    pub fn has_diagram(&self) -> bool {
        self.image.is_some()
    }

    pub fn feedback_rounds(&self) -> u32 {
        self.feedback_rounds
    }

    pub fn original_prompt(&self) -> Option<&str> {
        self.original_prompt.as_deref()
    }

    pub fn image(&self) -> Option<&ArtifactInfo> {
        self.image.as_ref()
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn last_report(&self) -> Option<&ExecutionReport> {
        self.last_report.as_ref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }
}
