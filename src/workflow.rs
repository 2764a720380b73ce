//! The generate → execute → feedback loop.
//!
//! A three-node graph: `Generate` asks the model for code, `Execute` runs the
//! latest code and promotes the image, `Feedback` asks for a change and either
//! ends the session or routes back to `Generate`.

use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::{info, warn};

use crate::ai::{self, ChatModel, LlmSettings};
use crate::artifact::{ArtifactStore, Promotion};
use crate::config::Settings;
use crate::error::SetupError;
use crate::executor::{CodeRunner, InterpreterRunner};
use crate::prompt;
use crate::state::SessionState;

/// Feedback that ends the loop, compared case-insensitively.
pub const ACCEPT_KEYWORD: &str = "ok";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Generate,
    Execute,
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(Node),
    End,
}

/// What one execute step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub iteration: u32,
    pub code: String,
    /// Interpreter output, or the formatted error line.
    pub output: String,
    pub promotion: Promotion,
}

impl ExecutionReport {
    /// The run wrote a fresh PNG to the artifact path.
    pub fn succeeded(&self) -> bool {
        self.promotion.is_updated()
    }

    /// One line suitable for a status bar.
    pub fn summary(&self) -> String {
        match &self.promotion {
            Promotion::Updated(info) => format!("Diagram generated: {}", info.path.display()),
            Promotion::Missing if self.output.starts_with('❌') => self.output.clone(),
            Promotion::Missing => "Diagram generation failed: no image was written".to_string(),
            Promotion::NotPng => "Diagram generation failed: output is not a PNG".to_string(),
        }
    }
}

/// State handed back from a cycle, together with how it went.
pub struct CycleOutcome {
    pub state: SessionState,
    pub result: Result<ExecutionReport>,
}

/// Where feedback comes from between cycles in the interactive loop.
pub trait FeedbackSource {
    fn next_feedback(&mut self, report: &ExecutionReport) -> Result<String>;
}

#[derive(Clone)]
pub struct WorkflowController {
    model: Arc<dyn ChatModel>,
    runner: Arc<dyn CodeRunner>,
    artifacts: ArtifactStore,
    llm: LlmSettings,
}

impl WorkflowController {
    pub fn new(
        model: Arc<dyn ChatModel>,
        runner: Arc<dyn CodeRunner>,
        artifacts: ArtifactStore,
        llm: LlmSettings,
    ) -> Self {
        Self {
            model,
            runner,
            artifacts,
            llm,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        let model = ai::build_client(settings)?;
        let runner = Arc::new(InterpreterRunner::new(&settings.python, settings.exec_timeout));
        Ok(Self::new(
            model,
            runner,
            ArtifactStore::new(&settings.output_dir),
            LlmSettings {
                model: settings.model.clone(),
                temperature: settings.temperature,
            },
        ))
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn llm(&self) -> &LlmSettings {
        &self.llm
    }

    /// Generate node: ask the model for code and append it to the history.
    pub async fn generate(&self, state: &mut SessionState) -> Result<()> {
        let messages = prompt::build_messages(state);
        info!(
            iteration = state.iteration + 1,
            model = %self.llm.model,
            revision = !state.feedback.trim().is_empty(),
            "Requesting diagram code"
        );

        let reply = self.model.complete(&self.llm, &messages).await?;
        let code = prompt::extract_code(&reply);
        if code.is_empty() {
            return Err(anyhow!("The model returned an empty reply"));
        }

        state.push_code(code);
        Ok(())
    }

    /// Execute node: run the latest code in a scratch directory and promote its image.
    pub async fn execute(&self, state: &SessionState) -> Result<ExecutionReport> {
        let code = state
            .latest_code()
            .ok_or_else(|| anyhow!("No generated code to execute"))?
            .to_string();

        let scratch = tempfile::Builder::new().prefix("diagramgen-").tempdir()?;
        let run = self.runner.run(&code, scratch.path()).await;
        let promotion = self.artifacts.promote(scratch.path())?;

        if promotion.is_updated() {
            info!(iteration = state.iteration, "Diagram generated");
        } else {
            warn!(iteration = state.iteration, exit_code = ?run.exit_code, output = %run.output, "Run did not produce a diagram");
        }

        Ok(ExecutionReport {
            iteration: state.iteration,
            code,
            output: run.output,
            promotion,
        })
    }

    /// Conditional edge out of the feedback node.
    pub fn route(feedback: &str) -> Transition {
        let feedback = feedback.trim();
        if feedback.is_empty() || feedback.eq_ignore_ascii_case(ACCEPT_KEYWORD) {
            Transition::End
        } else {
            Transition::To(Node::Generate)
        }
    }

    /// Generate then execute.
    pub async fn run_cycle(&self, state: &mut SessionState) -> Result<ExecutionReport> {
        self.generate(state).await?;
        self.execute(state).await
    }

    /// Owned variant of [`run_cycle`](Self::run_cycle) for background tasks.
    pub async fn cycle(&self, mut state: SessionState) -> CycleOutcome {
        let result = self.run_cycle(&mut state).await;
        CycleOutcome { state, result }
    }

    /// Walk the graph until the feedback source accepts the diagram.
    pub async fn run<F: FeedbackSource>(&self, mut state: SessionState, source: &mut F) -> Result<SessionState> {
        let mut node = Node::Generate;
        let mut last_report = None;

        loop {
            node = match node {
                Node::Generate => {
                    self.generate(&mut state).await?;
                    Node::Execute
                }
                Node::Execute => {
                    last_report = Some(self.execute(&state).await?);
                    Node::Feedback
                }
                Node::Feedback => {
                    let report = last_report
                        .take()
                        .ok_or_else(|| anyhow!("Feedback requested before any run"))?;
                    state.feedback = source.next_feedback(&report)?.trim().to_string();
                    match Self::route(&state.feedback) {
                        Transition::To(next) => next,
                        Transition::End => break,
                    }
                }
            };
        }

        info!(iterations = state.iteration, "Session finished");
        Ok(state)
    }
}
