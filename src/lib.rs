pub mod ai;
pub mod artifact;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod state;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use ai::{ChatModel, ClaudeClient, LlmSettings, OllamaClient, OpenAIClient};
pub use artifact::{ArtifactInfo, ArtifactStore, Promotion};
pub use config::{Config, Overrides, Settings};
pub use error::{InputError, SetupError};
pub use executor::{CodeRunner, InterpreterRunner, RunOutput};
pub use provider::Provider;
pub use session::{DiagramSession, FeedbackOutcome, Status};
pub use state::SessionState;
pub use workflow::{CycleOutcome, ExecutionReport, FeedbackSource, WorkflowController};
