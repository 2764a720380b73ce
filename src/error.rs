use thiserror::Error;

use crate::provider::Provider;

/// Input rejected by the presentation layer before the workflow runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please describe the architecture you want to draw")]
    EmptyDescription,
    #[error("Please describe what should change, or start a new diagram")]
    EmptyFeedback,
    #[error("Generate a diagram before sending feedback")]
    NoDiagramYet,
    #[error("Diagram accepted; press n to start a new one")]
    AlreadyAccepted,
}

/// Problems building a provider client from the resolved settings.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{provider} API key not configured (set {var} or add it to {config})")]
    MissingApiKey {
        provider: Provider,
        var: &'static str,
        config: String,
    },
}
