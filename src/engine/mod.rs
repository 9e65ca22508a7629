//! The conversational pipeline engine

pub mod evaluator;
pub mod executor;
pub mod orchestrator;

use crate::core::SessionState;
use crate::model::ModelError;
use thiserror::Error;

pub use evaluator::{ConditionEvaluator, ConditionOutcome};
pub use executor::{StepExecutor, StepOutput};
pub use orchestrator::PipelineEngine;

/// Message returned on the turn that resolves past the last step
pub const COMPLETION_MESSAGE: &str =
    "We have reached the end of this program. Thank you for the conversation.";

/// Fatal engine errors
///
/// These indicate a data or configuration inconsistency, not bad user input;
/// recoverable condition failures are data values, never errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("Step '{step}' not found in program '{program}'")]
    StepNotFound { program: String, step: String },

    #[error("Step '{step}' in program '{program}' has neither a system prompt nor a question")]
    InvalidStep { program: String, step: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// The result of one pipeline turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant-facing message
    pub message: String,

    /// Updated session state; the caller must persist this before the next turn
    pub state: SessionState,
}
