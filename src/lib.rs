//! convoflow - a conversational pipeline engine driven by JSON step programs

pub mod cli;
pub mod core;
pub mod engine;
pub mod model;
pub mod persistence;
pub mod store;

// Re-export commonly used types
pub use core::{ConditionKind, ConditionSpec, ModelSettings, Program, SessionState, StepDef};
pub use engine::{ConditionOutcome, EngineError, PipelineEngine, TurnOutcome, COMPLETION_MESSAGE};
pub use model::{ChatMessage, ModelClient, ModelError, ModelFactory, ModelResponse};
pub use store::{ProgramStore, ReloadPolicy};
