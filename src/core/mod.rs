//! Core domain models for convoflow
//!
//! This module defines the fundamental data structures that represent
//! programs, steps, conditions, and per-session state.

pub mod condition;
pub mod program;
pub mod state;

pub use condition::{ConditionKind, ConditionSpec, OneOrMany};
pub use program::{ExtractListSpec, ModelSettings, Program, ProgramSummary, StepDef};
pub use state::SessionState;
