//! Program documents - named step-graph definitions loaded from JSON

use crate::core::condition::ConditionSpec;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named, versioned definition of a conversational flow
///
/// Programs are immutable per load: the [`ProgramStore`](crate::store::ProgramStore)
/// replaces them wholesale on reload and never mutates them in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Program name (identity - sessions reference programs by name)
    pub name: String,

    /// Program version, part of the model-client cache key
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Steps, keyed by step id; iteration order is document order
    pub steps: IndexMap<String, StepDef>,

    /// Explicit step ordering; falls back to the `steps` key order when absent
    #[serde(default)]
    pub step_order: Option<Vec<String>>,

    /// Model parameters for this program
    #[serde(default)]
    pub settings: ModelSettings,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One node in a program's step graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDef {
    /// Static question returned verbatim when no system prompt is set
    #[serde(default)]
    pub question: Option<String>,

    /// Prompt template rendered against session state and sent to the model
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Gating condition evaluated when leaving (or entering) this step
    #[serde(default)]
    pub condition: Option<ConditionSpec>,

    /// Explicit transition target; overrides positional ordering
    #[serde(default)]
    pub next_step: Option<String>,

    /// Skip past this step when its entry condition fails
    #[serde(default)]
    pub skip_if_condition_fails: bool,

    /// State field the user's reply to this step is recorded into
    #[serde(default)]
    pub response_field: Option<String>,

    /// Store the reply as a replacing single-element list instead of a string
    #[serde(default)]
    pub response_as_list: bool,

    /// Extract a list from the model's reply into a state field
    #[serde(default)]
    pub extract_list: Option<ExtractListSpec>,
}

/// List-extraction declaration for a step's model reply
///
/// Lines starting with a bullet marker (`-`, `•`, `1.`, `1)`) are always
/// collected; lines containing any of the configured cue substrings are
/// collected as well. When nothing matches, the whole reply becomes a
/// single-element list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractListSpec {
    /// State field the extracted list is written to
    pub field: String,

    /// Case-insensitive cue substrings that mark a line as a list item
    #[serde(default)]
    pub cues: Vec<String>,
}

/// Model invocation parameters, sourced from the program document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Summary view of a program for discovery listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

impl Program {
    /// Load a program document from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read program file {}", path.as_ref().display()))?;
        Self::from_json(&content)
    }

    /// Parse a program document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let program: Program = serde_json::from_str(json).context("Invalid program document")?;
        program.validate()?;
        Ok(program)
    }

    /// Structural validation of the step graph
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Program name must not be empty");
        }
        if self.steps.is_empty() {
            anyhow::bail!("Program '{}' defines no steps", self.name);
        }

        if let Some(order) = &self.step_order {
            for step_id in order {
                if !self.steps.contains_key(step_id) {
                    anyhow::bail!(
                        "Program '{}' step order references non-existent step '{}'",
                        self.name,
                        step_id
                    );
                }
            }
        }

        for (step_id, step) in &self.steps {
            if let Some(next) = &step.next_step {
                if !self.steps.contains_key(next) {
                    anyhow::bail!(
                        "Step '{}' next step references non-existent step '{}'",
                        step_id,
                        next
                    );
                }
            }
        }

        Ok(())
    }

    /// Get a step definition by id
    pub fn step(&self, id: &str) -> Option<&StepDef> {
        self.steps.get(id)
    }

    /// The id of the session's entry step
    pub fn initial_step(&self) -> Option<&str> {
        if let Some(order) = &self.step_order {
            if let Some(first) = order.first() {
                return Some(first.as_str());
            }
        }
        self.steps.keys().next().map(|s| s.as_str())
    }

    /// Resolve the positional successor of a step
    ///
    /// Tries the `step_order` successor first, then the document order of
    /// the `steps` map. Returns `None` past the last position.
    pub fn step_after(&self, step_id: &str) -> Option<&str> {
        if let Some(order) = &self.step_order {
            if let Some(pos) = order.iter().position(|s| s == step_id) {
                if let Some(next) = order.get(pos + 1) {
                    return Some(next.as_str());
                }
            }
        }
        let pos = self.steps.get_index_of(step_id)?;
        self.steps.get_index(pos + 1).map(|(id, _)| id.as_str())
    }

    /// Summary view for discovery listings
    pub fn summary(&self) -> ProgramSummary {
        ProgramSummary {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }
}
