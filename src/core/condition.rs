//! Condition specifications - per-step gating predicates

use serde::{Deserialize, Serialize};

/// A step's gating condition as declared in the program document
///
/// The wire shape is `{"type": ..., "params": {...}, "errorMessage": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    #[serde(flatten)]
    pub kind: ConditionKind,

    /// User-facing message shown when the condition rejects the reply
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// Condition kinds and their parameters
///
/// Parameter fields are optional on purpose: a missing parameter is a
/// recoverable evaluation failure, not a document parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
pub enum ConditionKind {
    /// A state field must be present and non-empty
    #[serde(rename_all = "camelCase")]
    Exists {
        #[serde(default)]
        variable: Option<String>,
    },

    /// The user's reply length must fall within inclusive bounds
    #[serde(rename_all = "camelCase")]
    Length {
        #[serde(default)]
        min_length: Option<usize>,
        #[serde(default)]
        max_length: Option<usize>,
    },

    /// The user's reply must contain one of the values (case-insensitive)
    #[serde(rename_all = "camelCase")]
    Contains {
        #[serde(default)]
        values: Option<OneOrMany>,
    },

    /// The user's reply must match a case-insensitive pattern
    #[serde(rename_all = "camelCase")]
    Regex {
        #[serde(default)]
        pattern: Option<String>,
    },

    /// Ask the model a yes/no question about the user's reply
    #[serde(rename_all = "camelCase")]
    LlmCheck {
        #[serde(default)]
        llm_prompt: Option<String>,
    },

    /// Ask the model to pick the next step from the conversation so far
    #[serde(rename_all = "camelCase")]
    LlmRouting {
        #[serde(default)]
        routing_condition: Option<String>,
    },

    /// Reserved; always fails (no sandboxed expression interpreter in scope)
    #[serde(rename_all = "camelCase")]
    Custom {
        #[serde(default)]
        expression: Option<String>,
    },
}

/// A single string or a list of strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// View the values as a slice of string references
    pub fn values(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(s) => vec![s.as_str()],
            OneOrMany::Many(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }
}
