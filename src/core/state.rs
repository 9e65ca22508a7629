//! Session state - the caller-owned record of progress through a program

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable per-session state
///
/// The engine receives this at the start of a turn and returns the updated
/// copy; it never stores state itself. Answer fields (`problem`, `emotion`,
/// ... in the default program) live in the flattened `fields` map so the
/// engine carries no knowledge of specific step names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Caller-supplied session identifier
    pub session_id: String,

    /// Name of the program this session runs (weak reference, looked up per turn)
    pub program_name: String,

    /// Id of the step the session is currently on
    pub current_step: String,

    /// Terminal flag; no field mutation happens once set
    #[serde(default)]
    pub completed: bool,

    /// When the state was last mutated
    pub updated_at: DateTime<Utc>,

    /// Accumulated answer fields, keyed by the names program documents declare
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

impl SessionState {
    /// Create the state for a brand-new session positioned on `initial_step`
    pub fn new(session_id: &str, program_name: &str, initial_step: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            program_name: program_name.to_string(),
            current_step: initial_step.to_string(),
            completed: false,
            updated_at: Utc::now(),
            fields: IndexMap::new(),
        }
    }

    /// Set an answer field
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
        self.updated_at = Utc::now();
    }

    /// Get an answer field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether a field is present and non-empty
    ///
    /// Null values and empty strings count as absent.
    pub fn field_present(&self, name: &str) -> bool {
        match self.fields.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Render a field for prompt interpolation
    ///
    /// Strings render as-is, lists join with ", ", missing and null fields
    /// render as the empty string.
    pub fn render_field(&self, name: &str) -> String {
        match self.fields.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(value) => render_value(value),
        }
    }

    /// Describe the accumulated fields as lines for a routing prompt
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.fields {
            let rendered = render_value(value);
            if rendered.is_empty() {
                continue;
            }
            out.push_str(&format!("- {}: {}\n", name, rendered));
        }
        if out.is_empty() {
            out.push_str("(no answers recorded yet)\n");
        }
        out
    }
}

/// Render a JSON value as prompt text
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
