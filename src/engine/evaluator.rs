//! Condition evaluator - decides whether a step's gate holds

use crate::core::{ConditionKind, ConditionSpec, SessionState};
use crate::model::{ChatMessage, ModelClient};
use regex::RegexBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

/// Default system prompt for `llm-check` conditions
const DEFAULT_CHECK_PROMPT: &str = "Decide whether the user's message is a meaningful answer \
to the current question. Reply with only \"yes\" or \"no\".";

/// Outcome of evaluating a condition
///
/// Failures are data, not errors: the orchestrator turns `error` into a
/// re-prompt message. `route_to` carries an `llm-routing` suggestion and is
/// consumed within the same turn; it never lands in durable state.
#[derive(Debug, Clone, Default)]
pub struct ConditionOutcome {
    pub passed: bool,
    pub error: Option<String>,
    pub route_to: Option<String>,
}

impl ConditionOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            error: None,
            route_to: None,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            error: Some(error.into()),
            route_to: None,
        }
    }

    /// Whether the orchestrator may advance past the gate
    ///
    /// An `llm-routing` reply that names a next step satisfies the condition
    /// even when the model reported `passed: false`.
    pub fn satisfied(&self) -> bool {
        self.passed || self.route_to.is_some()
    }
}

/// Shape of an `llm-routing` model reply
#[derive(Debug, Deserialize)]
struct RoutingReply {
    #[serde(default)]
    passed: bool,
    #[serde(default, alias = "nextStep")]
    next_step: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Evaluates condition specifications against session state
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a condition
    ///
    /// Model-client failures inside the evaluator are caught and reported as
    /// a generic evaluation error; nothing here raises to the orchestrator.
    pub async fn evaluate(
        spec: &ConditionSpec,
        state: &SessionState,
        user_message: Option<&str>,
        model: &dyn ModelClient,
    ) -> ConditionOutcome {
        match &spec.kind {
            ConditionKind::Exists { variable } => Self::check_exists(variable.as_deref(), state),
            ConditionKind::Length {
                min_length,
                max_length,
            } => Self::check_length(*min_length, *max_length, user_message),
            ConditionKind::Contains { values } => Self::check_contains(values.as_ref(), user_message),
            ConditionKind::Regex { pattern } => Self::check_regex(pattern.as_deref(), user_message),
            ConditionKind::LlmCheck { llm_prompt } => {
                Self::check_llm(llm_prompt.as_deref(), user_message, model).await
            }
            ConditionKind::LlmRouting { routing_condition } => {
                Self::check_routing(routing_condition.as_deref(), state, user_message, model).await
            }
            ConditionKind::Custom { .. } => ConditionOutcome::fail("Unknown condition type"),
        }
    }

    fn check_exists(variable: Option<&str>, state: &SessionState) -> ConditionOutcome {
        let Some(name) = variable else {
            return ConditionOutcome::fail("Variable name not specified");
        };
        if state.field_present(name) {
            ConditionOutcome::pass()
        } else {
            ConditionOutcome::fail(format!("Variable '{}' is not set", name))
        }
    }

    fn check_length(
        min_length: Option<usize>,
        max_length: Option<usize>,
        user_message: Option<&str>,
    ) -> ConditionOutcome {
        let Some(message) = user_message else {
            return ConditionOutcome::fail("User message required for length check");
        };
        let len = message.trim().chars().count();
        let min = min_length.unwrap_or(0);
        let max = max_length.unwrap_or(usize::MAX);
        if len >= min && len <= max {
            ConditionOutcome::pass()
        } else {
            ConditionOutcome::fail(format!(
                "Message length {} is outside the allowed range {}..={}",
                len, min, max
            ))
        }
    }

    fn check_contains(
        values: Option<&crate::core::OneOrMany>,
        user_message: Option<&str>,
    ) -> ConditionOutcome {
        let Some(message) = user_message else {
            return ConditionOutcome::fail("User message required for contains check");
        };
        let values: Vec<&str> = values.map(|v| v.values()).unwrap_or_default();
        if values.is_empty() {
            return ConditionOutcome::fail("No values specified for contains check");
        }
        let haystack = message.to_lowercase();
        if values.iter().any(|v| haystack.contains(&v.to_lowercase())) {
            ConditionOutcome::pass()
        } else {
            ConditionOutcome::fail("Message does not contain any of the expected values")
        }
    }

    fn check_regex(pattern: Option<&str>, user_message: Option<&str>) -> ConditionOutcome {
        let Some(pattern) = pattern else {
            return ConditionOutcome::fail("Pattern not specified");
        };
        let Some(message) = user_message else {
            return ConditionOutcome::fail("User message required for pattern check");
        };
        let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(r) => r,
            Err(e) => return ConditionOutcome::fail(format!("Invalid pattern: {}", e)),
        };
        if regex.is_match(message) {
            ConditionOutcome::pass()
        } else {
            ConditionOutcome::fail("Message does not match the expected pattern")
        }
    }

    async fn check_llm(
        llm_prompt: Option<&str>,
        user_message: Option<&str>,
        model: &dyn ModelClient,
    ) -> ConditionOutcome {
        let Some(message) = user_message else {
            return ConditionOutcome::fail("User message required for model check");
        };
        let system = llm_prompt.unwrap_or(DEFAULT_CHECK_PROMPT);
        let messages = vec![ChatMessage::system(system), ChatMessage::user(message)];

        let reply = match model.complete(&messages).await {
            Ok(r) => r.content,
            Err(e) => {
                warn!("Model call failed during condition check: {}", e);
                return ConditionOutcome::fail("Error checking condition");
            }
        };

        let normalized = reply.trim().to_lowercase();
        if normalized.starts_with("yes") || normalized.starts_with("да") {
            ConditionOutcome::pass()
        } else {
            ConditionOutcome::fail("Answer did not satisfy the check")
        }
    }

    async fn check_routing(
        routing_condition: Option<&str>,
        state: &SessionState,
        user_message: Option<&str>,
        model: &dyn ModelClient,
    ) -> ConditionOutcome {
        let condition = routing_condition.unwrap_or("decide which step should come next");
        let prompt = format!(
            "You are routing a guided conversation.\n\
             Conversation state so far:\n{}\n\
             Latest user message: {}\n\n\
             Condition to judge: {}\n\n\
             Reply with a JSON object of the form \
             {{\"passed\": true|false, \"nextStep\": \"<step id>\", \"reason\": \"...\"}}. \
             Set nextStep to the step that should run next.",
            state.describe(),
            user_message.unwrap_or("(none)"),
            condition
        );
        let messages = vec![ChatMessage::system(prompt)];

        let reply = match model.complete(&messages).await {
            Ok(r) => r.content,
            Err(e) => {
                warn!("Model call failed during routing: {}", e);
                return ConditionOutcome::fail("Error checking condition");
            }
        };

        let Some(json) = extract_json_object(&reply) else {
            return ConditionOutcome::fail("Could not parse routing response");
        };

        let parsed: RoutingReply = match serde_json::from_str(&json) {
            Ok(p) => p,
            Err(e) => {
                debug!("Routing reply JSON did not parse: {}", e);
                return ConditionOutcome::fail("Could not parse routing response");
            }
        };

        let route_to = parsed.next_step.filter(|s| !s.trim().is_empty());
        ConditionOutcome {
            // A supplied next step satisfies the gate even on passed:false,
            // letting the model route to an else-branch step.
            passed: parsed.passed || route_to.is_some(),
            error: if parsed.passed || route_to.is_some() {
                None
            } else {
                Some("Routing condition not satisfied".to_string())
            },
            route_to,
        }
    }
}

/// Extract the first balanced-brace JSON object from free-form text
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
