//! Step executor - produces the assistant message for one step

use crate::core::{ExtractListSpec, SessionState, StepDef};
use crate::engine::EngineError;
use crate::model::{ChatMessage, ModelClient};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

/// The output of executing a step
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The assistant-facing message
    pub message: String,

    /// Field updates to merge into session state
    pub updates: Vec<(String, Value)>,
}

/// Executes step definitions against session state
pub struct StepExecutor;

impl StepExecutor {
    /// Execute a step: render its prompt and invoke the model, or return the
    /// static question verbatim
    ///
    /// A step with neither a system prompt nor a question is a malformed
    /// document and fails loudly. Model errors propagate uncaught - the
    /// caller treats them as a failed turn, unlike soft condition failures.
    pub async fn execute(
        program_name: &str,
        step_id: &str,
        step: &StepDef,
        state: &SessionState,
        model: &dyn ModelClient,
    ) -> Result<StepOutput, EngineError> {
        if let Some(template) = step.system_prompt.as_deref().filter(|t| !t.trim().is_empty()) {
            let prompt = render_template(template, state);
            debug!("Rendered prompt for step {}: {}", step_id, prompt);

            let response = model.complete(&[ChatMessage::system(prompt)]).await?;
            let message = response.content;

            let mut updates = Vec::new();
            if let Some(extract) = &step.extract_list {
                let items = extract_items(&message, extract);
                info!(
                    "Extracted {} item(s) into '{}' for step {}",
                    items.len(),
                    extract.field,
                    step_id
                );
                updates.push((
                    extract.field.clone(),
                    Value::Array(items.into_iter().map(Value::String).collect()),
                ));
            }

            return Ok(StepOutput { message, updates });
        }

        if let Some(question) = &step.question {
            // Static question: no model call.
            return Ok(StepOutput {
                message: question.clone(),
                updates: Vec::new(),
            });
        }

        Err(EngineError::InvalidStep {
            program: program_name.to_string(),
            step: step_id.to_string(),
        })
    }
}

/// Interpolate `{field}` placeholders against session state
///
/// Known fields render with lists joined by ", "; unknown placeholders render
/// as the empty string. Never fails on an unset field.
pub fn render_template(template: &str, state: &SessionState) -> String {
    let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex");
    placeholder
        .replace_all(template, |caps: &regex::Captures<'_>| {
            state.render_field(&caps[1])
        })
        .into_owned()
}

/// Collect list items from a model reply
///
/// Lines starting with a bullet marker are always collected; lines containing
/// a cue substring are collected too. Heuristic, not a parser: when nothing
/// matches, the whole reply becomes a single-element list.
fn extract_items(reply: &str, spec: &ExtractListSpec) -> Vec<String> {
    let numbered = Regex::new(r"^\d+[.)]\s*").expect("static regex");
    let cues: Vec<String> = spec.cues.iter().map(|c| c.to_lowercase()).collect();

    let mut items = Vec::new();
    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('-').or_else(|| trimmed.strip_prefix('•')) {
            items.push(rest.trim().to_string());
        } else if numbered.is_match(trimmed) {
            items.push(numbered.replace(trimmed, "").trim().to_string());
        } else {
            let lower = trimmed.to_lowercase();
            if cues.iter().any(|c| lower.contains(c)) {
                items.push(trimmed.to_string());
            }
        }
    }

    if items.is_empty() {
        items.push(reply.trim().to_string());
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, ModelResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedModel {
        reply: String,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for FixedModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ModelResponse::new(self.reply.clone()))
        }
    }

    fn step_with_prompt(prompt: &str) -> StepDef {
        serde_json::from_value(json!({"systemPrompt": prompt})).unwrap()
    }

    #[test]
    fn test_render_template_missing_fields_blank() {
        let mut state = SessionState::new("s1", "default", "emotion");
        state.set_field("problem", json!("exams"));

        let rendered = render_template("About {problem} and {emotion}.", &state);
        assert_eq!(rendered, "About exams and .");
    }

    #[test]
    fn test_render_template_joins_lists() {
        let mut state = SessionState::new("s1", "default", "founder");
        state.set_field("botIdeas", json!(["rest", "walk"]));

        let rendered = render_template("Ideas so far: {botIdeas}", &state);
        assert_eq!(rendered, "Ideas so far: rest, walk");
    }

    #[tokio::test]
    async fn test_static_question_skips_model() {
        let step: StepDef = serde_json::from_value(json!({"question": "How do you feel?"})).unwrap();
        let model = FixedModel::new("should not be used");
        let state = SessionState::new("s1", "default", "emotion");

        let output = StepExecutor::execute("default", "emotion", &step, &state, &model)
            .await
            .unwrap();
        assert_eq!(output.message, "How do you feel?");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_step_definition_is_fatal() {
        let step: StepDef = serde_json::from_value(json!({})).unwrap();
        let model = FixedModel::new("");
        let state = SessionState::new("s1", "default", "broken");

        let result = StepExecutor::execute("default", "broken", &step, &state, &model).await;
        assert!(matches!(result, Err(EngineError::InvalidStep { .. })));
    }

    #[tokio::test]
    async fn test_extract_list_bullets() {
        let step: StepDef = serde_json::from_value(json!({
            "systemPrompt": "Suggest ideas for {problem}",
            "extractList": {"field": "botIdeas"}
        }))
        .unwrap();
        let model = FixedModel::new("Here are some ideas:\n- rest more\n• take a walk\n3. call a friend");
        let state = SessionState::new("s1", "default", "ideas");

        let output = StepExecutor::execute("default", "ideas", &step, &state, &model)
            .await
            .unwrap();
        let (field, value) = &output.updates[0];
        assert_eq!(field, "botIdeas");
        assert_eq!(*value, json!(["rest more", "take a walk", "call a friend"]));
    }

    #[tokio::test]
    async fn test_extract_list_cue_lines() {
        let step: StepDef = serde_json::from_value(json!({
            "systemPrompt": "Why might this be?",
            "extractList": {"field": "purposeOptions", "cues": ["perhaps", "may be"]}
        }))
        .unwrap();
        let model = FixedModel::new("Perhaps you fear failure.\nUnrelated sentence.\nIt may be about control.");
        let state = SessionState::new("s1", "default", "purpose");

        let output = StepExecutor::execute("default", "purpose", &step, &state, &model)
            .await
            .unwrap();
        let (_, value) = &output.updates[0];
        assert_eq!(
            *value,
            json!(["Perhaps you fear failure.", "It may be about control."])
        );
    }

    #[tokio::test]
    async fn test_extract_list_fallback_whole_reply() {
        let step: StepDef = serde_json::from_value(json!({
            "systemPrompt": "Suggest ideas",
            "extractList": {"field": "botIdeas"}
        }))
        .unwrap();
        let model = FixedModel::new("Just one unmarked suggestion.");
        let state = SessionState::new("s1", "default", "ideas");

        let output = StepExecutor::execute("default", "ideas", &step, &state, &model)
            .await
            .unwrap();
        let (_, value) = &output.updates[0];
        assert_eq!(*value, json!(["Just one unmarked suggestion."]));
    }

    #[tokio::test]
    async fn test_model_reply_is_message() {
        let step = step_with_prompt("Ask about {problem}");
        let model = FixedModel::new("Tell me more about the exams.");
        let mut state = SessionState::new("s1", "default", "problem");
        state.set_field("problem", json!("exams"));

        let output = StepExecutor::execute("default", "problem", &step, &state, &model)
            .await
            .unwrap();
        assert_eq!(output.message, "Tell me more about the exams.");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
