//! Model-driven routing between steps

mod common;

use common::{engine_with, MockModel};
use convoflow::SessionState;

const ROUTED_PROGRAM: &str = r#"{
  "name": "default",
  "steps": {
    "triage": {
      "question": "What would you like to talk about?",
      "responseField": "topic",
      "condition": {
        "type": "llm-routing",
        "params": { "routingCondition": "pick the step matching the user's topic" }
      }
    },
    "work": { "question": "What happened at work?" },
    "family": { "question": "What happened at home?" }
  }
}"#;

#[tokio::test]
async fn test_routing_suggestion_moves_to_named_step() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockModel::new(vec![
        r#"{"passed": true, "nextStep": "family", "reason": "mentions parents"}"#,
    ]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model).await;

    let state = SessionState::new("s1", "default", "triage");
    let outcome = engine
        .process_message("s1", "my parents and I keep arguing", Some(state), None)
        .await
        .unwrap();

    assert_eq!(outcome.state.current_step, "family");
    assert_eq!(outcome.message, "What happened at home?");
}

#[tokio::test]
async fn test_routing_overrides_failed_gate() {
    let dir = tempfile::tempdir().unwrap();
    // passed:false with a nextStep still satisfies the gate and routes.
    let model = MockModel::new(vec![r#"{"passed": false, "nextStep": "work"}"#]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model).await;

    let state = SessionState::new("s1", "default", "triage");
    let outcome = engine
        .process_message("s1", "my boss again", Some(state), None)
        .await
        .unwrap();

    assert_eq!(outcome.state.current_step, "work");
    assert_eq!(outcome.message, "What happened at work?");
}

#[tokio::test]
async fn test_routing_suggestion_leaves_no_residue_in_state() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockModel::new(vec![r#"{"passed": true, "nextStep": "work"}"#]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model).await;

    let state = SessionState::new("s1", "default", "triage");
    let outcome = engine
        .process_message("s1", "deadlines", Some(state), None)
        .await
        .unwrap();

    let serialized = serde_json::to_value(&outcome.state).unwrap();
    let keys: Vec<&String> = serialized.as_object().unwrap().keys().collect();
    assert!(
        !keys.iter().any(|k| k.contains("Routing") || k.contains("route")),
        "unexpected routing residue in state: {:?}",
        keys
    );
}

#[tokio::test]
async fn test_unknown_routing_suggestion_falls_back_to_order() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockModel::new(vec![r#"{"passed": true, "nextStep": "nonexistent"}"#]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model).await;

    let state = SessionState::new("s1", "default", "triage");
    let outcome = engine
        .process_message("s1", "deadlines", Some(state), None)
        .await
        .unwrap();

    // "work" follows "triage" positionally.
    assert_eq!(outcome.state.current_step, "work");
}

#[tokio::test]
async fn test_routing_reply_wrapped_in_prose_still_parses() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockModel::new(vec![
        "Sure, here is my decision: {\"passed\": true, \"nextStep\": \"family\"} hope that helps!",
    ]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model).await;

    let state = SessionState::new("s1", "default", "triage");
    let outcome = engine
        .process_message("s1", "my sister", Some(state), None)
        .await
        .unwrap();

    assert_eq!(outcome.state.current_step, "family");
}

#[tokio::test]
async fn test_malformed_routing_reply_reprompts() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockModel::new(vec!["I really cannot tell."]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model).await;

    let state = SessionState::new("s1", "default", "triage");
    let outcome = engine
        .process_message("s1", "hmm", Some(state), None)
        .await
        .unwrap();

    assert_eq!(outcome.message, "Could not parse routing response");
    assert_eq!(outcome.state.current_step, "triage");
}

#[tokio::test]
async fn test_routing_prompt_includes_recorded_answers() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockModel::new(vec![r#"{"passed": true, "nextStep": "work"}"#]);
    let engine = engine_with(dir.path(), &[("default.json", ROUTED_PROGRAM)], model.clone()).await;

    let mut state = SessionState::new("s1", "default", "triage");
    state.set_field("mood", serde_json::json!("tired"));
    engine
        .process_message("s1", "deadlines", Some(state), None)
        .await
        .unwrap();

    let prompt = model.last_prompt();
    assert!(prompt.contains("mood: tired"), "got: {prompt}");
    // The reply captured this turn is visible to the router too.
    assert!(prompt.contains("topic: deadlines"), "got: {prompt}");
}
