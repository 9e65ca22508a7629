//! Pipeline orchestrator - drives the per-turn control flow

use crate::core::{Program, SessionState, StepDef};
use crate::engine::{
    ConditionEvaluator, EngineError, StepExecutor, TurnOutcome, COMPLETION_MESSAGE,
};
use crate::model::{ModelCache, ModelClient, ModelFactory};
use crate::store::{ProgramStore, DEFAULT_PROGRAM};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fallback re-prompt when a condition fails without a configured message
const GENERIC_REPROMPT: &str = "Please try answering again.";

/// The conversational pipeline engine
///
/// One call to [`process_message`](Self::process_message) fully resolves one
/// turn. The engine is purely functional over session state: it receives the
/// prior state and returns the updated copy; persistence and per-session
/// serialization of turns belong to the caller.
pub struct PipelineEngine {
    store: Arc<ProgramStore>,
    models: ModelCache,
}

impl PipelineEngine {
    pub fn new(store: Arc<ProgramStore>, factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            store,
            models: ModelCache::new(factory),
        }
    }

    /// Process one turn of a session
    ///
    /// With no prior state this is the session's first turn: the program's
    /// initial step executes directly and no user input is validated. On
    /// every later turn the user's reply is recorded, the current step's
    /// condition is evaluated, the next step is resolved (routing suggestion,
    /// explicit transition, then positional order), and that step executes.
    pub async fn process_message(
        &self,
        session_id: &str,
        user_message: &str,
        prior_state: Option<SessionState>,
        program_name: Option<&str>,
    ) -> Result<TurnOutcome, EngineError> {
        let requested = program_name
            .map(str::to_string)
            .or_else(|| prior_state.as_ref().map(|s| s.program_name.clone()))
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());

        let program = self
            .store
            .get(&requested)
            .await
            .ok_or_else(|| EngineError::ProgramNotFound(requested.clone()))?;
        let model =
            self.models
                .client_for(&program.name, &program.version, &program.settings);

        let Some(mut state) = prior_state else {
            return self.first_turn(session_id, &program, model.as_ref()).await;
        };

        if state.completed {
            // Terminal: completed sessions accept no further mutation.
            debug!("Session {} is already completed", session_id);
            return Ok(TurnOutcome {
                message: COMPLETION_MESSAGE.to_string(),
                state,
            });
        }

        let current_id = state.current_step.clone();
        let step = program
            .step(&current_id)
            .ok_or_else(|| EngineError::StepNotFound {
                program: program.name.clone(),
                step: current_id.clone(),
            })?;

        // Record the reply before evaluating, so routing conditions see it.
        if let Some(field) = &step.response_field {
            let value = if step.response_as_list {
                json!([user_message])
            } else {
                json!(user_message)
            };
            state.set_field(field, value);
        }

        let mut route = None;
        if let Some(cond) = &step.condition {
            let outcome =
                ConditionEvaluator::evaluate(cond, &state, Some(user_message), model.as_ref())
                    .await;
            route = outcome.route_to.clone();
            if !outcome.satisfied() && !step.skip_if_condition_fails {
                let message = cond
                    .error_message
                    .clone()
                    .or(outcome.error)
                    .unwrap_or_else(|| GENERIC_REPROMPT.to_string());
                debug!(
                    "Condition failed on step {}, re-prompting session {}",
                    current_id, session_id
                );
                return Ok(TurnOutcome { message, state });
            }
        }

        let Some(mut next_id) = resolve_next(&program, &current_id, step, route) else {
            return Ok(complete(state, session_id));
        };

        // Entry conditions on the destination step, chaining skips.
        let mut hops = 0usize;
        loop {
            let next_step = program
                .step(&next_id)
                .ok_or_else(|| EngineError::StepNotFound {
                    program: program.name.clone(),
                    step: next_id.clone(),
                })?;

            if let Some(cond) = &next_step.condition {
                let outcome =
                    ConditionEvaluator::evaluate(cond, &state, None, model.as_ref()).await;
                if !outcome.passed {
                    if next_step.skip_if_condition_fails {
                        hops += 1;
                        if hops > program.steps.len() {
                            warn!(
                                "Skip chain exceeded step count in program '{}', stopping at '{}'",
                                program.name, next_id
                            );
                            break;
                        }
                        match resolve_next(&program, &next_id, next_step, None) {
                            Some(n) => {
                                debug!("Skipping step {} (entry condition failed)", next_id);
                                next_id = n;
                                continue;
                            }
                            None => return Ok(complete(state, session_id)),
                        }
                    }
                    // Entry conditions are advisory without the skip flag:
                    // the failure is logged and the step runs anyway.
                    debug!(
                        "Entry condition failed on step {}, advancing anyway",
                        next_id
                    );
                }
            }
            break;
        }

        state.current_step = next_id.clone();
        let next_step = program
            .step(&next_id)
            .ok_or_else(|| EngineError::StepNotFound {
                program: program.name.clone(),
                step: next_id.clone(),
            })?;

        let output =
            StepExecutor::execute(&program.name, &next_id, next_step, &state, model.as_ref())
                .await?;
        for (field, value) in output.updates {
            state.set_field(&field, value);
        }

        Ok(TurnOutcome {
            message: output.message,
            state,
        })
    }

    /// Execute the initial step of a brand-new session
    async fn first_turn(
        &self,
        session_id: &str,
        program: &Program,
        model: &dyn ModelClient,
    ) -> Result<TurnOutcome, EngineError> {
        let initial = program
            .initial_step()
            .ok_or_else(|| EngineError::StepNotFound {
                program: program.name.clone(),
                step: "(initial)".to_string(),
            })?;
        let step = program
            .step(initial)
            .ok_or_else(|| EngineError::StepNotFound {
                program: program.name.clone(),
                step: initial.to_string(),
            })?;

        info!(
            "Starting session {} on program '{}' at step {}",
            session_id, program.name, initial
        );

        let mut state = SessionState::new(session_id, &program.name, initial);
        let output = StepExecutor::execute(&program.name, initial, step, &state, model).await?;
        for (field, value) in output.updates {
            state.set_field(&field, value);
        }

        Ok(TurnOutcome {
            message: output.message,
            state,
        })
    }
}

/// Resolve the next step name
///
/// Priority: routing suggestion (ignored with a warning when it names an
/// unknown step), the step's explicit transition, then positional order.
fn resolve_next(
    program: &Program,
    current_id: &str,
    step: &StepDef,
    route: Option<String>,
) -> Option<String> {
    if let Some(route) = route {
        if program.steps.contains_key(&route) {
            info!("Routing to step {} (model suggestion)", route);
            return Some(route);
        }
        warn!(
            "Routing suggestion '{}' is not a step of program '{}', ignoring",
            route, program.name
        );
    }
    if let Some(next) = &step.next_step {
        return Some(next.clone());
    }
    program.step_after(current_id).map(str::to_string)
}

fn complete(mut state: SessionState, session_id: &str) -> TurnOutcome {
    info!("Session {} completed", session_id);
    state.completed = true;
    TurnOutcome {
        message: COMPLETION_MESSAGE.to_string(),
        state,
    }
}
