//! LLM CLI subprocess client - sends the prompt on stdin, reads stdout

use crate::core::ModelSettings;
use crate::model::{ChatMessage, MessageRole, ModelClient, ModelError, ModelResponse};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Client that shells out to an LLM CLI for each request
///
/// Invokes `<command> --model <m> --temperature <t> --max-tokens <n>
/// [--system <prompt>]`, writes the user/assistant turns to stdin, and
/// captures stdout as the reply.
#[derive(Debug, Clone)]
pub struct SubprocessModelClient {
    /// Path to the LLM CLI executable
    command: String,

    /// Model parameters from the program document
    settings: ModelSettings,

    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl SubprocessModelClient {
    pub fn new(command: String, settings: ModelSettings, timeout_secs: u64) -> Self {
        Self {
            command,
            settings,
            timeout_secs,
        }
    }

    /// Get the configured executable path
    #[cfg(test)]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Join the non-system turns into the stdin payload
    fn stdin_payload(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn run(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let system_prompt = messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone());
        let payload = Self::stdin_payload(messages);

        debug!(
            "Spawning model subprocess, payload length: {}",
            payload.len()
        );

        let mut cmd = Command::new(&self.command);
        cmd.args(["--model", &self.settings.model])
            .args(["--temperature", &self.settings.temperature.to_string()])
            .args(["--max-tokens", &self.settings.max_tokens.to_string()]);
        if let Some(system) = &system_prompt {
            cmd.args(["--system", system]);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ModelError::Internal(format!("Failed to spawn model subprocess: {}", e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| ModelError::Internal(format!("Failed to write prompt: {}", e)))?;
        }

        let timeout_duration = Duration::from_secs(self.timeout_secs);
        let output = timeout(timeout_duration, child.wait_with_output())
            .await
            .map_err(|_| ModelError::Timeout(self.timeout_secs))?
            .map_err(|e| ModelError::Internal(format!("Model subprocess failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("model CLI exited with code {}: {}", exit_code, stderr.trim());
            return Err(ModelError::Api(format!(
                "model CLI exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        let content = String::from_utf8(output.stdout)
            .map_err(|e| ModelError::Internal(format!("Failed to decode model output: {}", e)))?;

        debug!("model subprocess returned {} bytes of output", content.len());

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ModelClient for SubprocessModelClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse, ModelError> {
        let content = self.run(messages).await?;
        Ok(ModelResponse::new(content))
    }
}
