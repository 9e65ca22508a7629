//! convoflow CLI entry point

use anyhow::{Context, Result};
use convoflow::cli::output::*;
use convoflow::cli::{ChatCommand, Cli, Command, ListCommand, ValidateCommand};
use convoflow::core::Program;
use convoflow::engine::PipelineEngine;
use convoflow::model::{ModelClientConfig, SubprocessModelFactory};
use convoflow::persistence::{InMemorySessionStore, SessionBackend};
use convoflow::store::ProgramStore;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let store = Arc::new(ProgramStore::new(&cli.programs, cli.reload.into()));
    store.load().await?;

    match &cli.command {
        Command::Chat(cmd) => run_chat(cmd, &cli, store).await?,
        Command::List(cmd) => list_programs(cmd, store).await?,
        Command::Validate(cmd) => validate_program(cmd)?,
    }

    Ok(())
}

async fn run_chat(cmd: &ChatCommand, cli: &Cli, store: Arc<ProgramStore>) -> Result<()> {
    let session_id = cmd
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("{} Session: {}", INFO, style(&session_id).dim());

    let backend = open_backend(cmd.no_history).await?;

    let mut model_config = ModelClientConfig::default();
    if let Some(command) = &cli.model_cmd {
        model_config = model_config.with_command(command.clone());
    }
    let engine = PipelineEngine::new(store, Arc::new(SubprocessModelFactory::new(model_config)));

    let program = cmd.program.as_deref();
    let mut state = backend.load_state(&session_id).await?;

    // First turn of a fresh session runs before any user input.
    if state.is_none() {
        let outcome = engine.process_message(&session_id, "", None, program).await?;
        println!("{}", format_assistant_message(&outcome.message));
        if !cmd.no_history {
            backend.save_state(&outcome.state).await?;
        }
        state = Some(outcome.state);
    } else {
        println!("{} Resuming existing session", INFO);
    }

    let stdin = std::io::stdin();
    loop {
        print!("{} ", style("you>").cyan().bold());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        let outcome = engine
            .process_message(&session_id, message, state.take(), program)
            .await?;
        println!("{}", format_assistant_message(&outcome.message));
        if !cmd.no_history {
            backend.save_state(&outcome.state).await?;
        }

        let completed = outcome.state.completed;
        state = Some(outcome.state);
        if completed {
            println!("{} Session complete", CHECK);
            break;
        }
    }

    Ok(())
}

async fn list_programs(cmd: &ListCommand, store: Arc<ProgramStore>) -> Result<()> {
    let summaries = store.list().await;

    if summaries.is_empty() {
        println!("{} No programs found", WARN);
        return Ok(());
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        println!("{} Available programs:", INFO);
        for summary in &summaries {
            println!("  {}", format_program_summary(summary));
        }
    }

    Ok(())
}

fn validate_program(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating program...", INFO);

    match Program::from_file(&cmd.file) {
        Ok(program) => {
            println!("{} Program document is valid!", CHECK);
            println!("  Name: {}", style(&program.name).bold());
            println!("  Version: {}", style(&program.version).cyan());
            println!("  Steps: {}", style(program.steps.len()).cyan());

            if cmd.json {
                println!("\n{}", serde_json::to_string_pretty(&program)?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "sqlite")]
async fn open_backend(no_history: bool) -> Result<Arc<dyn SessionBackend>> {
    use convoflow::persistence::SqliteSessionStore;

    if no_history {
        Ok(Arc::new(InMemorySessionStore::new()))
    } else {
        Ok(Arc::new(SqliteSessionStore::with_default_path().await?))
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_backend(_no_history: bool) -> Result<Arc<dyn SessionBackend>> {
    Ok(Arc::new(InMemorySessionStore::new()))
}
