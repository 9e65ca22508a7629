//! Program store - materializes program documents from a directory

use crate::core::{Program, ProgramSummary};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Name of the program served when a requested name has no match
pub const DEFAULT_PROGRAM: &str = "default";

/// When the store refreshes its cache from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Reload before every lookup (iterative program editing)
    Always,
    /// Reload only when the requested name is not cached
    OnCacheMiss,
    /// Serve from cache only (production)
    Never,
}

/// In-memory, name-keyed cache of program documents
pub struct ProgramStore {
    dir: PathBuf,
    reload: ReloadPolicy,
    programs: RwLock<HashMap<String, Arc<Program>>>,
}

impl ProgramStore {
    pub fn new(dir: impl Into<PathBuf>, reload: ReloadPolicy) -> Self {
        Self {
            dir: dir.into(),
            reload,
            programs: RwLock::new(HashMap::new()),
        }
    }

    /// Scan the directory and rebuild the whole cache
    ///
    /// Malformed documents are logged and skipped. A missing directory is
    /// created empty rather than failing. Returns the number of programs
    /// loaded.
    pub async fn load(&self) -> Result<usize> {
        if !self.dir.exists() {
            warn!(
                "Program directory {} does not exist, creating it",
                self.dir.display()
            );
            std::fs::create_dir_all(&self.dir).with_context(|| {
                format!("Failed to create program directory {}", self.dir.display())
            })?;
        }

        let mut loaded = HashMap::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read program directory {}", self.dir.display()))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Program::from_file(&path) {
                Ok(program) => {
                    debug!("Loaded program '{}' from {}", program.name, path.display());
                    loaded.insert(program.name.clone(), Arc::new(program));
                }
                Err(e) => {
                    warn!("Skipping malformed program {}: {:#}", path.display(), e);
                }
            }
        }

        info!(
            "Loaded {} program(s) from {}",
            loaded.len(),
            self.dir.display()
        );

        let mut programs = self.programs.write().await;
        *programs = loaded;
        Ok(programs.len())
    }

    /// Look up a program by name
    ///
    /// Falls back to the program named `"default"`; returns `None` when
    /// neither exists. Never errors: a failed reload leaves the previous
    /// cache in place and is logged.
    pub async fn get(&self, name: &str) -> Option<Arc<Program>> {
        match self.reload {
            ReloadPolicy::Always => {
                if let Err(e) = self.load().await {
                    warn!("Program reload failed: {:#}", e);
                }
            }
            ReloadPolicy::OnCacheMiss => {
                let missing = !self.programs.read().await.contains_key(name);
                if missing {
                    if let Err(e) = self.load().await {
                        warn!("Program reload failed: {:#}", e);
                    }
                }
            }
            ReloadPolicy::Never => {}
        }

        let programs = self.programs.read().await;
        if let Some(program) = programs.get(name) {
            return Some(program.clone());
        }
        if name != DEFAULT_PROGRAM {
            debug!("Program '{}' not found, falling back to default", name);
            return programs.get(DEFAULT_PROGRAM).cloned();
        }
        None
    }

    /// Summary view of every cached program
    pub async fn list(&self) -> Vec<ProgramSummary> {
        let programs = self.programs.read().await;
        let mut summaries: Vec<ProgramSummary> =
            programs.values().map(|p| p.summary()).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}
