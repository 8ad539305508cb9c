//! Registry of automation tools loaded at runtime.
//!
//! Definitions are validated as a batch and accepted all-or-nothing. The
//! registry serves them through the `ToolProvider` port, so the built-in
//! automation server is just a `ProtocolServer` over this type.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use toolweave_core::{
    AppEvent, AppEventEmitter, ContentItem, RoutingError, RunnerResult, ToolDefinition, ToolInfo,
    ToolResult, ValidationError, parse_definitions, validate_batch,
};
use toolweave_mcp::ToolProvider;

use crate::engine::AutomationEngine;

/// Server id under which automation tools are registered.
pub const AUTOMATION_SERVER_ID: &str = "automation";

/// Errors from loading a definitions directory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Automation tools currently offered, keyed by name.
pub struct DynamicToolRegistry {
    engine: Arc<AutomationEngine>,
    emitter: Arc<dyn AppEventEmitter>,
    definitions: RwLock<BTreeMap<String, Arc<ToolDefinition>>>,
    live: AtomicBool,
}

impl DynamicToolRegistry {
    pub fn new(engine: Arc<AutomationEngine>, emitter: Arc<dyn AppEventEmitter>) -> Self {
        Self {
            engine,
            emitter,
            definitions: RwLock::new(BTreeMap::new()),
            live: AtomicBool::new(false),
        }
    }

    /// Whether a protocol session is currently serving these tools.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Validate and register a batch, replacing same-named definitions.
    ///
    /// Nothing is registered if any definition is invalid. Returns `true`
    /// only when a name that was not loaded before was added while a session
    /// is live: the session announced its capabilities already and the
    /// automation server must be re-added to expose the new tools.
    pub async fn load_definitions(
        &self,
        defs: Vec<ToolDefinition>,
    ) -> Result<bool, ValidationError> {
        if defs.is_empty() {
            return Ok(false);
        }
        validate_batch(&defs)?;

        let names: Vec<String> = defs.iter().map(|def| def.name.clone()).collect();
        let added_new = {
            let mut definitions = self.definitions.write().await;
            let mut added_new = false;
            for def in defs {
                added_new |= !definitions.contains_key(&def.name);
                definitions.insert(def.name.clone(), Arc::new(def));
            }
            added_new
        };

        let restart_required = added_new && self.is_live();
        tracing::info!(
            count = names.len(),
            restart_required,
            "Loaded automation definitions"
        );
        self.emitter
            .emit(AppEvent::definitions_loaded(names, restart_required));
        Ok(restart_required)
    }

    /// Parse one definition or an array of definitions and load them.
    pub async fn load_from_json(&self, json: &str) -> Result<bool, ValidationError> {
        self.load_definitions(parse_definitions(json)?).await
    }

    /// Load every `*.json` file in `dir` as one batch.
    pub async fn load_from_dir(&self, dir: &Path) -> Result<bool, LoadError> {
        let io_error = |path: &Path, e: std::io::Error| LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| io_error(dir, e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut batch = Vec::new();
        for path in files {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            let defs = parse_definitions(&text).map_err(|source| LoadError::File {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), count = defs.len(), "Read definitions file");
            batch.extend(defs);
        }

        Ok(self.load_definitions(batch).await?)
    }

    /// Remove a definition. Returns false if it was not loaded.
    pub async fn remove_definition(&self, name: &str) -> bool {
        let removed = self.definitions.write().await.remove(name).is_some();
        if removed {
            tracing::info!(name, "Removed automation definition");
            self.emitter.emit(AppEvent::definition_removed(name));
        }
        removed
    }

    pub async fn get_loaded_definitions(&self) -> Vec<ToolDefinition> {
        self.definitions
            .read()
            .await
            .values()
            .map(|def| def.as_ref().clone())
            .collect()
    }

    pub async fn get_loaded_count(&self) -> usize {
        self.definitions.read().await.len()
    }

    pub async fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        self.definitions
            .read()
            .await
            .get(name)
            .map(|def| def.as_ref().clone())
    }

    /// Run a loaded definition and return the full run report.
    pub async fn run(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Result<RunnerResult, ValidationError>, RoutingError> {
        let def = self
            .definitions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownTool(name.to_string()))?;

        let outcome = self.engine.run(&def, arguments).await;

        if !self.definitions.read().await.contains_key(name) {
            tracing::debug!(name, "Definition removed while running");
            return Err(RoutingError::UnknownTool(name.to_string()));
        }
        if let Ok(result) = &outcome {
            self.emitter.emit(AppEvent::automation_finished(
                name,
                result.success,
                result.log.len(),
            ));
        }
        Ok(outcome)
    }
}

fn tool_info(def: &ToolDefinition) -> ToolInfo {
    ToolInfo::new(&def.name, AUTOMATION_SERVER_ID)
        .with_description(&def.description)
        .with_input_schema(def.input_schema())
}

/// Render a run as a tool result: the merged data as JSON text, plus the
/// first error on failure.
fn render(result: &RunnerResult) -> ToolResult {
    let content = vec![ContentItem::text(
        Value::Object(result.merged_data()).to_string(),
    )];
    if result.success {
        ToolResult::success(content)
    } else {
        ToolResult::partial(
            content,
            result
                .first_error()
                .unwrap_or_else(|| "Automation failed".to_string()),
        )
    }
}

#[async_trait]
impl ToolProvider for DynamicToolRegistry {
    async fn list_tools(&self) -> Vec<ToolInfo> {
        self.definitions
            .read()
            .await
            .values()
            .map(|def| tool_info(def))
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, RoutingError> {
        match self.run(name, &arguments).await? {
            Ok(result) => Ok(render(&result)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }

    fn mark_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
        tracing::debug!(live, "Automation server liveness changed");
    }
}
