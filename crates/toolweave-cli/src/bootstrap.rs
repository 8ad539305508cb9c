//! CLI bootstrap - the composition root for the one-shot commands.
//!
//! `tools` and `call` talk to the configured servers only; the automation
//! server lives in `serve`, where a browser controller can attach.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::join_all;
use toolweave_core::{NoopEmitter, Settings, default_settings_path};
use toolweave_mcp::{Connector, InProcessDirectory, RetryPolicy, ServerRegistry, ToolExecutor};

use crate::error::CliError;

/// Resolve the settings file: explicit path, else the per-user default.
pub fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(default_settings_path)
}

/// Load settings. An explicit path must exist; the default one is optional.
pub async fn load_settings(explicit: Option<&Path>) -> Result<Settings, CliError> {
    match (explicit, settings_path(explicit)) {
        (Some(path), _) => Ok(Settings::load(path).await?),
        (None, Some(path)) => Ok(Settings::load_or_default(&path).await?),
        (None, None) => Ok(Settings::with_defaults()),
    }
}

/// Composed context for CLI commands.
pub struct CliContext {
    pub settings: Settings,
    pub registry: Arc<ServerRegistry>,
    pub executor: ToolExecutor,
}

impl CliContext {
    /// Disconnect every server.
    pub async fn shutdown(&self) {
        self.registry.disconnect_all().await;
    }
}

/// Connect every configured server concurrently.
pub async fn bootstrap(settings: Settings) -> Result<CliContext> {
    let connector = Connector::new(
        settings.request_timeout(),
        Arc::new(InProcessDirectory::new()),
    )?;
    let registry = Arc::new(ServerRegistry::new(connector, Arc::new(NoopEmitter::new())));

    let states = join_all(
        settings
            .servers
            .iter()
            .map(|server| registry.add_server(server.clone())),
    )
    .await;
    for state in states.iter().filter(|state| !state.is_connected()) {
        tracing::warn!(
            server_id = %state.id(),
            error = ?state.error,
            "Configured server unavailable"
        );
    }

    let executor = ToolExecutor::new(registry.clone(), RetryPolicy::from_settings(&settings));
    Ok(CliContext {
        settings,
        registry,
        executor,
    })
}
