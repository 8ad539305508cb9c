//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the registries, the automation engine
//! and the browser controller channel are wired together.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::join_all;
use toolweave_automation::{AUTOMATION_SERVER_ID, AutomationEngine, DynamicToolRegistry};
use toolweave_core::{
    AppEventEmitter, ServerConfig, ServerState, Settings, ToolDefinition, ValidationError,
};
use toolweave_mcp::{
    Connector, InProcessDirectory, ProtocolServer, RetryPolicy, ServerRegistry, ToolExecutor,
    ToolProvider,
};

use crate::controller::WsControllerChannel;
use crate::sessions::SessionStore;
use crate::sse::SseBroadcaster;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Registry entry of the built-in automation server.
pub fn automation_server_config() -> ServerConfig {
    ServerConfig::in_process(AUTOMATION_SERVER_ID, "Browser automation", AUTOMATION_SERVER_ID)
        .with_description("Declarative browser-automation tools")
        .with_category("automation")
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Effective settings.
    pub settings: Settings,
    /// All tool servers, including the built-in automation server.
    pub registry: Arc<ServerRegistry>,
    /// Retrying executor over `registry`.
    pub executor: ToolExecutor,
    /// Runtime-loaded automation tools.
    pub automation: Arc<DynamicToolRegistry>,
    /// Protocol surface of the automation tools (in-process and `/mcp`).
    pub protocol: Arc<ProtocolServer>,
    /// Live `/mcp` sessions, swept for idle ones in the background.
    pub sessions: Arc<SessionStore>,
    /// The attached browser controller.
    pub controller: Arc<WsControllerChannel>,
    /// SSE broadcaster for real-time events.
    pub sse: Arc<SseBroadcaster>,
}

impl AxumContext {
    /// Load definitions and, when a live session could not see the new
    /// names, re-add the automation server so they are announced.
    pub async fn load_definitions(
        &self,
        defs: Vec<ToolDefinition>,
    ) -> Result<bool, ValidationError> {
        let restart = self.automation.load_definitions(defs).await?;
        if restart {
            self.refresh_automation_server().await;
        }
        Ok(restart)
    }

    /// Remove a definition and refresh the registry's view of the tools.
    pub async fn remove_definition(&self, name: &str) -> bool {
        let removed = self.automation.remove_definition(name).await;
        if removed {
            self.refresh_automation_server().await;
        }
        removed
    }

    /// `connected → disconnected → connected` for the automation server.
    pub async fn refresh_automation_server(&self) -> ServerState {
        tracing::info!(server_id = AUTOMATION_SERVER_ID, "Re-adding automation server");
        self.registry.add_server(automation_server_config()).await
    }

    /// Close protocol sessions and disconnect every server.
    pub async fn shutdown(&self) {
        self.sessions.close_all().await;
        self.registry.disconnect_all().await;
    }
}

/// Bootstrap all services from `settings`.
pub async fn bootstrap(settings: Settings) -> Result<AxumContext> {
    tracing::info!(
        bind_address = %settings.effective_bind_address(),
        port = settings.effective_port(),
        servers = settings.servers.len(),
        definitions_dir = ?settings.definitions_dir,
        "Axum bootstrap"
    );

    // 1. Event fan-out shared by both registries
    let sse = Arc::new(SseBroadcaster::new(settings.effective_event_capacity()));
    let emitter: Arc<dyn AppEventEmitter> = sse.clone();

    // 2. Tool server registry
    let directory = Arc::new(InProcessDirectory::new());
    let connector = Connector::new(settings.request_timeout(), Arc::clone(&directory))?;
    let registry = Arc::new(ServerRegistry::new(connector, Arc::clone(&emitter)));

    // 3. Automation engine behind the WebSocket controller
    let controller = Arc::new(WsControllerChannel::new());
    let engine = AutomationEngine::from_settings(controller.clone(), &settings);
    let automation = Arc::new(DynamicToolRegistry::new(Arc::new(engine), emitter));

    // 4. Definitions from disk, before the server announces its tools
    if let Some(dir) = settings.definitions_dir.as_deref() {
        load_definitions_dir(&automation, Path::new(dir)).await;
    }

    // 5. Built-in automation server, reachable in-process
    let protocol = Arc::new(ProtocolServer::new(
        Arc::clone(&automation) as Arc<dyn ToolProvider>,
        "toolweave-automation",
    ));
    directory
        .register(AUTOMATION_SERVER_ID, Arc::clone(&protocol))
        .await;
    registry.add_server(automation_server_config()).await;

    // 6. Configured servers, connected concurrently
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

    let sessions = Arc::new(SessionStore::from_settings(&settings));
    sessions.spawn_sweeper();

    Ok(AxumContext {
        settings,
        registry,
        executor,
        automation,
        protocol,
        sessions,
        controller,
        sse,
    })
}

async fn load_definitions_dir(automation: &DynamicToolRegistry, dir: &Path) {
    if !dir.is_dir() {
        tracing::warn!(path = %dir.display(), "Definitions directory not found");
        return;
    }
    match automation.load_from_dir(dir).await {
        Ok(_) => tracing::info!(
            path = %dir.display(),
            count = automation.get_loaded_count().await,
            "Loaded automation definitions"
        ),
        Err(e) => tracing::warn!(path = %dir.display(), error = %e, "Failed to load definitions"),
    }
}

/// Start the web server and serve until Ctrl-C.
pub async fn start_server(settings: Settings, cors: CorsConfig) -> Result<()> {
    use tokio::net::TcpListener;

    let addr = format!(
        "{}:{}",
        settings.effective_bind_address(),
        settings.effective_port()
    );
    let ctx = Arc::new(bootstrap(settings).await?);
    let app = crate::routes::create_router(Arc::clone(&ctx), &cors);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("toolweave listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    ctx.shutdown().await;
    Ok(())
}
