//! Serve command handler.

use std::path::PathBuf;

use anyhow::Result;
use toolweave_axum::{CorsConfig, start_server};
use toolweave_core::{Settings, validate_settings};

/// Command-line overrides for `serve`.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub definitions: Option<PathBuf>,
}

/// Apply overrides on top of the loaded settings.
pub fn apply_overrides(mut settings: Settings, args: ServeArgs) -> Settings {
    if let Some(port) = args.port {
        settings.port = Some(port);
    }
    if let Some(bind) = args.bind {
        settings.bind_address = Some(bind);
    }
    if let Some(dir) = args.definitions {
        settings.definitions_dir = Some(dir.display().to_string());
    }
    settings
}

/// Run the web server until Ctrl-C.
pub async fn execute(settings: Settings, args: ServeArgs) -> Result<()> {
    let settings = apply_overrides(settings, args);
    validate_settings(&settings)?;

    println!(
        "Serving on http://{}:{}",
        settings.effective_bind_address(),
        settings.effective_port()
    );
    println!("  protocol endpoint: /mcp");
    println!("  browser bridge:    /bridge");
    start_server(settings, CorsConfig::AllowAll).await
}
