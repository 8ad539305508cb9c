//! CLI entry point.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use toolweave_cli::handlers::serve::ServeArgs;
use toolweave_cli::{Cli, CliError, Commands, bootstrap, handlers, load_settings};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Validate { files } => handlers::validate::execute(&files).await,
        Commands::Serve {
            port,
            bind,
            definitions,
        } => {
            let settings = load_settings(cli.settings.as_deref()).await?;
            let args = ServeArgs {
                port,
                bind,
                definitions,
            };
            handlers::serve::execute(settings, args).await
        }
        Commands::Tools => {
            let settings = load_settings(cli.settings.as_deref()).await?;
            let ctx = bootstrap(settings).await?;
            let result = handlers::tools::execute(&ctx).await;
            ctx.shutdown().await;
            result
        }
        Commands::Call {
            server,
            tool,
            args,
            retries,
        } => {
            let settings = load_settings(cli.settings.as_deref()).await?;
            let ctx = bootstrap(settings).await?;
            let result =
                handlers::call::execute(&ctx, server, tool, args.as_deref(), retries).await;
            ctx.shutdown().await;
            result
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}
