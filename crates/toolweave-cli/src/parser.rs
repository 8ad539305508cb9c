//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the toolweave tool hub.
#[derive(Parser)]
#[command(name = "toolweave")]
#[command(about = "Aggregate tool servers and serve declarative browser automations")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "TOOLWEAVE_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "toolweave",
            "tools",
            "--verbose",
            "--settings",
            "/tmp/toolweave.json",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/toolweave.json")));
        assert!(matches!(cli.command, Some(Commands::Tools)));
    }

    #[test]
    fn test_call_args() {
        let cli = Cli::parse_from([
            "toolweave",
            "call",
            "files",
            "read_file",
            "--args",
            r#"{"path": "/tmp/a"}"#,
            "--retries",
            "2",
        ]);
        let Some(Commands::Call {
            server,
            tool,
            args,
            retries,
        }) = cli.command
        else {
            panic!("expected call command");
        };
        assert_eq!(server, "files");
        assert_eq!(tool, "read_file");
        assert_eq!(args.as_deref(), Some(r#"{"path": "/tmp/a"}"#));
        assert_eq!(retries, Some(2));
    }

    #[test]
    fn test_validate_requires_files() {
        assert!(Cli::try_parse_from(["toolweave", "validate"]).is_err());
    }
}
