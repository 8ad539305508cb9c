//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server (protocol endpoint, browser bridge and API)
    Serve {
        /// Port to listen on (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind (overrides settings)
        #[arg(long)]
        bind: Option<String>,
        /// Directory of automation definitions (overrides settings)
        #[arg(long)]
        definitions: Option<PathBuf>,
    },

    /// List the tools of every configured server
    Tools,

    /// Call one tool on a configured server
    Call {
        /// Server id
        server: String,
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
        /// Retries after a failed attempt (defaults to settings)
        #[arg(short, long)]
        retries: Option<u32>,
    },

    /// Validate automation definition files as one batch
    Validate {
        /// Definition files (one object or an array per file)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
