//! Validate command handler.
//!
//! All files are checked as one batch, the way the server loads a
//! definitions directory: a name used twice across files is an error.

use std::path::{Path, PathBuf};

use anyhow::Result;
use toolweave_core::{ToolDefinition, ValidationError, parse_definitions, validate_batch};

use crate::error::CliError;

/// Parse every file and validate the union.
pub async fn validate_files(files: &[PathBuf]) -> Result<Vec<ToolDefinition>, CliError> {
    let mut all = Vec::new();
    for path in files {
        all.extend(read_definitions(path).await?);
    }
    validate_batch(&all).map_err(CliError::Batch)?;
    Ok(all)
}

async fn read_definitions(path: &Path) -> Result<Vec<ToolDefinition>, CliError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    parse_definitions(&text).map_err(|source| CliError::Definitions {
        path: path.to_path_buf(),
        source,
    })
}

fn print_issues(error: &ValidationError) {
    for issue in error.issues() {
        eprintln!("  {issue}");
    }
}

pub async fn execute(files: &[PathBuf]) -> Result<()> {
    match validate_files(files).await {
        Ok(defs) => {
            for def in &defs {
                let lanes = if def.lanes.is_empty() {
                    String::new()
                } else {
                    format!(", {} lanes", def.lanes.len())
                };
                println!(
                    "✓ {} v{} ({} steps{lanes})",
                    def.name,
                    def.version,
                    def.steps.len()
                );
            }
            println!("{} definitions valid", defs.len());
            Ok(())
        }
        Err(e) => {
            if let CliError::Definitions { source, .. } | CliError::Batch(source) = &e {
                print_issues(source);
            }
            Err(e.into())
        }
    }
}
