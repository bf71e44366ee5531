use std::path::Path;
use std::process;

use pgben_core::ReasonOperation;
use pgben_lifecycle::ReasonCatalog;

use crate::config::PgbenConfig;
use crate::{report_error, OutputFormat};

/// Print the active reasons for an operation, from the configured catalog
/// when `config` is given.
pub(crate) fn cmd_reasons(
    operation: &str,
    config: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let operation: ReasonOperation = match operation.parse() {
        Ok(op) => op,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let catalog = match config {
        None => ReasonCatalog::builtin(),
        Some(path) => match PgbenConfig::load(path) {
            Ok(c) if !c.reasons.is_empty() => ReasonCatalog::new(c.reasons),
            Ok(_) => ReasonCatalog::builtin(),
            Err(e) => {
                report_error(&e.to_string(), output, quiet);
                process::exit(1);
            }
        },
    };
    let entries = catalog.active_for(operation);

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "operation": operation,
                "items": entries,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                if !quiet {
                    println!("no active reasons for {operation}");
                }
                return;
            }
            let width = entries.iter().map(|e| e.code.len()).max().unwrap_or(0);
            for entry in &entries {
                println!("{:<width$}  {}", entry.code, entry.description);
            }
        }
    }
}
