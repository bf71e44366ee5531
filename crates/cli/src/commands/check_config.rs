use std::path::Path;
use std::process;

use crate::config::{ConfigError, PgbenConfig};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_check_config(file: &Path, output: OutputFormat, quiet: bool) {
    let config = match PgbenConfig::load(file) {
        Ok(c) => c,
        Err(ConfigError::Invalid(errors)) if output == OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": false,
                "errors": errors,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
            process::exit(1);
        }
        Err(ConfigError::Invalid(errors)) => {
            if !quiet {
                eprintln!("{}: invalid configuration", file.display());
                for e in &errors {
                    eprintln!("  - {e}");
                }
            }
            process::exit(1);
        }
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": true,
                "port": config.server.port,
                "benefit_types": config.benefit_types.len(),
                "requests": config.requests.len(),
                "reasons": config.reasons.len(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
        }
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "{}: ok ({} benefit types, {} requests, {})",
                    file.display(),
                    config.benefit_types.len(),
                    config.requests.len(),
                    if config.reasons.is_empty() {
                        "built-in reasons".to_string()
                    } else {
                        format!("{} reasons", config.reasons.len())
                    }
                );
            }
        }
    }
}
