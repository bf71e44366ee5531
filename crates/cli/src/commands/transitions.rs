use pgben_core::{transition_table_json, GrantStatus};

use crate::OutputFormat;

pub(crate) fn cmd_transitions(output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let table = transition_table_json();
            println!(
                "{}",
                serde_json::to_string_pretty(&table).unwrap_or_else(|_| table.to_string())
            );
        }
        OutputFormat::Text => {
            for status in GrantStatus::ALL {
                let targets: Vec<&str> =
                    status.allowed_targets().iter().map(|t| t.as_str()).collect();
                if targets.is_empty() {
                    println!("{:<10} (terminal)", status.as_str());
                } else {
                    println!("{:<10} -> {}", status.as_str(), targets.join(", "));
                }
            }
        }
    }
}
