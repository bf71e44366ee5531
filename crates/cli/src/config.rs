//! `pgben.toml` configuration.
//!
//! Every section is optional; an empty file is a valid configuration that
//! serves on port 8080 with the built-in reason catalog and no seed data.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//! rate_limit = 120
//! api_key = "change-me"
//!
//! [[benefit_types]]
//! id = "aluguel-social"
//! code = "ALUGUEL_SOCIAL"
//! name = "Aluguel Social"
//! periodicity = "mensal"
//! amount = "600.00"
//! max_duration_months = 6
//! default_installments = 6
//!
//! [[requests]]
//! id = "sol-0001"
//! protocol = "SOL-2025-0001"
//! beneficiary_id = "cidadao-42"
//! benefit_type_id = "aluguel-social"
//!
//! [[reasons]]
//! operation = "bloqueio"
//! code = "SUSPEITA_FRAUDE"
//! description = "Suspeita de fraude"
//! ```

use std::collections::HashSet;
use std::path::Path;

use pgben_core::{ReasonEntry, MAX_INSTALLMENTS};
use pgben_storage::{BenefitTypeRecord, RequestRecord};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Environment variable overriding `server.rate_limit`.
pub(crate) const RATE_LIMIT_ENV: &str = "PGBEN_RATE_LIMIT";
/// Environment variable overriding `server.api_key`.
pub(crate) const API_KEY_ENV: &str = "PGBEN_API_KEY";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PgbenConfig {
    #[serde(default)]
    pub server: ServerSettings,
    /// Replaces the built-in reason catalog when non-empty.
    #[serde(default)]
    pub reasons: Vec<ReasonEntry>,
    #[serde(default)]
    pub benefit_types: Vec<BenefitTypeRecord>,
    #[serde(default)]
    pub requests: Vec<RequestSeed>,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests per minute per client IP.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
    /// When set, every endpoint except `/health` requires this key.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_rate_limit() -> u64 {
    DEFAULT_RATE_LIMIT
}

/// A request as written in configuration or posted to `/solicitacoes`.
/// The id is generated when omitted and the creation time is the load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSeed {
    #[serde(default)]
    pub id: Option<String>,
    pub protocol: String,
    pub beneficiary_id: String,
    pub benefit_type_id: String,
    #[serde(default)]
    pub judicial_determination: bool,
    #[serde(default)]
    pub judicial_document_id: Option<String>,
    #[serde(default)]
    pub priority_order: i32,
    #[serde(default)]
    pub requested_installments: Option<u32>,
}

impl RequestSeed {
    pub fn into_record(self, now: OffsetDateTime) -> RequestRecord {
        RequestRecord {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            protocol: self.protocol,
            beneficiary_id: self.beneficiary_id,
            benefit_type_id: self.benefit_type_id,
            judicial_determination: self.judicial_determination,
            judicial_document_id: self.judicial_document_id,
            priority_order: self.priority_order,
            requested_installments: self.requested_installments,
            created_at: now,
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl PgbenConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: PgbenConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PGBEN_RATE_LIMIT` / `PGBEN_API_KEY` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(RATE_LIMIT_ENV).ok(),
            std::env::var(API_KEY_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, rate_limit: Option<String>, api_key: Option<String>) {
        if let Some(raw) = rate_limit {
            match raw.trim().parse::<u64>() {
                Ok(limit) if limit > 0 => self.server.rate_limit = limit,
                _ => tracing::warn!(value = %raw, "ignoring invalid PGBEN_RATE_LIMIT"),
            }
        }
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.server.api_key = Some(key);
        }
    }

    /// Check cross-references and value ranges, reporting every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be greater than 0".to_string());
        }
        if self.server.rate_limit == 0 {
            errors.push("server.rate_limit must be greater than 0".to_string());
        }
        if matches!(&self.server.api_key, Some(k) if k.trim().is_empty()) {
            errors.push("server.api_key must not be empty when set".to_string());
        }

        let mut benefit_ids = HashSet::new();
        for b in &self.benefit_types {
            if !benefit_ids.insert(b.id.as_str()) {
                errors.push(format!("duplicate benefit type '{}'", b.id));
            }
            if !(1..=MAX_INSTALLMENTS).contains(&b.default_installments) {
                errors.push(format!(
                    "benefit type '{}': default_installments must be between 1 and {MAX_INSTALLMENTS}",
                    b.id
                ));
            }
            if b.amount.is_sign_negative() {
                errors.push(format!("benefit type '{}': amount must not be negative", b.id));
            }
        }

        let mut request_ids = HashSet::new();
        for r in &self.requests {
            if let Some(id) = &r.id {
                if !request_ids.insert(id.as_str()) {
                    errors.push(format!("duplicate request '{id}'"));
                }
            }
            if !benefit_ids.contains(r.benefit_type_id.as_str()) {
                errors.push(format!(
                    "request '{}' references unknown benefit type '{}'",
                    r.id.as_deref().unwrap_or(&r.protocol),
                    r.benefit_type_id
                ));
            }
            if r
                .requested_installments
                .is_some_and(|n| !(1..=MAX_INSTALLMENTS).contains(&n))
            {
                errors.push(format!(
                    "request '{}': requested_installments must be between 1 and {MAX_INSTALLMENTS}",
                    r.id.as_deref().unwrap_or(&r.protocol)
                ));
            }
        }

        let mut reason_keys = HashSet::new();
        for entry in &self.reasons {
            if entry.code.trim().is_empty() {
                errors.push(format!("{} reason with empty code", entry.operation));
            } else if !reason_keys.insert((entry.operation, entry.code.as_str())) {
                errors.push(format!(
                    "duplicate {} reason '{}'",
                    entry.operation, entry.code
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> PgbenConfig {
        toml::from_str(toml_str).expect("valid TOML")
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.rate_limit, 60);
        assert!(config.server.api_key.is_none());
        assert!(config.reasons.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn parses_full_example() {
        let config = parse(
            r#"
[server]
port = 9000
rate_limit = 5

[[benefit_types]]
id = "aluguel"
code = "ALUGUEL"
name = "Aluguel Social"
periodicity = "mensal"
amount = "600.00"
max_duration_months = 6
default_installments = 6

[[requests]]
id = "sol-1"
protocol = "SOL-1"
beneficiary_id = "cidadao-1"
benefit_type_id = "aluguel"
judicial_determination = true

[[reasons]]
operation = "bloqueio"
code = "X"
description = "x"
"#,
        );
        config.validate().unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.benefit_types[0].amount.to_string(), "600.00");
        assert!(config.requests[0].judicial_determination);
        assert!(config.reasons[0].active);
    }

    #[test]
    fn reports_every_problem() {
        let config = parse(
            r#"
[server]
rate_limit = 0

[[benefit_types]]
id = "b"
code = "B"
name = "B"
periodicity = "unico"
amount = "10"
default_installments = 0

[[requests]]
protocol = "P-1"
beneficiary_id = "c"
benefit_type_id = "missing"
"#,
        );
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("rate_limit")));
                assert!(errors.iter().any(|e| e.contains("default_installments")));
                assert!(errors.iter().any(|e| e.contains("P-1")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<PgbenConfig, _> = toml::from_str("[server]\nprot = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = parse("[server]\nrate_limit = 10\napi_key = \"file\"\n");
        config.apply_overrides(Some("200".to_string()), Some("env".to_string()));
        assert_eq!(config.server.rate_limit, 200);
        assert_eq!(config.server.api_key.as_deref(), Some("env"));

        config.apply_overrides(Some("lots".to_string()), Some(String::new()));
        assert_eq!(config.server.rate_limit, 200);
        assert_eq!(config.server.api_key.as_deref(), Some("env"));
    }

    #[test]
    fn request_seed_gets_generated_id() {
        let seed = RequestSeed {
            id: None,
            protocol: "P".to_string(),
            beneficiary_id: "c".to_string(),
            benefit_type_id: "b".to_string(),
            judicial_determination: false,
            judicial_document_id: None,
            priority_order: 0,
            requested_installments: None,
        };
        let record = seed.into_record(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(record.id.len(), 36);
    }

    #[test]
    fn installment_counts_are_capped() {
        let config = parse(
            r#"
[[benefit_types]]
id = "b"
code = "B"
name = "B"
periodicity = "mensal"
amount = "10"
default_installments = 121

[[benefit_types]]
id = "ok"
code = "OK"
name = "Ok"
periodicity = "mensal"
amount = "10"
default_installments = 120

[[requests]]
id = "r-1"
protocol = "P-1"
beneficiary_id = "c"
benefit_type_id = "ok"
requested_installments = 4294967295
"#,
        );
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 2, "{errors:?}");
                assert!(errors[0].contains("benefit type 'b'"));
                assert!(errors[1].contains("request 'r-1'"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }
}
