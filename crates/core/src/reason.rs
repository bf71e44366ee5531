//! Reason catalog: the closed list of justifications an operator may pick
//! for each grant operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Grant operations that require a catalogued reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasonOperation {
    Bloqueio,
    Desbloqueio,
    Suspensao,
    Reativacao,
    Cancelamento,
}

impl ReasonOperation {
    pub const ALL: [ReasonOperation; 5] = [
        ReasonOperation::Bloqueio,
        ReasonOperation::Desbloqueio,
        ReasonOperation::Suspensao,
        ReasonOperation::Reativacao,
        ReasonOperation::Cancelamento,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonOperation::Bloqueio => "bloqueio",
            ReasonOperation::Desbloqueio => "desbloqueio",
            ReasonOperation::Suspensao => "suspensao",
            ReasonOperation::Reativacao => "reativacao",
            ReasonOperation::Cancelamento => "cancelamento",
        }
    }
}

impl fmt::Display for ReasonOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonOperation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonOperation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let expected: Vec<&str> = ReasonOperation::ALL.iter().map(|o| o.as_str()).collect();
                ParseError::new("reason operation", s, &expected)
            })
    }
}

/// One selectable reason for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonEntry {
    pub operation: ReasonOperation,
    pub code: String,
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

const DEFAULT_REASONS: &[(ReasonOperation, &str, &str, bool)] = &[
    (ReasonOperation::Bloqueio, "DOCUMENTACAO_PENDENTE", "Documentação pendente de apresentação", true),
    (ReasonOperation::Bloqueio, "IRREGULARIDADE_CADASTRAL", "Irregularidade nos dados cadastrais", true),
    (ReasonOperation::Bloqueio, "SUSPEITA_FRAUDE", "Suspeita de fraude em apuração", true),
    (ReasonOperation::Bloqueio, "DETERMINACAO_JUDICIAL", "Bloqueio por determinação judicial", true),
    (ReasonOperation::Bloqueio, "AUDITORIA_2019", "Auditoria do exercício de 2019", false),
    (ReasonOperation::Desbloqueio, "DOCUMENTACAO_REGULARIZADA", "Documentação regularizada", true),
    (ReasonOperation::Desbloqueio, "CADASTRO_ATUALIZADO", "Cadastro atualizado pelo beneficiário", true),
    (ReasonOperation::Desbloqueio, "DETERMINACAO_JUDICIAL", "Desbloqueio por determinação judicial", true),
    (ReasonOperation::Suspensao, "NAO_COMPARECIMENTO", "Não comparecimento à visita técnica", true),
    (ReasonOperation::Suspensao, "MUDANCA_ENDERECO", "Mudança de endereço não informada", true),
    (ReasonOperation::Suspensao, "REAVALIACAO_SOCIAL", "Reavaliação socioeconômica em andamento", true),
    (ReasonOperation::Suspensao, "RECADASTRAMENTO_2020", "Recadastramento geral de 2020", false),
    (ReasonOperation::Reativacao, "SITUACAO_REGULARIZADA", "Situação do beneficiário regularizada", true),
    (ReasonOperation::Reativacao, "REAVALIACAO_CONCLUIDA", "Reavaliação socioeconômica concluída", true),
    (ReasonOperation::Reativacao, "DETERMINACAO_JUDICIAL", "Reativação por determinação judicial", true),
    (ReasonOperation::Cancelamento, "OBITO", "Óbito do beneficiário", true),
    (ReasonOperation::Cancelamento, "MUDANCA_MUNICIPIO", "Mudança para outro município", true),
    (ReasonOperation::Cancelamento, "DESISTENCIA", "Desistência do beneficiário", true),
    (ReasonOperation::Cancelamento, "FRAUDE_COMPROVADA", "Fraude comprovada", true),
    (ReasonOperation::Cancelamento, "SUPERACAO_VULNERABILIDADE", "Superação da situação de vulnerabilidade", true),
];

/// The catalog shipped with the system, including retired (inactive) entries.
pub fn default_catalog() -> Vec<ReasonEntry> {
    DEFAULT_REASONS
        .iter()
        .map(|(operation, code, description, active)| ReasonEntry {
            operation: *operation,
            code: (*code).to_string(),
            description: (*description).to_string(),
            active: *active,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_has_an_active_reason() {
        let catalog = default_catalog();
        for op in ReasonOperation::ALL {
            assert!(
                catalog.iter().any(|r| r.operation == op && r.active),
                "no active reason for {op}"
            );
        }
    }

    #[test]
    fn codes_are_unique_per_operation() {
        let catalog = default_catalog();
        for (i, a) in catalog.iter().enumerate() {
            for b in &catalog[i + 1..] {
                assert!(
                    !(a.operation == b.operation && a.code == b.code),
                    "duplicate {}/{}",
                    a.operation,
                    a.code
                );
            }
        }
    }

    #[test]
    fn parse_operation() {
        assert_eq!(
            "Suspensao".parse::<ReasonOperation>().unwrap(),
            ReasonOperation::Suspensao
        );
        let err = "prorrogacao".parse::<ReasonOperation>().unwrap_err();
        assert_eq!(err.kind, "reason operation");
    }

    #[test]
    fn active_defaults_to_true_when_omitted() {
        let entry: ReasonEntry = serde_json::from_str(
            r#"{"operation":"bloqueio","code":"X","description":"x"}"#,
        )
        .unwrap();
        assert!(entry.active);
    }
}
