//! Grant status state machine.
//!
//! The allowed-transition table is the single source of truth for which
//! status changes a grant may undergo. Operation-specific preconditions
//! (unblock only from `BLOQUEADO`, cancel only from `ATIVO`, ...) are
//! layered on top by the lifecycle manager; they never widen the table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Status of a benefit grant ("concessão").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantStatus {
    /// Eligible, pending activation. Initial status of a prorogated grant.
    Apto,
    /// Active and receiving payments. Initial status of a created grant.
    Ativo,
    Suspenso,
    Bloqueado,
    /// Ceased: every payment released. Can only be reactivated or prorogated.
    Cessado,
    /// Terminal.
    Cancelado,
}

impl GrantStatus {
    pub const ALL: [GrantStatus; 6] = [
        GrantStatus::Apto,
        GrantStatus::Ativo,
        GrantStatus::Suspenso,
        GrantStatus::Bloqueado,
        GrantStatus::Cessado,
        GrantStatus::Cancelado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GrantStatus::Apto => "APTO",
            GrantStatus::Ativo => "ATIVO",
            GrantStatus::Suspenso => "SUSPENSO",
            GrantStatus::Bloqueado => "BLOQUEADO",
            GrantStatus::Cessado => "CESSADO",
            GrantStatus::Cancelado => "CANCELADO",
        }
    }

    /// Statuses reachable from `self` in a single transition.
    pub fn allowed_targets(self) -> &'static [GrantStatus] {
        use GrantStatus::*;
        match self {
            Apto => &[Ativo, Cancelado, Suspenso, Bloqueado],
            Ativo => &[Suspenso, Bloqueado, Cessado, Cancelado],
            Suspenso => &[Ativo, Bloqueado, Cancelado],
            Bloqueado => &[Ativo, Cancelado],
            Cessado => &[Ativo],
            Cancelado => &[],
        }
    }

    pub fn can_transition_to(self, target: GrantStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GrantStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let expected: Vec<&str> = GrantStatus::ALL.iter().map(|s| s.as_str()).collect();
                ParseError::new("grant status", s, &expected)
            })
    }
}

/// Render the full transition table as JSON, keyed by source status.
///
/// Keys come out sorted because `serde_json::Map` is BTreeMap-backed.
pub fn transition_table_json() -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for status in GrantStatus::ALL {
        let targets: Vec<&str> = status.allowed_targets().iter().map(|t| t.as_str()).collect();
        map.insert(status.as_str().to_string(), serde_json::json!(targets));
    }
    serde_json::Value::Object(map)
}
