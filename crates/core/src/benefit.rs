use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Upper bound on the installments of one grant (ten years of monthly
/// payments).
pub const MAX_INSTALLMENTS: u32 = 120;

/// How often a benefit type pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    /// One-time benefit. Cannot be prorogated without a court order.
    Unico,
    Mensal,
    Bimestral,
    Trimestral,
    Semestral,
    Anual,
}

impl Periodicity {
    pub const ALL: [Periodicity; 6] = [
        Periodicity::Unico,
        Periodicity::Mensal,
        Periodicity::Bimestral,
        Periodicity::Trimestral,
        Periodicity::Semestral,
        Periodicity::Anual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Periodicity::Unico => "unico",
            Periodicity::Mensal => "mensal",
            Periodicity::Bimestral => "bimestral",
            Periodicity::Trimestral => "trimestral",
            Periodicity::Semestral => "semestral",
            Periodicity::Anual => "anual",
        }
    }

    pub fn is_one_time(self) -> bool {
        self == Periodicity::Unico
    }

    /// Months between consecutive installments (0 for one-time benefits).
    pub fn interval_months(self) -> u32 {
        match self {
            Periodicity::Unico => 0,
            Periodicity::Mensal => 1,
            Periodicity::Bimestral => 2,
            Periodicity::Trimestral => 3,
            Periodicity::Semestral => 6,
            Periodicity::Anual => 12,
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Periodicity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Periodicity::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let expected: Vec<&str> = Periodicity::ALL.iter().map(|p| p.as_str()).collect();
                ParseError::new("periodicity", s, &expected)
            })
    }
}
