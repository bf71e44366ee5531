use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Status of a single payment installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pendente,
    Agendado,
    Liberado,
    Pago,
    Confirmado,
    Cancelado,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pendente,
        PaymentStatus::Agendado,
        PaymentStatus::Liberado,
        PaymentStatus::Pago,
        PaymentStatus::Confirmado,
        PaymentStatus::Cancelado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pendente => "PENDENTE",
            PaymentStatus::Agendado => "AGENDADO",
            PaymentStatus::Liberado => "LIBERADO",
            PaymentStatus::Pago => "PAGO",
            PaymentStatus::Confirmado => "CONFIRMADO",
            PaymentStatus::Cancelado => "CANCELADO",
        }
    }

    /// Whether the installment has reached (or passed) release.
    ///
    /// Paid and confirmed installments were released on their way there.
    pub fn is_released(self) -> bool {
        matches!(
            self,
            PaymentStatus::Liberado | PaymentStatus::Pago | PaymentStatus::Confirmado
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let expected: Vec<&str> = PaymentStatus::ALL.iter().map(|s| s.as_str()).collect();
                ParseError::new("payment status", s, &expected)
            })
    }
}
