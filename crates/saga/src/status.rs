//! Order saga state machine.

use serde::{Deserialize, Serialize};

/// The status of an order attempt in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► StockReserved ──► PaymentRequested ──► Confirmed
///    │              │                  │                 │
///    │              └──────────────────┴────────┬────────┘
///    ├──► Failed                                ▼
///    └──► Cancelled                       Compensating ──► Cancelled
/// ```
///
/// Transitions are monotonic forward; the only escape path is through
/// `Compensating` into `Cancelled`. `Cancelled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order submitted, nothing committed yet.
    #[default]
    Pending,

    /// Inventory has been reserved, awaiting payment.
    StockReserved,

    /// Payment has been requested from the payment collaborator.
    PaymentRequested,

    /// Payment succeeded; the order stands.
    Confirmed,

    /// A step failed after reservation; compensations are in progress.
    Compensating,

    /// Compensation finished; reservations released (terminal state).
    Cancelled,

    /// The saga failed before anything was committed (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if the given transition is a legal forward step.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, StockReserved)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (StockReserved, PaymentRequested)
                | (StockReserved, Compensating)
                | (PaymentRequested, Confirmed)
                | (PaymentRequested, Compensating)
                | (Confirmed, Compensating)
                | (Compensating, Cancelled)
        )
    }

    /// Returns true once stock is held and compensation would be required.
    pub fn holds_stock(&self) -> bool {
        matches!(
            self,
            OrderStatus::StockReserved | OrderStatus::PaymentRequested | OrderStatus::Confirmed
        )
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::StockReserved => "stock_reserved",
            OrderStatus::PaymentRequested => "payment_requested",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Compensating => "compensating",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
