use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents an agreed or proposed price.
///
/// This is a wrapper around `rust_decimal::Decimal` that is positive by
/// construction, so engines never have to re-validate amounts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(OrderError::MalformedInput(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Minor units (cents) for the payment gateway boundary.
    pub fn minor_units(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        (self.0 * Decimal::ONE_HUNDRED).round().to_i64()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = OrderError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Item,
    Service,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Item => write!(f, "item"),
            OrderKind::Service => write!(f, "service"),
        }
    }
}

/// Closed order lifecycle states. Transitions are only legal along the
/// edges checked by [`OrderStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Declined,
    Ongoing,
    Completed,
    Overdue,
    Cancelled,
}

impl OrderStatus {
    /// The order state machine:
    /// pending -> accepted | declined | cancelled,
    /// accepted -> ongoing | cancelled,
    /// ongoing -> completed | overdue | cancelled,
    /// overdue -> completed | cancelled.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Declined)
                | (Pending, Cancelled)
                | (Accepted, Ongoing)
                | (Accepted, Cancelled)
                | (Ongoing, Completed)
                | (Ongoing, Overdue)
                | (Ongoing, Cancelled)
                | (Overdue, Completed)
                | (Overdue, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Declined | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Declined => "declined",
            OrderStatus::Ongoing => "ongoing",
            OrderStatus::Completed => "completed",
            OrderStatus::Overdue => "overdue",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// A yes/no answer to a pending booking request or offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

/// One proof-of-exchange slot: the single-use code and the timestamp set
/// when it is scanned. The code is set once and never regenerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffSlot {
    pub code: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// A single rental or booking agreement between a requester and a provider.
///
/// Item orders confirm a physical delivery and return; service orders
/// confirm a start and a completion. Both use the same two handoff slots:
/// `initial_handoff` (delivery / start_service) and `terminal_handoff`
/// (return / complete_service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub kind: OrderKind,
    pub requester_id: String,
    pub provider_id: String,
    pub amount: Amount,
    /// Items only; held alongside the price, never charged by this crate.
    pub deposit_amount: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub initial_handoff: HandoffSlot,
    pub terminal_handoff: HandoffSlot,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        kind: OrderKind,
        requester_id: impl Into<String>,
        provider_id: impl Into<String>,
        amount: Amount,
        deposit_amount: Option<Decimal>,
    ) -> Result<Self> {
        let requester_id = requester_id.into();
        let provider_id = provider_id.into();
        if requester_id == provider_id {
            return Err(OrderError::InvalidActor(
                "requester and provider must be distinct".to_string(),
            ));
        }
        if let Some(deposit) = deposit_amount {
            if kind != OrderKind::Item {
                return Err(OrderError::InvalidAction {
                    action: "deposit".to_string(),
                    kind: kind.to_string(),
                });
            }
            if deposit < Decimal::ZERO {
                return Err(OrderError::MalformedInput(
                    "deposit must not be negative".to_string(),
                ));
            }
        }
        let now = Utc::now();
        Ok(Self {
            id: id.into(),
            kind,
            requester_id,
            provider_id,
            amount,
            deposit_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            paid_at: None,
            initial_handoff: HandoffSlot::default(),
            terminal_handoff: HandoffSlot::default(),
        })
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        user_id == self.requester_id || user_id == self.provider_id
    }

    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if user_id == self.requester_id {
            Some(&self.provider_id)
        } else if user_id == self.provider_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }

    /// Moves the order along one edge of the state machine, or fails with
    /// `InvalidState` leaving the order untouched.
    pub fn transition(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidState(format!(
                "cannot move {} order to {next}",
                self.status
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
