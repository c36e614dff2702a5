use crate::domain::order::{Amount, Decision};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    PriceOffer,
    CounterOffer,
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferKind::PriceOffer => write!(f, "price offer"),
            OfferKind::CounterOffer => write!(f, "counter offer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    Pending,
    Accepted,
    Declined,
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationStatus::Pending => "pending",
            NegotiationStatus::Accepted => "accepted",
            NegotiationStatus::Declined => "declined",
        };
        write!(f, "{name}")
    }
}

/// A proposed price within a negotiation thread.
///
/// Offers are immutable once created except for `status`, which only the
/// non-sender participant may move away from `pending`. The order link is
/// best-effort: a chat thread can carry offers before an order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub order_id: Option<String>,
    pub sender_id: String,
    pub amount: Amount,
    pub message: Option<String>,
    pub kind: OfferKind,
    pub status: NegotiationStatus,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(
        order_id: Option<&str>,
        sender_id: impl Into<String>,
        amount: Amount,
        message: Option<String>,
        kind: OfferKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.map(str::to_string),
            sender_id: sender_id.into(),
            amount,
            message,
            kind,
            status: NegotiationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Accepts or declines a pending offer. The sender can never answer
    /// their own offer, whatever its status.
    pub fn respond(&mut self, responder: &str, decision: Decision) -> Result<()> {
        if responder == self.sender_id {
            return Err(OrderError::InvalidActor(
                "an offer cannot be answered by its own sender".to_string(),
            ));
        }
        if self.status != NegotiationStatus::Pending {
            return Err(OrderError::InvalidState(format!(
                "offer is already {}",
                self.status
            )));
        }
        self.status = match decision {
            Decision::Accept => NegotiationStatus::Accepted,
            Decision::Decline => NegotiationStatus::Declined,
        };
        Ok(())
    }

    /// Marks a still-pending offer as declined because a newer offer took
    /// over the thread. No-op once the offer was answered.
    pub fn supersede(&mut self) {
        if self.status == NegotiationStatus::Pending {
            self.status = NegotiationStatus::Declined;
        }
    }
}
