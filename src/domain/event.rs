use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequested,
    BookingAccepted,
    BookingDeclined,
    OfferReceived,
    OfferAccepted,
    OfferDeclined,
    PaymentReceived,
    HandoffConfirmed,
    OrderCancelled,
    OrderOverdue,
}

/// An outbound "something changed" event for the counterpart.
///
/// Engines return these alongside their results instead of pushing them
/// anywhere themselves; delivery is the caller's concern and is always
/// best-effort, outside the transition's atomicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub kind: NotificationKind,
    pub order_id: Option<String>,
    pub message: String,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        kind: NotificationKind,
        order_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            kind,
            order_id,
            message: message.into(),
        }
    }
}
