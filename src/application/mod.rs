//! Application layer: the two engines driving every state transition.
//!
//! `NegotiationEngine` owns the order lifecycle and the chat price
//! negotiation; `HandoffEngine` owns the single-use proof-of-exchange
//! codes. Both validate transitions against the current persisted state
//! inside a single atomic store update.

pub mod handoff;
pub mod negotiation;

use crate::domain::event::Notification;
use crate::domain::ports::Notifier;

/// Pushes notification events after a committed transition. Delivery is
/// best-effort: failures are logged and suppressed, never propagated back
/// into the transition that produced the events.
pub async fn dispatch(notifier: &dyn Notifier, notifications: &[Notification]) {
    for notification in notifications {
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(
                recipient = %notification.recipient,
                error = %e,
                "notification delivery failed"
            );
        }
    }
}
