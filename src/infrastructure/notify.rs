use crate::domain::event::Notification;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;

/// Notifier that emits each event as a structured log line.
///
/// Stands in for the hosted realtime channel; delivery guarantees are not
/// part of the contract, so a log sink satisfies it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            order = notification.order_id.as_deref().unwrap_or("-"),
            "{}",
            notification.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::NotificationKind;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        let notification = Notification::new(
            "bob",
            NotificationKind::PaymentReceived,
            Some("o1".to_string()),
            "You have received a payment of $40.00",
        );
        assert!(notifier.notify(&notification).await.is_ok());
    }
}
