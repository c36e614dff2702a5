use crate::domain::event::{Notification, NotificationKind};
use crate::domain::handoff::{HandoffAction, PresentedCode, generate_token};
use crate::domain::order::OrderStatus;
use crate::domain::ports::{OrderStore, OrderStoreRef};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a successful scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanConfirmation {
    pub order_id: String,
    pub action: HandoffAction,
    pub status: OrderStatus,
    pub confirmed_at: DateTime<Utc>,
    pub message: String,
}

/// Manages single-use proof-of-exchange codes.
///
/// The provider presents the code, the requester scans it to confirm the
/// exchange happened. Codes are generated lazily, never regenerated, and
/// consumed exactly once; consumption and the order status change commit
/// in one atomic store update.
pub struct HandoffEngine {
    orders: OrderStoreRef,
}

impl HandoffEngine {
    pub fn new(orders: OrderStoreRef) -> Self {
        Self { orders }
    }

    /// Returns the code for `(order, action)`, minting it on first request.
    /// Repeated calls always return the same code — regenerating would
    /// invalidate a code already shown to the counterpart.
    pub async fn generate_code(
        &self,
        order_id: &str,
        action: HandoffAction,
    ) -> Result<PresentedCode> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {order_id}")))?;
        if let Some(code) = order.handoff_slot(action)?.code.clone() {
            return Ok(PresentedCode {
                order_id: order.id,
                code,
            });
        }

        let token = generate_token();
        let minted = token.clone();
        let updated = self
            .orders
            .update(
                order_id,
                Box::new(move |order| {
                    {
                        let slot = order.handoff_slot_mut(action)?;
                        if slot.code.is_some() {
                            return Ok(());
                        }
                        slot.code = Some(minted);
                    }
                    order.touch();
                    Ok(())
                }),
            )
            .await?;

        // Read back whichever code won a concurrent first-mint race.
        let code = updated
            .handoff_slot(action)?
            .code
            .clone()
            .ok_or_else(|| OrderError::Persistence("handoff code missing after update".to_string()))?;
        Ok(PresentedCode {
            order_id: updated.id,
            code,
        })
    }

    /// Verifies a scanned `<order>|<code>` payload and consumes the code.
    ///
    /// The initial action (delivery / start_service) moves an `accepted`
    /// order to `ongoing`; the terminal action (return / complete_service)
    /// moves an `ongoing` or `overdue` order to `completed`. All failures
    /// leave the order untouched.
    pub async fn verify_scan(
        &self,
        presented: &str,
        scanner: &str,
        expected_action: HandoffAction,
    ) -> Result<(ScanConfirmation, Vec<Notification>)> {
        let presented = PresentedCode::parse(presented)?;
        let scanner_id = scanner.to_string();
        let code = presented.code.clone();
        let now = Utc::now();

        let updated = self
            .orders
            .update(
                &presented.order_id,
                Box::new(move |order| {
                    let slot = order.handoff_slot(expected_action)?;
                    if slot.code.as_deref() != Some(code.as_str()) {
                        return Err(OrderError::NotFound(
                            "matching order and code".to_string(),
                        ));
                    }
                    if scanner_id != order.requester_id {
                        return Err(OrderError::InvalidActor(
                            "the requester scans the code shown by the provider".to_string(),
                        ));
                    }
                    order.confirm_handoff(expected_action, now)
                }),
            )
            .await
            .map_err(|e| match e {
                // An unknown order id and a wrong code are the same failure
                // from the scanner's point of view.
                OrderError::NotFound(_) => {
                    OrderError::NotFound("matching order and code".to_string())
                }
                other => other,
            })?;

        let message = expected_action.confirmation_message().to_string();
        let confirmation = ScanConfirmation {
            order_id: updated.id.clone(),
            action: expected_action,
            status: updated.status,
            confirmed_at: now,
            message: message.clone(),
        };
        // Both parties get the confirmation push.
        let notifications = vec![
            Notification::new(
                &updated.requester_id,
                NotificationKind::HandoffConfirmed,
                Some(updated.id.clone()),
                message.clone(),
            ),
            Notification::new(
                &updated.provider_id,
                NotificationKind::HandoffConfirmed,
                Some(updated.id.clone()),
                message,
            ),
        ];
        Ok((confirmation, notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Amount, Order, OrderKind};
    use crate::domain::ports::OrderStore;
    use crate::infrastructure::in_memory::InMemoryOrderStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn engine_with_order(kind: OrderKind, status: OrderStatus) -> (HandoffEngine, OrderStoreRef) {
        let mut order =
            Order::new("o1", kind, "alice", "bob", Amount::new(dec!(50.0)).unwrap(), None)
                .unwrap();
        if status != OrderStatus::Pending {
            order.transition(status).unwrap();
        }
        let store = InMemoryOrderStore::new();
        store.insert(order).await.unwrap();
        let orders: OrderStoreRef = Arc::new(store);
        (HandoffEngine::new(orders.clone()), orders)
    }

    #[tokio::test]
    async fn test_generate_code_is_idempotent() {
        let (engine, _) = engine_with_order(OrderKind::Item, OrderStatus::Accepted).await;

        let first = engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();
        let second = engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.value(), format!("o1|{}", first.code));

        // The return code is a separate token.
        let ret = engine
            .generate_code("o1", HandoffAction::Return)
            .await
            .unwrap();
        assert_ne!(ret.code, first.code);
    }

    #[tokio::test]
    async fn test_generate_code_rejects_mismatched_action() {
        let (engine, _) = engine_with_order(OrderKind::Service, OrderStatus::Accepted).await;
        let result = engine.generate_code("o1", HandoffAction::Delivery).await;
        assert!(matches!(result, Err(OrderError::InvalidAction { .. })));
    }

    #[tokio::test]
    async fn test_scan_confirms_delivery_and_starts_order() {
        let (engine, orders) = engine_with_order(OrderKind::Item, OrderStatus::Accepted).await;
        let code = engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();

        let (confirmation, notifications) = engine
            .verify_scan(&code.value(), "alice", HandoffAction::Delivery)
            .await
            .unwrap();
        assert_eq!(confirmation.status, OrderStatus::Ongoing);
        assert_eq!(confirmation.message, "Item delivery confirmed");
        assert_eq!(notifications.len(), 2);

        let order = orders.get("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Ongoing);
        assert!(order.initial_handoff.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_second_scan_is_already_consumed() {
        let (engine, orders) = engine_with_order(OrderKind::Item, OrderStatus::Accepted).await;
        let code = engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();
        engine
            .verify_scan(&code.value(), "alice", HandoffAction::Delivery)
            .await
            .unwrap();
        let before = orders.get("o1").await.unwrap().unwrap();

        let result = engine
            .verify_scan(&code.value(), "alice", HandoffAction::Delivery)
            .await;
        assert!(matches!(result, Err(OrderError::AlreadyConsumed)));
        assert_eq!(orders.get("o1").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_wrong_code_is_not_found() {
        let (engine, _) = engine_with_order(OrderKind::Item, OrderStatus::Accepted).await;
        engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();

        let result = engine
            .verify_scan("o1|wrongcode", "alice", HandoffAction::Delivery)
            .await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));

        let result = engine
            .verify_scan("nope|wrongcode", "alice", HandoffAction::Delivery)
            .await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let (engine, _) = engine_with_order(OrderKind::Item, OrderStatus::Accepted).await;
        let result = engine
            .verify_scan("o1-nocode", "alice", HandoffAction::Delivery)
            .await;
        assert!(matches!(result, Err(OrderError::MalformedInput(_))));
    }

    #[tokio::test]
    async fn test_only_the_requester_scans() {
        let (engine, orders) = engine_with_order(OrderKind::Item, OrderStatus::Accepted).await;
        let code = engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();

        for scanner in ["bob", "mallory"] {
            let result = engine
                .verify_scan(&code.value(), scanner, HandoffAction::Delivery)
                .await;
            assert!(matches!(result, Err(OrderError::InvalidActor(_))), "{scanner}");
        }
        let order = orders.get("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn test_scan_before_acceptance_is_invalid_state() {
        let (engine, _) = engine_with_order(OrderKind::Item, OrderStatus::Pending).await;
        let code = engine
            .generate_code("o1", HandoffAction::Delivery)
            .await
            .unwrap();
        let result = engine
            .verify_scan(&code.value(), "alice", HandoffAction::Delivery)
            .await;
        assert!(matches!(result, Err(OrderError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_service_lifecycle_completes() {
        let (engine, orders) = engine_with_order(OrderKind::Service, OrderStatus::Accepted).await;

        let start = engine
            .generate_code("o1", HandoffAction::StartService)
            .await
            .unwrap();
        engine
            .verify_scan(&start.value(), "alice", HandoffAction::StartService)
            .await
            .unwrap();

        let complete = engine
            .generate_code("o1", HandoffAction::CompleteService)
            .await
            .unwrap();
        let (confirmation, _) = engine
            .verify_scan(&complete.value(), "alice", HandoffAction::CompleteService)
            .await
            .unwrap();
        assert_eq!(confirmation.status, OrderStatus::Completed);

        let order = orders.get("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(
            order.terminal_handoff.confirmed_at.unwrap()
                >= order.initial_handoff.confirmed_at.unwrap()
        );
    }
}
