use crate::domain::offer::Offer;
use crate::domain::order::Order;
use crate::domain::ports::{
    CheckoutRequest, CheckoutSession, OfferStore, OrderStore, PaymentGateway,
    PaymentVerification, PaymentVerifier, UpdateFn,
};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for orders.
///
/// `update` holds the write lock across the whole read-modify-write cycle,
/// applies the closure to a copy, and commits only on `Ok` — two concurrent
/// transitions on the same row serialize, and a rejected one leaves the
/// stored row untouched.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn update(&self, id: &str, f: UpdateFn<Order>) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let current = orders
            .get(id)
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;
        let mut next = current.clone();
        f(&mut next)?;
        orders.insert(id.to_string(), next.clone());
        Ok(next)
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for negotiation offers.
#[derive(Default, Clone)]
pub struct InMemoryOfferStore {
    offers: Arc<RwLock<HashMap<String, Offer>>>,
}

impl InMemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfferStore for InMemoryOfferStore {
    async fn insert(&self, offer: Offer) -> Result<()> {
        let mut offers = self.offers.write().await;
        offers.insert(offer.id.clone(), offer);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Offer>> {
        let offers = self.offers.read().await;
        Ok(offers.get(id).cloned())
    }

    async fn update(&self, id: &str, f: UpdateFn<Offer>) -> Result<Offer> {
        let mut offers = self.offers.write().await;
        let current = offers
            .get(id)
            .ok_or_else(|| OrderError::NotFound(format!("offer {id}")))?;
        let mut next = current.clone();
        f(&mut next)?;
        offers.insert(id.to_string(), next.clone());
        Ok(next)
    }

    async fn for_order(&self, order_id: &str) -> Result<Vec<Offer>> {
        let offers = self.offers.read().await;
        let mut thread: Vec<Offer> = offers
            .values()
            .filter(|offer| offer.order_id.as_deref() == Some(order_id))
            .cloned()
            .collect();
        thread.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(thread)
    }
}

/// In-memory stand-in for the hosted checkout provider.
///
/// Records every checkout request under a generated session reference and
/// answers verification queries from those records, which is exactly the
/// collaborator contract the engines and the replay CLI need.
#[derive(Default, Clone)]
pub struct RecordingGateway {
    sessions: Arc<RwLock<HashMap<String, CheckoutRequest>>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every checkout request seen so far, in no particular order.
    pub async fn requests(&self) -> Vec<CheckoutRequest> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let session_ref = format!("cs_{}", Uuid::new_v4().simple());
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_ref.clone(), request);
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.invalid/c/{session_ref}"),
            session_ref,
        })
    }
}

#[async_trait]
impl PaymentVerifier for RecordingGateway {
    async fn verify(&self, session_ref: &str) -> Result<PaymentVerification> {
        let sessions = self.sessions.read().await;
        let request = sessions
            .get(session_ref)
            .ok_or_else(|| OrderError::NotFound(format!("checkout session {session_ref}")))?;
        Ok(PaymentVerification {
            success: true,
            verified_amount_minor_units: request.amount_minor_units,
            metadata: request.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::offer::OfferKind;
    use crate::domain::order::{Amount, OrderKind, OrderStatus};
    use crate::domain::ports::CheckoutMetadata;
    use rust_decimal_macros::dec;

    fn order(id: &str) -> Order {
        Order::new(id, OrderKind::Item, "alice", "bob", Amount::new(dec!(10.0)).unwrap(), None)
            .unwrap()
    }

    #[tokio::test]
    async fn test_order_store_round_trip() {
        let store = InMemoryOrderStore::new();
        store.insert(order("o1")).await.unwrap();

        let retrieved = store.get("o1").await.unwrap().unwrap();
        assert_eq!(retrieved.id, "o1");
        assert!(store.get("o2").await.unwrap().is_none());
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_row_untouched() {
        let store = InMemoryOrderStore::new();
        store.insert(order("o1")).await.unwrap();

        let result = store
            .update(
                "o1",
                Box::new(|order| {
                    order.status = OrderStatus::Completed;
                    Err(OrderError::InvalidState("nope".to_string()))
                }),
            )
            .await;
        assert!(result.is_err());

        let stored = store.get("o1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = InMemoryOrderStore::new();
        let result = store.update("ghost", Box::new(|_| Ok(()))).await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_offers_for_order_sorted_oldest_first() {
        let store = InMemoryOfferStore::new();
        let amount = Amount::new(dec!(40.0)).unwrap();
        let first = Offer::new(Some("o1"), "alice", amount, None, OfferKind::PriceOffer);
        let second = Offer::new(Some("o1"), "bob", amount, None, OfferKind::CounterOffer);
        let unrelated = Offer::new(Some("o2"), "alice", amount, None, OfferKind::PriceOffer);
        store.insert(second.clone()).await.unwrap();
        store.insert(first.clone()).await.unwrap();
        store.insert(unrelated).await.unwrap();

        let thread = store.for_order("o1").await.unwrap();
        assert_eq!(thread.len(), 2);
        assert!(thread[0].created_at <= thread[1].created_at);
    }

    #[tokio::test]
    async fn test_gateway_records_and_verifies() {
        let gateway = RecordingGateway::new();
        let session = gateway
            .create_checkout(CheckoutRequest {
                amount_minor_units: 4000,
                currency: "usd".to_string(),
                description: "test".to_string(),
                metadata: CheckoutMetadata {
                    order_id: "o1".to_string(),
                    order_kind: OrderKind::Item,
                    payer_id: "alice".to_string(),
                },
            })
            .await
            .unwrap();
        assert!(session.checkout_url.contains(&session.session_ref));

        let verification = gateway.verify(&session.session_ref).await.unwrap();
        assert!(verification.success);
        assert_eq!(verification.verified_amount_minor_units, 4000);
        assert_eq!(verification.metadata.payer_id, "alice");

        assert!(matches!(
            gateway.verify("cs_unknown").await,
            Err(OrderError::NotFound(_))
        ));
    }
}
