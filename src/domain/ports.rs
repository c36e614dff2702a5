use crate::domain::event::Notification;
use crate::domain::offer::Offer;
use crate::domain::order::{Order, OrderKind};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mutation applied inside a store's atomic read-modify-write cycle.
///
/// The closure performs the precondition checks and the mutation; the store
/// commits the row only when it returns `Ok`. An `Err` leaves the stored
/// row untouched, which is what makes rejected transitions side-effect free.
pub type UpdateFn<T> = Box<dyn FnOnce(&mut T) -> Result<()> + Send>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Order>>;
    /// Atomic compare-and-set: load, apply `f`, commit — indivisibly.
    async fn update(&self, id: &str, f: UpdateFn<Order>) -> Result<Order>;
    async fn all(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn insert(&self, offer: Offer) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Offer>>;
    /// Atomic compare-and-set, same contract as [`OrderStore::update`].
    async fn update(&self, id: &str, f: UpdateFn<Offer>) -> Result<Offer>;
    /// Offers linked to an order, oldest first.
    async fn for_order(&self, order_id: &str) -> Result<Vec<Offer>>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type OfferStoreRef = Arc<dyn OfferStore>;

pub const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub order_id: String,
    pub order_kind: OrderKind,
    pub payer_id: String,
}

/// What the hosted checkout provider needs to collect a payment. The core
/// never sees card data; it only hands the payer a checkout URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub amount_minor_units: i64,
    pub currency: String,
    pub description: String,
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_ref: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub success: bool,
    pub verified_amount_minor_units: i64,
    pub metadata: CheckoutMetadata,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession>;
}

/// Resolves an opaque session reference after the payer comes back from
/// checkout. `on_payment_confirmed` is only fed verifications that report
/// success.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, session_ref: &str) -> Result<PaymentVerification>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Fire-and-forget push of notification events. Delivery failures never
/// roll back the transition that produced the events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}
