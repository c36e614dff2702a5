use crate::domain::event::{Notification, NotificationKind};
use crate::domain::offer::{NegotiationStatus, Offer, OfferKind};
use crate::domain::order::{Amount, Decision, Order, OrderKind, OrderStatus};
use crate::domain::ports::{
    CheckoutMetadata, CheckoutRequest, CheckoutSession, DEFAULT_CURRENCY, OfferStore,
    OfferStoreRef, OrderStore, OrderStoreRef, PaymentGateway, PaymentGatewayRef,
    PaymentVerification,
};
use crate::error::{OrderError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Governs the order lifecycle and the chat price negotiation attached to
/// it: booking requests, offers and counter-offers, checkout initiation,
/// and the asynchronous payment confirmation callback.
///
/// Every check-then-write runs inside a single store `update` call, so a
/// rejected transition never leaves a partially mutated row behind. All
/// mutating operations return the notification events the caller should
/// dispatch to the counterpart.
pub struct NegotiationEngine {
    orders: OrderStoreRef,
    offers: OfferStoreRef,
    gateway: PaymentGatewayRef,
}

impl NegotiationEngine {
    pub fn new(orders: OrderStoreRef, offers: OfferStoreRef, gateway: PaymentGatewayRef) -> Self {
        Self {
            orders,
            offers,
            gateway,
        }
    }

    /// Creates the `pending` order for a booking request.
    pub async fn request_booking(
        &self,
        id: &str,
        kind: OrderKind,
        requester_id: &str,
        provider_id: &str,
        amount: Decimal,
        deposit_amount: Option<Decimal>,
    ) -> Result<(Order, Vec<Notification>)> {
        let amount = Amount::new(amount)?;
        let order = Order::new(id, kind, requester_id, provider_id, amount, deposit_amount)?;
        if self.orders.get(&order.id).await?.is_some() {
            return Err(OrderError::InvalidState(format!(
                "order {} already exists",
                order.id
            )));
        }
        self.orders.insert(order.clone()).await?;

        let notification = Notification::new(
            &order.provider_id,
            NotificationKind::BookingRequested,
            Some(order.id.clone()),
            format!("New {} request for ${}", order.kind, order.amount.value()),
        );
        Ok((order, vec![notification]))
    }

    /// The direct accept/decline path: the provider answers the booking
    /// request without any negotiation.
    pub async fn respond_to_booking(
        &self,
        order_id: &str,
        responder: &str,
        decision: Decision,
    ) -> Result<(Order, Vec<Notification>)> {
        let responder = responder.to_string();
        let updated = self
            .orders
            .update(
                order_id,
                Box::new(move |order| {
                    if responder != order.provider_id {
                        return Err(OrderError::InvalidActor(
                            "only the provider can answer a booking request".to_string(),
                        ));
                    }
                    let next = match decision {
                        Decision::Accept => OrderStatus::Accepted,
                        Decision::Decline => OrderStatus::Declined,
                    };
                    order.transition(next)
                }),
            )
            .await?;

        let kind = match decision {
            Decision::Accept => NotificationKind::BookingAccepted,
            Decision::Decline => NotificationKind::BookingDeclined,
        };
        let notification = Notification::new(
            &updated.requester_id,
            kind,
            Some(updated.id.clone()),
            format!("Your booking request was {}", updated.status),
        );
        Ok((updated, vec![notification]))
    }

    /// Either participant can cancel as long as the order is not terminal.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        actor: &str,
    ) -> Result<(Order, Vec<Notification>)> {
        let actor_id = actor.to_string();
        let updated = self
            .orders
            .update(
                order_id,
                Box::new(move |order| {
                    if !order.is_participant(&actor_id) {
                        return Err(OrderError::InvalidActor(
                            "only a participant can cancel an order".to_string(),
                        ));
                    }
                    order.transition(OrderStatus::Cancelled)
                }),
            )
            .await?;

        let mut notifications = Vec::new();
        if let Some(counterpart) = updated.counterpart_of(actor) {
            notifications.push(Notification::new(
                counterpart,
                NotificationKind::OrderCancelled,
                Some(updated.id.clone()),
                format!("Order {} was cancelled", updated.id),
            ));
        }
        Ok((updated, notifications))
    }

    /// Operational trigger, no actor: flags a running order whose return
    /// date has passed.
    pub async fn mark_overdue(&self, order_id: &str) -> Result<(Order, Vec<Notification>)> {
        let updated = self
            .orders
            .update(
                order_id,
                Box::new(|order| order.transition(OrderStatus::Overdue)),
            )
            .await?;

        let notification = Notification::new(
            &updated.requester_id,
            NotificationKind::OrderOverdue,
            Some(updated.id.clone()),
            "Your rental is overdue".to_string(),
        );
        Ok((updated, vec![notification]))
    }

    /// Creates a new pending offer in the thread. Any prior pending offer in
    /// the same thread is superseded (declined), keeping at most one offer
    /// open per thread.
    pub async fn propose_offer(
        &self,
        order_id: Option<&str>,
        sender: &str,
        amount: Decimal,
        message: Option<String>,
        kind: OfferKind,
    ) -> Result<(Offer, Vec<Notification>)> {
        let amount = Amount::new(amount)?;

        let order = match order_id {
            Some(id) => {
                let order = self
                    .orders
                    .get(id)
                    .await?
                    .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;
                if !order.is_participant(sender) {
                    return Err(OrderError::InvalidActor(
                        "only a participant can make an offer".to_string(),
                    ));
                }
                Some(order)
            }
            None => None,
        };

        if let Some(id) = order_id {
            for prior in self.offers.for_order(id).await? {
                if prior.status == NegotiationStatus::Pending {
                    self.offers
                        .update(
                            &prior.id,
                            Box::new(|offer| {
                                offer.supersede();
                                Ok(())
                            }),
                        )
                        .await?;
                }
            }
        }

        let offer = Offer::new(order_id, sender, amount, message, kind);
        self.offers.insert(offer.clone()).await?;

        let mut notifications = Vec::new();
        if let Some(counterpart) = order.as_ref().and_then(|o| o.counterpart_of(sender)) {
            notifications.push(Notification::new(
                counterpart,
                NotificationKind::OfferReceived,
                offer.order_id.clone(),
                format!("New {}: ${}", offer.kind, offer.amount.value()),
            ));
        }
        Ok((offer, notifications))
    }

    /// Accepts or declines a pending offer. Accepting does not move the
    /// order: the accepted amount only matters once the counterpart pays.
    pub async fn respond_to_offer(
        &self,
        offer_id: &str,
        responder: &str,
        decision: Decision,
    ) -> Result<(Offer, Vec<Notification>)> {
        let current = self
            .offers
            .get(offer_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("offer {offer_id}")))?;
        // The order link is best-effort; when it resolves, the responder
        // must be part of that order.
        if let Some(order_id) = &current.order_id
            && let Some(order) = self.orders.get(order_id).await?
            && !order.is_participant(responder)
        {
            return Err(OrderError::InvalidActor(
                "only a participant can answer an offer".to_string(),
            ));
        }

        let responder_id = responder.to_string();
        let updated = self
            .offers
            .update(
                offer_id,
                Box::new(move |offer| offer.respond(&responder_id, decision)),
            )
            .await?;

        let kind = match updated.status {
            NegotiationStatus::Accepted => NotificationKind::OfferAccepted,
            _ => NotificationKind::OfferDeclined,
        };
        let verb = match updated.status {
            NegotiationStatus::Accepted => "accepted",
            _ => "declined",
        };
        let notification = Notification::new(
            &updated.sender_id,
            kind,
            updated.order_id.clone(),
            format!("Your offer of ${} was {verb}", updated.amount.value()),
        );
        Ok((updated, vec![notification]))
    }

    /// Starts checkout for an accepted offer at the offer's amount. The
    /// paying side of the agreement is always the requester, whether the
    /// accepted offer was theirs or a counter-offer from the provider.
    /// Nothing is marked paid here; that only happens through
    /// [`Self::on_payment_confirmed`].
    pub async fn initiate_payment(
        &self,
        order_id: &str,
        offer_id: &str,
        payer: &str,
    ) -> Result<CheckoutSession> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {order_id}")))?;
        let offer = self
            .offers
            .get(offer_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("offer {offer_id}")))?;

        if offer.status != NegotiationStatus::Accepted {
            return Err(OrderError::InvalidState(format!(
                "offer is {}, only accepted offers can be paid",
                offer.status
            )));
        }
        if payer != order.requester_id {
            return Err(OrderError::InvalidActor(
                "only the requester pays for an accepted offer".to_string(),
            ));
        }

        self.checkout(&order, offer.amount, payer).await
    }

    /// The "Pay Now" path: the requester pays the listed price without
    /// negotiating.
    pub async fn initiate_direct_payment(
        &self,
        order_id: &str,
        payer: &str,
    ) -> Result<CheckoutSession> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {order_id}")))?;
        if payer != order.requester_id {
            return Err(OrderError::InvalidActor(
                "only the requester pays for an order".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(OrderError::InvalidState(format!(
                "order is {}, direct payment applies to pending orders",
                order.status
            )));
        }
        self.checkout(&order, order.amount, payer).await
    }

    async fn checkout(
        &self,
        order: &Order,
        amount: Amount,
        payer: &str,
    ) -> Result<CheckoutSession> {
        let amount_minor_units = amount
            .minor_units()
            .ok_or_else(|| OrderError::Payment("amount out of range".to_string()))?;
        let request = CheckoutRequest {
            amount_minor_units,
            currency: DEFAULT_CURRENCY.to_string(),
            description: format!("BorrowPal {} order {}", order.kind, order.id),
            metadata: CheckoutMetadata {
                order_id: order.id.clone(),
                order_kind: order.kind,
                payer_id: payer.to_string(),
            },
        };
        self.gateway.create_checkout(request).await
    }

    /// Callback from the payment verification collaborator. Payment implies
    /// acceptance: a pending order moves to `accepted` and is stamped paid.
    /// Idempotent — once the order left `pending` this is a no-op and emits
    /// no events.
    pub async fn on_payment_confirmed(
        &self,
        order_id: &str,
        verification: PaymentVerification,
    ) -> Result<(Order, Vec<Notification>)> {
        if !verification.success {
            return Err(OrderError::Payment(
                "payment was not completed".to_string(),
            ));
        }

        let applied = Arc::new(AtomicBool::new(false));
        let flag = applied.clone();
        let updated = self
            .orders
            .update(
                order_id,
                Box::new(move |order| {
                    if order.status != OrderStatus::Pending {
                        return Ok(());
                    }
                    order.transition(OrderStatus::Accepted)?;
                    order.paid_at = Some(Utc::now());
                    flag.store(true, Ordering::Relaxed);
                    Ok(())
                }),
            )
            .await?;

        let mut notifications = Vec::new();
        if applied.load(Ordering::Relaxed) {
            let paid = Decimal::new(verification.verified_amount_minor_units, 2);
            notifications.push(Notification::new(
                &updated.provider_id,
                NotificationKind::PaymentReceived,
                Some(updated.id.clone()),
                format!("You have received a payment of ${paid}"),
            ));
        }
        Ok((updated, notifications))
    }

    /// The negotiation thread for an order, oldest offer first.
    pub async fn offers_for(&self, order_id: &str) -> Result<Vec<Offer>> {
        self.offers.for_order(order_id).await
    }
}
