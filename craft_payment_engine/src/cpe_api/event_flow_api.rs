use std::fmt::Display;

use log::{error, info, warn};

use crate::{
    cpe_api::errors::EventFlowError,
    db_types::{Customer, EventOutcome, NewCustomer, NewOrder, Order, OrderNumber},
    events::{EventProducers, OrderPaidEvent, OrderRefundedEvent},
    helpers::generate_order_number,
    pricing::PriceResolver,
    provider_types::{CheckoutSession, ProviderEvent, RefundNotice, WebhookEnvelope},
    traits::{
        NewProductionJob,
        PaidOrderResult,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PricingSource,
        ProductCatalog,
        ProductionJobPayload,
        DEFAULT_JOB_PRIORITY,
    },
};

//--------------------------------------  EventDisposition  ----------------------------------------------------------
/// What processing an event amounted to. Every variant corresponds to an acknowledged event; the caller only ever
/// asks the provider to retry on an [`EventFlowError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// The order was confirmed paid and exactly one production job was emitted.
    Processed { order_number: OrderNumber },
    /// A distinct event for an order that is already paid. Acknowledged with no new writes.
    AlreadyProcessed { order_number: OrderNumber },
    /// The order moved to `Refunded`.
    Refunded { order_number: OrderNumber },
    /// This exact event id has been seen before. No side effects were performed.
    Duplicate,
    /// An event type outside the handled set. Recorded in the ledger and skipped.
    Unhandled { event_type: String },
    /// A refund that matches no known order. Recorded as a data-integrity signal.
    NoOrder,
    /// The event was valid but required no transition (e.g. a refund for an unpaid order).
    Skipped { reason: String },
}

impl Display for EventDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventDisposition::Processed { order_number } => write!(f, "Processed ({order_number})"),
            EventDisposition::AlreadyProcessed { order_number } => write!(f, "AlreadyProcessed ({order_number})"),
            EventDisposition::Refunded { order_number } => write!(f, "Refunded ({order_number})"),
            EventDisposition::Duplicate => write!(f, "Duplicate"),
            EventDisposition::Unhandled { event_type } => write!(f, "Unhandled ({event_type})"),
            EventDisposition::NoOrder => write!(f, "NoOrder"),
            EventDisposition::Skipped { reason } => write!(f, "Skipped ({reason})"),
        }
    }
}

//--------------------------------------    EventFlowApi    ----------------------------------------------------------
/// The single entry point for processing verified provider events.
///
/// `process_event` is safe to call concurrently and safe to call repeatedly with the same event: deduplication and
/// the at-most-once `Paid` transition both rest on the backend's uniqueness constraints, not on anything held in
/// this struct.
pub struct EventFlowApi<B, C, P> {
    db: B,
    resolver: PriceResolver<C, P>,
    producers: EventProducers,
}

impl<B, C, P> EventFlowApi<B, C, P>
where
    B: PaymentGatewayDatabase,
    C: ProductCatalog,
    P: PricingSource,
{
    pub fn new(db: B, resolver: PriceResolver<C, P>, producers: EventProducers) -> Self {
        Self { db, resolver, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Carries one verified event end to end. The ledger row is claimed first; if the claim loses (the id has been
    /// seen), processing stops with [`EventDisposition::Duplicate`] and no side effects. Otherwise the event is
    /// dispatched, the outcome is stamped onto the ledger row, and the disposition is returned.
    ///
    /// An `Err` means the attempt was recorded but did not complete (its ledger row carries `Failed`); the caller
    /// should ask the provider to redeliver. Note that a redelivery of a failed event id is deduplicated, so
    /// permanent failures are re-driven by the external reconciliation sweep, not by retries.
    pub async fn process_event(&self, envelope: &WebhookEnvelope) -> Result<EventDisposition, EventFlowError> {
        let fresh = self.db.record_event(&envelope.id, &envelope.event_type).await?;
        if !fresh {
            info!("📬️ Event [{}] has been delivered before. Acknowledging without side effects.", envelope.id);
            return Ok(EventDisposition::Duplicate);
        }
        let mut order_id = None;
        let result = match envelope.classify() {
            Ok(ProviderEvent::CheckoutCompleted(session)) => {
                self.handle_checkout(&envelope.id, session, &mut order_id).await
            },
            Ok(ProviderEvent::RefundCompleted(notice)) => {
                self.handle_refund(&envelope.id, notice, &mut order_id).await
            },
            Ok(ProviderEvent::Unhandled { event_type }) => {
                info!("📬️ Event [{}] has unhandled type '{event_type}'. Recording and skipping.", envelope.id);
                Ok(EventDisposition::Unhandled { event_type })
            },
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(disposition) => {
                let (outcome, detail) = ledger_outcome(&disposition);
                self.finalize(&envelope.id, order_id, outcome, detail.as_deref()).await;
                Ok(disposition)
            },
            Err(e) => {
                self.finalize(&envelope.id, order_id, EventOutcome::Failed, Some(&e.to_string())).await;
                Err(e)
            },
        }
    }

    /// A `checkout.session.completed` event: reconcile the customer, open (or re-find) the order, price it if it has
    /// no snapshot yet, then attempt the `Paid` transition with the production job in the same transaction.
    async fn handle_checkout(
        &self,
        event_id: &str,
        session: CheckoutSession,
        order_id: &mut Option<i64>,
    ) -> Result<EventDisposition, EventFlowError> {
        let shipping_address = encode_address(session.shipping_address.as_ref())?;
        let billing_address = encode_address(session.billing_address.as_ref())?;
        let customer =
            self.reconcile_customer(&session, shipping_address.clone(), billing_address.clone()).await?;
        let order_number =
            session.order_number.clone().map(OrderNumber).unwrap_or_else(generate_order_number);
        let new_order = NewOrder {
            order_number,
            provider_session_id: session.session_id.clone(),
            customer_id: customer.as_ref().map(|c| c.id),
            currency: session.currency.clone(),
            shipping: session.shipping.unwrap_or_default(),
            tax: session.tax.unwrap_or_default(),
            shipping_address,
            billing_address,
            created_at: session.created_at,
        };
        let (order, created) = self.db.insert_or_fetch_order(new_order).await?;
        *order_id = Some(order.id);
        if created {
            info!("📦️ Order {} opened for session [{}]", order.order_number, session.session_id);
        }
        let order = self.price_order(order, &session).await?;
        let pricing = order.parsed_snapshot().map_err(PaymentGatewayError::from)?.ok_or_else(|| {
            PaymentGatewayError::DatabaseError(format!(
                "Order {} has no pricing snapshot after the pricing step",
                order.order_number
            ))
        })?;
        let payload = ProductionJobPayload {
            order_number: order.order_number.clone(),
            currency: order.currency.clone(),
            customer: customer.clone(),
            shipping_address: session.shipping_address.clone(),
            pricing,
        };
        let job = NewProductionJob { priority: DEFAULT_JOB_PRIORITY, payload };
        match self.db.mark_order_paid(order.id, &session.payment_ref, event_id, job).await? {
            PaidOrderResult::Paid { order, job } => {
                info!(
                    "📦️ Order {} confirmed paid via payment [{}]. Production job {} queued.",
                    order.order_number, session.payment_ref, job.id
                );
                let event = OrderPaidEvent::new(order.clone(), customer, job);
                for producer in &self.producers.order_paid_producer {
                    producer.publish_event(event.clone()).await;
                }
                Ok(EventDisposition::Processed { order_number: order.order_number })
            },
            PaidOrderResult::AlreadyPaid(order) => {
                info!(
                    "📦️ Order {} is already paid. Event [{event_id}] acknowledged without a new job.",
                    order.order_number
                );
                Ok(EventDisposition::AlreadyProcessed { order_number: order.order_number })
            },
        }
    }

    /// Prices the order if and only if it carries no snapshot yet. The snapshot write is guarded in the backend, so
    /// a racing event cannot produce a second, different snapshot.
    async fn price_order(&self, order: Order, session: &CheckoutSession) -> Result<Order, EventFlowError> {
        if order.pricing_snapshot.is_some() {
            return Ok(order);
        }
        let shipping = session.shipping.unwrap_or_default();
        let tax = session.tax.unwrap_or_default();
        let snapshot = self.resolver.resolve_order(&session.line_items, shipping, tax).await?;
        if let Some(provider_total) = session.amount_total {
            if provider_total != snapshot.total {
                warn!(
                    "💵️ Provider total {provider_total} disagrees with resolved total {} for order {}. The \
                     resolved price is authoritative.",
                    snapshot.total, order.order_number
                );
            }
        }
        let order = self.db.write_pricing_snapshot(order.id, &snapshot).await?;
        Ok(order)
    }

    async fn reconcile_customer(
        &self,
        session: &CheckoutSession,
        shipping_address: Option<String>,
        billing_address: Option<String>,
    ) -> Result<Option<Customer>, EventFlowError> {
        let details = &session.customer;
        if details.provider_customer_id.is_none()
            && details.email.is_none()
            && details.name.is_none()
            && details.phone.is_none()
        {
            return Ok(None);
        }
        let customer = self
            .db
            .upsert_customer(NewCustomer {
                provider_customer_id: details.provider_customer_id.clone(),
                email: details.email.clone(),
                name: details.name.clone(),
                phone: details.phone.clone(),
                shipping_address,
                billing_address,
            })
            .await?;
        Ok(Some(customer))
    }

    /// A `charge.refunded` event. Matched against the payment reference recorded at the `Paid` transition; anything
    /// that cannot transition is recorded and acknowledged rather than retried.
    async fn handle_refund(
        &self,
        event_id: &str,
        notice: RefundNotice,
        order_id: &mut Option<i64>,
    ) -> Result<EventDisposition, EventFlowError> {
        let Some(order) = self.db.fetch_order_by_payment_ref(&notice.payment_ref).await? else {
            warn!(
                "📦️ Refund event [{event_id}] references payment [{}], but no order matches. Recording for \
                 reconciliation.",
                notice.payment_ref
            );
            return Ok(EventDisposition::NoOrder);
        };
        *order_id = Some(order.id);
        match self.db.mark_order_refunded(order.id, event_id).await? {
            Some(refunded) => {
                let reason = notice.reason.as_deref().unwrap_or("no reason given");
                info!("📦️ Order {} refunded ({reason})", refunded.order_number);
                let event = OrderRefundedEvent::new(refunded.clone());
                for producer in &self.producers.order_refunded_producer {
                    producer.publish_event(event.clone()).await;
                }
                Ok(EventDisposition::Refunded { order_number: refunded.order_number })
            },
            None => {
                let reason = format!(
                    "order {} is {}, not Paid; the refund was recorded without a transition",
                    order.order_number, order.status
                );
                warn!("📦️ {reason}");
                Ok(EventDisposition::Skipped { reason })
            },
        }
    }

    /// Stamping the outcome is best effort: the money-affecting writes have committed by the time we get here, and
    /// a ledger row left without an outcome is picked up by the reconciliation sweep.
    async fn finalize(&self, event_id: &str, order_id: Option<i64>, outcome: EventOutcome, detail: Option<&str>) {
        if let Err(e) = self.db.finalize_event(event_id, order_id, outcome, detail).await {
            error!("📬️ Could not finalize event [{event_id}] with outcome {outcome}. {e}");
        }
    }
}

fn ledger_outcome(disposition: &EventDisposition) -> (EventOutcome, Option<String>) {
    match disposition {
        EventDisposition::Processed { .. } | EventDisposition::Refunded { .. } => (EventOutcome::Success, None),
        EventDisposition::AlreadyProcessed { order_number } => {
            (EventOutcome::Skipped, Some(format!("order {order_number} was already paid")))
        },
        EventDisposition::Unhandled { event_type } => {
            (EventOutcome::Skipped, Some(format!("unhandled event type '{event_type}'")))
        },
        EventDisposition::NoOrder => {
            (EventOutcome::NoOrder, Some("no order matches the refund's payment reference".to_string()))
        },
        EventDisposition::Skipped { reason } => (EventOutcome::Skipped, Some(reason.clone())),
        // Duplicates are never finalized; the original delivery owns the ledger row.
        EventDisposition::Duplicate => (EventOutcome::Skipped, None),
    }
}

fn encode_address(address: Option<&serde_json::Value>) -> Result<Option<String>, EventFlowError> {
    let encoded = address.map(serde_json::to_string).transpose().map_err(PaymentGatewayError::from)?;
    Ok(encoded)
}
