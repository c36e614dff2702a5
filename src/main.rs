use borrowpal::application::dispatch;
use borrowpal::application::handoff::HandoffEngine;
use borrowpal::application::negotiation::NegotiationEngine;
use borrowpal::domain::handoff::HandoffAction;
use borrowpal::domain::offer::{NegotiationStatus, Offer, OfferKind};
use borrowpal::domain::order::Decision;
use borrowpal::domain::ports::{
    Notifier, OfferStoreRef, OrderStore, OrderStoreRef, PaymentVerifier,
};
use borrowpal::error::OrderError;
use borrowpal::infrastructure::in_memory::{
    InMemoryOfferStore, InMemoryOrderStore, RecordingGateway,
};
use borrowpal::infrastructure::notify::LogNotifier;
use borrowpal::interfaces::csv::action_reader::{ActionReader, ActionRecord, Op};
use borrowpal::interfaces::csv::order_writer::OrderWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input action log CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let (orders, offers): (OrderStoreRef, OfferStoreRef) = match &cli.db_path {
        Some(path) => open_persistent(path)?,
        None => (
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOfferStore::new()),
        ),
    };

    let gateway = Arc::new(RecordingGateway::new());
    let notifier = LogNotifier;
    let negotiation = NegotiationEngine::new(orders.clone(), offers, gateway.clone());
    let handoff = HandoffEngine::new(orders.clone());

    // Checkout sessions created during this replay, newest per order, so a
    // later `paid` row can feed the verification callback.
    let mut sessions: HashMap<String, String> = HashMap::new();

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = ActionReader::new(file);
    for record in reader.actions() {
        match record {
            Ok(action) => {
                if let Err(e) = apply(
                    &negotiation,
                    &handoff,
                    gateway.as_ref(),
                    &notifier,
                    &mut sessions,
                    action,
                )
                .await
                {
                    tracing::warn!(error = %e, "skipping action");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable action");
            }
        }
    }

    // Output final state
    let final_orders = orders.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(final_orders).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(path: &Path) -> Result<(OrderStoreRef, OfferStoreRef)> {
    let store = borrowpal::infrastructure::rocksdb::RocksDbStore::open(path).into_diagnostic()?;
    Ok((Arc::new(store.clone()), Arc::new(store)))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(_path: &Path) -> Result<(OrderStoreRef, OfferStoreRef)> {
    Err(miette::miette!(
        "persistent storage requires building with --features storage-rocksdb"
    ))
}

async fn apply(
    negotiation: &NegotiationEngine,
    handoff: &HandoffEngine,
    verifier: &dyn PaymentVerifier,
    notifier: &dyn Notifier,
    sessions: &mut HashMap<String, String>,
    action: ActionRecord,
) -> borrowpal::error::Result<()> {
    let order_id = action.order.clone();
    match action.op {
        Op::Book => {
            let requester = required(action.actor, "actor")?;
            let provider = required(action.counterpart, "counterpart")?;
            let kind = action.kind.ok_or_else(|| missing("kind"))?;
            let amount = action.amount.ok_or_else(|| missing("amount"))?;
            let (_, events) = negotiation
                .request_booking(&order_id, kind, &requester, &provider, amount, None)
                .await?;
            dispatch(notifier, &events).await;
        }
        Op::AcceptBooking | Op::DeclineBooking => {
            let responder = required(action.actor, "actor")?;
            let decision = if action.op == Op::AcceptBooking {
                Decision::Accept
            } else {
                Decision::Decline
            };
            let (_, events) = negotiation
                .respond_to_booking(&order_id, &responder, decision)
                .await?;
            dispatch(notifier, &events).await;
        }
        Op::Offer | Op::Counter => {
            let sender = required(action.actor, "actor")?;
            let amount = action.amount.ok_or_else(|| missing("amount"))?;
            let kind = if action.op == Op::Offer {
                OfferKind::PriceOffer
            } else {
                OfferKind::CounterOffer
            };
            let (_, events) = negotiation
                .propose_offer(Some(&order_id), &sender, amount, action.note, kind)
                .await?;
            dispatch(notifier, &events).await;
        }
        Op::AcceptOffer | Op::DeclineOffer => {
            let responder = required(action.actor, "actor")?;
            let offer =
                newest_with_status(negotiation, &order_id, NegotiationStatus::Pending).await?;
            let decision = if action.op == Op::AcceptOffer {
                Decision::Accept
            } else {
                Decision::Decline
            };
            let (_, events) = negotiation
                .respond_to_offer(&offer.id, &responder, decision)
                .await?;
            dispatch(notifier, &events).await;
        }
        Op::Pay => {
            let payer = required(action.actor, "actor")?;
            let offer =
                newest_with_status(negotiation, &order_id, NegotiationStatus::Accepted).await?;
            let session = negotiation
                .initiate_payment(&order_id, &offer.id, &payer)
                .await?;
            tracing::info!(url = %session.checkout_url, "checkout session created");
            sessions.insert(order_id, session.session_ref);
        }
        Op::PayDirect => {
            let payer = required(action.actor, "actor")?;
            let session = negotiation
                .initiate_direct_payment(&order_id, &payer)
                .await?;
            tracing::info!(url = %session.checkout_url, "checkout session created");
            sessions.insert(order_id, session.session_ref);
        }
        Op::Paid => {
            let session_ref = sessions.get(&order_id).ok_or_else(|| {
                OrderError::NotFound(format!("checkout session for order {order_id}"))
            })?;
            let verification = verifier.verify(session_ref).await?;
            let (_, events) = negotiation
                .on_payment_confirmed(&order_id, verification)
                .await?;
            dispatch(notifier, &events).await;
        }
        Op::Show => {
            let code = handoff
                .generate_code(&order_id, parse_action(action.note)?)
                .await?;
            tracing::info!(value = %code.value(), "handoff code ready");
        }
        Op::Scan => {
            let scanner = required(action.actor, "actor")?;
            let handoff_action = parse_action(action.note)?;
            // generate_code is idempotent, so this resolves the code the
            // counterpart is presenting.
            let code = handoff.generate_code(&order_id, handoff_action).await?;
            let (confirmation, events) = handoff
                .verify_scan(&code.value(), &scanner, handoff_action)
                .await?;
            tracing::info!("{}", confirmation.message);
            dispatch(notifier, &events).await;
        }
        Op::Cancel => {
            let actor = required(action.actor, "actor")?;
            let (_, events) = negotiation.cancel_order(&order_id, &actor).await?;
            dispatch(notifier, &events).await;
        }
        Op::Overdue => {
            let (_, events) = negotiation.mark_overdue(&order_id).await?;
            dispatch(notifier, &events).await;
        }
    }
    Ok(())
}

fn required(field: Option<String>, name: &str) -> borrowpal::error::Result<String> {
    field.ok_or_else(|| missing(name))
}

fn missing(name: &str) -> OrderError {
    OrderError::MalformedInput(format!("column '{name}' is required for this op"))
}

fn parse_action(note: Option<String>) -> borrowpal::error::Result<HandoffAction> {
    required(note, "note")?.parse()
}

async fn newest_with_status(
    negotiation: &NegotiationEngine,
    order_id: &str,
    status: NegotiationStatus,
) -> borrowpal::error::Result<Offer> {
    negotiation
        .offers_for(order_id)
        .await?
        .into_iter()
        .rev()
        .find(|offer| offer.status == status)
        .ok_or_else(|| OrderError::NotFound(format!("{status} offer for order {order_id}")))
}
