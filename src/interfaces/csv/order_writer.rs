use crate::domain::order::{Order, OrderKind, OrderStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct OrderRow<'a> {
    order: &'a str,
    kind: OrderKind,
    requester: &'a str,
    provider: &'a str,
    amount: Decimal,
    status: OrderStatus,
}

/// Writes the final order table as CSV, sorted by order id so output is
/// deterministic across runs.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, mut orders: Vec<Order>) -> Result<()> {
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        for order in &orders {
            self.writer.serialize(OrderRow {
                order: &order.id,
                kind: order.kind,
                requester: &order.requester_id,
                provider: &order.provider_id,
                amount: order.amount.value().normalize(),
                status: order.status,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
