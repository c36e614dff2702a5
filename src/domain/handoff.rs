use crate::domain::order::{HandoffSlot, Order, OrderKind, OrderStatus};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the order id and the code in a presented QR value.
pub const SCAN_SEPARATOR: char = '|';

const CODE_LEN: usize = 16;

/// The four physical-exchange confirmations. Delivery and return belong to
/// item orders, start and completion to service orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffAction {
    Delivery,
    Return,
    StartService,
    CompleteService,
}

impl HandoffAction {
    pub fn order_kind(self) -> OrderKind {
        match self {
            HandoffAction::Delivery | HandoffAction::Return => OrderKind::Item,
            HandoffAction::StartService | HandoffAction::CompleteService => OrderKind::Service,
        }
    }

    /// Whether this action closes out the order (return / complete_service)
    /// as opposed to starting it (delivery / start_service).
    pub fn is_terminal(self) -> bool {
        matches!(self, HandoffAction::Return | HandoffAction::CompleteService)
    }

    pub fn confirmation_message(self) -> &'static str {
        match self {
            HandoffAction::Delivery => "Item delivery confirmed",
            HandoffAction::Return => "Item return confirmed, order completed",
            HandoffAction::StartService => "Service started",
            HandoffAction::CompleteService => "Service completed",
        }
    }
}

impl fmt::Display for HandoffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandoffAction::Delivery => "delivery",
            HandoffAction::Return => "return",
            HandoffAction::StartService => "start_service",
            HandoffAction::CompleteService => "complete_service",
        };
        write!(f, "{name}")
    }
}

impl FromStr for HandoffAction {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "delivery" => Ok(HandoffAction::Delivery),
            "return" => Ok(HandoffAction::Return),
            "start_service" => Ok(HandoffAction::StartService),
            "complete_service" => Ok(HandoffAction::CompleteService),
            other => Err(OrderError::MalformedInput(format!(
                "unknown handoff action '{other}'"
            ))),
        }
    }
}

/// The value shown to the counterpart for scanning: `<order id>|<code>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCode {
    pub order_id: String,
    pub code: String,
}

impl PresentedCode {
    pub fn value(&self) -> String {
        format!("{}{SCAN_SEPARATOR}{}", self.order_id, self.code)
    }

    pub fn parse(presented: &str) -> Result<Self> {
        let (order_id, code) = presented.split_once(SCAN_SEPARATOR).ok_or_else(|| {
            OrderError::MalformedInput(format!(
                "scan payload must be '<order>{SCAN_SEPARATOR}<code>'"
            ))
        })?;
        if order_id.is_empty() || code.is_empty() {
            return Err(OrderError::MalformedInput(
                "scan payload is missing the order id or the code".to_string(),
            ));
        }
        Ok(Self {
            order_id: order_id.to_string(),
            code: code.to_string(),
        })
    }
}

/// Random opaque token backing a handoff code.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

impl Order {
    /// The slot `action` confirms into, or `InvalidAction` when the action
    /// belongs to the other order kind.
    pub fn handoff_slot(&self, action: HandoffAction) -> Result<&HandoffSlot> {
        self.check_action(action)?;
        Ok(if action.is_terminal() {
            &self.terminal_handoff
        } else {
            &self.initial_handoff
        })
    }

    pub fn handoff_slot_mut(&mut self, action: HandoffAction) -> Result<&mut HandoffSlot> {
        self.check_action(action)?;
        Ok(if action.is_terminal() {
            &mut self.terminal_handoff
        } else {
            &mut self.initial_handoff
        })
    }

    fn check_action(&self, action: HandoffAction) -> Result<()> {
        if action.order_kind() != self.kind {
            return Err(OrderError::InvalidAction {
                action: action.to_string(),
                kind: self.kind.to_string(),
            });
        }
        Ok(())
    }

    /// Consumes the code for `action`: stamps the confirmation timestamp and
    /// moves the order to `ongoing` (initial action) or `completed`
    /// (terminal action). Fails without mutating anything when the slot was
    /// already consumed or the order is not in a state the action applies to.
    pub fn confirm_handoff(&mut self, action: HandoffAction, at: DateTime<Utc>) -> Result<()> {
        if self.handoff_slot(action)?.confirmed_at.is_some() {
            return Err(OrderError::AlreadyConsumed);
        }
        let next = if action.is_terminal() {
            OrderStatus::Completed
        } else {
            OrderStatus::Ongoing
        };
        self.transition(next)?;
        // check_action passed above, the slot lookup cannot fail here
        self.handoff_slot_mut(action)?.confirmed_at = Some(at);
        Ok(())
    }
}
