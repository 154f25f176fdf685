//! Broker snapshot and reconciliation report.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::application::ports::{BrokerOrder, BrokerPosition};
use crate::domain::shared::{ClientOrderId, GroupId, Symbol, Timestamp};
use crate::domain::trade_group::GroupState;
use crate::error::{ErrorCode, ReconcilerError};

/// Broker state captured at one instant, keyed by client order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    /// Orders the engine asked about, by client order id.
    pub orders: HashMap<ClientOrderId, BrokerOrder>,
    /// All open positions.
    pub positions: Vec<BrokerPosition>,
    /// When the snapshot was taken.
    pub fetched_at: Timestamp,
}

impl BrokerSnapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new(fetched_at: Timestamp) -> Self {
        Self {
            orders: HashMap::new(),
            positions: Vec::new(),
            fetched_at,
        }
    }

    /// Add an order.
    #[must_use]
    pub fn with_order(mut self, order: BrokerOrder) -> Self {
        self.orders.insert(order.client_order_id.clone(), order);
        self
    }

    /// Add a position.
    #[must_use]
    pub fn with_position(mut self, position: BrokerPosition) -> Self {
        self.positions.push(position);
        self
    }

    /// The order with this client id, if visible.
    #[must_use]
    pub fn order(&self, client_order_id: &ClientOrderId) -> Option<&BrokerOrder> {
        self.orders.get(client_order_id)
    }

    /// The position for a symbol, matching `BTC/USD` against `BTCUSD`.
    #[must_use]
    pub fn position(&self, symbol: &Symbol) -> Option<&BrokerPosition> {
        self.positions
            .iter()
            .find(|p| p.symbol.same_instrument(symbol))
    }

    /// Whether the broker holds nothing in `symbol`.
    #[must_use]
    pub fn is_flat(&self, symbol: &Symbol) -> bool {
        self.position(symbol).is_none_or(BrokerPosition::is_flat)
    }
}

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeGroupTransition {
    /// Group.
    pub group_id: GroupId,
    /// Instrument.
    pub symbol: Symbol,
    /// State before.
    pub from: GroupState,
    /// State after.
    pub to: GroupState,
}

/// A group that could not be reconciled this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFailure {
    /// Group.
    pub group_id: GroupId,
    /// Error classification.
    pub code: ErrorCode,
    /// Error text.
    pub message: String,
}

impl GroupFailure {
    /// Record a failure for a group.
    #[must_use]
    pub fn new(group_id: &GroupId, err: &ReconcilerError) -> Self {
        Self {
            group_id: group_id.clone(),
            code: err.code(),
            message: err.message().to_string(),
        }
    }
}

/// A live broker order belonging to a terminal group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrayLeg {
    /// Group that owns the order.
    pub group_id: GroupId,
    /// The live order.
    pub client_order_id: ClientOrderId,
    /// State of the owning group.
    pub group_state: GroupState,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Open groups examined.
    pub groups_examined: usize,
    /// Committed transitions.
    pub transitions: Vec<TradeGroupTransition>,
    /// Per-group failures; other groups were still reconciled.
    pub errors: Vec<GroupFailure>,
    /// Live orders whose group is already terminal.
    pub stray_legs: Vec<StrayLeg>,
}

impl ReconcileReport {
    /// Returns true if nothing changed and nothing failed.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.transitions.is_empty() && self.errors.is_empty() && self.stray_legs.is_empty()
    }
}
