//! Reconcile Use Case
//!
//! The order lifecycle engine. Each pass advances every open trade group from
//! a broker snapshot and issues whatever broker commands the transition needs.
//!
//! | State | Trigger | Next | Broker action |
//! |-------|---------|------|---------------|
//! | ENTRY_PENDING | entry filled | ARMED | submit TP limit + SL stop |
//! | ENTRY_PENDING | entry rejected/cancelled/expired | FAILED | none |
//! | ENTRY_PENDING | entry open or unseen past timeout | FAILED | cancel entry |
//! | ARMED | TP filled | CLOSED_TP | cancel SL |
//! | ARMED | SL filled | CLOSED_SL | cancel TP |
//! | ARMED | position flat, no leg filled | CLOSED_MANUAL | cancel both |

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::dto::{
    BrokerSnapshot, GroupFailure, ReconcileReport, StrayLeg, TradeGroupTransition,
};
use crate::application::ports::{
    Alert, AlertPort, AlertSeverity, BrokerError, BrokerOrder, BrokerOrderStatus, BrokerPort,
    CancelOrderRequest, Clock, SubmitOrderRequest,
};
use crate::domain::shared::ClientOrderId;
use crate::domain::trade_group::{
    GroupState, LegFill, LegKind, TradeGroup, TradeGroupStore, resolve_exit,
};
use crate::error::ReconcilerError;

const EXIT_LEGS: [LegKind; 2] = [LegKind::TakeProfit, LegKind::StopLoss];

/// What to do with an entry that partially filled before it timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFillPolicy {
    /// Cancel the remainder, mark the group FAILED, and alert.
    #[default]
    Fail,
    /// Cancel the remainder and arm exits for the filled quantity.
    ArmPartial,
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How long an entry may stay unfilled.
    pub entry_timeout: chrono::Duration,
    /// Consecutive arm failures before a group is forced to FAILED.
    pub max_arm_failures: u32,
    /// Handling of partial fills at timeout.
    pub partial_fill_policy: PartialFillPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            entry_timeout: chrono::Duration::seconds(300),
            max_arm_failures: 3,
            partial_fill_policy: PartialFillPolicy::Fail,
        }
    }
}

/// Use case for reconciling trade groups with broker state.
pub struct ReconcileUseCase<B, S>
where
    B: BrokerPort,
    S: TradeGroupStore,
{
    broker: Arc<B>,
    store: Arc<S>,
    alerts: Arc<dyn AlertPort>,
    clock: Arc<dyn Clock>,
    config: ReconcileConfig,
}

impl<B, S> ReconcileUseCase<B, S>
where
    B: BrokerPort,
    S: TradeGroupStore,
{
    /// Create a new ReconcileUseCase.
    pub fn new(
        broker: Arc<B>,
        store: Arc<S>,
        alerts: Arc<dyn AlertPort>,
        clock: Arc<dyn Clock>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            broker,
            store,
            alerts,
            clock,
            config,
        }
    }

    /// Fetch the broker state relevant to every open group.
    ///
    /// Positions are read before orders: a fill that flattens a position is
    /// then always visible in the order data of the same snapshot.
    ///
    /// # Errors
    ///
    /// Any broker failure other than "order not found" aborts the fetch.
    pub async fn fetch_snapshot(&self) -> Result<BrokerSnapshot, ReconcilerError> {
        let groups = self.store.find_open().await?;
        let mut snapshot = BrokerSnapshot::new(self.clock.now());
        snapshot.positions = self.broker.get_positions().await?;

        for group in &groups {
            let entry = self.lookup(group.client_id(LegKind::Entry)).await?;
            let entry_filled = entry
                .as_ref()
                .is_some_and(|o| o.filled_qty > Decimal::ZERO);
            let exits_expected = group.state() == GroupState::Armed
                || entry_filled
                || group.arm_failures() > 0
                || EXIT_LEGS.iter().any(|leg| group.broker_id(*leg).is_some());

            if let Some(order) = entry {
                snapshot = snapshot.with_order(order);
            }
            if exits_expected {
                for leg in EXIT_LEGS {
                    if let Some(order) = self.lookup(group.client_id(leg)).await? {
                        snapshot = snapshot.with_order(order);
                    }
                }
            }
        }

        tracing::debug!(
            groups = groups.len(),
            orders = snapshot.orders.len(),
            positions = snapshot.positions.len(),
            "Fetched broker snapshot"
        );
        Ok(snapshot)
    }

    /// Reconcile every open group against `snapshot`.
    ///
    /// A failure in one group is recorded in the report and never stops the
    /// others.
    ///
    /// # Errors
    ///
    /// Returns error only if the open groups cannot be loaded.
    pub async fn reconcile(
        &self,
        snapshot: &BrokerSnapshot,
    ) -> Result<ReconcileReport, ReconcilerError> {
        let groups = self.store.find_open().await?;
        let mut report = ReconcileReport::default();
        let mut owned: HashSet<ClientOrderId> = HashSet::new();

        for group in groups {
            report.groups_examined += 1;
            owned.extend(
                [LegKind::Entry, LegKind::TakeProfit, LegKind::StopLoss]
                    .into_iter()
                    .map(|leg| group.client_id(leg).clone()),
            );
            let group_id = group.group_id().clone();

            match self.reconcile_group(group, snapshot).await {
                Ok(Some(transition)) => {
                    tracing::info!(
                        group_id = %transition.group_id,
                        symbol = %transition.symbol,
                        from = %transition.from,
                        to = %transition.to,
                        "Trade group transition"
                    );
                    report.transitions.push(transition);
                }
                Ok(None) => {}
                Err(err) => {
                    let err = err.with_context("group_id", group_id.as_str());
                    err.log("Trade group reconciliation failed");
                    report.errors.push(GroupFailure::new(&group_id, &err));
                }
            }
        }

        for order in snapshot.orders.values() {
            if owned.contains(&order.client_order_id) || !order.status.is_open() {
                continue;
            }
            match self.store.find_by_client_id(&order.client_order_id).await {
                Ok(Some(group)) if !group.is_open() => {
                    tracing::warn!(
                        group_id = %group.group_id(),
                        client_order_id = %order.client_order_id,
                        state = %group.state(),
                        "Live order belongs to a closed trade group"
                    );
                    report.stray_legs.push(StrayLeg {
                        group_id: group.group_id().clone(),
                        client_order_id: order.client_order_id.clone(),
                        group_state: group.state(),
                    });
                }
                Ok(_) => {}
                Err(e) => ReconcilerError::from(e).log("Stray leg lookup failed"),
            }
        }

        Ok(report)
    }

    async fn reconcile_group(
        &self,
        group: TradeGroup,
        snapshot: &BrokerSnapshot,
    ) -> Result<Option<TradeGroupTransition>, ReconcilerError> {
        match group.state() {
            GroupState::EntryPending => self.reconcile_pending(group, snapshot).await,
            GroupState::Armed => self.reconcile_armed(group, snapshot).await,
            _ => Ok(None),
        }
    }

    // ========================================================================
    // ENTRY_PENDING
    // ========================================================================

    async fn reconcile_pending(
        &self,
        mut group: TradeGroup,
        snapshot: &BrokerSnapshot,
    ) -> Result<Option<TradeGroupTransition>, ReconcilerError> {
        let entry = snapshot.order(group.client_id(LegKind::Entry));
        let mut dirty = false;

        if let Some(order) = entry.filter(|_| group.broker_id(LegKind::Entry).is_none()) {
            group.record_entry_ack(order.broker_order_id.clone())?;
            dirty = true;
        }

        if let Some(order) = entry {
            if order.status == BrokerOrderStatus::Filled {
                return self
                    .arm(group, order.filled_qty, order.filled_avg_price, snapshot)
                    .await;
            }
            if order.status.is_dead() {
                if order.filled_qty > Decimal::ZERO {
                    return self.resolve_partial_fill(group, order, snapshot).await;
                }
                group.fail(&format!("entry {}", order.status))?;
                return self.commit(group, GroupState::EntryPending).await.map(Some);
            }
        }

        if group.age(snapshot.fetched_at) >= self.config.entry_timeout {
            self.cancel_leg(&group, LegKind::Entry, snapshot).await?;
            if let Some(order) = entry.filter(|o| o.filled_qty > Decimal::ZERO) {
                return self.resolve_partial_fill(group, order, snapshot).await;
            }
            let note = if entry.is_some() {
                "entry not filled before timeout"
            } else {
                "entry never seen at broker before timeout"
            };
            group.fail(note)?;
            return self.commit(group, GroupState::EntryPending).await.map(Some);
        }

        if dirty {
            self.store.update(&group, self.clock.now()).await?;
        }
        Ok(None)
    }

    async fn resolve_partial_fill(
        &self,
        mut group: TradeGroup,
        entry: &BrokerOrder,
        snapshot: &BrokerSnapshot,
    ) -> Result<Option<TradeGroupTransition>, ReconcilerError> {
        match self.config.partial_fill_policy {
            PartialFillPolicy::ArmPartial => {
                tracing::warn!(
                    group_id = %group.group_id(),
                    filled_qty = %entry.filled_qty,
                    requested_qty = %group.quantity(),
                    "Arming partially filled entry"
                );
                self.arm(group, entry.filled_qty, entry.filled_avg_price, snapshot)
                    .await
            }
            PartialFillPolicy::Fail => {
                let note = format!(
                    "entry partially filled ({} of {}) and abandoned",
                    entry.filled_qty,
                    group.quantity()
                );
                group.fail(&note)?;
                let transition = self.commit(group.clone(), GroupState::EntryPending).await?;
                self.alert(Alert::for_group(
                    AlertSeverity::Critical,
                    group.group_id(),
                    group.symbol(),
                    "Partial fill left unprotected",
                    format!(
                        "{note}; {} {} is held without exit orders",
                        entry.filled_qty,
                        group.symbol()
                    ),
                ))
                .await;
                Ok(Some(transition))
            }
        }
    }

    /// Place whichever exit legs are missing, then move to ARMED.
    async fn arm(
        &self,
        mut group: TradeGroup,
        filled_qty: Decimal,
        filled_avg_price: Option<Decimal>,
        snapshot: &BrokerSnapshot,
    ) -> Result<Option<TradeGroupTransition>, ReconcilerError> {
        let mut failure: Option<ReconcilerError> = None;

        for leg in EXIT_LEGS {
            if group.broker_id(leg).is_some() {
                continue;
            }
            let client_id = group.client_id(leg).clone();

            if let Some(existing) = snapshot.order(&client_id) {
                if existing.status.is_dead() {
                    failure = Some(ReconcilerError::arm_failed(format!(
                        "{leg} leg {client_id} is {} at broker",
                        existing.status
                    )));
                    break;
                }
                tracing::info!(
                    group_id = %group.group_id(),
                    leg = %leg,
                    broker_order_id = %existing.broker_order_id,
                    "Adopting exit leg already at broker"
                );
                group.record_exit_ack(leg, existing.broker_order_id.clone())?;
                continue;
            }

            let request = exit_request(&group, leg, filled_qty);
            match self.broker.submit_order_idempotent(request).await {
                Ok(ack) => {
                    tracing::info!(
                        group_id = %group.group_id(),
                        leg = %leg,
                        broker_order_id = %ack.broker_order_id,
                        "Exit leg placed"
                    );
                    group.record_exit_ack(leg, ack.broker_order_id)?;
                }
                Err(e) => {
                    failure = Some(ReconcilerError::arm_failed(format!("{leg} leg: {e}")));
                    break;
                }
            }
        }

        if let Some(err) = failure {
            return self
                .handle_arm_failure(group, err, filled_qty, snapshot)
                .await;
        }

        group.arm(filled_qty, filled_avg_price)?;
        self.commit(group, GroupState::EntryPending).await.map(Some)
    }

    async fn handle_arm_failure(
        &self,
        mut group: TradeGroup,
        err: ReconcilerError,
        filled_qty: Decimal,
        snapshot: &BrokerSnapshot,
    ) -> Result<Option<TradeGroupTransition>, ReconcilerError> {
        let failures = group.record_arm_failure(err.message())?;
        group = self.store.update(&group, self.clock.now()).await?;

        if failures < self.config.max_arm_failures {
            return Err(err.with_context("arm_failures", failures.to_string()));
        }

        for leg in EXIT_LEGS {
            if group.broker_id(leg).is_some() {
                self.cancel_leg(&group, leg, snapshot).await?;
            }
        }

        let note = format!("exit legs not armed after {failures} attempts: {}", err.message());
        group.fail(&note)?;
        let transition = self.commit(group.clone(), GroupState::EntryPending).await?;
        self.alert(Alert::for_group(
            AlertSeverity::Critical,
            group.group_id(),
            group.symbol(),
            "Filled entry could not be protected",
            format!(
                "{note}; {filled_qty} {} is held without exit orders",
                group.symbol()
            ),
        ))
        .await;
        Ok(Some(transition))
    }

    // ========================================================================
    // ARMED
    // ========================================================================

    async fn reconcile_armed(
        &self,
        mut group: TradeGroup,
        snapshot: &BrokerSnapshot,
    ) -> Result<Option<TradeGroupTransition>, ReconcilerError> {
        let fill = |leg: LegKind| {
            snapshot
                .order(group.client_id(leg))
                .filter(|o| o.status == BrokerOrderStatus::Filled)
                .map(|o| LegFill {
                    filled_at: o.filled_at,
                })
        };

        if let Some(outcome) = resolve_exit(fill(LegKind::TakeProfit), fill(LegKind::StopLoss)) {
            self.cancel_leg(&group, outcome.loser(), snapshot).await?;
            group.close(outcome)?;
            return self.commit(group, GroupState::Armed).await.map(Some);
        }

        if snapshot.is_flat(group.symbol()) {
            for leg in EXIT_LEGS {
                self.cancel_leg(&group, leg, snapshot).await?;
            }
            group.close_manually("position flat with neither exit leg filled")?;
            return self.commit(group, GroupState::Armed).await.map(Some);
        }

        for leg in EXIT_LEGS {
            if let Some(order) = snapshot
                .order(group.client_id(leg))
                .filter(|o| o.status.is_dead())
            {
                tracing::warn!(
                    group_id = %group.group_id(),
                    leg = %leg,
                    status = %order.status,
                    "Exit leg is no longer working while the position is open"
                );
            }
        }

        Ok(None)
    }

    // ========================================================================
    // Broker helpers
    // ========================================================================

    async fn lookup(
        &self,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<BrokerOrder>, BrokerError> {
        match self.broker.get_order(client_order_id).await {
            Ok(order) => Ok(Some(order)),
            Err(BrokerError::OrderNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Cancel a leg unless the snapshot already shows it terminal.
    ///
    /// "Not found" and "already terminal" count as success.
    async fn cancel_leg(
        &self,
        group: &TradeGroup,
        leg: LegKind,
        snapshot: &BrokerSnapshot,
    ) -> Result<(), ReconcilerError> {
        let client_id = group.client_id(leg);
        let seen = snapshot.order(client_id);
        if seen.is_some_and(|o| o.status.is_terminal()) {
            return Ok(());
        }

        let broker_id = group
            .broker_id(leg)
            .or_else(|| seen.map(|o| &o.broker_order_id));
        let request = CancelOrderRequest::for_leg(broker_id, client_id);

        match self.broker.cancel_order(request).await {
            Ok(()) => {
                tracing::info!(
                    group_id = %group.group_id(),
                    leg = %leg,
                    client_order_id = %client_id,
                    "Cancelled leg"
                );
                Ok(())
            }
            Err(e) if e.cancel_is_settled() => {
                tracing::debug!(
                    group_id = %group.group_id(),
                    leg = %leg,
                    reason = %e,
                    "Leg already gone"
                );
                Ok(())
            }
            Err(e) => Err(ReconcilerError::from(e)
                .with_context("leg", leg.suffix())
                .with_context("client_order_id", client_id.as_str())),
        }
    }

    async fn commit(
        &self,
        group: TradeGroup,
        from: GroupState,
    ) -> Result<TradeGroupTransition, ReconcilerError> {
        let persisted = self.store.update(&group, self.clock.now()).await?;
        Ok(TradeGroupTransition {
            group_id: persisted.group_id().clone(),
            symbol: persisted.symbol().clone(),
            from,
            to: persisted.state(),
        })
    }

    async fn alert(&self, alert: Alert) {
        if let Err(e) = self.alerts.send(alert).await {
            tracing::error!(error = %e, "Failed to deliver operator alert");
        }
    }
}

fn exit_request(group: &TradeGroup, leg: LegKind, quantity: Decimal) -> SubmitOrderRequest {
    let client_id = group.client_id(leg).clone();
    let symbol = group.symbol().clone();
    let side = group.side().exit_side();
    match leg {
        LegKind::StopLoss => {
            SubmitOrderRequest::stop(client_id, symbol, side, quantity, group.stop_loss_price())
        }
        _ => SubmitOrderRequest::limit(client_id, symbol, side, quantity, group.take_profit_price()),
    }
}
