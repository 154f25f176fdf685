//! Trade Group Aggregate Root
//!
//! Owns the linkage between an entry order and its two exit legs, and is the
//! only place group state changes. Every mutator refuses to touch a group
//! that has reached a terminal state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{BrokerId, ClientOrderId, GroupId, Symbol, Timestamp};
use crate::domain::trade_group::errors::TradeGroupError;
use crate::domain::trade_group::services::{ExitOutcome, GroupStateMachine};
use crate::domain::trade_group::value_objects::{GroupState, LegKind, PositionSide};

/// Command to open a new trade group.
#[derive(Debug, Clone)]
pub struct OpenTradeGroupCommand {
    /// Caller-generated idempotency token.
    pub group_id: GroupId,
    /// Instrument.
    pub symbol: Symbol,
    /// Direction of the entry.
    pub side: PositionSide,
    /// Requested entry size.
    pub quantity: Decimal,
    /// Reference (or limit) price of the entry.
    pub entry_price: Decimal,
    /// Take-profit limit price.
    pub take_profit_price: Decimal,
    /// Stop-loss trigger price.
    pub stop_loss_price: Decimal,
}

impl OpenTradeGroupCommand {
    /// Validate the command parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the symbol, quantity, or price levels are invalid.
    pub fn validate(&self) -> Result<(), TradeGroupError> {
        self.symbol
            .validate()
            .map_err(|e| TradeGroupError::InvalidParameters {
                field: "symbol".to_string(),
                message: e.to_string(),
            })?;

        if self.quantity <= Decimal::ZERO {
            return Err(invalid("quantity", "must be positive"));
        }

        for (field, price) in [
            ("entry_price", self.entry_price),
            ("take_profit_price", self.take_profit_price),
            ("stop_loss_price", self.stop_loss_price),
        ] {
            if price <= Decimal::ZERO {
                return Err(invalid(field, "must be positive"));
            }
        }

        if !self
            .side
            .stop_is_protective(self.entry_price, self.stop_loss_price)
        {
            return Err(invalid(
                "stop_loss_price",
                "must be on the losing side of the entry",
            ));
        }

        if !self
            .side
            .target_is_profitable(self.entry_price, self.take_profit_price)
        {
            return Err(invalid(
                "take_profit_price",
                "must be on the winning side of the entry",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> TradeGroupError {
    TradeGroupError::InvalidParameters {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Parameters for reconstituting a TradeGroup from storage.
#[derive(Debug, Clone)]
pub struct ReconstitutedTradeGroupParams {
    /// Group identifier.
    pub group_id: GroupId,
    /// Instrument.
    pub symbol: Symbol,
    /// Direction.
    pub side: PositionSide,
    /// Lifecycle state.
    pub state: GroupState,
    /// Entry client id.
    pub entry_client_id: ClientOrderId,
    /// Take-profit client id.
    pub tp_client_id: ClientOrderId,
    /// Stop-loss client id.
    pub sl_client_id: ClientOrderId,
    /// Entry broker id.
    pub entry_broker_id: Option<BrokerId>,
    /// Take-profit broker id.
    pub tp_broker_id: Option<BrokerId>,
    /// Stop-loss broker id.
    pub sl_broker_id: Option<BrokerId>,
    /// Quantity (filled quantity once armed).
    pub quantity: Decimal,
    /// Entry reference price.
    pub entry_price: Decimal,
    /// Take-profit price.
    pub take_profit_price: Decimal,
    /// Stop-loss price.
    pub stop_loss_price: Decimal,
    /// Entry average fill price.
    pub filled_avg_price: Option<Decimal>,
    /// Consecutive arm failures.
    pub arm_failures: u32,
    /// Reason recorded with the last terminal transition.
    pub note: Option<String>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Version timestamp.
    pub updated_at: Timestamp,
}

/// Trade Group Aggregate Root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeGroup {
    group_id: GroupId,
    symbol: Symbol,
    side: PositionSide,
    state: GroupState,
    entry_client_id: ClientOrderId,
    tp_client_id: ClientOrderId,
    sl_client_id: ClientOrderId,
    entry_broker_id: Option<BrokerId>,
    tp_broker_id: Option<BrokerId>,
    sl_broker_id: Option<BrokerId>,
    quantity: Decimal,
    entry_price: Decimal,
    take_profit_price: Decimal,
    stop_loss_price: Decimal,
    filled_avg_price: Option<Decimal>,
    arm_failures: u32,
    note: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TradeGroup {
    /// Open a new group in `ENTRY_PENDING`.
    ///
    /// Client ids for all three legs are derived here from `client_id_prefix`
    /// and the group id, so they are stable across restarts.
    ///
    /// # Errors
    ///
    /// Returns error if command validation fails.
    pub fn open(
        cmd: OpenTradeGroupCommand,
        client_id_prefix: &str,
        now: Timestamp,
    ) -> Result<Self, TradeGroupError> {
        cmd.validate()?;

        let leg_id =
            |leg: LegKind| ClientOrderId::for_leg(client_id_prefix, &cmd.group_id, leg.suffix());

        Ok(Self {
            entry_client_id: leg_id(LegKind::Entry),
            tp_client_id: leg_id(LegKind::TakeProfit),
            sl_client_id: leg_id(LegKind::StopLoss),
            group_id: cmd.group_id,
            symbol: cmd.symbol,
            side: cmd.side,
            state: GroupState::EntryPending,
            entry_broker_id: None,
            tp_broker_id: None,
            sl_broker_id: None,
            quantity: cmd.quantity,
            entry_price: cmd.entry_price,
            take_profit_price: cmd.take_profit_price,
            stop_loss_price: cmd.stop_loss_price,
            filled_avg_price: None,
            arm_failures: 0,
            note: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstitute a group from persisted state.
    #[must_use]
    pub fn reconstitute(params: ReconstitutedTradeGroupParams) -> Self {
        Self {
            group_id: params.group_id,
            symbol: params.symbol,
            side: params.side,
            state: params.state,
            entry_client_id: params.entry_client_id,
            tp_client_id: params.tp_client_id,
            sl_client_id: params.sl_client_id,
            entry_broker_id: params.entry_broker_id,
            tp_broker_id: params.tp_broker_id,
            sl_broker_id: params.sl_broker_id,
            quantity: params.quantity,
            entry_price: params.entry_price,
            take_profit_price: params.take_profit_price,
            stop_loss_price: params.stop_loss_price,
            filled_avg_price: params.filled_avg_price,
            arm_failures: params.arm_failures,
            note: params.note,
            created_at: params.created_at,
            updated_at: params.updated_at,
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Group id.
    #[must_use]
    pub const fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Instrument.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Direction.
    #[must_use]
    pub const fn side(&self) -> PositionSide {
        self.side
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> GroupState {
        self.state
    }

    /// Client id of a leg.
    #[must_use]
    pub const fn client_id(&self, leg: LegKind) -> &ClientOrderId {
        match leg {
            LegKind::Entry => &self.entry_client_id,
            LegKind::TakeProfit => &self.tp_client_id,
            LegKind::StopLoss => &self.sl_client_id,
        }
    }

    /// Broker id of a leg, once acknowledged.
    #[must_use]
    pub const fn broker_id(&self, leg: LegKind) -> Option<&BrokerId> {
        match leg {
            LegKind::Entry => self.entry_broker_id.as_ref(),
            LegKind::TakeProfit => self.tp_broker_id.as_ref(),
            LegKind::StopLoss => self.sl_broker_id.as_ref(),
        }
    }

    /// Quantity: the requested size, or the filled size once armed.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Entry reference price.
    #[must_use]
    pub const fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Take-profit price.
    #[must_use]
    pub const fn take_profit_price(&self) -> Decimal {
        self.take_profit_price
    }

    /// Stop-loss price.
    #[must_use]
    pub const fn stop_loss_price(&self) -> Decimal {
        self.stop_loss_price
    }

    /// Entry average fill price, known once armed.
    #[must_use]
    pub const fn filled_avg_price(&self) -> Option<Decimal> {
        self.filled_avg_price
    }

    /// Consecutive arm failures.
    #[must_use]
    pub const fn arm_failures(&self) -> u32 {
        self.arm_failures
    }

    /// Reason recorded with the last terminal transition.
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Version timestamp used for optimistic concurrency.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns true while the group still needs reconciliation.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Price the position was (or will be) opened at.
    #[must_use]
    pub fn effective_entry_price(&self) -> Decimal {
        self.filled_avg_price.unwrap_or(self.entry_price)
    }

    /// Amount lost if the stop is hit.
    #[must_use]
    pub fn open_risk(&self) -> Decimal {
        (self.effective_entry_price() - self.stop_loss_price).abs() * self.quantity
    }

    /// Notional value of the position.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.effective_entry_price() * self.quantity
    }

    /// Age of the group at `now`.
    #[must_use]
    pub fn age(&self, now: Timestamp) -> chrono::Duration {
        now.duration_since(self.created_at)
    }

    /// Version the next write must carry: `now`, or just after the current
    /// version if the clock has not moved past it.
    #[must_use]
    pub fn next_updated_at(&self, now: Timestamp) -> Timestamp {
        if now > self.updated_at {
            now
        } else {
            self.updated_at.next_tick()
        }
    }

    /// Stamp the version a store has just persisted.
    ///
    /// Only store adapters call this.
    pub fn mark_persisted(&mut self, updated_at: Timestamp) {
        self.updated_at = updated_at;
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Record the broker's acknowledgment of the entry order.
    ///
    /// # Errors
    ///
    /// Returns error unless the group is `ENTRY_PENDING`.
    pub fn record_entry_ack(&mut self, broker_id: BrokerId) -> Result<(), TradeGroupError> {
        self.require_state(GroupState::EntryPending, "record entry ack")?;
        self.entry_broker_id = Some(broker_id);
        Ok(())
    }

    /// Record the broker id of an exit leg placed while arming.
    ///
    /// # Errors
    ///
    /// Returns error unless the group is `ENTRY_PENDING`, or if `leg` is the entry.
    pub fn record_exit_ack(
        &mut self,
        leg: LegKind,
        broker_id: BrokerId,
    ) -> Result<(), TradeGroupError> {
        self.require_state(GroupState::EntryPending, "record exit ack")?;
        match leg {
            LegKind::TakeProfit => self.tp_broker_id = Some(broker_id),
            LegKind::StopLoss => self.sl_broker_id = Some(broker_id),
            LegKind::Entry => {
                return Err(invalid("leg", "entry is not an exit leg"));
            }
        }
        Ok(())
    }

    /// Count a failed attempt to place the exit legs.
    ///
    /// Returns the new consecutive failure count.
    ///
    /// # Errors
    ///
    /// Returns error unless the group is `ENTRY_PENDING`.
    pub fn record_arm_failure(&mut self, reason: &str) -> Result<u32, TradeGroupError> {
        self.require_state(GroupState::EntryPending, "record arm failure")?;
        self.arm_failures += 1;
        self.note = Some(reason.to_string());
        Ok(self.arm_failures)
    }

    /// Move to `ARMED` after the entry filled and both exits are live.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is invalid, either exit leg has not
    /// been acknowledged, or `filled_qty` is not positive.
    pub fn arm(
        &mut self,
        filled_qty: Decimal,
        filled_avg_price: Option<Decimal>,
    ) -> Result<(), TradeGroupError> {
        self.validate_transition(GroupState::Armed)?;

        if filled_qty <= Decimal::ZERO {
            return Err(invalid("filled_qty", "must be positive"));
        }
        if self.tp_broker_id.is_none() || self.sl_broker_id.is_none() {
            return Err(TradeGroupError::InvalidTransition {
                group_id: self.group_id.to_string(),
                from: self.state,
                to: GroupState::Armed.to_string(),
                reason: "both exit legs must be acknowledged before arming".to_string(),
            });
        }

        self.state = GroupState::Armed;
        self.quantity = filled_qty;
        self.filled_avg_price = filled_avg_price;
        self.arm_failures = 0;
        self.note = None;
        Ok(())
    }

    /// Close an armed group through the exit that filled.
    ///
    /// # Errors
    ///
    /// Returns error unless the group is `ARMED`.
    pub fn close(&mut self, outcome: ExitOutcome) -> Result<(), TradeGroupError> {
        let to = outcome.closed_state();
        self.validate_transition(to)?;
        self.state = to;
        self.note = Some(format!("{} filled", outcome.winner()));
        Ok(())
    }

    /// Close an armed group whose position went flat outside the engine.
    ///
    /// # Errors
    ///
    /// Returns error unless the group is `ARMED`.
    pub fn close_manually(&mut self, note: &str) -> Result<(), TradeGroupError> {
        self.validate_transition(GroupState::ClosedManual)?;
        self.state = GroupState::ClosedManual;
        self.note = Some(note.to_string());
        Ok(())
    }

    /// Give up on a pending entry.
    ///
    /// # Errors
    ///
    /// Returns error unless the group is `ENTRY_PENDING`.
    pub fn fail(&mut self, note: &str) -> Result<(), TradeGroupError> {
        self.validate_transition(GroupState::Failed)?;
        self.state = GroupState::Failed;
        self.note = Some(note.to_string());
        Ok(())
    }

    fn validate_transition(&self, to: GroupState) -> Result<(), TradeGroupError> {
        if GroupStateMachine::is_valid_transition(self.state, to) {
            Ok(())
        } else {
            Err(TradeGroupError::InvalidTransition {
                group_id: self.group_id.to_string(),
                from: self.state,
                to: to.to_string(),
                reason: GroupStateMachine::transition_error_reason(self.state, to),
            })
        }
    }

    fn require_state(&self, expected: GroupState, op: &str) -> Result<(), TradeGroupError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TradeGroupError::InvalidTransition {
                group_id: self.group_id.to_string(),
                from: self.state,
                to: op.to_string(),
                reason: format!("requires {expected}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn now() -> Timestamp {
        Timestamp::parse("2026-01-19T12:00:00Z").unwrap()
    }

    fn long_btc() -> OpenTradeGroupCommand {
        OpenTradeGroupCommand {
            group_id: GroupId::new("gid_abc"),
            symbol: Symbol::new("BTC/USD"),
            side: PositionSide::Long,
            quantity: dec!(0.01),
            entry_price: dec!(50000),
            take_profit_price: dec!(51000),
            stop_loss_price: dec!(49500),
        }
    }

    fn armed_group() -> TradeGroup {
        let mut group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        group
            .record_exit_ack(LegKind::TakeProfit, BrokerId::new("b-tp"))
            .unwrap();
        group
            .record_exit_ack(LegKind::StopLoss, BrokerId::new("b-sl"))
            .unwrap();
        group.arm(dec!(0.01), Some(dec!(50000))).unwrap();
        group
    }

    #[test]
    fn open_assigns_client_ids_for_all_legs() {
        let group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        assert_eq!(group.state(), GroupState::EntryPending);
        assert_eq!(group.client_id(LegKind::Entry).as_str(), "SCFD_abc_entry");
        assert_eq!(group.client_id(LegKind::TakeProfit).as_str(), "SCFD_abc_tp");
        assert_eq!(group.client_id(LegKind::StopLoss).as_str(), "SCFD_abc_sl");
        assert!(group.broker_id(LegKind::Entry).is_none());
    }

    #[test]
    fn open_rejects_stop_above_long_entry() {
        let mut cmd = long_btc();
        cmd.stop_loss_price = dec!(50500);
        let Err(TradeGroupError::InvalidParameters { field, .. }) =
            TradeGroup::open(cmd, "SCFD", now())
        else {
            panic!("expected invalid parameters");
        };
        assert_eq!(field, "stop_loss_price");
    }

    #[test]
    fn open_rejects_zero_quantity() {
        let mut cmd = long_btc();
        cmd.quantity = Decimal::ZERO;
        assert!(TradeGroup::open(cmd, "SCFD", now()).is_err());
    }

    #[test]
    fn arm_requires_both_exit_acks() {
        let mut group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        group
            .record_exit_ack(LegKind::TakeProfit, BrokerId::new("b-tp"))
            .unwrap();
        assert!(group.arm(dec!(0.01), None).is_err());
        assert_eq!(group.state(), GroupState::EntryPending);
    }

    #[test]
    fn arm_uses_filled_quantity() {
        let mut group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        group
            .record_exit_ack(LegKind::TakeProfit, BrokerId::new("b-tp"))
            .unwrap();
        group
            .record_exit_ack(LegKind::StopLoss, BrokerId::new("b-sl"))
            .unwrap();
        group.arm(dec!(0.008), Some(dec!(50010))).unwrap();
        assert_eq!(group.state(), GroupState::Armed);
        assert_eq!(group.quantity(), dec!(0.008));
        assert_eq!(group.effective_entry_price(), dec!(50010));
    }

    #[test]
    fn arm_failures_count_up() {
        let mut group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        assert_eq!(group.record_arm_failure("timeout").unwrap(), 1);
        assert_eq!(group.record_arm_failure("timeout").unwrap(), 2);
        assert_eq!(group.note(), Some("timeout"));
    }

    #[test]
    fn close_moves_to_outcome_state() {
        let mut group = armed_group();
        group.close(ExitOutcome::StopLoss).unwrap();
        assert_eq!(group.state(), GroupState::ClosedSl);
        assert!(!group.is_open());
    }

    #[test]
    fn terminal_group_rejects_every_mutation() {
        let mut group = armed_group();
        group.close(ExitOutcome::TakeProfit).unwrap();
        let before = group.clone();

        assert!(group.close(ExitOutcome::StopLoss).is_err());
        assert!(group.close_manually("flat").is_err());
        assert!(group.fail("late").is_err());
        assert!(group.record_entry_ack(BrokerId::new("x")).is_err());
        assert!(
            group
                .record_exit_ack(LegKind::StopLoss, BrokerId::new("y"))
                .is_err()
        );
        assert!(group.record_arm_failure("late").is_err());
        assert!(group.arm(dec!(1), None).is_err());
        assert_eq!(group, before);
    }

    #[test]
    fn pending_group_cannot_close() {
        let mut group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        assert!(group.close(ExitOutcome::TakeProfit).is_err());
    }

    #[test]
    fn open_risk_and_notional() {
        let group = armed_group();
        assert_eq!(group.open_risk(), dec!(5.00));
        assert_eq!(group.notional(), dec!(500.00));
    }

    #[test]
    fn next_updated_at_is_strictly_increasing() {
        let group = TradeGroup::open(long_btc(), "SCFD", now()).unwrap();
        assert!(group.next_updated_at(now()) > group.updated_at());

        let later = Timestamp::parse("2026-01-19T12:00:10Z").unwrap();
        assert_eq!(group.next_updated_at(later), later);
    }
}
