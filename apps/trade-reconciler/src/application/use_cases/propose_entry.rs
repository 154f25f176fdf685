//! Propose Entry Use Case
//!
//! Turns an entry signal into a trade group: gate it through the risk checks,
//! record the group, then submit the entry order under its stable client id.

use std::sync::Arc;

use crate::application::dto::EntryDecision;
use crate::application::ports::{BrokerError, BrokerPort, Clock, SubmitOrderRequest};
use crate::domain::risk_management::{EntryCandidate, RiskContext, RiskDecision, RiskGate};
use crate::domain::shared::{GroupId, Symbol};
use crate::domain::trade_group::{
    LegKind, OpenTradeGroupCommand, PositionSide, TradeGroup, TradeGroupError, TradeGroupStore,
};
use crate::error::ReconcilerError;

/// Use case for opening new trade groups.
pub struct ProposeEntryUseCase<B, S>
where
    B: BrokerPort,
    S: TradeGroupStore,
{
    broker: Arc<B>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    gate: RiskGate,
    client_id_prefix: String,
}

impl<B, S> ProposeEntryUseCase<B, S>
where
    B: BrokerPort,
    S: TradeGroupStore,
{
    /// Create a new ProposeEntryUseCase.
    pub fn new(
        broker: Arc<B>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        gate: RiskGate,
        client_id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            store,
            clock,
            gate,
            client_id_prefix: client_id_prefix.into(),
        }
    }

    /// Propose a new entry.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails. Risk and broker refusals are
    /// reported as `EntryDecision::Rejected`.
    pub async fn propose_entry(
        &self,
        symbol: Symbol,
        side: PositionSide,
        candidate: EntryCandidate,
    ) -> Result<EntryDecision, ReconcilerError> {
        // 1. Account state for sizing and the drawdown halt
        let account = match self.broker.get_account().await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Account unavailable, entry refused");
                return Ok(EntryDecision::rejected("account_unavailable", e.to_string()));
            }
        };

        // 2. Risk gate against the currently open groups
        let open = self.store.find_open().await?;
        let context = RiskContext::new(account.equity, account.last_equity, &open);
        let (quantity, risk_amount) =
            match self.gate.evaluate(&symbol, side, &context, &candidate) {
                RiskDecision::Approved {
                    quantity,
                    risk_amount,
                } => (quantity, risk_amount),
                RiskDecision::Rejected { reason } => {
                    tracing::info!(
                        symbol = %symbol,
                        side = %side,
                        reason = reason.code(),
                        "Entry rejected by risk gate: {reason}"
                    );
                    return Ok(EntryDecision::rejected(reason.code(), reason.to_string()));
                }
            };

        // 3. Record the group before anything reaches the broker
        let command = OpenTradeGroupCommand {
            group_id: GroupId::generate(),
            symbol: symbol.clone(),
            side,
            quantity,
            entry_price: candidate.limit_price.unwrap_or(candidate.entry_price),
            take_profit_price: candidate.take_profit_price,
            stop_loss_price: candidate.stop_price,
        };
        let mut group = match TradeGroup::open(command, &self.client_id_prefix, self.clock.now()) {
            Ok(group) => group,
            Err(e) => return Ok(EntryDecision::rejected("invalid_candidate", e.to_string())),
        };
        match self.store.create(&group).await {
            Ok(()) => {}
            Err(e @ TradeGroupError::DuplicateGroup { .. }) => {
                tracing::error!(symbol = %symbol, error = %e, "Trade group not created");
                return Ok(EntryDecision::rejected("duplicate_group", e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            group_id = %group.group_id(),
            symbol = %symbol,
            side = %side,
            quantity = %quantity,
            risk_amount = %risk_amount,
            "Trade group opened"
        );

        // 4. Submit the entry; a retried submission adopts the order the
        //    broker already holds under this client id
        let request = entry_request(&group, &candidate);
        match self.broker.submit_order_idempotent(request).await {
            Ok(ack) => {
                group.record_entry_ack(ack.broker_order_id)?;
                self.store.update(&group, self.clock.now()).await?;
                Ok(EntryDecision::Accepted {
                    group_id: group.group_id().clone(),
                })
            }
            // A duplicate whose lookup came back empty is just as unknown
            Err(e) if e.is_transient() || matches!(e, BrokerError::OrderNotFound { .. }) => {
                tracing::warn!(
                    group_id = %group.group_id(),
                    error = %e,
                    "Entry submission outcome unknown, leaving group pending"
                );
                Ok(EntryDecision::Accepted {
                    group_id: group.group_id().clone(),
                })
            }
            Err(e) => self.refuse(group, &e).await,
        }
    }

    async fn refuse(
        &self,
        mut group: TradeGroup,
        error: &BrokerError,
    ) -> Result<EntryDecision, ReconcilerError> {
        ReconcilerError::from(error.clone())
            .with_context("group_id", group.group_id().as_str())
            .log("Entry order refused by broker");
        group.fail(&format!("entry refused: {error}"))?;
        self.store.update(&group, self.clock.now()).await?;
        Ok(EntryDecision::rejected("broker_rejected", error.to_string()))
    }
}

fn entry_request(group: &TradeGroup, candidate: &EntryCandidate) -> SubmitOrderRequest {
    let client_id = group.client_id(LegKind::Entry).clone();
    let side = group.side().entry_side();
    match candidate.limit_price {
        Some(limit) => {
            SubmitOrderRequest::limit(client_id, group.symbol().clone(), side, group.quantity(), limit)
        }
        None => SubmitOrderRequest::market(client_id, group.symbol().clone(), side, group.quantity()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::{
        AccountSnapshot, BrokerOrder, BrokerOrderStatus, BrokerPosition, CancelOrderRequest,
        ManualClock, OrderAck, OrderType,
    };
    use crate::domain::risk_management::{Bar, RiskPolicy};
    use crate::domain::shared::{BrokerId, ClientOrderId, Timestamp};
    use crate::domain::trade_group::{GroupState, OrderSide};
    use crate::infrastructure::persistence::InMemoryTradeGroupStore;

    struct MockBroker {
        account: Result<AccountSnapshot, BrokerError>,
        submit_result: Option<BrokerError>,
        submitted: RwLock<Vec<SubmitOrderRequest>>,
    }

    impl MockBroker {
        fn new() -> Self {
            Self {
                account: Ok(AccountSnapshot {
                    equity: dec!(100000),
                    last_equity: Some(dec!(100000)),
                    buying_power: dec!(100000),
                }),
                submit_result: None,
                submitted: RwLock::new(Vec::new()),
            }
        }

        fn failing_submit(error: BrokerError) -> Self {
            Self {
                submit_result: Some(error),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl BrokerPort for MockBroker {
        async fn submit_order(
            &self,
            request: SubmitOrderRequest,
        ) -> Result<OrderAck, BrokerError> {
            self.submitted.write().unwrap().push(request.clone());
            if let Some(err) = &self.submit_result {
                return Err(err.clone());
            }
            Ok(OrderAck {
                broker_order_id: BrokerId::new("broker-entry-1"),
                client_order_id: request.client_order_id,
                status: BrokerOrderStatus::New,
            })
        }

        async fn cancel_order(&self, _request: CancelOrderRequest) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn get_order(&self, client_order_id: &ClientOrderId) -> Result<BrokerOrder, BrokerError> {
            let submitted = self.submitted.read().unwrap();
            if !submitted.iter().any(|r| r.client_order_id == *client_order_id) {
                return Err(BrokerError::OrderNotFound {
                    order_id: client_order_id.to_string(),
                });
            }
            // The earlier attempt reached the venue before the retry failed.
            Ok(BrokerOrder {
                client_order_id: client_order_id.clone(),
                broker_order_id: BrokerId::new("broker-entry-first-attempt"),
                status: BrokerOrderStatus::New,
                filled_qty: rust_decimal::Decimal::ZERO,
                filled_avg_price: None,
                filled_at: None,
            })
        }

        async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
            Ok(vec![])
        }

        async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
            self.account.clone()
        }
    }

    fn calm_bars() -> Vec<Bar> {
        (0..16)
            .map(|_| Bar::new(dec!(50000), dec!(50100), dec!(49900), dec!(50000)))
            .collect()
    }

    fn candidate() -> EntryCandidate {
        EntryCandidate {
            entry_price: dec!(50000),
            stop_price: dec!(48000),
            take_profit_price: dec!(52000),
            limit_price: None,
            bars: calm_bars(),
        }
    }

    fn use_case(
        broker: MockBroker,
    ) -> (
        ProposeEntryUseCase<MockBroker, InMemoryTradeGroupStore>,
        Arc<MockBroker>,
        Arc<InMemoryTradeGroupStore>,
    ) {
        let broker = Arc::new(broker);
        let store = Arc::new(InMemoryTradeGroupStore::new());
        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-01-05T12:00:00Z").unwrap(),
        ));
        let uc = ProposeEntryUseCase::new(
            Arc::clone(&broker),
            Arc::clone(&store),
            clock,
            RiskGate::new(RiskPolicy::default()),
            "SCFD",
        );
        (uc, broker, store)
    }

    #[tokio::test]
    async fn approved_entry_creates_group_and_submits_market_order() {
        let (uc, broker, store) = use_case(MockBroker::new());

        let decision = uc
            .propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        let EntryDecision::Accepted { group_id } = decision else {
            panic!("expected Accepted, got {decision:?}");
        };
        let group = store.find_by_id(&group_id).await.unwrap().unwrap();
        assert_eq!(group.state(), GroupState::EntryPending);
        assert_eq!(
            group.broker_id(LegKind::Entry).map(BrokerId::as_str),
            Some("broker-entry-1")
        );

        let submitted = broker.submitted.read().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].order_type, OrderType::Market);
        assert_eq!(submitted[0].side, OrderSide::Buy);
        assert_eq!(submitted[0].client_order_id, *group.client_id(LegKind::Entry));
        // 1% of 100k risked over a 2000 stop distance.
        assert_eq!(submitted[0].quantity, dec!(0.5));
        assert!(submitted[0].client_order_id.as_str().starts_with("SCFD_"));
    }

    #[tokio::test]
    async fn limit_price_produces_limit_entry() {
        let (uc, broker, _store) = use_case(MockBroker::new());
        let mut candidate = candidate();
        candidate.limit_price = Some(dec!(49990));

        uc.propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate)
            .await
            .unwrap();

        let submitted = broker.submitted.read().unwrap();
        assert_eq!(submitted[0].order_type, OrderType::Limit);
        assert_eq!(submitted[0].limit_price, Some(dec!(49990)));
    }

    #[tokio::test]
    async fn second_entry_for_symbol_is_rejected() {
        let (uc, broker, store) = use_case(MockBroker::new());
        uc.propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        let decision = uc
            .propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert_eq!(decision.rejection_reason(), Some("open_group_exists"));
        assert_eq!(store.len(), 1);
        assert_eq!(broker.submitted.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pair_spelled_without_separator_is_same_instrument() {
        let (uc, broker, store) = use_case(MockBroker::new());
        uc.propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        let decision = uc
            .propose_entry(Symbol::new("BTCUSD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert_eq!(decision.rejection_reason(), Some("open_group_exists"));
        assert_eq!(store.find_open().await.unwrap().len(), 1);
        assert_eq!(broker.submitted.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_account_rejects_without_group() {
        let mut broker = MockBroker::new();
        broker.account = Err(BrokerError::ConnectionError {
            message: "timeout".to_string(),
        });
        let (uc, _broker, store) = use_case(broker);

        let decision = uc
            .propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert_eq!(decision.rejection_reason(), Some("account_unavailable"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn drawdown_halt_rejects_entry() {
        let mut broker = MockBroker::new();
        broker.account = Ok(AccountSnapshot {
            equity: dec!(94000),
            last_equity: Some(dec!(100000)),
            buying_power: dec!(94000),
        });
        let (uc, broker, _store) = use_case(broker);

        let decision = uc
            .propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert_eq!(decision.rejection_reason(), Some("trading_halted"));
        assert!(broker.submitted.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broker_rejection_fails_group() {
        let (uc, _broker, store) = use_case(MockBroker::failing_submit(
            BrokerError::InsufficientFunds,
        ));

        let decision = uc
            .propose_entry(Symbol::new("ETH/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert_eq!(decision.rejection_reason(), Some("broker_rejected"));
        let groups = store.list_recent(10).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].state(), GroupState::Failed);
        assert!(store.find_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_client_id_on_entry_adopts_existing_order() {
        let (uc, broker, store) = use_case(MockBroker::failing_submit(
            BrokerError::DuplicateClientOrderId {
                client_order_id: "retried".to_string(),
            },
        ));

        let decision = uc
            .propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert!(decision.is_accepted(), "{decision:?}");
        let open = store.find_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].state(), GroupState::EntryPending);
        assert_eq!(
            open[0].broker_id(LegKind::Entry).map(BrokerId::as_str),
            Some("broker-entry-first-attempt")
        );
        assert_eq!(broker.submitted.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_submit_failure_leaves_group_pending() {
        let (uc, _broker, store) = use_case(MockBroker::failing_submit(
            BrokerError::ServerError {
                message: "502".to_string(),
            },
        ));

        let decision = uc
            .propose_entry(Symbol::new("ETH/USD"), PositionSide::Long, candidate())
            .await
            .unwrap();

        assert!(decision.is_accepted());
        let open = store.find_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].state(), GroupState::EntryPending);
        assert!(open[0].broker_id(LegKind::Entry).is_none());
    }

    #[tokio::test]
    async fn volatile_history_trips_circuit_breaker() {
        let (uc, _broker, store) = use_case(MockBroker::new());
        let mut candidate = candidate();
        candidate.bars.pop();
        candidate.bars.push(Bar::new(dec!(50000), dec!(52000), dec!(48000), dec!(50000)));

        let decision = uc
            .propose_entry(Symbol::new("BTC/USD"), PositionSide::Long, candidate)
            .await
            .unwrap();

        assert_eq!(decision.rejection_reason(), Some("circuit_breaker_tripped"));
        assert!(store.is_empty());
    }
}
