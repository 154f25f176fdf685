//! Alpaca adapter tests against a mock HTTP server.
//!
//! Covers the wire mapping of each `BrokerPort` call and one full
//! BTC/USD trade group: entry fill, exit legs armed, stop-loss fill.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use rust_decimal_macros::dec;
use serde_json::{Value, json};
use trade_reconciler::application::ports::{
    BrokerError, BrokerOrderStatus, BrokerPort, CancelOrderRequest, Clock, LogAlertSink,
    ManualClock, SubmitOrderRequest,
};
use trade_reconciler::application::use_cases::{ReconcileConfig, ReconcileUseCase};
use trade_reconciler::domain::shared::{BrokerId, ClientOrderId, GroupId, Symbol, Timestamp};
use trade_reconciler::domain::trade_group::{
    GroupState, LegKind, OpenTradeGroupCommand, OrderSide, PositionSide, TradeGroup,
    TradeGroupStore,
};
use trade_reconciler::infrastructure::broker::alpaca::{
    AlpacaBrokerAdapter, AlpacaConfig, AlpacaEnvironment, RetryConfig,
};
use trade_reconciler::infrastructure::persistence::InMemoryTradeGroupStore;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BY_CLIENT_ID: &str = "/v2/orders:by_client_order_id";

fn adapter(server: &MockServer) -> AlpacaBrokerAdapter {
    let config = AlpacaConfig::new(
        "test-key".to_string(),
        "test-secret".to_string(),
        AlpacaEnvironment::Paper,
    )
    .with_base_url(server.uri())
    .with_retry(RetryConfig::none());
    AlpacaBrokerAdapter::new(config).unwrap()
}

fn order_json(
    id: &str,
    client_order_id: &str,
    status: &str,
    filled: Option<(&str, &str, &str)>,
) -> Value {
    let (filled_qty, filled_avg_price, filled_at) = match filled {
        Some((qty, price, at)) => (json!(qty), json!(price), json!(at)),
        None => (json!("0"), Value::Null, Value::Null),
    };
    json!({
        "id": id,
        "client_order_id": client_order_id,
        "symbol": "BTC/USD",
        "status": status,
        "filled_qty": filled_qty,
        "filled_avg_price": filled_avg_price,
        "filled_at": filled_at,
    })
}

async fn mount_order(server: &MockServer, body: Value) {
    let client_order_id = body["client_order_id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path(BY_CLIENT_ID))
        .and(query_param("client_order_id", client_order_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, client_order_id: &str) {
    Mock::given(method("GET"))
        .and(path(BY_CLIENT_ID))
        .and(query_param("client_order_id", client_order_id))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"code": 40410000, "message": "order not found"})),
        )
        .mount(server)
        .await;
}

async fn mount_positions(server: &MockServer, positions: Value) {
    Mock::given(method("GET"))
        .and(path("/v2/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(positions))
        .mount(server)
        .await;
}

// ============================================================================
// Wire mapping
// ============================================================================

#[tokio::test]
async fn submit_sends_client_id_and_string_prices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(header("APCA-API-KEY-ID", "test-key"))
        .and(body_partial_json(json!({
            "client_order_id": "SCFD_abc_tp",
            "symbol": "BTC/USD",
            "side": "sell",
            "type": "limit",
            "qty": "0.01",
            "limit_price": "51000",
            "time_in_force": "gtc",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(order_json("ord-tp", "SCFD_abc_tp", "accepted", None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = adapter(&server)
        .submit_order(SubmitOrderRequest::limit(
            ClientOrderId::new("SCFD_abc_tp"),
            Symbol::new("BTC/USD"),
            OrderSide::Sell,
            dec!(0.0100),
            dec!(51000.00),
        ))
        .await
        .unwrap();

    assert_eq!(ack.broker_order_id, BrokerId::new("ord-tp"));
    assert_eq!(ack.client_order_id.as_str(), "SCFD_abc_tp");
    assert_eq!(ack.status, BrokerOrderStatus::New);
}

#[tokio::test]
async fn duplicate_client_id_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 40010001,
            "message": "client_order_id must be unique"
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .submit_order(SubmitOrderRequest::limit(
            ClientOrderId::new("SCFD_abc_tp"),
            Symbol::new("BTC/USD"),
            OrderSide::Sell,
            dec!(0.01),
            dec!(51000),
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BrokerError::DuplicateClientOrderId { ref client_order_id } if client_order_id == "SCFD_abc_tp"
    ));
}

#[tokio::test]
async fn get_order_parses_fill_details() {
    let server = MockServer::start().await;
    mount_order(
        &server,
        order_json(
            "ord-1",
            "SCFD_abc_entry",
            "filled",
            Some(("0.01", "50000", "2025-01-15T10:00:05Z")),
        ),
    )
    .await;

    let order = adapter(&server)
        .get_order(&ClientOrderId::new("SCFD_abc_entry"))
        .await
        .unwrap();

    assert_eq!(order.status, BrokerOrderStatus::Filled);
    assert_eq!(order.filled_qty, dec!(0.01));
    assert_eq!(order.filled_avg_price, Some(dec!(50000)));
    assert_eq!(
        order.filled_at,
        Some(Timestamp::parse("2025-01-15T10:00:05Z").unwrap())
    );
}

#[tokio::test]
async fn unknown_client_id_is_not_found() {
    let server = MockServer::start().await;
    mount_missing(&server, "SCFD_abc_sl").await;

    let err = adapter(&server)
        .get_order(&ClientOrderId::new("SCFD_abc_sl"))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::OrderNotFound { ref order_id } if order_id == "SCFD_abc_sl"));
}

#[tokio::test]
async fn cancel_by_client_id_looks_up_broker_id_first() {
    let server = MockServer::start().await;
    mount_order(&server, order_json("ord-sl", "SCFD_abc_sl", "new", None)).await;
    Mock::given(method("DELETE"))
        .and(path("/v2/orders/ord-sl"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server)
        .cancel_order(CancelOrderRequest::for_leg(
            None,
            &ClientOrderId::new("SCFD_abc_sl"),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancelling_a_filled_order_is_settled() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/orders/ord-tp"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 42210000,
            "message": "order is not cancelable"
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .cancel_order(CancelOrderRequest::for_leg(
            Some(&BrokerId::new("ord-tp")),
            &ClientOrderId::new("SCFD_abc_tp"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::AlreadyTerminal { .. }));
    assert!(err.cancel_is_settled());
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter(&server).get_account().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn account_and_short_positions_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "equity": "10250.50",
            "last_equity": "10000",
            "buying_power": "20501"
        })))
        .mount(&server)
        .await;
    mount_positions(
        &server,
        json!([
            {"symbol": "BTCUSD", "qty": "0.01", "side": "long"},
            {"symbol": "ETHUSD", "qty": "2", "side": "short"}
        ]),
    )
    .await;

    let broker = adapter(&server);
    let account = broker.get_account().await.unwrap();
    assert_eq!(account.equity, dec!(10250.50));
    assert_eq!(account.last_equity, Some(dec!(10000)));

    let positions = broker.get_positions().await.unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].quantity, dec!(0.01));
    assert_eq!(positions[1].quantity, dec!(-2));
}

// ============================================================================
// BTC/USD trade group over the wire
// ============================================================================

#[tokio::test]
async fn btc_group_arms_then_closes_on_stop_loss() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::new(
        Timestamp::parse("2025-01-15T10:00:00Z").unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(InMemoryTradeGroupStore::new());

    let group = TradeGroup::open(
        OpenTradeGroupCommand {
            group_id: GroupId::new("gid_btc"),
            symbol: Symbol::new("BTC/USD"),
            side: PositionSide::Long,
            quantity: dec!(0.01),
            entry_price: dec!(50000),
            take_profit_price: dec!(51000),
            stop_loss_price: dec!(49500),
        },
        "SCFD",
        dyn_clock.now(),
    )
    .unwrap();
    store.create(&group).await.unwrap();

    let entry_id = group.client_id(LegKind::Entry).as_str().to_string();
    let tp_id = group.client_id(LegKind::TakeProfit).as_str().to_string();
    let sl_id = group.client_id(LegKind::StopLoss).as_str().to_string();

    let reconcile = ReconcileUseCase::new(
        Arc::new(adapter(&server)),
        Arc::clone(&store),
        Arc::new(LogAlertSink),
        Arc::clone(&dyn_clock),
        ReconcileConfig::default(),
    );

    // Cycle 1: entry filled, exits not yet placed
    let filled_entry = order_json(
        "ord-entry",
        &entry_id,
        "filled",
        Some(("0.01", "50000", "2025-01-15T10:00:05Z")),
    );
    mount_positions(&server, json!([{"symbol": "BTCUSD", "qty": "0.01", "side": "long"}])).await;
    mount_order(&server, filled_entry.clone()).await;
    mount_missing(&server, &tp_id).await;
    mount_missing(&server, &sl_id).await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(body_partial_json(json!({
            "client_order_id": tp_id,
            "type": "limit",
            "side": "sell",
            "limit_price": "51000",
            "qty": "0.01"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_json("ord-tp", &tp_id, "new", None)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(body_partial_json(json!({
            "client_order_id": sl_id,
            "type": "stop",
            "side": "sell",
            "stop_price": "49500",
            "qty": "0.01"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_json("ord-sl", &sl_id, "new", None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = reconcile.fetch_snapshot().await.unwrap();
    let report = reconcile.reconcile(&snapshot).await.unwrap();
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].to, GroupState::Armed);
    server.verify().await;

    let armed = store.find_by_id(group.group_id()).await.unwrap().unwrap();
    assert_eq!(armed.broker_id(LegKind::TakeProfit), Some(&BrokerId::new("ord-tp")));
    assert_eq!(armed.broker_id(LegKind::StopLoss), Some(&BrokerId::new("ord-sl")));

    // Cycle 2: stop-loss filled at 49500, position flat
    server.reset().await;
    clock.advance(chrono::Duration::seconds(30));
    mount_positions(&server, json!([])).await;
    mount_order(&server, filled_entry).await;
    mount_order(&server, order_json("ord-tp", &tp_id, "new", None)).await;
    mount_order(
        &server,
        order_json(
            "ord-sl",
            &sl_id,
            "filled",
            Some(("0.01", "49500", "2025-01-15T10:20:00Z")),
        ),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/orders/ord-tp"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = reconcile.fetch_snapshot().await.unwrap();
    let report = reconcile.reconcile(&snapshot).await.unwrap();
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].from, GroupState::Armed);
    assert_eq!(report.transitions[0].to, GroupState::ClosedSl);
    server.verify().await;

    // Cycle 3: the closed group is never touched again
    server.reset().await;
    clock.advance(chrono::Duration::seconds(30));
    mount_positions(&server, json!([])).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let snapshot = reconcile.fetch_snapshot().await.unwrap();
    let report = reconcile.reconcile(&snapshot).await.unwrap();
    assert!(report.is_quiet());
    assert_eq!(
        store.find_by_id(group.group_id()).await.unwrap().unwrap().state(),
        GroupState::ClosedSl
    );
}
