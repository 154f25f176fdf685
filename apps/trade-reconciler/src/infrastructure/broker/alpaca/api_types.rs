//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format. Numbers arrive as
//! strings and are parsed into `Decimal` at the edge.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    AccountSnapshot, BrokerOrder, BrokerOrderStatus, BrokerPosition, OrderAck, OrderType,
    SubmitOrderRequest, TimeInForce,
};
use crate::domain::shared::{BrokerId, ClientOrderId, Symbol, Timestamp};

use super::error::AlpacaError;

// ============================================================================
// Order Request Types
// ============================================================================

/// Order request for Alpaca API.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Symbol, `BTC/USD` for crypto.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price (for limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Stop price (for stop orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    /// Client order ID.
    pub client_order_id: String,
}

impl From<&SubmitOrderRequest> for AlpacaOrderRequest {
    fn from(request: &SubmitOrderRequest) -> Self {
        let order_type = match request.order_type {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
        };
        let time_in_force = match request.time_in_force {
            TimeInForce::Gtc => "gtc",
            TimeInForce::Day => "day",
            TimeInForce::Ioc => "ioc",
        };

        Self {
            symbol: request.symbol.as_str().to_string(),
            qty: request.quantity.normalize().to_string(),
            side: request.side.as_str().to_string(),
            order_type: order_type.to_string(),
            time_in_force: time_in_force.to_string(),
            limit_price: request.limit_price.map(|p| p.normalize().to_string()),
            stop_price: request.stop_price.map(|p| p.normalize().to_string()),
            client_order_id: request.client_order_id.as_str().to_string(),
        }
    }
}

// ============================================================================
// Order Response Types
// ============================================================================

/// Order response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Client order ID.
    pub client_order_id: String,
    /// Symbol.
    pub symbol: String,
    /// Filled quantity.
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Order status.
    pub status: String,
    /// Filled timestamp.
    #[serde(default)]
    pub filled_at: Option<String>,
}

impl AlpacaOrderResponse {
    /// Convert to `OrderAck`.
    #[must_use]
    pub fn to_order_ack(&self) -> OrderAck {
        OrderAck {
            broker_order_id: BrokerId::new(&self.id),
            client_order_id: ClientOrderId::new(&self.client_order_id),
            status: parse_order_status(&self.status),
        }
    }

    /// Convert to the port's order view.
    pub fn to_broker_order(&self) -> Result<BrokerOrder, AlpacaError> {
        let filled_qty = match self.filled_qty.as_deref() {
            Some(qty) => parse_decimal("filled_qty", qty)?,
            None => Decimal::ZERO,
        };
        let filled_avg_price = self
            .filled_avg_price
            .as_deref()
            .map(|p| parse_decimal("filled_avg_price", p))
            .transpose()?;
        let filled_at = self
            .filled_at
            .as_deref()
            .map(|t| {
                Timestamp::parse(t)
                    .map_err(|e| AlpacaError::JsonParse(format!("filled_at '{t}': {e}")))
            })
            .transpose()?;

        Ok(BrokerOrder {
            client_order_id: ClientOrderId::new(&self.client_order_id),
            broker_order_id: BrokerId::new(&self.id),
            status: parse_order_status(&self.status),
            filled_qty,
            filled_avg_price,
            filled_at,
        })
    }
}

// ============================================================================
// Account Types
// ============================================================================

/// Account response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Account equity.
    pub equity: String,
    /// Equity at the previous close.
    #[serde(default)]
    pub last_equity: Option<String>,
    /// Buying power.
    pub buying_power: String,
}

impl AlpacaAccountResponse {
    /// Convert to the port's account view.
    pub fn to_snapshot(&self) -> Result<AccountSnapshot, AlpacaError> {
        Ok(AccountSnapshot {
            equity: parse_decimal("equity", &self.equity)?,
            last_equity: self
                .last_equity
                .as_deref()
                .map(|v| parse_decimal("last_equity", v))
                .transpose()?,
            buying_power: parse_decimal("buying_power", &self.buying_power)?,
        })
    }
}

// ============================================================================
// Position Types
// ============================================================================

/// Position response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol, `BTCUSD` for crypto.
    pub symbol: String,
    /// Absolute quantity.
    pub qty: String,
    /// Side (long/short).
    #[serde(default)]
    pub side: Option<String>,
}

impl AlpacaPositionResponse {
    /// Convert to a signed position.
    pub fn to_position(&self) -> Result<BrokerPosition, AlpacaError> {
        let qty = parse_decimal("qty", &self.qty)?;
        let quantity = match self.side.as_deref() {
            Some("short") => -qty.abs(),
            _ => qty,
        };
        Ok(BrokerPosition {
            symbol: Symbol::new(&self.symbol),
            quantity,
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Error code, numeric in practice.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message.
    pub message: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, AlpacaError> {
    value
        .parse()
        .map_err(|e| AlpacaError::JsonParse(format!("{field} '{value}': {e}")))
}

/// Parse Alpaca order status string to `BrokerOrderStatus`.
///
/// `pending_cancel` stays open: the order can still fill until the cancel lands.
fn parse_order_status(status: &str) -> BrokerOrderStatus {
    match status.to_lowercase().as_str() {
        "partially_filled" => BrokerOrderStatus::PartiallyFilled,
        "filled" => BrokerOrderStatus::Filled,
        "done_for_day" | "expired" => BrokerOrderStatus::Expired,
        "canceled" | "cancelled" => BrokerOrderStatus::Cancelled,
        "rejected" => BrokerOrderStatus::Rejected,
        // new, accepted, pending_new, pending_cancel, pending_replace,
        // replaced, held, stopped, suspended, calculated
        _ => BrokerOrderStatus::New,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::trade_group::OrderSide;

    #[test]
    fn parse_order_status_open_states() {
        for status in ["new", "accepted", "pending_new", "pending_cancel", "held"] {
            assert_eq!(parse_order_status(status), BrokerOrderStatus::New, "{status}");
        }
    }

    #[test]
    fn parse_order_status_terminal_states() {
        assert_eq!(parse_order_status("filled"), BrokerOrderStatus::Filled);
        assert_eq!(parse_order_status("canceled"), BrokerOrderStatus::Cancelled);
        assert_eq!(parse_order_status("rejected"), BrokerOrderStatus::Rejected);
        assert_eq!(parse_order_status("expired"), BrokerOrderStatus::Expired);
        assert_eq!(parse_order_status("done_for_day"), BrokerOrderStatus::Expired);
        assert_eq!(
            parse_order_status("partially_filled"),
            BrokerOrderStatus::PartiallyFilled
        );
    }

    #[test]
    fn stop_exit_request_serializes_for_crypto() {
        let request = SubmitOrderRequest::stop(
            ClientOrderId::new("SCFD_abc_sl"),
            Symbol::new("BTC/USD"),
            OrderSide::Sell,
            dec!(0.0100),
            dec!(49500.00),
        );

        let body = serde_json::to_value(AlpacaOrderRequest::from(&request)).unwrap();

        assert_eq!(body["symbol"], "BTC/USD");
        assert_eq!(body["qty"], "0.01");
        assert_eq!(body["side"], "sell");
        assert_eq!(body["type"], "stop");
        assert_eq!(body["time_in_force"], "gtc");
        assert_eq!(body["stop_price"], "49500");
        assert_eq!(body["client_order_id"], "SCFD_abc_sl");
        assert!(body.get("limit_price").is_none());
    }

    #[test]
    fn filled_order_converts_with_fill_details() {
        let response: AlpacaOrderResponse = serde_json::from_str(
            r#"{
                "id": "61e69015-8549-4bfd-b9c3-01e75843f47d",
                "client_order_id": "SCFD_abc_entry",
                "symbol": "BTC/USD",
                "qty": "0.01",
                "filled_qty": "0.01",
                "filled_avg_price": "50012.5",
                "status": "filled",
                "filled_at": "2026-01-05T12:00:03.123456Z"
            }"#,
        )
        .unwrap();

        let order = response.to_broker_order().unwrap();

        assert_eq!(order.status, BrokerOrderStatus::Filled);
        assert_eq!(order.filled_qty, dec!(0.01));
        assert_eq!(order.filled_avg_price, Some(dec!(50012.5)));
        assert!(order.filled_at.is_some());
        assert_eq!(order.client_order_id.as_str(), "SCFD_abc_entry");
    }

    #[test]
    fn unfilled_order_has_zero_fill() {
        let response: AlpacaOrderResponse = serde_json::from_str(
            r#"{"id": "x", "client_order_id": "c", "symbol": "ETH/USD",
                "filled_qty": "0", "filled_avg_price": null, "status": "new", "filled_at": null}"#,
        )
        .unwrap();

        let order = response.to_broker_order().unwrap();
        assert_eq!(order.filled_qty, Decimal::ZERO);
        assert!(order.filled_avg_price.is_none());
        assert!(order.filled_at.is_none());
    }

    #[test]
    fn short_position_is_negative() {
        let position = AlpacaPositionResponse {
            symbol: "ETHUSD".to_string(),
            qty: "2".to_string(),
            side: Some("short".to_string()),
        };
        assert_eq!(position.to_position().unwrap().quantity, dec!(-2));
    }

    #[test]
    fn account_parses_equity_fields() {
        let account: AlpacaAccountResponse = serde_json::from_str(
            r#"{"equity": "94000.12", "last_equity": "100000", "buying_power": "188000.24"}"#,
        )
        .unwrap();
        let snapshot = account.to_snapshot().unwrap();
        assert_eq!(snapshot.equity, dec!(94000.12));
        assert_eq!(snapshot.last_equity, Some(dec!(100000)));
    }

    #[test]
    fn bad_number_is_a_parse_error() {
        let account = AlpacaAccountResponse {
            equity: "n/a".to_string(),
            last_equity: None,
            buying_power: "0".to_string(),
        };
        assert!(matches!(
            account.to_snapshot(),
            Err(AlpacaError::JsonParse(_))
        ));
    }
}
