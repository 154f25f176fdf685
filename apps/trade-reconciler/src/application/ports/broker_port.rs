//! Broker Port (Driven Port)
//!
//! Interface for interacting with a brokerage. Orders are always looked up by
//! client order id; broker ids are only used to target cancels.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{BrokerId, ClientOrderId, Symbol, Timestamp};
use crate::domain::trade_group::OrderSide;

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Execute at the best available price.
    Market,
    /// Execute at the limit price or better.
    Limit,
    /// Becomes a market order once the stop price trades.
    Stop,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Good until cancelled.
    Gtc,
    /// Day order.
    Day,
    /// Immediate or cancel.
    Ioc,
}

/// Broker-reported order status.
///
/// Adapters map their raw status strings onto these variants; nothing above
/// the adapter layer sees broker strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerOrderStatus {
    /// Working, nothing filled.
    New,
    /// Working, some quantity filled.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Cancelled.
    Cancelled,
    /// Rejected by the broker.
    Rejected,
    /// Expired.
    Expired,
}

impl BrokerOrderStatus {
    /// Returns true if the order can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }

    /// Returns true if the order is still working.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the order ended without a complete fill.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected | Self::Expired)
    }
}

impl fmt::Display for BrokerOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Request to submit an order to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Client order id, the idempotency key.
    pub client_order_id: ClientOrderId,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity.
    pub quantity: Decimal,
    /// Limit price (for limit orders).
    pub limit_price: Option<Decimal>,
    /// Stop price (for stop orders).
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
}

impl SubmitOrderRequest {
    /// Create a market order request.
    #[must_use]
    pub const fn market(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
        }
    }

    /// Create a limit order request.
    #[must_use]
    pub const fn limit(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(limit_price),
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
        }
    }

    /// Create a stop order request.
    #[must_use]
    pub const fn stop(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            order_type: OrderType::Stop,
            quantity,
            limit_price: None,
            stop_price: Some(stop_price),
            time_in_force: TimeInForce::Gtc,
        }
    }

    /// Set time in force.
    #[must_use]
    pub const fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }
}

/// Request to cancel an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    /// Broker order ID (primary).
    pub broker_order_id: Option<BrokerId>,
    /// Client order ID (fallback).
    pub client_order_id: Option<ClientOrderId>,
}

impl CancelOrderRequest {
    /// Create a cancel request by broker ID.
    #[must_use]
    pub const fn by_broker_id(broker_order_id: BrokerId) -> Self {
        Self {
            broker_order_id: Some(broker_order_id),
            client_order_id: None,
        }
    }

    /// Create a cancel request by client ID.
    #[must_use]
    pub const fn by_client_id(client_order_id: ClientOrderId) -> Self {
        Self {
            broker_order_id: None,
            client_order_id: Some(client_order_id),
        }
    }

    /// Target by broker id when known, otherwise by client id.
    #[must_use]
    pub fn for_leg(broker_order_id: Option<&BrokerId>, client_order_id: &ClientOrderId) -> Self {
        Self {
            broker_order_id: broker_order_id.cloned(),
            client_order_id: Some(client_order_id.clone()),
        }
    }

    /// Human-readable target for logs and errors.
    #[must_use]
    pub fn target(&self) -> String {
        self.broker_order_id
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.client_order_id.as_ref().map(ToString::to_string))
            .unwrap_or_default()
    }
}

/// Acknowledgment from broker after order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order ID.
    pub broker_order_id: BrokerId,
    /// Client order ID echoed back.
    pub client_order_id: ClientOrderId,
    /// Current status.
    pub status: BrokerOrderStatus,
}

/// An order as reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerOrder {
    /// Client order id.
    pub client_order_id: ClientOrderId,
    /// Broker-assigned order id.
    pub broker_order_id: BrokerId,
    /// Current status.
    pub status: BrokerOrderStatus,
    /// Quantity filled so far.
    pub filled_qty: Decimal,
    /// Average fill price.
    pub filled_avg_price: Option<Decimal>,
    /// Time of the final fill.
    pub filled_at: Option<Timestamp>,
}

impl BrokerOrder {
    /// Ack view of this order.
    #[must_use]
    pub fn to_ack(&self) -> OrderAck {
        OrderAck {
            broker_order_id: self.broker_order_id.clone(),
            client_order_id: self.client_order_id.clone(),
            status: self.status,
        }
    }
}

/// A broker position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPosition {
    /// Instrument, as the broker reports it.
    pub symbol: Symbol,
    /// Signed quantity: positive long, negative short.
    pub quantity: Decimal,
}

impl BrokerPosition {
    /// Returns true if no quantity is held.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// Account state used for sizing and the drawdown halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Current equity.
    pub equity: Decimal,
    /// Equity at the previous close.
    pub last_equity: Option<Decimal>,
    /// Available buying power.
    pub buying_power: Decimal,
}

/// Broker port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Connection error or timeout.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// Broker-side failure (5xx).
    #[error("Broker server error: {message}")]
    ServerError {
        /// Error details.
        message: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },

    /// An order with this client id already exists.
    #[error("Duplicate client order id: {client_order_id}")]
    DuplicateClientOrderId {
        /// The reused client id.
        client_order_id: String,
    },

    /// Order already filled, cancelled, or expired.
    #[error("Order already terminal: {order_id}")]
    AlreadyTerminal {
        /// The order.
        order_id: String,
    },

    /// Insufficient funds.
    #[error("Insufficient buying power")]
    InsufficientFunds,

    /// Credentials refused.
    #[error("Broker authentication failed: {message}")]
    AuthenticationFailed {
        /// Error details.
        message: String,
    },

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. }
                | Self::RateLimited
                | Self::ServerError { .. }
                | Self::Unknown { .. }
        )
    }

    /// Whether a cancel that failed this way has nothing left to do.
    #[must_use]
    pub const fn cancel_is_settled(&self) -> bool {
        matches!(
            self,
            Self::OrderNotFound { .. } | Self::AlreadyTerminal { .. }
        )
    }

    /// HTTP status most closely matching the error, for heartbeats.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::RateLimited => Some(429),
            Self::OrderNotFound { .. } => Some(404),
            Self::OrderRejected { .. } | Self::DuplicateClientOrderId { .. } => Some(422),
            Self::AuthenticationFailed { .. } => Some(401),
            Self::ServerError { .. } => Some(500),
            Self::InsufficientFunds => Some(403),
            Self::ConnectionError { .. } | Self::AlreadyTerminal { .. } | Self::Unknown { .. } => {
                None
            }
        }
    }
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Submit an order, keyed by its client order id.
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError>;

    /// Cancel an order. "Not found" and "already terminal" are reported as
    /// errors and callers treat them as success.
    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<(), BrokerError>;

    /// Look up an order by client order id.
    async fn get_order(&self, client_order_id: &ClientOrderId) -> Result<BrokerOrder, BrokerError>;

    /// All open positions.
    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Account equity and buying power.
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Submit an order, adopting the existing one when the client id was
    /// already accepted by an earlier attempt.
    async fn submit_order_idempotent(
        &self,
        request: SubmitOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        let client_order_id = request.client_order_id.clone();
        match self.submit_order(request).await {
            Err(BrokerError::DuplicateClientOrderId { .. }) => self
                .get_order(&client_order_id)
                .await
                .map(|order| order.to_ack()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn submit_order_request_market() {
        let request = SubmitOrderRequest::market(
            ClientOrderId::new("SCFD_1_entry"),
            Symbol::new("BTC/USD"),
            OrderSide::Buy,
            dec!(0.01),
        );

        assert_eq!(request.order_type, OrderType::Market);
        assert!(request.limit_price.is_none());
        assert_eq!(request.time_in_force, TimeInForce::Gtc);
    }

    #[test]
    fn submit_order_request_stop() {
        let request = SubmitOrderRequest::stop(
            ClientOrderId::new("SCFD_1_sl"),
            Symbol::new("BTC/USD"),
            OrderSide::Sell,
            dec!(0.01),
            dec!(49500),
        )
        .with_time_in_force(TimeInForce::Day);

        assert_eq!(request.order_type, OrderType::Stop);
        assert_eq!(request.stop_price, Some(dec!(49500)));
        assert_eq!(request.time_in_force, TimeInForce::Day);
    }

    #[test]
    fn cancel_order_request_for_leg_prefers_broker_id() {
        let request = CancelOrderRequest::for_leg(
            Some(&BrokerId::new("b-1")),
            &ClientOrderId::new("SCFD_1_tp"),
        );
        assert_eq!(request.target(), "b-1");

        let request = CancelOrderRequest::by_client_id(ClientOrderId::new("SCFD_1_tp"));
        assert_eq!(request.target(), "SCFD_1_tp");
    }

    #[test]
    fn status_classification() {
        assert!(BrokerOrderStatus::PartiallyFilled.is_open());
        assert!(BrokerOrderStatus::Filled.is_terminal());
        assert!(!BrokerOrderStatus::Filled.is_dead());
        assert!(BrokerOrderStatus::Expired.is_dead());
    }

    #[test]
    fn transient_errors() {
        assert!(BrokerError::RateLimited.is_transient());
        assert!(
            BrokerError::ConnectionError {
                message: "timeout".to_string()
            }
            .is_transient()
        );
        assert!(
            !BrokerError::OrderRejected {
                reason: "qty".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn settled_cancel_errors() {
        assert!(
            BrokerError::OrderNotFound {
                order_id: "x".to_string()
            }
            .cancel_is_settled()
        );
        assert!(
            BrokerError::AlreadyTerminal {
                order_id: "x".to_string()
            }
            .cancel_is_settled()
        );
        assert!(!BrokerError::RateLimited.cancel_is_settled());
    }
}
