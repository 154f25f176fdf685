//! Manual broker: orders become JSON tickets for an operator to execute.
//!
//! Each order is written to `<tickets_dir>/<client_order_id>.json`. The
//! operator works the order at the venue and edits the ticket's `status`,
//! `filled_qty`, `filled_avg_price` and `filled_at` to report the outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    AccountSnapshot, BrokerError, BrokerOrder, BrokerOrderStatus, BrokerPort, BrokerPosition,
    CancelOrderRequest, Clock, OrderAck, OrderType, SubmitOrderRequest, TimeInForce,
};
use crate::domain::shared::{BrokerId, ClientOrderId, Symbol, Timestamp};
use crate::domain::trade_group::OrderSide;

/// A ticket as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTicket {
    /// Client order id, also the file name.
    pub client_order_id: ClientOrderId,
    /// Synthetic broker id.
    pub broker_order_id: BrokerId,
    /// Instrument.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Requested quantity.
    pub qty: Decimal,
    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Status, edited by the operator.
    pub status: BrokerOrderStatus,
    /// Filled quantity, edited by the operator.
    #[serde(default)]
    pub filled_qty: Decimal,
    /// Average fill price, edited by the operator.
    #[serde(default)]
    pub filled_avg_price: Option<Decimal>,
    /// Fill time, edited by the operator.
    #[serde(default)]
    pub filled_at: Option<Timestamp>,
    /// When the ticket was written.
    pub created_at: Timestamp,
}

impl ManualTicket {
    fn to_broker_order(&self) -> BrokerOrder {
        BrokerOrder {
            client_order_id: self.client_order_id.clone(),
            broker_order_id: self.broker_order_id.clone(),
            status: self.status,
            filled_qty: self.filled_qty,
            filled_avg_price: self.filled_avg_price,
            filled_at: self.filled_at,
        }
    }
}

/// `BrokerPort` that writes tickets instead of trading.
pub struct ManualBroker {
    tickets_dir: PathBuf,
    equity: Decimal,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ManualBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualBroker")
            .field("tickets_dir", &self.tickets_dir)
            .field("equity", &self.equity)
            .finish_non_exhaustive()
    }
}

impl ManualBroker {
    /// Create a manual broker writing to `tickets_dir` and reporting a fixed
    /// notional `equity`.
    pub fn new(tickets_dir: impl Into<PathBuf>, equity: Decimal, clock: Arc<dyn Clock>) -> Self {
        Self {
            tickets_dir: tickets_dir.into(),
            equity,
            clock,
        }
    }

    /// Directory holding the tickets.
    #[must_use]
    pub fn tickets_dir(&self) -> &Path {
        &self.tickets_dir
    }

    fn ticket_path(&self, client_order_id: &ClientOrderId) -> Result<PathBuf, BrokerError> {
        let id = client_order_id.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(BrokerError::OrderRejected {
                reason: format!("client order id '{id}' is not usable as a ticket name"),
            });
        }
        Ok(self.tickets_dir.join(format!("{id}.json")))
    }

    async fn read_ticket(path: &Path) -> Result<Option<ManualTicket>, BrokerError> {
        let body = match tokio::fs::read_to_string(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, &e)),
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| BrokerError::Unknown {
                message: format!("ticket {} is unreadable: {e}", path.display()),
            })
    }

    async fn write_ticket(path: &Path, ticket: &ManualTicket) -> Result<(), BrokerError> {
        let body = serde_json::to_string_pretty(ticket).map_err(|e| BrokerError::Unknown {
            message: e.to_string(),
        })?;
        tokio::fs::write(path, body)
            .await
            .map_err(|e| io_error(path, &e))
    }

    async fn all_tickets(&self) -> Result<Vec<ManualTicket>, BrokerError> {
        let mut entries = match tokio::fs::read_dir(&self.tickets_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.tickets_dir, &e)),
        };

        let mut tickets = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.tickets_dir, &e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(ticket) = Self::read_ticket(&path).await?
            {
                tickets.push(ticket);
            }
        }
        Ok(tickets)
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> BrokerError {
    BrokerError::Unknown {
        message: format!("{}: {err}", path.display()),
    }
}

#[async_trait]
impl BrokerPort for ManualBroker {
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        let path = self.ticket_path(&request.client_order_id)?;

        if let Some(existing) = Self::read_ticket(&path).await? {
            tracing::debug!(
                client_order_id = %request.client_order_id,
                "Ticket already exists, returning it"
            );
            return Ok(existing.to_broker_order().to_ack());
        }

        tokio::fs::create_dir_all(&self.tickets_dir)
            .await
            .map_err(|e| io_error(&self.tickets_dir, &e))?;

        let ticket = ManualTicket {
            client_order_id: request.client_order_id.clone(),
            broker_order_id: BrokerId::new(format!("manual-{}", uuid::Uuid::new_v4())),
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            qty: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force,
            status: BrokerOrderStatus::New,
            filled_qty: Decimal::ZERO,
            filled_avg_price: None,
            filled_at: None,
            created_at: self.clock.now(),
        };
        Self::write_ticket(&path, &ticket).await?;

        tracing::warn!(
            alert = "manual_ticket",
            client_order_id = %ticket.client_order_id,
            symbol = %ticket.symbol,
            side = %ticket.side,
            qty = %ticket.qty,
            limit_price = ?ticket.limit_price,
            stop_price = ?ticket.stop_price,
            path = %path.display(),
            "Manual order ticket written, execute it at the venue"
        );

        Ok(ticket.to_broker_order().to_ack())
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<(), BrokerError> {
        let ticket = if let Some(client_id) = &request.client_order_id {
            Self::read_ticket(&self.ticket_path(client_id)?).await?
        } else {
            self.all_tickets()
                .await?
                .into_iter()
                .find(|t| Some(&t.broker_order_id) == request.broker_order_id.as_ref())
        };
        let Some(mut ticket) = ticket else {
            return Err(BrokerError::OrderNotFound {
                order_id: request.target(),
            });
        };

        if ticket.status.is_terminal() {
            return Err(BrokerError::AlreadyTerminal {
                order_id: ticket.client_order_id.to_string(),
            });
        }

        ticket.status = BrokerOrderStatus::Cancelled;
        Self::write_ticket(&self.ticket_path(&ticket.client_order_id)?, &ticket).await?;
        tracing::warn!(
            alert = "manual_ticket",
            client_order_id = %ticket.client_order_id,
            symbol = %ticket.symbol,
            "Manual order cancelled, withdraw it at the venue"
        );
        Ok(())
    }

    async fn get_order(&self, client_order_id: &ClientOrderId) -> Result<BrokerOrder, BrokerError> {
        Self::read_ticket(&self.ticket_path(client_order_id)?)
            .await?
            .map(|t| t.to_broker_order())
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: client_order_id.to_string(),
            })
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let mut net: BTreeMap<Symbol, Decimal> = BTreeMap::new();
        for ticket in self.all_tickets().await? {
            if ticket.filled_qty > Decimal::ZERO {
                *net.entry(ticket.symbol).or_default() += ticket.side.signed(ticket.filled_qty);
            }
        }
        Ok(net
            .into_iter()
            .filter(|(_, quantity)| !quantity.is_zero())
            .map(|(symbol, quantity)| BrokerPosition { symbol, quantity })
            .collect())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        Ok(AccountSnapshot {
            equity: self.equity,
            last_equity: Some(self.equity),
            buying_power: self.equity,
        })
    }
}
