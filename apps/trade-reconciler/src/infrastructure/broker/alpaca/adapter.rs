//! Alpaca broker adapter implementing BrokerPort.

use async_trait::async_trait;

use crate::application::ports::{
    AccountSnapshot, BrokerError, BrokerOrder, BrokerPort, BrokerPosition, CancelOrderRequest,
    OrderAck, SubmitOrderRequest,
};
use crate::domain::shared::ClientOrderId;

use super::api_types::{
    AlpacaAccountResponse, AlpacaOrderRequest, AlpacaOrderResponse, AlpacaPositionResponse,
};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets broker adapter.
///
/// Implements `BrokerPort` for the Alpaca Markets trading API. Orders are
/// always looked up by client order id.
#[derive(Debug, Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
}

impl AlpacaBrokerAdapter {
    /// Create a new Alpaca broker adapter.
    pub fn new(config: AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(&config)?;
        Ok(Self {
            client,
            environment: config.environment,
        })
    }

    /// Check if we're in live trading mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }

    async fn order_by_client_id(
        &self,
        client_order_id: &ClientOrderId,
    ) -> Result<AlpacaOrderResponse, AlpacaError> {
        self.client
            .get(&format!(
                "/v2/orders:by_client_order_id?client_order_id={}",
                client_order_id.as_str()
            ))
            .await
            .map_err(|e| match e {
                AlpacaError::OrderNotFound { .. } => AlpacaError::OrderNotFound {
                    order_id: client_order_id.to_string(),
                },
                other => other,
            })
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        if self.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                symbol = %request.symbol,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        let alpaca_request = AlpacaOrderRequest::from(&request);

        tracing::info!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = %alpaca_request.side,
            order_type = %alpaca_request.order_type,
            qty = %alpaca_request.qty,
            limit_price = ?alpaca_request.limit_price,
            stop_price = ?alpaca_request.stop_price,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse = self
            .client
            .post("/v2/orders", &alpaca_request)
            .await
            .map_err(|e| match e {
                AlpacaError::DuplicateClientOrderId(_) => {
                    AlpacaError::DuplicateClientOrderId(request.client_order_id.to_string())
                }
                other => other,
            })?;

        tracing::info!(
            client_order_id = %request.client_order_id,
            broker_order_id = %response.id,
            status = %response.status,
            "Order submitted"
        );

        Ok(response.to_order_ack())
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<(), BrokerError> {
        // Prefer broker order ID; otherwise resolve the client id first
        let broker_id = match (&request.broker_order_id, &request.client_order_id) {
            (Some(broker_id), _) => broker_id.to_string(),
            (None, Some(client_id)) => self.order_by_client_id(client_id).await?.id,
            (None, None) => {
                return Err(BrokerError::Unknown {
                    message: "cancel request carries neither broker nor client order id"
                        .to_string(),
                });
            }
        };

        tracing::info!(broker_order_id = %broker_id, target = %request.target(), "Canceling order");
        self.client
            .delete(&format!("/v2/orders/{broker_id}"))
            .await
            .map_err(|e| match e {
                AlpacaError::NotCancelable(_) => AlpacaError::NotCancelable(broker_id.clone()),
                other => other,
            })
            .map_err(BrokerError::from)
    }

    async fn get_order(&self, client_order_id: &ClientOrderId) -> Result<BrokerOrder, BrokerError> {
        let response = self.order_by_client_id(client_order_id).await?;
        Ok(response.to_broker_order()?)
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let responses: Vec<AlpacaPositionResponse> = self.client.get("/v2/positions").await?;
        Ok(responses
            .iter()
            .map(AlpacaPositionResponse::to_position)
            .collect::<Result<_, _>>()?)
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let account: AlpacaAccountResponse = self.client.get("/v2/account").await?;
        Ok(account.to_snapshot()?)
    }
}
