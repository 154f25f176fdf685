//! Dependency Injection Container
//!
//! Manages creation and wiring of all application components.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{
    AccountSnapshot, AlertPort, BrokerError, BrokerOrder, BrokerPort, BrokerPosition,
    CancelOrderRequest, Clock, LogAlertSink, NoOpSignalSource, OrderAck, SignalSourcePort,
    SubmitOrderRequest, SystemClock,
};
use crate::application::services::PollingDriver;
use crate::application::use_cases::{CheckHealthUseCase, ProposeEntryUseCase, ReconcileUseCase};
use crate::config::{BrokerKind, Config, require_credentials};
use crate::domain::health::HeartbeatRepository;
use crate::domain::risk_management::RiskGate;
use crate::domain::shared::ClientOrderId;
use crate::domain::trade_group::TradeGroupStore;
use crate::error::ReconcilerError;
use crate::infrastructure::alerts::WebhookAlertSink;
use crate::infrastructure::broker::{AlpacaBrokerAdapter, ManualBroker};
use crate::infrastructure::persistence::SqliteStore;
use crate::infrastructure::signals::JsonInboxSignalSource;

/// The broker selected by configuration.
#[derive(Debug)]
pub enum ConfiguredBroker {
    /// Alpaca trading API.
    Alpaca(AlpacaBrokerAdapter),
    /// Operator tickets.
    Manual(ManualBroker),
}

#[async_trait]
impl BrokerPort for ConfiguredBroker {
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        match self {
            Self::Alpaca(b) => b.submit_order(request).await,
            Self::Manual(b) => b.submit_order(request).await,
        }
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<(), BrokerError> {
        match self {
            Self::Alpaca(b) => b.cancel_order(request).await,
            Self::Manual(b) => b.cancel_order(request).await,
        }
    }

    async fn get_order(&self, client_order_id: &ClientOrderId) -> Result<BrokerOrder, BrokerError> {
        match self {
            Self::Alpaca(b) => b.get_order(client_order_id).await,
            Self::Manual(b) => b.get_order(client_order_id).await,
        }
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        match self {
            Self::Alpaca(b) => b.get_positions().await,
            Self::Manual(b) => b.get_positions().await,
        }
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        match self {
            Self::Alpaca(b) => b.get_account().await,
            Self::Manual(b) => b.get_account().await,
        }
    }
}

/// Dependency injection container.
///
/// Holds all wired dependencies for the application. Use
/// [`Container::from_config`] for the production wiring or
/// [`Container::new`] with test doubles.
pub struct Container<B, S, H>
where
    B: BrokerPort + 'static,
    S: TradeGroupStore + 'static,
    H: HeartbeatRepository + 'static,
{
    // Ports
    broker: Arc<B>,
    store: Arc<S>,
    heartbeats: Arc<H>,
    alerts: Arc<dyn AlertPort>,
    signals: Arc<dyn SignalSourcePort>,
    clock: Arc<dyn Clock>,
    config: Config,
}

/// Container wired from configuration.
pub type ProductionContainer = Container<ConfiguredBroker, SqliteStore, SqliteStore>;

impl ProductionContainer {
    /// Wire the production adapters.
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing, the broker client cannot be
    /// built, or the database cannot be opened.
    pub fn from_config(config: Config) -> Result<Self, ReconcilerError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let broker = match config.broker.kind {
            BrokerKind::Alpaca => {
                require_credentials(&config)?;
                let adapter = AlpacaBrokerAdapter::new(config.alpaca_config()?)
                    .map_err(BrokerError::from)?;
                tracing::info!(
                    environment = %config.broker.alpaca.environment,
                    live = adapter.is_live(),
                    "Using Alpaca broker"
                );
                ConfiguredBroker::Alpaca(adapter)
            }
            BrokerKind::Manual => {
                tracing::info!(
                    tickets_dir = %config.broker.manual.tickets_dir,
                    "Using manual ticket broker"
                );
                ConfiguredBroker::Manual(ManualBroker::new(
                    &config.broker.manual.tickets_dir,
                    config.broker.manual.equity,
                    Arc::clone(&clock),
                ))
            }
        };

        let store = Arc::new(SqliteStore::open(&config.persistence.db_path)?);

        let signals: Arc<dyn SignalSourcePort> = match config.signal_inbox() {
            Some(inbox) => {
                tracing::info!(inbox = %inbox.display(), "Reading entry signals from inbox");
                Arc::new(JsonInboxSignalSource::new(inbox))
            }
            None => Arc::new(NoOpSignalSource),
        };

        let alerts: Arc<dyn AlertPort> = match config.alert_webhook() {
            Some(url) => {
                let sink = WebhookAlertSink::new(
                    url,
                    Duration::from_secs(config.alerts.webhook_timeout_secs),
                )?;
                tracing::info!("Delivering operator alerts to webhook");
                Arc::new(sink)
            }
            None => Arc::new(LogAlertSink),
        };

        Ok(Self::new(
            Arc::new(broker),
            Arc::clone(&store),
            store,
            alerts,
            signals,
            clock,
            config,
        ))
    }

    /// Health check over the configured database, without a broker.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn health_check(config: &Config) -> Result<CheckHealthUseCase<SqliteStore>, ReconcilerError> {
        let store = Arc::new(SqliteStore::open(&config.persistence.db_path)?);
        Ok(CheckHealthUseCase::new(
            store,
            Arc::new(SystemClock),
            config.heartbeat_max_age(),
        ))
    }
}

impl<B, S, H> Container<B, S, H>
where
    B: BrokerPort + 'static,
    S: TradeGroupStore + 'static,
    H: HeartbeatRepository + 'static,
{
    /// Create a new container with all dependencies.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<B>,
        store: Arc<S>,
        heartbeats: Arc<H>,
        alerts: Arc<dyn AlertPort>,
        signals: Arc<dyn SignalSourcePort>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            broker,
            store,
            heartbeats,
            alerts,
            signals,
            clock,
            config,
        }
    }

    /// Get the broker port.
    pub fn broker(&self) -> Arc<B> {
        Arc::clone(&self.broker)
    }

    /// Get the trade group store.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Get the heartbeat repository.
    pub fn heartbeats(&self) -> Arc<H> {
        Arc::clone(&self.heartbeats)
    }

    /// Get the operator alert sink.
    pub fn alerts(&self) -> Arc<dyn AlertPort> {
        Arc::clone(&self.alerts)
    }

    /// Loaded configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Create a `ReconcileUseCase`.
    pub fn reconcile_use_case(&self) -> ReconcileUseCase<B, S> {
        ReconcileUseCase::new(
            Arc::clone(&self.broker),
            Arc::clone(&self.store),
            Arc::clone(&self.alerts),
            Arc::clone(&self.clock),
            self.config.reconcile_config(),
        )
    }

    /// Create a `ProposeEntryUseCase`.
    pub fn propose_entry_use_case(&self) -> ProposeEntryUseCase<B, S> {
        ProposeEntryUseCase::new(
            Arc::clone(&self.broker),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            RiskGate::new(self.config.risk_policy()),
            self.config.engine.client_id_prefix.clone(),
        )
    }

    /// Create a `CheckHealthUseCase`.
    pub fn check_health_use_case(&self) -> CheckHealthUseCase<H> {
        CheckHealthUseCase::new(
            Arc::clone(&self.heartbeats),
            Arc::clone(&self.clock),
            self.config.heartbeat_max_age(),
        )
    }

    /// Create the polling driver.
    pub fn polling_driver(&self) -> PollingDriver<B, S, H> {
        PollingDriver::new(
            Arc::clone(&self.broker),
            Arc::clone(&self.heartbeats),
            Arc::clone(&self.signals),
            Arc::clone(&self.clock),
            self.reconcile_use_case(),
            self.propose_entry_use_case(),
            self.config.polling_config(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_string;

    fn manual_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.broker.kind = BrokerKind::Manual;
        config.broker.manual.tickets_dir = dir.join("tickets").display().to_string();
        config.persistence.db_path = dir.join("app.db").display().to_string();
        config
    }

    #[tokio::test]
    async fn manual_broker_wiring_needs_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let container = ProductionContainer::from_config(manual_config(dir.path())).unwrap();

        assert!(matches!(*container.broker(), ConfiguredBroker::Manual(_)));
        let account = container.broker().get_account().await.unwrap();
        assert_eq!(account.equity, container.config().broker.manual.equity);
        assert!(container.store().find_open().await.unwrap().is_empty());
    }

    #[test]
    fn alpaca_wiring_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = manual_config(dir.path());
        config.broker.kind = BrokerKind::Alpaca;

        let Err(err) = ProductionContainer::from_config(config) else {
            panic!("expected missing credentials");
        };
        assert!(err.message().contains("APCA_API_KEY_ID"));
    }

    #[tokio::test]
    async fn configured_webhook_receives_alerts() {
        use crate::application::ports::{Alert, AlertSeverity};
        use crate::domain::shared::{GroupId, Symbol};
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({ "severity": "CRITICAL" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = manual_config(dir.path());
        config.alerts.webhook_url = format!("{}/hook", server.uri());
        let container = ProductionContainer::from_config(config).unwrap();

        let alert = Alert::for_group(
            AlertSeverity::Critical,
            &GroupId::new("gid_1"),
            &Symbol::new("BTC/USD"),
            "Position unprotected",
            "exit legs could not be armed",
        );
        container.alerts().send(alert).await.unwrap();
    }

    #[tokio::test]
    async fn health_check_on_fresh_database_reports_no_heartbeats() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = load_config_from_string("{}").unwrap();
        config.persistence.db_path = dir.path().join("app.db").display().to_string();

        let status = ProductionContainer::health_check(&config)
            .unwrap()
            .execute()
            .await;
        assert!(!status.healthy);
        assert_eq!(status.reason.as_str(), "no_heartbeats");
    }
}
