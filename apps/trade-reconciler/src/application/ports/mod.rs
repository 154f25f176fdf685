//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driver Ports** (Primary/Inbound): How the world uses our application
//! - **Driven Ports** (Secondary/Outbound): How our application uses external systems

mod alert_port;
mod broker_port;
mod clock_port;
mod signal_source_port;

pub use alert_port::{Alert, AlertError, AlertPort, AlertSeverity, LogAlertSink};
#[cfg(test)]
pub use alert_port::MockAlertPort;
pub use broker_port::{
    AccountSnapshot, BrokerError, BrokerOrder, BrokerOrderStatus, BrokerPort, BrokerPosition,
    CancelOrderRequest, OrderAck, OrderType, SubmitOrderRequest, TimeInForce,
};
pub use clock_port::{Clock, ManualClock, SystemClock};
pub use signal_source_port::{
    EntrySignal, NoOpSignalSource, ReceivedSignal, SignalDisposition, SignalSourceError,
    SignalSourcePort,
};
