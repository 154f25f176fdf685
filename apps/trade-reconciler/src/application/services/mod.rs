//! Application Services
//!
//! Application services coordinate domain logic and infrastructure adapters.
//! They differ from use cases in that they typically run as background tasks
//! or provide long-running functionality.

mod polling_driver;

pub use polling_driver::{
    ConnectivityBackoff, CycleOutcome, CycleSummary, PollingConfig, PollingDriver,
};
