//! Application wiring.

mod container;

pub use container::{ConfiguredBroker, Container, ProductionContainer};
