//! Data Transfer Objects (DTOs)
//!
//! DTOs are used for use case inputs and outputs.

mod entry_dto;
mod reconcile_dto;

pub use entry_dto::EntryDecision;
pub use reconcile_dto::{
    BrokerSnapshot, GroupFailure, ReconcileReport, StrayLeg, TradeGroupTransition,
};
