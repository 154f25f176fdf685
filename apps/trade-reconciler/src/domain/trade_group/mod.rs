//! Trade Group Bounded Context
//!
//! A trade group is one logical trade: a parent entry order plus the
//! client-managed take-profit and stop-loss legs that protect it. The venue
//! offers no native bracket or OCO orders, so the group carries the linkage.
//!
//! # Lifecycle
//!
//! ```text
//! ENTRY_PENDING ──entry filled──▶ ARMED ──TP filled──▶ CLOSED_TP
//!       │                          ├────SL filled──▶ CLOSED_SL
//!       │                          └──position flat─▶ CLOSED_MANUAL
//!       └──rejected / timed out / arm failures──▶ FAILED
//! ```

pub mod aggregate;
pub mod errors;
pub mod repository;
pub mod services;
pub mod value_objects;

pub use aggregate::{OpenTradeGroupCommand, ReconstitutedTradeGroupParams, TradeGroup};
pub use errors::TradeGroupError;
pub use repository::TradeGroupStore;
pub use services::{ExitOutcome, GroupStateMachine, LegFill, resolve_exit};
pub use value_objects::{GroupState, LegKind, OrderSide, PositionSide};
