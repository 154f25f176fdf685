//! Trade Group Store Trait
//!
//! Durable record of every trade group. Implemented by adapters in the
//! infrastructure layer. Groups are never deleted.

use async_trait::async_trait;

use super::aggregate::TradeGroup;
use super::errors::TradeGroupError;
use crate::domain::shared::{ClientOrderId, GroupId, Symbol, Timestamp};

/// Persistence port for trade groups.
#[async_trait]
pub trait TradeGroupStore: Send + Sync {
    /// Insert a new group.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateGroup` if the group id exists or the symbol already
    /// has an open group.
    async fn create(&self, group: &TradeGroup) -> Result<(), TradeGroupError>;

    /// Replace a group, guarded by its `updated_at` version.
    ///
    /// Returns the persisted group with its new, strictly greater version.
    ///
    /// # Errors
    ///
    /// Returns `StoreConflict` if the stored version differs from
    /// `group.updated_at()`, or `NotFound` if the group does not exist.
    async fn update(
        &self,
        group: &TradeGroup,
        now: Timestamp,
    ) -> Result<TradeGroup, TradeGroupError>;

    /// Find a group by id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_id(&self, group_id: &GroupId) -> Result<Option<TradeGroup>, TradeGroupError>;

    /// All groups in `ENTRY_PENDING` or `ARMED`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_open(&self) -> Result<Vec<TradeGroup>, TradeGroupError>;

    /// The open group for a symbol, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_open_by_symbol(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<TradeGroup>, TradeGroupError>;

    /// The group owning a client order id on any of its legs.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_client_id(
        &self,
        client_id: &ClientOrderId,
    ) -> Result<Option<TradeGroup>, TradeGroupError>;

    /// Most recently updated groups, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn list_recent(&self, limit: usize) -> Result<Vec<TradeGroup>, TradeGroupError>;
}
