//! In-memory trade group store and heartbeat log.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::health::{Heartbeat, HeartbeatError, HeartbeatRepository, NewHeartbeat};
use crate::domain::shared::{ClientOrderId, GroupId, Symbol, Timestamp};
use crate::domain::trade_group::{LegKind, TradeGroup, TradeGroupError, TradeGroupStore};

/// In-memory implementation of `TradeGroupStore`.
///
/// Enforces the same uniqueness and version rules as the SQLite store.
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryTradeGroupStore {
    groups: RwLock<HashMap<GroupId, TradeGroup>>,
}

impl InMemoryTradeGroupStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Insert or overwrite a group without any checks (for test setup).
    pub fn put(&self, group: TradeGroup) {
        self.groups.write().insert(group.group_id().clone(), group);
    }
}

fn sorted_oldest_first(mut groups: Vec<TradeGroup>) -> Vec<TradeGroup> {
    groups.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.group_id().cmp(b.group_id()))
    });
    groups
}

#[async_trait]
impl TradeGroupStore for InMemoryTradeGroupStore {
    async fn create(&self, group: &TradeGroup) -> Result<(), TradeGroupError> {
        let mut groups = self.groups.write();

        if groups.contains_key(group.group_id()) {
            return Err(TradeGroupError::DuplicateGroup {
                group_id: group.group_id().to_string(),
                symbol: group.symbol().to_string(),
                reason: "group id already exists".to_string(),
            });
        }
        if group.is_open()
            && groups
                .values()
                .any(|g| g.is_open() && g.symbol().same_instrument(group.symbol()))
        {
            return Err(TradeGroupError::DuplicateGroup {
                group_id: group.group_id().to_string(),
                symbol: group.symbol().to_string(),
                reason: "symbol already has an open group".to_string(),
            });
        }

        groups.insert(group.group_id().clone(), group.clone());
        Ok(())
    }

    async fn update(
        &self,
        group: &TradeGroup,
        now: Timestamp,
    ) -> Result<TradeGroup, TradeGroupError> {
        let mut groups = self.groups.write();

        let stored = groups
            .get(group.group_id())
            .ok_or_else(|| TradeGroupError::NotFound {
                group_id: group.group_id().to_string(),
            })?;
        if stored.updated_at() != group.updated_at() {
            return Err(TradeGroupError::StoreConflict {
                group_id: group.group_id().to_string(),
            });
        }

        let mut persisted = group.clone();
        persisted.mark_persisted(group.next_updated_at(now));
        groups.insert(persisted.group_id().clone(), persisted.clone());
        Ok(persisted)
    }

    async fn find_by_id(&self, group_id: &GroupId) -> Result<Option<TradeGroup>, TradeGroupError> {
        Ok(self.groups.read().get(group_id).cloned())
    }

    async fn find_open(&self) -> Result<Vec<TradeGroup>, TradeGroupError> {
        let open = self
            .groups
            .read()
            .values()
            .filter(|g| g.is_open())
            .cloned()
            .collect();
        Ok(sorted_oldest_first(open))
    }

    async fn find_open_by_symbol(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<TradeGroup>, TradeGroupError> {
        Ok(self
            .groups
            .read()
            .values()
            .find(|g| g.is_open() && g.symbol().same_instrument(symbol))
            .cloned())
    }

    async fn find_by_client_id(
        &self,
        client_id: &ClientOrderId,
    ) -> Result<Option<TradeGroup>, TradeGroupError> {
        Ok(self
            .groups
            .read()
            .values()
            .find(|g| {
                [LegKind::Entry, LegKind::TakeProfit, LegKind::StopLoss]
                    .iter()
                    .any(|leg| g.client_id(*leg) == client_id)
            })
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<TradeGroup>, TradeGroupError> {
        let mut groups: Vec<TradeGroup> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        groups.truncate(limit);
        Ok(groups)
    }
}

/// In-memory heartbeat log.
#[derive(Debug, Default)]
pub struct InMemoryHeartbeatRepository {
    beats: RwLock<Vec<Heartbeat>>,
}

impl InMemoryHeartbeatRepository {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeartbeatRepository for InMemoryHeartbeatRepository {
    async fn record_heartbeat(&self, beat: NewHeartbeat) -> Result<i64, HeartbeatError> {
        let mut beats = self.beats.write();
        let id = i64::try_from(beats.len())
            .map_err(|e| HeartbeatError::storage(e.to_string()))?
            + 1;
        beats.push(Heartbeat::from_new(id, beat));
        Ok(id)
    }

    async fn get_recent_heartbeats(&self, limit: usize) -> Result<Vec<Heartbeat>, HeartbeatError> {
        Ok(self.beats.read().iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::trade_group::{OpenTradeGroupCommand, PositionSide};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::parse("2026-01-05T12:00:00Z").unwrap() + chrono::Duration::seconds(secs)
    }

    fn group(id: &str, symbol: &str, at: i64) -> TradeGroup {
        TradeGroup::open(
            OpenTradeGroupCommand {
                group_id: GroupId::new(id),
                symbol: Symbol::new(symbol),
                side: PositionSide::Long,
                quantity: dec!(0.01),
                entry_price: dec!(50000),
                take_profit_price: dec!(51000),
                stop_loss_price: dec!(49500),
            },
            "SCFD",
            ts(at),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_rejects_second_open_group_for_symbol() {
        let store = InMemoryTradeGroupStore::new();
        store.create(&group("gid_a", "BTC/USD", 0)).await.unwrap();

        let Err(TradeGroupError::DuplicateGroup { reason, .. }) =
            store.create(&group("gid_b", "BTC/USD", 1)).await
        else {
            panic!("expected DuplicateGroup");
        };
        assert!(reason.contains("open group"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn open_group_blocks_other_spelling_of_instrument() {
        let store = InMemoryTradeGroupStore::new();
        store.create(&group("gid_a", "BTC/USD", 0)).await.unwrap();

        assert!(matches!(
            store.create(&group("gid_b", "BTCUSD", 1)).await,
            Err(TradeGroupError::DuplicateGroup { .. })
        ));
        let found = store
            .find_open_by_symbol(&Symbol::new("BTCUSD"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.group_id().as_str(), "gid_a");
    }

    #[tokio::test]
    async fn create_allows_symbol_after_previous_group_closed() {
        let store = InMemoryTradeGroupStore::new();
        let mut first = group("gid_a", "BTC/USD", 0);
        store.create(&first).await.unwrap();
        first.fail("entry rejected").unwrap();
        store.update(&first, ts(5)).await.unwrap();

        store.create(&group("gid_b", "BTC/USD", 10)).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = InMemoryTradeGroupStore::new();
        let original = group("gid_a", "ETH/USD", 0);
        store.create(&original).await.unwrap();

        let updated = store.update(&original, ts(1)).await.unwrap();
        assert!(updated.updated_at() > original.updated_at());

        let Err(TradeGroupError::StoreConflict { group_id }) =
            store.update(&original, ts(2)).await
        else {
            panic!("expected StoreConflict");
        };
        assert_eq!(group_id, "gid_a");
    }

    #[tokio::test]
    async fn update_bumps_version_when_clock_stalls() {
        let store = InMemoryTradeGroupStore::new();
        let original = group("gid_a", "ETH/USD", 10);
        store.create(&original).await.unwrap();

        let updated = store.update(&original, ts(0)).await.unwrap();
        assert!(updated.updated_at() > original.updated_at());
    }

    #[tokio::test]
    async fn find_open_is_oldest_first() {
        let store = InMemoryTradeGroupStore::new();
        store.create(&group("gid_late", "ETH/USD", 20)).await.unwrap();
        store.create(&group("gid_early", "BTC/USD", 0)).await.unwrap();

        let open = store.find_open().await.unwrap();
        let ids: Vec<&str> = open.iter().map(|g| g.group_id().as_str()).collect();
        assert_eq!(ids, vec!["gid_early", "gid_late"]);
    }

    #[tokio::test]
    async fn find_by_client_id_matches_any_leg() {
        let store = InMemoryTradeGroupStore::new();
        let g = group("gid_a", "BTC/USD", 0);
        store.create(&g).await.unwrap();

        let found = store
            .find_by_client_id(g.client_id(LegKind::StopLoss))
            .await
            .unwrap();
        assert_eq!(found.unwrap().group_id().as_str(), "gid_a");
        assert!(
            store
                .find_by_client_id(&ClientOrderId::new("other"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn heartbeats_come_back_newest_first() {
        let repo = InMemoryHeartbeatRepository::new();
        repo.record_heartbeat(NewHeartbeat::ok(ts(0), 12)).await.unwrap();
        let second = repo
            .record_heartbeat(NewHeartbeat::ok(ts(30), 15))
            .await
            .unwrap();

        let recent = repo.get_recent_heartbeats(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second);
    }
}
