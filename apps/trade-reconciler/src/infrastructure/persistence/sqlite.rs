//! SQLite trade group store and heartbeat log.
//!
//! Both tables live in one database file. The connection sits behind a
//! `parking_lot::Mutex` and every statement runs on the blocking pool.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

use crate::domain::health::{Heartbeat, HeartbeatError, HeartbeatRepository, NewHeartbeat};
use crate::domain::shared::{BrokerId, ClientOrderId, GroupId, Symbol, Timestamp};
use crate::domain::trade_group::{
    GroupState, LegKind, PositionSide, ReconstitutedTradeGroupParams, TradeGroup,
    TradeGroupError, TradeGroupStore,
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS trade_groups (
    group_id          TEXT PRIMARY KEY,
    symbol            TEXT NOT NULL,
    side              TEXT NOT NULL,
    state             TEXT NOT NULL,
    entry_client_id   TEXT NOT NULL UNIQUE,
    tp_client_id      TEXT NOT NULL UNIQUE,
    sl_client_id      TEXT NOT NULL UNIQUE,
    entry_broker_id   TEXT,
    tp_broker_id      TEXT,
    sl_broker_id      TEXT,
    quantity          TEXT NOT NULL,
    entry_price       TEXT NOT NULL,
    take_profit_price TEXT NOT NULL,
    stop_loss_price   TEXT NOT NULL,
    filled_avg_price  TEXT,
    arm_failures      INTEGER NOT NULL DEFAULT 0,
    note              TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

DROP INDEX IF EXISTS ux_trade_groups_open_symbol;

-- One open group per instrument: BTC/USD and BTCUSD collide
CREATE UNIQUE INDEX IF NOT EXISTS ux_trade_groups_open_instrument
    ON trade_groups(REPLACE(symbol, '/', '')) WHERE state IN ('ENTRY_PENDING', 'ARMED');

CREATE INDEX IF NOT EXISTS ix_trade_groups_updated_at
    ON trade_groups(updated_at);

CREATE TABLE IF NOT EXISTS heartbeats (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,
    ok          INTEGER NOT NULL,
    latency_ms  INTEGER,
    status_code INTEGER,
    error       TEXT,
    note        TEXT
);
";

const GROUP_COLUMNS: &str = "group_id, symbol, side, state, entry_client_id, tp_client_id, \
     sl_client_id, entry_broker_id, tp_broker_id, sl_broker_id, quantity, entry_price, \
     take_profit_price, stop_loss_price, filled_avg_price, arm_failures, note, created_at, \
     updated_at";

/// SQLite-backed `TradeGroupStore` and `HeartbeatRepository`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TradeGroupError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(TradeGroupError::storage)?;
        }
        let conn = Connection::open(path).map_err(TradeGroupError::storage)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(TradeGroupError::storage)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(TradeGroupError::storage)?;
        tracing::info!(path = %path.display(), "Opened SQLite store");
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, TradeGroupError> {
        let conn = Connection::open_in_memory().map_err(TradeGroupError::storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, TradeGroupError> {
        conn.execute_batch(SCHEMA)
            .map_err(TradeGroupError::storage)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, E, F>(&self, f: F, on_join_error: fn(String) -> E) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| on_join_error(e.to_string()))?
    }
}

// ============================================================================
// Trade groups
// ============================================================================

fn group_storage_error(message: String) -> TradeGroupError {
    TradeGroupError::Storage { message }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn opt_str<T: AsRef<str>>(value: Option<&T>) -> Option<&str> {
    value.map(AsRef::as_ref)
}

/// Row as stored, before domain parsing.
struct GroupRow {
    group_id: String,
    symbol: String,
    side: String,
    state: String,
    entry_client_id: String,
    tp_client_id: String,
    sl_client_id: String,
    entry_broker_id: Option<String>,
    tp_broker_id: Option<String>,
    sl_broker_id: Option<String>,
    quantity: String,
    entry_price: String,
    take_profit_price: String,
    stop_loss_price: String,
    filled_avg_price: Option<String>,
    arm_failures: i64,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

impl GroupRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            group_id: row.get(0)?,
            symbol: row.get(1)?,
            side: row.get(2)?,
            state: row.get(3)?,
            entry_client_id: row.get(4)?,
            tp_client_id: row.get(5)?,
            sl_client_id: row.get(6)?,
            entry_broker_id: row.get(7)?,
            tp_broker_id: row.get(8)?,
            sl_broker_id: row.get(9)?,
            quantity: row.get(10)?,
            entry_price: row.get(11)?,
            take_profit_price: row.get(12)?,
            stop_loss_price: row.get(13)?,
            filled_avg_price: row.get(14)?,
            arm_failures: row.get(15)?,
            note: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }

    fn into_group(self) -> Result<TradeGroup, TradeGroupError> {
        let decimal = |field: &str, value: &str| {
            Decimal::from_str(value).map_err(|e| {
                TradeGroupError::storage(format!("{}.{field} '{value}': {e}", self.group_id))
            })
        };
        let timestamp = |field: &str, value: &str| {
            Timestamp::parse(value).map_err(|e| {
                TradeGroupError::storage(format!("{}.{field} '{value}': {e}", self.group_id))
            })
        };

        Ok(TradeGroup::reconstitute(ReconstitutedTradeGroupParams {
            symbol: Symbol::new(&self.symbol),
            side: PositionSide::from_str(&self.side).map_err(TradeGroupError::storage)?,
            state: GroupState::from_str(&self.state).map_err(TradeGroupError::storage)?,
            entry_client_id: ClientOrderId::new(&self.entry_client_id),
            tp_client_id: ClientOrderId::new(&self.tp_client_id),
            sl_client_id: ClientOrderId::new(&self.sl_client_id),
            entry_broker_id: self.entry_broker_id.as_deref().map(BrokerId::new),
            tp_broker_id: self.tp_broker_id.as_deref().map(BrokerId::new),
            sl_broker_id: self.sl_broker_id.as_deref().map(BrokerId::new),
            quantity: decimal("quantity", &self.quantity)?,
            entry_price: decimal("entry_price", &self.entry_price)?,
            take_profit_price: decimal("take_profit_price", &self.take_profit_price)?,
            stop_loss_price: decimal("stop_loss_price", &self.stop_loss_price)?,
            filled_avg_price: self
                .filled_avg_price
                .as_deref()
                .map(|p| decimal("filled_avg_price", p))
                .transpose()?,
            arm_failures: u32::try_from(self.arm_failures).map_err(TradeGroupError::storage)?,
            note: self.note.clone(),
            created_at: timestamp("created_at", &self.created_at)?,
            updated_at: timestamp("updated_at", &self.updated_at)?,
            group_id: GroupId::new(&self.group_id),
        }))
    }
}

fn query_groups(
    conn: &Connection,
    clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<TradeGroup>, TradeGroupError> {
    let sql = format!("SELECT {GROUP_COLUMNS} FROM trade_groups {clause}");
    let mut stmt = conn.prepare(&sql).map_err(TradeGroupError::storage)?;
    let rows = stmt
        .query_map(params, GroupRow::from_row)
        .map_err(TradeGroupError::storage)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(TradeGroupError::storage)?;
    rows.into_iter().map(GroupRow::into_group).collect()
}

fn query_group(
    conn: &Connection,
    clause: &str,
    params: impl rusqlite::Params,
) -> Result<Option<TradeGroup>, TradeGroupError> {
    let sql = format!("SELECT {GROUP_COLUMNS} FROM trade_groups {clause} LIMIT 1");
    conn.query_row(&sql, params, GroupRow::from_row)
        .optional()
        .map_err(TradeGroupError::storage)?
        .map(GroupRow::into_group)
        .transpose()
}

fn group_exists(conn: &Connection, group_id: &str) -> Result<bool, TradeGroupError> {
    conn.query_row(
        "SELECT 1 FROM trade_groups WHERE group_id = ?1",
        params![group_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(TradeGroupError::storage)
}

#[async_trait]
impl TradeGroupStore for SqliteStore {
    async fn create(&self, group: &TradeGroup) -> Result<(), TradeGroupError> {
        let group = group.clone();
        self.blocking(
            move |conn| {
                let result = conn.execute(
                    &format!(
                        "INSERT INTO trade_groups ({GROUP_COLUMNS}) VALUES \
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                         ?17, ?18, ?19)"
                    ),
                    params![
                        group.group_id().as_str(),
                        group.symbol().as_str(),
                        group.side().as_str(),
                        group.state().as_str(),
                        group.client_id(LegKind::Entry).as_str(),
                        group.client_id(LegKind::TakeProfit).as_str(),
                        group.client_id(LegKind::StopLoss).as_str(),
                        opt_str(group.broker_id(LegKind::Entry)),
                        opt_str(group.broker_id(LegKind::TakeProfit)),
                        opt_str(group.broker_id(LegKind::StopLoss)),
                        group.quantity().to_string(),
                        group.entry_price().to_string(),
                        group.take_profit_price().to_string(),
                        group.stop_loss_price().to_string(),
                        group.filled_avg_price().map(|p| p.to_string()),
                        i64::from(group.arm_failures()),
                        group.note(),
                        group.created_at().to_storage_string(),
                        group.updated_at().to_storage_string(),
                    ],
                );

                match result {
                    Ok(_) => Ok(()),
                    Err(e) if is_constraint_violation(&e) => {
                        let reason = if group_exists(conn, group.group_id().as_str())? {
                            "group id already exists"
                        } else {
                            "symbol already has an open group"
                        };
                        Err(TradeGroupError::DuplicateGroup {
                            group_id: group.group_id().to_string(),
                            symbol: group.symbol().to_string(),
                            reason: reason.to_string(),
                        })
                    }
                    Err(e) => Err(TradeGroupError::storage(e)),
                }
            },
            group_storage_error,
        )
        .await
    }

    async fn update(
        &self,
        group: &TradeGroup,
        now: Timestamp,
    ) -> Result<TradeGroup, TradeGroupError> {
        let mut persisted = group.clone();
        let next_version = group.next_updated_at(now);
        persisted.mark_persisted(next_version);

        let group = group.clone();
        self.blocking(
            move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE trade_groups SET state = ?1, entry_broker_id = ?2, \
                         tp_broker_id = ?3, sl_broker_id = ?4, quantity = ?5, \
                         filled_avg_price = ?6, arm_failures = ?7, note = ?8, updated_at = ?9 \
                         WHERE group_id = ?10 AND updated_at = ?11",
                        params![
                            group.state().as_str(),
                            opt_str(group.broker_id(LegKind::Entry)),
                            opt_str(group.broker_id(LegKind::TakeProfit)),
                            opt_str(group.broker_id(LegKind::StopLoss)),
                            group.quantity().to_string(),
                            group.filled_avg_price().map(|p| p.to_string()),
                            i64::from(group.arm_failures()),
                            group.note(),
                            next_version.to_storage_string(),
                            group.group_id().as_str(),
                            group.updated_at().to_storage_string(),
                        ],
                    )
                    .map_err(TradeGroupError::storage)?;

                if changed == 0 {
                    return Err(if group_exists(conn, group.group_id().as_str())? {
                        TradeGroupError::StoreConflict {
                            group_id: group.group_id().to_string(),
                        }
                    } else {
                        TradeGroupError::NotFound {
                            group_id: group.group_id().to_string(),
                        }
                    });
                }
                Ok(persisted)
            },
            group_storage_error,
        )
        .await
    }

    async fn find_by_id(&self, group_id: &GroupId) -> Result<Option<TradeGroup>, TradeGroupError> {
        let group_id = group_id.to_string();
        self.blocking(
            move |conn| query_group(conn, "WHERE group_id = ?1", params![group_id]),
            group_storage_error,
        )
        .await
    }

    async fn find_open(&self) -> Result<Vec<TradeGroup>, TradeGroupError> {
        self.blocking(
            |conn| {
                query_groups(
                    conn,
                    "WHERE state IN ('ENTRY_PENDING', 'ARMED') ORDER BY created_at, group_id",
                    [],
                )
            },
            group_storage_error,
        )
        .await
    }

    async fn find_open_by_symbol(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<TradeGroup>, TradeGroupError> {
        let instrument = symbol.compact();
        self.blocking(
            move |conn| {
                query_group(
                    conn,
                    "WHERE REPLACE(symbol, '/', '') = ?1 AND state IN ('ENTRY_PENDING', 'ARMED')",
                    params![instrument],
                )
            },
            group_storage_error,
        )
        .await
    }

    async fn find_by_client_id(
        &self,
        client_id: &ClientOrderId,
    ) -> Result<Option<TradeGroup>, TradeGroupError> {
        let client_id = client_id.to_string();
        self.blocking(
            move |conn| {
                query_group(
                    conn,
                    "WHERE entry_client_id = ?1 OR tp_client_id = ?1 OR sl_client_id = ?1",
                    params![client_id],
                )
            },
            group_storage_error,
        )
        .await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<TradeGroup>, TradeGroupError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.blocking(
            move |conn| query_groups(conn, "ORDER BY updated_at DESC LIMIT ?1", params![limit]),
            group_storage_error,
        )
        .await
    }
}

// ============================================================================
// Heartbeats
// ============================================================================

fn heartbeat_storage_error(message: String) -> HeartbeatError {
    HeartbeatError::Storage { message }
}

fn heartbeat_from_row(row: &Row<'_>) -> rusqlite::Result<(Heartbeat, String)> {
    let recorded_at: String = row.get(1)?;
    let latency_ms: Option<i64> = row.get(3)?;
    let status_code: Option<i64> = row.get(4)?;
    Ok((
        Heartbeat {
            id: row.get(0)?,
            recorded_at: Timestamp::default(),
            ok: row.get(2)?,
            latency_ms: latency_ms.and_then(|v| u64::try_from(v).ok()),
            status_code: status_code.and_then(|v| u16::try_from(v).ok()),
            error: row.get(5)?,
            note: row.get(6)?,
        },
        recorded_at,
    ))
}

#[async_trait]
impl HeartbeatRepository for SqliteStore {
    async fn record_heartbeat(&self, beat: NewHeartbeat) -> Result<i64, HeartbeatError> {
        self.blocking(
            move |conn| {
                conn.execute(
                    "INSERT INTO heartbeats (recorded_at, ok, latency_ms, status_code, error, note) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        beat.recorded_at.to_storage_string(),
                        beat.ok,
                        beat.latency_ms.and_then(|v| i64::try_from(v).ok()),
                        beat.status_code,
                        beat.error,
                        beat.note,
                    ],
                )
                .map_err(HeartbeatError::storage)?;
                Ok(conn.last_insert_rowid())
            },
            heartbeat_storage_error,
        )
        .await
    }

    async fn get_recent_heartbeats(&self, limit: usize) -> Result<Vec<Heartbeat>, HeartbeatError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.blocking(
            move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, recorded_at, ok, latency_ms, status_code, error, note \
                         FROM heartbeats ORDER BY id DESC LIMIT ?1",
                    )
                    .map_err(HeartbeatError::storage)?;
                let rows = stmt
                    .query_map(params![limit], heartbeat_from_row)
                    .map_err(HeartbeatError::storage)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(HeartbeatError::storage)?;

                rows.into_iter()
                    .map(|(mut beat, recorded_at)| {
                        beat.recorded_at =
                            Timestamp::parse(&recorded_at).map_err(HeartbeatError::storage)?;
                        Ok(beat)
                    })
                    .collect()
            },
            heartbeat_storage_error,
        )
        .await
    }
}
