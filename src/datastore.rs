//! The record store: administrator-entered records in SQLite, fronted
//! by a manager task. Servers talk to it over an mpsc channel and get
//! answers back on oneshots, so every operation is atomic with respect
//! to the others.

use crate::enums::{RecordType, STORABLE_TYPES};
use crate::error::IbexError;
use crate::normalize_name;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::net::Ipv4Addr;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Responder<T> = oneshot::Sender<T>;

/// A record as it lives in the `records` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StoredRecord {
    pub id: i64,
    pub name: String,
    pub record_type: String,
    pub value: String,
    pub ttl: i64,
    pub preference: Option<i64>,
    pub is_manual: bool,
    pub created_at: String,
}

/// What the admin API hands us to create or update a record.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPayload {
    #[serde(alias = "domain")]
    pub name: String,
    #[serde(alias = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(alias = "priority")]
    pub preference: Option<u16>,
}

fn default_ttl() -> u32 {
    60
}

impl RecordPayload {
    /// Normalize and validate in place: lowercase trailing-dot name,
    /// uppercase type from the storable set, parseable address rdata,
    /// and MX records must carry a preference.
    pub fn validate(&mut self) -> Result<(), IbexError> {
        self.name = normalize_name(&self.name);
        if self.name == "." {
            return Err(IbexError::invalid_record("name", "name must not be empty"));
        }
        self.record_type = self.record_type.to_uppercase();
        let rrtype = RecordType::from_name(&self.record_type)
            .filter(|rrtype| STORABLE_TYPES.contains(rrtype))
            .ok_or_else(|| {
                IbexError::invalid_record(
                    "record_type",
                    format!("unsupported record type {}", self.record_type),
                )
            })?;
        match rrtype {
            RecordType::A => {
                self.value.parse::<Ipv4Addr>().map_err(|_| {
                    IbexError::invalid_record("value", "invalid IPv4 address for A record")
                })?;
            }
            RecordType::MX => {
                if self.preference.is_none() {
                    return Err(IbexError::invalid_record(
                        "preference",
                        "MX records require a preference value",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum Command {
    Insert {
        payload: RecordPayload,
        resp: Responder<Result<i64, IbexError>>,
    },
    Update {
        id: i64,
        payload: RecordPayload,
        resp: Responder<Result<bool, IbexError>>,
    },
    List {
        resp: Responder<Vec<StoredRecord>>,
    },
    /// Manual records matching (name, type), for the resolver.
    Lookup {
        name: String,
        record_type: String,
        resp: Responder<Vec<StoredRecord>>,
    },
    /// Manual records for a name regardless of type, for qtype=ANY.
    LookupAny {
        name: String,
        resp: Responder<Vec<StoredRecord>>,
    },
    DeleteByName {
        name: String,
        resp: Responder<u64>,
    },
    DeleteById {
        id: i64,
        resp: Responder<u64>,
    },
}

/// Open (creating if needed) the records database.
pub async fn open_pool(sqlite_path: &str) -> Result<SqlitePool, IbexError> {
    let options = SqliteConnectOptions::new()
        .filename(sqlite_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), IbexError> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            record_type TEXT NOT NULL,
            value TEXT NOT NULL,
            ttl INTEGER NOT NULL DEFAULT 60,
            preference INTEGER,
            is_manual INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_name_type ON records (name, record_type)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn insert_record(pool: &SqlitePool, mut payload: RecordPayload) -> Result<i64, IbexError> {
    payload.validate()?;
    let result = sqlx::query(
        "INSERT INTO records (name, record_type, value, ttl, preference, is_manual, created_at)
         VALUES (?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&payload.name)
    .bind(&payload.record_type)
    .bind(&payload.value)
    .bind(payload.ttl as i64)
    .bind(payload.preference.map(|p| p as i64))
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn update_record(
    pool: &SqlitePool,
    id: i64,
    mut payload: RecordPayload,
) -> Result<bool, IbexError> {
    payload.validate()?;
    let result = sqlx::query(
        "UPDATE records SET name = ?, record_type = ?, value = ?, ttl = ?, preference = ?
         WHERE id = ? AND is_manual = 1",
    )
    .bind(&payload.name)
    .bind(&payload.record_type)
    .bind(&payload.value)
    .bind(payload.ttl as i64)
    .bind(payload.preference.map(|p| p as i64))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn list_records(pool: &SqlitePool) -> Result<Vec<StoredRecord>, IbexError> {
    let rows = sqlx::query_as::<_, StoredRecord>("SELECT * FROM records ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn lookup_records(
    pool: &SqlitePool,
    name: &str,
    record_type: &str,
) -> Result<Vec<StoredRecord>, IbexError> {
    let rows = sqlx::query_as::<_, StoredRecord>(
        "SELECT * FROM records WHERE name = ? AND record_type = ? AND is_manual = 1 ORDER BY id",
    )
    .bind(normalize_name(name))
    .bind(record_type.to_uppercase())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn lookup_records_any(pool: &SqlitePool, name: &str) -> Result<Vec<StoredRecord>, IbexError> {
    let rows = sqlx::query_as::<_, StoredRecord>(
        "SELECT * FROM records WHERE name = ? AND is_manual = 1 ORDER BY id",
    )
    .bind(normalize_name(name))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn delete_by_name(pool: &SqlitePool, name: &str) -> Result<u64, IbexError> {
    let result = sqlx::query("DELETE FROM records WHERE name = ?")
        .bind(normalize_name(name))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn delete_by_id(pool: &SqlitePool, id: i64) -> Result<u64, IbexError> {
    let result = sqlx::query("DELETE FROM records WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Manages the record store: waits for commands from the servers and
/// the admin API and responds with data.
pub async fn manager(mut rx: mpsc::Receiver<Command>, pool: SqlitePool) -> Result<(), IbexError> {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Insert { payload, resp } => {
                let result = insert_record(&pool, payload).await;
                if resp.send(result).is_err() {
                    debug!("insert requester went away before the response");
                }
            }
            Command::Update { id, payload, resp } => {
                let result = update_record(&pool, id, payload).await;
                if resp.send(result).is_err() {
                    debug!("update requester went away before the response");
                }
            }
            Command::List { resp } => {
                let records = list_records(&pool).await.unwrap_or_else(|err| {
                    error!("failed to list records: {err}");
                    vec![]
                });
                let _ = resp.send(records);
            }
            Command::Lookup {
                name,
                record_type,
                resp,
            } => {
                let records = lookup_records(&pool, &name, &record_type)
                    .await
                    .unwrap_or_else(|err| {
                        error!("failed to look up {name} {record_type}: {err}");
                        vec![]
                    });
                let _ = resp.send(records);
            }
            Command::LookupAny { name, resp } => {
                let records = lookup_records_any(&pool, &name).await.unwrap_or_else(|err| {
                    error!("failed to look up {name}: {err}");
                    vec![]
                });
                let _ = resp.send(records);
            }
            Command::DeleteByName { name, resp } => {
                let deleted = delete_by_name(&pool, &name).await.unwrap_or_else(|err| {
                    error!("failed to delete {name}: {err}");
                    0
                });
                let _ = resp.send(deleted);
            }
            Command::DeleteById { id, resp } => {
                let deleted = delete_by_id(&pool, id).await.unwrap_or_else(|err| {
                    error!("failed to delete record {id}: {err}");
                    0
                });
                let _ = resp.send(deleted);
            }
        }
    }
    Ok(())
}
