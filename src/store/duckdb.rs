//! Embedded DuckDB document store.
//!
//! Each collection is one table with a typed value column per scalar kind
//! (exactly one is non-NULL per row) and an idempotent compound
//! `(ts, source)` index. Timestamps are stored as UTC microsecond ticks.
//!
//! The native DuckDB handle is not `Sync`, so this store serializes all
//! operations behind a mutex. Concurrency across reads therefore degrades
//! to mutual exclusion on one handle; hosts needing parallel reads open
//! additional handles through the connector.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::DateTime;
use duckdb::Connection;
use uuid::Uuid;

use crate::error::{ConnectionError, DriverError};
use crate::record::SortOrder;
use crate::store::{Connect, DocumentFilter, DocumentStore, StoredRecord};
use crate::value::NativeScalar;

/// Connector opening DuckDB database files.
///
/// The endpoint is a directory (created if absent); the database name
/// selects the file inside it. The special endpoint `:memory:` opens a
/// transient in-process database.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckConnector;

impl Connect for DuckConnector {
    type Store = DuckStore;

    fn connect(&self, endpoint: &str, database: &str) -> Result<DuckStore, ConnectionError> {
        let conn = if endpoint == ":memory:" {
            Connection::open_in_memory().map_err(|e| ConnectionError::Unreachable {
                endpoint: endpoint.to_string(),
                cause: e.to_string(),
            })?
        } else {
            std::fs::create_dir_all(endpoint).map_err(|e| ConnectionError::Unreachable {
                endpoint: endpoint.to_string(),
                cause: format!("cannot create database directory: {e}"),
            })?;
            let path = Path::new(endpoint).join(format!("{database}.duckdb"));
            Connection::open(&path).map_err(|e| ConnectionError::Unreachable {
                endpoint: path.display().to_string(),
                cause: e.to_string(),
            })?
        };

        tracing::debug!(endpoint, database, "opened duckdb store");
        Ok(DuckStore {
            conn: Mutex::new(conn),
        })
    }
}

/// One open DuckDB handle.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collection names become identifiers; restrict them to a safe charset.
fn check_identifier(name: &str) -> Result<(), DriverError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DriverError::Backend(format!(
            "invalid collection identifier {name:?}"
        )));
    }
    Ok(())
}

type RawRow = (String, String, String, i64, Option<f64>, Option<String>, Option<i64>);

fn decode_row(raw: RawRow) -> Result<StoredRecord, DriverError> {
    let (id, source, display, ts, num, txt, tsv) = raw;
    let id = Uuid::parse_str(&id)
        .map_err(|e| DriverError::InvalidRow(format!("bad record id {id:?}: {e}")))?;
    let ts = DateTime::from_timestamp_micros(ts)
        .ok_or_else(|| DriverError::InvalidRow(format!("timestamp {ts} out of range")))?;
    let value = match (num, txt, tsv) {
        (Some(n), _, _) => NativeScalar::Number(n),
        (_, Some(s), _) => NativeScalar::Text(s),
        (_, _, Some(t)) => NativeScalar::Timestamp(
            DateTime::from_timestamp_micros(t)
                .ok_or_else(|| DriverError::InvalidRow(format!("value timestamp {t} out of range")))?,
        ),
        (None, None, None) => {
            return Err(DriverError::InvalidRow("row has no value column set".to_string()));
        }
    };
    Ok(StoredRecord {
        id,
        source,
        display,
        ts,
        value,
    })
}

impl DocumentStore for DuckStore {
    fn ensure_collection(&self, collection: &str) -> Result<(), DriverError> {
        check_identifier(collection)?;
        let conn = self.lock();
        conn.execute_batch(&format!(
            r#"
CREATE TABLE IF NOT EXISTS "{collection}" (
    id        VARCHAR PRIMARY KEY,
    source    VARCHAR NOT NULL,
    display   VARCHAR NOT NULL,
    ts        BIGINT NOT NULL,
    value_num DOUBLE,
    value_txt VARCHAR,
    value_ts  BIGINT
);
CREATE INDEX IF NOT EXISTS "idx_{collection}_ts_source" ON "{collection}" (ts, source);
"#
        ))?;
        Ok(())
    }

    fn insert(&self, collection: &str, record: &StoredRecord) -> Result<(), DriverError> {
        check_identifier(collection)?;
        let (num, txt, tsv): (Option<f64>, Option<String>, Option<i64>) = match &record.value {
            NativeScalar::Number(n) => (Some(*n), None, None),
            NativeScalar::Text(s) => (None, Some(s.clone()), None),
            NativeScalar::Timestamp(t) => (None, None, Some(t.timestamp_micros())),
        };

        let conn = self.lock();
        conn.execute(
            &format!(
                r#"INSERT INTO "{collection}" (id, source, display, ts, value_num, value_txt, value_ts)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#
            ),
            duckdb::params![
                record.id.to_string(),
                record.source,
                record.display,
                record.ts.timestamp_micros(),
                num,
                txt,
                tsv
            ],
        )?;
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        order: SortOrder,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<StoredRecord>, DriverError> {
        check_identifier(collection)?;

        let mut sql = format!(
            r#"SELECT id, source, display, ts, value_num, value_txt, value_ts
               FROM "{collection}" WHERE 1=1"#
        );
        let mut params: Vec<Box<dyn duckdb::ToSql>> = Vec::new();

        if let Some(source) = &filter.source {
            sql.push_str(" AND source = ?");
            params.push(Box::new(source.clone()));
        }
        if let Some((op, probe)) = &filter.value {
            let symbol = op.sql_symbol().ok_or_else(|| {
                DriverError::Backend(format!("operator {op:?} not executable"))
            })?;
            match probe {
                NativeScalar::Number(n) => {
                    sql.push_str(&format!(" AND value_num {symbol} ?"));
                    params.push(Box::new(*n));
                }
                NativeScalar::Text(s) => {
                    sql.push_str(&format!(" AND value_txt {symbol} ?"));
                    params.push(Box::new(s.clone()));
                }
                NativeScalar::Timestamp(t) => {
                    sql.push_str(&format!(" AND value_ts {symbol} ?"));
                    params.push(Box::new(t.timestamp_micros()));
                }
            }
        }
        if let Some(begin) = filter.begin {
            sql.push_str(" AND ts >= ?");
            params.push(Box::new(begin.timestamp_micros()));
        }
        if let Some(end) = filter.end {
            sql.push_str(" AND ts <= ?");
            params.push(Box::new(end.timestamp_micros()));
        }

        sql.push_str(&format!(
            " ORDER BY ts {} LIMIT {limit} OFFSET {skip}",
            order.as_sql()
        ));

        let conn = self.lock();
        let param_refs: Vec<&dyn duckdb::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<i64>>(6)?,
            ))
        })?;

        let raw: Vec<RawRow> = rows.collect::<Result<_, _>>()?;
        raw.into_iter().map(decode_row).collect()
    }
}
