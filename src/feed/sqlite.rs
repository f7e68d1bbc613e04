//! Reads completed contacts from a logger's SQLite database.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, OpenFlags, params, types::Value};
use tokio::sync::Mutex;

use crate::spot::ContactEvent;

use super::{ContactSource, SourceError, SourceResult};

/// Incremental reader over the logger's `contacts` table.
///
/// The table needs `callsign`, `band` and `mode` columns; `band` may be stored
/// as text (`"20m"`) or as an integer (`20`). An optional `date_time` column
/// (`YYYY-MM-DD HH:MM:SS`, UTC) supplies the contact time; rows without a
/// parsable one are stamped with the read time. Rows are read in `rowid` order
/// and each fetch returns only rows added since the previous one.
pub struct SqliteContactLog {
    conn: Arc<Mutex<Connection>>,
    last_rowid: i64,
}

impl SqliteContactLog {
    /// Opens the logger database read-only.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection, e.g. an in-memory database.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            last_rowid: 0,
        }
    }

    /// Highest `rowid` returned so far.
    pub fn last_rowid(&self) -> i64 {
        self.last_rowid
    }

    /// Reads rows after `rowid`, returning them with the new high-water mark.
    pub fn read_after(conn: &Connection, rowid: i64) -> SourceResult<(Vec<ContactEvent>, i64)> {
        let sql = if has_column(conn, "contacts", "date_time")? {
            "SELECT rowid, callsign, band, mode, date_time FROM contacts WHERE rowid > ?1 ORDER BY rowid ASC"
        } else {
            "SELECT rowid, callsign, band, mode, NULL FROM contacts WHERE rowid > ?1 ORDER BY rowid ASC"
        };
        let mut stmt = conn.prepare(sql)?;
        let read_at = now_ms();
        let rows = stmt.query_map(params![rowid], |row| {
            let id: i64 = row.get(0)?;
            let callsign: Option<String> = row.get(1)?;
            let band: Value = row.get(2)?;
            let mode: Option<String> = row.get(3)?;
            let logged: Value = row.get(4)?;
            Ok((
                id,
                ContactEvent {
                    callsign: callsign.unwrap_or_default(),
                    band: value_label(band),
                    mode: mode.unwrap_or_default(),
                    timestamp: logged_at_ms(&logged).unwrap_or(read_at),
                },
            ))
        })?;

        let mut out = Vec::new();
        let mut high = rowid;
        for row in rows {
            let (id, ev) = row?;
            high = high.max(id);
            out.push(ev);
        }
        Ok((out, high))
    }
}

#[async_trait]
impl ContactSource for SqliteContactLog {
    async fn fetch_contacts(&mut self) -> SourceResult<Vec<ContactEvent>> {
        let conn = Arc::clone(&self.conn);
        let after = self.last_rowid;
        let (events, high) = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            Self::read_after(&conn, after)
        })
        .await
        .map_err(|e| SourceError::Unavailable(format!("join error: {e}")))??;

        self.last_rowid = high;
        Ok(events)
    }
}

fn value_label(v: Value) -> String {
    match v {
        Value::Text(s) => s,
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?;
    stmt.exists(params![table, column])
}

/// Contact time from a `date_time` value. Text is read as UTC; integers as epoch seconds.
fn logged_at_ms(v: &Value) -> Option<u64> {
    match v {
        Value::Text(s) => {
            let s = s.trim();
            let ndt = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()?;
            u64::try_from(ndt.and_utc().timestamp_millis()).ok()
        }
        Value::Integer(secs) => u64::try_from(*secs).ok()?.checked_mul(1000),
        Value::Null | Value::Real(_) | Value::Blob(_) => None,
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
