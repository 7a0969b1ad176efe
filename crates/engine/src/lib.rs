use anyhow::Context;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod auth;
pub mod catalog;
pub mod error;
pub mod model;
mod orders;
mod rows;
pub mod territory;
mod world;

pub use error::{GameError, Result};
pub use model::*;
pub use orders::{EVENT_FEED_LIMIT, MAX_UNIT_QUANTITY};
pub use world::NewNation;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

fn new_id(prefix: &str) -> String {
    let c = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{c}", now_ms())
}

/// How new nations are placed on the shared grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
    pub territory_count: usize,
    /// Base origin window; widened as the world fills.
    pub origin_window: i64,
    pub origin_attempts: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            territory_count: territory::DEFAULT_TERRITORY_COUNT,
            origin_window: territory::DEFAULT_ORIGIN_WINDOW,
            origin_attempts: territory::DEFAULT_ORIGIN_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    db_path: PathBuf,
    world: WorldConfig,
}

impl Engine {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            world: WorldConfig::default(),
        }
    }

    pub fn with_world(mut self, world: WorldConfig) -> Self {
        self.world = world;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn world(&self) -> &WorldConfig {
        &self.world
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        migrate(&conn)?;
        Ok(conn)
    }

    /// Latest event_log sequence number; clients poll it to detect changes.
    pub fn get_rev(&self) -> anyhow::Result<i64> {
        let conn = self.open()?;
        let rev: Option<i64> =
            conn.query_row("SELECT MAX(seq) FROM event_log", [], |row| row.get(0))?;
        Ok(rev.unwrap_or(0))
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
-- Monotonic revision source for UI sync.
CREATE TABLE IF NOT EXISTS event_log (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  ts_ms INTEGER NOT NULL,
  kind TEXT NOT NULL,
  entity_id TEXT,
  payload_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_event_log_kind ON event_log(kind);

CREATE TABLE IF NOT EXISTS users (
  id TEXT PRIMARY KEY,
  username TEXT NOT NULL UNIQUE,
  password_hash TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS countries (
  id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  capital_city_name TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_countries_user ON countries(user_id);

CREATE TABLE IF NOT EXISTS resources (
  id TEXT PRIMARY KEY,
  country_id TEXT NOT NULL UNIQUE REFERENCES countries(id) ON DELETE CASCADE,
  money REAL NOT NULL DEFAULT 100000,
  population INTEGER NOT NULL DEFAULT 500000,
  research_points REAL NOT NULL DEFAULT 0,
  manpower INTEGER NOT NULL DEFAULT 20000,
  stability REAL NOT NULL DEFAULT 100,
  oil REAL NOT NULL DEFAULT 0,
  minerals REAL NOT NULL DEFAULT 0,
  materials REAL NOT NULL DEFAULT 0,
  food REAL NOT NULL DEFAULT 0,
  uranium REAL NOT NULL DEFAULT 0,
  economic_strength REAL NOT NULL DEFAULT 50,
  last_updated TEXT NOT NULL
);

-- One owner per grid cell, across all nations.
CREATE TABLE IF NOT EXISTS territories (
  id TEXT PRIMARY KEY,
  country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
  x INTEGER NOT NULL,
  y INTEGER NOT NULL,
  city_name TEXT,
  UNIQUE (x, y)
);

CREATE INDEX IF NOT EXISTS idx_territories_country ON territories(country_id);

CREATE TABLE IF NOT EXISTS structures (
  id TEXT PRIMARY KEY,
  territory_id TEXT NOT NULL REFERENCES territories(id) ON DELETE CASCADE,
  kind TEXT NOT NULL,
  level INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS units (
  id TEXT PRIMARY KEY,
  country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
  kind TEXT NOT NULL,
  quantity INTEGER NOT NULL DEFAULT 1,
  current_territory_id TEXT REFERENCES territories(id) ON DELETE SET NULL,
  target_territory_id TEXT REFERENCES territories(id) ON DELETE SET NULL,
  movement_progress REAL NOT NULL DEFAULT 0,
  movement_speed REAL NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS research (
  id TEXT PRIMARY KEY,
  country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
  branch TEXT NOT NULL,
  technology TEXT NOT NULL,
  level INTEGER NOT NULL DEFAULT 0,
  in_progress INTEGER NOT NULL DEFAULT 0,
  progress REAL NOT NULL DEFAULT 0,
  updated_at TEXT NOT NULL,
  UNIQUE (country_id, technology)
);

CREATE TABLE IF NOT EXISTS trades (
  id TEXT PRIMARY KEY,
  from_country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
  to_country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
  offer_json TEXT NOT NULL DEFAULT '{}',
  request_json TEXT NOT NULL DEFAULT '{}',
  status TEXT NOT NULL DEFAULT 'pending',
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
  id TEXT PRIMARY KEY,
  country_id TEXT NOT NULL REFERENCES countries(id) ON DELETE CASCADE,
  kind TEXT NOT NULL,
  severity TEXT NOT NULL,
  message TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_country ON events(country_id);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}

fn append_event_tx(
    tx: &rusqlite::Transaction<'_>,
    kind: &str,
    entity_id: Option<&str>,
    payload: serde_json::Value,
) -> anyhow::Result<i64> {
    let ts = now_ms();
    let payload_json = payload.to_string();
    tx.execute(
        "INSERT INTO event_log (ts_ms, kind, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4)",
        (ts, kind, entity_id, payload_json),
    )?;
    Ok(tx.last_insert_rowid())
}
