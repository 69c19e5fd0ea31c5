//! SQLite-backed persistent tile store.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::tile::TileCoord;

/// Number of coordinates checked per existence query.
///
/// Three bound parameters per coordinate keeps each statement well under
/// SQLite's default limit of 999 variables.
pub const BATCH_CHECK_CHUNK_SIZE: usize = 100;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS tiles (
        zoom INTEGER NOT NULL,
        x INTEGER NOT NULL,
        y INTEGER NOT NULL,
        blob BLOB NOT NULL,
        PRIMARY KEY (zoom, x, y)
    )";

// SQLite refuses non-constant defaults in ADD COLUMN, so the timestamp is
// written explicitly on every save instead.
const ADD_CREATED_AT: &str = "ALTER TABLE tiles ADD COLUMN created_at TIMESTAMP";

const BACKFILL_CREATED_AT: &str =
    "UPDATE tiles SET created_at = CURRENT_TIMESTAMP WHERE created_at IS NULL";

const CREATE_CREATED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_tiles_created_at ON tiles(created_at)";

/// Persistent store of tile blobs keyed by `(zoom, x, y)`.
///
/// Writes are upserts: saving an existing key replaces the blob and
/// refreshes `created_at`. The store is cheap to clone and safe to share
/// between the tile handlers and the download queue.
///
/// # Example
///
/// ```no_run
/// use tile_proxy::store::TileStore;
///
/// # async fn example() -> Result<(), tile_proxy::error::StoreError> {
/// let store = TileStore::open("tiles.db").await?;
/// store.ensure_schema().await?;
///
/// store.save_tile(3, 4, 2, b"\x89PNG").await;
/// assert!(store.has_tile(3, 4, 2).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TileStore {
    pool: SqlitePool,
}

impl TileStore {
    /// Open (creating if missing) the database file at `path` in WAL mode.
    ///
    /// The schema is not touched; call [`ensure_schema`](Self::ensure_schema).
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Create the tiles table, the `created_at` column and its index.
    ///
    /// Safe to call on every startup. Tables created before `created_at`
    /// existed get the column added and their rows stamped with the current
    /// time.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;

        match sqlx::query(ADD_CREATED_AT).execute(&self.pool).await {
            Ok(_) => {
                let stamped = sqlx::query(BACKFILL_CREATED_AT)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
                if stamped > 0 {
                    info!(rows = stamped, "Added created_at to existing tiles");
                }
            }
            Err(sqlx::Error::Database(e)) if e.message().contains("duplicate column") => {
                debug!("created_at column already present");
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query(CREATE_CREATED_AT_INDEX)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fetch a tile blob, or `None` if the tile is not stored.
    pub async fn get_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT blob FROM tiles WHERE zoom = ? AND x = ? AND y = ?")
            .bind(zoom)
            .bind(x)
            .bind(y)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("blob")?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a tile.
    ///
    /// Returns `false` if the write failed; the cause is logged and the tile
    /// must be treated as not cached.
    pub async fn save_tile(&self, zoom: u8, x: u32, y: u32, blob: &[u8]) -> bool {
        let result = sqlx::query(
            "INSERT OR REPLACE INTO tiles (zoom, x, y, blob, created_at)
             VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(zoom)
        .bind(x)
        .bind(y)
        .bind(blob)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                error!(zoom, x, y, "Failed to save tile: {}", e);
                false
            }
        }
    }

    /// Whether a tile is stored.
    pub async fn has_tile(&self, zoom: u8, x: u32, y: u32) -> Result<bool, StoreError> {
        Ok(self.get_tile(zoom, x, y).await?.is_some())
    }

    /// Return the subset of `coords` already present in the store.
    ///
    /// Coordinates are checked [`BATCH_CHECK_CHUNK_SIZE`] at a time. A chunk
    /// whose query fails is logged and reported as absent, so those tiles are
    /// fetched again rather than skipped.
    pub async fn batch_check_tiles(&self, coords: &[TileCoord]) -> HashSet<TileCoord> {
        let mut existing = HashSet::new();

        for chunk in coords.chunks(BATCH_CHECK_CHUNK_SIZE) {
            let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT zoom, x, y FROM tiles WHERE (zoom, x, y) IN (VALUES {placeholders})"
            );

            let mut query = sqlx::query(&sql);
            for coord in chunk {
                query = query.bind(coord.zoom).bind(coord.x).bind(coord.y);
            }

            let rows = match query.fetch_all(&self.pool).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(chunk_len = chunk.len(), "Batch tile check failed: {}", e);
                    continue;
                }
            };

            for row in rows {
                match decode_coord(&row) {
                    Ok(coord) => {
                        existing.insert(coord);
                    }
                    Err(e) => warn!("Skipping undecodable tile row: {}", e),
                }
            }
        }

        existing
    }

    /// Delete tiles older than `max_age_days` and return how many went.
    ///
    /// Failures are logged and reported as zero removed.
    pub async fn cleanup_old_tiles(&self, max_age_days: u32) -> u64 {
        let result = sqlx::query("DELETE FROM tiles WHERE created_at < datetime('now', ?)")
            .bind(format!("-{max_age_days} days"))
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => done.rows_affected(),
            Err(e) => {
                error!(max_age_days, "Failed to clean up old tiles: {}", e);
                0
            }
        }
    }

    /// Remove a single tile. Returns whether it existed.
    pub async fn delete_tile(&self, zoom: u8, x: u32, y: u32) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM tiles WHERE zoom = ? AND x = ? AND y = ?")
            .bind(zoom)
            .bind(x)
            .bind(y)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Total number of stored tiles.
    pub async fn tile_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_coord(row: &sqlx::sqlite::SqliteRow) -> Result<TileCoord, sqlx::Error> {
    let zoom: i64 = row.try_get("zoom")?;
    let x: i64 = row.try_get("x")?;
    let y: i64 = row.try_get("y")?;

    let out_of_range = |column: &str| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("{column} out of range").into(),
    };

    Ok(TileCoord::new(
        u8::try_from(zoom).map_err(|_| out_of_range("zoom"))?,
        u32::try_from(x).map_err(|_| out_of_range("x"))?,
        u32::try_from(y).map_err(|_| out_of_range("y"))?,
    ))
}
