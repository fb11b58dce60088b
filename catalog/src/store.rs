//! SQLite-backed [`Store`]: the catalog's durable persistence layer.

use crate::{Error, ItemType, Playlist, PlayableItem, PlaylistSummary};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Durable catalog store: items, playlists, and the serialized schedule blob.
///
/// Guarded by a single [`Mutex`] rather than a connection pool, since
/// `rusqlite::Connection` is `!Sync` and the automation loop issues one
/// catalog call at a time regardless (spec §5: the catalog is shared, not
/// sharded).
pub struct Store {
    conn: Mutex<Connection>,
}
impl Store {
    /// Locks the connection, recovering rather than panicking if a prior
    /// holder panicked mid-transaction — a poisoned lock still protects a
    /// consistent `SQLite` connection, since any partial transaction was never
    /// committed.
    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Opens (creating if absent) the on-disk database at `path` and ensures
    /// schema exists.
    ///
    /// # Errors
    /// Returns [`Error::Backend`] if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        // Locks are a runtime-only concept (spec §4.1): a lock held by a
        // prior process must not survive a restart.
        store.clear_playlist_locks()?;
        Ok(store)
    }

    /// Opens a private in-memory database. Used by tests and by `--dbinit`
    /// dry runs.
    ///
    /// # Errors
    /// Returns [`Error::Backend`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), Error> {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                duration INTEGER NOT NULL DEFAULT -1,
                description TEXT NOT NULL DEFAULT '',
                playcount INTEGER NOT NULL DEFAULT 0,
                item_type TEXT NOT NULL DEFAULT 'LOCAL',
                cache INTEGER
            );
            CREATE TABLE IF NOT EXISTS playlists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                weight INTEGER NOT NULL DEFAULT 1,
                locked INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS playlist_items (
                playlist_id INTEGER NOT NULL REFERENCES playlists(id),
                position INTEGER NOT NULL,
                item_id INTEGER NOT NULL REFERENCES items(id),
                PRIMARY KEY (playlist_id, position)
            );
            CREATE TABLE IF NOT EXISTS schedule (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                blob TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayableItem> {
        let item_type: String = row.get(5)?;
        Ok(PlayableItem {
            id: Some(row.get(0)?),
            filename: row.get(1)?,
            duration: row.get(2)?,
            description: row.get(3)?,
            playcount: u64::try_from(row.get::<_, i64>(4)?).unwrap_or(0),
            item_type: ItemType::from_db_str(&item_type),
            cache: row.get(6)?,
        })
    }

    /// Looks up an item by catalog id.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_item_by_id(&self, id: i64) -> Result<Option<PlayableItem>, Error> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, filename, duration, description, playcount, item_type, cache \
             FROM items WHERE id = ?1",
            params![id],
            Self::row_to_item,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Looks up an item by its unique filename.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_item_by_filename(&self, filename: &str) -> Result<Option<PlayableItem>, Error> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, filename, duration, description, playcount, item_type, cache \
             FROM items WHERE filename = ?1",
            params![filename],
            Self::row_to_item,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Inserts a new item, returning its assigned id.
    ///
    /// # Errors
    /// Returns [`Error::Constraint`] if `filename` already exists; otherwise
    /// propagates backend errors.
    pub fn insert_item(&self, item: &PlayableItem) -> Result<i64, Error> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO items (filename, duration, description, playcount, item_type, cache) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.filename,
                item.duration,
                item.description,
                i64::try_from(item.playcount).unwrap_or(i64::MAX),
                item.item_type.as_db_str(),
                item.cache,
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Constraint(format!(
                    "item with filename {:?} already exists",
                    item.filename
                )))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Overwrites the mutable fields of an existing item.
    ///
    /// # Errors
    /// Returns [`Error::Constraint`] if `item.id` is `None` or is not present.
    pub fn update_item(&self, item: &PlayableItem) -> Result<(), Error> {
        let Some(id) = item.id else {
            return Err(Error::Constraint("item has no id".into()));
        };
        let conn = self.conn();
        let rows = conn.execute(
            "UPDATE items SET filename = ?2, duration = ?3, description = ?4, \
             item_type = ?5, cache = ?6 WHERE id = ?1",
            params![
                id,
                item.filename,
                item.duration,
                item.description,
                item.item_type.as_db_str(),
                item.cache,
            ],
        )?;
        if rows == 0 {
            return Err(Error::Constraint(format!("no item with id {id}")));
        }
        Ok(())
    }

    /// Increments the play count of `id` by one (spec §9: counted at start of
    /// play, not at completion).
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn increment_playcount(&self, id: i64) -> Result<(), Error> {
        let conn = self.conn();
        conn.execute(
            "UPDATE items SET playcount = playcount + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Lists all playlists with their non-tombstoned lengths.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.weight, COUNT(pi.item_id) \
             FROM playlists p LEFT JOIN playlist_items pi ON pi.playlist_id = p.id \
             GROUP BY p.id ORDER BY p.name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PlaylistSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                weight: row.get(2)?,
                length: usize::try_from(row.get::<_, i64>(3)?).unwrap_or(0),
            })
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Error::from)
    }

    /// Creates a new, empty playlist.
    ///
    /// # Errors
    /// Returns [`Error::Constraint`] if `name` already exists.
    pub fn create_playlist(&self, name: &str, weight: i64) -> Result<i64, Error> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO playlists (name, weight) VALUES (?1, ?2)",
            params![name, weight],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Constraint(format!(
                    "playlist {name:?} already exists"
                )))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn playlist_by_id_locked(conn: &Connection, id: i64) -> Result<Option<Playlist>, Error> {
        let header = conn
            .query_row(
                "SELECT name, weight FROM playlists WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let Some((name, weight)) = header else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT item_id FROM playlist_items WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let item_ids = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(Playlist {
            id,
            name,
            weight,
            item_ids,
        }))
    }

    /// Fetches a playlist's full item sequence by id.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_playlist_by_id(&self, id: i64) -> Result<Option<Playlist>, Error> {
        let conn = self.conn();
        Self::playlist_by_id_locked(&conn, id)
    }

    /// Fetches a playlist's full item sequence by name, with items ordered
    /// duration-descending (random tiebreak) so that [`crate::PlaylistView::pop_with_timelimit`]
    /// scans largest-fits-first.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_playlist_by_name(&self, name: &str) -> Result<Option<Playlist>, Error> {
        let conn = self.conn();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM playlists WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else { return Ok(None) };
        let (name, weight): (String, i64) = conn.query_row(
            "SELECT name, weight FROM playlists WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut stmt = conn.prepare(
            "SELECT pi.item_id FROM playlist_items pi \
             JOIN items i ON i.id = pi.item_id \
             WHERE pi.playlist_id = ?1 \
             ORDER BY i.duration DESC, RANDOM()",
        )?;
        let item_ids = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(Playlist {
            id,
            name,
            weight,
            item_ids,
        }))
    }

    /// Fetches a playlist ordered playcount-ascending (random tiebreak), so
    /// least-played items surface first — used for the main show.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_playlist_shuffled(&self, name: &str) -> Result<Option<Playlist>, Error> {
        let conn = self.conn();
        let header: Option<(i64, String, i64)> = conn
            .query_row(
                "SELECT id, name, weight FROM playlists WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((id, name, weight)) = header else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT pi.item_id FROM playlist_items pi \
             JOIN items i ON i.id = pi.item_id \
             WHERE pi.playlist_id = ?1 \
             ORDER BY i.playcount ASC, RANDOM()",
        )?;
        let item_ids = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(Playlist {
            id,
            name,
            weight,
            item_ids,
        }))
    }

    /// Picks one playlist at random, weighted by each playlist's `weight`
    /// column, skipping locked and zero-length playlists.
    ///
    /// Computed in application code rather than as a SQL
    /// `ORDER BY weight * RANDOM()` self-join: a self-join degrades
    /// catastrophically as catalog size grows, and a zero-weight playlist
    /// must be excludable without it ever being the `RANDOM()` tiebreak
    /// winner of a zero-probability row.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_random_weighted_playlist(&self) -> Result<Option<Playlist>, Error> {
        let candidates: Vec<(i64, i64)> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "SELECT p.id, p.weight FROM playlists p \
                 JOIN playlist_items pi ON pi.playlist_id = p.id \
                 WHERE p.locked = 0 AND p.weight > 0 \
                 GROUP BY p.id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };
        let total: i64 = candidates.iter().map(|(_, w)| w).sum();
        if total <= 0 {
            return Ok(None);
        }
        let mut pick = rand::thread_rng().gen_range(0..total);
        for (id, weight) in candidates {
            if pick < weight {
                return self.fetch_playlist_by_id(id);
            }
            pick -= weight;
        }
        Ok(None)
    }

    /// Fetches a page of the synthetic "superlist" of every catalog item,
    /// ordered by id.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn fetch_superlist(&self, limit: i64, offset: i64) -> Result<Playlist, Error> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id FROM items ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let item_ids = stmt
            .query_map(params![limit, offset], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Playlist {
            id: 0,
            name: "superlist".into(),
            weight: 0,
            item_ids,
        })
    }

    /// Replaces a playlist's stored item sequence.
    ///
    /// # Errors
    /// Returns [`Error::Constraint`] if the playlist does not exist.
    pub fn update_playlist_items(&self, playlist_id: i64, item_ids: &[i64]) -> Result<(), Error> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM playlists WHERE id = ?1)",
            params![playlist_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::Constraint(format!(
                "no playlist with id {playlist_id}"
            )));
        }
        tx.execute(
            "DELETE FROM playlist_items WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        for (position, item_id) in item_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO playlist_items (playlist_id, position, item_id) VALUES (?1, ?2, ?3)",
                params![playlist_id, i64::try_from(position).unwrap_or(i64::MAX), item_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Marks or unmarks a playlist as locked (excluded from weighted
    /// selection — e.g. while a control-surface edit is in flight).
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn set_playlist_locked(&self, id: i64, locked: bool) -> Result<(), Error> {
        let conn = self.conn();
        conn.execute(
            "UPDATE playlists SET locked = ?2 WHERE id = ?1",
            params![id, locked],
        )?;
        Ok(())
    }

    /// Clears every playlist's locked flag. Invoked once at startup, since
    /// locks are a runtime-only concept and must never survive a restart.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn clear_playlist_locks(&self) -> Result<(), Error> {
        let conn = self.conn();
        conn.execute("UPDATE playlists SET locked = 0", [])?;
        Ok(())
    }

    /// Loads the persisted schedule blob (spec §4.2's serialized
    /// `RequirementEngine` state), if one has been saved.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn load_schedule(&self) -> Result<Option<String>, Error> {
        let conn = self.conn();
        conn.query_row("SELECT blob FROM schedule WHERE id = 0", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(Error::from)
    }

    /// Overwrites the persisted schedule blob.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn save_schedule(&self, blob: &str) -> Result<(), Error> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO schedule (id, blob) VALUES (0, ?1) \
             ON CONFLICT(id) DO UPDATE SET blob = excluded.blob",
            params![blob],
        )?;
        Ok(())
    }

    /// Runs an arbitrary read-only `SQL` query, returning column names and
    /// every row with each value rendered as text. Backs the control
    /// surface's `/sql` resource (spec §6), which the caller is expected to
    /// gate behind a configuration flag before ever reaching this far.
    ///
    /// # Errors
    /// Returns [`Error::Backend`] if `sql` fails to prepare or execute.
    pub fn query_raw(&self, sql: &str) -> Result<SqlResultSet, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let column_count = columns.len();
        let rows = stmt.query_map([], |row| {
            (0..column_count)
                .map(|i| {
                    row.get_ref(i).map(|value| match value {
                        rusqlite::types::ValueRef::Null => String::new(),
                        rusqlite::types::ValueRef::Integer(n) => n.to_string(),
                        rusqlite::types::ValueRef::Real(f) => f.to_string(),
                        rusqlite::types::ValueRef::Text(t) => {
                            String::from_utf8_lossy(t).into_owned()
                        }
                        rusqlite::types::ValueRef::Blob(_) => "<blob>".to_string(),
                    })
                })
                .collect::<rusqlite::Result<Vec<String>>>()
        })?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(SqlResultSet { columns, rows })
    }
}

/// Column names and stringified rows from [`Store::query_raw`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SqlResultSet {
    /// Column names, in positional order.
    pub columns: Vec<String>,
    /// Each row's values, rendered as text, in column order.
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_fetch_by_filename_roundtrips() {
        let store = Store::open_in_memory().expect("open");
        let item = PlayableItem::new("a.mp3", ItemType::Local);
        let id = store.insert_item(&item).expect("insert");
        let fetched = store
            .fetch_item_by_filename("a.mp3")
            .expect("fetch")
            .expect("present");
        assert_eq!(fetched.id, Some(id));
    }

    #[test]
    fn duplicate_filename_is_constraint_not_fatal() {
        let store = Store::open_in_memory().expect("open");
        let item = PlayableItem::new("dup.mp3", ItemType::Local);
        store.insert_item(&item).expect("first insert ok");
        let err = store.insert_item(&item).expect_err("second insert fails");
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn weighted_playlist_excludes_zero_weight_and_locked() {
        let store = Store::open_in_memory().expect("open");
        let item = PlayableItem::new("x.mp3", ItemType::Local);
        let item_id = store.insert_item(&item).expect("insert item");

        let zero = store.create_playlist("zero", 0).expect("create");
        store
            .update_playlist_items(zero, &[item_id])
            .expect("seed zero");
        let locked = store.create_playlist("locked", 5).expect("create");
        store
            .update_playlist_items(locked, &[item_id])
            .expect("seed locked");
        store.set_playlist_locked(locked, true).expect("lock");

        let winner = store
            .fetch_random_weighted_playlist()
            .expect("query ok");
        assert!(winner.is_none());
    }

    #[test]
    fn update_playlist_items_on_missing_playlist_is_constraint() {
        let store = Store::open_in_memory().expect("open");
        let err = store
            .update_playlist_items(999, &[])
            .expect_err("missing playlist");
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn clear_playlist_locks_unlocks_everything() {
        let store = Store::open_in_memory().expect("open");
        let id = store.create_playlist("p", 1).expect("create");
        store.set_playlist_locked(id, true).expect("lock");
        store.clear_playlist_locks().expect("clear");
        let item = PlayableItem::new("y.mp3", ItemType::Local);
        let item_id = store.insert_item(&item).expect("insert");
        store
            .update_playlist_items(id, &[item_id])
            .expect("seed");
        let winner = store
            .fetch_random_weighted_playlist()
            .expect("query ok");
        assert!(winner.is_some());
    }

    #[test]
    fn open_clears_locks_left_by_a_prior_process() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let path = file.path();

        let id = {
            let store = Store::open(path).expect("open");
            let id = store.create_playlist("p", 1).expect("create");
            let item = PlayableItem::new("y.mp3", ItemType::Local);
            let item_id = store.insert_item(&item).expect("insert");
            store
                .update_playlist_items(id, &[item_id])
                .expect("seed");
            store.set_playlist_locked(id, true).expect("lock");
            id
        };

        // Simulates a restart: locks held by the previous process must not
        // survive into the new one (spec §4.1).
        let store = Store::open(path).expect("reopen");
        let winner = store
            .fetch_random_weighted_playlist()
            .expect("query ok");
        assert_eq!(winner.map(|p| p.id), Some(id));
    }

    #[test]
    fn schedule_blob_roundtrips_and_overwrites() {
        let store = Store::open_in_memory().expect("open");
        assert!(store.load_schedule().expect("load").is_none());
        store.save_schedule("v1").expect("save");
        assert_eq!(store.load_schedule().expect("load"), Some("v1".into()));
        store.save_schedule("v2").expect("save");
        assert_eq!(store.load_schedule().expect("load"), Some("v2".into()));
    }

    #[test]
    fn query_raw_returns_columns_and_stringified_rows() {
        let store = Store::open_in_memory().expect("open");
        let item = PlayableItem::new("raw.mp3", ItemType::Local);
        store.insert_item(&item).expect("insert");
        let result = store
            .query_raw("SELECT id, filename FROM items")
            .expect("query");
        assert_eq!(result.columns, vec!["id".to_string(), "filename".to_string()]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][1], "raw.mp3");
    }

    #[test]
    fn query_raw_rejects_invalid_sql() {
        let store = Store::open_in_memory().expect("open");
        assert!(store.query_raw("NOT VALID SQL").is_err());
    }
}
