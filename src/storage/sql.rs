//! Relational collaborator backed by SQLite.
//!
//! Databases are opened by name and kept for the lifetime of the catalog.
//! Row changes are attributed to tables through SQLite's update hook and
//! reported to the catalog's [`ChangeObserver`] once the statement finishes.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::hooks::Action;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;

use crate::error::StorageError;
use crate::listener::{ChangeEvent, ChangeSource, DEFAULT_DATABASE};
use crate::storage::traits::ChangeObserver;
use crate::value::StoredValue;

fn backend(err: rusqlite::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn lock_err() -> StorageError {
    StorageError::Backend("poisoned lock: sql catalog".to_string())
}

fn to_sql(value: &StoredValue) -> SqlValue {
    match value {
        StoredValue::Null => SqlValue::Null,
        StoredValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        StoredValue::Number(n) => SqlValue::Real(*n),
        StoredValue::String(s) => SqlValue::Text(s.clone()),
    }
}

fn to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

struct Database {
    conn: Connection,
    path: PathBuf,
    touched: Arc<Mutex<BTreeSet<String>>>,
}

/// Named SQLite databases.
#[derive(Default)]
pub struct SqlCatalog {
    databases: Mutex<HashMap<String, Database>>,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl std::fmt::Debug for SqlCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .databases
            .lock()
            .map(|dbs| dbs.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("SqlCatalog")
            .field("databases", &names)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl SqlCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Open a database under `name`, switching it to WAL journaling.
    ///
    /// Opening a name that is already open is a no-op.
    pub fn open(&self, name: &str, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let mut dbs = self.databases.lock().map_err(|_| lock_err())?;
        if dbs.contains_key(name) {
            debug!(database = %name, "database already open");
            return Ok(());
        }

        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(backend)?;
        // In-memory databases report "memory" and ignore the request.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(backend)?;

        let touched = Arc::new(Mutex::new(BTreeSet::new()));
        let sink = Arc::clone(&touched);
        conn.update_hook(Some(move |_: Action, _: &str, table: &str, _: i64| {
            if let Ok(mut tables) = sink.lock() {
                tables.insert(table.to_string());
            }
        }));

        debug!(database = %name, path = %path.display(), "opened database");
        dbs.insert(name.to_string(), Database { conn, path, touched });
        Ok(())
    }

    /// Whether `name` is open; `None` asks whether any database is.
    #[must_use]
    pub fn is_open(&self, name: Option<&str>) -> bool {
        self.databases.lock().map_or(false, |dbs| match name {
            Some(name) => dbs.contains_key(name),
            None => !dbs.is_empty(),
        })
    }

    #[must_use]
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.databases
            .lock()
            .ok()
            .and_then(|dbs| dbs.get(name).map(|db| db.path.clone()))
    }

    /// Run a statement and return the number of affected rows.
    ///
    /// Each table the statement wrote to is reported once to the observer,
    /// after the catalog lock is released.
    pub fn execute(
        &self,
        sql: &str,
        params: &[StoredValue],
        database: Option<&str>,
    ) -> Result<usize, StorageError> {
        let name = database.unwrap_or(DEFAULT_DATABASE);
        let (affected, tables) = {
            let dbs = self.databases.lock().map_err(|_| lock_err())?;
            let db = dbs.get(name).ok_or_else(|| StorageError::NotInitialized {
                instance: name.to_string(),
            })?;

            let affected = db
                .conn
                .execute(sql, params_from_iter(params.iter().map(to_sql)))
                .map_err(backend)?;
            let tables = std::mem::take(&mut *db.touched.lock().map_err(|_| lock_err())?);
            (affected, tables)
        };

        if let Some(observer) = &self.observer {
            for table in tables {
                observer.on_change(&ChangeEvent::new(ChangeSource::table(name, table)));
            }
        }
        Ok(affected)
    }

    /// Run a query and serialize the rows as a JSON array of objects.
    ///
    /// Integers, reals and text keep their type; NULL and BLOB columns become
    /// `null`.
    pub fn query_json(
        &self,
        sql: &str,
        params: &[StoredValue],
        database: Option<&str>,
    ) -> Result<String, StorageError> {
        let name = database.unwrap_or(DEFAULT_DATABASE);
        let dbs = self.databases.lock().map_err(|_| lock_err())?;
        let db = dbs.get(name).ok_or_else(|| StorageError::NotInitialized {
            instance: name.to_string(),
        })?;

        let mut stmt = db.conn.prepare(sql).map_err(backend)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql)))
            .map_err(backend)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(backend)? {
            let mut obj = Map::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                obj.insert(column.clone(), to_json(row.get_ref(idx).map_err(backend)?));
            }
            out.push(JsonValue::Object(obj));
        }

        serde_json::to_string(&out).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Close a database. Returns whether it was open.
    pub fn close(&self, name: &str) -> Result<bool, StorageError> {
        let mut dbs = self.databases.lock().map_err(|_| lock_err())?;
        Ok(dbs.remove(name).is_some())
    }
}
