//! Cache registry trait with SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::net::{Request, Response};

/// A response replayed from a named store.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: Response,
  /// Name of the store the entry was found in
  pub store: String,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Registry of named cache stores mapping GET requests to responses.
///
/// Every operation is atomic from the caller's point of view. Failures
/// (locked database, full disk) surface as errors and are never retried.
pub trait CacheStorage: Send + Sync {
  /// Create the store if it does not exist yet.
  fn open_store(&self, name: &str) -> Result<()>;

  /// Names of every store, in creation order.
  fn store_names(&self) -> Result<Vec<String>>;

  /// Delete a store and all its entries. Returns false if it did not exist.
  fn delete_store(&self, name: &str) -> Result<bool>;

  /// Look the request up in a single store.
  fn get(&self, store: &str, request: &Request) -> Result<Option<CachedEntry>>;

  /// Look the request up across every store, oldest store first.
  fn match_any(&self, request: &Request) -> Result<Option<CachedEntry>>;

  /// Write (or overwrite) an entry, creating the store on demand.
  ///
  /// Only GET requests may be stored; anything else is rejected.
  fn put(&self, store: &str, request: &Request, response: &Response) -> Result<()>;

  /// Requests stored in a store, in insertion order.
  fn keys(&self, store: &str) -> Result<Vec<Request>>;
}

fn ensure_cacheable(request: &Request) -> Result<()> {
  if request.is_cacheable() {
    Ok(())
  } else {
    Err(eyre!(
      "Refusing to cache {} request for {}",
      request.method,
      request.url
    ))
  }
}

/// SQLite-backed cache registry.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the registry at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Registry that lives only as long as the process.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("secucitoyen").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Named stores; rowid gives creation order
CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses keyed by request hash
CREATE TABLE IF NOT EXISTS cache_entries (
    store TEXT NOT NULL,
    request_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store, request_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_key ON cache_entries(request_key);
"#;

type EntryRow = (u16, String, Vec<u8>, String, String);

fn entry_from_row(row: EntryRow) -> Result<CachedEntry> {
  let (status, headers, body, cached_at, store) = row;
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;

  Ok(CachedEntry {
    response: Response {
      status,
      headers,
      body,
    },
    store,
    cached_at: parse_datetime(&cached_at)?,
  })
}

impl CacheStorage for SqliteStorage {
  fn open_store(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache store {}: {}", name, e))?;

    Ok(())
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_stores ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache stores: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache store name: {}", e))?;

    Ok(names)
  }

  fn delete_store(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM cache_entries WHERE store = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM cache_stores WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache store {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn get(&self, store: &str, request: &Request) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT status, headers, body, cached_at, store FROM cache_entries
         WHERE store = ? AND request_key = ?",
        params![store, request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} in {}: {}", request.url, store, e))?;

    row.map(entry_from_row).transpose()
  }

  fn match_any(&self, request: &Request) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT e.status, e.headers, e.body, e.cached_at, e.store FROM cache_entries e
         INNER JOIN cache_stores s ON s.name = e.store
         WHERE e.request_key = ?
         ORDER BY s.rowid
         LIMIT 1",
        params![request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", request.url, e))?;

    row.map(entry_from_row).transpose()
  }

  fn put(&self, store: &str, request: &Request, response: &Response) -> Result<()> {
    ensure_cacheable(request)?;

    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
      params![store],
    )
    .map_err(|e| eyre!("Failed to open cache store {}: {}", store, e))?;

    tx.execute(
      "INSERT INTO cache_entries (store, request_key, method, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
       ON CONFLICT (store, request_key) DO UPDATE SET
         status = excluded.status,
         headers = excluded.headers,
         body = excluded.body,
         cached_at = excluded.cached_at",
      params![
        store,
        request.cache_key(),
        request.method.as_str(),
        request.url,
        response.status,
        headers,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store {} in {}: {}", request.url, store, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn keys(&self, store: &str) -> Result<Vec<Request>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT method, url FROM cache_entries WHERE store = ? ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(params![store], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
      })
      .map_err(|e| eyre!("Failed to list keys of {}: {}", store, e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read key of {}: {}", store, e))?;

    rows
      .into_iter()
      .map(|(method, url)| {
        let method = Method::from_bytes(method.as_bytes())
          .map_err(|e| eyre!("Invalid method '{}' in {}: {}", method, store, e))?;
        Ok(Request::new(method, url))
      })
      .collect()
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

struct MemoryStore {
  name: String,
  entries: Vec<(Request, Response, DateTime<Utc>)>,
}

/// Registry kept entirely in process memory.
#[derive(Default)]
pub struct MemoryStorage {
  stores: Mutex<Vec<MemoryStore>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn open_store(&self, name: &str) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if !stores.iter().any(|s| s.name == name) {
      stores.push(MemoryStore {
        name: name.to_string(),
        entries: Vec::new(),
      });
    }
    Ok(())
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.iter().map(|s| s.name.clone()).collect())
  }

  fn delete_store(&self, name: &str) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let before = stores.len();
    stores.retain(|s| s.name != name);
    Ok(stores.len() != before)
  }

  fn get(&self, store: &str, request: &Request) -> Result<Option<CachedEntry>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let key = request.cache_key();

    Ok(
      stores
        .iter()
        .filter(|s| s.name == store)
        .flat_map(|s| s.entries.iter().map(move |e| (s, e)))
        .find(|(_, (req, _, _))| req.cache_key() == key)
        .map(|(s, (_, resp, at))| CachedEntry {
          response: resp.clone(),
          store: s.name.clone(),
          cached_at: *at,
        }),
    )
  }

  fn match_any(&self, request: &Request) -> Result<Option<CachedEntry>> {
    for name in self.store_names()? {
      if let Some(entry) = self.get(&name, request)? {
        return Ok(Some(entry));
      }
    }
    Ok(None)
  }

  fn put(&self, store: &str, request: &Request, response: &Response) -> Result<()> {
    ensure_cacheable(request)?;
    self.open_store(store)?;

    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let key = request.cache_key();
    let now = Utc::now();

    if let Some(target) = stores.iter_mut().find(|s| s.name == store) {
      match target
        .entries
        .iter_mut()
        .find(|(req, _, _)| req.cache_key() == key)
      {
        Some(existing) => {
          existing.1 = response.clone();
          existing.2 = now;
        }
        None => target
          .entries
          .push((Request::new(request.method.clone(), &request.url), response.clone(), now)),
      }
    }
    Ok(())
  }

  fn keys(&self, store: &str) -> Result<Vec<Request>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      stores
        .iter()
        .filter(|s| s.name == store)
        .flat_map(|s| s.entries.iter().map(|(req, _, _)| req.clone()))
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn exercise_registry(storage: &dyn CacheStorage) {
    let req = Request::get("https://app.test/css/style.css");
    let resp = Response::new(200, "body{}").with_header("content-type", "text/css");

    storage.open_store("static-v1").unwrap();
    storage.put("dynamic-v1", &req, &resp).unwrap();
    assert_eq!(storage.store_names().unwrap(), vec!["static-v1", "dynamic-v1"]);

    assert!(storage.get("static-v1", &req).unwrap().is_none());
    let hit = storage.match_any(&req).unwrap().unwrap();
    assert_eq!(hit.store, "dynamic-v1");
    assert_eq!(hit.response, resp);

    // Oldest store wins when both hold the request
    let older = Response::new(200, "old");
    storage.put("static-v1", &req, &older).unwrap();
    assert_eq!(storage.match_any(&req).unwrap().unwrap().response, older);

    // Last write wins
    let newer = Response::new(200, "new");
    storage.put("static-v1", &req, &newer).unwrap();
    assert_eq!(storage.get("static-v1", &req).unwrap().unwrap().response, newer);
    assert_eq!(storage.keys("static-v1").unwrap().len(), 1);

    assert!(storage.delete_store("static-v1").unwrap());
    assert!(!storage.delete_store("static-v1").unwrap());
    assert_eq!(storage.store_names().unwrap(), vec!["dynamic-v1"]);
    assert_eq!(storage.match_any(&req).unwrap().unwrap().store, "dynamic-v1");
  }

  #[test]
  fn test_memory_registry() {
    exercise_registry(&MemoryStorage::new());
  }

  #[test]
  fn test_sqlite_registry() {
    exercise_registry(&SqliteStorage::open_in_memory().unwrap());
  }

  #[test]
  fn test_non_get_is_rejected() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let req = Request::new(Method::POST, "https://app.test/api/upload");

    assert!(storage.put("dynamic-v1", &req, &Response::new(200, "")).is_err());
    assert!(storage.store_names().unwrap().is_empty());

    let memory = MemoryStorage::new();
    assert!(memory.put("dynamic-v1", &req, &Response::new(200, "")).is_err());
    assert!(memory.store_names().unwrap().is_empty());
  }

  #[test]
  fn test_sqlite_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let req = Request::get("https://app.test/index.html");

    {
      let storage = SqliteStorage::open(Some(&path)).unwrap();
      storage.put("static-v1", &req, &Response::new(200, "<html>")).unwrap();
    }

    let storage = SqliteStorage::open(Some(&path)).unwrap();
    let keys = storage.keys("static-v1").unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].url, req.url);
    assert_eq!(keys[0].method, Method::GET);
    assert_eq!(storage.get("static-v1", &req).unwrap().unwrap().response.text(), "<html>");
  }
}
