//! Database factory: opening, upgrading and deleting databases.

use crate::config::Config;
use crate::connection::{Connection, OpenHandlers, VersionChange};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::journal::JournalEntry;
use brickstore_storage::FileBackend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Journal file extension.
const JOURNAL_EXTENSION: &str = "bsj";

/// Where databases live.
#[derive(Debug)]
enum Location {
    Memory,
    Directory(PathBuf),
}

struct FactoryInner {
    runtime: Handle,
    location: Location,
    config: Config,
    databases: Mutex<HashMap<String, Arc<Database>>>,
}

/// Entry point to the engine: opens databases by name.
///
/// A factory is bound to the tokio runtime it was created on; requests and
/// transactions are driven by tasks spawned there.
///
/// # Example
///
/// ```rust,ignore
/// let factory = Factory::in_memory()?;
/// let handlers = OpenHandlers::new(RequestHandlers::new(
///     |conn: Connection| println!("opened {}", conn.name()),
///     |event| eprintln!("open failed: {}", event.error()),
/// ))
/// .on_upgrade_needed(|change| change.create_object_store("notes", true));
/// factory.open("app", 1, handlers);
/// ```
#[derive(Clone)]
pub struct Factory {
    inner: Arc<FactoryInner>,
}

impl Factory {
    /// A factory whose databases live only in memory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RuntimeUnavailable`] outside a tokio runtime.
    pub fn in_memory() -> EngineResult<Self> {
        Self::new(Location::Memory, Config::default())
    }

    /// A factory keeping one journal file per database under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RuntimeUnavailable`] outside a tokio runtime,
    /// [`EngineError::NotFound`] if `dir` is missing and
    /// `create_if_missing` is off, or a storage error if it cannot be
    /// created.
    pub fn open_dir(dir: impl AsRef<Path>, config: Config) -> EngineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            if !config.create_if_missing {
                return Err(EngineError::not_found(format!(
                    "directory {}",
                    dir.display()
                )));
            }
            fs::create_dir_all(&dir).map_err(|e| EngineError::Storage {
                message: e.to_string(),
            })?;
        }
        Self::new(Location::Directory(dir), config)
    }

    fn new(location: Location, config: Config) -> EngineResult<Self> {
        let runtime = Handle::try_current().map_err(|_| EngineError::RuntimeUnavailable)?;
        debug!(?location, "factory created");
        Ok(Self {
            inner: Arc::new(FactoryInner {
                runtime,
                location,
                config,
                databases: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// The directory holding journals, for directory-backed factories.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        match &self.inner.location {
            Location::Memory => None,
            Location::Directory(dir) => Some(dir),
        }
    }

    /// Opens database `name` at `version`.
    ///
    /// If `version` is newer than the recorded one (0 for a new database)
    /// the upgrade callback runs first and the new schema is recorded.
    /// The outcome is reported through `handlers.request`.
    ///
    /// Failures: [`EngineError::Data`] for version 0,
    /// [`EngineError::Version`] for a version older than recorded, or any
    /// error the upgrade callback or journal returns.
    pub fn open(&self, name: &str, version: u32, handlers: OpenHandlers) {
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        self.inner.runtime.spawn(async move {
            let OpenHandlers { upgrade, request } = handlers;
            let result = inner
                .open_database(&name, version, upgrade)
                .await
                .map(|db| Connection::new(db, inner.runtime.clone()));
            if let Err(error) = &result {
                debug!(database = %name, %error, "open failed");
            }
            let _ = request.deliver(result);
        });
    }

    /// Deletes database `name` and its journal.
    ///
    /// Existing connections keep their in-memory view but can no longer
    /// start transactions.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the journal cannot be removed.
    pub fn delete_database(&self, name: &str) -> EngineResult<()> {
        if let Some(db) = self.inner.databases.lock().remove(name) {
            db.close();
        }
        if let Location::Directory(dir) = &self.inner.location {
            match fs::remove_file(journal_path(dir, name)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(EngineError::Storage {
                        message: e.to_string(),
                    })
                }
            }
        }
        info!(database = name, "database deleted");
        Ok(())
    }

    /// Names of every known database, sorted.
    ///
    /// Includes databases with a journal on disk that were not opened yet.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.databases.lock().keys().cloned().collect();
        if let Location::Directory(dir) = &self.inner.location {
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(JOURNAL_EXTENSION) {
                        continue;
                    }
                    if let Some(name) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(decode_name)
                    {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("location", &self.inner.location)
            .finish_non_exhaustive()
    }
}

type UpgradeFn = Box<dyn FnOnce(&mut VersionChange<'_>) -> EngineResult<()> + Send>;

impl FactoryInner {
    async fn open_database(
        &self,
        name: &str,
        version: u32,
        upgrade: Option<UpgradeFn>,
    ) -> EngineResult<Arc<Database>> {
        if version == 0 {
            return Err(EngineError::data("version must be at least 1"));
        }

        let db = self.database(name)?;
        let mut turn = db.next_turn();
        turn.wait().await;

        let current = db.version();
        if version < current {
            return Err(EngineError::Version {
                requested: version,
                current,
            });
        }

        if version > current {
            let mut next = db.state.lock().clone();
            {
                let mut change = VersionChange::new(&mut next, current, version);
                if let Some(upgrade) = upgrade {
                    upgrade(&mut change)?;
                }
            }
            next.version = version;
            db.append(&JournalEntry::Schema {
                version,
                stores: next.schemas(),
            })?;
            *db.state.lock() = next;
            info!(database = name, from = current, to = version, "database upgraded");
        }

        drop(turn);
        Ok(db)
    }

    /// Returns the loaded database, loading or creating it first.
    fn database(&self, name: &str) -> EngineResult<Arc<Database>> {
        let mut databases = self.databases.lock();
        if let Some(db) = databases.get(name) {
            return Ok(Arc::clone(db));
        }

        let db = match &self.location {
            Location::Memory => Database::in_memory(name),
            Location::Directory(dir) => {
                let backend = FileBackend::open(&journal_path(dir, name))?;
                Database::load(name, Box::new(backend), self.config.sync_on_commit)?
            }
        };
        debug!(database = name, version = db.version(), "database loaded");

        let db = Arc::new(db);
        databases.insert(name.to_string(), Arc::clone(&db));
        Ok(db)
    }
}

fn journal_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{JOURNAL_EXTENSION}", encode_name(name)))
}

/// Makes a database name safe as a file stem: ASCII alphanumerics, `-`
/// and `_` pass through, every other byte becomes `%XX`.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_encoding() {
        assert_eq!(encode_name("storage"), "storage");
        assert_eq!(encode_name("my db/1"), "my%20db%2F1");
        assert_eq!(decode_name("my%20db%2F1").as_deref(), Some("my db/1"));
        assert_eq!(decode_name(&encode_name("héllo")).as_deref(), Some("héllo"));
        assert_eq!(decode_name("bad%2"), None);
    }

    #[test]
    fn no_runtime() {
        assert!(matches!(
            Factory::in_memory(),
            Err(EngineError::RuntimeUnavailable)
        ));
    }

    #[tokio::test]
    async fn missing_directory_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = Factory::open_dir(&missing, Config::new().create_if_missing(false));
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
        assert!(Factory::open_dir(&missing, Config::new()).is_ok());
        assert!(missing.exists());
    }
}
