//! TTL cache pools for CCU data
//!
//! Data is grouped into named pools, one per kind of record. Each pool
//! supports deferred writes that are only persisted on `commit`, plus
//! immediate writes. Pools are either kept in memory or persisted as one
//! JSON file per pool at XDG_CACHE_HOME/hmip/.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::configuration::Configuration;
use crate::error::CacheError;

const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Default TTL values
pub mod ttl {
    use std::time::Duration;

    /// Names, types and relations - rarely change (1 month)
    pub const STRUCTURE: Duration = Duration::from_secs(30 * 24 * 60 * 60);
    /// Name-to-id indexes (1 month)
    pub const NAMES: Duration = STRUCTURE;
    /// Current values of parameters and variables (1 hour)
    pub const STATE: Duration = Duration::from_secs(60 * 60);
}

/// Pool names
pub mod pools {
    pub const DEVICE_DATA: &str = "deviceData";
    pub const CHANNEL_DATA: &str = "channelData";
    pub const ROOM_DATA: &str = "roomData";
    pub const FUNCTION_DATA: &str = "functionData";
    pub const PROGRAM_DATA: &str = "programData";
    pub const PARAMETER_DATA: &str = "parameterData";
    pub const VARIABLE_DATA: &str = "variableData";

    pub const DEVICE_NAMES: &str = "deviceNames";
    pub const CHANNEL_NAMES: &str = "channelNames";
    pub const ROOM_NAMES: &str = "roomNames";
    pub const FUNCTION_NAMES: &str = "functionNames";
    pub const PROGRAM_NAMES: &str = "programNames";
    pub const VARIABLE_NAMES: &str = "variableNames";

    pub const PARAMETERS: &str = "parameters";
    pub const VARIABLES: &str = "variables";

    pub const ALL: &[&str] = &[
        DEVICE_DATA,
        CHANNEL_DATA,
        ROOM_DATA,
        FUNCTION_DATA,
        PROGRAM_DATA,
        PARAMETER_DATA,
        VARIABLE_DATA,
        DEVICE_NAMES,
        CHANNEL_NAMES,
        ROOM_NAMES,
        FUNCTION_NAMES,
        PROGRAM_NAMES,
        VARIABLE_NAMES,
        PARAMETERS,
        VARIABLES,
    ];
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A cached value with its storage time and TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the entry was stored (epoch seconds)
    pub stored_at: u64,
    /// TTL in seconds
    pub ttl: u64,
    pub value: Value,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            stored_at: now_secs(),
            ttl: ttl.as_secs(),
            value,
        }
    }

    pub fn is_valid(&self) -> bool {
        now_secs() < self.stored_at.saturating_add(self.ttl)
    }

    pub fn age(&self) -> Duration {
        Duration::from_secs(now_secs().saturating_sub(self.stored_at))
    }

    pub fn expires_in(&self) -> Option<Duration> {
        let now = now_secs();
        let expires_at = self.stored_at.saturating_add(self.ttl);
        if now < expires_at {
            Some(Duration::from_secs(expires_at - now))
        } else {
            None
        }
    }
}

/// On-disk layout of one pool
#[derive(Debug, Default, Serialize, Deserialize)]
struct PoolFile {
    /// Controller this pool was filled from (to invalidate on change)
    server_url: String,
    entries: BTreeMap<String, CacheEntry>,
}

/// A named pool of TTL-bounded entries.
#[derive(Debug)]
pub struct CachePool {
    name: String,
    path: Option<PathBuf>,
    server_url: String,
    committed: RefCell<HashMap<String, CacheEntry>>,
    deferred: RefCell<HashMap<String, CacheEntry>>,
}

impl CachePool {
    /// Create a pool that lives only as long as the process.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            server_url: String::new(),
            committed: RefCell::default(),
            deferred: RefCell::default(),
        }
    }

    /// Open a pool persisted at `path`, loading whatever valid entries the
    /// file holds for `server_url`.
    pub fn open(name: impl Into<String>, path: PathBuf, server_url: &str) -> Result<Self, CacheError> {
        let name = name.into();
        let mut committed = HashMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
            match serde_json::from_str::<PoolFile>(&content) {
                Ok(file) if file.server_url == server_url => {
                    committed.extend(file.entries.into_iter().filter(|(_, e)| e.is_valid()));
                }
                Ok(_) => log::debug!("{} cache is for a different server, ignoring", name),
                Err(err) => log::warn!("discarding unreadable cache file {}: {}", path.display(), err),
            }
        }

        Ok(Self {
            name,
            path: Some(path),
            server_url: server_url.to_string(),
            committed: RefCell::new(committed),
            deferred: RefCell::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_key(&self, key: &str) -> Result<(), CacheError> {
        if key.is_empty() || key.chars().any(char::is_control) {
            return Err(CacheError::InvalidKey {
                pool: self.name.clone(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let fresh = |entry: &CacheEntry| entry.is_valid().then(|| entry.value.clone());
        if let Some(entry) = self.deferred.borrow().get(key) {
            return fresh(entry);
        }
        self.committed.borrow().get(key).and_then(fresh)
    }

    /// Whether a live entry exists for `key` (pending deferred writes included).
    pub fn has(&self, key: &str) -> Result<bool, CacheError> {
        self.check_key(key)?;
        Ok(self.lookup(key).is_some())
    }

    /// Fetch and decode the live entry for `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.check_key(key)?;
        let Some(value) = self.lookup(key) else {
            log::trace!("cache miss {}[{}]", self.name, key);
            return Ok(None);
        };
        log::trace!("cache hit {}[{}]", self.name, key);
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                pool: self.name.clone(),
                key: key.to_string(),
                source,
            })
    }

    fn entry<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<CacheEntry, CacheError> {
        self.check_key(key)?;
        let value = serde_json::to_value(value).map_err(|source| CacheError::Encode {
            pool: self.name.clone(),
            key: key.to_string(),
            source,
        })?;
        Ok(CacheEntry::new(value, ttl))
    }

    /// Buffer a write; it becomes durable on the next `commit`.
    pub fn save_deferred<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let entry = self.entry(key, value, ttl)?;
        self.deferred.borrow_mut().insert(key.to_string(), entry);
        Ok(())
    }

    /// Write and persist immediately.
    pub fn save<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let entry = self.entry(key, value, ttl)?;
        self.deferred.borrow_mut().remove(key);
        self.committed.borrow_mut().insert(key.to_string(), entry);
        self.persist()
    }

    /// Persist all deferred writes.
    pub fn commit(&self) -> Result<(), CacheError> {
        let pending: Vec<_> = self.deferred.borrow_mut().drain().collect();
        if pending.is_empty() {
            return Ok(());
        }
        log::debug!("committing {} deferred entries to {}", pending.len(), self.name);
        self.committed.borrow_mut().extend(pending);
        self.persist()
    }

    /// Number of deferred writes not yet committed.
    pub fn pending(&self) -> usize {
        self.deferred.borrow().len()
    }

    fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = PoolFile {
            server_url: self.server_url.clone(),
            entries: self
                .committed
                .borrow()
                .iter()
                .filter(|(_, e)| e.is_valid())
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string(&file).map_err(|source| CacheError::Encode {
            pool: self.name.clone(),
            key: String::new(),
            source,
        })?;
        fs::write(path, content).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })
    }
}

/// The set of pools of one session, opened lazily by name.
#[derive(Debug)]
pub struct CacheStore {
    dir: Option<PathBuf>,
    server_url: String,
    pools: RefCell<HashMap<String, Rc<CachePool>>>,
}

impl CacheStore {
    /// A store whose pools are discarded with the process.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            server_url: String::new(),
            pools: RefCell::default(),
        }
    }

    /// A store persisting pools below `dir`, tagged with `server_url`.
    pub fn persistent(dir: impl Into<PathBuf>, server_url: impl Into<String>) -> Self {
        Self {
            dir: Some(dir.into()),
            server_url: server_url.into(),
            pools: RefCell::default(),
        }
    }

    pub fn from_config(config: &Configuration) -> Result<Self, CacheError> {
        if !config.cache.enabled {
            return Ok(Self::in_memory());
        }
        let dir = match &config.cache.dir {
            Some(dir) => dir.clone(),
            None => cache_dir()?,
        };
        Ok(Self::persistent(dir, config.base_url.trim_end_matches('/')))
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Get the pool called `name`, opening it on first use.
    pub fn pool(&self, name: &str) -> Result<Rc<CachePool>, CacheError> {
        if let Some(pool) = self.pools.borrow().get(name) {
            return Ok(Rc::clone(pool));
        }

        let pool = match &self.dir {
            Some(dir) => CachePool::open(name, pool_path(dir, name), &self.server_url)?,
            None => CachePool::in_memory(name),
        };
        let pool = Rc::new(pool);
        self.pools
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&pool));
        Ok(pool)
    }

    /// Total deferred writes across all opened pools.
    pub fn pending(&self) -> usize {
        self.pools.borrow().values().map(|p| p.pending()).sum()
    }

    /// Commit every opened pool. All pools are attempted; the first error is
    /// returned.
    pub fn commit_all(&self) -> Result<(), CacheError> {
        let pools: Vec<_> = self.pools.borrow().values().cloned().collect();
        let mut first_error = None;
        for pool in pools {
            if let Err(err) = pool.commit() {
                log::warn!("committing cache pool {} failed: {}", pool.name(), err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn pool_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// Get the default cache directory path
pub fn cache_dir() -> Result<PathBuf, CacheError> {
    // Check XDG_CACHE_HOME first
    if let Some(dir) = env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::cache_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    // Fallback to ~/.cache
    dirs::home_dir()
        .map(|home| home.join(".cache").join(APP_NAME))
        .ok_or(CacheError::NoCacheDir)
}

/// Remove all persisted pools below `dir`
pub fn clear_cache(dir: &Path) -> Result<(), CacheError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|source| CacheError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Status of the persisted pools below a cache directory
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cache_dir: PathBuf,
    pub pools: Vec<PoolStatus>,
    pub total_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub name: String,
    pub path: PathBuf,
    /// Entries still within their TTL
    pub live: usize,
    pub expired: usize,
    pub size_bytes: u64,
    pub oldest_age_secs: Option<u64>,
    /// Time until the next live entry expires
    pub next_expiry_secs: Option<u64>,
    pub server_url: String,
}

/// Inspect the persisted pools below `dir`
pub fn cache_status(dir: &Path) -> Result<CacheStatus, CacheError> {
    let mut pools = Vec::new();
    for name in pools::ALL {
        if let Some(status) = pool_status(dir, name)? {
            pools.push(status);
        }
    }
    let total_size_bytes = pools.iter().map(|p| p.size_bytes).sum();

    Ok(CacheStatus {
        cache_dir: dir.to_path_buf(),
        pools,
        total_size_bytes,
    })
}

fn pool_status(dir: &Path, name: &str) -> Result<Option<PoolStatus>, CacheError> {
    let path = pool_path(dir, name);
    if !path.exists() {
        return Ok(None);
    }

    let io_err = |source| CacheError::Io {
        path: path.clone(),
        source,
    };
    let metadata = fs::metadata(&path).map_err(io_err)?;
    let content = fs::read_to_string(&path).map_err(io_err)?;
    let file: PoolFile = serde_json::from_str(&content).map_err(|source| CacheError::Decode {
        pool: name.to_string(),
        key: String::new(),
        source,
    })?;

    let live = file.entries.values().filter(|e| e.is_valid()).count();
    Ok(Some(PoolStatus {
        name: name.to_string(),
        path: path.clone(),
        live,
        expired: file.entries.len() - live,
        size_bytes: metadata.len(),
        oldest_age_secs: file.entries.values().map(|e| e.age().as_secs()).max(),
        next_expiry_secs: file
            .entries
            .values()
            .filter_map(|e| e.expires_in())
            .map(|d| d.as_secs())
            .min(),
        server_url: file.server_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SERVER: &str = "https://ccu3-webui:2122";

    #[test]
    fn test_cache_entry_validity() {
        let entry = CacheEntry::new(json!("test"), Duration::from_secs(60));
        assert!(entry.is_valid());
        assert!(entry.age().as_secs() < 2);
        assert!(entry.expires_in().is_some());
    }

    #[test]
    fn test_cache_entry_expiry() {
        let mut entry = CacheEntry::new(json!("test"), Duration::from_secs(0));
        entry.stored_at = 0;
        assert!(!entry.is_valid());
        assert!(entry.expires_in().is_none());
    }

    #[test]
    fn test_deferred_visible_before_commit() {
        let pool = CachePool::in_memory("roomData");
        assert!(!pool.has("1234").unwrap());

        pool.save_deferred("1234", &json!({"name": "Kitchen"}), ttl::STRUCTURE)
            .unwrap();
        assert!(pool.has("1234").unwrap());
        assert_eq!(pool.pending(), 1);

        let value: Value = pool.get("1234").unwrap().unwrap();
        assert_eq!(value["name"], "Kitchen");

        pool.commit().unwrap();
        assert_eq!(pool.pending(), 0);
        assert!(pool.has("1234").unwrap());
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let pool = CachePool::in_memory("parameters");
        let mut entry = CacheEntry::new(json!(1), ttl::STATE);
        entry.stored_at = 0;
        pool.committed.borrow_mut().insert("A/1/STATE".to_string(), entry);

        assert!(!pool.has("A/1/STATE").unwrap());
        assert!(pool.get::<Value>("A/1/STATE").unwrap().is_none());
    }

    #[test]
    fn test_invalid_key() {
        let pool = CachePool::in_memory("deviceData");
        assert!(matches!(pool.has(""), Err(CacheError::InvalidKey { .. })));
        assert!(matches!(
            pool.save_deferred("a\nb", &1, ttl::STATE),
            Err(CacheError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_decode_error_surfaces() {
        let pool = CachePool::in_memory("deviceData");
        pool.save_deferred("x", &"not a number", ttl::STATE).unwrap();
        assert!(matches!(pool.get::<u32>("x"), Err(CacheError::Decode { .. })));
    }

    #[test]
    fn test_persistent_commit_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let store = CacheStore::persistent(dir.path(), SERVER);
        let pool = store.pool(pools::DEVICE_DATA).unwrap();
        pool.save_deferred("ABC", &json!({"name": "Switch"}), ttl::STRUCTURE)
            .unwrap();
        assert!(!pool_path(dir.path(), pools::DEVICE_DATA).exists());
        store.commit_all().unwrap();
        assert!(pool_path(dir.path(), pools::DEVICE_DATA).exists());

        let reopened = CacheStore::persistent(dir.path(), SERVER);
        let value: Value = reopened
            .pool(pools::DEVICE_DATA)
            .unwrap()
            .get("ABC")
            .unwrap()
            .unwrap();
        assert_eq!(value["name"], "Switch");
    }

    #[test]
    fn test_uncommitted_writes_are_lost() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = CacheStore::persistent(dir.path(), SERVER);
            let pool = store.pool(pools::PARAMETERS).unwrap();
            pool.save_deferred("A/1/STATE", &json!(true), ttl::STATE).unwrap();
        }

        let store = CacheStore::persistent(dir.path(), SERVER);
        assert!(!store.pool(pools::PARAMETERS).unwrap().has("A/1/STATE").unwrap());
    }

    #[test]
    fn test_immediate_save_persists() {
        let dir = tempfile::tempdir().unwrap();

        let store = CacheStore::persistent(dir.path(), SERVER);
        store
            .pool(pools::ROOM_NAMES)
            .unwrap()
            .save("namesToIds", &json!({"kitchen": 1234}), ttl::NAMES)
            .unwrap();

        let reopened = CacheStore::persistent(dir.path(), SERVER);
        assert!(reopened
            .pool(pools::ROOM_NAMES)
            .unwrap()
            .has("namesToIds")
            .unwrap());
    }

    #[test]
    fn test_other_server_is_ignored() {
        let dir = tempfile::tempdir().unwrap();

        let store = CacheStore::persistent(dir.path(), SERVER);
        store
            .pool(pools::ROOM_DATA)
            .unwrap()
            .save("1", &json!({}), ttl::STRUCTURE)
            .unwrap();

        let other = CacheStore::persistent(dir.path(), "https://other:2122");
        assert!(!other.pool(pools::ROOM_DATA).unwrap().has("1").unwrap());
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(pool_path(dir.path(), pools::ROOM_DATA), "{not json").unwrap();

        let store = CacheStore::persistent(dir.path(), SERVER);
        assert!(!store.pool(pools::ROOM_DATA).unwrap().has("1").unwrap());
    }

    #[test]
    fn test_store_reuses_opened_pools() {
        let store = CacheStore::in_memory();
        let pool = store.pool(pools::VARIABLES).unwrap();
        assert!(Rc::ptr_eq(&pool, &store.pool(pools::VARIABLES).unwrap()));

        pool.save_deferred("42", &json!(1), ttl::STATE).unwrap();
        assert_eq!(store.pending(), 1);
        store.commit_all().unwrap();
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_cache_status_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("hmip");

        let store = CacheStore::persistent(&cache, SERVER);
        let pool = store.pool(pools::DEVICE_DATA).unwrap();
        pool.save("A", &json!({}), ttl::STRUCTURE).unwrap();
        pool.save("B", &json!({}), ttl::STRUCTURE).unwrap();

        let status = cache_status(&cache).unwrap();
        assert_eq!(status.pools.len(), 1);
        assert_eq!(status.pools[0].name, pools::DEVICE_DATA);
        assert_eq!(status.pools[0].live, 2);
        let next_expiry = status.pools[0].next_expiry_secs.unwrap();
        assert!(next_expiry <= ttl::STRUCTURE.as_secs());
        assert!(next_expiry > ttl::STATE.as_secs());
        assert_eq!(status.pools[0].server_url, SERVER);
        assert!(status.total_size_bytes > 0);

        clear_cache(&cache).unwrap();
        assert!(!cache.exists());
        assert!(cache_status(&cache).unwrap().pools.is_empty());
    }

    #[test]
    fn test_cache_dir() {
        let dir = cache_dir().unwrap();
        assert!(dir.to_string_lossy().contains("hmip"));
    }
}
