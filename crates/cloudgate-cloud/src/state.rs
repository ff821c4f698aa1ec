//! Resource record store
//!
//! Locally persisted records that map the exposed API's identifiers onto
//! backend objects. Every record carries an opaque durable id, assigned on
//! creation, and a kind discriminator (`eipalloc`, `eni`, ...).
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: process-local, used by tests and embedders
//! - [`FileStore`]: the `<state_dir>/state.json` file, with a backup of the
//!   previous version and an exclusive lock file held during mutations

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_TEMP: &str = "state.json.tmp";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY_INITIAL: Duration = Duration::from_millis(5);
const LOCK_RETRY_MAX: Duration = Duration::from_millis(200);

/// A stored record in its untyped form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Durable id, unique across all kinds
    pub id: u64,

    /// Resource kind discriminator
    pub kind: String,

    /// Kind-specific fields
    pub data: serde_json::Value,
}

/// CRUD contract over locally persisted records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record and assign its durable id
    async fn add(&self, kind: &str, data: serde_json::Value) -> Result<Item>;

    /// Get a record of the given kind by durable id
    async fn get(&self, kind: &str, id: u64) -> Result<Option<Item>>;

    /// Get all records of a kind, optionally restricted to the given ids.
    /// Ids without a record are silently absent from the result.
    async fn get_all(&self, kind: &str, ids: Option<&[u64]>) -> Result<Vec<Item>>;

    /// Replace the fields of an existing record
    async fn update(&self, item: &Item) -> Result<()>;

    /// Delete a record by durable id
    async fn delete(&self, id: u64) -> Result<()>;

    /// Re-insert a previously deleted record verbatim, keeping its durable id
    async fn restore(&self, item: &Item) -> Result<()>;
}

/// A typed record body with a fixed kind
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;
}

/// A typed record: durable id plus body
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: u64,
    pub body: T,
}

impl<T: Resource> Record<T> {
    pub fn new(id: u64, body: T) -> Self {
        Self { id, body }
    }

    pub fn from_item(item: Item) -> Result<Self> {
        if item.kind != T::KIND {
            return Err(CloudError::StateError(format!(
                "Record {} has kind '{}', expected '{}'",
                item.id,
                item.kind,
                T::KIND
            )));
        }
        Ok(Self {
            id: item.id,
            body: serde_json::from_value(item.data)?,
        })
    }

    pub fn to_item(&self) -> Result<Item> {
        Ok(Item {
            id: self.id,
            kind: T::KIND.to_string(),
            data: serde_json::to_value(&self.body)?,
        })
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.body
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.body
    }
}

/// Typed access on top of any [`RecordStore`]
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn add_record<T: Resource>(&self, body: T) -> Result<Record<T>> {
        let data = serde_json::to_value(&body)?;
        let item = self.add(T::KIND, data).await?;
        Ok(Record::new(item.id, body))
    }

    async fn get_record<T: Resource>(&self, id: u64) -> Result<Option<Record<T>>> {
        match self.get(T::KIND, id).await? {
            Some(item) => Ok(Some(Record::from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn get_records<T: Resource>(&self, ids: Option<&[u64]>) -> Result<Vec<Record<T>>> {
        self.get_all(T::KIND, ids)
            .await?
            .into_iter()
            .map(Record::from_item)
            .collect()
    }

    async fn update_record<T: Resource>(&self, record: &Record<T>) -> Result<()> {
        self.update(&record.to_item()?).await
    }

    async fn restore_record<T: Resource>(&self, record: &Record<T>) -> Result<()> {
        self.restore(&record.to_item()?).await
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

/// The full set of records, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Records indexed by durable id
    pub items: BTreeMap<u64, Item>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            items: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an unused durable id that fits the 8-hex-digit exposed form
    fn next_id(&self) -> u64 {
        let mut rng = rand::thread_rng();
        loop {
            let id = rng.gen_range(1..=u64::from(u32::MAX));
            if !self.items.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn insert_new(&mut self, kind: &str, data: serde_json::Value) -> Item {
        let item = Item {
            id: self.next_id(),
            kind: kind.to_string(),
            data,
        };
        self.items.insert(item.id, item.clone());
        self.updated_at = Utc::now();
        item
    }

    pub fn get(&self, kind: &str, id: u64) -> Option<&Item> {
        self.items.get(&id).filter(|item| item.kind == kind)
    }

    pub fn list(&self, kind: &str, ids: Option<&[u64]>) -> Vec<Item> {
        self.items
            .values()
            .filter(|item| item.kind == kind)
            .filter(|item| ids.is_none_or(|ids| ids.contains(&item.id)))
            .cloned()
            .collect()
    }

    pub fn replace(&mut self, item: &Item) -> Result<()> {
        match self.items.get_mut(&item.id) {
            Some(existing) if existing.kind == item.kind => {
                existing.data = item.data.clone();
                self.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(CloudError::ResourceNotFound(format!(
                "{} {}",
                item.kind, item.id
            ))),
        }
    }

    pub fn remove(&mut self, id: u64) -> Result<Item> {
        let item = self
            .items
            .remove(&id)
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))?;
        self.updated_at = Utc::now();
        Ok(item)
    }

    pub fn restore(&mut self, item: &Item) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(CloudError::ResourceAlreadyExists(item.id.to_string()));
        }
        self.items.insert(item.id, item.clone());
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory record store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<GlobalState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of all kinds
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every stored record
    pub async fn snapshot(&self) -> Vec<Item> {
        self.state.lock().await.items.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn add(&self, kind: &str, data: serde_json::Value) -> Result<Item> {
        let item = self.state.lock().await.insert_new(kind, data);
        tracing::debug!("Added {} record {}", kind, item.id);
        Ok(item)
    }

    async fn get(&self, kind: &str, id: u64) -> Result<Option<Item>> {
        Ok(self.state.lock().await.get(kind, id).cloned())
    }

    async fn get_all(&self, kind: &str, ids: Option<&[u64]>) -> Result<Vec<Item>> {
        Ok(self.state.lock().await.list(kind, ids))
    }

    async fn update(&self, item: &Item) -> Result<()> {
        self.state.lock().await.replace(item)
    }

    async fn delete(&self, id: u64) -> Result<()> {
        self.state.lock().await.remove(id).map(|_| ())
    }

    async fn restore(&self, item: &Item) -> Result<()> {
        self.state.lock().await.restore(item)
    }
}

/// Record store backed by a JSON state file
///
/// Mutations hold `lock.json` for their whole load-apply-save cycle, so
/// concurrent writers (tasks or processes) are serialised. Saves replace
/// `state.json` with a rename, so readers never see a partial file.
pub struct FileStore {
    /// Directory holding the state, backup and lock files
    state_dir: PathBuf,

    /// How long a writer waits for the lock before giving up
    lock_timeout: Duration,

    /// Serialises writers of this process before they contend on the lock file
    writer: Mutex<()>,
}

impl FileStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            lock_timeout: LOCK_TIMEOUT,
            writer: Mutex::new(()),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.state_dir.join(STATE_TEMP)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("State file not found, returning empty state");
                return Ok(GlobalState::new());
            }
            Err(e) => return Err(e.into()),
        };
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        Ok(state)
    }

    /// Save the state, keeping a copy of the previous file as a backup.
    ///
    /// The new content is written to a temporary file and renamed over
    /// `state.json`, which always holds a complete document.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.temp_path();

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;

        match fs::copy(&path, self.backup_path()).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        fs::rename(&temp, &path).await?;

        tracing::debug!("Saved state with {} records", state.items.len());
        Ok(())
    }

    /// Acquire the lock for exclusive access, waiting for a live holder
    /// up to the lock timeout
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let deadline = Instant::now() + self.lock_timeout;
        let mut delay = LOCK_RETRY_INITIAL;

        loop {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;

            match created {
                Ok(mut file) => {
                    let lock = StateLock {
                        lock_path,
                        released: false,
                    };
                    let lock_info = LockInfo {
                        holder: std::env::var("HOSTNAME")
                            .or_else(|_| std::env::var("HOST"))
                            .unwrap_or_else(|_| "unknown".to_string()),
                        acquired_at: Utc::now(),
                    };
                    file.write_all(&serde_json::to_vec_pretty(&lock_info)?).await?;
                    file.flush().await?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            let holder = match read_lock_info(&lock_path).await? {
                Some(holder) => holder,
                // Released between our attempt and the read
                None => continue,
            };

            // Locks older than an hour are considered abandoned
            let age = Utc::now().signed_duration_since(holder.acquired_at);
            if age.num_hours() >= 1 {
                tracing::warn!("Removing stale lock from {}", holder.holder);
                match fs::remove_file(&lock_path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            if Instant::now() >= deadline {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    holder.holder, holder.acquired_at
                )));
            }

            tracing::debug!("State is locked by {}, retrying in {:?}", holder.holder, delay);
            sleep(delay).await;
            delay = (delay * 2).min(LOCK_RETRY_MAX);
        }
    }

    /// Run a mutation under the lock: load, apply, save
    async fn mutate<F, R>(&self, apply: F) -> Result<R>
    where
        F: FnOnce(&mut GlobalState) -> Result<R> + Send,
        R: Send,
    {
        let _writer = self.writer.lock().await;
        let lock = self.acquire_lock().await?;

        let outcome = async {
            let mut state = self.load().await?;
            let value = apply(&mut state)?;
            self.save(&state).await?;
            Ok::<R, CloudError>(value)
        }
        .await;

        let released = lock.release().await;
        let value = outcome?;
        released?;
        Ok(value)
    }
}

/// Read the current lock holder, `None` when no lock file exists.
///
/// A lock file that is still being written has no parsable content yet;
/// its holder is reported as unknown with the file's modification time.
async fn read_lock_info(lock_path: &Path) -> Result<Option<LockInfo>> {
    let content = match fs::read_to_string(lock_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if let Ok(info) = serde_json::from_str::<LockInfo>(&content) {
        return Ok(Some(info));
    }

    let modified = match fs::metadata(lock_path).await {
        Ok(metadata) => metadata.modified()?,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(LockInfo {
        holder: "unknown".to_string(),
        acquired_at: DateTime::<Utc>::from(modified),
    }))
}

#[async_trait]
impl RecordStore for FileStore {
    async fn add(&self, kind: &str, data: serde_json::Value) -> Result<Item> {
        let item = self.mutate(|state| Ok(state.insert_new(kind, data))).await?;
        tracing::debug!("Added {} record {}", kind, item.id);
        Ok(item)
    }

    async fn get(&self, kind: &str, id: u64) -> Result<Option<Item>> {
        Ok(self.load().await?.get(kind, id).cloned())
    }

    async fn get_all(&self, kind: &str, ids: Option<&[u64]>) -> Result<Vec<Item>> {
        Ok(self.load().await?.list(kind, ids))
    }

    async fn update(&self, item: &Item) -> Result<()> {
        self.mutate(|state| state.replace(item)).await
    }

    async fn delete(&self, id: u64) -> Result<()> {
        self.mutate(|state| state.remove(id).map(|_| ())).await
    }

    async fn restore(&self, item: &Item) -> Result<()> {
        self.mutate(|state| state.restore(item)).await
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            match fs::remove_file(&self.lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Drop cannot await
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
