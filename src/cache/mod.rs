//! Persistent response cache with a byte budget and per-entry expiry
//!
//! Values are stored one file per key inside the cache directory, the file
//! name being the SHA-256 of the key. An index (`index.json`) with sizes,
//! expiry times and access order is written on [`CacheStore::close`] and read
//! back by [`CacheStore::open`]. Every write is also appended to a journal
//! (`journal.jsonl`) that `open` replays, so entries written by a run that
//! never reached `close` are kept. When the stored bytes exceed the budget the
//! least recently used entries are evicted.
//!
//! Only files named like the store's own value files are ever removed, so the
//! cache directory may be shared with other files.
//!
//! The store is shared through an `Arc` and synchronizes internally, so
//! concurrent fetches never need to lock around it. Concurrent writes to the
//! same key resolve last-write-wins.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};

const INDEX_FILE: &str = "index.json";
const JOURNAL_FILE: &str = "journal.jsonl";

/// Whether `name` is a value file (or a partial write of one) of the store
fn is_store_file(name: &str) -> bool {
    let hash = match name.strip_suffix(".tmp") {
        Some(tmp) => tmp.split('.').next().unwrap_or_default(),
        None => name,
    };
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Index record for one cached value
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    file: String,
    size: u64,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

struct CacheState {
    /// key -> entry, most recently used first
    entries: LruCache<String, CacheEntry>,
    total_bytes: u64,
    closed: bool,
}

/// Size- and time-bounded on-disk key/value store
pub struct CacheStore {
    dir: PathBuf,
    size_limit: u64,
    state: Mutex<CacheState>,
    tmp_counter: AtomicU64,
}

/// Summary of the store contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub size_limit: u64,
}

impl CacheStore {
    /// Open (or create) the cache in `dir`, reloading a previous index
    pub async fn open<P: AsRef<Path>>(dir: P, size_limit: u64) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut state = CacheState {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            closed: false,
        };

        // Stored least recently used first
        let index_path = dir.join(INDEX_FILE);
        if fs::try_exists(&index_path).await? {
            match fs::read(&index_path).await {
                Ok(bytes) => match serde_json::from_slice::<Vec<CacheEntry>>(&bytes) {
                    Ok(stored) => Self::restore(&dir, &mut state, stored).await,
                    Err(e) => warn!("Ignoring unreadable cache index {}: {}", index_path.display(), e),
                },
                Err(e) => warn!("Failed to read cache index {}: {}", index_path.display(), e),
            }
        }

        // Writes of a run that did not close the store
        let journal_path = dir.join(JOURNAL_FILE);
        let replay = fs::try_exists(&journal_path).await?;
        if replay {
            match fs::read_to_string(&journal_path).await {
                Ok(journal) => {
                    let written: Vec<CacheEntry> = journal
                        .lines()
                        .filter_map(|line| serde_json::from_str(line).ok())
                        .collect();
                    debug!("Replaying {} cache journal records", written.len());
                    Self::restore(&dir, &mut state, written).await;
                }
                Err(e) => warn!("Failed to read cache journal {}: {}", journal_path.display(), e),
            }
        }

        let store = Self {
            dir,
            size_limit,
            state: Mutex::new(state),
            tmp_counter: AtomicU64::new(0),
        };

        store.remove_orphans().await?;
        {
            let mut state = store.state.lock().await;
            store.evict_to_budget(&mut state).await;
            if replay {
                store.write_index(&state).await?;
                store.remove_file(JOURNAL_FILE).await;
            }
        }

        let stats = store.stats().await;
        info!(
            "Cache opened at {}: {} entries, {:.1}MB of {:.1}MB",
            store.dir.display(),
            stats.entries,
            stats.total_bytes as f64 / 1024.0 / 1024.0,
            stats.size_limit as f64 / 1024.0 / 1024.0
        );

        Ok(store)
    }

    /// Add live entries whose value file still exists, later records winning
    async fn restore(dir: &Path, state: &mut CacheState, records: Vec<CacheEntry>) {
        let now = Utc::now();
        for entry in records {
            if entry.is_expired(now) {
                continue;
            }
            if !fs::try_exists(dir.join(&entry.file)).await.unwrap_or(false) {
                continue;
            }
            state.total_bytes += entry.size;
            if let Some(old) = state.entries.put(entry.key.clone(), entry) {
                state.total_bytes -= old.size;
            }
        }
    }

    /// File name for a key
    fn file_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Value for `key`, or `None` when absent or expired
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = {
            let mut state = self.state.lock().await;
            if state.closed {
                return None;
            }

            let expired = match state.entries.peek(key) {
                None => return None,
                Some(entry) => entry.is_expired(Utc::now()),
            };
            if expired {
                if let Some(entry) = state.entries.pop(key) {
                    state.total_bytes -= entry.size;
                    self.remove_file(&entry.file).await;
                }
                return None;
            }

            // Promote to most recently used
            let entry = state.entries.get(key)?;
            self.dir.join(&entry.file)
        };

        match fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("Cache file {} unreadable: {}", path.display(), e);
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        let size = value.len() as u64;
        if size > self.size_limit {
            debug!(
                "Not caching {}: {} bytes exceed the cache budget",
                key, size
            );
            // The previous value no longer reflects the latest fetch
            let mut state = self.state.lock().await;
            if let Some(old) = state.entries.pop(key) {
                state.total_bytes -= old.size;
                self.remove_file(&old.file).await;
            }
            return Ok(());
        }

        let file = Self::file_name(key);
        let tmp_name = format!(
            "{}.{}.tmp",
            file,
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        );
        let tmp_path = self.dir.join(&tmp_name);
        fs::write(&tmp_path, value).await?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::internal(format!("Invalid cache ttl: {e}")))?;
        let entry = CacheEntry {
            key: key.to_string(),
            file: file.clone(),
            size,
            expires_at: Utc::now() + ttl,
        };

        let mut state = self.state.lock().await;
        if state.closed {
            self.remove_file(&tmp_name).await;
            return Ok(());
        }
        fs::rename(&tmp_path, self.dir.join(&file)).await?;
        self.append_journal(&entry).await?;

        state.total_bytes += size;
        if let Some(old) = state.entries.put(key.to_string(), entry) {
            state.total_bytes -= old.size;
        }
        self.evict_to_budget(&mut state).await;
        Ok(())
    }

    async fn append_journal(&self, entry: &CacheEntry) -> AppResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(JOURNAL_FILE))
            .await?;
        journal.write_all(&line).await?;
        journal.flush().await?;
        Ok(())
    }

    /// Purge every expired entry, returning how many were removed
    pub async fn expire(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = state.entries.pop(key) {
                state.total_bytes -= entry.size;
                self.remove_file(&entry.file).await;
            }
        }

        if !expired.is_empty() {
            debug!("Expired {} cache entries", expired.len());
        }
        expired.len()
    }

    /// Persist the index and stop serving requests
    pub async fn close(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        self.write_index(&state).await?;
        self.remove_file(JOURNAL_FILE).await;

        info!(
            "Cache closed: {} entries, {:.1}MB",
            state.entries.len(),
            state.total_bytes as f64 / 1024.0 / 1024.0
        );
        Ok(())
    }

    async fn write_index(&self, state: &CacheState) -> AppResult<()> {
        let stored: Vec<&CacheEntry> = state.entries.iter().rev().map(|(_, e)| e).collect();
        let bytes = serde_json::to_vec(&stored)?;
        fs::write(self.dir.join(INDEX_FILE), bytes).await?;
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            total_bytes: state.total_bytes,
            size_limit: self.size_limit,
        }
    }

    async fn evict_to_budget(&self, state: &mut CacheState) {
        while state.total_bytes > self.size_limit {
            let Some((key, entry)) = state.entries.pop_lru() else {
                break;
            };
            state.total_bytes -= entry.size;
            debug!("Evicted cache entry {} ({} bytes)", key, entry.size);
            self.remove_file(&entry.file).await;
        }
    }

    /// Delete value files and partial writes that no entry refers to
    async fn remove_orphans(&self) -> AppResult<()> {
        let known: HashSet<String> = {
            let state = self.state.lock().await;
            state.entries.iter().map(|(_, e)| e.file.clone()).collect()
        };

        let mut removed = 0usize;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().to_string();
            if !is_store_file(&name) || known.contains(&name) {
                continue;
            }
            if item.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                self.remove_file(&name).await;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Removed {} orphaned cache files", removed);
        }
        Ok(())
    }

    async fn remove_file(&self, file: &str) {
        if let Err(e) = fs::remove_file(self.dir.join(file)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove cache file {}: {}", file, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), 1024).await.unwrap();

        assert_eq!(cache.get("http://a").await, None);
        cache.set("http://a", b"payload", DAY).await.unwrap();
        assert_eq!(cache.get("http://a").await, Some(b"payload".to_vec()));

        cache.set("http://a", b"newer", DAY).await.unwrap();
        assert_eq!(cache.get("http://a").await, Some(b"newer".to_vec()));
        assert_eq!(cache.stats().await.total_bytes, 5);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), 1024).await.unwrap();

        cache.set("stale", b"x", Duration::ZERO).await.unwrap();
        cache.set("fresh", b"y", DAY).await.unwrap();

        assert_eq!(cache.get("stale").await, None);
        assert_eq!(cache.get("fresh").await, Some(b"y".to_vec()));
        assert_eq!(cache.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_expire_purges_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), 1024).await.unwrap();

        cache.set("a", b"1", Duration::ZERO).await.unwrap();
        cache.set("b", b"2", Duration::ZERO).await.unwrap();
        cache.set("c", b"3", DAY).await.unwrap();

        assert_eq!(cache.expire().await, 2);
        assert_eq!(cache.stats().await.entries, 1);
        assert!(!dir.path().join(CacheStore::file_name("a")).exists());
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), 10).await.unwrap();

        cache.set("a", b"aaaa", DAY).await.unwrap();
        cache.set("b", b"bbbb", DAY).await.unwrap();
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").await.is_some());
        cache.set("c", b"cccc", DAY).await.unwrap();

        assert!(cache.get("a").await.is_some());
        assert_eq!(cache.get("b").await, None);
        assert!(cache.get("c").await.is_some());
        assert!(cache.stats().await.total_bytes <= 10);
    }

    #[tokio::test]
    async fn test_oversized_value_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), 4).await.unwrap();

        cache.set("big", b"too large", DAY).await.unwrap();
        assert_eq!(cache.get("big").await, None);
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_oversized_overwrite_drops_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), 8).await.unwrap();

        cache.set("k", b"old", DAY).await.unwrap();
        cache.set("k", b"new value too large", DAY).await.unwrap();

        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.stats().await.total_bytes, 0);
        assert!(!dir.path().join(CacheStore::file_name("k")).exists());
    }

    #[tokio::test]
    async fn test_open_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("channels.json"), b"[]").unwrap();
        std::fs::write(dir.path().join("config.toml"), b"").unwrap();
        let orphan = CacheStore::file_name("orphan");
        std::fs::write(dir.path().join(&orphan), b"x").unwrap();
        std::fs::write(dir.path().join(format!("{orphan}.3.tmp")), b"x").unwrap();

        let cache = CacheStore::open(dir.path(), 1024).await.unwrap();
        cache.close().await.unwrap();

        assert!(dir.path().join("channels.json").exists());
        assert!(dir.path().join("config.toml").exists());
        assert!(!dir.path().join(&orphan).exists());
        assert!(!dir.path().join(format!("{orphan}.3.tmp")).exists());
    }

    #[tokio::test]
    async fn test_unclosed_run_keeps_its_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = CacheStore::open(dir.path(), 1024).await.unwrap();
            cache.set("a", b"first", DAY).await.unwrap();
            cache.close().await.unwrap();
        }
        {
            // Dropped without close, as when a run is killed
            let cache = CacheStore::open(dir.path(), 1024).await.unwrap();
            cache.set("b", b"second", DAY).await.unwrap();
            cache.set("a", b"updated", DAY).await.unwrap();
        }

        let cache = CacheStore::open(dir.path(), 1024).await.unwrap();
        assert_eq!(cache.get("a").await, Some(b"updated".to_vec()));
        assert_eq!(cache.get("b").await, Some(b"second".to_vec()));
        assert_eq!(cache.stats().await.total_bytes, 13);
        // Replayed records are folded into the index
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    #[test]
    fn test_store_file_names() {
        let hash = CacheStore::file_name("key");
        assert!(is_store_file(&hash));
        assert!(is_store_file(&format!("{hash}.0.tmp")));
        assert!(!is_store_file(INDEX_FILE));
        assert!(!is_store_file(JOURNAL_FILE));
        assert!(!is_store_file("channels.json"));
        assert!(!is_store_file(&hash.to_uppercase()));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = CacheStore::open(dir.path(), 1024).await.unwrap();
            cache.set("kept", b"value", DAY).await.unwrap();
            cache.set("dropped", b"value", Duration::ZERO).await.unwrap();
            cache.close().await.unwrap();
            assert_eq!(cache.get("kept").await, None, "closed store serves nothing");
        }

        let cache = CacheStore::open(dir.path(), 1024).await.unwrap();
        assert_eq!(cache.get("kept").await, Some(b"value".to_vec()));
        assert_eq!(cache.get("dropped").await, None);
        // The expired value file is swept as an orphan
        assert!(!dir.path().join(CacheStore::file_name("dropped")).exists());
    }

    #[tokio::test]
    async fn test_concurrent_writers_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(CacheStore::open(dir.path(), 1024).await.unwrap());

        let writes = (0..8u8).map(|i| {
            let cache = cache.clone();
            async move { cache.set("same", &[i; 4], DAY).await }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        let value = cache.get("same").await.unwrap();
        assert_eq!(value.len(), 4);
        assert!(value.iter().all(|b| *b == value[0]));
        assert_eq!(cache.stats().await.entries, 1);
    }
}
