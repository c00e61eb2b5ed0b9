//! File-backed TTL cache for provider credentials and tokens
//!
//! Entries are kept in memory and mirrored to a JSON file of the form
//! `{ key: { value, expiresAt } }`. Mutations mark the cache dirty and
//! schedule a single debounced flush; further mutations while a flush is
//! pending ride along with it. [`CredentialCache::shutdown`] writes any
//! remaining changes synchronously.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;

/// A cached value and its absolute expiry in epoch milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub expires_at: i64,
}

impl CacheEntry {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

struct Inner {
    path: Option<PathBuf>,
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
    debounce: Duration,
    dirty: AtomicBool,
    flush_pending: AtomicBool,
    /// Serializes file writes
    write_lock: tokio::sync::Mutex<()>,
}

/// Shared handle to the cache
#[derive(Clone)]
pub struct CredentialCache {
    inner: Arc<Inner>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl CredentialCache {
    fn with_entries(
        path: Option<PathBuf>,
        entries: DashMap<String, CacheEntry>,
        default_ttl: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                entries,
                default_ttl,
                debounce,
                dirty: AtomicBool::new(false),
                flush_pending: AtomicBool::new(false),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Cache that never touches the filesystem
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::with_entries(None, DashMap::new(), default_ttl, Duration::ZERO)
    }

    /// Open a cache backed by `path`, loading unexpired entries if it exists
    pub async fn open(
        path: impl Into<PathBuf>,
        default_ttl: Duration,
        debounce: Duration,
    ) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = DashMap::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                let stored: BTreeMap<String, CacheEntry> = serde_json::from_slice(&bytes)?;
                let now = now_ms();
                for (key, entry) in stored {
                    if !entry.is_expired(now) {
                        entries.insert(key, entry);
                    }
                }
                tracing::info!("Loaded {} cache entries from {}", entries.len(), path.display());
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache file at {}, starting empty", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self::with_entries(Some(path), entries, default_ttl, debounce))
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Fetch and deserialize an unexpired value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = now_ms();
        let value = {
            let entry = self.inner.entries.get(key)?;
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        };

        match value {
            Some(value) => serde_json::from_value(value).ok(),
            None => {
                let evicted = self
                    .inner
                    .entries
                    .remove_if(key, |_, entry| entry.is_expired(now));
                if evicted.is_some() {
                    self.mark_dirty();
                }
                None
            }
        }
    }

    /// Store a value with the default TTL
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.set_with_ttl(key, value, self.inner.default_ttl)
    }

    pub fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry {
            value: serde_json::to_value(value)?,
            expires_at: now_ms().saturating_add(ttl_ms),
        };
        self.inner.entries.insert(key.to_string(), entry);
        self.mark_dirty();
        Ok(())
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.entries.remove(key).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = now_ms();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.inner.entries.len());
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    fn mark_dirty(&self) {
        if self.inner.path.is_none() {
            return;
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.schedule_flush();
    }

    /// Schedule one debounced flush unless one is already pending
    fn schedule_flush(&self) {
        if self.inner.flush_pending.swap(true, Ordering::SeqCst) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime to flush on; shutdown() picks the changes up
            self.inner.flush_pending.store(false, Ordering::SeqCst);
            return;
        };

        let cache = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(cache.inner.debounce).await;
            cache.inner.flush_pending.store(false, Ordering::SeqCst);
            if let Err(e) = cache.flush().await {
                tracing::warn!("Failed to flush cache: {}", e);
            }
        });
    }

    /// Write the cache to disk if it has unsaved changes
    pub async fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = self.inner.path.as_ref() else {
            return Ok(());
        };

        let _guard = self.inner.write_lock.lock().await;
        if !self.inner.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let now = now_ms();
        let snapshot: BTreeMap<String, CacheEntry> = self
            .inner
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        if let Err(e) = write_atomic(path, &snapshot).await {
            self.inner.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }

        tracing::debug!("Flushed {} cache entries to {}", snapshot.len(), path.display());
        Ok(())
    }

    /// Flush pending changes before the process exits
    pub async fn shutdown(&self) -> Result<(), CacheError> {
        if self.is_dirty() {
            tracing::info!("Flushing cache before shutdown");
        }
        self.flush().await
    }
}

async fn write_atomic(path: &Path, snapshot: &BTreeMap<String, CacheEntry>) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
