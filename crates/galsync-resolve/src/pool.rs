use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use galsync_core::storage::{load_snapshot, save_snapshot};
use galsync_core::{CandidatePool, PoolEntry};
use tracing::{info, warn};

use crate::error::Result;
use crate::store::RecordStore;

const REFRESH_ATTEMPTS: u32 = 3;

/// The session's candidate pool and its snapshot file.
///
/// Reads hand out clones so no lock is held across an await. Every
/// mutation rewrites the snapshot before returning.
pub struct SharedPool {
    pool: RwLock<CandidatePool>,
    snapshot_path: PathBuf,
    retry_delay: Duration,
}

impl SharedPool {
    pub fn new(pool: CandidatePool, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            pool: RwLock::new(pool),
            snapshot_path: snapshot_path.into(),
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Load from the snapshot file; missing or corrupt files give an empty pool.
    pub fn load(snapshot_path: impl Into<PathBuf>) -> Self {
        let path = snapshot_path.into();
        Self::new(load_snapshot(&path), path)
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn entries(&self) -> Vec<PoolEntry> {
        self.read().entries().to_vec()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove entries whose records no longer exist and rewrite the snapshot.
    pub fn prune(&self, ids: &HashSet<String>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut pool = self.write();
        let removed = pool.remove_ids(ids);
        if removed > 0 {
            save_snapshot(&self.snapshot_path, &pool)?;
            info!(removed, "pruned deleted records from the title pool");
        }
        Ok(removed)
    }

    /// Add a freshly created record and rewrite the snapshot.
    pub fn append(&self, entry: PoolEntry) -> Result<bool> {
        let mut pool = self.write();
        let added = pool.push(entry);
        if added {
            save_snapshot(&self.snapshot_path, &pool)?;
        }
        Ok(added)
    }

    pub fn flush(&self) -> Result<()> {
        save_snapshot(&self.snapshot_path, &self.read())?;
        Ok(())
    }

    /// Pull every title from the store, retrying with a growing delay.
    /// The snapshot is rewritten only when the content changed. Returns
    /// whether the pool was replaced; after the last failed attempt the
    /// local pool is kept.
    pub async fn refresh_from_store(&self, store: &dyn RecordStore) -> Result<bool> {
        for attempt in 1..=REFRESH_ATTEMPTS {
            match store.all_titles().await {
                Ok(entries) => {
                    let fresh = CandidatePool::new(entries);
                    let mut pool = self.write();
                    if fresh.content_hash() == pool.content_hash() {
                        info!(entries = pool.len(), "title pool already up to date");
                        return Ok(false);
                    }
                    *pool = fresh;
                    save_snapshot(&self.snapshot_path, &pool)?;
                    info!(entries = pool.len(), "title pool refreshed from store");
                    return Ok(true);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "title pool refresh failed");
                    if attempt < REFRESH_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }
        warn!("giving up on title pool refresh, keeping the local snapshot");
        Ok(false)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CandidatePool> {
        self.pool.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CandidatePool> {
        self.pool.write().unwrap_or_else(PoisonError::into_inner)
    }
}
