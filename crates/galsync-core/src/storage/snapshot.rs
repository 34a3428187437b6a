use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::models::{CandidatePool, PoolEntry};
use crate::storage::json_file::{read_json_or_default, write_json_pretty};

/// Load the title snapshot (a JSON array of `{title, id, url?}`).
/// Missing or corrupt files yield an empty pool.
pub fn load_snapshot(path: &Path) -> CandidatePool {
    let entries: Vec<PoolEntry> = read_json_or_default(path);
    let pool = CandidatePool::new(entries);
    debug!(path = %path.display(), entries = pool.len(), "loaded title snapshot");
    pool
}

/// Atomically rewrite the snapshot with the pool's current entries.
pub fn save_snapshot(path: &Path, pool: &CandidatePool) -> Result<()> {
    write_json_pretty(path, &pool.entries())?;
    debug!(path = %path.display(), entries = pool.len(), "wrote title snapshot");
    Ok(())
}
