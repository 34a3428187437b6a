use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::Result;

/// Write `content` atomically: write a sibling `.tmp` file, then rename it
/// over `path`. Readers always see either the old or the new file.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
///
/// `serde_json` keeps non-ASCII text unescaped, so mapping files stay
/// readable in an editor.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    atomic_write(path, &json)
}

/// Read a JSON file, returning `T::default()` when the file is missing,
/// empty or unparseable. Corrupt files are logged, never propagated.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable file, treating as empty");
            return T::default();
        }
    };
    if contents.trim().is_empty() {
        return T::default();
    }
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt JSON file, treating as empty");
            T::default()
        }
    }
}
