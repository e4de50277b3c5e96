//! Merged persistence for agent state files.
//!
//! Writes never replace a file wholesale: the existing TOML table is read,
//! the given keys are overwritten in place, and the result is written back.

use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::config::ConfigError;

pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Expand a leading `~` and normalize `\` separators to `/`.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.replace('\\', "/");
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// True if two user-supplied paths name the same location after expansion.
pub fn same_path(a: &str, b: &str) -> bool {
    expand_home(a) == expand_home(b)
}

/// Merge `updates` into the TOML table stored at `path`.
///
/// A missing file, or one that does not parse as a table, is treated as
/// empty. Parent directories are created.
pub fn merge_into_file(path: &Path, updates: &Table) -> Result<(), ConfigError> {
    let mut table = match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str::<Table>(&text).unwrap_or_default(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::new(),
        Err(e) => return Err(ConfigError::ReadFailed(path.to_path_buf(), e)),
    };

    for (key, value) in updates {
        table.insert(key.clone(), value.clone());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
    }
    let text = toml::to_string_pretty(&table).map_err(ConfigError::SerializeFailed)?;
    std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
}

/// Build an update table from string pairs.
pub fn string_table<'a, I>(pairs: I) -> Table
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
