//! Payload file reader. One record per non-empty line, cells split on commas.

use std::io;
use std::path::Path;

use rollcall_core::Record;

/// Read the payload file. A missing file is `Ok(None)`.
pub fn read_payload(path: &Path) -> io::Result<Option<Vec<Record>>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(parse_payload(&text))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn parse_payload(text: &str) -> Vec<Record> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}
