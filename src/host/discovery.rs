//! C7: engine discovery.

use std::io;
use std::path::Path;

/// Returns the names (not full paths) of entries in `dir`, excluding `.`
/// and `..`. No check is made that an entry is executable; a misnamed
/// entry only surfaces as a start-time failure when [`crate::host::Session::start`]
/// tries to spawn it.
pub fn list_engines(dir: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
