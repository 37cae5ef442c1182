//! Lockfile registry: one discovery document per listening port.
//!
//! An agent finds a running session by scanning `<data-dir>/*.json`, then
//! connects to `127.0.0.1:<port>` and authenticates with `authToken`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use agentlink_protocol::LockfileDocument;
use tracing::{debug, warn};

use crate::error::LockfileError;
use crate::paths;

/// Write the lockfile for `doc.port`, replacing any previous one atomically.
///
/// The document is written to a hidden temp file next to the target and
/// renamed into place, so readers never observe a partial file.
pub fn write(data_dir: &Path, doc: &LockfileDocument) -> Result<PathBuf, LockfileError> {
    let path = paths::lockfile_path(data_dir, doc.port);
    let write_err = |source| LockfileError::Write {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(data_dir).map_err(write_err)?;

    let json = serde_json::to_vec_pretty(doc)?;
    let tmp_path = data_dir.join(format!(".{}.json.tmp", doc.port));
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&tmp_path)
        .map_err(write_err)?;
    file.write_all(&json).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&tmp_path, &path).map_err(write_err)?;

    debug!(
        component = "lockfile",
        event = "lockfile.written",
        path = %path.display(),
        port = doc.port,
        "Lockfile written"
    );
    Ok(path)
}

/// Remove the lockfile for `port`. A missing file is not an error.
///
/// Returns whether a file was actually removed.
pub fn remove(data_dir: &Path, port: u16) -> Result<bool, LockfileError> {
    let path = paths::lockfile_path(data_dir, port);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!(
                component = "lockfile",
                event = "lockfile.removed",
                path = %path.display(),
                "Lockfile removed"
            );
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(LockfileError::Remove { path, source }),
    }
}

/// Read every lockfile in `data_dir`. Unreadable or foreign files are skipped.
pub fn list(data_dir: &Path) -> Vec<(PathBuf, LockfileDocument)> {
    let Ok(entries) = fs::read_dir(data_dir) else {
        return Vec::new();
    };

    let mut docs: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|path| {
            let raw = fs::read_to_string(&path).ok()?;
            match serde_json::from_str::<LockfileDocument>(&raw) {
                Ok(doc) => Some((path, doc)),
                Err(e) => {
                    warn!(
                        component = "lockfile",
                        event = "lockfile.parse_failed",
                        path = %path.display(),
                        error = %e,
                        "Skipping unparsable lockfile"
                    );
                    None
                }
            }
        })
        .collect();
    docs.sort_by_key(|(_, doc)| doc.port);
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn doc(port: u16) -> LockfileDocument {
        LockfileDocument {
            workspace_folders: vec!["/home/dev/project".to_string()],
            port,
            ide_name: "agentlink".to_string(),
            auth_token: "0123456789abcdefghijABCDEFGHIJkl".to_string(),
            pid: std::process::id(),
        }
    }

    #[test]
    fn write_creates_directory_and_document() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("nested").join("ide");

        let path = write(&data_dir, &doc(41000)).unwrap();
        assert_eq!(path, data_dir.join("41000.json"));

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: LockfileDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, doc(41000));

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!data_dir.join(".41000.json.tmp").exists());
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), &doc(41001)).unwrap();

        assert!(remove(tmp.path(), 41001).unwrap());
        assert!(!tmp.path().join("41001.json").exists());
        assert!(!remove(tmp.path(), 41001).unwrap());
    }

    #[test]
    fn list_skips_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), &doc(41003)).unwrap();
        write(tmp.path(), &doc(41002)).unwrap();
        fs::write(tmp.path().join("garbage.json"), "{not json").unwrap();
        fs::write(tmp.path().join("notes.txt"), "hello").unwrap();

        let ports: Vec<u16> = list(tmp.path()).into_iter().map(|(_, d)| d.port).collect();
        assert_eq!(ports, vec![41002, 41003]);
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        assert!(list(Path::new("/definitely/not/a/dir")).is_empty());
    }
}
