//! Merge store: one CSV table, keyed by trade date, at most one commit per key
//!
//! Every strategy funnels its results through [`MergeStore::commit`]. The
//! store's mutual exclusion is an advisory exclusive lock on the store file
//! itself, which is valid across threads, coroutines and separate OS
//! processes, so one discipline serves all three concurrency models. The
//! check-then-append sequence runs entirely under the lock: two isolated
//! workers that both fetched the same trade date (a weekend request and the
//! following Monday both resolve to Friday) can never both observe "absent"
//! and double-write.
//!
//! Rows are durable before the lock is released; nothing is buffered across
//! commits.

use crate::dates::DateKey;
use crate::error::{Result, StoreError};
use crate::parse::ParsedRecord;
use fs2::FileExt;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Scoped exclusive lock over the store file
///
/// Released on drop, so every exit path out of a commit — including parse or
/// append failures — gives the lock back.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> std::result::Result<Self, StoreError> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::Lock {
                path: path.to_path_buf(),
                source: e,
            })?;
        file.lock_exclusive().map_err(|e| StoreError::Lock {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Date-keyed append-only CSV store
///
/// Cheap to clone; every handle points at the same file and the same lock.
#[derive(Debug, Clone)]
pub struct MergeStore {
    path: PathBuf,
}

impl MergeStore {
    /// Create a handle over the store file at `path`
    ///
    /// The file is created lazily on first commit; a pre-existing file is
    /// appended to, never truncated.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commit the rows for one trade date, exactly once per key
    ///
    /// Acquires the store lock, re-reads the persisted keys, and either
    /// appends the rows (flushing and syncing before release) or discards
    /// them if the key is already present. Returns the number of rows
    /// actually written — 0 for the discard case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lock cannot be taken or the file cannot
    /// be read or appended. Duplicate keys are not an error.
    pub fn commit(&self, record: &ParsedRecord) -> Result<usize> {
        let lock = StoreLock::acquire(&self.path)?;

        if self.read_keys(&lock.file)?.contains(&record.trade_date) {
            tracing::debug!(
                trade_date = %record.trade_date,
                "trade date already committed, discarding"
            );
            return Ok(0);
        }

        self.append(&lock.file, record)?;
        tracing::info!(
            trade_date = %record.trade_date,
            rows = record.rows.len(),
            "committed rows"
        );
        Ok(record.rows.len())
    }

    /// Snapshot of every trade date currently persisted
    ///
    /// Takes the store lock for a consistent read; used by the rank
    /// coordinator's dedup pass and by tests.
    pub fn committed_dates(&self) -> Result<BTreeSet<DateKey>> {
        let lock = StoreLock::acquire(&self.path)?;
        Ok(self.read_keys(&lock.file)?)
    }

    fn read_keys(&self, file: &File) -> std::result::Result<BTreeSet<DateKey>, StoreError> {
        let mut handle = file;
        handle
            .seek(SeekFrom::Start(0))
            .map_err(|e| StoreError::Read {
                path: self.path.clone(),
                source: e.into(),
            })?;

        // rows from different trade dates may have different widths
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(handle);

        let mut keys = BTreeSet::new();
        for result in reader.records() {
            let record = result.map_err(|e| StoreError::Read {
                path: self.path.clone(),
                source: e,
            })?;
            if let Some(Ok(key)) = record.get(0).map(DateKey::parse) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }

    fn append(&self, file: &File, record: &ParsedRecord) -> std::result::Result<(), StoreError> {
        let mut handle = file;
        handle.seek(SeekFrom::End(0)).map_err(|e| StoreError::Append {
            path: self.path.clone(),
            source: e.into(),
        })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(handle);

        let key = record.trade_date.to_string();
        for row in &record.rows {
            let mut line = Vec::with_capacity(row.len() + 1);
            line.push(key.as_str());
            line.extend(row.iter().map(String::as_str));
            writer.write_record(&line).map_err(|e| StoreError::Append {
                path: self.path.clone(),
                source: e,
            })?;
        }
        writer.flush().map_err(|e| StoreError::Append {
            path: self.path.clone(),
            source: e.into(),
        })?;
        drop(writer);

        // durable before the lock is released
        file.sync_all().map_err(|e| StoreError::Append {
            path: self.path.clone(),
            source: e.into(),
        })
    }
}

/// Delete every `*.csv` file directly under `dir`
///
/// The INIT-phase destructive cleanup behind the `--clean` flag. Per-file
/// removal failures are logged and skipped; only an unreadable directory is
/// fatal. Returns the number of files removed.
pub fn clean_outputs(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "removed output file");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
                }
            }
        }
    }
    Ok(removed)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(date: &str, rows: &[&[&str]]) -> ParsedRecord {
        ParsedRecord {
            trade_date: DateKey::parse(date).unwrap(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_commit_writes_rows_keyed_by_trade_date() {
        let dir = tempdir().unwrap();
        let store = MergeStore::new(dir.path().join("out.csv"));

        let written = store
            .commit(&record("20250408", &[&["MIX-6.25", "1000"], &["MIX-9.25", "250"]]))
            .unwrap();
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, "20250408,MIX-6.25,1000\n20250408,MIX-9.25,250\n");
    }

    #[test]
    fn test_second_commit_for_same_key_is_discarded() {
        let dir = tempdir().unwrap();
        let store = MergeStore::new(dir.path().join("out.csv"));

        let first = record("20250408", &[&["MIX-6.25", "1000"]]);
        assert_eq!(store.commit(&first).unwrap(), 1);

        let before = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(store.commit(&first).unwrap(), 0, "duplicate should be a no-op");
        let after = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(before, after, "duplicate commit must not touch the file");
    }

    #[test]
    fn test_distinct_keys_accumulate() {
        let dir = tempdir().unwrap();
        let store = MergeStore::new(dir.path().join("out.csv"));

        store.commit(&record("20250408", &[&["a", "1"]])).unwrap();
        store.commit(&record("20250409", &[&["b", "2"], &["c", "3"]])).unwrap();

        let keys: Vec<String> = store
            .committed_dates()
            .unwrap()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["20250408", "20250409"]);
    }

    #[test]
    fn test_pre_existing_store_is_appended_not_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "20250407,existing,9\n").unwrap();

        let store = MergeStore::new(&path);
        store.commit(&record("20250408", &[&["a", "1"]])).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("20250407,existing,9\n"));
        assert!(contents.contains("20250408,a,1\n"));
    }

    #[test]
    fn test_concurrent_commits_to_one_key_write_exactly_once() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MergeStore::new(dir.path().join("out.csv")));

        // every thread tries the same trade date with its own row count; the
        // winner's count is whatever ended up in the file
        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let rows: Vec<Vec<String>> = (0..n)
                        .map(|i| vec![format!("contract-{i}"), n.to_string()])
                        .collect();
                    let record = ParsedRecord {
                        trade_date: DateKey::parse("20250408").unwrap(),
                        rows,
                    };
                    store.commit(&record).unwrap()
                })
            })
            .collect();

        let counts: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let nonzero: Vec<usize> = counts.iter().copied().filter(|&c| c > 0).collect();
        assert_eq!(nonzero.len(), 1, "exactly one commit should win, got {counts:?}");

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let lines = contents.lines().count();
        assert_eq!(lines, nonzero[0], "file rows must match the single winner");
    }

    #[test]
    fn test_clean_outputs_removes_only_csv_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();
        std::fs::write(dir.path().join("b.csv"), "y").unwrap();
        std::fs::write(dir.path().join("keep.txt"), "z").unwrap();

        let removed = clean_outputs(dir.path()).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join("a.csv").exists());
    }
}
