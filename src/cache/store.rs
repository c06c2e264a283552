use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Entry is being filled by another request")]
    Busy,

    #[error("Cache I/O error: {0}")]
    Io(#[from] io::Error),
}

const PARTIAL_SUFFIX: &str = ".part";

/// On-disk cache of fetched source images, one file per escaped source URL.
///
/// Entries are written to a `.part` sidecar first and renamed into place on
/// commit, so a partially written download is never visible under its final
/// name. The sidecar is created with exclusive-create semantics, which is
/// what keeps two concurrent misses for the same key from fetching twice.
pub struct FileCache {
    dir: PathBuf,
    max_bytes: u64,
    evicting: Arc<AtomicBool>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_bytes,
            evicting: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Path of the committed entry for `key`, if one exists.
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        let path = self.entry_path(key);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Claim the right to fill `key`.
    ///
    /// Fails with [`CacheError::Busy`] when another request (or instance)
    /// already holds the claim.
    pub async fn begin_fill(&self, key: &str) -> Result<PendingEntry, CacheError> {
        let partial = self.dir.join(format!("{}{}", key, PARTIAL_SUFFIX));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial)
            .await
        {
            Ok(file) => Ok(PendingEntry {
                file: Some(file),
                partial,
                dest: self.entry_path(key),
            }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(CacheError::Busy),
            Err(e) => Err(e.into()),
        }
    }

    /// Shrink the cache to the configured byte budget, oldest entries first.
    pub fn evict(&self) -> io::Result<EvictionStats> {
        evict_dir(&self.dir, self.max_bytes)
    }

    /// Trigger an eviction pass without blocking the caller.
    ///
    /// A single-slot flag keeps passes from overlapping; a trigger that
    /// arrives while one is running is dropped, the running pass already
    /// sees the new entry.
    pub fn spawn_evict(&self) {
        let flag = self.evicting.clone();
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let dir = self.dir.clone();
        let max_bytes = self.max_bytes;
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || evict_dir(&dir, max_bytes)).await;
            flag.store(false, Ordering::Release);
            match result {
                Ok(Ok(stats)) if stats.removed > 0 => info!(
                    "Evicted {} cache entries, freed {} bytes, {} bytes kept",
                    stats.removed, stats.freed, stats.kept
                ),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Cache eviction failed: {}", e),
                Err(e) => warn!("Cache eviction task failed: {}", e),
            }
        });
    }
}

/// An exclusive claim on an uncommitted cache entry.
///
/// Dropping the claim without committing removes the partial file.
pub struct PendingEntry {
    file: Option<tokio::fs::File>,
    partial: PathBuf,
    dest: PathBuf,
}

impl PendingEntry {
    pub fn writer(&mut self) -> &mut tokio::fs::File {
        self.file.as_mut().expect("pending entry already finalized")
    }

    /// Publish the fully written entry under its final name.
    pub async fn commit(mut self) -> Result<PathBuf, CacheError> {
        let result = self.finish().await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&self.partial).await;
        }
        result
    }

    async fn finish(&mut self) -> Result<PathBuf, CacheError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        tokio::fs::rename(&self.partial, &self.dest).await?;
        Ok(self.dest.clone())
    }

    /// Discard the partial write, releasing the claim.
    pub async fn abandon(mut self) {
        self.file.take();
        if let Err(e) = tokio::fs::remove_file(&self.partial).await {
            warn!(
                "Cannot remove partial cache file {}: {}",
                self.partial.display(),
                e
            );
        }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EvictionStats {
    pub removed: usize,
    pub freed: u64,
    pub kept: u64,
}

/// Delete the least recently modified files until the directory fits the
/// byte budget. Files that vanish mid-pass (another instance, a concurrent
/// pass) are skipped.
fn evict_dir(dir: &Path, max_bytes: u64) -> io::Result<EvictionStats> {
    let mut entries: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((entry.path(), mtime, meta.len()));
    }

    // Most recently modified first; keep the front, delete the back.
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let mut stats = EvictionStats::default();
    for (path, _, size) in entries {
        if stats.kept + size <= max_bytes {
            stats.kept += size;
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                stats.removed += 1;
                stats.freed += size;
                info!("Remove: {}", path.display());
            }
            Err(e) => debug!("Cannot remove {}: {}", path.display(), e),
        }
    }
    Ok(stats)
}
