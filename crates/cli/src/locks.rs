//! Lock file guarding a project's checkpoint store
//!
//! The sled databases under `.keepsake/store` admit one process at a time.
//! The lock is an advisory `flock`, released by the kernel when the holder
//! exits, so there are no stale locks to reap.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive hold on a project's store
pub struct StoreLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    acquired_at: u64,
}

impl StoreLock {
    /// Acquire the store lock in `keepsake_dir/locks/store.lock`
    ///
    /// Fails without blocking if another process holds it.
    pub fn acquire(keepsake_dir: &Path) -> Result<Self> {
        let lock_path = keepsake_dir.join("locks").join("store.lock");

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create locks directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        if !try_flock_exclusive(&file)? {
            let holder = Self::read_lock_content(&mut file)
                .map(|content| format!(" (pid {})", content.pid))
                .unwrap_or_default();
            anyhow::bail!("Checkpoint store is in use by another ks process{}", holder);
        }

        Self::write_lock_content(&mut file)?;
        tracing::debug!(path = %lock_path.display(), "Acquired store lock");

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_lock_content(file: &mut File) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            acquired_at: chrono::Utc::now().timestamp_millis().max(0) as u64,
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).context("Failed to deserialize lock content")
    }
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();

        let first = StoreLock::acquire(temp_dir.path()).unwrap();
        let err = StoreLock::acquire(temp_dir.path()).err().unwrap();
        assert!(err.to_string().contains(&std::process::id().to_string()));

        drop(first);
        assert!(StoreLock::acquire(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_lock_records_holder() {
        let temp_dir = TempDir::new().unwrap();
        let lock = StoreLock::acquire(temp_dir.path()).unwrap();

        let mut file = File::open(lock.path()).unwrap();
        let content = StoreLock::read_lock_content(&mut file).unwrap();
        assert_eq!(content.pid, std::process::id());
        assert!(content.acquired_at > 0);
    }
}
