//! Per-batch scratch directory for document bytes moving to and from the
//! vendor adapters. Created before processing, removed on drop so every
//! exit path cleans up.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a unique scratch directory for one batch run under
    /// `<data_dir>/staging/`.
    pub fn create(data_dir: &str, token: &str) -> io::Result<Self> {
        let path = Path::new(data_dir)
            .join("staging")
            .join(format!("{token}-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage a file and return its full path.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let file_path = self.path.join(name);
        fs::write(&file_path, bytes)?;
        Ok(file_path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        // Best effort; a leftover scratch directory is not worth failing an
        // already-unwinding batch for.
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), ?err, "failed to remove staging directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_and_removes_directory() {
        let td = tempdir().unwrap();
        let data_dir = td.path().to_string_lossy().to_string();
        let staged_path;
        {
            let staging = StagingDir::create(&data_dir, "tok-1").unwrap();
            staged_path = staging.path().to_path_buf();
            assert!(staged_path.exists());
            let file = staging.write_file("doc.bin", b"bytes").unwrap();
            assert_eq!(fs::read(file).unwrap(), b"bytes");
        }
        assert!(!staged_path.exists());
    }

    #[test]
    fn two_runs_for_one_token_do_not_collide() {
        let td = tempdir().unwrap();
        let data_dir = td.path().to_string_lossy().to_string();
        let a = StagingDir::create(&data_dir, "tok-1").unwrap();
        let b = StagingDir::create(&data_dir, "tok-1").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
