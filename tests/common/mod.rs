//! Common test utilities

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;
use zscp::error::SftpError;
use zscp::sftp::{RemoteEntry, RemoteFs};
use zscp::ssh::TransferSession;

/// Remote operation observed by [`LocalRootFs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Mkdir(String),
    Write(String),
    Read(String),
}

/// `RemoteFs` serving a local directory as the remote root.
///
/// Remote paths map below the root whether or not they start with `/`.
pub struct LocalRootFs {
    root: PathBuf,
    ops: Mutex<Vec<Op>>,
    deny_mkdir: HashSet<String>,
}

impl LocalRootFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ops: Mutex::new(Vec::new()),
            deny_mkdir: HashSet::new(),
        }
    }

    /// Make `create_dir(path)` fail
    pub fn deny_mkdir(mut self, path: &str) -> Self {
        self.deny_mkdir.insert(path.to_string());
        self
    }

    pub fn local_path(&self, remote: &str) -> PathBuf {
        let relative = remote.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

impl RemoteFs for LocalRootFs {
    type Reader = tokio::fs::File;
    type Writer = tokio::fs::File;

    async fn is_dir(&self, path: &str) -> Result<bool, SftpError> {
        tokio::fs::symlink_metadata(self.local_path(path))
            .await
            .map(|m| m.is_dir())
            .map_err(|e| SftpError::FileOperation(format!("{}: {}", path, e)))
    }

    async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        self.record(Op::Mkdir(path.to_string()));
        if self.deny_mkdir.contains(path) {
            return Err(SftpError::FileOperation(format!(
                "Failed to create directory {}: permission denied",
                path
            )));
        }
        tokio::fs::create_dir(self.local_path(path))
            .await
            .map_err(|e| SftpError::FileOperation(format!("{}: {}", path, e)))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, SftpError> {
        let mut read_dir = tokio::fs::read_dir(self.local_path(path))
            .await
            .map_err(|e| SftpError::FileOperation(format!("{}: {}", path, e)))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| SftpError::FileOperation(format!("{}: {}", path, e)))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SftpError::FileOperation(format!("{}: {}", path, e)))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(RemoteEntry {
                path: format!("{}/{}", path.trim_end_matches('/'), name),
                is_dir: file_type.is_dir(),
                is_symlink: file_type.is_symlink(),
                name,
            });
        }
        Ok(entries)
    }

    async fn open_read(&self, path: &str) -> Result<Self::Reader, SftpError> {
        self.record(Op::Read(path.to_string()));
        tokio::fs::File::open(self.local_path(path))
            .await
            .map_err(|e| {
                SftpError::Transfer(format!("error opening remote file [{}]: {}", path, e))
            })
    }

    async fn open_write(&self, path: &str) -> Result<Self::Writer, SftpError> {
        self.record(Op::Write(path.to_string()));
        tokio::fs::File::create(self.local_path(path))
            .await
            .map_err(|e| {
                SftpError::Transfer(format!("unable to open remote file [{}]: {}", path, e))
            })
    }
}

/// Session over a [`LocalRootFs`] that records whether it was closed
pub struct LocalSession {
    fs: LocalRootFs,
    closed: Arc<AtomicBool>,
}

impl LocalSession {
    /// The session and a flag that turns true once it is closed
    pub fn new(fs: LocalRootFs) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let session = Self {
            fs,
            closed: closed.clone(),
        };
        (session, closed)
    }
}

impl TransferSession for LocalSession {
    type Fs = LocalRootFs;

    fn remote_fs(&self) -> &LocalRootFs {
        &self.fs
    }

    async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Test environment with isolated local and "remote" directories
pub struct TestEnvironment {
    pub local_dir: TempDir,
    pub remote_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            local_dir: TempDir::new().expect("Failed to create temp dir"),
            remote_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn local(&self, relative: &str) -> PathBuf {
        self.local_dir.path().join(relative)
    }

    pub fn remote_fs(&self) -> LocalRootFs {
        LocalRootFs::new(self.remote_dir.path())
    }

    /// Write `content` at `relative` below `base`, creating parents
    pub fn write_file(base: &Path, relative: &str, content: &[u8]) -> PathBuf {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write fixture file");
        path
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
