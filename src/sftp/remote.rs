//! Remote filesystem access.

use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::client::fs::File;
use russh_sftp::protocol::OpenFlags;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::SftpError;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// Operations the transfer engine needs from the remote side.
///
/// Paths are POSIX strings as the server understands them.
#[allow(async_fn_in_trait)]
pub trait RemoteFs {
    type Reader: AsyncRead + Unpin;
    type Writer: AsyncWrite + Unpin;

    /// Whether `path` is a directory, without following a final symlink
    async fn is_dir(&self, path: &str) -> Result<bool, SftpError>;

    /// Create a single directory
    async fn create_dir(&self, path: &str) -> Result<(), SftpError>;

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, SftpError>;

    async fn open_read(&self, path: &str) -> Result<Self::Reader, SftpError>;

    /// Open for writing, creating or truncating
    async fn open_write(&self, path: &str) -> Result<Self::Writer, SftpError>;
}

/// Join a remote directory and a child name with `/`
pub fn join_remote(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Last component of a remote path, ignoring trailing slashes
pub fn remote_base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// SFTP-backed remote filesystem
pub struct SftpRemote {
    sftp: RusshSftpSession,
}

impl std::fmt::Debug for SftpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpRemote").finish_non_exhaustive()
    }
}

impl SftpRemote {
    pub fn new(sftp: RusshSftpSession) -> Self {
        Self { sftp }
    }

    pub async fn close(&self) -> Result<(), SftpError> {
        self.sftp.close().await.map_err(|e| {
            SftpError::ConnectionFailed(format!("Failed to close SFTP session: {}", e))
        })
    }
}

impl RemoteFs for SftpRemote {
    type Reader = File;
    type Writer = File;

    async fn is_dir(&self, path: &str) -> Result<bool, SftpError> {
        let metadata = self.sftp.symlink_metadata(path).await.map_err(|e| {
            SftpError::FileOperation(format!("Failed to get metadata for {}: {}", path, e))
        })?;
        Ok(metadata.is_dir())
    }

    async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        self.sftp.create_dir(path).await.map_err(|e| {
            SftpError::FileOperation(format!("Failed to create directory {}: {}", path, e))
        })
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, SftpError> {
        let read_dir = self.sftp.read_dir(path).await.map_err(|e| {
            SftpError::FileOperation(format!("Failed to read directory {}: {}", path, e))
        })?;

        let mut result = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let metadata = entry.metadata();
            result.push(RemoteEntry {
                path: join_remote(path, &name),
                is_dir: metadata.is_dir(),
                is_symlink: metadata.is_symlink(),
                name,
            });
        }

        Ok(result)
    }

    async fn open_read(&self, path: &str) -> Result<File, SftpError> {
        self.sftp.open(path).await.map_err(|e| {
            SftpError::Transfer(format!("error opening remote file [{}]: {}", path, e))
        })
    }

    async fn open_write(&self, path: &str) -> Result<File, SftpError> {
        self.sftp
            .open_with_flags(
                path,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .await
            .map_err(|e| {
                SftpError::Transfer(format!("unable to open remote file [{}]: {}", path, e))
            })
    }
}
