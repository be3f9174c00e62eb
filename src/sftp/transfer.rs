//! Single-file and recursive transfers between the local filesystem and a
//! [`RemoteFs`].
//!
//! Directory creation on the destination is best effort: a failure is logged,
//! recorded in the summary and the walk continues. File transfers are not; the
//! first failed file aborts the whole transfer.
//!
//! Symlinks met during an upload walk are followed when they resolve to a
//! regular file. Links to directories, dangling links and other special files
//! are not copied; they are reported and listed in the summary.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, copy};
use walkdir::WalkDir;

use crate::endpoint::{TransferDirection, TransferRequest};
use crate::error::SftpError;

use super::remote::{RemoteFs, join_remote, remote_base_name};

/// What a transfer did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    /// Destination directories that could not be created
    pub skipped_directories: Vec<String>,
    /// Source entries that were not copied: directory links, dangling links
    /// and special files
    pub skipped_entries: Vec<String>,
}

/// Run the transfer described by `request`.
pub async fn execute<F: RemoteFs>(
    fs: &F,
    request: &TransferRequest,
    recursive: bool,
) -> Result<TransferSummary, SftpError> {
    let local_path = Path::new(&request.local_path);
    let remote_path = request.remote.path.as_str();

    match request.direction {
        TransferDirection::UploadToRemote => {
            let local_is_dir = tokio::fs::metadata(local_path)
                .await
                .map(|m| m.is_dir())
                .map_err(|e| {
                    SftpError::LocalIo(format!(
                        "unable to read local path {}: {}",
                        local_path.display(),
                        e
                    ))
                })?;

            if local_is_dir {
                if !recursive {
                    return Err(SftpError::LocalIo(format!(
                        "{} is a directory, pass -r to copy it",
                        local_path.display()
                    )));
                }
                return upload_recursive(fs, local_path, remote_path).await;
            }

            let destination = resolve_remote_destination(fs, remote_path, local_path).await?;
            let bytes = send_file(fs, local_path, &destination).await?;
            Ok(single_file(bytes))
        }
        TransferDirection::DownloadFromRemote => {
            let remote_is_dir = fs.is_dir(remote_path).await.unwrap_or(false);

            if remote_is_dir {
                if !recursive {
                    return Err(SftpError::Transfer(format!(
                        "{} is a directory, pass -r to copy it",
                        remote_path
                    )));
                }
                return download_recursive(fs, remote_path, local_path).await;
            }

            let destination = resolve_local_destination(local_path, remote_path);
            let bytes = retrieve_file(fs, remote_path, &destination).await?;
            Ok(single_file(bytes))
        }
    }
}

fn single_file(bytes: u64) -> TransferSummary {
    TransferSummary {
        files: 1,
        bytes,
        ..Default::default()
    }
}

/// Upload one file, buffering it fully in memory.
pub async fn send_file<F: RemoteFs>(
    fs: &F,
    local_path: &Path,
    remote_path: &str,
) -> Result<u64, SftpError> {
    let content = tokio::fs::read(local_path).await.map_err(|e| {
        SftpError::LocalIo(format!(
            "unable to read local file {}: {}",
            local_path.display(),
            e
        ))
    })?;

    let mut remote = fs.open_write(remote_path).await?;

    remote.write_all(&content).await.map_err(|e| {
        SftpError::Transfer(format!(
            "error writing {} to {}: {}",
            local_path.display(),
            remote_path,
            e
        ))
    })?;
    remote.shutdown().await.map_err(|e| {
        SftpError::Transfer(format!("error closing remote file {}: {}", remote_path, e))
    })?;

    tracing::info!("{} => {}", local_path.display(), remote_path);
    Ok(content.len() as u64)
}

/// Download one file, streaming it to disk.
pub async fn retrieve_file<F: RemoteFs>(
    fs: &F,
    remote_path: &str,
    local_path: &Path,
) -> Result<u64, SftpError> {
    let mut remote = fs.open_read(remote_path).await?;

    let mut local = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(local_path)
        .await
        .map_err(|e| {
            SftpError::LocalIo(format!(
                "error opening local file {}: {}",
                local_path.display(),
                e
            ))
        })?;

    let bytes = copy(&mut remote, &mut local).await.map_err(|e| {
        SftpError::Transfer(format!(
            "error copying remote file {} to {}: {}",
            remote_path,
            local_path.display(),
            e
        ))
    })?;
    local.flush().await.map_err(|e| {
        SftpError::LocalIo(format!(
            "error flushing local file {}: {}",
            local_path.display(),
            e
        ))
    })?;

    tracing::info!("{} => {}", remote_path, local_path.display());
    Ok(bytes)
}

/// Append the local base name when the remote path is blank or a directory.
pub async fn resolve_remote_destination<F: RemoteFs>(
    fs: &F,
    remote_path: &str,
    local_path: &Path,
) -> Result<String, SftpError> {
    let name = local_base_name(local_path)?;
    if remote_path.is_empty() {
        return Ok(name);
    }

    match fs.is_dir(remote_path).await {
        Ok(true) => Ok(join_remote(remote_path, &name)),
        Ok(false) => Ok(remote_path.to_string()),
        Err(e) => {
            tracing::debug!("Remote File/Directory: {} doesn't exist [{}]", remote_path, e);
            Ok(remote_path.to_string())
        }
    }
}

/// Append the remote base name when the local path is blank or a directory.
pub fn resolve_local_destination(local_path: &Path, remote_path: &str) -> PathBuf {
    let name = remote_base_name(remote_path);
    if local_path.as_os_str().is_empty() {
        return PathBuf::from(name);
    }
    if local_path.is_dir() && !name.is_empty() {
        return local_path.join(name);
    }
    local_path.to_path_buf()
}

/// Mirror `local_root` under `remote_root`, parents before children.
///
/// Every entry lands at `remote_root / basename(local_root) / relative_path`.
pub async fn upload_recursive<F: RemoteFs>(
    fs: &F,
    local_root: &Path,
    remote_root: &str,
) -> Result<TransferSummary, SftpError> {
    let destination_root = join_remote(remote_root, &local_base_name(local_root)?);
    let mut summary = TransferSummary::default();

    for entry in WalkDir::new(local_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SftpError::LocalIo(format!("error walking {}: {}", local_root.display(), e))
        })?;
        let relative = entry.path().strip_prefix(local_root).map_err(|e| {
            SftpError::LocalIo(format!("{}: {}", entry.path().display(), e))
        })?;
        let destination = join_relative(&destination_root, relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            match fs.create_dir(&destination).await {
                Ok(()) => {
                    tracing::debug!("made directory: {}", destination);
                    summary.directories += 1;
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    summary.skipped_directories.push(destination);
                }
            }
        } else if file_type.is_file() || resolves_to_file(entry.path(), file_type).await {
            summary.bytes += send_file(fs, entry.path(), &destination).await?;
            summary.files += 1;
        } else {
            tracing::warn!("Not copying {}: not a regular file", entry.path().display());
            summary.skipped_entries.push(entry.path().display().to_string());
        }
    }

    Ok(summary)
}

/// Whether a symlink points at a regular file
async fn resolves_to_file(path: &Path, file_type: std::fs::FileType) -> bool {
    if !file_type.is_symlink() {
        return false;
    }
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.is_file(),
        Err(e) => {
            tracing::debug!("Dangling link {}: {}", path.display(), e);
            false
        }
    }
}

/// Mirror the remote directory `remote_root` under `local_root`.
pub async fn download_recursive<F: RemoteFs>(
    fs: &F,
    remote_root: &str,
    local_root: &Path,
) -> Result<TransferSummary, SftpError> {
    let name = remote_base_name(remote_root);
    let destination = if name.is_empty() || name == "." {
        local_root.to_path_buf()
    } else {
        local_root.join(name)
    };

    let mut summary = TransferSummary::default();
    download_dir(fs, remote_root, &destination, &mut summary).await?;
    Ok(summary)
}

async fn download_dir<F: RemoteFs>(
    fs: &F,
    remote_dir: &str,
    local_dir: &Path,
    summary: &mut TransferSummary,
) -> Result<(), SftpError> {
    match tokio::fs::create_dir(local_dir).await {
        Ok(()) => {
            tracing::debug!("made directory: {}", local_dir.display());
            summary.directories += 1;
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => {
            tracing::warn!("Failed to create directory {}: {}", local_dir.display(), e);
            summary
                .skipped_directories
                .push(local_dir.display().to_string());
        }
    }

    let mut entries = fs.list_dir(remote_dir).await?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    for entry in entries {
        let target = local_dir.join(&entry.name);

        if entry.is_dir {
            Box::pin(download_dir(fs, &entry.path, &target, summary)).await?;
        } else if entry.is_symlink {
            tracing::warn!("Not copying remote symlink {}", entry.path);
            summary.skipped_entries.push(entry.path);
        } else {
            summary.bytes += retrieve_file(fs, &entry.path, &target).await?;
            summary.files += 1;
        }
    }

    Ok(())
}

/// File name of a local path; `.` and similar resolve through the filesystem.
fn local_base_name(path: &Path) -> Result<String, SftpError> {
    if let Some(name) = path.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }

    let canonical = path.canonicalize().map_err(|e| {
        SftpError::LocalIo(format!("unable to resolve {}: {}", path.display(), e))
    })?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| SftpError::LocalIo(format!("{} has no file name", path.display())))
}

fn join_relative(root: &str, relative: &Path) -> String {
    relative.components().fold(root.to_string(), |acc, component| {
        join_remote(&acc, &component.as_os_str().to_string_lossy())
    })
}
