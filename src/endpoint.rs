//! Command-line endpoint interpretation.
//!
//! One of the two positional arguments names the remote side using
//! `[user@]<targetIdentity>:[remotePath]`; the other is a local path. Which
//! one carries the `:` decides the transfer direction.

use crate::error::EndpointError;

/// Direction of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    UploadToRemote,
    DownloadFromRemote,
}

/// Remote side of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub username: String,
    pub target_identity: String,
    /// May be empty, meaning "infer from the source base name"
    pub path: String,
}

/// Fully interpreted transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: TransferDirection,
    pub remote: RemoteEndpoint,
    pub local_path: String,
}

impl TransferRequest {
    /// Interpret the two positional arguments.
    ///
    /// `local_user` is only consulted when the remote argument has no `user@`
    /// prefix.
    pub fn parse<F>(first: &str, second: &str, local_user: F) -> Result<Self, EndpointError>
    where
        F: FnOnce() -> Option<String>,
    {
        let (direction, remote_arg, local_path) = match (is_remote(first), is_remote(second)) {
            (true, false) => (TransferDirection::DownloadFromRemote, first, second),
            (false, true) => (TransferDirection::UploadToRemote, second, first),
            (true, true) => {
                return Err(EndpointError::RemoteToRemote(
                    first.to_string(),
                    second.to_string(),
                ));
            }
            (false, false) => return Err(EndpointError::AmbiguousEndpoints),
        };

        let remote = parse_remote(remote_arg, local_user)?;

        Ok(Self {
            direction,
            remote,
            local_path: local_path.to_string(),
        })
    }
}

/// Split `[user@]identity:path` at the first `:` and then the first `@`.
fn parse_remote<F>(arg: &str, local_user: F) -> Result<RemoteEndpoint, EndpointError>
where
    F: FnOnce() -> Option<String>,
{
    let (prefix, path) = arg
        .split_once(':')
        .ok_or(EndpointError::AmbiguousEndpoints)?;

    let (username, target_identity) = match prefix.split_once('@') {
        Some((user, identity)) => (user.to_string(), identity.to_string()),
        None => {
            let user = local_user()
                .map(|u| strip_domain(&u).to_string())
                .filter(|u| !u.is_empty())
                .ok_or(EndpointError::MissingLocalUser)?;
            (user, prefix.to_string())
        }
    };

    if target_identity.is_empty() {
        return Err(EndpointError::EmptyTargetIdentity(arg.to_string()));
    }

    Ok(RemoteEndpoint {
        username,
        target_identity,
        path: path.to_string(),
    })
}

fn is_remote(arg: &str) -> bool {
    arg.contains(':') && !looks_like_drive_path(arg)
}

/// `C:\dir` and `C:/dir` are local paths on Windows, not remote endpoints.
fn looks_like_drive_path(arg: &str) -> bool {
    if !cfg!(windows) {
        return false;
    }
    let bytes = arg.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// `DOMAIN\user` -> `user`
pub fn strip_domain(username: &str) -> &str {
    match username.rsplit_once('\\') {
        Some((_, user)) => user,
        None => username,
    }
}

/// Current OS user from the environment
pub fn local_username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
}
