use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Errors interpreting the two command-line endpoints
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("cannot determine remote file path, use \":\" to mark the remote side")]
    AmbiguousEndpoints,

    #[error("both '{0}' and '{1}' name remote endpoints; one side must be local")]
    RemoteToRemote(String, String),

    #[error("remote endpoint '{0}' has no target identity")]
    EmptyTargetIdentity(String),

    #[error("could not determine the local user name")]
    MissingLocalUser,
}

/// Reasons a single credential candidate could not be used.
///
/// These are reported and skipped; they never abort resolution on their own.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("could not read key file [{path}]: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no private key found in [{path}]: {reason}")]
    NoKeyFound { path: PathBuf, reason: String },

    #[error("key file is passphrase protected [{0}]")]
    PassphraseProtected(PathBuf),

    #[error("SSH agent error: {0}")]
    Agent(String),
}

/// Overlay network errors
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("identity '{identity}' is not reachable through service '{service}'")]
    UnknownIdentity { service: String, identity: String },

    #[error("service '{0}' requires a bearer token")]
    PolicyDenied(String),

    #[error("error dialing service '{service}' for '{identity}': {reason}")]
    DialFailed {
        service: String,
        identity: String,
        reason: String,
    },

    #[error("timed out dialing service '{service}' for '{identity}'")]
    Timeout { service: String, identity: String },
}

/// SSH-related errors
#[derive(Error, Debug)]
pub enum SshError {
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("SSH handshake with '{identity}' failed: {reason}")]
    Handshake { identity: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Timeout establishing session with {0}")]
    Timeout(String),

    #[error("russh error: {0}")]
    Russh(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::Russh(err.to_string())
    }
}

/// SFTP-related errors
#[derive(Error, Debug)]
pub enum SftpError {
    #[error("SFTP connection failed: {0}")]
    ConnectionFailed(String),

    #[error("File operation failed: {0}")]
    FileOperation(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

/// Identity token flow errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("OpenID discovery failed for {issuer}: {reason}")]
    Discovery { issuer: String, reason: String },

    #[error("authorization callback failed: {0}")]
    Callback(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("ID token is missing from the token response")]
    MissingIdToken,

    #[error("timed out after {0} seconds waiting for browser login")]
    Timeout(u64),
}
