use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::keys::{PrivateKey, PublicKey};
use tokio::sync::Mutex;

use crate::error::CredentialError;

/// A usable authentication method, in the order it will be offered
#[derive(Clone)]
pub enum Credential {
    /// Private key loaded from disk
    FileKey { path: PathBuf, key: Arc<PrivateKey> },
    /// Keys held by a running SSH agent
    Agent {
        socket: PathBuf,
        identities: Vec<PublicKey>,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::FileKey { path, .. } => f
                .debug_struct("FileKey")
                .field("path", path)
                .field("key", &"[KEY]")
                .finish(),
            Credential::Agent { socket, identities } => f
                .debug_struct("Agent")
                .field("socket", socket)
                .field("identities", &identities.len())
                .finish(),
        }
    }
}

impl Credential {
    /// Method name used in logs
    pub fn method_name(&self) -> &'static str {
        match self {
            Credential::FileKey { .. } => "publickey",
            Credential::Agent { .. } => "agent",
        }
    }
}

enum Resolution {
    Unresolved,
    Resolved(Arc<[Credential]>),
}

/// Resolves the credential sequence for a session, at most once.
pub struct CredentialResolver {
    key_path: PathBuf,
    agent_socket: Option<PathBuf>,
    state: Mutex<Resolution>,
}

impl CredentialResolver {
    /// Resolver for `key_path`, using the agent named by `SSH_AUTH_SOCK`.
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        let agent_socket = std::env::var_os("SSH_AUTH_SOCK")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Self::with_agent_socket(key_path, agent_socket)
    }

    /// Resolver with an explicit agent socket; `None` disables the agent.
    pub fn with_agent_socket(key_path: impl Into<PathBuf>, agent_socket: Option<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            agent_socket,
            state: Mutex::new(Resolution::Unresolved),
        }
    }

    /// Resolve the credential sequence: file key first, then agent keys.
    ///
    /// A candidate that fails is logged and skipped. An empty result is legal
    /// here; it only becomes an error when the server accepts nothing.
    pub async fn resolve(&self) -> Arc<[Credential]> {
        let mut state = self.state.lock().await;
        if let Resolution::Resolved(credentials) = &*state {
            return credentials.clone();
        }

        let mut methods = Vec::new();

        match load_key_file(&self.key_path).await {
            Ok(credential) => {
                tracing::debug!("Loaded private key {}", self.key_path.display());
                methods.push(credential);
            }
            Err(e) => tracing::warn!("{}", e),
        }

        match &self.agent_socket {
            Some(socket) => match query_agent(socket).await {
                Ok(Some(credential)) => methods.push(credential),
                Ok(None) => tracing::debug!("SSH agent at {} has no keys", socket.display()),
                Err(e) => tracing::warn!("{}", e),
            },
            None => tracing::debug!("SSH_AUTH_SOCK not set, skipping agent"),
        }

        let credentials: Arc<[Credential]> = methods.into();
        *state = Resolution::Resolved(credentials.clone());
        credentials
    }
}

/// Load an SSH private key from file
async fn load_key_file(path: &Path) -> Result<Credential, CredentialError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    // Check if this is actually a public key (common mistake)
    let first_line = content.lines().next().unwrap_or("");
    if first_line.starts_with("ssh-") || first_line.starts_with("ecdsa-") {
        return Err(CredentialError::NoKeyFound {
            path: path.to_path_buf(),
            reason: "file contains a PUBLIC key, not a private key".to_string(),
        });
    }

    if !first_line.starts_with("-----BEGIN") {
        return Err(CredentialError::NoKeyFound {
            path: path.to_path_buf(),
            reason: "no PEM or OpenSSH private key block".to_string(),
        });
    }

    let key = russh::keys::decode_secret_key(&content, None).map_err(|e| {
        let msg = e.to_string();
        let normalized = msg.to_lowercase();
        // Detect passphrase-related errors from various russh error messages
        let is_passphrase_error = normalized.contains("encrypted")
            || normalized.contains("passphrase")
            || normalized.contains("cryptographic");
        if is_passphrase_error {
            CredentialError::PassphraseProtected(path.to_path_buf())
        } else {
            CredentialError::NoKeyFound {
                path: path.to_path_buf(),
                reason: msg,
            }
        }
    })?;

    if key.is_encrypted() {
        return Err(CredentialError::PassphraseProtected(path.to_path_buf()));
    }

    Ok(Credential::FileKey {
        path: path.to_path_buf(),
        key: Arc::new(key),
    })
}

#[cfg(unix)]
async fn query_agent(socket: &Path) -> Result<Option<Credential>, CredentialError> {
    let stream = tokio::net::UnixStream::connect(socket)
        .await
        .map_err(|e| CredentialError::Agent(format!("Failed to connect to SSH agent: {}", e)))?;

    let mut agent = russh::keys::agent::client::AgentClient::connect(stream);

    let identities = agent
        .request_identities()
        .await
        .map_err(|e| CredentialError::Agent(format!("Failed to get identities: {}", e)))?;

    if identities.is_empty() {
        return Ok(None);
    }

    tracing::debug!("SSH agent offers {} keys", identities.len());
    Ok(Some(Credential::Agent {
        socket: socket.to_path_buf(),
        identities,
    }))
}

#[cfg(not(unix))]
async fn query_agent(_socket: &Path) -> Result<Option<Credential>, CredentialError> {
    Err(CredentialError::Agent(
        "agent sockets are only supported on unix".to_string(),
    ))
}
