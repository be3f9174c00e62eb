use std::sync::Arc;
use std::time::Duration;

use russh::Disconnect;
use russh::client::{self, Config};
use russh::keys::{HashAlg, PrivateKeyWithHashAlg, PublicKey};
use russh_sftp::client::SftpSession as RusshSftpSession;
use tokio::time::timeout;

use crate::error::{OverlayError, SshError};
use crate::overlay::{OverlayContext, OverlayStream};
use crate::security_log;
use crate::sftp::{RemoteFs, SftpRemote};

use super::auth::{Credential, CredentialResolver};
use super::handler::ClientHandler;

/// Who to reach, through which service, as which user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub service_name: String,
    pub target_identity: String,
    pub username: String,
}

/// Authenticated SSH connection with an SFTP handle on top of it
pub struct Session {
    handle: client::Handle<ClientHandler>,
    sftp: SftpRemote,
    identity: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// An open session a transfer can run on and must release afterwards
#[allow(async_fn_in_trait)]
pub trait TransferSession {
    type Fs: RemoteFs;

    /// Remote filesystem handle for transfers
    fn remote_fs(&self) -> &Self::Fs;

    /// Release everything the session holds
    async fn close(self);
}

impl TransferSession for Session {
    type Fs = SftpRemote;

    fn remote_fs(&self) -> &SftpRemote {
        &self.sftp
    }

    /// Close the SFTP handle, then the SSH connection and the stream under it.
    async fn close(self) {
        if let Err(e) = self.sftp.close().await {
            tracing::warn!("Failed to close SFTP session: {}", e);
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!("Disconnect from {} failed: {}", self.identity, e);
        }
        tracing::debug!("Session with {} closed", self.identity);
    }
}

/// Opens sessions over overlay-dialed streams
pub struct SessionEstablisher {
    config: Arc<Config>,
    connect_timeout: Duration,
}

impl Default for SessionEstablisher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl SessionEstablisher {
    /// `connect_timeout` bounds handshake, authentication and SFTP setup.
    pub fn new(connect_timeout: Duration) -> Self {
        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            connect_timeout,
        }
    }

    /// Dial `params.service_name` and negotiate an SFTP-capable session.
    pub async fn establish<C: OverlayContext>(
        &self,
        overlay: &C,
        params: &SessionParams,
        credentials: &CredentialResolver,
    ) -> Result<Session, SshError> {
        if !overlay.has_service(&params.service_name) {
            return Err(OverlayError::ServiceNotFound(params.service_name.clone()).into());
        }

        let stream = overlay
            .dial(&params.service_name, &params.target_identity)
            .await?;

        match timeout(
            self.connect_timeout,
            self.negotiate(stream, params, credentials),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SshError::Timeout(params.target_identity.clone())),
        }
    }

    async fn negotiate(
        &self,
        stream: Box<dyn OverlayStream>,
        params: &SessionParams,
        credentials: &CredentialResolver,
    ) -> Result<Session, SshError> {
        let handler = ClientHandler::new(&params.target_identity);

        let mut handle = client::connect_stream(self.config.clone(), stream, handler)
            .await
            .map_err(|e| SshError::Handshake {
                identity: params.target_identity.clone(),
                reason: e.to_string(),
            })?;

        let credentials = credentials.resolve().await;
        authenticate(&mut handle, params, &credentials).await?;

        // Open channel and request SFTP subsystem
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::Channel(format!("Failed to open channel: {}", e)))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SshError::Channel(format!("Failed to request SFTP subsystem: {}", e)))?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SshError::Channel(format!("Failed to initialize SFTP session: {}", e)))?;

        security_log::log_sftp_connect(&params.target_identity, &params.username);

        Ok(Session {
            handle,
            sftp: SftpRemote::new(sftp),
            identity: params.target_identity.clone(),
        })
    }
}

/// Offer each credential in order until the server accepts one.
async fn authenticate(
    handle: &mut client::Handle<ClientHandler>,
    params: &SessionParams,
    credentials: &[Credential],
) -> Result<(), SshError> {
    let identity = params.target_identity.as_str();
    let username = params.username.as_str();

    if credentials.is_empty() {
        return Err(SshError::AuthenticationFailed(format!(
            "no authentication methods available for {}@{}",
            username, identity
        )));
    }

    for credential in credentials {
        let method = credential.method_name();
        security_log::log_auth_attempt(identity, username, method);

        let outcome = match credential {
            Credential::FileKey { key, .. } => {
                let hash_alg = rsa_hash(key.algorithm().is_rsa());
                let key = PrivateKeyWithHashAlg::new(key.clone(), hash_alg);
                handle
                    .authenticate_publickey(username, key)
                    .await
                    .map(|result| result.success())
                    .map_err(|e| e.to_string())
            }
            Credential::Agent { socket, identities } => {
                authenticate_with_agent(handle, username, socket, identities).await
            }
        };

        match outcome {
            Ok(true) => {
                security_log::log_auth_success(identity, username, method);
                return Ok(());
            }
            Ok(false) => {
                security_log::log_auth_failure(
                    identity,
                    username,
                    method,
                    "Authentication rejected by server",
                );
            }
            Err(reason) => {
                security_log::log_auth_failure(identity, username, method, &reason);
            }
        }
    }

    let tried: Vec<&str> = credentials.iter().map(Credential::method_name).collect();
    Err(SshError::AuthenticationFailed(format!(
        "no offered method was accepted for {}@{} (tried: {})",
        username,
        identity,
        tried.join(", ")
    )))
}

/// Only use SHA-512 for RSA keys; other keys sign with their native algorithm.
fn rsa_hash(is_rsa: bool) -> Option<HashAlg> {
    if is_rsa { Some(HashAlg::Sha512) } else { None }
}

#[cfg(unix)]
async fn authenticate_with_agent(
    handle: &mut client::Handle<ClientHandler>,
    username: &str,
    socket: &std::path::Path,
    identities: &[PublicKey],
) -> Result<bool, String> {
    let stream = tokio::net::UnixStream::connect(socket)
        .await
        .map_err(|e| format!("Failed to connect to SSH agent: {}", e))?;

    let mut agent = russh::keys::agent::client::AgentClient::connect(stream);

    for identity in identities {
        let hash_alg = rsa_hash(identity.algorithm().is_rsa());

        match handle
            .authenticate_publickey_with(username, identity.clone(), hash_alg, &mut agent)
            .await
        {
            Ok(result) if result.success() => return Ok(true),
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Agent key failed: {}", e);
                continue;
            }
        }
    }

    Ok(false)
}

#[cfg(not(unix))]
async fn authenticate_with_agent(
    _handle: &mut client::Handle<ClientHandler>,
    _username: &str,
    _socket: &std::path::Path,
    _identities: &[PublicKey],
) -> Result<bool, String> {
    Err("agent sockets are only supported on unix".to_string())
}
