use std::future::Future;

use russh::client::Handler;
use russh::keys::{HashAlg, PublicKey};

use crate::error::SshError;
use crate::security_log;

/// SSH client handler for overlay-routed connections.
///
/// Peer identity is established by the overlay's mutual authentication, so
/// the server host key is logged and accepted without pinning.
pub struct ClientHandler {
    identity: String,
}

impl ClientHandler {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl Handler for ClientHandler {
    type Error = SshError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        security_log::log_host_key_unpinned(&self.identity, &fingerprint);
        async { Ok(true) }
    }
}
