use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::security_log;

use super::{OverlayContext, OverlayStream};

/// Overlay context backed by the service table in the configuration file
pub struct StaticOverlay {
    config: OverlayConfig,
    token: Option<SecretString>,
}

impl std::fmt::Debug for StaticOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticOverlay")
            .field("identity", &self.config.identity)
            .field("services", &self.config.services.len())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StaticOverlay {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            token: None,
        }
    }

    /// Attach a bearer token obtained from the identity provider
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl OverlayContext for StaticOverlay {
    fn has_service(&self, service: &str) -> bool {
        self.config.service(service).is_some()
    }

    async fn dial(
        &self,
        service: &str,
        identity: &str,
    ) -> Result<Box<dyn OverlayStream>, OverlayError> {
        let definition = self
            .config
            .service(service)
            .ok_or_else(|| OverlayError::ServiceNotFound(service.to_string()))?;

        if definition.require_token && self.token.is_none() {
            return Err(OverlayError::PolicyDenied(service.to_string()));
        }

        let address = definition.terminators.get(identity).ok_or_else(|| {
            OverlayError::UnknownIdentity {
                service: service.to_string(),
                identity: identity.to_string(),
            }
        })?;

        security_log::log_overlay_dial(service, identity);

        let stream = timeout(self.config.connect_timeout(), TcpStream::connect(address))
            .await
            .map_err(|_| OverlayError::Timeout {
                service: service.to_string(),
                identity: identity.to_string(),
            })?
            .map_err(|e| OverlayError::DialFailed {
                service: service.to_string(),
                identity: identity.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Dialed {} via {} at {}", identity, service, address);
        Ok(Box::new(stream))
    }
}
