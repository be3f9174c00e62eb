//! Top-level orchestration of one transfer.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::config::OverlayConfig;
use crate::endpoint::{TransferDirection, TransferRequest};
use crate::oidc::{self, OidcConfig};
use crate::overlay::{OverlayContext, StaticOverlay};
use crate::sftp::{self, TransferSummary};
use crate::ssh::{CredentialResolver, SessionEstablisher, SessionParams, TransferSession};

/// Everything one invocation needs, resolved up front
#[derive(Debug)]
pub struct TransferConfig {
    pub request: TransferRequest,
    pub overlay_config: PathBuf,
    pub key_path: PathBuf,
    pub service_name: String,
    pub recursive: bool,
    pub connect_timeout: Duration,
    /// Present when a bearer token must be obtained before dialing
    pub oidc: Option<OidcConfig>,
}

impl TransferConfig {
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            service_name: self.service_name.clone(),
            target_identity: self.request.remote.target_identity.clone(),
            username: self.request.remote.username.clone(),
        }
    }
}

/// Load the overlay context, log in if asked to, and run the transfer.
pub async fn run(config: TransferConfig) -> anyhow::Result<TransferSummary> {
    tracing::debug!("    service: {}", config.service_name);
    tracing::debug!("     config: {}", config.overlay_config.display());
    tracing::debug!("    keyFile: {}", config.key_path.display());
    tracing::debug!("  recursive: {}", config.recursive);
    tracing::debug!("       user: {}", config.request.remote.username);
    tracing::debug!("   identity: {}", config.request.remote.target_identity);

    let overlay_config = OverlayConfig::load(&config.overlay_config)?;
    tracing::debug!(
        "Loaded overlay config {} ({} services)",
        config.overlay_config.display(),
        overlay_config.services.len()
    );

    let mut overlay = StaticOverlay::new(overlay_config);
    if let Some(oidc_config) = &config.oidc {
        let token = oidc::get_token(oidc_config)
            .await
            .context("identity provider login failed")?;
        overlay = overlay.with_token(token);
    }
    tracing::debug!("Bearer token attached: {}", overlay.has_token());

    let credentials = CredentialResolver::new(&config.key_path);
    transfer(&overlay, &config, &credentials).await
}

/// Establish a session through `overlay` and run the transfer on it.
///
/// The session is closed on every path once it exists.
pub async fn transfer<C: OverlayContext>(
    overlay: &C,
    config: &TransferConfig,
    credentials: &CredentialResolver,
) -> anyhow::Result<TransferSummary> {
    let params = config.session_params();
    let establisher = SessionEstablisher::new(config.connect_timeout);

    let session = establisher
        .establish(overlay, &params, credentials)
        .await
        .with_context(|| {
            format!(
                "error when dialing service name {} and identity {}",
                params.service_name, params.target_identity
            )
        })?;

    run_and_close(session, &config.request, config.recursive).await
}

/// Run the transfer on `session`, then close it whether or not it succeeded.
pub async fn run_and_close<S: TransferSession>(
    session: S,
    request: &TransferRequest,
    recursive: bool,
) -> anyhow::Result<TransferSummary> {
    let result = sftp::execute(session.remote_fs(), request, recursive).await;
    session.close().await;

    let summary = result.with_context(|| match request.direction {
        TransferDirection::UploadToRemote => format!(
            "could not send {} to {}",
            request.local_path, request.remote.target_identity
        ),
        TransferDirection::DownloadFromRemote => format!(
            "could not retrieve {} from {}",
            request.remote.path, request.remote.target_identity
        ),
    })?;

    tracing::debug!(
        "Transferred {} files ({} bytes), created {} directories",
        summary.files,
        summary.bytes,
        summary.directories
    );
    for skipped in &summary.skipped_directories {
        tracing::warn!("Directory not created: {}", skipped);
    }

    Ok(summary)
}
