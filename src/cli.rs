use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use secrecy::SecretString;

use crate::app::TransferConfig;
use crate::config::paths;
use crate::endpoint::{TransferRequest, local_username};
use crate::error::ConfigError;
use crate::oidc::{DEFAULT_CALLBACK_PORT, OidcConfig};

#[derive(Parser, Debug)]
#[command(
    name = "zscp",
    version,
    about = "Copy files to and from hosts reachable over the overlay network",
    after_help = "Exactly one of SOURCE and DESTINATION takes the form \
                  [user@]<identity>:[path]"
)]
pub struct Cli {
    /// Source path; local, or remote as [user@]<identity>:[path]
    pub source: String,

    /// Destination path; local, or remote as [user@]<identity>:[path]
    pub destination: String,

    /// Overlay configuration file [default: ~/.ziti/zssh.json]
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Private key file [default: ~/.ssh/id_rsa]
    #[arg(short = 'i', long = "key")]
    pub key: Option<String>,

    /// Overlay service to dial
    #[arg(short = 's', long, default_value = paths::DEFAULT_SERVICE_NAME)]
    pub service: String,

    /// Log at debug level
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Copy directories recursively
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Log in through the identity provider before dialing
    #[arg(short = 'o', long)]
    pub oidc: bool,

    /// OIDC client id
    #[arg(long, requires = "oidc")]
    pub client_id: Option<String>,

    /// OIDC client secret; PKCE is used when omitted
    #[arg(long, requires = "oidc")]
    pub client_secret: Option<String>,

    /// OIDC issuer URL
    #[arg(long, requires = "oidc")]
    pub issuer: Option<String>,

    /// Local port receiving the login redirect
    #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
    pub callback_port: u16,

    /// Seconds to wait for the browser login
    #[arg(long, default_value_t = 300)]
    pub oidc_timeout: u64,

    /// Seconds allowed for handshake and authentication
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,
}

impl Cli {
    /// Resolve defaults and interpret the endpoints.
    pub fn into_config(self) -> anyhow::Result<TransferConfig> {
        let request = TransferRequest::parse(&self.source, &self.destination, local_username)?;

        let overlay_config = match &self.config {
            Some(path) => paths::expand_tilde(path),
            None => paths::default_overlay_config().ok_or(ConfigError::NoHomeDir)?,
        };
        let key_path = match &self.key {
            Some(path) => paths::expand_tilde(path),
            None => paths::default_key_file().ok_or(ConfigError::NoHomeDir)?,
        };

        let oidc = if self.oidc {
            Some(self.oidc_config()?)
        } else {
            None
        };

        Ok(TransferConfig {
            request,
            overlay_config,
            key_path,
            service_name: self.service,
            recursive: self.recursive,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            oidc,
        })
    }

    fn oidc_config(&self) -> anyhow::Result<OidcConfig> {
        let Some(issuer) = self.issuer.as_deref().filter(|s| !s.trim().is_empty()) else {
            bail!("--issuer is required with --oidc");
        };
        let Some(client_id) = self.client_id.as_deref().filter(|s| !s.trim().is_empty()) else {
            bail!("--client-id is required with --oidc");
        };

        let mut config = OidcConfig::new(issuer, client_id);
        config.client_secret = self.client_secret.clone().map(SecretString::from);
        config.callback_port = self.callback_port;
        config.timeout = Duration::from_secs(self.oidc_timeout);
        Ok(config)
    }
}
