//! Browser-delegated OpenID Connect login producing a bearer token.
//!
//! A local callback listener is started, the authorization URL is opened in
//! the user's browser, and the code returned on the redirect is exchanged for
//! tokens. PKCE is used when no client secret is configured.

mod callback;
mod pkce;

pub use callback::{CallbackListener, CallbackOutcome, parse_callback};
pub use pkce::PkcePair;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::time::timeout;
use url::Url;

use crate::error::TokenError;
use crate::security_log;

pub const DEFAULT_CALLBACK_PORT: u16 = 63275;
pub const DEFAULT_CALLBACK_PATH: &str = "/auth/callback";
pub const DEFAULT_SCOPES: &str = "openid profile";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Identity provider settings
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub callback_port: u16,
    pub callback_path: String,
    pub scopes: Vec<String>,
    /// Upper bound on the whole browser flow
    pub timeout: Duration,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("callback_port", &self.callback_port)
            .field("callback_path", &self.callback_path)
            .field("scopes", &self.scopes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OidcConfig {
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: None,
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            scopes: DEFAULT_SCOPES.split(' ').map(String::from).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.callback_port, self.callback_path)
    }

    fn validate(&self) -> Result<(), TokenError> {
        if self.client_id.trim().is_empty() {
            return Err(TokenError::InvalidConfig("client id must be set".to_string()));
        }
        if self.issuer.trim().is_empty() {
            return Err(TokenError::InvalidConfig("issuer must be set".to_string()));
        }
        Ok(())
    }
}

/// Endpoints advertised by the issuer's discovery document
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Run the browser login and return the ID token.
///
/// Blocks until the user finishes in the browser or `config.timeout` passes.
pub async fn get_token(config: &OidcConfig) -> Result<SecretString, TokenError> {
    config.validate()?;

    timeout(config.timeout, code_flow(config))
        .await
        .map_err(|_| TokenError::Timeout(config.timeout.as_secs()))?
}

async fn code_flow(config: &OidcConfig) -> Result<SecretString, TokenError> {
    let http = reqwest::Client::new();
    let provider = discover(&http, &config.issuer).await?;

    // Fresh per attempt so a replayed redirect is rejected.
    let state = uuid::Uuid::new_v4().to_string();
    let pkce = config.client_secret.is_none().then(PkcePair::generate);

    let listener = CallbackListener::bind(config.callback_port, &config.callback_path).await?;
    let url = authorization_url(
        &provider.authorization_endpoint,
        config,
        &state,
        pkce.as_ref(),
    )?;
    open_browser(&url);

    let code = listener.wait_for_code(&state).await?;
    let token = exchange_code(&http, &provider.token_endpoint, config, &code, pkce.as_ref()).await?;

    security_log::log_token_obtained(&config.issuer);
    Ok(token)
}

async fn discover(http: &reqwest::Client, issuer: &str) -> Result<ProviderMetadata, TokenError> {
    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );
    let discovery_error = |reason: String| TokenError::Discovery {
        issuer: issuer.to_string(),
        reason,
    };

    http.get(&discovery_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| discovery_error(e.to_string()))?
        .json::<ProviderMetadata>()
        .await
        .map_err(|e| discovery_error(e.to_string()))
}

/// Build the authorization request URL.
pub fn authorization_url(
    authorization_endpoint: &str,
    config: &OidcConfig,
    state: &str,
    pkce: Option<&PkcePair>,
) -> Result<Url, TokenError> {
    let mut url = Url::parse(authorization_endpoint).map_err(|e| TokenError::Discovery {
        issuer: config.issuer.clone(),
        reason: format!("invalid authorization endpoint {}: {}", authorization_endpoint, e),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri())
            .append_pair("scope", &config.scopes.join(" "))
            .append_pair("state", state);
        if let Some(pkce) = pkce {
            query
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", PkcePair::METHOD);
        }
    }

    Ok(url)
}

fn open_browser(url: &Url) {
    tracing::info!("Opening browser for login");
    if let Err(e) = open::that(url.as_str()) {
        tracing::warn!(
            "Could not open a browser ({}); visit this URL to log in: {}",
            e,
            url
        );
    }
}

async fn exchange_code(
    http: &reqwest::Client,
    token_endpoint: &str,
    config: &OidcConfig,
    code: &str,
    pkce: Option<&PkcePair>,
) -> Result<SecretString, TokenError> {
    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", config.redirect_uri()),
        ("client_id", config.client_id.clone()),
    ];
    match (&config.client_secret, pkce) {
        (Some(secret), _) => form.push(("client_secret", secret.expose_secret().to_string())),
        (None, Some(pkce)) => form.push(("code_verifier", pkce.verifier.clone())),
        (None, None) => {}
    }

    let response = http
        .post(token_endpoint)
        .form(&form)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| TokenError::Exchange(e.to_string()))?
        .json::<TokenResponse>()
        .await
        .map_err(|e| TokenError::Exchange(e.to_string()))?;

    response
        .id_token
        .filter(|token| !token.is_empty())
        .map(SecretString::from)
        .ok_or(TokenError::MissingIdToken)
}
