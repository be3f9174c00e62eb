//! Security event logging for audit trails.
//!
//! All security events are logged with `target: "security"` to allow filtering,
//! e.g. `RUST_LOG=security=info zscp ...`.

use tracing::{info, warn};

/// Log an overlay dial toward a target identity.
pub fn log_overlay_dial(service: &str, identity: &str) {
    info!(
        target: "security",
        event = "overlay_dial",
        service = %service,
        identity = %identity,
        "Dialing overlay service"
    );
}

/// Log an SSH authentication attempt.
///
/// Called before each credential is offered to the remote host.
pub fn log_auth_attempt(identity: &str, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        identity = %identity,
        username = %username,
        method = %method,
        "SSH authentication attempt"
    );
}

/// Log a successful SSH authentication.
pub fn log_auth_success(identity: &str, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_success",
        identity = %identity,
        username = %username,
        method = %method,
        "SSH authentication succeeded"
    );
}

/// Log a failed SSH authentication attempt.
pub fn log_auth_failure(identity: &str, username: &str, method: &str, reason: &str) {
    warn!(
        target: "security",
        event = "auth_failure",
        identity = %identity,
        username = %username,
        method = %method,
        reason = %reason,
        "SSH authentication failed"
    );
}

/// Log an SFTP connection establishment.
pub fn log_sftp_connect(identity: &str, username: &str) {
    info!(
        target: "security",
        event = "sftp_connect",
        identity = %identity,
        username = %username,
        "SFTP connection established"
    );
}

/// Log a server host key accepted without pinning.
///
/// The overlay network authenticates both ends, so the key is recorded but
/// never compared against a known_hosts store.
pub fn log_host_key_unpinned(identity: &str, fingerprint: &str) {
    info!(
        target: "security",
        event = "host_key_unpinned",
        identity = %identity,
        fingerprint = %fingerprint,
        "Accepted host key from overlay-authenticated peer"
    );
}

/// Log completion of the browser identity flow.
pub fn log_token_obtained(issuer: &str) {
    info!(
        target: "security",
        event = "token_obtained",
        issuer = %issuer,
        "Obtained bearer token from identity provider"
    );
}
