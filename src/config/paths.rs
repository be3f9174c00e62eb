use std::path::PathBuf;

/// Overlay service dialed when none is given, also the config file stem
pub const DEFAULT_SERVICE_NAME: &str = "zssh";

const OVERLAY_DIR: &str = ".ziti";
const SSH_DIR: &str = ".ssh";
const ID_RSA: &str = "id_rsa";

/// Environment variable that enables file logging into the named directory
pub const LOG_DIR_ENV: &str = "ZSCP_LOG_DIR";

/// Get the user's home directory
pub fn home_dir() -> Option<PathBuf> {
    // Try directories crate first, fall back to HOME env var
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
}

/// Get the default SSH directory
pub fn ssh_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(SSH_DIR))
}

/// Default private key: `$HOME/.ssh/id_rsa`
pub fn default_key_file() -> Option<PathBuf> {
    ssh_dir().map(|dir| dir.join(ID_RSA))
}

/// Default overlay network config: `$HOME/.ziti/zssh.json`
pub fn default_overlay_config() -> Option<PathBuf> {
    home_dir().map(|home| {
        home.join(OVERLAY_DIR)
            .join(format!("{}.json", DEFAULT_SERVICE_NAME))
    })
}

/// Expand tilde in path (e.g., ~/.ssh/id_rsa -> /home/user/.ssh/id_rsa)
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Log directory, only when explicitly requested through the environment
pub fn log_dir() -> Option<PathBuf> {
    let raw = std::env::var(LOG_DIR_ENV).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(expand_tilde(trimmed))
}

/// Ensure the log directory exists with proper permissions
pub fn ensure_log_dir() -> std::io::Result<Option<PathBuf>> {
    let Some(dir) = log_dir() else {
        return Ok(None);
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    Ok(Some(dir))
}
