/*!
 * Connection configuration for Riptide
 */

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default bound on session establishment (TCP connect, handshake, auth).
/// Command execution itself is never bounded; downloads may run long.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// How to reach and authenticate against the remote server for one request.
///
/// Always passed in explicitly; sessions never read process-wide state, so
/// each request stays independently testable.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    /// Hostname or IP address
    pub host: String,

    /// Port (default: 22)
    pub port: u16,

    /// Username (default: the local OS user, matching plain `ssh`)
    pub username: String,

    /// Path to a private key file, `~` expanded
    pub key_path: Option<PathBuf>,

    /// Passphrase for the private key, if it has one
    pub key_passphrase: Option<SecretString>,

    /// Password for password authentication
    pub password: Option<SecretString>,

    /// Bound on session establishment
    pub connect_timeout: Duration,
}

impl ConnectionSpec {
    /// Create a spec for a host with all defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: local_username(),
            key_path: None,
            key_passphrase: None,
            password: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the private key path (a leading `~` is expanded locally)
    pub fn with_key_path(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(expand_tilde(&key_path.into()));
        self
    }

    /// Set the private key passphrase
    pub fn with_key_passphrase(mut self, passphrase: SecretString) -> Self {
        self.key_passphrase = Some(passphrase);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Set the connection-establishment timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port` form used for TCP connect and diagnostics
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolve the local OS user, matching what a plain `ssh host` would use.
pub fn local_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

/// Expand a leading `~` against the local home directory.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
