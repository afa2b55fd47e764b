/*!
 * Riptide - SSH remote command orchestrator for tidal-dl-ng
 *
 * Resolves Tidal URLs or bare ids into download commands and runs them on
 * a remote host over SSH, with remote settings inspection and patching
 * over SFTP. One connection per request; nothing persists between runs.
 */

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod locator;
pub mod logging;
pub mod orchestrator;
pub mod remote_config;
pub mod session;

pub use auth::{plan, AuthAttemptPlan, AuthStrategy};
pub use command::{CommandBuilder, DEFAULT_REMOTE_BIN};
pub use config::ConnectionSpec;
pub use error::{Result, RiptideError};
pub use locator::{resolve, ContentKind, ContentReference};
pub use orchestrator::{execute, execute_with, ExecutionResult, Outcome, Request};
pub use remote_config::{ConfigDocument, ConfigPatch, SETTINGS_PATH};
pub use session::{ExecOutput, RemoteSession, Ssh2Transport, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
