//! Remote command construction.
//!
//! Builds the exact command line without executing anything, so "what
//! would run" stays observable and testable independent of "did it run".
//! Dry run never changes the text, only whether it is passed to the
//! session for execution.

use crate::locator::ContentReference;

/// Default remote downloader binary
pub const DEFAULT_REMOTE_BIN: &str = "tidal-dl-ng";

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    binary: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_BIN)
    }
}

impl CommandBuilder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Download invocation for one content reference. The original input
    /// is passed through as the single positional argument; the remote
    /// tool does its own URL handling.
    pub fn download(&self, reference: &ContentReference) -> String {
        format!("{} dl {}", self.binary, shell_quote(reference.source()))
    }

    /// No reference means a pure config operation: no command is built.
    pub fn build(&self, reference: Option<&ContentReference>) -> Option<String> {
        reference.map(|r| self.download(r))
    }
}

/// POSIX single-quote escaping for one shell argument. Arguments made of
/// unambiguous characters pass through bare.
fn shell_quote(arg: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':');
    if !arg.is_empty() && arg.chars().all(safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}
