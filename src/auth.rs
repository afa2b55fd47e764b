//! Authentication strategy planning.
//!
//! Layered auth fallback is modeled as an explicit ordered list evaluated
//! with early-exit-on-success (see [`crate::session`]), rather than nested
//! retry logic. Failures accumulate into one `AuthExhausted` value.

use secrecy::SecretString;
use std::path::PathBuf;

use crate::config::ConnectionSpec;

/// One concrete way to authenticate an SSH session.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Public key authentication with an explicit private key file
    PublicKey {
        key_path: PathBuf,
        passphrase: Option<SecretString>,
    },

    /// SSH agent identities, then the conventional default key files
    AgentOrDefaultKey,

    /// Password authentication
    Password(SecretString),
}

impl AuthStrategy {
    /// Short name used in logs and `AuthExhausted` reports.
    pub fn name(&self) -> &'static str {
        match self {
            AuthStrategy::PublicKey { .. } => "public-key",
            AuthStrategy::AgentOrDefaultKey => "agent",
            AuthStrategy::Password(_) => "password",
        }
    }
}

/// Ordered, non-empty sequence of strategies for one request. Built once
/// from the connection spec and never persisted.
#[derive(Debug, Clone)]
pub struct AuthAttemptPlan {
    strategies: Vec<AuthStrategy>,
}

impl AuthAttemptPlan {
    pub fn strategies(&self) -> &[AuthStrategy] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Build the attempt plan for a connection spec.
///
/// Ordering is fixed: an explicit key first (non-interactive and preferred),
/// then the agent/default-key fallback (always tried, it costs nothing),
/// then password last since it may have required blocking on user input.
/// Never fails: an empty-credential spec still yields the agent fallback.
pub fn plan(spec: &ConnectionSpec) -> AuthAttemptPlan {
    let mut strategies = Vec::new();

    if let Some(key_path) = &spec.key_path {
        strategies.push(AuthStrategy::PublicKey {
            key_path: key_path.clone(),
            passphrase: spec.key_passphrase.clone(),
        });
    }

    strategies.push(AuthStrategy::AgentOrDefaultKey);

    if let Some(password) = &spec.password {
        strategies.push(AuthStrategy::Password(password.clone()));
    }

    AuthAttemptPlan { strategies }
}
