//! Request orchestration.
//!
//! Composition root: drives the locator, session manager, config store,
//! and command builder for exactly one request and returns one structured
//! outcome or a typed failure. Stateless between requests; the session is
//! closed on every exit path.

use tracing::{debug, info};

use crate::auth;
use crate::command::{CommandBuilder, DEFAULT_REMOTE_BIN};
use crate::config::ConnectionSpec;
use crate::error::{Result, RiptideError};
use crate::locator::{self, ContentReference};
use crate::remote_config::{self, ConfigDocument, ConfigPatch};
use crate::session::{RemoteSession, Transport};

/// One orchestration request.
#[derive(Debug, Clone)]
pub struct Request {
    pub connection: ConnectionSpec,

    /// Tidal URL or bare id; absent for pure config operations.
    pub content_input: Option<String>,

    /// Config overrides to merge into the remote settings document.
    pub patch: ConfigPatch,

    /// Return the remote settings document in the outcome.
    pub show_config: bool,

    /// Compute commands and patches without any remote side effect.
    pub dry_run: bool,

    /// Remote downloader binary.
    pub remote_bin: String,
}

impl Request {
    pub fn new(connection: ConnectionSpec) -> Self {
        Self {
            connection,
            content_input: None,
            patch: ConfigPatch::new(),
            show_config: false,
            dry_run: false,
            remote_bin: DEFAULT_REMOTE_BIN.to_string(),
        }
    }
}

/// Result of the download step of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The command ran to completion on the remote host. A nonzero exit
    /// code is data for the caller, not an error.
    Completed {
        command_line: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Dry run: the exact command that would have run, unexecuted.
    DryRun { command_line: String },
}

impl ExecutionResult {
    pub fn command_line(&self) -> &str {
        match self {
            ExecutionResult::Completed { command_line, .. } => command_line,
            ExecutionResult::DryRun { command_line } => command_line,
        }
    }

    /// `None` for dry runs, where nothing executed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionResult::Completed { exit_code, .. } => Some(*exit_code),
            ExecutionResult::DryRun { .. } => None,
        }
    }
}

/// Everything one request produced.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Download command result, when a content reference was supplied.
    pub execution: Option<ExecutionResult>,

    /// Remote settings document, when the request asked to show it.
    pub config: Option<ConfigDocument>,

    /// Patch entries applied (or previewed under dry run), in order.
    pub applied: Vec<(String, String)>,

    /// Authentication strategy that won the session.
    pub auth_strategy: Option<String>,
}

/// Execute one request end to end over a fresh SSH connection.
pub fn execute(request: &Request) -> Result<Outcome> {
    // Input errors are reported before any connection is attempted.
    let reference = resolve_reference(request)?;
    let session = RemoteSession::open(&request.connection)?;
    finish(request, reference, session)
}

/// Transport seam for tests and alternative transports: run one request
/// over an already-connected but not yet authenticated transport.
pub fn execute_with<T: Transport>(request: &Request, transport: T) -> Result<Outcome> {
    let reference = resolve_reference(request)?;
    let plan = auth::plan(&request.connection);
    let session = RemoteSession::authenticate(transport, &request.connection.username, &plan)?;
    finish(request, reference, session)
}

fn resolve_reference(request: &Request) -> Result<Option<ContentReference>> {
    match request.content_input.as_deref() {
        Some(input) => {
            let reference = locator::resolve(input)?;
            info!(
                kind = %reference.kind(),
                id = reference.id(),
                "resolved content reference"
            );
            Ok(Some(reference))
        }
        None => Ok(None),
    }
}

fn finish<T: Transport>(
    request: &Request,
    reference: Option<ContentReference>,
    mut session: RemoteSession<T>,
) -> Result<Outcome> {
    let result = run_steps(request, reference.as_ref(), &mut session);
    // Drop would also close it, but keep the teardown explicit.
    session.close();
    result
}

fn run_steps<T: Transport>(
    request: &Request,
    reference: Option<&ContentReference>,
    session: &mut RemoteSession<T>,
) -> Result<Outcome> {
    let mut outcome = Outcome {
        auth_strategy: Some(session.auth_strategy().to_string()),
        ..Default::default()
    };

    if !request.patch.is_empty() {
        outcome.applied = request.patch.entries().to_vec();
        if request.dry_run {
            debug!(keys = request.patch.len(), "dry run, skipping config write");
        } else {
            let current = match remote_config::load(session) {
                Ok(doc) => doc,
                // No settings yet is an expected first-run condition:
                // patch against an empty document.
                Err(RiptideError::ConfigMissing { .. }) => ConfigDocument::empty(),
                Err(e) => return Err(e),
            };
            let patched = remote_config::patch(&current, &request.patch);
            remote_config::save(session, &patched)?;
            info!(keys = request.patch.len(), "remote settings updated");
        }
    }

    if request.show_config {
        outcome.config = Some(remote_config::load(session)?);
    }

    if let Some(reference) = reference {
        let command_line = CommandBuilder::new(&request.remote_bin).download(reference);
        outcome.execution = Some(if request.dry_run {
            info!(command = %command_line, "dry run, command not executed");
            ExecutionResult::DryRun { command_line }
        } else {
            let output = session.run(&command_line)?;
            ExecutionResult::Completed {
                command_line,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }
        });
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ExecOutput;

    /// Fails the test if the orchestrator touches the transport at all.
    struct UntouchableTransport;

    impl Transport for UntouchableTransport {
        fn authenticate(
            &mut self,
            _username: &str,
            _strategy: &crate::auth::AuthStrategy,
        ) -> std::result::Result<(), String> {
            panic!("transport must not be touched for invalid input");
        }

        fn exec(&mut self, _command_line: &str) -> Result<ExecOutput> {
            panic!("transport must not be touched for invalid input");
        }

        fn read_file(&mut self, _path: &str) -> Result<Option<Vec<u8>>> {
            panic!("transport must not be touched for invalid input");
        }

        fn write_file(&mut self, _path: &str, _data: &[u8]) -> Result<()> {
            panic!("transport must not be touched for invalid input");
        }

        fn disconnect(&mut self) {}
    }

    #[test]
    fn test_invalid_input_fails_before_any_network_use() {
        let mut request = Request::new(ConnectionSpec::new("example.com"));
        request.content_input = Some("definitely not a tidal url".to_string());

        let err = execute_with(&request, UntouchableTransport).unwrap_err();
        assert!(matches!(err, RiptideError::InvalidInput(_)));
    }

    #[test]
    fn test_execution_result_accessors() {
        let completed = ExecutionResult::Completed {
            command_line: "tidal-dl-ng dl 1".to_string(),
            exit_code: 3,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(completed.command_line(), "tidal-dl-ng dl 1");
        assert_eq!(completed.exit_code(), Some(3));

        let dry = ExecutionResult::DryRun {
            command_line: "tidal-dl-ng dl 1".to_string(),
        };
        assert_eq!(dry.command_line(), "tidal-dl-ng dl 1");
        assert_eq!(dry.exit_code(), None);
    }

    #[test]
    fn test_request_defaults() {
        let request = Request::new(ConnectionSpec::new("example.com"));
        assert!(request.content_input.is_none());
        assert!(request.patch.is_empty());
        assert!(!request.show_config);
        assert!(!request.dry_run);
        assert_eq!(request.remote_bin, DEFAULT_REMOTE_BIN);
    }
}
