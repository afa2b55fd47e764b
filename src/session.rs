//! SSH session management.
//!
//! Owns exactly one live SSH transport per request: connect with a bounded
//! wait, try authentication strategies in plan order, run commands, and
//! move files over SFTP. The transport is closed on every exit path.
//!
//! `ssh2` sits behind the [`Transport`] trait so the fallback loop and the
//! orchestrator are testable without a live server.

use secrecy::ExposeSecret;
use ssh2::{ErrorCode, Session};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{self, AuthAttemptPlan, AuthStrategy};
use crate::config::ConnectionSpec;
use crate::error::{AuthAttempt, Result, RiptideError};

/// Captured output of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code of the remote process. Nonzero is data, not an error.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Connection-level operations the session manager drives.
pub trait Transport {
    /// Attempt one authentication strategy. Returns the failure reason on
    /// rejection so the caller can accumulate it.
    fn authenticate(
        &mut self,
        username: &str,
        strategy: &AuthStrategy,
    ) -> std::result::Result<(), String>;

    /// Run a command line in a remote shell to completion, capturing exit
    /// code and full output. Buffered, not streamed: remote invocations
    /// are single, bounded operations.
    fn exec(&mut self, command_line: &str) -> Result<ExecOutput>;

    /// Read a remote file. `Ok(None)` means the file does not exist.
    fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write a remote file, creating parent directories as needed.
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Tear down the underlying connection.
    fn disconnect(&mut self);
}

/// Production transport over libssh2.
pub struct Ssh2Transport {
    session: Session,
    endpoint: String,
}

impl Ssh2Transport {
    /// Open the TCP connection and complete the SSH protocol handshake.
    ///
    /// A failure here is `Unreachable` and short-circuits before any
    /// authentication attempt. The configured connect timeout bounds address
    /// resolution, TCP connect, and the handshake.
    pub fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let endpoint = spec.endpoint();
        let conn_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            RiptideError::Unreachable {
                endpoint: endpoint.clone(),
                source: Some(source),
            }
        };

        debug!(endpoint = %endpoint, "connecting");
        let addr = endpoint
            .to_socket_addrs()
            .map_err(|e| conn_failed(Box::new(e)))?
            .next()
            .ok_or_else(|| RiptideError::Unreachable {
                endpoint: endpoint.clone(),
                source: None,
            })?;
        let tcp = TcpStream::connect_timeout(&addr, spec.connect_timeout)
            .map_err(|e| conn_failed(Box::new(e)))?;

        let mut session = Session::new().map_err(|e| conn_failed(Box::new(e)))?;
        session.set_tcp_stream(tcp);
        // Bounds the handshake and the auth attempts; cleared once
        // authenticated since downloads may run long.
        session.set_timeout(connect_timeout_ms(spec.connect_timeout));
        session
            .handshake()
            .map_err(|e| conn_failed(Box::new(e)))?;

        info!(endpoint = %endpoint, "transport established");
        Ok(Self { session, endpoint })
    }

    fn agent_auth(&mut self, username: &str) -> std::result::Result<(), String> {
        let mut agent = self
            .session
            .agent()
            .map_err(|e| format!("failed to reach SSH agent: {}", e))?;

        let agent_failure = match agent
            .connect()
            .and_then(|_| agent.list_identities())
            .map_err(|e| e.to_string())
        {
            Ok(()) => {
                let identities = agent.identities().map_err(|e| e.to_string())?;
                if identities.is_empty() {
                    Some("agent holds no identities".to_string())
                } else {
                    let mut accepted = false;
                    for identity in identities {
                        if agent.userauth(username, &identity).is_ok() {
                            accepted = true;
                            break;
                        }
                    }
                    if accepted {
                        None
                    } else {
                        Some("no agent identity was accepted".to_string())
                    }
                }
            }
            Err(e) => Some(format!("agent unavailable: {}", e)),
        };

        let agent_failure = match agent_failure {
            None => return Ok(()),
            Some(reason) => reason,
        };

        // Fall back to the conventional default key files, matching what a
        // plain `ssh` invocation would reach for.
        let home = dirs::home_dir().ok_or_else(|| {
            format!("{}; no home directory for default keys", agent_failure)
        })?;
        for name in ["id_ed25519", "id_rsa"] {
            let key_path = home.join(".ssh").join(name);
            if !key_path.exists() {
                continue;
            }
            if self
                .session
                .userauth_pubkey_file(username, None, &key_path, None)
                .is_ok()
            {
                return Ok(());
            }
        }

        Err(format!("{}; no default key was accepted", agent_failure))
    }

    fn remote_io(&self, path: &str, message: impl Into<String>) -> RiptideError {
        RiptideError::RemoteIo {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// The SFTP status for a path that does not exist.
fn is_missing(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(2)) || matches!(err.code(), ErrorCode::Session(-31))
}

/// Millisecond timeout for `Session::set_timeout`, saturating instead of
/// truncating for out-of-range durations.
fn connect_timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Paired stdout/stderr reads over one remote channel.
trait ChannelStreams {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn at_eof(&self) -> bool;
}

impl ChannelStreams for ssh2::Channel {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stderr().read(buf)
    }

    fn at_eof(&self) -> bool {
        self.eof()
    }
}

/// Drain stdout and stderr together until the remote end signals EOF.
///
/// The two streams share one channel receive window, so neither may be
/// read to EOF while the other goes unread: a remote process writing
/// more than a window's worth to the unread stream blocks on its pipe
/// and never exits. Reads are non-blocking; `WouldBlock` means no data
/// for that stream yet, `Ok(0)` means that stream is finished.
fn drain_streams(streams: &mut impl ChannelStreams) -> io::Result<(String, String)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let mut pending = false;
        let out_n = match streams.read_stdout(&mut buf) {
            Ok(n) => {
                stdout.extend_from_slice(&buf[..n]);
                n
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                pending = true;
                0
            }
            Err(e) => return Err(e),
        };
        let err_n = match streams.read_stderr(&mut buf) {
            Ok(n) => {
                stderr.extend_from_slice(&buf[..n]);
                n
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                pending = true;
                0
            }
            Err(e) => return Err(e),
        };

        if out_n == 0 && err_n == 0 {
            if !pending && streams.at_eof() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

impl Transport for Ssh2Transport {
    fn authenticate(
        &mut self,
        username: &str,
        strategy: &AuthStrategy,
    ) -> std::result::Result<(), String> {
        match strategy {
            AuthStrategy::PublicKey {
                key_path,
                passphrase,
            } => {
                let passphrase: Option<&str> = passphrase.as_ref().map(|p| p.expose_secret());
                self.session
                    .userauth_pubkey_file(username, None, key_path, passphrase)
                    .map_err(|e| e.to_string())?;
            }
            AuthStrategy::AgentOrDefaultKey => self.agent_auth(username)?,
            AuthStrategy::Password(password) => {
                self.session
                    .userauth_password(username, password.expose_secret())
                    .map_err(|e| e.to_string())?;
            }
        }

        if !self.session.authenticated() {
            return Err("server rejected the authentication attempt".to_string());
        }

        // Only session establishment is bounded; command execution and
        // file transfer wait as long as they need.
        self.session.set_timeout(0);
        Ok(())
    }

    fn exec(&mut self, command_line: &str) -> Result<ExecOutput> {
        let exec_failed = |message: String| RiptideError::RemoteExec {
            command: command_line.to_string(),
            message,
        };

        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| exec_failed(format!("failed to open channel: {}", e)))?;
        channel
            .exec(command_line)
            .map_err(|e| exec_failed(e.to_string()))?;

        self.session.set_blocking(false);
        let drained = drain_streams(&mut channel);
        self.session.set_blocking(true);
        let (stdout, stderr) =
            drained.map_err(|e| exec_failed(format!("failed to read output: {}", e)))?;

        channel
            .wait_close()
            .map_err(|e| exec_failed(e.to_string()))?;
        let exit_code = channel
            .exit_status()
            .map_err(|e| exec_failed(e.to_string()))?;

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let sftp = self
            .session
            .sftp()
            .map_err(|e| self.remote_io(path, format!("failed to open SFTP channel: {}", e)))?;

        let mut file = match sftp.open(Path::new(path)) {
            Ok(file) => file,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(self.remote_io(path, e.to_string())),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| self.remote_io(path, e.to_string()))?;
        Ok(Some(data))
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let sftp = self
            .session
            .sftp()
            .map_err(|e| self.remote_io(path, format!("failed to open SFTP channel: {}", e)))?;

        // The settings directory may not exist on first run.
        if let Some(parent) = Path::new(path).parent() {
            let mut current = std::path::PathBuf::new();
            for component in parent.components() {
                current.push(component);
                if sftp.stat(&current).is_err() {
                    sftp.mkdir(&current, 0o755).ok();
                }
            }
        }

        let mut file = sftp
            .create(Path::new(path))
            .map_err(|e| self.remote_io(path, format!("failed to create file: {}", e)))?;
        file.write_all(data)
            .map_err(|e| self.remote_io(path, e.to_string()))?;
        Ok(())
    }

    fn disconnect(&mut self) {
        debug!(endpoint = %self.endpoint, "closing transport");
        let _ = self
            .session
            .disconnect(None, "closing session", None);
    }
}

/// One live authenticated SSH session.
///
/// Closing happens through scoped acquisition: the transport is torn down
/// when the session is dropped, so every exit path releases the connection.
#[derive(Debug)]
pub struct RemoteSession<T: Transport = Ssh2Transport> {
    transport: T,
    strategy: &'static str,
    closed: bool,
}

impl RemoteSession<Ssh2Transport> {
    /// Connect and authenticate per the attempt plan built from the spec.
    pub fn open(spec: &ConnectionSpec) -> Result<Self> {
        let transport = Ssh2Transport::connect(spec)?;
        let plan = auth::plan(spec);
        Self::authenticate(transport, &spec.username, &plan)
    }
}

impl<T: Transport> RemoteSession<T> {
    /// Try each strategy in order; the first one that completes a full
    /// handshake wins. Strategies run sequentially, never in parallel, to
    /// avoid tripping server-side lockout policies. If all fail, every
    /// attempt and its reason is reported in one `AuthExhausted` value.
    pub fn authenticate(
        mut transport: T,
        username: &str,
        plan: &AuthAttemptPlan,
    ) -> Result<Self> {
        let mut attempts = Vec::new();
        for strategy in plan.strategies() {
            debug!(strategy = strategy.name(), "attempting authentication");
            match transport.authenticate(username, strategy) {
                Ok(()) => {
                    info!(strategy = strategy.name(), "authenticated");
                    return Ok(Self {
                        transport,
                        strategy: strategy.name(),
                        closed: false,
                    });
                }
                Err(reason) => {
                    debug!(strategy = strategy.name(), reason, "strategy failed");
                    attempts.push(AuthAttempt {
                        strategy: strategy.name().to_string(),
                        reason,
                    });
                }
            }
        }

        transport.disconnect();
        Err(RiptideError::AuthExhausted { attempts })
    }

    /// Name of the strategy that won the session.
    pub fn auth_strategy(&self) -> &'static str {
        self.strategy
    }

    /// Run a command line to completion. A nonzero exit code is reported
    /// in the result, not raised as an error.
    pub fn run(&mut self, command_line: &str) -> Result<ExecOutput> {
        debug!(command = command_line, "running remote command");
        let output = self.transport.exec(command_line)?;
        if output.exit_code != 0 {
            warn!(
                exit_code = output.exit_code,
                command = command_line,
                "remote command exited nonzero"
            );
        }
        Ok(output)
    }

    /// Read a remote file. `Ok(None)` means it does not exist.
    pub fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        self.transport.read_file(path)
    }

    /// Write a remote file.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.transport.write_file(path, data)
    }

    /// Explicitly close the session. Idempotent; also happens on drop.
    pub fn close(&mut self) {
        if !self.closed {
            self.transport.disconnect();
            self.closed = true;
        }
    }
}

impl<T: Transport> Drop for RemoteSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}
