/*!
 * Error types for Riptide
 */

use std::fmt;

pub type Result<T> = std::result::Result<T, RiptideError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_REMOTE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// One failed authentication attempt, recorded in the order it was tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    /// Strategy name ("public-key", "agent", "password")
    pub strategy: String,

    /// Failure reason reported by the transport
    pub reason: String,
}

#[derive(Debug)]
pub enum RiptideError {
    /// Input could not be resolved to a Tidal content reference
    InvalidInput(String),

    /// Transport-level connection failure (host unreachable, port closed, timeout)
    Unreachable {
        endpoint: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every authentication strategy in the plan failed
    AuthExhausted { attempts: Vec<AuthAttempt> },

    /// Remote settings file does not exist yet (expected on first run)
    ConfigMissing { path: String },

    /// Remote settings file exists but could not be parsed
    ConfigParse { path: String, message: String },

    /// Remote file read or write failed
    RemoteIo { path: String, message: String },

    /// Remote command could not be run (channel failure, not a nonzero exit)
    RemoteExec { command: String, message: String },
}

impl RiptideError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Bad input or no usable connection: nothing happened remotely
            RiptideError::InvalidInput(_)
            | RiptideError::Unreachable { .. }
            | RiptideError::AuthExhausted { .. } => EXIT_FATAL,
            // Remote state errors: the session worked, the operation did not
            RiptideError::ConfigMissing { .. }
            | RiptideError::ConfigParse { .. }
            | RiptideError::RemoteIo { .. }
            | RiptideError::RemoteExec { .. } => EXIT_REMOTE,
        }
    }

    /// Check if this error occurred before any remote side effect was possible
    pub fn is_input_error(&self) -> bool {
        matches!(self, RiptideError::InvalidInput(_))
    }

    /// Check if this error is a connectivity failure (never retried)
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            RiptideError::Unreachable { .. } | RiptideError::AuthExhausted { .. }
        )
    }

    /// Check if this error is an expected first-run condition rather than a fault
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RiptideError::ConfigMissing { .. })
    }
}

impl fmt::Display for RiptideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiptideError::InvalidInput(input) => {
                write!(f, "Could not parse Tidal URL or id: {}", input)
            }
            RiptideError::Unreachable { endpoint, source } => {
                if let Some(src) = source {
                    write!(f, "Connection to {} failed: {}", endpoint, src)
                } else {
                    write!(f, "Connection to {} failed", endpoint)
                }
            }
            RiptideError::AuthExhausted { attempts } => {
                write!(f, "All {} authentication strategies failed: ", attempts.len())?;
                for (i, attempt) in attempts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} ({})", attempt.strategy, attempt.reason)?;
                }
                Ok(())
            }
            RiptideError::ConfigMissing { path } => {
                write!(f, "Remote settings file not found: {}", path)
            }
            RiptideError::ConfigParse { path, message } => {
                write!(f, "Failed to parse remote settings {}: {}", path, message)
            }
            RiptideError::RemoteIo { path, message } => {
                write!(f, "Remote I/O failed for {}: {}", path, message)
            }
            RiptideError::RemoteExec { command, message } => {
                write!(f, "Failed to run remote command '{}': {}", command, message)
            }
        }
    }
}

impl std::error::Error for RiptideError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RiptideError::Unreachable {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            RiptideError::InvalidInput("garbage".to_string()).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            RiptideError::Unreachable {
                endpoint: "example.com:22".to_string(),
                source: None,
            }
            .exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            RiptideError::AuthExhausted { attempts: vec![] }.exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            RiptideError::ConfigMissing {
                path: "settings.json".to_string()
            }
            .exit_code(),
            EXIT_REMOTE
        );
        assert_eq!(
            RiptideError::RemoteExec {
                command: "tidal-dl-ng dl x".to_string(),
                message: "channel failure".to_string(),
            }
            .exit_code(),
            EXIT_REMOTE
        );
    }

    #[test]
    fn test_classification() {
        assert!(RiptideError::InvalidInput("x".to_string()).is_input_error());
        assert!(!RiptideError::InvalidInput("x".to_string()).is_connectivity());

        assert!(RiptideError::AuthExhausted { attempts: vec![] }.is_connectivity());
        assert!(RiptideError::Unreachable {
            endpoint: "h:22".to_string(),
            source: None,
        }
        .is_connectivity());

        assert!(RiptideError::ConfigMissing {
            path: "p".to_string()
        }
        .is_recoverable());
        assert!(!RiptideError::ConfigParse {
            path: "p".to_string(),
            message: "m".to_string(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_auth_exhausted_display_lists_strategies_in_order() {
        let err = RiptideError::AuthExhausted {
            attempts: vec![
                AuthAttempt {
                    strategy: "public-key".to_string(),
                    reason: "no such key file".to_string(),
                },
                AuthAttempt {
                    strategy: "agent".to_string(),
                    reason: "agent holds no identities".to_string(),
                },
                AuthAttempt {
                    strategy: "password".to_string(),
                    reason: "permission denied".to_string(),
                },
            ],
        };
        let display = err.to_string();
        assert!(display.contains("All 3 authentication strategies failed"));
        let key_pos = display.find("public-key").unwrap();
        let agent_pos = display.find("agent").unwrap();
        let password_pos = display.find("password").unwrap();
        assert!(key_pos < agent_pos && agent_pos < password_pos);
        assert!(display.contains("permission denied"));
    }

    #[test]
    fn test_display_carries_context() {
        let err = RiptideError::InvalidInput("spotify.com/track/1".to_string());
        assert!(err.to_string().contains("spotify.com/track/1"));

        let err = RiptideError::ConfigParse {
            path: ".config/tidal_dl_ng/settings.json".to_string(),
            message: "expected value at line 1".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("settings.json"));
        assert!(display.contains("expected value"));
    }

    #[test]
    fn test_error_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = RiptideError::Unreachable {
            endpoint: "example.com:22".to_string(),
            source: Some(Box::new(io_err)),
        };
        assert!(err.source().is_some());
        assert!(err.source().unwrap().to_string().contains("refused"));

        assert!(RiptideError::InvalidInput("x".to_string()).source().is_none());
    }
}
