//! Domain error types for the login coordinator.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.
//!
//! Failures are split by where they occur: [`ConfigError`] for anything
//! detectable before the process-wide lock is taken, [`AuthError`] for the
//! login step inside the critical section, and [`LoginError`] as the combined
//! result of an entry point, which additionally carries the caller's own
//! action error unwrapped.

use thiserror::Error;

use crate::config::AuthenticationMode;

/// Errors related to configuration parsing and validation.
///
/// These are always reported before the login lock is acquired and before
/// any process-wide state is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested login flow does not match the configured mode.
    #[error("authentication mode mismatch: expected {expected}, got {actual}")]
    AuthModeMismatch {
        expected: AuthenticationMode,
        actual: AuthenticationMode,
    },

    /// A required credential field is missing or blank.
    #[error("missing required credential field: {field}")]
    MissingCredentialField { field: &'static str },

    /// Registry SASL is enabled by a namespace but no server principal was given.
    #[error("registry namespace is set but no server principal was provided")]
    MissingServerPrincipal,

    /// A config section required by the configured mode is absent.
    #[error("missing config section '{section}' required by the configured mode")]
    MissingSection { section: &'static str },

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Errors raised by the login step itself, inside the critical section.
///
/// The lock is always released before one of these reaches the caller.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The principal string does not parse as `primary[/instance][@REALM]`.
    #[error("malformed kerberos principal '{principal}': {reason}")]
    MalformedPrincipal {
        principal: String,
        reason: &'static str,
    },

    /// The Kerberos configuration file does not exist.
    #[error("kerberos config file not found: {path}")]
    Krb5ConfigMissing { path: String },

    /// The keytab file does not exist.
    #[error("keytab file not found: {path}")]
    KeytabNotFound { path: String },

    /// The keytab file exists but cannot be opened or read.
    #[error("failed to read keytab '{path}': {source}")]
    KeytabUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The keytab file exists but is not usable credential material.
    #[error("invalid keytab '{path}': {reason}")]
    KeytabInvalid { path: String, reason: &'static str },
}

/// Combined result of a login entry point.
///
/// The `Action` variant carries the caller's error exactly as the action
/// returned it. The coordinator never wraps, converts, or retries it.
#[derive(Error, Debug)]
pub enum LoginError<E> {
    /// Rejected before the lock was acquired.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The login step failed inside the critical section.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The login lock was poisoned by a login that panicked on another thread.
    #[error("login interrupted: lock poisoned by a failed login on another thread")]
    Interrupted,

    /// The caller's action failed; the value is passed through untouched.
    #[error("login action failed: {0}")]
    Action(E),
}

impl<E> LoginError<E> {
    /// Extract the caller's action error, if that is what this is.
    pub fn into_action(self) -> Option<E> {
        match self {
            Self::Action(inner) => Some(inner),
            _ => None,
        }
    }

    /// True when the failure was pre-lock validation.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// True when the failure came from the login step itself.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for identity acquisition.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type alias for login entry points.
pub type LoginResult<T, E> = std::result::Result<T, LoginError<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::AuthModeMismatch {
            expected: AuthenticationMode::Kerberos,
            actual: AuthenticationMode::RemoteUser,
        };
        assert!(err.to_string().contains("KERBEROS"));
        assert!(err.to_string().contains("REMOTE_USER"));
    }

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::KeytabNotFound {
            path: "/etc/security/svc.keytab".to_string(),
        };
        assert!(err.to_string().contains("/etc/security/svc.keytab"));
    }

    #[test]
    fn test_login_error_from_config() {
        let err: LoginError<String> = ConfigError::MissingCredentialField { field: "principal" }.into();
        assert!(err.is_config());
        assert!(!err.is_auth());
    }

    #[test]
    fn test_login_error_from_auth() {
        let err: LoginError<String> = AuthError::Krb5ConfigMissing {
            path: "/etc/krb5.conf".to_string(),
        }
        .into();
        assert!(err.is_auth());
        assert!(!err.is_config());
    }

    #[test]
    fn test_into_action_extracts_caller_error() {
        let err: LoginError<&str> = LoginError::Action("backend unavailable");
        assert_eq!(err.into_action(), Some("backend unavailable"));

        let err: LoginError<&str> = LoginError::Interrupted;
        assert_eq!(err.into_action(), None);
    }

    #[test]
    fn test_login_error_display_includes_action_error() {
        let err: LoginError<&str> = LoginError::Action("backend unavailable");
        assert!(err.to_string().contains("backend unavailable"));
    }
}
