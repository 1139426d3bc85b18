//! Cluster Login Core Library
//!
//! This library acquires a security identity for data-connector workloads,
//! either through a keytab-based Kerberos login or by impersonating a named
//! remote user, and runs one caller-supplied action under that identity.
//! The security machinery underneath (Kerberos environment, active protocol
//! settings, registry SASL entries) is process-wide mutable state, so every
//! login call serializes against a single process-wide lock and the action
//! executes while that lock is still held.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Domain-specific error types
//! - [`runtime`] - Process-wide security state and its lock
//! - [`identity`] - Identity acquisition and action execution
//! - [`sasl`] - Registry SASL client configuration
//! - [`authenticator`] - The login entry points
//! - [`metrics`] - Prometheus metrics collection
//!
//! # Example
//!
//! ```
//! use cluster_login_core::{
//!     AuthenticationMode, CredentialAuthenticator, ProtocolSettings, SecurityRuntime,
//! };
//! use std::sync::Arc;
//!
//! let settings = ProtocolSettings::new(AuthenticationMode::RemoteUser);
//! let authenticator = CredentialAuthenticator::with_runtime(Arc::new(SecurityRuntime::new()));
//!
//! let principal = authenticator
//!     .login_with_remote_user(&settings, "etl-runner", |_, identity| {
//!         Ok::<_, std::convert::Infallible>(identity.principal().to_string())
//!     })
//!     .unwrap();
//! assert_eq!(principal, "etl-runner");
//! ```

#![forbid(unsafe_code)]

pub mod authenticator;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod runtime;
pub mod sasl;

// Re-export commonly used types
pub use authenticator::CredentialAuthenticator;
pub use config::{
    AuthenticationMode, KerberosCredentials, LoggingConfig, LoginConfig, ProtocolSettings,
    RegistrySaslOptions,
};
pub use error::{
    AuthError, AuthResult, ConfigError, ConfigResult, LoginError, LoginResult,
};
pub use identity::{
    Identity, IdentityAcquirer, IdentityOrigin, KerberosPrincipal, KRB5_CLIENT_KTNAME_ENV,
    KRB5_CONFIG_ENV,
};
pub use metrics::LoginMetrics;
pub use runtime::{SecurityRuntime, SecurityState};
pub use sasl::{SaslClientEntry, DEFAULT_SASL_CLIENT_CONFIG};
