//! Entry points that acquire an identity and run a caller action under the
//! process-wide security lock.
//!
//! Validation order is part of the contract: configuration problems are
//! rejected before the lock is taken and before anything is touched, while
//! credential-material problems surface from inside the critical section.
//! The caller's action always runs with the lock still held.

use std::sync::{Arc, MutexGuard};
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::config::{
    AuthenticationMode, KerberosCredentials, ProtocolSettings, RegistrySaslOptions,
    RegistrySaslPlan,
};
use crate::error::{ConfigError, LoginError, LoginResult};
use crate::identity::{Identity, IdentityAcquirer};
use crate::metrics::LoginMetrics;
use crate::runtime::{SecurityRuntime, SecurityState};
use crate::sasl::{self, SaslClientEntry};

/// Coordinates identity acquisition and action execution.
///
/// Every authenticator created with [`CredentialAuthenticator::new`] shares
/// the process-wide [`SecurityRuntime`], so logins serialize across the
/// whole process no matter how many authenticators exist.
pub struct CredentialAuthenticator {
    runtime: Arc<SecurityRuntime>,
    acquirer: IdentityAcquirer,
    metrics: Arc<LoginMetrics>,
}

impl CredentialAuthenticator {
    /// Create an authenticator on the process-wide runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runtime(SecurityRuntime::global())
    }

    /// Create an authenticator on a specific runtime.
    ///
    /// Logins serialize only against other users of the same runtime; tests
    /// use this with an isolated [`SecurityRuntime::new`] instance.
    #[must_use]
    pub fn with_runtime(runtime: Arc<SecurityRuntime>) -> Self {
        Self {
            runtime,
            acquirer: IdentityAcquirer::new(),
            metrics: Arc::new(LoginMetrics::new()),
        }
    }

    /// Replace the metrics collection, e.g. to share one registry between
    /// several authenticators.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LoginMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The metrics recorded by this authenticator.
    #[must_use]
    pub fn metrics(&self) -> &LoginMetrics {
        &self.metrics
    }

    /// The runtime this authenticator serializes against.
    #[must_use]
    pub fn runtime(&self) -> &Arc<SecurityRuntime> {
        &self.runtime
    }

    /// Acquire a Kerberos identity from a keytab and run `action` under it.
    ///
    /// In order: validates the configuration (before the lock, touching
    /// nothing), enters the critical section, records the Kerberos config
    /// location and exports the Kerberos environment, installs the registry
    /// SASL entry when a non-blank registry namespace enables it, installs
    /// `settings` as the active process-wide configuration, performs the
    /// keytab login, and only then runs `action` with the lock still held.
    /// The lock is released on every exit path.
    ///
    /// Partial state from a failed call stays in place; the next login
    /// overwrites it. The action must be short-lived and must not call back
    /// into this authenticator, or it will deadlock on the same lock.
    ///
    /// # Errors
    ///
    /// - [`LoginError::Config`] when `settings` is not in Kerberos mode, a
    ///   credential field is blank, or the registry options are inconsistent
    /// - [`LoginError::Auth`] when the login step rejects the credential
    ///   material
    /// - [`LoginError::Interrupted`] when the lock was poisoned by a login
    ///   that panicked on another thread
    /// - [`LoginError::Action`] carrying the action's own error untouched
    #[instrument(level = "debug", skip_all, fields(principal = %credentials.principal()))]
    pub fn login_with_kerberos<T, E, F>(
        &self,
        settings: &ProtocolSettings,
        credentials: &KerberosCredentials,
        registry: Option<&RegistrySaslOptions>,
        action: F,
    ) -> LoginResult<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        let result = self.kerberos_login(settings, credentials, registry, action);
        self.finish("kerberos", &result);
        result
    }

    /// Impersonate `remote_user` and run `action` under that identity.
    ///
    /// No credential verification and no writes to the process-wide state;
    /// the call still serializes against every other login on the same
    /// runtime, and the action runs with the lock held.
    ///
    /// # Errors
    ///
    /// - [`LoginError::Config`] when `remote_user` is blank
    /// - [`LoginError::Interrupted`] when the lock was poisoned
    /// - [`LoginError::Action`] carrying the action's own error untouched
    #[instrument(level = "debug", skip_all, fields(remote_user = %remote_user))]
    pub fn login_with_remote_user<T, E, F>(
        &self,
        settings: &ProtocolSettings,
        remote_user: &str,
        action: F,
    ) -> LoginResult<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        let result = self.remote_user_login(settings, remote_user, action);
        self.finish("remote_user", &result);
        result
    }

    fn kerberos_login<T, E, F>(
        &self,
        settings: &ProtocolSettings,
        credentials: &KerberosCredentials,
        registry: Option<&RegistrySaslOptions>,
        action: F,
    ) -> LoginResult<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        if settings.authentication_mode != AuthenticationMode::Kerberos {
            return Err(ConfigError::AuthModeMismatch {
                expected: AuthenticationMode::Kerberos,
                actual: settings.authentication_mode,
            }
            .into());
        }
        credentials.validate()?;
        let registry_plan = match registry {
            Some(options) => options.resolve()?,
            None => None,
        };

        let wait_start = Instant::now();
        let state = self.runtime.lock().map_err(|_| LoginError::Interrupted)?;
        self.metrics
            .observe_lock_wait(wait_start.elapsed().as_secs_f64());

        let held_start = Instant::now();
        let result = self.kerberos_under_lock(state, settings, credentials, registry_plan, action);
        self.metrics
            .observe_lock_held(held_start.elapsed().as_secs_f64());
        result
    }

    fn kerberos_under_lock<T, E, F>(
        &self,
        mut state: MutexGuard<'_, SecurityState>,
        settings: &ProtocolSettings,
        credentials: &KerberosCredentials,
        registry_plan: Option<RegistrySaslPlan>,
        action: F,
    ) -> LoginResult<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        state.set_krb5_config(credentials.krb5_config());

        if let Some(plan) = registry_plan {
            sasl::configure_client(
                &mut state,
                &plan.sasl_client_config,
                SaslClientEntry::new(credentials.principal(), credentials.keytab()),
                &plan.server_principal,
            );
            self.metrics.record_registry_sasl_configured();
        }

        state.install_settings(settings.clone());
        debug!(
            generation = state.generation(),
            "active protocol settings installed"
        );

        let identity = self.acquirer.login_from_keytab(credentials)?;
        debug!(identity = %identity, "identity acquired, running action");

        identity.run_as(settings, action).map_err(LoginError::Action)
    }

    fn remote_user_login<T, E, F>(
        &self,
        settings: &ProtocolSettings,
        remote_user: &str,
        action: F,
    ) -> LoginResult<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        if remote_user.trim().is_empty() {
            return Err(ConfigError::MissingCredentialField {
                field: "remote_user",
            }
            .into());
        }

        let wait_start = Instant::now();
        let state = self.runtime.lock().map_err(|_| LoginError::Interrupted)?;
        self.metrics
            .observe_lock_wait(wait_start.elapsed().as_secs_f64());

        let held_start = Instant::now();
        let result = self.remote_user_under_lock(state, settings, remote_user, action);
        self.metrics
            .observe_lock_held(held_start.elapsed().as_secs_f64());
        result
    }

    fn remote_user_under_lock<T, E, F>(
        &self,
        _state: MutexGuard<'_, SecurityState>,
        settings: &ProtocolSettings,
        remote_user: &str,
        action: F,
    ) -> LoginResult<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        // The guard pins the critical section for the duration of the action.
        let identity = self.acquirer.impersonate(remote_user);
        identity.run_as(settings, action).map_err(LoginError::Action)
    }

    fn finish<T, E>(&self, mode: &'static str, result: &LoginResult<T, E>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(LoginError::Config(_)) => "config_error",
            Err(LoginError::Auth(_)) => "auth_error",
            Err(LoginError::Interrupted) => "interrupted",
            Err(LoginError::Action(_)) => "action_error",
        };
        self.metrics.record_attempt(mode, outcome);

        match result {
            Ok(_) => debug!(mode, "login succeeded"),
            Err(LoginError::Config(error)) => {
                warn!(mode, error = %error, "login rejected by validation");
            }
            Err(LoginError::Auth(error)) => warn!(mode, error = %error, "login failed"),
            Err(LoginError::Interrupted) => warn!(mode, "login interrupted by poisoned lock"),
            Err(LoginError::Action(_)) => debug!(mode, "login action returned an error"),
        }
    }
}

impl Default for CredentialAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn isolated() -> CredentialAuthenticator {
        CredentialAuthenticator::with_runtime(Arc::new(SecurityRuntime::new()))
    }

    #[test]
    fn test_mode_mismatch_is_config_error() {
        let authenticator = isolated();
        let settings = ProtocolSettings::new(AuthenticationMode::RemoteUser);
        let credentials = KerberosCredentials {
            krb5_config: "/nonexistent/krb5.conf".to_string(),
            principal: "svc/host@EXAMPLE.COM".to_string(),
            keytab: "/nonexistent/svc.keytab".to_string(),
        };

        let result: LoginResult<(), Infallible> =
            authenticator.login_with_kerberos(&settings, &credentials, None, |_, _| Ok(()));

        assert!(matches!(
            result,
            Err(LoginError::Config(ConfigError::AuthModeMismatch {
                expected: AuthenticationMode::Kerberos,
                actual: AuthenticationMode::RemoteUser,
            }))
        ));

        let output = authenticator.metrics().encode().unwrap();
        assert!(output.contains("config_error"));
    }

    #[test]
    fn test_blank_remote_user_rejected() {
        let authenticator = isolated();
        let settings = ProtocolSettings::new(AuthenticationMode::RemoteUser);

        let result: LoginResult<(), Infallible> =
            authenticator.login_with_remote_user(&settings, "   ", |_, _| Ok(()));

        assert!(matches!(
            result,
            Err(LoginError::Config(ConfigError::MissingCredentialField {
                field: "remote_user"
            }))
        ));
    }

    #[test]
    fn test_remote_user_login_records_success() {
        let authenticator = isolated();
        let settings = ProtocolSettings::new(AuthenticationMode::RemoteUser);

        let principal = authenticator
            .login_with_remote_user(&settings, "alice", |_, identity| {
                Ok::<_, Infallible>(identity.principal().to_string())
            })
            .unwrap();

        assert_eq!(principal, "alice");
        let output = authenticator.metrics().encode().unwrap();
        assert!(output.contains("remote_user"));
        assert!(output.contains("success"));
    }

    #[test]
    fn test_with_metrics_shares_collection() {
        let metrics = Arc::new(LoginMetrics::new());
        let runtime = Arc::new(SecurityRuntime::new());
        let first = CredentialAuthenticator::with_runtime(Arc::clone(&runtime))
            .with_metrics(Arc::clone(&metrics));
        let second = CredentialAuthenticator::with_runtime(runtime).with_metrics(Arc::clone(&metrics));

        let settings = ProtocolSettings::new(AuthenticationMode::RemoteUser);
        first
            .login_with_remote_user(&settings, "alice", |_, _| Ok::<_, Infallible>(()))
            .unwrap();
        second
            .login_with_remote_user(&settings, "bob", |_, _| Ok::<_, Infallible>(()))
            .unwrap();

        let output = metrics.encode().unwrap();
        assert!(output.contains("cluster_login_attempts_total"));
    }
}
