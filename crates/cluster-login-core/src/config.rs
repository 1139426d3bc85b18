//! Configuration types for the login coordinator.
//!
//! Configuration is loaded from YAML files and validated before use. All
//! validation here is pre-lock: a config rejected by these checks never
//! touches the process-wide security state.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::sasl::DEFAULT_SASL_CLIENT_CONFIG;

/// How the coordinator acquires an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationMode {
    /// Keytab-based Kerberos login.
    Kerberos,
    /// Impersonation of a named user, no credential verification.
    RemoteUser,
}

impl AuthenticationMode {
    /// Check if this mode performs a real credential exchange.
    #[must_use]
    pub fn is_kerberos(&self) -> bool {
        matches!(self, Self::Kerberos)
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kerberos => f.write_str("KERBEROS"),
            Self::RemoteUser => f.write_str("REMOTE_USER"),
        }
    }
}

/// Security settings handed to the action, with the authentication mode on
/// top and an opaque property bag underneath.
///
/// The coordinator reads only the mode. The properties are carried through
/// to the action untouched, in insertion-independent order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProtocolSettings {
    /// The configured authentication mode.
    #[serde(rename = "mode")]
    pub authentication_mode: AuthenticationMode,

    /// Opaque settings for the action's own clients.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ProtocolSettings {
    /// Create settings for the given mode with an empty property bag.
    #[must_use]
    pub fn new(authentication_mode: AuthenticationMode) -> Self {
        Self {
            authentication_mode,
            properties: BTreeMap::new(),
        }
    }

    /// Add a property, builder style.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Credential material for a keytab-based Kerberos login.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KerberosCredentials {
    /// Path to the Kerberos configuration file (krb5.conf).
    pub krb5_config: String,

    /// Principal to log in as, e.g. "svc/host@EXAMPLE.COM".
    /// Supports environment variable expansion: "${LOGIN_PRINCIPAL}"
    pub principal: String,

    /// Path to the keytab file holding the principal's keys.
    pub keytab: String,
}

impl KerberosCredentials {
    /// Get the Kerberos config path with environment variables expanded.
    #[must_use]
    pub fn krb5_config(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.krb5_config))
    }

    /// Get the principal with environment variables expanded.
    #[must_use]
    pub fn principal(&self) -> String {
        expand_env_vars(&self.principal)
    }

    /// Get the keytab path with environment variables expanded.
    #[must_use]
    pub fn keytab(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.keytab))
    }

    /// Validate that every required field is present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing field. Filesystem checks
    /// happen later, inside the critical section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.krb5_config.trim().is_empty() {
            return Err(ConfigError::MissingCredentialField {
                field: "krb5_config",
            });
        }
        if self.principal.trim().is_empty() {
            return Err(ConfigError::MissingCredentialField { field: "principal" });
        }
        if self.keytab.trim().is_empty() {
            return Err(ConfigError::MissingCredentialField { field: "keytab" });
        }
        Ok(())
    }
}

/// Optional SASL options for a secondary coordination registry.
///
/// A non-blank `namespace` is the sole trigger: when it is absent or blank
/// the whole block is ignored and no registry configuration happens.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RegistrySaslOptions {
    /// Registry namespace the platform coordinates under. Enables registry
    /// SASL configuration when non-blank.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Principal the registry server authenticates as.
    /// Supports environment variable expansion: "${REGISTRY_PRINCIPAL}"
    #[serde(default)]
    pub server_principal: Option<String>,

    /// Name the client SASL entry is installed under.
    /// If not set, defaults to "Client".
    #[serde(default)]
    pub sasl_client_config: Option<String>,
}

/// Registry SASL settings after gating, defaulting, and expansion.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegistrySaslPlan {
    pub(crate) sasl_client_config: String,
    pub(crate) server_principal: String,
}

impl RegistrySaslOptions {
    /// Check whether registry SASL configuration is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.namespace
            .as_deref()
            .is_some_and(|ns| !ns.trim().is_empty())
    }

    /// Get the SASL entry name for the registry client.
    ///
    /// Returns the configured `sasl_client_config` if set,
    /// otherwise falls back to "Client".
    #[must_use]
    pub fn sasl_client_config_name(&self) -> &str {
        self.sasl_client_config
            .as_deref()
            .unwrap_or(DEFAULT_SASL_CLIENT_CONFIG)
    }

    /// Get the registry server principal with environment variables expanded.
    #[must_use]
    pub fn server_principal(&self) -> Option<String> {
        self.server_principal.as_deref().map(expand_env_vars)
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace enables registry SASL but no server
    /// principal was provided.
    pub fn validate(&self) -> ConfigResult<()> {
        self.resolve().map(|_| ())
    }

    /// Apply the gate and the defaults, yielding what the configurer installs.
    ///
    /// `Ok(None)` means the block is disabled and must be skipped entirely.
    pub(crate) fn resolve(&self) -> ConfigResult<Option<RegistrySaslPlan>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let server_principal = match self.server_principal() {
            Some(principal) if !principal.trim().is_empty() => principal,
            _ => return Err(ConfigError::MissingServerPrincipal),
        };
        Ok(Some(RegistrySaslPlan {
            sasl_client_config: self.sasl_client_config_name().to_string(),
            server_principal,
        }))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output logs in JSON format (for production).
    #[serde(default)]
    pub json: bool,
}

/// Root configuration for the login probe tool.
///
/// Library callers usually construct [`ProtocolSettings`] and
/// [`KerberosCredentials`] directly; this type exists for the YAML surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginConfig {
    /// Authentication mode and the opaque settings for the action.
    pub auth: ProtocolSettings,

    /// Kerberos credential material (required when mode is KERBEROS).
    #[serde(default)]
    pub kerberos: Option<KerberosCredentials>,

    /// Registry SASL options for the coordination service.
    #[serde(default)]
    pub registry: Option<RegistrySaslOptions>,

    /// User to impersonate (required when mode is REMOTE_USER).
    #[serde(default)]
    pub remote_user: Option<String>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Expand environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable `VAR_NAME`.
/// If the variable is not set, replaces with an empty string.
fn expand_env_vars(s: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex");
    re.replace_all(s, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .to_string()
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Configuration loading and validation

impl LoginConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration against its own mode.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - mode is KERBEROS and the `kerberos` section is absent or incomplete
    /// - mode is KERBEROS and the `registry` block enables SASL without a
    ///   server principal
    /// - mode is REMOTE_USER and `remote_user` is absent or blank
    pub fn validate(&self) -> ConfigResult<()> {
        match self.auth.authentication_mode {
            AuthenticationMode::Kerberos => {
                let credentials = self
                    .kerberos
                    .as_ref()
                    .ok_or(ConfigError::MissingSection { section: "kerberos" })?;
                credentials.validate()?;
                if let Some(registry) = &self.registry {
                    registry.validate()?;
                }
            }
            AuthenticationMode::RemoteUser => {
                let blank = self
                    .remote_user
                    .as_deref()
                    .map_or(true, |user| user.trim().is_empty());
                if blank {
                    return Err(ConfigError::MissingCredentialField {
                        field: "remote_user",
                    });
                }
            }
        }
        Ok(())
    }
}
