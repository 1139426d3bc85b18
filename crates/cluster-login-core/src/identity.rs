//! Identity acquisition and the identities actions run under.
//!
//! An [`Identity`] is produced by the [`IdentityAcquirer`] in one of two
//! ways: a keytab-based Kerberos login, which validates credential material
//! and exports the process-wide Kerberos environment, or remote-user
//! impersonation, which trusts the caller and touches nothing. Either way
//! the identity lives only for the duration of one login call and is handed
//! to exactly one action via [`Identity::run_as`].

use std::fmt;
use std::fs;
use std::io;
use std::str::FromStr;

use tracing::{debug, info_span};

use crate::config::{KerberosCredentials, ProtocolSettings};
use crate::error::{AuthError, AuthResult};

/// Environment variable GSSAPI-linked client libraries read the Kerberos
/// configuration file from.
pub const KRB5_CONFIG_ENV: &str = "KRB5_CONFIG";

/// Environment variable GSSAPI-linked client libraries read the client
/// keytab from.
pub const KRB5_CLIENT_KTNAME_ENV: &str = "KRB5_CLIENT_KTNAME";

/// A Kerberos principal of the form `primary[/instance][@REALM]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosPrincipal {
    primary: String,
    instance: Option<String>,
    realm: Option<String>,
}

impl KerberosPrincipal {
    /// The primary component, e.g. the service or user name.
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// The instance component, usually a host name.
    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// The realm, without the `@` separator.
    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }
}

impl FromStr for KerberosPrincipal {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &'static str| AuthError::MalformedPrincipal {
            principal: s.to_string(),
            reason,
        };

        if s.is_empty() {
            return Err(malformed("empty principal"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(malformed("whitespace in principal"));
        }

        let (name, realm) = match s.split_once('@') {
            None => (s, None),
            Some((name, realm)) => {
                if realm.is_empty() {
                    return Err(malformed("empty realm"));
                }
                if realm.contains('@') {
                    return Err(malformed("multiple realm separators"));
                }
                (name, Some(realm.to_string()))
            }
        };

        let mut components = name.split('/');
        let primary = components.next().unwrap_or_default();
        if primary.is_empty() {
            return Err(malformed("empty primary component"));
        }
        let instance = match components.next() {
            None => None,
            Some("") => return Err(malformed("empty instance component")),
            Some(instance) => Some(instance.to_string()),
        };
        if components.next().is_some() {
            return Err(malformed("too many principal components"));
        }

        Ok(Self {
            primary: primary.to_string(),
            instance,
            realm,
        })
    }
}

impl fmt::Display for KerberosPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if let Some(instance) = &self.instance {
            write!(f, "/{instance}")?;
        }
        if let Some(realm) = &self.realm {
            write!(f, "@{realm}")?;
        }
        Ok(())
    }
}

/// How an identity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityOrigin {
    /// Keytab-based Kerberos login.
    Keytab,
    /// Remote-user impersonation, no credential verification.
    RemoteUser,
}

impl IdentityOrigin {
    /// Stable lowercase name, used in log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keytab => "keytab",
            Self::RemoteUser => "remote-user",
        }
    }
}

impl fmt::Display for IdentityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An acquired identity, valid for a single action.
///
/// Identities are never cached: each login call produces a fresh one and
/// drops it when the call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    principal: String,
    origin: IdentityOrigin,
}

impl Identity {
    pub(crate) fn new(principal: impl Into<String>, origin: IdentityOrigin) -> Self {
        Self {
            principal: principal.into(),
            origin,
        }
    }

    /// The principal this identity acts as.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// How this identity was obtained.
    #[must_use]
    pub fn origin(&self) -> IdentityOrigin {
        self.origin
    }

    /// True when the identity was asserted rather than authenticated.
    #[must_use]
    pub fn is_impersonated(&self) -> bool {
        matches!(self.origin, IdentityOrigin::RemoteUser)
    }

    /// Run the caller's action as this identity.
    ///
    /// The action result is returned bit for bit: no retry, no timeout, no
    /// error wrapping. The surrounding login call still holds the
    /// process-wide lock, so the action must be short-lived and must not
    /// call back into the coordinator.
    pub fn run_as<T, E, F>(&self, settings: &ProtocolSettings, action: F) -> Result<T, E>
    where
        F: FnOnce(&ProtocolSettings, &Identity) -> Result<T, E>,
    {
        let span = info_span!(
            "run_as",
            principal = %self.principal,
            origin = self.origin.as_str(),
        );
        span.in_scope(|| action(settings, self))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.principal, self.origin)
    }
}

/// Acquires identities for the two supported login flows.
#[derive(Debug, Default)]
pub struct IdentityAcquirer;

impl IdentityAcquirer {
    /// Create a new acquirer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Perform a keytab-based Kerberos login.
    ///
    /// Validates the credential material locally (principal shape, Kerberos
    /// config presence, keytab readability) and exports [`KRB5_CONFIG_ENV`]
    /// and [`KRB5_CLIENT_KTNAME_ENV`] so the clients the action opens pick
    /// up the identity. The KDC exchange itself happens when such a client
    /// first uses it.
    ///
    /// Mutates process-wide environment; callers hold the security lock
    /// across this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the principal is malformed or the credential
    /// files are missing or unusable.
    pub fn login_from_keytab(&self, credentials: &KerberosCredentials) -> AuthResult<Identity> {
        let principal = credentials.principal();
        let parsed: KerberosPrincipal = principal.parse()?;

        let krb5_config = credentials.krb5_config();
        if !krb5_config.is_file() {
            return Err(AuthError::Krb5ConfigMissing {
                path: krb5_config.display().to_string(),
            });
        }

        let keytab = credentials.keytab();
        let file = fs::File::open(&keytab).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AuthError::KeytabNotFound {
                    path: keytab.display().to_string(),
                }
            } else {
                AuthError::KeytabUnreadable {
                    path: keytab.display().to_string(),
                    source,
                }
            }
        })?;
        let metadata = file.metadata().map_err(|source| AuthError::KeytabUnreadable {
            path: keytab.display().to_string(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(AuthError::KeytabInvalid {
                path: keytab.display().to_string(),
                reason: "not a regular file",
            });
        }
        if metadata.len() == 0 {
            return Err(AuthError::KeytabInvalid {
                path: keytab.display().to_string(),
                reason: "keytab file is empty",
            });
        }

        std::env::set_var(KRB5_CONFIG_ENV, krb5_config.as_os_str());
        std::env::set_var(KRB5_CLIENT_KTNAME_ENV, keytab.as_os_str());

        debug!(
            principal = %parsed,
            realm = parsed.realm().unwrap_or("<default>"),
            keytab = %keytab.display(),
            "keytab login complete"
        );

        Ok(Identity::new(principal, IdentityOrigin::Keytab))
    }

    /// Build an impersonated identity for the named user.
    ///
    /// No verification and no process-wide side effects. Callers reject
    /// blank names before acquiring the lock.
    #[must_use]
    pub fn impersonate(&self, remote_user: &str) -> Identity {
        debug!(remote_user, "impersonating remote user");
        Identity::new(remote_user, IdentityOrigin::RemoteUser)
    }
}
