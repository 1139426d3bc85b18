//! Client SASL configuration for the coordination registry.
//!
//! Some deployments coordinate through a secured registry service; before a
//! Kerberos login the coordinator installs a named client SASL entry and the
//! registry server principal into the process-wide state so the action's
//! registry client can authenticate. Installation happens under the already
//! held security lock and completes before the login step.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::runtime::SecurityState;

/// Name a registry client SASL entry is installed under when the caller
/// does not pick one.
pub const DEFAULT_SASL_CLIENT_CONFIG: &str = "Client";

/// Credential material a registry client authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslClientEntry {
    principal: String,
    keytab: PathBuf,
}

impl SaslClientEntry {
    /// Create an entry for the given principal and keytab.
    pub fn new(principal: impl Into<String>, keytab: impl Into<PathBuf>) -> Self {
        Self {
            principal: principal.into(),
            keytab: keytab.into(),
        }
    }

    /// The principal the registry client authenticates as.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// The keytab backing the entry.
    #[must_use]
    pub fn keytab(&self) -> &Path {
        &self.keytab
    }
}

/// Install a client entry and the expected server principal.
///
/// Overwrites any previous entry under the same name; nothing is ever
/// auto-removed.
pub(crate) fn configure_client(
    state: &mut SecurityState,
    name: &str,
    entry: SaslClientEntry,
    server_principal: &str,
) {
    debug!(
        name,
        principal = entry.principal(),
        server_principal,
        "installing registry sasl client entry"
    );
    state.install_sasl_entry(name, entry);
    state.set_registry_server_principal(server_principal);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_client_installs_entry_and_server_principal() {
        let mut state = SecurityState::default();
        let entry = SaslClientEntry::new("svc/host@EXAMPLE.COM", "/etc/security/svc.keytab");

        configure_client(
            &mut state,
            DEFAULT_SASL_CLIENT_CONFIG,
            entry.clone(),
            "zookeeper/hadoop.example.com",
        );

        assert_eq!(state.sasl_entry("Client"), Some(&entry));
        assert_eq!(
            state.registry_server_principal(),
            Some("zookeeper/hadoop.example.com")
        );
    }

    #[test]
    fn test_configure_client_under_custom_name() {
        let mut state = SecurityState::default();
        let entry = SaslClientEntry::new("svc/host@EXAMPLE.COM", "/etc/security/svc.keytab");

        configure_client(
            &mut state,
            "RegistryClient",
            entry.clone(),
            "zookeeper/hadoop.example.com",
        );

        assert_eq!(state.sasl_entry("RegistryClient"), Some(&entry));
        assert_eq!(state.sasl_entry(DEFAULT_SASL_CLIENT_CONFIG), None);
    }

    #[test]
    fn test_reconfiguration_overwrites() {
        let mut state = SecurityState::default();
        let first = SaslClientEntry::new("old/host@EXAMPLE.COM", "/etc/security/old.keytab");
        let second = SaslClientEntry::new("new/host@EXAMPLE.COM", "/etc/security/new.keytab");

        configure_client(&mut state, "Client", first, "zookeeper/old.example.com");
        configure_client(&mut state, "Client", second.clone(), "zookeeper/new.example.com");

        assert_eq!(state.sasl_entry("Client"), Some(&second));
        assert_eq!(
            state.registry_server_principal(),
            Some("zookeeper/new.example.com")
        );
        assert_eq!(state.sasl_entry_names(), vec!["Client"]);
    }
}
