//! Process-wide security state and the lock that serializes access to it.
//!
//! The underlying security machinery (Kerberos environment, active protocol
//! settings, registry SASL entries) is mutable process-wide state. A single
//! [`SecurityRuntime`] owns that state behind one mutex; holding the guard
//! *is* being inside the critical section, so every mutation and every
//! action execution is serialized by construction.
//!
//! Nothing in here ever rolls state back. A failed login may leave earlier
//! writes from the same critical section behind; the next successful login
//! overwrites them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::config::ProtocolSettings;
use crate::sasl::SaslClientEntry;

/// The process-wide mutable security state.
///
/// Reachable only through a [`SecurityRuntime`] guard or as a detached
/// [`SecurityRuntime::snapshot`] clone.
#[derive(Debug, Clone, Default)]
pub struct SecurityState {
    krb5_config: Option<PathBuf>,
    active: Option<ProtocolSettings>,
    sasl_entries: BTreeMap<String, SaslClientEntry>,
    registry_server_principal: Option<String>,
    generation: u64,
}

impl SecurityState {
    /// The Kerberos configuration file recorded by the last Kerberos login.
    #[must_use]
    pub fn krb5_config(&self) -> Option<&Path> {
        self.krb5_config.as_deref()
    }

    /// The protocol settings installed by the last Kerberos login.
    #[must_use]
    pub fn active_settings(&self) -> Option<&ProtocolSettings> {
        self.active.as_ref()
    }

    /// Look up a registry SASL entry by name.
    #[must_use]
    pub fn sasl_entry(&self, name: &str) -> Option<&SaslClientEntry> {
        self.sasl_entries.get(name)
    }

    /// Names of all installed registry SASL entries, sorted.
    #[must_use]
    pub fn sasl_entry_names(&self) -> Vec<&str> {
        self.sasl_entries.keys().map(String::as_str).collect()
    }

    /// The registry server principal recorded by the last configuration.
    #[must_use]
    pub fn registry_server_principal(&self) -> Option<&str> {
        self.registry_server_principal.as_deref()
    }

    /// Count of protocol settings installs since the state was created.
    ///
    /// Increments once per Kerberos login, inside the critical section.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_krb5_config(&mut self, path: PathBuf) {
        self.krb5_config = Some(path);
    }

    pub(crate) fn install_settings(&mut self, settings: ProtocolSettings) {
        self.active = Some(settings);
        self.generation += 1;
    }

    pub(crate) fn install_sasl_entry(&mut self, name: &str, entry: SaslClientEntry) {
        self.sasl_entries.insert(name.to_string(), entry);
    }

    pub(crate) fn set_registry_server_principal(&mut self, principal: &str) {
        self.registry_server_principal = Some(principal.to_string());
    }
}

/// Owner of the security state and of the lock that serializes logins.
///
/// Production callers share the [`SecurityRuntime::global`] instance, which
/// is what makes the serialization process-wide. [`SecurityRuntime::new`]
/// creates an isolated runtime for tests and for embedders that manage
/// their own scope.
#[derive(Debug, Default)]
pub struct SecurityRuntime {
    state: Mutex<SecurityState>,
}

impl SecurityRuntime {
    /// Create an isolated runtime with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SecurityState::default()),
        }
    }

    /// The shared process-wide runtime.
    pub fn global() -> Arc<SecurityRuntime> {
        static GLOBAL: OnceLock<Arc<SecurityRuntime>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SecurityRuntime::new())))
    }

    /// Enter the critical section.
    ///
    /// Blocks until the lock is available, without timeout or fairness
    /// guarantees beyond the OS mutex. A poisoned lock is reported to the
    /// caller, who surfaces it as an interrupted login.
    pub(crate) fn lock(
        &self,
    ) -> Result<MutexGuard<'_, SecurityState>, PoisonError<MutexGuard<'_, SecurityState>>> {
        self.state.lock()
    }

    /// Clone the current state.
    ///
    /// Takes the same lock as logins do, so a snapshot observed after a
    /// login call returned reflects at least that login's writes. Reads
    /// through poisoning, since inspecting state after a failure is exactly
    /// when snapshots are wanted.
    #[must_use]
    pub fn snapshot(&self) -> SecurityState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset the state to empty and clear lock poisoning.
    ///
    /// The coordinator itself never resets anything; this exists for test
    /// isolation and for embedders that re-initialize between runs.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = SecurityState::default();
        }
        self.state.clear_poison();
        debug!("security state reset");
    }
}
