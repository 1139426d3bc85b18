//! Cluster Login Probe CLI
//!
//! Performs one coordinated login (keytab-based Kerberos or remote-user
//! impersonation) from a YAML configuration and reports the acquired
//! identity and the process-wide security state it left behind.

use std::convert::Infallible;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cluster_login_core::authenticator::CredentialAuthenticator;
use cluster_login_core::config::{
    AuthenticationMode, LoggingConfig, LoginConfig, ProtocolSettings,
};
use cluster_login_core::error::ConfigError;
use cluster_login_core::identity::Identity;

/// Cluster login probe.
#[derive(Parser)]
#[command(name = "cluster-login")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "login.yaml")]
    config: String,

    /// Impersonate this user instead of performing the configured login.
    #[arg(long)]
    remote_user: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = LoginConfig::from_file(&args.config)?;

    // Apply CLI overrides
    if let Some(remote_user) = args.remote_user {
        config.auth.authentication_mode = AuthenticationMode::RemoteUser;
        config.remote_user = Some(remote_user);
    }

    // Override log level from verbosity flag
    let log_config = match args.verbose {
        0 => config.logging.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..config.logging.clone()
        },
    };

    // Setup tracing
    setup_tracing(&log_config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config,
        mode = %config.auth.authentication_mode,
        "starting cluster login probe"
    );

    run_login(&config)
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

fn run_login(config: &LoginConfig) -> anyhow::Result<()> {
    let authenticator = CredentialAuthenticator::new();

    let identity = match config.auth.authentication_mode {
        AuthenticationMode::Kerberos => {
            let credentials = config
                .kerberos
                .as_ref()
                .ok_or(ConfigError::MissingSection { section: "kerberos" })?;
            authenticator.login_with_kerberos(
                &config.auth,
                credentials,
                config.registry.as_ref(),
                report_identity,
            )?
        }
        AuthenticationMode::RemoteUser => {
            let remote_user = config.remote_user.as_deref().unwrap_or_default();
            authenticator.login_with_remote_user(&config.auth, remote_user, report_identity)?
        }
    };

    info!(
        identity = %identity,
        impersonated = identity.is_impersonated(),
        "login complete"
    );

    let state = authenticator.runtime().snapshot();
    info!(
        generation = state.generation(),
        krb5_config = ?state.krb5_config(),
        sasl_entries = ?state.sasl_entry_names(),
        registry_server_principal = ?state.registry_server_principal(),
        "process-wide security state after login"
    );

    Ok(())
}

/// The action the probe runs under the acquired identity: log and hand the
/// identity back out.
fn report_identity(
    settings: &ProtocolSettings,
    identity: &Identity,
) -> Result<Identity, Infallible> {
    info!(
        identity = %identity,
        properties = settings.properties.len(),
        "action running under acquired identity"
    );
    Ok(identity.clone())
}
