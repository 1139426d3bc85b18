//! Performance benchmarks for the login coordinator.
//!
//! Measures the fixed cost a login adds around an action when the lock is
//! uncontended, plus the cheap helper paths callers hit on the way in.

use std::convert::Infallible;
use std::io::Write;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::NamedTempFile;

use cluster_login_core::authenticator::CredentialAuthenticator;
use cluster_login_core::config::{
    AuthenticationMode, KerberosCredentials, ProtocolSettings, RegistrySaslOptions,
};
use cluster_login_core::identity::KerberosPrincipal;
use cluster_login_core::runtime::SecurityRuntime;

/// Create an authenticator that does not share state with anything else.
fn isolated_authenticator() -> CredentialAuthenticator {
    CredentialAuthenticator::with_runtime(Arc::new(SecurityRuntime::new()))
}

/// Write a usable krb5.conf and keytab pair and point credentials at them.
fn kerberos_fixture() -> (NamedTempFile, NamedTempFile, KerberosCredentials) {
    let mut krb5 = NamedTempFile::new().unwrap();
    krb5.write_all(b"[libdefaults]\ndefault_realm = EXAMPLE.COM\n")
        .unwrap();
    let mut keytab = NamedTempFile::new().unwrap();
    keytab
        .write_all(&[0x05, 0x02, 0x00, 0x01, 0x02, 0x03])
        .unwrap();
    let credentials = KerberosCredentials {
        krb5_config: krb5.path().display().to_string(),
        principal: "svc/host.example.com@EXAMPLE.COM".to_string(),
        keytab: keytab.path().display().to_string(),
    };
    (krb5, keytab, credentials)
}

/// Benchmark principal string parsing.
fn bench_principal_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("principal_parse");

    for input in [
        "alice",
        "alice@EXAMPLE.COM",
        "svc/host.example.com@EXAMPLE.COM",
    ] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(input), &input, |b, s| {
            b.iter(|| black_box(s.parse::<KerberosPrincipal>().unwrap()));
        });
    }

    group.finish();
}

/// Benchmark a full login round trip with no lock contention.
fn bench_uncontended_logins(c: &mut Criterion) {
    let mut group = c.benchmark_group("login_overhead");
    group.throughput(Throughput::Elements(1));

    let remote = isolated_authenticator();
    let remote_settings = ProtocolSettings::new(AuthenticationMode::RemoteUser);
    group.bench_function("remote_user", |b| {
        b.iter(|| {
            let impersonated = remote
                .login_with_remote_user(&remote_settings, "etl-runner", |_, identity| {
                    Ok::<_, Infallible>(identity.is_impersonated())
                })
                .unwrap();
            black_box(impersonated);
        });
    });

    let (_krb5, _keytab, credentials) = kerberos_fixture();
    let kerberos = isolated_authenticator();
    let kerberos_settings = ProtocolSettings::new(AuthenticationMode::Kerberos);
    group.bench_function("kerberos_keytab", |b| {
        b.iter(|| {
            let impersonated = kerberos
                .login_with_kerberos(&kerberos_settings, &credentials, None, |_, identity| {
                    Ok::<_, Infallible>(identity.is_impersonated())
                })
                .unwrap();
            black_box(impersonated);
        });
    });

    let registry = RegistrySaslOptions {
        namespace: Some("/services/locks".to_string()),
        server_principal: Some("zookeeper/registry.example.com@EXAMPLE.COM".to_string()),
        sasl_client_config: None,
    };
    group.bench_function("kerberos_keytab_with_registry_sasl", |b| {
        b.iter(|| {
            let impersonated = kerberos
                .login_with_kerberos(
                    &kerberos_settings,
                    &credentials,
                    Some(&registry),
                    |_, identity| Ok::<_, Infallible>(identity.is_impersonated()),
                )
                .unwrap();
            black_box(impersonated);
        });
    });

    group.finish();
}

/// Benchmark cloning the process-wide state out of the lock.
fn bench_state_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_snapshot");

    let (_krb5, _keytab, credentials) = kerberos_fixture();
    let authenticator = isolated_authenticator();
    let settings = ProtocolSettings::new(AuthenticationMode::Kerberos)
        .with_property("cluster.name", "analytics")
        .with_property("rpc.protection", "privacy");
    authenticator
        .login_with_kerberos(&settings, &credentials, None, |_, _| {
            Ok::<_, Infallible>(())
        })
        .unwrap();

    group.bench_function("populated", |b| {
        b.iter(|| black_box(authenticator.runtime().snapshot()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_principal_parse,
    bench_uncontended_logins,
    bench_state_snapshot,
);
criterion_main!(benches);
