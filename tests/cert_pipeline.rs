//! Certificate pipeline tests. These exercise the real openssl binary
//! and are skipped when it is not installed.

mod support;

use homestack::core::certs::{self, CertOutcome, CertPaths};
use homestack::core::config::ServiceConfig;
use homestack::core::context::Context;
use support::Test;

fn ctx(t: &Test) -> Context {
    Context::at(t.project.path().to_path_buf(), t.base.path().to_path_buf()).unwrap()
}

#[test]
fn provision_creates_verified_chain() {
    skip_without_tool!("openssl");
    let t = Test::new();
    let ctx = ctx(&t);
    let cfg = ServiceConfig::default();

    let outcome = certs::provision(&ctx, "ldap", &cfg, None, false).unwrap();
    assert_eq!(outcome, CertOutcome::Generated);

    let paths = CertPaths::new(&ctx, "ldap", &cfg);
    assert!(paths.key.exists());
    assert!(paths.cert.exists());
    assert!(paths.ca_copy.exists());

    // The signed leaf verifies against the generated root CA.
    certs::verify("ldap", &paths.cert, &ctx.ca_cert()).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&paths.key).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "private key must be mode 600");
    }
}

#[test]
fn provision_is_idempotent_without_overwrite() {
    skip_without_tool!("openssl");
    let t = Test::new();
    let ctx = ctx(&t);
    let cfg = ServiceConfig::default();

    certs::provision(&ctx, "ldap", &cfg, None, false).unwrap();
    let paths = CertPaths::new(&ctx, "ldap", &cfg);
    let key_before = std::fs::read(&paths.key).unwrap();
    let cert_before = std::fs::read(&paths.cert).unwrap();

    let outcome = certs::provision(&ctx, "ldap", &cfg, None, false).unwrap();
    assert_eq!(outcome, CertOutcome::Skipped);
    assert_eq!(std::fs::read(&paths.key).unwrap(), key_before);
    assert_eq!(std::fs::read(&paths.cert).unwrap(), cert_before);
}

#[test]
fn overwrite_regenerates_key_material() {
    skip_without_tool!("openssl");
    let t = Test::new();
    let ctx = ctx(&t);
    let cfg = ServiceConfig::default();

    certs::provision(&ctx, "ldap", &cfg, None, false).unwrap();
    let paths = CertPaths::new(&ctx, "ldap", &cfg);
    let key_before = std::fs::read(&paths.key).unwrap();

    let outcome = certs::provision(&ctx, "ldap", &cfg, None, true).unwrap();
    assert_eq!(outcome, CertOutcome::Generated);
    assert_ne!(std::fs::read(&paths.key).unwrap(), key_before);
}

#[test]
fn leaf_from_foreign_ca_fails_verification() {
    skip_without_tool!("openssl");
    let t1 = Test::new();
    let t2 = Test::new();
    let ctx1 = ctx(&t1);
    let ctx2 = ctx(&t2);
    let cfg = ServiceConfig::default();

    certs::provision(&ctx1, "ldap", &cfg, None, false).unwrap();
    certs::provision(&ctx2, "ldap", &cfg, None, false).unwrap();

    let paths1 = CertPaths::new(&ctx1, "ldap", &cfg);
    // ctx2's CA never signed ctx1's leaf.
    assert!(certs::verify("ldap", &paths1.cert, &ctx2.ca_cert()).is_err());
}

#[test]
fn san_override_from_config_is_used() {
    skip_without_tool!("openssl");
    let t = Test::new();
    let ctx = ctx(&t);
    let mut cfg = ServiceConfig::default();
    cfg.cert.san = Some(vec!["DNS:db.lan".to_string(), "IP:10.0.0.5".to_string()]);

    certs::provision(&ctx, "postgres", &cfg, None, false).unwrap();

    let paths = CertPaths::new(&ctx, "postgres", &cfg);
    let text = std::process::Command::new("openssl")
        .args(["x509", "-in", paths.cert.to_str().unwrap(), "-noout", "-text"])
        .output()
        .unwrap();
    let text = String::from_utf8_lossy(&text.stdout).to_string();
    assert!(text.contains("db.lan"), "SAN override missing: {text}");
    assert!(text.contains("10.0.0.5"), "SAN IP missing: {text}");
}

#[test]
fn rejected_service_names_never_reach_openssl() {
    let t = Test::new();
    let ctx = ctx(&t);
    let cfg = ServiceConfig::default();
    assert!(certs::provision(&ctx, "x; rm -rf /", &cfg, None, false).is_err());
    assert!(certs::provision(&ctx, "Postgres", &cfg, None, false).is_err());
}
