//! CLI surface tests: flag handling, discovery and the commands that
//! work without a docker daemon.

mod support;

use predicates::prelude::*;
use support::*;

#[test]
fn version_flag_names_the_binary() {
    let t = Test::new();
    t.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("homestack"));
}

#[test]
fn reset_and_backup_flags_conflict() {
    let t = Test::new();
    let output = t
        .cmd()
        .args(["install", "postgres", "--reset", "--backup"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "cannot be used with");
}

#[test]
fn invalid_service_name_is_rejected() {
    let t = Test::new();
    let output = t
        .cmd()
        .args(["install", "pg;rm"])
        .output()
        .unwrap();
    assert_failure(&output);
    // Name validation happens before any tool detection, so this holds
    // on hosts without docker too.
    assert_stderr_contains(&output, "invalid service name");
}

#[test]
fn backup_rejects_invalid_service_name() {
    let t = Test::new();
    let output = t.cmd().args(["backup", "pg;rm"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid service name");
}

#[test]
fn help_lists_vault_baseline_command() {
    let t = Test::new();
    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup-vault-base"));
}

#[test]
fn install_unknown_service_reports_missing_config() {
    skip_without_tool!("docker");
    skip_without_tool!("openssl");
    let t = Test::new();
    let output = t.cmd().args(["install", "ghost"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "config file not found");
}

#[test]
fn install_disabled_service_is_refused() {
    skip_without_tool!("docker");
    skip_without_tool!("openssl");
    let t = Test::new();
    t.write_config("ldap", "service:\n  enable: false\n");
    let output = t.cmd().args(["install", "ldap"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "not enabled");
}

#[test]
fn check_lists_only_enabled_services() {
    let t = Test::new();
    t.write_config("postgres", "service:\n  enable: true\n");
    t.write_config("ldap", "service:\n  enable: false\n");
    t.write_config("broken", "service: [not a mapping\n");

    let output = t.check();
    assert_success(&output);
    assert_stdout_contains(&output, "postgres");
    let out = stdout(&output);
    assert!(!out.contains("broken"), "malformed config must be skipped: {out}");
    // The skip is logged, and logs stay off stdout.
    assert_stderr_contains(&output, "broken.yml");
}

#[test]
fn restore_without_backups_fails() {
    skip_without_tool!("docker");
    skip_without_tool!("openssl");
    skip_without_tool!("gpg");
    skip_without_tool!("rsync");
    skip_without_tool!("tar");
    let t = Test::new();
    let output = t.cmd().args(["restore", "ldap"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "no backups found");
}

#[test]
fn clean_backups_keeps_newest_artifacts() {
    let t = Test::new();
    t.write_config("ldap", "service:\n  enable: true\n");
    t.fake_artifact("ldap", "20250101_000000");
    t.fake_artifact("ldap", "20250102_000000");
    t.fake_artifact("ldap", "20250103_000000");

    let output = t.clean_backups(1);
    assert_success(&output);

    let remaining: Vec<_> = std::fs::read_dir(t.backups_dir("ldap"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(remaining, vec!["ldap_20250103_000000.tar.gz.gpg"]);
}

#[test]
fn clean_backups_sweeps_disabled_services_too() {
    let t = Test::new();
    // No config at all; artifacts exist only on disk.
    t.fake_artifact("oldsvc", "20240101_000000");
    t.fake_artifact("oldsvc", "20240201_000000");

    let output = t.clean_backups(1);
    assert_success(&output);

    let remaining = std::fs::read_dir(t.backups_dir("oldsvc")).unwrap().count();
    assert_eq!(remaining, 1);
}

#[test]
fn setup_cron_print_shows_schedule_lines() {
    let t = Test::new();
    t.write_config(
        "postgres",
        "service:\n  enable: true\nbackup:\n  method: pg_dump\n  schedule: \"0 3 * * *\"\n",
    );
    t.write_config("ldap", "service:\n  enable: true\n");

    let output = t.setup_cron_print();
    assert_success(&output);
    assert_stdout_contains(&output, "0 3 * * *");
    assert_stdout_contains(&output, "backup postgres");
    let out = stdout(&output);
    assert!(!out.contains("backup ldap"), "unscheduled service leaked: {out}");
}

#[test]
fn setup_cron_print_with_no_schedules_is_quiet() {
    let t = Test::new();
    t.write_config("ldap", "service:\n  enable: true\n");
    let output = t.setup_cron_print();
    assert_success(&output);
    assert_stdout_contains(&output, "no service has a backup.schedule");
}

#[test]
fn completions_generate_for_bash() {
    let t = Test::new();
    let output = t.cmd().args(["completions", "bash"]).output().unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "homestack");
}

#[test]
fn cert_for_invalid_name_fails_before_openssl() {
    skip_without_tool!("openssl");
    let t = Test::new();
    let output = t.cmd().args(["cert", "Bad Name"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid service name");
}

#[test]
fn cert_command_generates_and_then_skips() {
    skip_without_tool!("openssl");
    let t = Test::new();

    let first = t.cert("ldap");
    assert_success(&first);
    assert_stdout_contains(&first, "certificate generated");
    assert!(t.service_dir("ldap").join("certs/ldap.crt").exists());

    let second = t.cert("ldap");
    assert_success(&second);
    assert_stdout_contains(&second, "already exists");
}
