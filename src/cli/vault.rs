//! Vault initialization and unseal guidance.

use crate::cli::output;
use crate::core::context::Context;
use crate::core::detect;
use crate::core::vault;
use crate::error::{ConfigError, HealthError, Result};

/// `init-vault`: run `vault operator init` once, printing the key
/// material straight to the terminal.
pub fn init() -> Result<()> {
    detect::require_tools(&["docker"])?;
    let ctx = Context::load()?;

    if !vault::container_running(&ctx)? {
        output::error("the vault container is not running");
        output::hint("run: homestack install vault");
        return Err(HealthError::VaultUnreachable { attempts: 0 }.into());
    }

    output::section("vault initialization");
    output::warn("the unseal keys and root token below are shown ONCE");
    output::list_item("store the full JSON in an encrypted password manager");
    output::list_item("never keep it in plain text files or email");
    output::list_item("consider printing and storing shares separately");
    output::rule();

    if vault::operator_init(&ctx)? {
        println!();
        output::success("vault initialized");
        output::hint("next: homestack unseal-vault");
    } else {
        output::warn("vault is already initialized");
    }
    Ok(())
}

/// `unseal-vault`: report seal state and print the manual unseal steps.
/// Key entry is deliberately left to the operator.
pub fn unseal() -> Result<()> {
    detect::require_tools(&["docker"])?;
    let ctx = Context::load()?;

    let status = vault::status(&ctx)?;
    if !status.initialized {
        output::error("vault is not initialized");
        output::hint("run: homestack init-vault");
        return Ok(());
    }
    if !status.sealed {
        output::success("vault is already unsealed");
        output::kv("UI", "https://localhost:8200");
        return Ok(());
    }

    let container = ctx.container_name("vault");
    output::section("manual unseal");
    output::dimmed(&format!(
        "vault starts sealed; {} of the unseal keys are required", status.t
    ));
    println!();
    output::header("run these commands yourself:");
    output::list_item(&format!("docker exec -it {container} vault operator unseal"));
    output::dimmed(&format!("  (repeat {} times, one key each)", status.t));
    output::list_item(&format!("docker exec {container} vault status"));
    println!();
    output::kv("UI", "https://localhost:8200");
    Ok(())
}

/// `setup-vault-base`: enable the baseline mounts (KV v2 engine, file
/// audit device) on an initialized, unsealed Vault. Safe to re-run.
pub fn setup_base() -> Result<()> {
    detect::require_tools(&["docker"])?;
    let ctx = Context::load()?;

    if !vault::container_running(&ctx)? {
        output::error("the vault container is not running");
        output::hint("run: homestack install vault");
        return Err(HealthError::VaultUnreachable { attempts: 0 }.into());
    }

    let status = vault::status(&ctx)?;
    if !status.initialized {
        output::error("vault is not initialized");
        output::hint("run: homestack init-vault");
        return Ok(());
    }
    if status.sealed {
        output::error("vault is sealed");
        output::hint("run: homestack unseal-vault");
        return Ok(());
    }

    let token = ctx
        .credential("VAULT_TOKEN")
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingCredential("VAULT_TOKEN"))?;

    output::section("vault baseline");
    let applied = vault::setup_base(&ctx, &token)?;
    if applied > 0 {
        output::success(&format!("{applied} mount(s) enabled"));
    } else {
        output::warn("baseline already in place, nothing to do");
    }
    output::kv("secrets", "kv-v2 at secret/");
    output::kv("audit", "file at /vault/logs/audit.log");
    Ok(())
}
