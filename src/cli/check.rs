//! Environment and service status report.

use crate::cli::output;
use crate::core::backup;
use crate::core::certs::CertPaths;
use crate::core::config::ServiceConfig;
use crate::core::context::Context;
use crate::core::detect;
use crate::core::discovery;
use crate::core::docker;
use crate::error::Result;

const TOOLS: &[&str] = &["docker", "openssl", "gpg", "rsync", "tar"];

pub fn execute(service: &str) -> Result<()> {
    let ctx = Context::load()?;

    output::section("host tools");
    let mut docker_present = false;
    for tool in TOOLS {
        let found = detect::tool_available(tool);
        if *tool == "docker" {
            docker_present = found;
        }
        output::kv(tool, if found { "ok" } else { "MISSING" });
    }

    output::section("context");
    output::kv("project root", ctx.project_root.display());
    output::kv("base dir", ctx.base_dir.display());
    output::kv(
        "root CA",
        if ctx.ca_cert().exists() { "present" } else { "absent" },
    );

    let services = if service == "all" {
        discovery::discover(&ctx)?
    } else {
        crate::core::context::validate_service_name(service)?;
        vec![service.to_string()]
    };
    if services.is_empty() {
        output::dimmed("no enabled services");
        return Ok(());
    }

    output::section("services");
    for svc in &services {
        let cfg = ServiceConfig::load_or_default(&ctx, svc)?;

        // A present binary with an unreachable daemon still gets a report.
        let container = if docker_present {
            match docker::container_statuses(&ctx.container_name(svc)) {
                Ok(statuses) if statuses.is_empty() => "stopped".to_string(),
                Ok(statuses) => statuses.join(", "),
                Err(_) => "unknown (docker daemon unreachable)".to_string(),
            }
        } else {
            "unknown (no docker)".to_string()
        };

        let cert = if CertPaths::new(&ctx, svc, &cfg).cert.exists() {
            "present"
        } else {
            "absent"
        };

        let backups = backup::list_artifacts(&ctx, svc)?;
        let backup_info = match backups.last() {
            Some(latest) => format!(
                "{} ({} total)",
                latest.file_name().and_then(|n| n.to_str()).unwrap_or("?"),
                backups.len()
            ),
            None => "none".to_string(),
        };

        output::header(svc);
        output::kv("container", container);
        output::kv("certificate", cert);
        output::kv("latest backup", backup_info);
    }
    Ok(())
}
