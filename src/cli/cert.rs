//! Generate or renew service certificates.

use crate::cli::output;
use crate::core::certs::{self, CertOutcome, CertPaths};
use crate::core::config::ServiceConfig;
use crate::core::context::{self, Context};
use crate::core::detect;
use crate::core::perms;
use crate::error::Result;

pub fn execute(services: &[String], days: Option<u32>, overwrite: bool) -> Result<()> {
    detect::require_tools(&["openssl"])?;
    for service in services {
        context::validate_service_name(service)?;
    }

    let ctx = Context::load()?;
    let mut first_err = None;

    for service in services {
        if let Err(e) = provision_one(&ctx, service, days, overwrite) {
            output::error(&format!("{service}: {e}"));
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

fn provision_one(ctx: &Context, service: &str, days: Option<u32>, overwrite: bool) -> Result<()> {
    let cfg = ServiceConfig::load_or_default(ctx, service)?;

    let outcome = certs::provision(ctx, service, &cfg, days, overwrite)?;
    perms::apply(ctx, service, &cfg)?;

    let paths = CertPaths::new(ctx, service, &cfg);
    match outcome {
        CertOutcome::Generated => {
            output::success(&format!("certificate generated for {service}"));
            output::kv("key", paths.key.display());
            output::kv("cert", paths.cert.display());
            output::kv("ca", paths.ca_copy.display());
        }
        CertOutcome::Skipped => {
            output::warn(&format!("certificate for {service} already exists"));
            output::hint("pass --overwrite to regenerate");
        }
    }
    Ok(())
}
