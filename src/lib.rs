//! Homestack - homelab service management over docker compose.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── install       # Install/reinstall services (3 modes)
//! │   ├── backup        # Encrypted backups
//! │   ├── restore       # Restore from artifacts
//! │   ├── cert          # Certificate generation/renewal
//! │   ├── vault         # Vault init and unseal guidance
//! │   ├── clean         # Backup retention
//! │   ├── cron          # Crontab schedule installation
//! │   ├── check         # Environment/status report
//! │   └── completions   # Shell completions
//! └── core/             # Core operations
//!     ├── context       # PROJECT_ROOT/BASE_DIR, paths, .env
//!     ├── config        # Per-service YAML configs
//!     ├── discovery     # Enabled-service scan
//!     ├── template      # ${VAR} template provisioning
//!     ├── envfile       # Per-service .env generation
//!     ├── certs         # Root CA + leaf certificate pipeline
//!     ├── docker        # docker/compose CLI wrappers
//!     ├── health/       # Healthchecks (generic, vault, postgres)
//!     ├── backup/       # Collect/tar/gpg pipeline + crypto
//!     ├── vault         # Vault operator helpers
//!     ├── perms         # Ownership and mode application
//!     ├── lock          # Per-service invocation locks
//!     └── detect        # Host tool detection
//! ```

pub mod cli;
pub mod core;
pub mod error;
