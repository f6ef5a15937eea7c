//! Remote signer daemon binary.
//!
//! Runs as a standalone process on the machine that owns the key vault and
//! answers signing requests over HTTP.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use citadel_remote_signer::{SignerServer, SignerService};
use citadel_vault::{SecureVault, SoftwareVault};

/// Remote validator signer daemon.
#[derive(Parser, Debug)]
#[command(name = "citadel-signer-daemon")]
#[command(about = "Remote signing daemon backed by an isolated key vault")]
#[command(version)]
struct Args {
    /// Address to listen on for HTTP requests
    #[arg(long, default_value = "127.0.0.1:9000")]
    listen: SocketAddr,

    /// Encrypted keystore file(s) to import at startup (repeatable)
    #[arg(long = "keystore")]
    keystores: Vec<PathBuf>,

    /// Keystore password (or use CITADEL_KEYSTORE_PASSWORD env var)
    #[arg(long, env = "CITADEL_KEYSTORE_PASSWORD", default_value = "")]
    keystore_password: String,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting citadel-signer-daemon");
    info!("Listen address: {}", args.listen);

    let mut service = SignerService::new(SoftwareVault::new());

    for path in &args.keystores {
        if let Err(e) = service.import_keystore_file(path, &args.keystore_password) {
            error!("Failed to import keystore {:?}: {}", path, e);
            std::process::exit(1);
        }
    }

    match service.vault().export_public_keys() {
        Ok(keys) => {
            for key in keys {
                info!("Loaded key, pubkey: 0x{}", key);
            }
        }
        Err(e) => {
            error!("Failed to read vault contents: {}", e);
            std::process::exit(1);
        }
    }

    let mut server = match SignerServer::bind(args.listen, service.into_vault()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to bind server: {}", e);
            std::process::exit(1);
        }
    };

    info!("Signer daemon ready, waiting for connections...");

    if let Err(e) = server.run() {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
