//! Nile key-pair generator.
//!
//! # Usage
//!
//! ```bash
//! # P-521 key pair in the current directory
//! nile-keygen
//!
//! # P-256 key pair in ./keys
//! nile-keygen --alg ES256 --out-dir keys
//! ```

use std::path::PathBuf;

use clap::Parser;
use nile_core::SystemEnv;
use nile_crypto::SignatureAlgorithm;
use nile_keygen::write_key_pair;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Nile key-pair generator
#[derive(Parser, Debug)]
#[command(name = "nile-keygen")]
#[command(about = "Generate a Nile key-pair file")]
#[command(version)]
struct Args {
    /// Signature algorithm (ES256, ES384 or ES512)
    #[arg(short, long, default_value = "ES512")]
    alg: SignatureAlgorithm,

    /// Directory to write the key pair into
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Generating {} key pair", args.alg);
    let path = write_key_pair(args.alg, &args.out_dir, &SystemEnv::new())?;
    tracing::info!("Key pair saved in {}", path.display());

    Ok(())
}
