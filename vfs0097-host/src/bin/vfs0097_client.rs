use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use vfs0097_host::{NusbTransport, config::load_config, find_devices, seed::system_seed};
use vfs0097_rs::{DriverConfig, Vfs0097, l3::ecdh::SignatureStatus};

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    /// List attached sensors
    List,
    /// Print the seed used to derive the flash keys
    Seed,
    /// Run the init sequence and report the recovered key material
    Open,
}

#[derive(Debug, clap::Parser)]
struct Cli {
    #[clap(short, long)]
    verbose: bool,

    /// YAML driver config
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Binary file holding the vendor init blob
    #[clap(long)]
    init_blob: Option<PathBuf>,

    /// Derive the seed from the DMI ids of this machine
    #[clap(long)]
    dmi_seed: bool,

    #[clap(subcommand)]
    cmd: Subcommand,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn driver_config(cli: &Cli) -> anyhow::Result<DriverConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DriverConfig::default(),
    };
    if let Some(path) = &cli.init_blob {
        config.init_sequence.send_init_4 = std::fs::read(path)
            .with_context(|| format!("failed to read init blob {}", path.display()))?;
    }
    if cli.dmi_seed {
        config.seed = system_seed();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = driver_config(&cli)?;

    match cli.cmd {
        Subcommand::List => {
            for device in find_devices().await? {
                println!(
                    "{:04x}:{:04x} {:?}",
                    device.vendor_id(),
                    device.product_id(),
                    device
                );
            }
        }
        Subcommand::Seed => {
            println!("{}", hex::encode(config.seed.as_bytes()));
        }
        Subcommand::Open => {
            let transport = NusbTransport::connect(config.response_buffer_len).await?;
            let mut vfs = Vfs0097::new(transport, config);

            vfs.open().await.context("failed to open device")?;

            if let Some(keys) = vfs.tls_keys() {
                println!(
                    "certificate: {}",
                    keys.certificate()
                        .map_or("missing".to_string(), |cert| format!("{} bytes", cert.len()))
                );
                println!(
                    "private key: {}",
                    if keys.private_key().is_some() { "ok" } else { "missing" }
                );
                let ecdh = match keys.ecdh().map(|key| key.signature) {
                    Some(SignatureStatus::Trusted) => "trusted",
                    Some(SignatureStatus::Untrusted) => "untrusted",
                    Some(SignatureStatus::Malformed) => "malformed signature",
                    None => "missing",
                };
                println!("ecdh key: {ecdh}");
            }

            vfs.close().await?;
            info!("Done");
        }
    }

    Ok(())
}
