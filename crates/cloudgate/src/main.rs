mod commands;
mod gateway;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudgate")]
#[command(about = "Elastic IP addresses on top of OpenStack floating IPs", long_about = None)]
struct Cli {
    /// Config file (default: CLOUDGATE_CONFIG_PATH, ./cloudgate.yaml, ~/.config/cloudgate/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Address(AddressCommand),
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum AddressCommand {
    /// Allocate an address
    AllocateAddress {
        /// Address domain: "vpc" for a managed address, omit for the legacy pool
        #[arg(long)]
        domain: Option<String>,
    },
    /// Associate an address with an instance or network interface
    AssociateAddress {
        #[arg(long)]
        public_ip: Option<String>,
        #[arg(long)]
        allocation_id: Option<String>,
        #[arg(long)]
        instance_id: Option<String>,
        #[arg(long)]
        network_interface_id: Option<String>,
        #[arg(long)]
        private_ip_address: Option<String>,
        /// Move the address even if it is associated elsewhere
        #[arg(long)]
        allow_reassociation: bool,
    },
    /// Disassociate an address
    DisassociateAddress {
        #[arg(long)]
        public_ip: Option<String>,
        #[arg(long)]
        association_id: Option<String>,
    },
    /// Release an unassociated address
    ReleaseAddress {
        #[arg(long)]
        public_ip: Option<String>,
        #[arg(long)]
        allocation_id: Option<String>,
    },
    /// List addresses
    DescribeAddresses {
        /// Only these public IPs (repeatable)
        #[arg(long = "public-ip")]
        public_ips: Vec<String>,
        /// Only these allocation ids (repeatable)
        #[arg(long = "allocation-id")]
        allocation_ids: Vec<String>,
        /// Filter as name=value1,value2 (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the JSON result; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let command = match cli.command {
        Commands::Version => {
            println!("cloudgate {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Address(command) => command,
    };

    let config = match &cli.config {
        Some(path) => cloudgate_config::GatewayConfig::from_file(path)?,
        None => cloudgate_config::GatewayConfig::load()?,
    };
    let engine = gateway::build_engine(&config);

    match commands::handle(&engine, command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Err(e) => {
            eprintln!("{} {}", format!("{}:", e.code()).red().bold(), e);
            std::process::exit(if e.is_client_error() { 1 } else { 2 });
        }
    }

    Ok(())
}
