use anyhow::Result;
use clap::{Parser, Subcommand};
use filegate::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Minimal authenticated file-sharing gateway.
#[derive(Parser, Debug)]
#[command(name = "filegate", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file (defaults to the per-user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Address to bind (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Upload directory (overrides storage.uploads_dir)
        #[arg(long)]
        uploads_dir: Option<PathBuf>,
    },
    /// Print the effective configuration (secrets omitted)
    Config,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("filegate=info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path
        .or_else(Config::default_path)
        .unwrap_or_else(|| PathBuf::from("filegate.toml"));
    Config::load(&path)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = load_config(cli.config)?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            uploads_dir,
        } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(dir) = uploads_dir {
                config.storage.uploads_dir = dir;
            }
            filegate::run_gateway(config).await
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
