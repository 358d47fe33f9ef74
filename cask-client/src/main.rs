use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use cask_cdn::Region;
use cask_client::CascClient;

#[derive(Parser)]
#[command(
    name = "cask",
    about = "Read-only client for Blizzard's CASC content distribution system",
    version,
    long_about = "Discovers the current build of a product, assembles the CASC \
                  translation tables, and extracts files from the content CDNs."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Product identifier (e.g. w3, wow)
    #[arg(short, long, default_value = "w3", global = true)]
    product: String,

    /// Patch service region
    #[arg(short, long, default_value = "us", global = true)]
    region: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show build and table information for a product
    Info,

    /// List root manifest entries whose path contains a substring
    List {
        /// Path substring to match (case-insensitive)
        pattern: String,
    },

    /// Extract a file by path
    Fetch {
        /// Path substring identifying the file
        path: String,

        /// Write the file here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let region = Region::parse(&cli.region)
        .ok_or_else(|| cask_cdn::Error::InvalidRegion(cli.region.clone()))?;

    let client = CascClient::init(&cli.product, region).await?;

    match cli.command {
        Commands::Info => {
            if let Some(name) = client.build().build_name() {
                println!("build:      {name}");
            }
            println!("encoding:   {} entries", client.encoding().len());
            println!("archives:   {}", client.cdn_config().archives().len());
            println!("index:      {} entries", client.index_len());
            match client.root() {
                Ok(root) => println!("root:       {} entries", root.entries().len()),
                Err(_) => println!("root:       not present"),
            }
        }

        Commands::List { pattern } => {
            let entries = client.get_entries_by_path(&pattern)?;
            for entry in &entries {
                if let Some(path) = &entry.normalized_path {
                    println!("{:>10}  {}", entry.file_data_id, path);
                }
            }
            eprintln!("{} entries", entries.len());
        }

        Commands::Fetch { path, output } => {
            let Some(bytes) = client.get_file_by_path(&path).await? else {
                return Err(format!("no file matching '{path}' could be resolved").into());
            };

            match output {
                Some(out) => {
                    tokio::fs::write(&out, &bytes).await?;
                    eprintln!("wrote {} bytes to {}", bytes.len(), out.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
    }

    Ok(())
}
