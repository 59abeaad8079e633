use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "partsync")]
#[command(about = "Incremental, resumable restore of part-based object store backups", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore a backup into a local directory
    Restore {
        /// Backup source URL: fs:///abs/path, s3://bucket/prefix or gcs://bucket/prefix
        #[arg(long)]
        src: String,

        /// Destination directory. May be non-empty, in which case only
        /// missing data is downloaded; local files not present in the
        /// backup are deleted
        #[arg(long = "storageDataPath")]
        storage_data_path: String,

        /// The number of concurrent download workers. Higher concurrency
        /// may reduce restore duration
        #[arg(long, default_value = "10")]
        concurrency: usize,
    },

    /// List the files recorded in a backup
    List {
        /// Backup source URL
        #[arg(long)]
        src: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Restore {
            src,
            storage_data_path,
            concurrency,
        } => {
            commands::restore::run(&src, &storage_data_path, concurrency).await?;
        }
        Commands::List { src, format } => {
            commands::list::run(&src, &format).await?;
        }
    }

    Ok(())
}
