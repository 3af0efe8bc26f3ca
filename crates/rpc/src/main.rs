//! LendLedger CLI - Main entry point

use lendledger_rpc::{serve, AppContext, LedgerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lendledger")]
#[command(about = "LendLedger - lending record ledger", long_about = None)]
struct Cli {
    /// Data directory path (overrides config and LENDLEDGER_DATA_DIR)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive (overrides config and LENDLEDGER_LOG)
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the bootstrap administrator
    Init {
        /// Administrator actor id (overrides config and LENDLEDGER_ADMIN)
        #[arg(long)]
        admin: Option<String>,
    },

    /// Run one operation
    Invoke {
        /// Operation name, e.g. RegisterCustomer
        name: String,
        /// JSON argument
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Answer newline-delimited JSON requests from stdin
    Serve,

    /// List operation names
    Ops,
}

fn load_config(cli: &Cli) -> Result<LedgerConfig, anyhow::Error> {
    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    let mut config = config.with_env();
    if let Some(data) = &cli.data {
        config.data_dir = data.clone();
    }
    if let Some(log) = &cli.log {
        config.log_filter = log.clone();
    }
    if let Commands::Init { admin: Some(admin) } = &cli.command {
        config.bootstrap_admin_id = admin.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // stdout carries responses; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Ops = cli.command {
        for op in lendledger_rpc::Router::new().operations() {
            println!("{}", op);
        }
        return Ok(());
    }

    let ctx = AppContext::open(config)?;

    match cli.command {
        Commands::Init { .. } => {
            let result = ctx.init()?;
            println!("✅ Ledger initialized, administrator {}", ctx.config.bootstrap_admin_id);
            println!("   tx: {}", result.tx_id);
        }

        Commands::Invoke { name, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)?;
            let result = ctx.invoke(&name, args)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Serve => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let answered = serve(&ctx, stdin, tokio::io::stdout()).await?;
            tracing::debug!(answered, "Serve loop finished");
        }

        Commands::Ops => {}
    }

    Ok(())
}
