use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use payflow::application::orchestrator::PaymentOrchestrator;
use payflow::application::selector::Gateways;
use payflow::config::Settings;
use payflow::domain::operation::Phase;
use payflow::domain::payment::{Amount, PaymentData};
use payflow::domain::ports::SharedOperationStore;
use payflow::domain::provider::ProviderName;
use payflow::infrastructure::in_memory::InMemoryOperationStore;
#[cfg(feature = "storage-rocksdb")]
use payflow::infrastructure::rocksdb::RocksDBStore;
use payflow::interfaces::csv::process_batch;
use payflow::interfaces::handler;
use payflow::logging::{LogFormat, init_tracing};
use serde_json::json;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYFLOW_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, env = "PAYFLOW_LOG_FORMAT", default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authorize a payment described by a JSON body
    Authorize {
        #[arg(long)]
        data: String,
    },
    /// Capture an authorization described by a JSON body
    Capture {
        #[arg(long)]
        data: String,
    },
    /// Refund a capture described by a JSON body
    Refund {
        #[arg(long)]
        data: String,
    },
    /// Authorize, capture and refund every row of a payments CSV file
    Batch {
        /// Input payments CSV file
        input: PathBuf,
    },
    /// Run a number of authorizations and report how they were split
    Simulate {
        #[arg(long, default_value_t = 1000)]
        count: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let store = open_store(cli.db_path)?;
    let orchestrator = PaymentOrchestrator::new(
        store,
        Gateways::simulated(cli.settings.random_source()),
        cli.settings.orchestrator_config(),
    );

    match cli.command {
        Command::Authorize { data } => respond(&orchestrator, Phase::Authorization, &data).await,
        Command::Capture { data } => respond(&orchestrator, Phase::Capture, &data).await,
        Command::Refund { data } => respond(&orchestrator, Phase::Refund, &data).await,
        Command::Batch { input } => {
            let file = File::open(input).into_diagnostic()?;
            let stdout = io::stdout();
            process_batch(&orchestrator, file, stdout.lock())
                .await
                .into_diagnostic()?;
            Ok(())
        }
        Command::Simulate { count } => simulate(&orchestrator, count).await,
    }
}

fn open_store(db_path: Option<PathBuf>) -> Result<SharedOperationStore> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryOperationStore::new()))
        }
        None => Ok(Arc::new(InMemoryOperationStore::new())),
    }
}

async fn respond(orchestrator: &PaymentOrchestrator, phase: Phase, data: &str) -> Result<()> {
    let response = handler::handle(orchestrator, phase, data).await;
    println!("{}", response.body);
    if response.is_success() {
        Ok(())
    } else {
        Err(miette!("{phase} request failed with status {}", response.status_code))
    }
}

async fn simulate(orchestrator: &PaymentOrchestrator, count: u64) -> Result<()> {
    let mut provider_a = 0u64;
    let mut provider_b = 0u64;
    let mut failed = 0u64;

    for _ in 0..count {
        let payment = PaymentData {
            card_number: "4111111111111111".to_string(),
            expiry_date: "12/30".to_string(),
            cvv: "123".to_string(),
            amount: Amount::new(100).into_diagnostic()?,
        };
        match orchestrator.authorize(payment).await {
            Ok(token) if token.starts_with(ProviderName::ProviderA.token_prefix()) => {
                provider_a += 1
            }
            Ok(_) => provider_b += 1,
            Err(_) => failed += 1,
        }
    }

    println!(
        "{}",
        json!({
            "total": count,
            "ProviderA": provider_a,
            "ProviderB": provider_b,
            "failed": failed,
        })
    );
    Ok(())
}
