//! Fatiguewatch CLI - run the scoring engine against the synthetic provider
//!
//! Commands:
//! - score: run one scoring cycle and print the outcome
//! - trend: print the persisted daily score trend
//! - watch: keep scoring on an interval, alerting through the log

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use fatiguewatch::{
    EngineConfig, FatigueCoordinator, JsonFileStore, KeyValueStore, LogNotifier, MemoryStore,
    SyntheticProvider, ENGINE_VERSION,
};

/// Fatiguewatch - fatigue scoring from wearable health signals
#[derive(Parser)]
#[command(name = "fatiguewatch")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score fatigue from physiological signals", long_about = None)]
struct Cli {
    /// Persist baselines and score history to this JSON file
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scoring cycle and print the outcome as JSON
    Score {
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the persisted daily score trend, oldest first
    Trend {
        /// Trailing days to include
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Keep scoring on an interval until interrupted
    Watch {
        /// Seconds between scoring cycles
        #[arg(long, default_value = "60")]
        interval: u64,
    },
}

fn store_for(state: Option<PathBuf>) -> Arc<dyn KeyValueStore> {
    match state {
        Some(path) => Arc::new(JsonFileStore::new(path)),
        None => Arc::new(MemoryStore::new()),
    }
}

async fn started_coordinator(
    store: Arc<dyn KeyValueStore>,
) -> Result<Arc<FatigueCoordinator>, String> {
    let provider = Arc::new(SyntheticProvider::new());
    let coordinator = Arc::new(FatigueCoordinator::new(
        provider,
        Arc::new(LogNotifier),
        store,
        EngineConfig::default(),
    ));
    let ready = coordinator.start().await.map_err(|e| e.to_string())?;
    if !ready {
        return Err("health data access denied".to_owned());
    }
    Ok(coordinator)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = store_for(cli.state);

    let result = match cli.command {
        Commands::Score { pretty } => run_score(store, pretty).await,
        Commands::Trend { days } => run_trend(store, days).await,
        Commands::Watch { interval } => run_watch(store, interval).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_score(store: Arc<dyn KeyValueStore>, pretty: bool) -> Result<(), String> {
    let coordinator = started_coordinator(store).await?;
    let score = coordinator.refresh().await;
    let snapshot = coordinator.metric_snapshot().await;

    let output = serde_json::json!({
        "score": score.value,
        "computed_at": score.computed_at,
        "metrics": snapshot,
    });
    let encoded = if pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .map_err(|e| e.to_string())?;
    println!("{encoded}");
    Ok(())
}

async fn run_trend(store: Arc<dyn KeyValueStore>, days: i64) -> Result<(), String> {
    let coordinator = started_coordinator(store).await?;
    let trend = coordinator.trend(days).await.map_err(|e| e.to_string())?;
    let weekly = coordinator
        .weekly_average()
        .await
        .map_err(|e| e.to_string())?;
    let monthly = coordinator
        .monthly_average()
        .await
        .map_err(|e| e.to_string())?;

    let output = serde_json::json!({
        "trend": trend,
        "weekly_average": weekly,
        "monthly_average": monthly,
    });
    println!(
        "{}",
        serde_json::to_string(&output).map_err(|e| e.to_string())?
    );
    Ok(())
}

async fn run_watch(store: Arc<dyn KeyValueStore>, interval: u64) -> Result<(), String> {
    let coordinator = started_coordinator(store).await?;
    loop {
        tokio::time::sleep(Duration::from_secs(interval)).await;
        let score = coordinator.refresh().await;
        println!("{} score={}", score.computed_at.to_rfc3339(), score.value);
    }
}
