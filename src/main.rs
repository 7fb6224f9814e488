mod config;
mod error;
mod fetcher;
mod pipeline;
mod store;
mod telemetry;
mod transform;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::store::DynamoStore;
use crate::telemetry::{Stage, StageEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let sink = match telemetry::init(&cfg) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Logging error: {e}");
            std::process::exit(1);
        }
    };
    StageEvent::info(Stage::Config, format!("Initialized NBA stats pipeline, logging to {sink}"))
        .emit();

    if run(&cfg).await.is_err() {
        // Already logged by the pipeline.
        std::process::exit(1);
    }
}

async fn run(cfg: &Config) -> Result<()> {
    let store = DynamoStore::connect(cfg).await;
    StageEvent::debug(
        Stage::Config,
        format!("DynamoDB client ready for table {} in {}", store.table_name(), cfg.aws_region),
    )
    .emit();

    let mut pipeline = match Pipeline::new(cfg, &store) {
        Ok(p) => p,
        Err(e) => {
            StageEvent::failure(Stage::Config, "Failed to build HTTP client", &e).emit();
            return Err(e);
        }
    };

    let summary = pipeline.run().await?;
    StageEvent::info(Stage::Run, "Run finished")
        .records(summary.report.written())
        .detail(format!(
            "state={} fetched={} transformed={} batch_calls={}",
            pipeline.state(),
            summary.fetched,
            summary.transformed,
            summary.report.batch_calls()
        ))
        .emit();
    Ok(())
}
