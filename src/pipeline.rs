use chrono::{SecondsFormat, Utc};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetcher::{build_client, fetch_standings};
use crate::store::{BatchWriter, StatsStore, TableSetup, WriteReport};
use crate::telemetry::{Stage, StageEvent};
use crate::transform::transform_all;
use crate::types::{PipelineState, TeamStat};

const SAMPLE_RECORDS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// `None` when table setup is disabled.
    pub table: Option<TableSetup>,
    pub fetched: usize,
    pub transformed: usize,
    pub report: WriteReport,
}

/// One run: (ensure table) → fetch → transform → batch write.
pub struct Pipeline<'a, S> {
    cfg: &'a Config,
    store: &'a S,
    client: reqwest::Client,
    state: PipelineState,
}

impl<'a, S: StatsStore> Pipeline<'a, S> {
    pub fn new(cfg: &'a Config, store: &'a S) -> Result<Self> {
        Ok(Self {
            cfg,
            store,
            client: build_client()?,
            state: PipelineState::Started,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Fetch and schema failures abort before anything is written. Batch write
    /// failures do not: they are logged, recorded in the report, and the run
    /// still ends in WRITTEN.
    pub async fn run(&mut self) -> Result<RunSummary> {
        StageEvent::info(
            Stage::Run,
            format!(
                "Run started: table {} from {} (season {})",
                self.cfg.table_name, self.cfg.stats_base_url, self.cfg.season
            ),
        )
        .emit();

        match self.execute().await {
            Ok(summary) => Ok(summary),
            Err((stage, err)) => {
                let message = match stage {
                    Stage::Setup => "Failed to set up DynamoDB table",
                    Stage::Fetch => "API request failed",
                    Stage::Transform => "Record failed schema validation",
                    _ => "Run failed",
                };
                StageEvent::failure(stage, message, &err).emit();
                self.transition(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> std::result::Result<RunSummary, (Stage, AppError)> {
        let table = if self.cfg.create_table {
            Some(self.setup_table().await.map_err(|e| (Stage::Setup, e))?)
        } else {
            None
        };

        let raw = fetch_standings(&self.client, self.cfg)
            .await
            .map_err(|e| (Stage::Fetch, e.into()))?;
        let fetched = raw.len();
        self.advance();

        let stats = transform_all(&raw).map_err(|e| (Stage::Transform, e.into()))?;
        drop(raw);
        StageEvent::info(Stage::Transform, "Transformed team stats")
            .records(stats.len())
            .emit();
        self.advance();

        StageEvent::info(Stage::Write, "Starting batch write to DynamoDB")
            .records(stats.len())
            .emit();
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let report = BatchWriter::new(self.store)
            .write_all(&stats, &updated_at)
            .await;
        log_report(&report);
        log_sample(&stats);
        self.advance();

        Ok(RunSummary {
            table,
            fetched,
            transformed: stats.len(),
            report,
        })
    }

    async fn setup_table(&self) -> Result<TableSetup> {
        StageEvent::info(
            Stage::Setup,
            format!("Setting up DynamoDB table: {}", self.cfg.table_name),
        )
        .emit();
        let setup = self.store.ensure_table().await?;
        let message = match setup {
            TableSetup::Created => format!("Created table {}", self.cfg.table_name),
            TableSetup::AlreadyExists => format!("Table {} already exists", self.cfg.table_name),
        };
        StageEvent::info(Stage::Setup, message).emit();
        Ok(setup)
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            self.transition(next);
        }
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state.is_terminal() {
            return;
        }
        StageEvent::info(Stage::Run, format!("{} -> {}", self.state, next)).emit();
        self.state = next;
    }
}

fn log_report(report: &WriteReport) {
    if report.is_complete() {
        StageEvent::info(Stage::Write, "Successfully stored team stats")
            .records(report.written())
            .emit();
        return;
    }

    StageEvent::warn(Stage::Write, "Stored team stats with failures")
        .records(report.written())
        .detail(format!(
            "attempted={} failed_batches={} unprocessed_team_ids={:?}",
            report.attempted(),
            report.failed().len(),
            report.unprocessed()
        ))
        .emit();
}

/// First few stored records, for eyeballing a run at debug level.
fn log_sample(stats: &[TeamStat]) {
    if stats.is_empty() {
        return;
    }
    let sample = &stats[..stats.len().min(SAMPLE_RECORDS)];
    StageEvent::debug(Stage::Write, "Sample of stored records")
        .records(sample.len())
        .detail(format!("{sample:?}"))
        .emit();
}
