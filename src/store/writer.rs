use aws_sdk_dynamodb::types::AttributeValue;

use crate::config::MAX_BATCH_ITEMS;
use crate::error::WriteError;
use crate::store::{Item, StatsStore};
use crate::telemetry::{Stage, StageEvent};
use crate::types::TeamStat;

/// Partition key attribute.
pub const TEAM_ID_ATTR: &str = "team_id";

/// Serialize one record into store attributes: numbers as N, text as S.
/// Absent optional columns are left out of the item.
pub fn to_item(stat: &TeamStat, updated_at: &str) -> Item {
    let mut item = Item::new();
    let mut put_n = |name: &str, value: String| {
        item.insert(name.to_string(), AttributeValue::N(value));
    };

    put_n(TEAM_ID_ATTR, stat.team_id.to_string());
    put_n("wins", stat.wins.to_string());
    put_n("losses", stat.losses.to_string());
    put_n("points_per_game_for", stat.points_per_game_for.to_string());
    put_n("points_per_game_against", stat.points_per_game_against.to_string());

    let d = &stat.details;
    if let Some(p) = d.percentage {
        put_n("win_percentage", p.to_string());
    }
    for (name, value) in [
        ("home_wins", d.home_wins),
        ("home_losses", d.home_losses),
        ("away_wins", d.away_wins),
        ("away_losses", d.away_losses),
        ("last_ten_wins", d.last_ten_wins),
        ("last_ten_losses", d.last_ten_losses),
    ] {
        if let Some(v) = value {
            put_n(name, v.to_string());
        }
    }

    let mut put_s = |name: &str, value: &str| {
        item.insert(name.to_string(), AttributeValue::S(value.to_string()));
    };
    put_s("team_name", &stat.team_name);
    put_s("updated_at", updated_at);
    for (name, value) in [
        ("team_key", &d.key),
        ("conference", &d.conference),
        ("division", &d.division),
    ] {
        if let Some(v) = value {
            put_s(name, v);
        }
    }

    item
}

/// Read the partition key back out of a stored item.
pub fn team_id_of(item: &Item) -> Option<i64> {
    item.get(TEAM_ID_ATTR)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

// ---------------------------------------------------------------------------
// Per-batch results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Written,
    /// The call succeeded but the store did not process these team ids.
    PartiallyWritten { unprocessed: Vec<i64> },
    Failed(WriteError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Zero-based batch number within the run.
    pub index: usize,
    pub size: usize,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn written(&self) -> usize {
        match &self.outcome {
            BatchOutcome::Written => self.size,
            BatchOutcome::PartiallyWritten { unprocessed } => {
                self.size.saturating_sub(unprocessed.len())
            }
            BatchOutcome::Failed(_) => 0,
        }
    }
}

/// Everything the writer did in one run, batch by batch. The writer never retries;
/// callers decide what to do with `unprocessed()` and `failed()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub batches: Vec<BatchResult>,
}

impl WriteReport {
    pub fn batch_calls(&self) -> usize {
        self.batches.len()
    }

    pub fn attempted(&self) -> usize {
        self.batches.iter().map(|b| b.size).sum()
    }

    pub fn written(&self) -> usize {
        self.batches.iter().map(BatchResult::written).sum()
    }

    /// Team ids left unprocessed by otherwise successful calls.
    pub fn unprocessed(&self) -> Vec<i64> {
        self.batches
            .iter()
            .flat_map(|b| match &b.outcome {
                BatchOutcome::PartiallyWritten { unprocessed } => unprocessed.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn failed(&self) -> Vec<&BatchResult> {
        self.batches
            .iter()
            .filter(|b| matches!(b.outcome, BatchOutcome::Failed(_)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.written() == self.attempted()
    }
}

// ---------------------------------------------------------------------------
// BatchWriter
// ---------------------------------------------------------------------------

/// Splits records into store-sized batches and issues one batch-write call per batch.
pub struct BatchWriter<'a, S> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: StatsStore> BatchWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            batch_size: MAX_BATCH_ITEMS,
        }
    }

    /// Clamped to 1..=MAX_BATCH_ITEMS.
    #[cfg(test)]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_ITEMS);
        self
    }

    /// Write every record. A failed or partial batch is logged and the next batch
    /// still goes out; nothing is re-queued.
    pub async fn write_all(&self, stats: &[TeamStat], updated_at: &str) -> WriteReport {
        let mut report = WriteReport::default();

        for (index, chunk) in stats.chunks(self.batch_size).enumerate() {
            let items: Vec<Item> = chunk
                .iter()
                .map(|stat| {
                    StageEvent::debug(
                        Stage::Write,
                        format!("Storing data for team: {}", stat.team_name),
                    )
                    .batch(index)
                    .team_id(stat.team_id)
                    .emit();
                    to_item(stat, updated_at)
                })
                .collect();

            let outcome = match self.store.batch_write(items).await {
                Ok(unprocessed) if unprocessed.is_empty() => {
                    StageEvent::info(Stage::Write, "Batch written")
                        .batch(index)
                        .records(chunk.len())
                        .emit();
                    BatchOutcome::Written
                }
                Ok(unprocessed) => {
                    let ids: Vec<i64> = unprocessed.iter().filter_map(team_id_of).collect();
                    StageEvent::warn(Stage::Write, "Batch partially written")
                        .batch(index)
                        .records(chunk.len() - ids.len().min(chunk.len()))
                        .detail(format!("unprocessed team ids: {ids:?}"))
                        .emit();
                    BatchOutcome::PartiallyWritten { unprocessed: ids }
                }
                Err(e) => {
                    StageEvent::error(Stage::Write, "Batch write failed", e.kind(), &e)
                        .batch(index)
                        .records(chunk.len())
                        .emit();
                    BatchOutcome::Failed(e)
                }
            };

            report.batches.push(BatchResult {
                index,
                size: chunk.len(),
                outcome,
            });
        }

        report
    }
}
