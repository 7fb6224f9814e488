//! Structured JSON logging.
//!
//! Every pipeline log line goes through [`StageEvent::emit`], so the field set
//! (stage, records, batch, team_id, status, error_kind, detail) is defined in one place.
//! Serialization is left to the `tracing-subscriber` JSON formatter.

use std::fmt;

use tracing::{Level, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{Config, LOG_FILE_PREFIX};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Setup,
    Fetch,
    Transform,
    Write,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Config => "config",
            Stage::Setup => "setup",
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Write => "write",
            Stage::Run => "run",
        };
        write!(f, "{s}")
    }
}

/// Where log lines end up. Fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    /// Stdout plus a daily-rolling `stats-collection.YYYY-MM-DD` file in the directory.
    StdoutAndFile(String),
}

impl LogSink {
    pub fn from_config(cfg: &Config) -> Self {
        match &cfg.log_dir {
            Some(dir) => LogSink::StdoutAndFile(dir.clone()),
            None => LogSink::Stdout,
        }
    }
}

impl fmt::Display for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::Stdout => write!(f, "stdout"),
            LogSink::StdoutAndFile(dir) => write!(f, "stdout+{dir}/{LOG_FILE_PREFIX}.*"),
        }
    }
}

/// JSON formatting layer shared by every sink: one flat object per event.
pub fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(false)
        .with_writer(writer)
}

/// Installs the process-wide subscriber. Call once, before the first event.
pub fn init(cfg: &Config) -> Result<LogSink> {
    let filter = EnvFilter::try_new(&cfg.log_level).map_err(|e| {
        AppError::Config(format!("LOG_LEVEL {:?} is not a valid filter: {e}", cfg.log_level))
    })?;

    let sink = LogSink::from_config(cfg);
    let file_layer = match &sink {
        LogSink::StdoutAndFile(dir) => Some(json_layer(file_appender(dir)?)),
        LogSink::Stdout => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("logger already installed: {e}")))?;

    Ok(sink)
}

/// Daily-rolling appender under `dir`. The directory is created if missing.
fn file_appender(dir: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)
        .map_err(|e| AppError::Config(format!("LOG_DIR {dir:?} is not usable: {e}")))
}

/// One structured log record for a pipeline stage.
#[derive(Debug, Clone)]
pub struct StageEvent {
    pub stage: Stage,
    pub level: Level,
    pub message: String,
    pub records: Option<u64>,
    pub batch: Option<u64>,
    pub team_id: Option<i64>,
    pub status: Option<u64>,
    pub error_kind: Option<&'static str>,
    pub detail: Option<String>,
}

impl StageEvent {
    fn new(stage: Stage, level: Level, message: impl Into<String>) -> Self {
        Self {
            stage,
            level,
            message: message.into(),
            records: None,
            batch: None,
            team_id: None,
            status: None,
            error_kind: None,
            detail: None,
        }
    }

    pub fn debug(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Level::DEBUG, message)
    }

    pub fn info(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Level::INFO, message)
    }

    pub fn warn(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Level::WARN, message)
    }

    pub fn error(
        stage: Stage,
        message: impl Into<String>,
        kind: &'static str,
        detail: impl fmt::Display,
    ) -> Self {
        let mut event = Self::new(stage, Level::ERROR, message);
        event.error_kind = Some(kind);
        event.detail = Some(detail.to_string());
        event
    }

    /// Error event for a run-aborting failure.
    pub fn failure(stage: Stage, message: impl Into<String>, err: &AppError) -> Self {
        let event = Self::error(stage, message, err.kind(), err);
        match err {
            AppError::Fetch(fetch) => match fetch.status() {
                Some(status) => event.status(status),
                None => event,
            },
            _ => event,
        }
    }

    pub fn records(mut self, count: usize) -> Self {
        self.records = Some(count as u64);
        self
    }

    pub fn batch(mut self, index: usize) -> Self {
        self.batch = Some(index as u64);
        self
    }

    pub fn team_id(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(u64::from(status));
        self
    }

    pub fn detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn emit(&self) {
        macro_rules! emit_at {
            ($mac:ident, $ev:ident) => {
                tracing::$mac!(
                    stage = %$ev.stage,
                    records = $ev.records,
                    batch = $ev.batch,
                    team_id = $ev.team_id,
                    status = $ev.status,
                    error_kind = $ev.error_kind,
                    detail = $ev.detail.as_deref(),
                    "{}",
                    $ev.message
                )
            };
        }

        let ev = self;
        if ev.level == Level::ERROR {
            emit_at!(error, ev);
        } else if ev.level == Level::WARN {
            emit_at!(warn, ev);
        } else if ev.level == Level::INFO {
            emit_at!(info, ev);
        } else {
            emit_at!(debug, ev);
        }
    }
}
