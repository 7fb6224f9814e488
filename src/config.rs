use std::fmt;

use crate::error::{AppError, Result};

pub const SPORTSDATA_BASE_URL: &str = "https://api.sportsdata.io/v3/nba";
pub const DEFAULT_SEASON: &str = "2024";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Header SportsDataIO reads the subscription key from.
pub const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Provider request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Characters of a failed response body kept on `FetchError`.
pub const RESPONSE_SNIPPET_CHARS: usize = 200;

/// DynamoDB hard limit on put/delete requests per BatchWriteItem call.
pub const MAX_BATCH_ITEMS: usize = 25;

/// Table setup: provisioned throughput for a freshly created table.
pub const TABLE_READ_CAPACITY: i64 = 5;
pub const TABLE_WRITE_CAPACITY: i64 = 5;

/// Table setup: DescribeTable polling while waiting for ACTIVE.
pub const TABLE_POLL_INTERVAL_SECS: u64 = 2;
pub const TABLE_POLL_ATTEMPTS: u32 = 30;

/// File name prefix for the rolling JSON log file under LOG_DIR.
pub const LOG_FILE_PREFIX: &str = "stats-collection";

/// Static AWS key pair. Only set when both halves are present in the environment;
/// otherwise the SDK's default credential chain applies.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    /// SportsDataIO subscription key (SPORTDATA_API_KEY)
    pub api_key: String,
    /// Provider base URL (SPORTSDATA_BASE_URL)
    pub stats_base_url: String,
    /// Season path segment, e.g. "2024" (NBA_SEASON)
    pub season: String,
    /// Destination table (DYNAMODB_TABLE_NAME)
    pub table_name: String,
    /// AWS_REGION, then AWS_DEFAULT_REGION
    pub aws_region: String,
    /// AWS_ACCESS_KEY_ID + AWS_SECRET_ACCESS_KEY
    pub aws_credentials: Option<AwsCredentials>,
    /// Endpoint override, e.g. DynamoDB Local (DYNAMODB_ENDPOINT_URL)
    pub dynamodb_endpoint_url: Option<String>,
    /// Create the table if missing before writing (DYNAMODB_CREATE_TABLE)
    pub create_table: bool,
    pub log_level: String,
    /// Directory for the rolling JSON log file (LOG_DIR). Stdout only when unset.
    pub log_dir: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("stats_base_url", &self.stats_base_url)
            .field("season", &self.season)
            .field("table_name", &self.table_name)
            .field("aws_region", &self.aws_region)
            .field("aws_credentials", &self.aws_credentials)
            .field("dynamodb_endpoint_url", &self.dynamodb_endpoint_url)
            .field("create_table", &self.create_table)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            var(key).ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };

        let aws_credentials = match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Config(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".to_string(),
                ))
            }
        };

        let create_table = match var("DYNAMODB_CREATE_TABLE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::Config(format!("DYNAMODB_CREATE_TABLE must be true or false, got {raw:?}"))
            })?,
            None => true,
        };

        Ok(Self {
            api_key: required("SPORTDATA_API_KEY")?,
            stats_base_url: var("SPORTSDATA_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| SPORTSDATA_BASE_URL.to_string()),
            season: var("NBA_SEASON").unwrap_or_else(|| DEFAULT_SEASON.to_string()),
            table_name: required("DYNAMODB_TABLE_NAME")?,
            aws_region: var("AWS_REGION")
                .or_else(|| var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            aws_credentials,
            dynamodb_endpoint_url: var("DYNAMODB_ENDPOINT_URL"),
            create_table,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_dir: var("LOG_DIR"),
        })
    }

    /// Full standings URL for the configured season.
    pub fn standings_url(&self) -> String {
        format!("{}/scores/json/Standings/{}", self.stats_base_url, self.season)
    }

    #[cfg(test)]
    pub fn for_tests(stats_base_url: &str) -> Self {
        Self {
            api_key: "test-key".to_string(),
            stats_base_url: stats_base_url.to_string(),
            season: DEFAULT_SEASON.to_string(),
            table_name: "nba-team-stats-test".to_string(),
            aws_region: DEFAULT_AWS_REGION.to_string(),
            aws_credentials: None,
            dynamodb_endpoint_url: None,
            create_table: true,
            log_level: "debug".to_string(),
            log_dir: None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
