//! DynamoDB implementation of [`StatsStore`].

use std::collections::HashMap;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ProvisionedThroughput, PutRequest,
    ScalarAttributeType, TableStatus, WriteRequest,
};
use aws_sdk_dynamodb::Client;

use crate::config::{
    Config, TABLE_POLL_ATTEMPTS, TABLE_POLL_INTERVAL_SECS, TABLE_READ_CAPACITY,
    TABLE_WRITE_CAPACITY,
};
use crate::error::{AppError, Result, WriteError};
use crate::store::writer::TEAM_ID_ATTR;
use crate::store::{Item, StatsStore, TableSetup};
use crate::telemetry::{Stage, StageEvent};

pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build the SDK client from `Config`. Static keys win over the default
    /// credential chain when both halves were provided.
    pub async fn connect(cfg: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.aws_region.clone()));
        if let Some(creds) = &cfg.aws_credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                None,
                None,
                "nba-stats-env",
            ));
        }
        if let Some(url) = &cfg.dynamodb_endpoint_url {
            loader = loader.endpoint_url(url.clone());
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), cfg.table_name.clone())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn wait_until_active(&self) -> Result<()> {
        for attempt in 1..=TABLE_POLL_ATTEMPTS {
            let desc = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| AppError::TableSetup(DisplayErrorContext(&e).to_string()))?;

            let status = desc.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }

            StageEvent::debug(
                Stage::Setup,
                format!(
                    "Waiting for table {} to become active (attempt {attempt}, status {status:?})",
                    self.table_name
                ),
            )
            .emit();
            tokio::time::sleep(Duration::from_secs(TABLE_POLL_INTERVAL_SECS)).await;
        }

        Err(AppError::TableSetup(format!(
            "table {} not ACTIVE after {TABLE_POLL_ATTEMPTS} polls",
            self.table_name
        )))
    }
}

impl StatsStore for DynamoStore {
    async fn ensure_table(&self) -> Result<TableSetup> {
        let (key, attribute, throughput) = table_definition()
            .map_err(|e| AppError::TableSetup(format!("invalid table definition: {e}")))?;

        let created = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .key_schema(key)
            .attribute_definitions(attribute)
            .provisioned_throughput(throughput)
            .send()
            .await;

        match created {
            Ok(_) => {
                self.wait_until_active().await?;
                Ok(TableSetup::Created)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_in_use_exception()) =>
            {
                Ok(TableSetup::AlreadyExists)
            }
            Err(e) => Err(AppError::TableSetup(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn batch_write(&self, items: Vec<Item>) -> std::result::Result<Vec<Item>, WriteError> {
        let requests = to_write_requests(items)
            .map_err(|e| WriteError::Request(e.to_string()))?;

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(|e| WriteError::Service(DisplayErrorContext(&e).to_string()))?;

        Ok(unprocessed_items(output.unprocessed_items, &self.table_name))
    }
}

/// `team_id` (N) as the only key, 5/5 provisioned throughput.
fn table_definition(
) -> std::result::Result<(KeySchemaElement, AttributeDefinition, ProvisionedThroughput), BuildError>
{
    let key = KeySchemaElement::builder()
        .attribute_name(TEAM_ID_ATTR)
        .key_type(KeyType::Hash)
        .build()?;
    let attribute = AttributeDefinition::builder()
        .attribute_name(TEAM_ID_ATTR)
        .attribute_type(ScalarAttributeType::N)
        .build()?;
    let throughput = ProvisionedThroughput::builder()
        .read_capacity_units(TABLE_READ_CAPACITY)
        .write_capacity_units(TABLE_WRITE_CAPACITY)
        .build()?;
    Ok((key, attribute, throughput))
}

fn to_write_requests(items: Vec<Item>) -> std::result::Result<Vec<WriteRequest>, BuildError> {
    items
        .into_iter()
        .map(|item| {
            let put = PutRequest::builder().set_item(Some(item)).build()?;
            Ok(WriteRequest::builder().put_request(put).build())
        })
        .collect()
}

/// Put items the store handed back for our table. Delete requests are never sent.
fn unprocessed_items(
    unprocessed: Option<HashMap<String, Vec<WriteRequest>>>,
    table_name: &str,
) -> Vec<Item> {
    unprocessed
        .and_then(|mut by_table| by_table.remove(table_name))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|request| request.put_request.map(|put| put.item))
        .collect()
}
