// Destination rows kept in the Google Sheet, reached through Sheety.

use crate::config::SheetyConfig;
use crate::transport::{ApiError, HttpRequest, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Threshold used when a row has no `lowestPrice`.
pub const DEFAULT_THRESHOLD: f64 = 999_999.0;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Sheet fetch rejected: {status} - {body}")]
    FetchRejected { status: u16, body: String },

    #[error("Sheet update for row {id} rejected: {status} - {body}")]
    WriteRejected { id: u64, status: u16, body: String },

    #[error("Sheet decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRow {
    pub id: u64,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub iata_code: String,
    #[serde(default, deserialize_with = "optional_number")]
    pub lowest_price: Option<f64>,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub num_flights: u32,
}

impl DestinationRow {
    pub fn threshold(&self) -> f64 {
        self.lowest_price.unwrap_or(DEFAULT_THRESHOLD)
    }
}

// Sheety hands back empty cells as "" or leaves the key out, and numbers
// typed into the sheet as text stay text.
fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

fn count_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(optional_number(d)?
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32)
        .unwrap_or(0))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowUpdate<'a> {
    city: &'a str,
    iata_code: &'a str,
    // left out rather than written as 0, which would block every future deal
    #[serde(skip_serializing_if = "Option::is_none")]
    lowest_price: Option<f64>,
    num_flights: u32,
}

#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<DestinationRow>, StoreError>;

    async fn write_row(&self, row: &DestinationRow) -> Result<(), StoreError>;

    /// Write every row back in order; the first rejected write aborts.
    async fn update_destinations(&self, rows: &[DestinationRow]) -> Result<usize, StoreError> {
        for row in rows {
            self.write_row(row).await?;
        }
        Ok(rows.len())
    }
}

pub struct SheetyStore<T> {
    transport: T,
    config: SheetyConfig,
}

impl<T: Transport> SheetyStore<T> {
    pub fn new(config: SheetyConfig, transport: T) -> Self {
        Self { transport, config }
    }

    fn row_url(&self, id: u64) -> String {
        format!("{}/{id}", self.config.endpoint)
    }
}

#[async_trait]
impl<T: Transport> DestinationStore for SheetyStore<T> {
    async fn fetch_rows(&self) -> Result<Vec<DestinationRow>, StoreError> {
        let request = HttpRequest::get(&self.config.endpoint).with_bearer(&self.config.token);
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            return Err(StoreError::FetchRejected {
                status: response.status,
                body: response.body,
            });
        }

        let mut body: Value = response
            .json()
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let rows = body
            .get_mut(&self.config.collection)
            .map(Value::take)
            .ok_or_else(|| {
                StoreError::Decode(format!(
                    "response has no `{}` list",
                    self.config.collection
                ))
            })?;

        let rows: Vec<DestinationRow> =
            serde_json::from_value(rows).map_err(|e| StoreError::Decode(e.to_string()))?;
        tracing::info!("Fetched {} destination rows", rows.len());
        Ok(rows)
    }

    async fn write_row(&self, row: &DestinationRow) -> Result<(), StoreError> {
        let update = RowUpdate {
            city: &row.city,
            iata_code: &row.iata_code,
            lowest_price: row.lowest_price,
            num_flights: row.num_flights,
        };
        let mut payload = serde_json::Map::new();
        payload.insert(
            self.config.record.clone(),
            serde_json::to_value(&update).map_err(|e| StoreError::Decode(e.to_string()))?,
        );

        let request = HttpRequest::put(self.row_url(row.id))
            .with_bearer(&self.config.token)
            .with_json(Value::Object(payload));
        let response = self.transport.send(&request).await?;

        tracing::info!("Updating row {}: {}", row.id, response.status);
        tracing::info!("{}", response.body);

        if !response.is_success() {
            return Err(StoreError::WriteRejected {
                id: row.id,
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }
}
