use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::StarterError;

/// One entry of the catalogue feed.
///
/// Only the fields the pipeline reasons about are typed; everything else is
/// kept in `fields` so configured metadata keys can reach any of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetRecord {
    pub identifier: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub distribution: Vec<DistributionRecord>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One downloadable artifact of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DistributionRecord {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogueResponse {
    dataset: Vec<DatasetRecord>,
}

impl DatasetRecord {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn title(&self) -> &str {
        self.fields.get("title").and_then(Value::as_str).unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.fields
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Contact objects in feed order; a missing or non-array value is empty.
    pub fn contact_points(&self) -> Vec<&Map<String, Value>> {
        self.fields
            .get("contactPoint")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }
}

impl DistributionRecord {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True when the format mentions CSV (case-sensitive).
    pub fn is_csv(&self) -> bool {
        match self.fields.get("format") {
            Some(Value::String(format)) => format.contains("CSV"),
            Some(Value::Array(formats)) => formats
                .iter()
                .filter_map(Value::as_str)
                .any(|format| format.contains("CSV")),
            _ => false,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.fields.get("description").and_then(Value::as_str)
    }

    pub fn set_description(&mut self, description: String) {
        self.fields
            .insert("description".to_string(), Value::String(description));
    }

    pub fn download_url(&self) -> &str {
        self.fields
            .get("downloadUrl")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request the catalogue once and return its dataset records.
pub async fn fetch_catalogue(
    client: &Client,
    settings: &Settings,
) -> Result<Vec<DatasetRecord>, StarterError> {
    let url = settings.datashop.metadata_link.as_str();
    info!(%url, "Fetching catalogue metadata");

    let response = client
        .get(url)
        .timeout(settings.datashop.timeout())
        .send()
        .await
        .map_err(|source| StarterError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(StarterError::FetchStatus {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(|source| StarterError::Fetch {
        url: url.to_string(),
        source,
    })?;
    debug!(bytes = body.len(), "Catalogue body received");

    let records = parse_catalogue(&body)?;
    info!(count = records.len(), "Catalogue parsed");
    Ok(records)
}

/// Parse a catalogue document; the records live under the top-level `dataset` key.
pub fn parse_catalogue(body: &str) -> Result<Vec<DatasetRecord>, StarterError> {
    let payload: CatalogueResponse = serde_json::from_str(body)
        .map_err(|err| StarterError::parse(format!("catalogue body: {err}")))?;
    Ok(payload.dataset)
}
