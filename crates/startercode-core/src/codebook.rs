use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::catalogue::DistributionRecord;
use crate::config::Settings;
use crate::filter::SortedDataset;

/// Placeholder for absent or null metadata values.
pub const MISSING: &str = "N/A";

/// Per-dataset text fragments shared by both template flavors.
#[derive(Debug, Clone, PartialEq)]
pub struct Codebook {
    pub dataset: SortedDataset,
    pub metadata_block: String,
    pub contact: String,
    pub distribution_blocks: Vec<String>,
    /// Index-aligned with `distribution_blocks`.
    pub distribution_links: Vec<String>,
}

impl Codebook {
    pub fn identifier(&self) -> &str {
        &self.dataset.record.identifier
    }

    pub fn title(&self) -> &str {
        self.dataset.record.title()
    }

    pub fn description(&self) -> &str {
        self.dataset.record.description()
    }

    pub fn distribution_count(&self) -> usize {
        self.distribution_blocks.len()
    }
}

pub fn prepare_codebooks(datasets: Vec<SortedDataset>, settings: &Settings) -> Vec<Codebook> {
    datasets
        .into_iter()
        .map(|dataset| prepare_codebook(dataset, settings))
        .collect()
}

pub fn prepare_codebook(mut dataset: SortedDataset, settings: &Settings) -> Codebook {
    let metadata_block = metadata_block(&dataset, &settings.metadata_keys.dataset);
    let contact = contact_line(&dataset.record.contact_points());

    let mut distribution_blocks = Vec::with_capacity(dataset.record.distribution.len());
    let mut distribution_links = Vec::with_capacity(dataset.record.distribution.len());
    for distribution in dataset.record.distribution.iter_mut() {
        if let Some(description) = distribution.description() {
            let collapsed = collapse_newlines(description);
            distribution.set_description(collapsed);
        }
        distribution_blocks.push(distribution_block(
            distribution,
            &settings.metadata_keys.distribution,
            settings.display.label_width,
        ));
        distribution_links.push(distribution.download_url().to_string());
    }

    Codebook {
        dataset,
        metadata_block,
        contact,
        distribution_blocks,
        distribution_links,
    }
}

fn metadata_block(dataset: &SortedDataset, keys: &[String]) -> String {
    keys.iter()
        .map(|key| {
            format!(
                "- **{}** `{}`\n",
                capitalize(key),
                render_value(dataset.record.field(key))
            )
        })
        .collect()
}

fn distribution_block(distribution: &DistributionRecord, keys: &[String], width: usize) -> String {
    keys.iter()
        .map(|key| {
            format!(
                "# {:<width$}: {}\n",
                capitalize(key),
                render_value(distribution.field(key)),
                width = width
            )
        })
        .collect()
}

/// First contact entry with nulls dropped, joined by ` | `.
pub fn contact_line(contact_points: &[&Map<String, Value>]) -> String {
    match contact_points.first() {
        Some(contact) => contact
            .values()
            .filter(|value| !value.is_null())
            .map(|value| render_value(Some(value)))
            .collect::<Vec<_>>()
            .join(" | "),
        None => MISSING.to_string(),
    }
}

/// Collapse every run of newlines into one space so the text fits a line comment.
pub fn collapse_newlines(text: &str) -> String {
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    let re = NEWLINES.get_or_init(|| Regex::new(r"\n+").expect("static regex is valid"));
    re.replace_all(text, " ").into_owned()
}

/// Upper-case the first character and lower-case the rest.
pub fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    }
}
