use crate::catalogue::{DatasetRecord, DistributionRecord};
use crate::error::StarterError;

/// A dataset that survived filtering, with its sort key and dense position.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedDataset {
    pub position: usize,
    pub id_short: i128,
    pub record: DatasetRecord,
}

/// Keep CSV-bearing datasets (CSV distributions only) ordered by numeric identifier prefix.
pub fn filter_datasets(records: Vec<DatasetRecord>) -> Result<Vec<SortedDataset>, StarterError> {
    let mut kept = Vec::with_capacity(records.len());

    for mut record in records {
        let csv = csv_distributions(std::mem::take(&mut record.distribution));
        if csv.is_empty() {
            continue;
        }
        record.distribution = csv;
        let id_short = parse_id_short(&record.identifier)?;
        kept.push(SortedDataset {
            position: 0,
            id_short,
            record,
        });
    }

    // `sort_by_key` is stable, so repeated prefixes keep feed order.
    kept.sort_by_key(|dataset| dataset.id_short);
    for (position, dataset) in kept.iter_mut().enumerate() {
        dataset.position = position;
    }

    Ok(kept)
}

pub fn csv_distributions(distributions: Vec<DistributionRecord>) -> Vec<DistributionRecord> {
    distributions
        .into_iter()
        .filter(DistributionRecord::is_csv)
        .collect()
}

/// Text before the first `@` (the whole identifier if there is none).
pub fn identifier_prefix(identifier: &str) -> &str {
    identifier.split('@').next().unwrap_or(identifier)
}

pub fn parse_id_short(identifier: &str) -> Result<i128, StarterError> {
    identifier_prefix(identifier)
        .trim()
        .parse::<i128>()
        .map_err(|_| StarterError::MalformedIdentifier {
            identifier: identifier.to_string(),
        })
}
