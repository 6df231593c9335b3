use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;

use super::{
    DISTRIBUTIONS, TODAY_DATE, distributions, ensure_aligned, output_path, shared_substitutions,
    substitute, write_output,
};
use crate::codebook::Codebook;
use crate::config::Settings;
use crate::error::StarterError;

/// Populate the plain-text report template for one dataset and write it to the report directory.
pub fn render_report(
    codebook: &Codebook,
    template: &str,
    settings: &Settings,
    today: NaiveDate,
) -> Result<PathBuf, StarterError> {
    let text = report_text(codebook, template, settings, today)?;
    let path = output_path(
        &settings.report_dir(),
        codebook.identifier(),
        &settings.output.report_ext,
    )?;
    write_output(&path, &text)?;
    debug!(path = %path.display(), "Report written");
    Ok(path)
}

pub fn report_text(
    codebook: &Codebook,
    template: &str,
    settings: &Settings,
    today: NaiveDate,
) -> Result<String, StarterError> {
    ensure_aligned(codebook)?;

    let mut substitutions = shared_substitutions(codebook, settings);
    substitutions.push((TODAY_DATE, today.format("%Y-%m-%d").to_string()));
    substitutions.push((DISTRIBUTIONS, distribution_code(codebook)));

    Ok(substitute(template, &substitutions))
}

fn distribution_code(codebook: &Codebook) -> String {
    distributions(codebook)
        .map(|(index, block, link)| {
            format!("# Distribution {index}\n{block}\ndf <- read_delim('{link}')\n\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::parse_catalogue;
    use crate::codebook::prepare_codebooks;
    use crate::filter::filter_datasets;
    use serde_json::{Value, json};

    const TEMPLATE: &str = "---\ntitle: \"{{ DATASET_TITLE }}\"\ndate: \"{{ TODAY_DATE }}\"\n---\n\
{{ DATASET_DESCRIPTION }}\n\n{{ DATASET_METADATA }}\nContact: {{ CONTACT }}\n\
{{ DATASHOP_LINK }}\n\n```{r}\n{{ DISTRIBUTIONS }}```\n{{ UNKNOWN }}\n";

    fn codebook(dataset: Value) -> Codebook {
        let records = parse_catalogue(&json!({ "dataset": [dataset] }).to_string())
            .expect("fixture parses");
        let sorted = filter_datasets(records).expect("filters");
        prepare_codebooks(sorted, &Settings::default()).remove(0)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date")
    }

    #[test]
    fn text_is_substituted_without_escaping() {
        let codebook = codebook(json!({
            "identifier": "100@xyz",
            "title": "He said \"hello\"",
            "description": "First line\nsecond line",
            "distribution": [{"format": "CSV", "downloadUrl": "http://x/a.csv"}]
        }));

        let text = report_text(&codebook, TEMPLATE, &Settings::default(), today()).expect("renders");

        assert!(text.contains("title: \"He said \"hello\"\""));
        assert!(text.contains("date: \"2024-03-09\""));
        assert!(text.contains("First line\nsecond line"));
        assert!(text.contains("Contact: N/A"));
        assert!(text.contains("(https://www.zh.ch/de/politik-staat/statistik-daten/datenkatalog.html#/datasets/100@xyz)"));
        assert!(text.contains("{{ UNKNOWN }}"));
    }

    #[test]
    fn distributions_are_separated_by_blank_lines() {
        let codebook = codebook(json!({
            "identifier": "100@xyz",
            "distribution": [
                {"format": "CSV", "description": "Line one\n\nLine two", "downloadUrl": "http://x/a.csv"},
                {"format": "CSV", "downloadUrl": "http://x/b.csv"}
            ]
        }));

        let text = report_text(&codebook, TEMPLATE, &Settings::default(), today()).expect("renders");

        assert!(text.contains("# Distribution 0\n# Title"));
        assert!(text.contains("# Description              : Line one Line two\n"));
        assert!(text.contains("\ndf <- read_delim('http://x/a.csv')\n\n# Distribution 1\n"));
        assert!(text.contains("df <- read_delim('http://x/b.csv')\n\n```"));
    }

    #[test]
    fn render_writes_named_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut settings = Settings::default();
        settings.paths.work_prefix = dir.path().to_path_buf();
        let codebook = codebook(json!({
            "identifier": "100@xyz",
            "distribution": [{"format": "CSV", "downloadUrl": "http://x/a.csv"}]
        }));

        let path = render_report(&codebook, TEMPLATE, &settings, today()).expect("renders");

        assert_eq!(path, dir.path().join("r").join("100@xyz.Rmd"));
        assert!(path.exists());
    }

    #[test]
    fn misaligned_codebook_is_rejected() {
        let mut codebook = codebook(json!({
            "identifier": "7@x",
            "distribution": [{"format": "CSV"}]
        }));
        codebook.distribution_blocks.clear();

        let err = report_text(&codebook, TEMPLATE, &Settings::default(), today()).unwrap_err();
        assert!(matches!(
            err,
            StarterError::DistributionArityMismatch { blocks: 0, links: 1, .. }
        ));
    }
}
