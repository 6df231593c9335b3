use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use super::{
    DISTRIBUTION_CELL, distributions, ensure_aligned, output_path, shared_substitutions,
    substitute, write_output,
};
use crate::codebook::Codebook;
use crate::config::Settings;
use crate::error::StarterError;

/// Populate the notebook template for one dataset and write it to the notebook directory.
///
/// Simple tokens are substituted textually first, then the document is parsed
/// so the `{{ DISTRIBUTION }}` cell can be swapped for generated code.
pub fn render_notebook(
    codebook: &Codebook,
    template: &str,
    settings: &Settings,
) -> Result<PathBuf, StarterError> {
    let document = notebook_document(codebook, template, settings)?;

    let serialized = serde_json::to_string_pretty(&document)
        .map_err(|err| StarterError::parse(format!("notebook serialization: {err}")))?;
    let path = output_path(
        &settings.notebook_dir(),
        codebook.identifier(),
        &settings.output.notebook_ext,
    )?;
    write_output(&path, &format!("{serialized}\n"))?;
    debug!(path = %path.display(), "Notebook written");
    Ok(path)
}

/// The finished notebook as structured data, without touching the filesystem.
pub fn notebook_document(
    codebook: &Codebook,
    template: &str,
    settings: &Settings,
) -> Result<Value, StarterError> {
    ensure_aligned(codebook)?;

    let substitutions: Vec<_> = shared_substitutions(codebook, settings)
        .into_iter()
        .map(|(token, value)| (token, json_string_safe(&value)))
        .collect();
    let text = substitute(template, &substitutions);

    let mut document: Value = serde_json::from_str(&text).map_err(|err| {
        StarterError::parse(format!(
            "notebook for {} is not valid JSON after substitution: {err}",
            codebook.identifier()
        ))
    })?;

    let cell = document
        .get_mut("cells")
        .and_then(Value::as_array_mut)
        .and_then(|cells| cells.iter_mut().find(|cell| is_distribution_cell(cell)))
        .ok_or_else(|| StarterError::TemplateStructure {
            identifier: codebook.identifier().to_string(),
        })?;

    cell["source"] = Value::Array(
        distribution_code(codebook)
            .into_iter()
            .map(Value::String)
            .collect(),
    );

    Ok(document)
}

fn is_distribution_cell(cell: &Value) -> bool {
    match cell.get("source") {
        Some(Value::String(source)) => source == DISTRIBUTION_CELL,
        Some(Value::Array(lines)) => {
            lines.len() == 1 && lines[0].as_str() == Some(DISTRIBUTION_CELL)
        }
        _ => false,
    }
}

/// Source lines of the code cell, each terminated with `\n`.
fn distribution_code(codebook: &Codebook) -> Vec<String> {
    distributions(codebook)
        .flat_map(|(index, block, link)| {
            let code = format!("# Distribution {index}\n{block}\ndf = get_dataset('{link}')\n");
            code.split('\n')
                .map(|line| format!("{line}\n"))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Make a value safe to drop between the quotes of a JSON string.
///
/// Double quotes become single quotes; backslashes and control characters are escaped.
pub fn json_string_safe(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push('\''),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::parse_catalogue;
    use crate::codebook::prepare_codebooks;
    use crate::filter::filter_datasets;
    use serde_json::json;

    const TEMPLATE: &str = r##"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": ["# {{ DATASET_TITLE }}\n", "{{ DATASET_DESCRIPTION }}\n", "{{ DATASET_METADATA }}", "{{ CONTACT }} {{ DATASHOP_LINK }} {{ DISTRIBUTION_COUNT }}"]},
  {"cell_type": "code", "execution_count": null, "metadata": {}, "outputs": [], "source": ["{{ DISTRIBUTION }}"]}
 ],
 "metadata": {"provider": "{{ PROVIDER }}", "identifier": "{{ DATASET_IDENTIFIER }}"},
 "nbformat": 4,
 "nbformat_minor": 5
}"##;

    fn codebook(dataset: Value) -> Codebook {
        let records = parse_catalogue(&json!({ "dataset": [dataset] }).to_string())
            .expect("fixture parses");
        let sorted = filter_datasets(records).expect("filters");
        prepare_codebooks(sorted, &Settings::default()).remove(0)
    }

    fn markdown_source(document: &Value) -> String {
        document["cells"][0]["source"]
            .as_array()
            .expect("source lines")
            .iter()
            .filter_map(Value::as_str)
            .collect()
    }

    #[test]
    fn quotes_in_free_text_keep_the_document_valid() {
        let codebook = codebook(json!({
            "identifier": "100@xyz",
            "title": "He said \"hello\"",
            "description": "A \"quoted\" word\nand a second line with a \\ backslash",
            "issued": "say \"when\"",
            "distribution": [{"format": "CSV", "downloadUrl": "http://x/a.csv"}]
        }));

        let document =
            notebook_document(&codebook, TEMPLATE, &Settings::default()).expect("renders");
        let reparsed: Value =
            serde_json::from_str(&serde_json::to_string(&document).expect("serializes"))
                .expect("round trips");

        let markdown = markdown_source(&reparsed);
        assert!(markdown.contains("He said 'hello'"));
        assert!(markdown.contains("A 'quoted' word\nand a second line with a \\ backslash"));
        assert!(markdown.contains("- **Issued** `say 'when'`"));
        assert_eq!(reparsed["metadata"]["identifier"], json!("100@xyz"));
    }

    #[test]
    fn distribution_cell_is_replaced_with_code_lines() {
        let codebook = codebook(json!({
            "identifier": "100@xyz",
            "distribution": [
                {"format": "CSV", "title": "First", "downloadUrl": "http://x/a.csv"},
                {"format": "CSV", "title": "Second", "downloadUrl": "http://x/b.csv"}
            ]
        }));

        let document =
            notebook_document(&codebook, TEMPLATE, &Settings::default()).expect("renders");
        let lines: Vec<&str> = document["cells"][1]["source"]
            .as_array()
            .expect("source lines")
            .iter()
            .filter_map(Value::as_str)
            .collect();

        assert_eq!(lines[0], "# Distribution 0\n");
        assert!(lines.iter().all(|line| line.ends_with('\n')));
        assert!(lines.contains(&"df = get_dataset('http://x/a.csv')\n"));
        assert!(lines.contains(&"# Distribution 1\n"));
        assert!(lines.contains(&"df = get_dataset('http://x/b.csv')\n"));
        assert!(markdown_source(&document).ends_with(" 2"));
    }

    #[test]
    fn missing_placeholder_cell_is_a_structure_error() {
        let codebook = codebook(json!({
            "identifier": "7@x",
            "distribution": [{"format": "CSV"}]
        }));
        let template = TEMPLATE.replace("{{ DISTRIBUTION }}", "print(1)");

        let err = notebook_document(&codebook, &template, &Settings::default()).unwrap_err();
        assert!(matches!(
            err,
            StarterError::TemplateStructure { ref identifier } if identifier == "7@x"
        ));
    }

    #[test]
    fn misaligned_codebook_is_rejected() {
        let mut codebook = codebook(json!({
            "identifier": "7@x",
            "distribution": [{"format": "CSV"}]
        }));
        codebook.distribution_links.push("http://x/extra.csv".to_string());

        let err = notebook_document(&codebook, TEMPLATE, &Settings::default()).unwrap_err();
        assert!(matches!(
            err,
            StarterError::DistributionArityMismatch { blocks: 1, links: 2, .. }
        ));
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

        let path = render_notebook(&codebook, TEMPLATE, &settings).expect("renders");

        assert_eq!(path, dir.path().join("python").join("100@xyz.ipynb"));
        let written = std::fs::read_to_string(&path).expect("read back");
        let parsed: Value = serde_json::from_str(&written).expect("valid notebook");
        assert_eq!(parsed["nbformat"], json!(4));
    }

    #[test]
    fn json_string_safe_escapes_controls() {
        assert_eq!(json_string_safe("a\"b"), "a'b");
        assert_eq!(json_string_safe("a\r\n\tb"), "a\\r\\n\\tb");
        assert_eq!(json_string_safe("\u{1}"), "\\u0001");
    }
}
