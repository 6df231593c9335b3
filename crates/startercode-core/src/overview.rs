use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::codebook::{Codebook, MISSING};
use crate::config::Settings;
use crate::error::StarterError;
use crate::filter::identifier_prefix;
use crate::render::{DATASET_COUNT, TODAY_DATE, substitute, write_output};

const ELLIPSIS: char = '…';
const COLAB_BADGE: &str = "https://colab.research.google.com/assets/colab-badge.svg";

/// One table row: a dataset and which of its files actually exist.
#[derive(Debug, Clone, Copy)]
pub struct OverviewRow<'a> {
    pub codebook: &'a Codebook,
    pub notebook_written: bool,
    pub report_written: bool,
}

/// Write the overview document to `<work_prefix>/<overview_file>`, replacing any previous one.
pub fn build_overview(
    rows: &[OverviewRow<'_>],
    header_template: &str,
    settings: &Settings,
    now: NaiveDateTime,
) -> Result<PathBuf, StarterError> {
    let document = overview_text(rows, header_template, settings, now);
    let path = settings.overview_path();
    write_output(&path, &document)?;
    debug!(path = %path.display(), rows = rows.len(), "Overview written");
    Ok(path)
}

pub fn overview_text(
    rows: &[OverviewRow<'_>],
    header_template: &str,
    settings: &Settings,
    now: NaiveDateTime,
) -> String {
    let header = substitute(
        header_template,
        &[
            (DATASET_COUNT, rows.len().to_string()),
            (TODAY_DATE, now.format("%Y-%m-%d %H:%M:%S").to_string()),
        ],
    );

    let mut document = header;
    document.push_str(&format!(
        "| ID | Title (abbreviated to {} chars) | Python Colab | Python GitHub | R GitHub |\n",
        settings.display.title_max_chars
    ));
    document.push_str("| :-- | :-- | :-- | :-- | :-- |\n");

    let links = LinkBases::new(settings);
    for row in rows {
        document.push_str(&table_row(row, &links, settings));
    }
    document
}

struct LinkBases<'a> {
    notebook_github: String,
    notebook_colab: String,
    report_github: String,
    notebook_ext: &'a str,
    report_ext: &'a str,
}

impl<'a> LinkBases<'a> {
    fn new(settings: &'a Settings) -> Self {
        let github = &settings.github;
        let blob = |host: &str, dir: &str| {
            format!(
                "https://{host}/{}/{}/blob/{}/{dir}",
                github.account, github.repo_name, github.branch
            )
        };
        Self {
            notebook_github: blob("github.com", &settings.paths.notebook_output),
            notebook_colab: blob("githubtocolab.com", &settings.paths.notebook_output),
            report_github: blob("github.com", &settings.paths.report_output),
            notebook_ext: &settings.output.notebook_ext,
            report_ext: &settings.output.report_ext,
        }
    }
}

fn link(base: &str, identifier: &str, extension: &str) -> String {
    format!("{base}/{identifier}.{extension}")
}

fn table_row(row: &OverviewRow<'_>, links: &LinkBases<'_>, settings: &Settings) -> String {
    let identifier = row.codebook.identifier();
    let title = truncate_title(row.codebook.title(), settings.display.title_max_chars);

    let (colab, notebook_github) = if row.notebook_written {
        (
            format!(
                "[![Open In Colab]({COLAB_BADGE})]({})",
                link(&links.notebook_colab, identifier, links.notebook_ext)
            ),
            format!(
                "[Python GitHub]({})",
                link(&links.notebook_github, identifier, links.notebook_ext)
            ),
        )
    } else {
        (MISSING.to_string(), MISSING.to_string())
    };

    let report_github = if row.report_written {
        format!(
            "[R GitHub]({})",
            link(&links.report_github, identifier, links.report_ext)
        )
    } else {
        MISSING.to_string()
    };

    format!(
        "| {} | [{}]({}) | {} | {} | {} |\n",
        identifier_prefix(identifier),
        title,
        settings.datashop_link(identifier),
        colab,
        notebook_github,
        report_github
    )
}

/// Replace square brackets with spaces and cut to `max_chars`, marking the cut with `…`.
///
/// Applying it to its own output changes nothing.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    let cleaned = title.replace(['[', ']'], " ");
    if cleaned.chars().count() > max_chars {
        let mut truncated: String = cleaned.chars().take(max_chars).collect();
        truncated.push(ELLIPSIS);
        truncated
    } else {
        cleaned
    }
}
