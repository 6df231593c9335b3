//! Template population for the two starter-code flavors.
//!
//! Placeholders are written as `{{ TOKEN }}` and replaced literally; tokens a
//! flavor does not know about are left in place.

pub mod notebook;
pub mod report;

use std::fs;
use std::path::{Path, PathBuf};

use crate::codebook::Codebook;
use crate::config::Settings;
use crate::error::StarterError;

pub use notebook::render_notebook;
pub use report::render_report;

pub const PROVIDER: &str = "{{ PROVIDER }}";
pub const DATASET_TITLE: &str = "{{ DATASET_TITLE }}";
pub const DATASET_DESCRIPTION: &str = "{{ DATASET_DESCRIPTION }}";
pub const DATASET_IDENTIFIER: &str = "{{ DATASET_IDENTIFIER }}";
pub const DATASET_METADATA: &str = "{{ DATASET_METADATA }}";
pub const DISTRIBUTION_COUNT: &str = "{{ DISTRIBUTION_COUNT }}";
pub const DATASHOP_LINK: &str = "{{ DATASHOP_LINK }}";
pub const CONTACT: &str = "{{ CONTACT }}";
pub const TODAY_DATE: &str = "{{ TODAY_DATE }}";
pub const DATASET_COUNT: &str = "{{ DATASET_COUNT }}";
pub const DISTRIBUTION_CELL: &str = "{{ DISTRIBUTION }}";
pub const DISTRIBUTIONS: &str = "{{ DISTRIBUTIONS }}";

/// The three template documents, read once per run.
#[derive(Debug, Clone)]
pub struct Templates {
    pub notebook: String,
    pub report: String,
    pub header: String,
}

impl Templates {
    pub fn load(settings: &Settings) -> Result<Self, StarterError> {
        Ok(Self {
            notebook: read_template(&settings.template_path(&settings.templates.notebook))?,
            report: read_template(&settings.template_path(&settings.templates.report))?,
            header: read_template(&settings.template_path(&settings.templates.header))?,
        })
    }
}

fn read_template(path: &Path) -> Result<String, StarterError> {
    fs::read_to_string(path).map_err(|err| StarterError::file_io(path, err))
}

/// Token/value pairs common to both flavors, before any flavor-specific escaping.
pub(crate) fn shared_substitutions(
    codebook: &Codebook,
    settings: &Settings,
) -> Vec<(&'static str, String)> {
    let identifier = codebook.identifier();
    vec![
        (PROVIDER, settings.display.provider.clone()),
        (DATASET_TITLE, codebook.title().to_string()),
        (DATASET_DESCRIPTION, codebook.description().to_string()),
        (DATASET_IDENTIFIER, identifier.to_string()),
        (DATASET_METADATA, codebook.metadata_block.clone()),
        (DISTRIBUTION_COUNT, codebook.distribution_count().to_string()),
        (
            DATASHOP_LINK,
            format!(
                "[Direct data shop link for dataset]({})",
                settings.datashop_link(identifier)
            ),
        ),
        (CONTACT, codebook.contact.clone()),
    ]
}

pub(crate) fn substitute(template: &str, substitutions: &[(&str, String)]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |text, (token, value)| {
            text.replace(*token, value)
        })
}

pub(crate) fn ensure_aligned(codebook: &Codebook) -> Result<(), StarterError> {
    let blocks = codebook.distribution_blocks.len();
    let links = codebook.distribution_links.len();
    if blocks != links {
        return Err(StarterError::DistributionArityMismatch {
            identifier: codebook.identifier().to_string(),
            blocks,
            links,
        });
    }
    Ok(())
}

/// `(index, block, link)` for every distribution of an aligned codebook.
pub(crate) fn distributions(codebook: &Codebook) -> impl Iterator<Item = (usize, &str, &str)> {
    codebook
        .distribution_blocks
        .iter()
        .zip(codebook.distribution_links.iter())
        .enumerate()
        .map(|(index, (block, link))| (index, block.as_str(), link.as_str()))
}

/// `<dir>/<identifier>.<extension>`; identifiers that would leave `dir` are refused.
pub(crate) fn output_path(
    dir: &Path,
    identifier: &str,
    extension: &str,
) -> Result<PathBuf, StarterError> {
    if identifier.is_empty() || identifier.contains(['/', '\\', '\0']) {
        return Err(StarterError::UnsafeIdentifier {
            identifier: identifier.to_string(),
        });
    }
    Ok(dir.join(format!("{identifier}.{extension}")))
}

/// Written to a temporary sibling, then renamed into place.
pub(crate) fn write_output(path: &Path, contents: &str) -> Result<(), StarterError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|err| StarterError::file_io(parent, err))?;
        }
    }
    let temp_path = build_temp_path(path);
    fs::write(&temp_path, contents).map_err(|err| StarterError::file_io(&temp_path, err))?;
    fs::rename(&temp_path, path).map_err(|err| StarterError::file_io(path, err))?;
    Ok(())
}

fn build_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => {
            temp_path.set_extension(format!("{ext}.tmp"));
        }
        _ => {
            temp_path.set_extension("tmp");
        }
    }
    temp_path
}
