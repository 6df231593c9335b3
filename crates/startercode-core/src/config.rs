use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StarterError;

pub const CONFIG_FILE_NAME: &str = "startercode.toml";
pub const CONFIG_PATH_ENV: &str = "STARTERCODE_CONFIG";
pub const METADATA_URL_ENV: &str = "STARTERCODE_METADATA_URL";
pub const TIMEOUT_ENV: &str = "STARTERCODE_TIMEOUT_SECS";
pub const WORK_PREFIX_ENV: &str = "STARTERCODE_WORK_PREFIX";

const DEFAULT_TITLE_MAX_CHARS: usize = 65;
const DEFAULT_LABEL_WIDTH: usize = 25;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub settings: Settings,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No configuration file was found; defaults were synthesized.
    Default,
    /// Configuration was read from the given TOML file.
    File(PathBuf),
}

/// Every knob of a generator run. Passed explicitly to each stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub templates: TemplateNames,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub datashop: DatashopSettings,
    #[serde(default)]
    pub github: GithubSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub metadata_keys: MetadataKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding the three templates.
    pub templates: PathBuf,
    /// Root under which every generated file lands.
    pub work_prefix: PathBuf,
    /// Notebook output directory, relative to `work_prefix` and the repository root.
    pub notebook_output: String,
    /// Report output directory, relative to `work_prefix` and the repository root.
    pub report_output: String,
    pub overview_file: String,
    /// Enables the JSON log file when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("templates"),
            work_prefix: PathBuf::from("."),
            notebook_output: "python".to_string(),
            report_output: "r".to_string(),
            overview_file: "README.md".to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateNames {
    pub notebook: String,
    pub report: String,
    pub header: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            notebook: "python_template.ipynb".to_string(),
            report: "r_template.Rmd".to_string(),
            header: "header.md".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub notebook_ext: String,
    pub report_ext: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            notebook_ext: "ipynb".to_string(),
            report_ext: "Rmd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatashopSettings {
    /// Dataset page prefix; the identifier is appended verbatim.
    pub base_link: String,
    /// Catalogue endpoint returning `{"dataset": [...]}`.
    pub metadata_link: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DatashopSettings {
    fn default() -> Self {
        Self {
            base_link: "https://www.zh.ch/de/politik-staat/statistik-daten/datenkatalog.html#/datasets/"
                .to_string(),
            metadata_link: "https://www.web.statistik.zh.ch/ogd/daten/zhweb.json".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("startercode/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DatashopSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Only used to build the links shown in the overview document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub account: String,
    pub repo_name: String,
    pub branch: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            account: "openZH".to_string(),
            repo_name: "starter-code-openZH".to_string(),
            branch: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub provider: String,
    pub title_max_chars: usize,
    /// Column width of the field label in distribution comment blocks.
    pub label_width: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            provider: "Statistisches Amt des Kantons Zürich".to_string(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            label_width: DEFAULT_LABEL_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataKeys {
    pub dataset: Vec<String>,
    pub distribution: Vec<String>,
}

impl Default for MetadataKeys {
    fn default() -> Self {
        Self {
            dataset: default_dataset_keys(),
            distribution: default_distribution_keys(),
        }
    }
}

fn default_dataset_keys() -> Vec<String> {
    [
        "issued",
        "modified",
        "startDate",
        "endDate",
        "theme",
        "keyword",
        "publisher",
        "landingPage",
    ]
    .iter()
    .map(|key| key.to_string())
    .collect()
}

fn default_distribution_keys() -> Vec<String> {
    ["title", "description", "issued", "modified", "rights"]
        .iter()
        .map(|key| key.to_string())
        .collect()
}

impl Settings {
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.paths.templates.join(name)
    }

    pub fn notebook_dir(&self) -> PathBuf {
        self.paths.work_prefix.join(&self.paths.notebook_output)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.paths.work_prefix.join(&self.paths.report_output)
    }

    pub fn overview_path(&self) -> PathBuf {
        self.paths.work_prefix.join(&self.paths.overview_file)
    }

    pub fn datashop_link(&self, identifier: &str) -> String {
        format!("{}{}", self.datashop.base_link, identifier)
    }

    /// Parse a TOML document; absent sections and keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, StarterError> {
        toml::from_str(raw).map_err(|err| StarterError::Config(err.to_string()))
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), StarterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup(METADATA_URL_ENV)) {
            self.datashop.metadata_link = url;
        }
        if let Some(prefix) = non_empty(lookup(WORK_PREFIX_ENV)) {
            self.paths.work_prefix = PathBuf::from(prefix);
        }
        if let Some(raw) = non_empty(lookup(TIMEOUT_ENV)) {
            self.datashop.timeout_secs = raw.trim().parse::<u64>().map_err(|err| {
                StarterError::Config(format!("invalid value for {}: {}", TIMEOUT_ENV, err))
            })?;
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Locate, parse, override and sanitize the configuration for this process.
pub fn load_config() -> Result<ConfigLoadResult, StarterError> {
    let cwd = env::current_dir().map_err(|err| StarterError::file_io(Path::new("."), err))?;
    load_config_with(&cwd, |key| env::var(key).ok())
}

/// Same as [`load_config`] with an injectable working directory and variable lookup.
pub fn load_config_with<F>(cwd: &Path, lookup: F) -> Result<ConfigLoadResult, StarterError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut settings, source) = match non_empty(lookup(CONFIG_PATH_ENV)) {
        Some(explicit) => {
            let path = cwd.join(explicit);
            let raw = fs::read_to_string(&path).map_err(|err| StarterError::file_io(&path, err))?;
            (Settings::from_toml_str(&raw)?, ConfigSource::File(path))
        }
        None => {
            let path = cwd.join(CONFIG_FILE_NAME);
            if path.exists() {
                let raw =
                    fs::read_to_string(&path).map_err(|err| StarterError::file_io(&path, err))?;
                (Settings::from_toml_str(&raw)?, ConfigSource::File(path))
            } else {
                (Settings::default(), ConfigSource::Default)
            }
        }
    };

    settings.apply_env_overrides(&lookup)?;
    let (settings, warnings) = sanitize_settings(settings);

    Ok(ConfigLoadResult {
        settings,
        warnings,
        source,
    })
}

fn sanitize_settings(mut settings: Settings) -> (Settings, Vec<String>) {
    let mut warnings = Vec::new();

    if settings.display.title_max_chars == 0 {
        warnings.push(format!(
            "display.title_max_chars must be positive; using {}",
            DEFAULT_TITLE_MAX_CHARS
        ));
        settings.display.title_max_chars = DEFAULT_TITLE_MAX_CHARS;
    }

    if settings.display.label_width == 0 {
        warnings.push(format!(
            "display.label_width must be positive; using {}",
            DEFAULT_LABEL_WIDTH
        ));
        settings.display.label_width = DEFAULT_LABEL_WIDTH;
    }

    if settings.datashop.timeout_secs == 0 {
        warnings.push(format!(
            "datashop.timeout_secs must be positive; using {}",
            DEFAULT_TIMEOUT_SECS
        ));
        settings.datashop.timeout_secs = DEFAULT_TIMEOUT_SECS;
    }

    if settings.metadata_keys.dataset.is_empty() {
        warnings.push("metadata_keys.dataset is empty; restoring the default key list".into());
        settings.metadata_keys.dataset = default_dataset_keys();
    }

    if settings.metadata_keys.distribution.is_empty() {
        warnings
            .push("metadata_keys.distribution is empty; restoring the default key list".into());
        settings.metadata_keys.distribution = default_distribution_keys();
    }

    for (label, dir) in [
        ("paths.notebook_output", &mut settings.paths.notebook_output),
        ("paths.report_output", &mut settings.paths.report_output),
    ] {
        let trimmed = dir.trim_matches('/').to_string();
        if trimmed != *dir {
            warnings.push(format!("{label} should not carry leading or trailing slashes"));
            *dir = trimmed;
        }
    }

    (settings, warnings)
}
