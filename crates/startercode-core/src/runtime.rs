use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use reqwest::Client;
use tracing::{error, info, warn};

use crate::catalogue::{DatasetRecord, fetch_catalogue};
use crate::codebook::{Codebook, prepare_codebooks};
use crate::config::Settings;
use crate::error::StarterError;
use crate::filter::filter_datasets;
use crate::overview::{OverviewRow, build_overview};
use crate::render::{Templates, render_notebook, render_report};

pub type StageProgressCallback = Arc<dyn Fn(StageProgressEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct StageProgressEvent {
    pub kind: StageProgressEventKind,
    pub stage: Option<String>,
    pub elapsed_ms: f64,
    pub stage_elapsed_ms: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageProgressEventKind {
    Begin,
    End,
    Progress,
}

pub const STAGE_FETCH: &str = "Fetch catalogue";
pub const STAGE_FILTER: &str = "Filter datasets";
pub const STAGE_PREPARE: &str = "Prepare codebooks";
pub const STAGE_NOTEBOOKS: &str = "Render notebooks";
pub const STAGE_REPORTS: &str = "Render reports";
pub const STAGE_OVERVIEW: &str = "Build overview";

/// Which flavor a skipped file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Notebook,
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub identifier: String,
    pub flavor: Flavor,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub datasets: usize,
    pub notebooks_written: usize,
    pub reports_written: usize,
    pub skipped: Vec<SkippedArtifact>,
    pub overview: PathBuf,
}

struct StageLogger {
    program_start: Instant,
    stage_start: Instant,
    current_stage: Option<String>,
    callback: Option<StageProgressCallback>,
}

impl StageLogger {
    fn new(callback: Option<StageProgressCallback>) -> Self {
        let start = Instant::now();
        Self {
            program_start: start,
            stage_start: start,
            current_stage: None,
            callback,
        }
    }

    fn begin(&mut self, name: &str) {
        let since_start = self.program_start.elapsed();
        info!(stage = name, elapsed_ms = %format_ms(since_start), "BEGIN");
        self.stage_start = Instant::now();
        self.current_stage = Some(name.to_string());
        self.emit(StageProgressEvent {
            kind: StageProgressEventKind::Begin,
            stage: Some(name.to_string()),
            elapsed_ms: as_ms(since_start),
            stage_elapsed_ms: None,
            message: Some(format!("Starting {name}")),
        });
    }

    fn end(&mut self, name: &str) {
        let stage_elapsed = self.stage_start.elapsed();
        let total_elapsed = self.program_start.elapsed();
        info!(
            stage = name,
            elapsed_ms = %format_ms(total_elapsed),
            stage_ms = %format_ms(stage_elapsed),
            "END"
        );
        self.emit(StageProgressEvent {
            kind: StageProgressEventKind::End,
            stage: Some(name.to_string()),
            elapsed_ms: as_ms(total_elapsed),
            stage_elapsed_ms: Some(as_ms(stage_elapsed)),
            message: Some(format!("Finished {name} (Δ {} ms)", format_ms(stage_elapsed))),
        });
        self.current_stage = None;
    }

    fn progress(&self, done: usize, total: usize, identifier: &str) {
        let text = format!("{done}/{total} {identifier}");
        tracing::debug!(stage = ?self.current_stage, "{text}");
        self.emit(StageProgressEvent {
            kind: StageProgressEventKind::Progress,
            stage: self.current_stage.clone(),
            elapsed_ms: as_ms(self.program_start.elapsed()),
            stage_elapsed_ms: Some(as_ms(self.stage_start.elapsed())),
            message: Some(text),
        });
    }

    fn emit(&self, event: StageProgressEvent) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

fn format_ms(d: Duration) -> String {
    format!("{:.3}", as_ms(d))
}

/// Fetch the catalogue and generate every starter file plus the overview.
pub async fn run(
    settings: &Settings,
    callback: Option<StageProgressCallback>,
) -> Result<RunSummary, StarterError> {
    let mut logger = StageLogger::new(callback);

    logger.begin(STAGE_FETCH);
    let client = Client::builder()
        .user_agent(settings.datashop.user_agent.as_str())
        .timeout(settings.datashop.timeout())
        .build()
        .map_err(|source| StarterError::Fetch {
            url: settings.datashop.metadata_link.clone(),
            source,
        })?;
    let records = fetch_catalogue(&client, settings).await?;
    logger.end(STAGE_FETCH);

    generate_with_logger(settings, records, Local::now().naive_local(), &mut logger)
}

/// Every stage after the fetch: filter, prepare, render both flavors, overview.
pub fn generate(
    settings: &Settings,
    records: Vec<DatasetRecord>,
    now: NaiveDateTime,
    callback: Option<StageProgressCallback>,
) -> Result<RunSummary, StarterError> {
    let mut logger = StageLogger::new(callback);
    generate_with_logger(settings, records, now, &mut logger)
}

fn generate_with_logger(
    settings: &Settings,
    records: Vec<DatasetRecord>,
    now: NaiveDateTime,
    logger: &mut StageLogger,
) -> Result<RunSummary, StarterError> {
    let templates = Templates::load(settings)?;

    logger.begin(STAGE_FILTER);
    let fetched = records.len();
    let datasets = filter_datasets(records)?;
    info!(
        fetched,
        kept = datasets.len(),
        "Found datasets with CSV distributions"
    );
    logger.end(STAGE_FILTER);

    logger.begin(STAGE_PREPARE);
    let codebooks = prepare_codebooks(datasets, settings);
    logger.end(STAGE_PREPARE);

    let mut skipped = Vec::new();

    logger.begin(STAGE_NOTEBOOKS);
    let notebooks = render_flavor(
        &codebooks,
        Flavor::Notebook,
        logger,
        &mut skipped,
        |codebook| render_notebook(codebook, &templates.notebook, settings),
    )?;
    logger.end(STAGE_NOTEBOOKS);

    logger.begin(STAGE_REPORTS);
    let today = now.date();
    let reports = render_flavor(
        &codebooks,
        Flavor::Report,
        logger,
        &mut skipped,
        |codebook| render_report(codebook, &templates.report, settings, today),
    )?;
    logger.end(STAGE_REPORTS);

    logger.begin(STAGE_OVERVIEW);
    let rows: Vec<OverviewRow<'_>> = codebooks
        .iter()
        .zip(notebooks.iter().zip(reports.iter()))
        .map(|(codebook, (notebook, report))| OverviewRow {
            codebook,
            notebook_written: *notebook,
            report_written: *report,
        })
        .collect();
    let overview = build_overview(&rows, &templates.header, settings, now)?;
    logger.end(STAGE_OVERVIEW);

    let summary = RunSummary {
        datasets: codebooks.len(),
        notebooks_written: notebooks.iter().filter(|written| **written).count(),
        reports_written: reports.iter().filter(|written| **written).count(),
        skipped,
        overview,
    };
    info!(
        datasets = summary.datasets,
        notebooks = summary.notebooks_written,
        reports = summary.reports_written,
        skipped = summary.skipped.len(),
        overview = %summary.overview.display(),
        "Starter code generation completed"
    );
    Ok(summary)
}

/// Render one flavor for every codebook; returns, per codebook, whether its file was written.
///
/// Per-dataset errors are logged and recorded in `skipped`; anything else aborts.
fn render_flavor<F>(
    codebooks: &[Codebook],
    flavor: Flavor,
    logger: &StageLogger,
    skipped: &mut Vec<SkippedArtifact>,
    mut render: F,
) -> Result<Vec<bool>, StarterError>
where
    F: FnMut(&Codebook) -> Result<PathBuf, StarterError>,
{
    let total = codebooks.len();
    let mut written = Vec::with_capacity(total);

    for (index, codebook) in codebooks.iter().enumerate() {
        match render(codebook) {
            Ok(_) => written.push(true),
            Err(err) if err.is_per_dataset() => {
                if let StarterError::TemplateStructure { identifier } = &err {
                    warn!(%identifier, ?flavor, "Distribution placeholder not found; skipping");
                } else {
                    error!(
                        identifier = codebook.identifier(),
                        ?flavor,
                        error = %err,
                        "Skipping dataset"
                    );
                }
                skipped.push(SkippedArtifact {
                    identifier: codebook.identifier().to_string(),
                    flavor,
                    reason: err.to_string(),
                });
                written.push(false);
            }
            Err(err) => return Err(err),
        }
        logger.progress(index + 1, total, codebook.identifier());
    }

    Ok(written)
}
