// Command line surface of the safras binary and the one-shot pipeline behind it
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use shared::models::{CohortId, CohortRange, CohortSet, FilterMode, FilterSpec};
use std::path::PathBuf;
use tracing::info;

use crate::config::DashboardSettings;
use crate::data::{TableCache, TableLoader};
use crate::error::EngineError;
use crate::render;
use crate::services::cohort_aligner::align_cohorts;
use crate::services::dashboard::{build_dashboard, SessionState};

#[derive(Parser, Debug)]
#[command(
    name = "safras",
    version,
    about = "Compara safras (turmas) de consultores com e sem MF"
)]
pub struct Cli {
    /// Spreadsheet of the cohorts without MF (.csv or .xlsx)
    #[arg(long, value_name = "FILE")]
    pub without: PathBuf,

    /// Spreadsheet of the cohorts with MF (.csv or .xlsx)
    #[arg(long, value_name = "FILE")]
    pub with: PathBuf,

    /// Selected cohorts (multiselect mode). Omit to select every cohort; pass
    /// it with no value for an empty selection.
    #[arg(long, value_name = "ID", num_args = 0.., value_delimiter = ',')]
    pub cohorts: Option<Vec<String>>,

    /// Lower bound of the cohort range (range mode)
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Upper bound of the cohort range (range mode)
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Dashboard config (JSON). Defaults to the built-in configuration.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "html")]
    pub format: OutputFormat,

    /// Write the result here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Html,
    Json,
}

impl Cli {
    pub fn settings(&self) -> Result<DashboardSettings, EngineError> {
        match &self.config {
            Some(path) => DashboardSettings::load(path),
            None => DashboardSettings::load_default(),
        }
    }

    // Turns the filter flags into a FilterSpec for the configured mode. Flags of
    // the other mode are rejected rather than ignored.
    pub fn filter_spec(&self, mode: FilterMode, union: &CohortSet) -> Result<FilterSpec, EngineError> {
        match mode {
            FilterMode::Multiselect => {
                if self.min.is_some() || self.max.is_some() {
                    return Err(EngineError::ConfigError(
                        "--min/--max require a range-mode config".into(),
                    ));
                }
                Ok(match &self.cohorts {
                    Some(ids) => FilterSpec::cohorts(ids.iter().filter_map(|id| CohortId::parse(id))),
                    None => FilterSpec::all_of(union),
                })
            }
            FilterMode::Range => {
                if self.cohorts.is_some() {
                    return Err(EngineError::ConfigError(
                        "--cohorts requires a multiselect config".into(),
                    ));
                }
                Ok(FilterSpec::Range(CohortRange::new(self.min, self.max)))
            }
        }
    }
}

// Load, filter, build and render. Returns the rendered document; nothing is
// produced if either file fails to load.
pub fn run(cli: &Cli) -> Result<String, EngineError> {
    let settings = cli.settings()?;
    let mut cache = TableCache::new(TableLoader::new(settings.delimiter_byte()?));

    let without = cache.load_path(&cli.without)?;
    let with = cache.load_path(&cli.with)?;
    info!(without = %without.name(), with = %with.name(), "Loaded tables");

    let union = align_cohorts(&without, &with, &settings.cohort_column)?;
    let filter = cli.filter_spec(settings.filter_mode, &union)?;
    let session = SessionState::new(without, with, filter);
    let dashboard = build_dashboard(&settings, &session)?;

    match cli.format {
        OutputFormat::Html => render::render_page(&settings, &dashboard),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&dashboard)?),
    }
}
