// Full recomputation for one user interaction: session state in, every chart's
// comparison out.
use serde::Serialize;
use shared::models::{
    CohortRange, CohortSet, ComparisonResult, FilterMode, FilterSpec, MetricSpec, Table,
};
use std::path::Path;
use std::sync::Arc;

use super::cohort_aligner::{align_cohorts, filter_table};
use super::comparison_builder::build_comparison;
use crate::config::DashboardSettings;
use crate::data::TableCache;
use crate::error::{EngineError, LoadError, SchemaError};

// Immutable snapshot of what the user has provided: both tables and the
// current filter selection. A filter change produces a new SessionState.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub without: Arc<Table>,
    pub with: Arc<Table>,
    pub filter: FilterSpec,
}

impl SessionState {
    pub fn new(without: Arc<Table>, with: Arc<Table>, filter: FilterSpec) -> Self {
        SessionState { without, with, filter }
    }

    // Loads both files through the cache. Any load failure stops here; there
    // is no partial dashboard.
    pub fn load(
        cache: &mut TableCache,
        without_path: &Path,
        with_path: &Path,
        filter: FilterSpec,
    ) -> Result<Self, LoadError> {
        let without = cache.load_path(without_path)?;
        let with = cache.load_path(with_path)?;
        Ok(SessionState::new(without, with, filter))
    }

    pub fn with_filter(&self, filter: FilterSpec) -> Self {
        SessionState {
            without: Arc::clone(&self.without),
            with: Arc::clone(&self.with),
            filter,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartOutcome {
    pub metric: MetricSpec,
    #[serde(serialize_with = "serialize_outcome")]
    pub result: Result<ComparisonResult, SchemaError>,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum OutcomeRepr<'a> {
    Comparison(&'a ComparisonResult),
    Error(String),
}

fn serialize_outcome<S: serde::Serializer>(
    result: &Result<ComparisonResult, SchemaError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match result {
        Ok(comparison) => OutcomeRepr::Comparison(comparison).serialize(serializer),
        Err(err) => OutcomeRepr::Error(err.to_string()).serialize(serializer),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub without_file: String,
    pub with_file: String,
    pub cohorts: CohortSet,
    pub filter: FilterSpec,
    pub empty_selection: bool,
    pub charts: Vec<ChartOutcome>,
}

impl Dashboard {
    pub fn schema_errors(&self) -> impl Iterator<Item = &SchemaError> {
        self.charts.iter().filter_map(|chart| chart.result.as_ref().err())
    }
}

pub fn build_dashboard(settings: &DashboardSettings, session: &SessionState) -> Result<Dashboard, EngineError> {
    if session.filter.mode() != settings.filter_mode {
        return Err(EngineError::ConfigError(format!(
            "this dashboard is configured for {} filtering, got a {} filter",
            mode_name(settings.filter_mode),
            mode_name(session.filter.mode())
        )));
    }

    let cohort_column = settings.cohort_column.as_str();
    let cohorts = align_cohorts(&session.without, &session.with, cohort_column)?;

    // Unset range bounds default to the extrema of the union.
    let filter = match &session.filter {
        FilterSpec::Range(range) => match range.resolve(&cohorts) {
            Some((min, max)) => FilterSpec::Range(CohortRange::new(Some(min), Some(max))),
            None => session.filter.clone(),
        },
        explicit => explicit.clone(),
    };

    let without = filter_table(&session.without, cohort_column, &filter)?;
    let with = filter_table(&session.with, cohort_column, &filter)?;
    let empty_selection = filter.is_empty_selection();
    if empty_selection {
        tracing::warn!("No cohort selected; every chart will be empty");
    }

    tracing::info!(
        cohorts = cohorts.len(),
        without_rows = without.len(),
        with_rows = with.len(),
        "Building dashboard"
    );

    let charts = settings
        .metrics
        .iter()
        .map(|metric| {
            let result = build_comparison(&without, &with, cohort_column, metric);
            if let Err(err) = &result {
                tracing::warn!(metric = %metric.title, error = %err, "Chart skipped");
            }
            ChartOutcome {
                metric: metric.clone(),
                result,
            }
        })
        .collect();

    Ok(Dashboard {
        without_file: session.without.name().to_string(),
        with_file: session.with.name().to_string(),
        cohorts,
        filter,
        empty_selection,
        charts,
    })
}

fn mode_name(mode: FilterMode) -> &'static str {
    match mode {
        FilterMode::Multiselect => "multiselect",
        FilterMode::Range => "range",
    }
}
