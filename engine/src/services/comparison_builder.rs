// Builds the paired-series comparison for one metric from two filtered tables
use shared::models::{CohortId, ComparisonResult, Dataset, MetricSpec, Series, SeriesPoint, Table};
use shared::utils::brazilian_format;

use super::cohort_aligner::cohort_of;
use crate::error::SchemaError;

pub fn build_comparison(
    without: &Table,
    with: &Table,
    cohort_column: &str,
    metric: &MetricSpec,
) -> Result<ComparisonResult, SchemaError> {
    for table in [without, with] {
        if !table.has_column(&metric.column) {
            return Err(SchemaError::MissingMetricColumn {
                metric: metric.title.clone(),
                column: metric.column.clone(),
                table: table.name().to_string(),
            });
        }
    }

    let result = ComparisonResult {
        metric: metric.clone(),
        without: build_series(Dataset::WithoutTreatment, without, cohort_column, metric),
        with: build_series(Dataset::WithTreatment, with, cohort_column, metric),
    };

    tracing::debug!(
        metric = %metric.column,
        without_points = result.without.points.len(),
        with_points = result.with.points.len(),
        missing = result.without.missing_count() + result.with.missing_count(),
        "Built comparison"
    );
    Ok(result)
}

// One point per row of `table`, stably sorted by cohort. Absent or unparseable
// metric cells become missing values rather than errors.
fn build_series(dataset: Dataset, table: &Table, cohort_column: &str, metric: &MetricSpec) -> Series {
    let mut keyed: Vec<(CohortId, Option<f64>)> = Vec::with_capacity(table.len());
    for (idx, row) in table.rows().iter().enumerate() {
        let Some(cohort) = cohort_of(row, cohort_column) else {
            tracing::warn!(
                table = %table.name(),
                row = idx + 1,
                "Row has no cohort value, skipping it in the chart"
            );
            continue;
        };
        let value = row.get(&metric.column).and_then(|cell| cell.as_number());
        keyed.push((cohort, value));
    }

    // sort_by is stable: rows sharing a cohort keep their file order
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let points = keyed
        .into_iter()
        .map(|(cohort, value)| SeriesPoint {
            label: brazilian_format::format_value(value, metric.format),
            cohort,
            value,
        })
        .collect();

    Series { dataset, points }
}
