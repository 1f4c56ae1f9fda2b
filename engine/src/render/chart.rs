// Grouped bar chart rendering: a ComparisonResult becomes a plotly.js figure
// (data + layout), serialized as JSON for the page or for external tooling.
use serde::Serialize;
use shared::models::{ComparisonResult, Dataset, Series};

use crate::config::settings::{ChartSettings, DatasetStyles, MarginSettings};

// "Sem MF" is drawn first, "Com MF" second.
const SERIES_ORDER: [Dataset; 2] = [Dataset::WithoutTreatment, Dataset::WithTreatment];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFigure {
    pub data: Vec<BarTrace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarTrace {
    #[serde(rename = "type")]
    pub trace_type: &'static str,
    pub name: String,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
    pub text: Vec<String>,
    pub hovertext: Vec<String>,
    pub hoverinfo: &'static str,
    pub textposition: &'static str,
    pub marker: Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: Title,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub orientation: &'static str,
    pub yanchor: &'static str,
    pub y: f64,
    pub xanchor: &'static str,
    pub x: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub barmode: &'static str,
    pub legend: Legend,
    pub height: u32,
    pub margin: MarginSettings,
}

pub fn render_chart(
    comparison: &ComparisonResult,
    chart: &ChartSettings,
    styles: &DatasetStyles,
) -> ChartFigure {
    let data = SERIES_ORDER
        .iter()
        .map(|dataset| bar_trace(comparison.series(*dataset), styles))
        .collect();

    ChartFigure {
        data,
        layout: Layout {
            title: Title { text: comparison.metric.title.clone() },
            xaxis: Axis {
                title: Title { text: chart.x_axis_title.clone() },
                // Cohorts are categories; plotly must not interpolate them as numbers.
                axis_type: Some("category"),
            },
            yaxis: Axis {
                title: Title { text: comparison.metric.column.clone() },
                axis_type: None,
            },
            barmode: "group",
            legend: Legend {
                orientation: "h",
                yanchor: "bottom",
                y: 1.02,
                xanchor: "right",
                x: 1.0,
            },
            height: chart.height,
            margin: chart.margin,
        },
    }
}

fn bar_trace(series: &Series, styles: &DatasetStyles) -> BarTrace {
    let style = styles.style(series.dataset);
    let labels: Vec<String> = series.points.iter().map(|p| p.label.clone()).collect();
    BarTrace {
        trace_type: "bar",
        name: style.label.clone(),
        x: series.points.iter().map(|p| p.cohort.to_string()).collect(),
        y: series.points.iter().map(|p| p.value).collect(),
        hovertext: labels.iter().map(|label| format!("{}: {}", style.label, label)).collect(),
        text: labels,
        hoverinfo: "x+text",
        textposition: "auto",
        marker: Marker { color: style.color.clone() },
    }
}
