// Self-contained dashboard page: one plotly chart per configured metric
use chrono::{DateTime, Local};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use shared::models::{CohortRange, FilterSpec};

use super::chart::{render_chart, ChartFigure};
use crate::config::DashboardSettings;
use crate::error::EngineError;
use crate::services::dashboard::{ChartOutcome, Dashboard};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const EMPTY_SELECTION_WARNING: &str = "Selecione pelo menos uma turma no filtro.";

const PAGE_CSS: &str = "
    body { font-family: Arial, sans-serif; margin: 0 auto; max-width: 1100px; padding: 20px; color: #222; }
    header { border-bottom: 2px solid #ddd; margin-bottom: 20px; }
    header p.meta { color: #666; font-size: 13px; }
    section.metric { margin-bottom: 32px; }
    .warning { background: #fff4e5; border-left: 4px solid #f0a020; padding: 12px 16px; }
    .error { background: #fdecea; border-left: 4px solid #d93025; padding: 12px 16px; }
";

pub fn render_page(settings: &DashboardSettings, dashboard: &Dashboard) -> Result<String, EngineError> {
    render_page_at(settings, dashboard, Local::now())
}

pub fn render_page_at(
    settings: &DashboardSettings,
    dashboard: &Dashboard,
    generated_at: DateTime<Local>,
) -> Result<String, EngineError> {
    let mut sections = Vec::with_capacity(dashboard.charts.len());
    for (idx, chart) in dashboard.charts.iter().enumerate() {
        sections.push(render_section(settings, idx, chart)?);
    }

    let page = html! {
        (DOCTYPE)
        html lang="pt-BR" {
            head {
                meta charset="utf-8";
                title { (settings.page.title) }
                script src=(PLOTLY_CDN) {}
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                header {
                    h1 { (settings.page.title) }
                    @if !settings.page.intro.is_empty() {
                        p { (settings.page.intro) }
                    }
                    p class="meta" {
                        (dashboard.without_file) " × " (dashboard.with_file)
                        " | " (filter_summary(&dashboard.filter))
                        " | Gerado em " (generated_at.format("%d/%m/%Y %H:%M:%S"))
                    }
                }
                @if dashboard.empty_selection {
                    div class="warning" { (EMPTY_SELECTION_WARNING) }
                }
                @for section in sections {
                    (section)
                }
            }
        }
    };
    Ok(page.into_string())
}

fn render_section(settings: &DashboardSettings, idx: usize, chart: &ChartOutcome) -> Result<Markup, EngineError> {
    let heading = chart.metric.heading.as_deref().unwrap_or(&chart.metric.title);
    let div_id = format!("chart-{idx}");

    let body = match &chart.result {
        Ok(comparison) => {
            let figure = render_chart(comparison, &settings.chart, &settings.datasets);
            let script = plot_script(&div_id, &figure)?;
            html! {
                div id=(div_id) {}
                script { (PreEscaped(script)) }
            }
        }
        Err(err) => html! {
            div class="error" { (err.to_string()) }
        },
    };

    Ok(html! {
        section class="metric" {
            h2 { (heading) }
            (body)
        }
    })
}

fn plot_script(div_id: &str, figure: &ChartFigure) -> Result<String, EngineError> {
    // Labels come from uploaded files; "</" would close the script element early.
    let json = serde_json::to_string(figure)?.replace("</", "<\\/");
    Ok(format!(
        "(function() {{ var fig = {json}; Plotly.newPlot(\"{div_id}\", fig.data, fig.layout, {{responsive: true}}); }})();"
    ))
}

fn filter_summary(filter: &FilterSpec) -> String {
    match filter {
        FilterSpec::Cohorts(selected) if selected.is_empty() => "Nenhuma turma selecionada".to_string(),
        FilterSpec::Cohorts(selected) => {
            let labels: Vec<String> = selected.iter().map(|c| c.to_string()).collect();
            format!("Turmas: {}", labels.join(", "))
        }
        FilterSpec::Range(CohortRange { min, max }) => {
            let bound = |value: &Option<f64>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
            format!("Turmas de {} a {}", bound(min), bound(max))
        }
    }
}
