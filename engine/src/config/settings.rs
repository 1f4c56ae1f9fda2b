// Dashboard settings, loaded from the embedded default.json or a user config file
use serde::{Deserialize, Serialize};
use shared::models::{Dataset, FilterMode, MetricSpec};
use std::collections::HashSet;
use std::path::Path;

use crate::error::EngineError;

const DEFAULT_CONFIG: &str = include_str!("../../assets/config/default.json");

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    pub version: String,
    pub cohort_column: String,
    pub filter_mode: FilterMode,
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: String, // Should be char, but JSON string is easier
    pub page: PageSettings,
    pub datasets: DatasetStyles,
    pub chart: ChartSettings,
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PageSettings {
    pub title: String,
    #[serde(default)]
    pub intro: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetStyles {
    pub without_treatment: SeriesStyle,
    pub with_treatment: SeriesStyle,
}

impl DatasetStyles {
    pub fn style(&self, dataset: Dataset) -> &SeriesStyle {
        match dataset {
            Dataset::WithoutTreatment => &self.without_treatment,
            Dataset::WithTreatment => &self.with_treatment,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesStyle {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartSettings {
    pub height: u32,
    pub x_axis_title: String,
    #[serde(default)]
    pub margin: MarginSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MarginSettings {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}

impl Default for MarginSettings {
    fn default() -> Self {
        MarginSettings { l: 20, r: 20, t: 60, b: 20 }
    }
}

fn default_csv_delimiter() -> String {
    ",".to_string()
}

impl DashboardSettings {
    pub fn load_default() -> Result<Self, EngineError> {
        Self::from_json(DEFAULT_CONFIG)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigError(format!("failed to read config '{}': {}", path.display(), e))
        })?;
        Self::from_json(&config_str)
    }

    pub fn from_json(config_str: &str) -> Result<Self, EngineError> {
        let settings: DashboardSettings = serde_json::from_str(config_str)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.cohort_column.trim().is_empty() {
            return Err(EngineError::ConfigError("cohort_column must not be empty".into()));
        }
        if self.metrics.is_empty() {
            return Err(EngineError::ConfigError("at least one metric must be configured".into()));
        }
        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if metric.column.trim().is_empty() {
                return Err(EngineError::ConfigError(format!(
                    "metric '{}' has an empty column name",
                    metric.title
                )));
            }
            if !seen.insert(metric.column.as_str()) {
                return Err(EngineError::ConfigError(format!(
                    "metric column '{}' is configured more than once",
                    metric.column
                )));
            }
        }
        self.delimiter_byte()?;
        Ok(())
    }

    pub fn delimiter_byte(&self) -> Result<u8, EngineError> {
        match self.csv_delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(EngineError::ConfigError(format!(
                "csv_delimiter must be a single ASCII character, got '{}'",
                self.csv_delimiter
            ))),
        }
    }
}
