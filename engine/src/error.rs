use shared::models::TableError;
use thiserror::Error;

// Failure to turn an uploaded file into a Table. Every variant names the file;
// a load error stops the whole dashboard.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Erro ao ler o arquivo {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao ler o arquivo {file}: unsupported format (expected .csv or .xlsx)")]
    UnsupportedFormat { file: String },

    #[error("Erro ao ler o arquivo {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("Erro ao ler o arquivo {file}: {reason}")]
    Workbook { file: String, reason: String },

    #[error("Erro ao ler o arquivo {file}: {source}")]
    InvalidTable {
        file: String,
        #[source]
        source: TableError,
    },
}

impl LoadError {
    pub fn file(&self) -> &str {
        match self {
            LoadError::Io { file, .. }
            | LoadError::UnsupportedFormat { file }
            | LoadError::Csv { file, .. }
            | LoadError::Workbook { file, .. }
            | LoadError::InvalidTable { file, .. } => file,
        }
    }
}

// An expected column is absent from a loaded table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Cohort column '{column}' not found in '{table}'")]
    MissingCohortColumn { column: String, table: String },

    #[error("Metric '{metric}' is misconfigured: column '{column}' not found in '{table}'")]
    MissingMetricColumn {
        metric: String,
        column: String,
        table: String,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
}
