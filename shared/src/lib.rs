pub mod models;
pub mod utils;

pub use models::{
    CellValue, CohortId, CohortRange, CohortSet, ComparisonResult, Dataset, FilterMode,
    FilterSpec, FormatKind, MetricSpec, Row, Series, SeriesPoint, Table, TableError,
};
pub use utils::brazilian_format::format_value;
