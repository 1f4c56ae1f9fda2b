use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::utils::brazilian_format;

// A single cell. Empty source cells are not stored at all (absent key in the row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    // Numeric view used for metric extraction. Text cells go through the
    // Brazilian parser so "1.234,56" or "87,3%" still count as numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) => None,
            CellValue::Text(s) => brazilian_format::parse_decimal(s).ok(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

pub type Row = BTreeMap<String, CellValue>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

// Row-oriented table as loaded from one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Table {
            name: name.into(),
            columns,
            rows: Vec::new(),
        })
    }

    // Cells keyed by unknown columns are dropped so the schema stays the header.
    pub fn push_row(&mut self, mut row: Row) {
        row.retain(|column, _| self.columns.iter().any(|c| c == column));
        self.rows.push(row);
    }

    // Same name and schema, different rows. Used by filters to return a new view.
    pub fn with_rows(&self, rows: Vec<Row>) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Cohort ("Turma") identifier. Numbers sort numerically, text lexicographically,
// and every number sorts before every text value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CohortId {
    Number(f64),
    Text(String),
}

impl CohortId {
    pub fn from_cell(cell: &CellValue) -> Option<CohortId> {
        match cell {
            CellValue::Number(n) if n.is_finite() => Some(CohortId::Number(*n + 0.0)),
            CellValue::Number(_) => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(CohortId::Text(trimmed.to_string()))
                }
            }
        }
    }

    // Parses user input (CLI selections): numeric-looking input becomes a number.
    pub fn parse(input: &str) -> Option<CohortId> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(CohortId::Number(n + 0.0)),
            _ => Some(CohortId::Text(trimmed.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CohortId::Number(n) => Some(*n),
            CohortId::Text(_) => None,
        }
    }
}

impl Ord for CohortId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CohortId::Number(a), CohortId::Number(b)) => a.total_cmp(b),
            (CohortId::Text(a), CohortId::Text(b)) => a.cmp(b),
            (CohortId::Number(_), CohortId::Text(_)) => Ordering::Less,
            (CohortId::Text(_), CohortId::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for CohortId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CohortId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CohortId {}

impl Hash for CohortId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CohortId::Number(n) => {
                0u8.hash(state);
                n.to_bits().hash(state);
            }
            CohortId::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for CohortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortId::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CohortId::Number(n) => write!(f, "{}", n),
            CohortId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CohortId {
    fn from(value: i64) -> Self {
        CohortId::Number(value as f64)
    }
}

impl From<i32> for CohortId {
    fn from(value: i32) -> Self {
        CohortId::Number(f64::from(value))
    }
}

impl From<&str> for CohortId {
    fn from(value: &str) -> Self {
        CohortId::Text(value.to_string())
    }
}

// Sorted, deduplicated union of cohort identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CohortSet(Vec<CohortId>);

impl CohortSet {
    pub fn as_slice(&self) -> &[CohortId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CohortId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, cohort: &CohortId) -> bool {
        self.0.binary_search(cohort).is_ok()
    }

    // Smallest and largest numeric cohort, ignoring text identifiers.
    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        let mut numbers = self.0.iter().filter_map(CohortId::as_number);
        let first = numbers.next()?;
        Some(numbers.fold((first, first), |(lo, hi), n| (lo.min(n), hi.max(n))))
    }
}

impl FromIterator<CohortId> for CohortSet {
    fn from_iter<I: IntoIterator<Item = CohortId>>(iter: I) -> Self {
        let unique: BTreeSet<CohortId> = iter.into_iter().collect();
        CohortSet(unique.into_iter().collect())
    }
}

impl IntoIterator for CohortSet {
    type Item = CohortId;
    type IntoIter = std::vec::IntoIter<CohortId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// Inclusive numeric range over cohort identifiers. Unset bounds fall back to
// the extrema of the cohort union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl CohortRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        CohortRange { min, max }
    }

    pub fn resolve(&self, union: &CohortSet) -> Option<(f64, f64)> {
        let (lo, hi) = match union.numeric_bounds() {
            Some(bounds) => bounds,
            None => (self.min?, self.max?),
        };
        Some((self.min.unwrap_or(lo), self.max.unwrap_or(hi)))
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Multiselect,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "value")]
pub enum FilterSpec {
    Cohorts(BTreeSet<CohortId>),
    Range(CohortRange),
}

impl FilterSpec {
    pub fn cohorts<I: IntoIterator<Item = CohortId>>(cohorts: I) -> Self {
        FilterSpec::Cohorts(cohorts.into_iter().collect())
    }

    // Multiselect default: every cohort of the union selected.
    pub fn all_of(union: &CohortSet) -> Self {
        FilterSpec::Cohorts(union.iter().cloned().collect())
    }

    pub fn mode(&self) -> FilterMode {
        match self {
            FilterSpec::Cohorts(_) => FilterMode::Multiselect,
            FilterSpec::Range(_) => FilterMode::Range,
        }
    }

    pub fn is_empty_selection(&self) -> bool {
        matches!(self, FilterSpec::Cohorts(set) if set.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    #[serde(alias = "inteiro")]
    Integer,
    #[serde(alias = "dinheiro")]
    Currency,
    #[serde(alias = "percentual")]
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub column: String,
    pub title: String,
    pub format: FormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

impl MetricSpec {
    pub fn new(column: impl Into<String>, title: impl Into<String>, format: FormatKind) -> Self {
        MetricSpec {
            column: column.into(),
            title: title.into(),
            format,
            heading: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    WithoutTreatment,
    WithTreatment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub cohort: CohortId,
    pub value: Option<f64>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub dataset: Dataset,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn cohorts(&self) -> impl Iterator<Item = &CohortId> {
        self.points.iter().map(|p| &p.cohort)
    }

    pub fn missing_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_none()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub metric: MetricSpec,
    pub without: Series,
    pub with: Series,
}

impl ComparisonResult {
    pub fn series(&self, dataset: Dataset) -> &Series {
        match dataset {
            Dataset::WithoutTreatment => &self.without,
            Dataset::WithTreatment => &self.with,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_table_rejects_duplicate_columns() {
        let result = Table::new("a.csv", vec!["Turma".into(), "Entradas".into(), "Turma".into()]);
        assert_eq!(result.unwrap_err(), TableError::DuplicateColumn("Turma".into()));
    }

    #[test]
    fn test_push_row_drops_unknown_columns() {
        let mut table = Table::new("a.csv", vec!["Turma".into()]).unwrap();
        table.push_row(row(&[("Turma", 1.into()), ("Outra", 2.into())]));
        assert_eq!(table.rows()[0].len(), 1);
        assert!(table.rows()[0].contains_key("Turma"));
    }

    #[test]
    fn test_cohort_ordering_numbers_before_text() {
        let mut ids = vec![
            CohortId::from("T2"),
            CohortId::from(10),
            CohortId::from("T10"),
            CohortId::from(2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![CohortId::from(2), CohortId::from(10), CohortId::from("T10"), CohortId::from("T2")]
        );
    }

    #[test]
    fn test_cohort_display_drops_integral_fraction() {
        assert_eq!(CohortId::from(12).to_string(), "12");
        assert_eq!(CohortId::Number(2.5).to_string(), "2.5");
        assert_eq!(CohortId::from("T5").to_string(), "T5");
    }

    #[test]
    fn test_cohort_parse() {
        assert_eq!(CohortId::parse(" 3 "), Some(CohortId::from(3)));
        assert_eq!(CohortId::parse("T5"), Some(CohortId::from("T5")));
        assert_eq!(CohortId::parse("  "), None);
    }

    #[test]
    fn test_cohort_from_cell_normalizes_negative_zero() {
        let id = CohortId::from_cell(&CellValue::Number(-0.0)).unwrap();
        assert_eq!(id, CohortId::Number(0.0));
        assert_eq!(CohortId::from_cell(&CellValue::Text("   ".into())), None);
        assert_eq!(CohortId::from_cell(&CellValue::Number(f64::NAN)), None);
    }

    #[test]
    fn test_cohort_set_dedups_and_sorts() {
        let set: CohortSet = [3, 1, 3, 2].into_iter().map(CohortId::from).collect();
        assert_eq!(set.as_slice(), &[CohortId::from(1), CohortId::from(2), CohortId::from(3)]);
        assert!(set.contains(&CohortId::from(2)));
        assert_eq!(set.numeric_bounds(), Some((1.0, 3.0)));
    }

    #[test]
    fn test_range_resolve_defaults_to_union_extrema() {
        let union: CohortSet = [4, 9, 7].into_iter().map(CohortId::from).collect();
        assert_eq!(CohortRange::default().resolve(&union), Some((4.0, 9.0)));
        assert_eq!(CohortRange::new(Some(5.0), None).resolve(&union), Some((5.0, 9.0)));
        assert_eq!(CohortRange::default().resolve(&CohortSet::default()), None);
    }

    #[test]
    fn test_filter_spec_empty_selection() {
        assert!(FilterSpec::cohorts(Vec::new()).is_empty_selection());
        assert!(!FilterSpec::Range(CohortRange::default()).is_empty_selection());
        assert_eq!(FilterSpec::Range(CohortRange::default()).mode(), FilterMode::Range);
    }

    #[test]
    fn test_format_kind_accepts_portuguese_aliases() {
        let kinds: Vec<FormatKind> = serde_json::from_str(r#"["dinheiro", "inteiro", "percentage"]"#).unwrap();
        assert_eq!(kinds, vec![FormatKind::Currency, FormatKind::Integer, FormatKind::Percentage]);
    }

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(3.0).as_number(), Some(3.0));
        assert_eq!(CellValue::Text("1.234,5".into()).as_number(), Some(1234.5));
        assert_eq!(CellValue::Text("n/a".into()).as_number(), None);
    }
}
