// Cohort union and cohort filters over loaded tables
use shared::models::{CohortId, CohortSet, FilterSpec, Row, Table};

use crate::error::SchemaError;

pub fn cohort_of(row: &Row, cohort_column: &str) -> Option<CohortId> {
    row.get(cohort_column).and_then(CohortId::from_cell)
}

fn require_cohort_column(table: &Table, cohort_column: &str) -> Result<(), SchemaError> {
    if table.has_column(cohort_column) {
        Ok(())
    } else {
        Err(SchemaError::MissingCohortColumn {
            column: cohort_column.to_string(),
            table: table.name().to_string(),
        })
    }
}

// Sorted, deduplicated union of the cohort values of both tables. Rows with an
// empty cohort cell contribute nothing.
pub fn align_cohorts(a: &Table, b: &Table, cohort_column: &str) -> Result<CohortSet, SchemaError> {
    require_cohort_column(a, cohort_column)?;
    require_cohort_column(b, cohort_column)?;

    let union: CohortSet = a
        .rows()
        .iter()
        .chain(b.rows())
        .filter_map(|row| cohort_of(row, cohort_column))
        .collect();

    tracing::debug!(cohorts = union.len(), "Aligned cohort union");
    Ok(union)
}

// Returns a new table holding only the rows selected by `spec`. The source
// table is left untouched.
pub fn filter_table(table: &Table, cohort_column: &str, spec: &FilterSpec) -> Result<Table, SchemaError> {
    require_cohort_column(table, cohort_column)?;

    let rows: Vec<Row> = table
        .rows()
        .iter()
        .filter(|row| {
            let Some(cohort) = cohort_of(row, cohort_column) else {
                return false;
            };
            match spec {
                FilterSpec::Cohorts(selected) => selected.contains(&cohort),
                FilterSpec::Range(range) => cohort.as_number().map_or(false, |n| range.contains(n)),
            }
        })
        .cloned()
        .collect();

    tracing::debug!(
        table = %table.name(),
        kept = rows.len(),
        total = table.len(),
        "Filtered table by cohort"
    );
    Ok(table.with_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{CellValue, CohortRange};

    fn table(name: &str, cohorts: &[CellValue]) -> Table {
        let mut table = Table::new(name, vec!["Turma".into(), "Entradas".into()]).unwrap();
        for (i, cohort) in cohorts.iter().enumerate() {
            let mut row = Row::new();
            row.insert("Turma".into(), cohort.clone());
            row.insert("Entradas".into(), CellValue::Number(i as f64));
            table.push_row(row);
        }
        table
    }

    fn numbers(values: &[i32]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    fn cohorts_in(table: &Table) -> Vec<CohortId> {
        table.rows().iter().filter_map(|r| cohort_of(r, "Turma")).collect()
    }

    #[test]
    fn test_align_sorted_union() {
        let a = table("a.csv", &numbers(&[3, 1, 2]));
        let b = table("b.csv", &numbers(&[5, 1]));
        let union = align_cohorts(&a, &b, "Turma").unwrap();
        let expected: Vec<CohortId> = [1, 2, 3, 5].into_iter().map(CohortId::from).collect();
        assert_eq!(union.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_align_is_commutative() {
        let a = table("a.csv", &[CellValue::from(10), CellValue::from("T2"), CellValue::from(2)]);
        let b = table("b.csv", &[CellValue::from("T1"), CellValue::from(10), CellValue::from(7)]);
        assert_eq!(
            align_cohorts(&a, &b, "Turma").unwrap(),
            align_cohorts(&b, &a, "Turma").unwrap()
        );
    }

    #[test]
    fn test_align_skips_missing_cohort_cells() {
        let mut a = table("a.csv", &numbers(&[1]));
        a.push_row(Row::new());
        let b = table("b.csv", &[]);
        assert_eq!(align_cohorts(&a, &b, "Turma").unwrap().len(), 1);
    }

    #[test]
    fn test_align_missing_cohort_column() {
        let a = table("a.csv", &numbers(&[1]));
        let b = Table::new("b.csv", vec!["Safra".into()]).unwrap();
        let err = align_cohorts(&a, &b, "Turma").unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingCohortColumn { column: "Turma".into(), table: "b.csv".into() }
        );
    }

    #[test]
    fn test_explicit_filter_keeps_members_only() {
        let a = table("a.csv", &numbers(&[1, 2, 3, 2]));
        let spec = FilterSpec::cohorts([CohortId::from(2), CohortId::from(3)]);
        let filtered = filter_table(&a, "Turma", &spec).unwrap();
        assert_eq!(
            cohorts_in(&filtered),
            vec![CohortId::from(2), CohortId::from(3), CohortId::from(2)]
        );
        // source untouched
        assert_eq!(a.len(), 4);
        assert_eq!(filtered.name(), "a.csv");
        assert_eq!(filtered.columns(), a.columns());
    }

    #[test]
    fn test_empty_selection_yields_empty_table() {
        let a = table("a.csv", &numbers(&[1, 2, 3]));
        let filtered = filter_table(&a, "Turma", &FilterSpec::cohorts(Vec::new())).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let a = table("a.csv", &numbers(&[1, 2, 3, 4, 5]));
        for spec in [
            FilterSpec::cohorts([CohortId::from(1), CohortId::from(4)]),
            FilterSpec::Range(CohortRange::new(Some(2.0), Some(4.0))),
        ] {
            let once = filter_table(&a, "Turma", &spec).unwrap();
            let twice = filter_table(&once, "Turma", &spec).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let a = table("a.csv", &numbers(&[1, 2, 3, 4, 5]));
        let spec = FilterSpec::Range(CohortRange::new(Some(2.0), Some(4.0)));
        let filtered = filter_table(&a, "Turma", &spec).unwrap();
        let expected: Vec<CohortId> = [2, 3, 4].into_iter().map(CohortId::from).collect();
        assert_eq!(cohorts_in(&filtered), expected);
    }

    #[test]
    fn test_unset_range_keeps_every_numeric_cohort() {
        let a = table("a.csv", &[CellValue::from(1), CellValue::from("T9"), CellValue::from(3)]);
        let filtered = filter_table(&a, "Turma", &FilterSpec::Range(CohortRange::default())).unwrap();
        assert_eq!(cohorts_in(&filtered), vec![CohortId::from(1), CohortId::from(3)]);
    }

    #[test]
    fn test_text_cohorts_match_explicit_selection() {
        let a = table("a.csv", &[CellValue::from("T5"), CellValue::from("T6")]);
        let filtered = filter_table(&a, "Turma", &FilterSpec::cohorts([CohortId::from("T5")])).unwrap();
        assert_eq!(cohorts_in(&filtered), vec![CohortId::from("T5")]);
    }
}
