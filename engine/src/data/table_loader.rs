// Turns an uploaded .csv or .xlsx file into a row-oriented Table.
use csv::ReaderBuilder;
use shared::models::{CellValue, Row, Table};
use std::collections::BTreeMap;
use std::path::Path;

use super::xlsx;
use crate::error::LoadError;

// Tokens treated as empty cells, as spreadsheet exports commonly write them.
const MISSING_TOKENS: [&str; 8] = ["nan", "NaN", "NA", "N/A", "#N/A", "null", "NULL", "-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" => Some(SourceFormat::Xlsx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableLoader {
    delimiter: u8,
}

impl Default for TableLoader {
    fn default() -> Self {
        TableLoader { delimiter: b',' }
    }
}

impl TableLoader {
    pub fn new(delimiter: u8) -> Self {
        TableLoader { delimiter }
    }

    pub fn load_path(&self, path: &Path) -> Result<Table, LoadError> {
        let file_name = display_name(path);
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            file: file_name.clone(),
            source,
        })?;
        self.load_bytes(&file_name, &bytes)
    }

    pub fn load_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<Table, LoadError> {
        let format = SourceFormat::from_file_name(file_name).ok_or_else(|| LoadError::UnsupportedFormat {
            file: file_name.to_string(),
        })?;

        let table = match format {
            SourceFormat::Csv => self.load_csv(file_name, bytes)?,
            SourceFormat::Xlsx => load_xlsx(file_name, bytes)?,
        };

        tracing::info!(
            file = %file_name,
            ?format,
            rows = table.len(),
            columns = table.columns().len(),
            "Loaded table"
        );
        Ok(table)
    }

    fn load_csv(&self, file_name: &str, bytes: &[u8]) -> Result<Table, LoadError> {
        let csv_err = |source: csv::Error| LoadError::Csv {
            file: file_name.to_string(),
            source,
        };

        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true) // Short rows leave trailing cells empty
            .from_reader(bytes);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .enumerate()
            .map(|(idx, header)| clean_header(header, idx))
            .collect();

        let mut table = Table::new(file_name, headers.clone()).map_err(|source| LoadError::InvalidTable {
            file: file_name.to_string(),
            source,
        })?;

        for result in rdr.records() {
            let record = result.map_err(csv_err)?;
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .filter_map(|(header, field)| parse_field(field).map(|value| (header.clone(), value)))
                .collect();
            table.push_row(row);
        }
        Ok(table)
    }
}

fn load_xlsx(file_name: &str, bytes: &[u8]) -> Result<Table, LoadError> {
    let sheet = xlsx::read_first_sheet(bytes).map_err(|e| LoadError::Workbook {
        file: file_name.to_string(),
        reason: e.to_string(),
    })?;

    let mut rows = sheet.into_iter();
    let header_cells = match rows.next() {
        Some((_, cells)) => cells,
        None => {
            return Table::new(file_name, Vec::new()).map_err(|source| LoadError::InvalidTable {
                file: file_name.to_string(),
                source,
            })
        }
    };
    let data: Vec<BTreeMap<u32, CellValue>> = rows.map(|(_, cells)| cells).collect();

    let width = data
        .iter()
        .chain(std::iter::once(&header_cells))
        .filter_map(|cells| cells.keys().next_back())
        .max()
        .map_or(0, |max_col| max_col + 1);

    let headers: Vec<String> = (0..width)
        .map(|col| {
            let raw = header_cells.get(&col).map(header_text).unwrap_or_default();
            clean_header(&raw, col as usize)
        })
        .collect();

    let mut table = Table::new(file_name, headers.clone()).map_err(|source| LoadError::InvalidTable {
        file: file_name.to_string(),
        source,
    })?;

    for cells in data {
        let row: Row = cells
            .into_iter()
            .filter_map(|(col, value)| {
                let header = headers.get(col as usize)?;
                let value = match value {
                    CellValue::Text(text) => parse_field(&text)?,
                    number => number,
                };
                Some((header.clone(), value))
            })
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn header_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => s.clone(),
    }
}

// Blank headers get a positional name so the schema stays unique.
fn clean_header(raw: &str, idx: usize) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}');
    if trimmed.trim().is_empty() {
        format!("Unnamed: {}", idx)
    } else {
        trimmed.to_string()
    }
}

// Empty and "missing" tokens are absent; numeric-looking fields become numbers.
fn parse_field(raw: &str) -> Option<CellValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed) {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(CellValue::Number(n)),
        _ => Some(CellValue::Text(trimmed.to_string())),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn load_csv(content: &str) -> Result<Table, LoadError> {
        TableLoader::default().load_bytes("sem_mf.csv", content.as_bytes())
    }

    #[test]
    fn test_source_format_from_file_name() {
        assert_eq!(SourceFormat::from_file_name("a.CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_file_name("dados/safras.xlsx"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_file_name("safras.ods"), None);
        assert_eq!(SourceFormat::from_file_name("safras"), None);
    }

    #[test]
    fn test_load_csv_valid_data() {
        let csv_content = "\
Turma,Entradas Totais,AuC Médio (Exc. desl.)
1,10,1234.5
2,20,\"1.234,56\"";
        let table = load_csv(csv_content).unwrap();

        assert_eq!(table.name(), "sem_mf.csv");
        assert_eq!(table.columns(), &["Turma", "Entradas Totais", "AuC Médio (Exc. desl.)"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0]["Turma"], CellValue::Number(1.0));
        assert_eq!(table.rows()[0]["AuC Médio (Exc. desl.)"], CellValue::Number(1234.5));
        assert_eq!(table.rows()[1]["AuC Médio (Exc. desl.)"], CellValue::Text("1.234,56".into()));
    }

    #[test]
    fn test_load_csv_empty_and_missing_cells_are_absent() {
        let table = load_csv("Turma,Entradas Totais,Ativos(as)\n1,,NaN\n2,5").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].len(), 1);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn test_load_csv_header_only() {
        let table = load_csv("Turma,Entradas Totais").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_load_csv_duplicate_header_is_load_error() {
        let err = load_csv("Turma,Turma\n1,2").unwrap_err();
        assert!(matches!(err, LoadError::InvalidTable { .. }));
        assert_eq!(err.file(), "sem_mf.csv");
    }

    #[test]
    fn test_load_csv_blank_header_gets_positional_name() {
        let table = load_csv("Turma,,Entradas Totais\n1,x,3").unwrap();
        assert_eq!(table.columns()[1], "Unnamed: 1");
    }

    #[test]
    fn test_load_csv_custom_delimiter() {
        let table = TableLoader::new(b';')
            .load_bytes("com_mf.csv", "Turma;Ativos(as)\n1;7".as_bytes())
            .unwrap();
        assert_eq!(table.rows()[0]["Ativos(as)"], CellValue::Number(7.0));
    }

    #[test]
    fn test_unsupported_format_names_file() {
        let err = TableLoader::default().load_bytes("notas.txt", b"x").unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("notas.txt"));
    }

    #[test]
    fn test_corrupt_workbook_is_load_error() {
        let err = TableLoader::default().load_bytes("com_mf.xlsx", b"not a zip").unwrap_err();
        assert!(matches!(err, LoadError::Workbook { .. }));
        assert!(err.to_string().contains("com_mf.xlsx"));
    }

    #[test]
    fn test_load_path_reads_file_and_uses_file_name() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Turma,Entradas Totais\n3,30").unwrap();
        let table = TableLoader::default().load_path(file.path()).unwrap();
        let expected_name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(table.name(), expected_name);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_load_path_missing_file_is_io_error() {
        let err = TableLoader::default().load_path(Path::new("/nonexistent/sem_mf.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert_eq!(err.file(), "sem_mf.csv");
    }
}
