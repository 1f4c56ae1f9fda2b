// Minimal .xlsx reader: first worksheet only, cell values only (no styles,
// formulas are read through their cached values).
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use shared::models::CellValue;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("not a valid .xlsx workbook: {0}")]
    NotZip(String),
    #[error("workbook part '{0}' is missing")]
    MissingPart(String),
    #[error("failed to read workbook part '{path}': {reason}")]
    PartRead { path: String, reason: String },
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("invalid cell address: {0}")]
    InvalidAddress(String),
    #[error("shared string index {0} out of bounds")]
    SharedStringOutOfBounds(usize),
}

// Zero-based row -> zero-based column -> value. Empty cells are absent.
pub type SheetRows = BTreeMap<u32, BTreeMap<u32, CellValue>>;

struct SheetDescriptor {
    rel_id: Option<String>,
    sheet_id: Option<u32>,
}

pub fn read_first_sheet(bytes: &[u8]) -> Result<SheetRows, WorkbookError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| WorkbookError::NotZip(e.to_string()))?;

    let shared_strings = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| WorkbookError::MissingPart("xl/workbook.xml".into()))?;
    let sheets = parse_workbook_sheets(&workbook_xml)?;
    let first = sheets.first().ok_or(WorkbookError::NoSheets)?;

    let relationships = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let target = resolve_sheet_target(first, &relationships);
    tracing::debug!(sheet = %target, shared_strings = shared_strings.len(), "Reading first worksheet");

    let sheet_xml = read_part(&mut archive, &target)?
        .ok_or_else(|| WorkbookError::MissingPart(target.clone()))?;
    parse_sheet(&sheet_xml, &shared_strings)
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    path: &str,
) -> Result<Option<Vec<u8>>, WorkbookError> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(WorkbookError::PartRead {
                path: path.to_string(),
                reason: e.to_string(),
            })
        }
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| WorkbookError::PartRead {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(buf))
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    // Phonetic runs (<rPh>) carry <t> elements that are not part of the value.
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"si" => {
                current.clear();
                in_si = true;
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"rPh" => in_phonetic = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"rPh" => in_phonetic = false,
            Ok(Event::Start(e)) if e.name().as_ref() == b"t" && in_si && !in_phonetic => {
                current.push_str(&read_element_text(&mut reader, e.name())?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"si" => {
                strings.push(std::mem::take(&mut current));
                in_si = false;
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<SheetDescriptor>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                sheets.push(SheetDescriptor {
                    rel_id: get_attr(&e, b"r:id")?,
                    sheet_id: get_attr(&e, b"sheetId")?.and_then(|id| id.parse::<u32>().ok()),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut map = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                let id = get_attr(&e, b"Id")?;
                let target = get_attr(&e, b"Target")?;
                let rel_type = get_attr(&e, b"Type")?.unwrap_or_default();
                if let (Some(id), Some(target)) = (id, target) {
                    if rel_type.contains("worksheet") {
                        map.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(map)
}

fn resolve_sheet_target(sheet: &SheetDescriptor, relationships: &HashMap<String, String>) -> String {
    if let Some(target) = sheet.rel_id.as_ref().and_then(|id| relationships.get(id)) {
        return normalize_target(target);
    }
    let id = sheet.sheet_id.unwrap_or(1);
    format!("xl/worksheets/sheet{}.xml", id)
}

fn normalize_target(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    if trimmed.starts_with("xl/") {
        trimmed.to_string()
    } else {
        format!("xl/{}", trimmed)
    }
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<SheetRows, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut rows: SheetRows = BTreeMap::new();

    // Writers may omit the "r" attributes; fall back to document order.
    let mut current_row: Option<u32> = None;
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"row" => {
                let row = match get_attr(&e, b"r")? {
                    Some(raw) => raw
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .ok_or_else(|| WorkbookError::InvalidAddress(raw.clone()))?,
                    None => current_row.map_or(0, |r| r + 1),
                };
                current_row = Some(row);
                next_col = 0;
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"c" => {
                let (row, col) = cell_position(&e, current_row.unwrap_or(0), next_col)?;
                let cell_type = get_attr(&e, b"t")?;
                next_col = col + 1;
                if let Some(value) = read_cell_value(&mut reader, cell_type.as_deref(), shared_strings)? {
                    rows.entry(row).or_default().insert(col, value);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"c" => {
                let (_, col) = cell_position(&e, current_row.unwrap_or(0), next_col)?;
                next_col = col + 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn cell_position(
    element: &BytesStart<'_>,
    current_row: u32,
    next_col: u32,
) -> Result<(u32, u32), WorkbookError> {
    match get_attr(element, b"r")? {
        Some(address) => {
            address_to_index(&address).ok_or(WorkbookError::InvalidAddress(address))
        }
        None => Ok((current_row, next_col)),
    }
}

fn read_cell_value(
    reader: &mut Reader<&[u8]>,
    cell_type: Option<&str>,
    shared_strings: &[String],
) -> Result<Option<CellValue>, WorkbookError> {
    let mut buf = Vec::new();
    let mut raw: Option<String> = None;
    let mut inline: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"v" => {
                raw = Some(read_element_text(reader, e.name())?);
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"is" => {
                inline = Some(read_inline_string(reader)?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"c" => break,
            Ok(Event::Eof) => return Err(WorkbookError::Xml("unexpected EOF inside cell".into())),
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    if let Some(text) = inline {
        return Ok(text_cell(text));
    }
    convert_value(raw, cell_type, shared_strings)
}

fn read_inline_string(reader: &mut Reader<&[u8]>) -> Result<String, WorkbookError> {
    let mut buf = Vec::new();
    let mut value = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"t" => {
                value.push_str(&read_element_text(reader, e.name())?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"is" => break,
            Ok(Event::Eof) => {
                return Err(WorkbookError::Xml("unexpected EOF inside inline string".into()))
            }
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(value)
}

fn convert_value(
    raw: Option<String>,
    cell_type: Option<&str>,
    shared_strings: &[String],
) -> Result<Option<CellValue>, WorkbookError> {
    let raw = match raw {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match cell_type {
        Some("s") => {
            let idx = trimmed
                .parse::<usize>()
                .map_err(|e| WorkbookError::Xml(e.to_string()))?;
            let text = shared_strings
                .get(idx)
                .ok_or(WorkbookError::SharedStringOutOfBounds(idx))?;
            Ok(text_cell(text.clone()))
        }
        Some("b") => Ok(match trimmed {
            "1" => Some(CellValue::Number(1.0)),
            "0" => Some(CellValue::Number(0.0)),
            _ => None,
        }),
        // Error cells (#DIV/0!, #N/A) behave like empty cells.
        Some("e") => Ok(None),
        Some("str") | Some("inlineStr") => Ok(text_cell(raw)),
        _ => Ok(Some(match trimmed.parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(trimmed.to_string()),
        })),
    }
}

fn text_cell(text: String) -> Option<CellValue> {
    if text.trim().is_empty() {
        None
    } else {
        Some(CellValue::Text(text))
    }
}

fn read_element_text(reader: &mut Reader<&[u8]>, name: QName<'_>) -> Result<String, WorkbookError> {
    let raw = reader.read_text(name).map_err(xml_err)?;
    let text = quick_xml::escape::unescape(&raw).map_err(xml_err)?;
    Ok(text.into_owned())
}

fn get_attr(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, WorkbookError> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_err)?;
        if attr.key.as_ref() == key {
            let raw = std::str::from_utf8(&attr.value).map_err(xml_err)?;
            let value = quick_xml::escape::unescape(raw).map_err(xml_err)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn xml_err<E: std::fmt::Display>(err: E) -> WorkbookError {
    WorkbookError::Xml(err.to_string())
}

// "B3" -> (2, 1). Returns None for malformed addresses.
pub fn address_to_index(a1: &str) -> Option<(u32, u32)> {
    let split = a1.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = a1.split_at(split);
    if letters.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let value = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        col = col.checked_mul(26)?.checked_add(value)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_to_index() {
        assert_eq!(address_to_index("A1"), Some((0, 0)));
        assert_eq!(address_to_index("B3"), Some((2, 1)));
        assert_eq!(address_to_index("AA10"), Some((9, 26)));
        assert_eq!(address_to_index("A0"), None);
        assert_eq!(address_to_index("12"), None);
        assert_eq!(address_to_index("A1B"), None);
    }

    #[test]
    fn test_parse_shared_strings_flattens_rich_text() {
        let xml = br#"<?xml version="1.0"?>
<sst>
  <si><t>Turma</t></si>
  <si><r><t>AuC </t></r><r><t xml:space="preserve">M&#233;dio</t></r></si>
  <si><t>Ativos(as)</t><rPh><t>ignored</t></rPh></si>
</sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["Turma", "AuC Médio", "Ativos(as)"]);
    }

    #[test]
    fn test_parse_sheet_with_shared_and_inline_strings() {
        let shared = vec!["Turma".to_string(), "Entradas Totais".to_string()];
        let xml = br#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2"><v>10</v></c></row>
<row r="3"><c r="A3" t="inlineStr"><is><t>T5</t></is></c><c r="B3" t="e"><v>#N/A</v></c></row>
</sheetData></worksheet>"#;
        let rows = parse_sheet(xml, &shared).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[&0][&0], CellValue::Text("Turma".into()));
        assert_eq!(rows[&1][&1], CellValue::Number(10.0));
        assert_eq!(rows[&2][&0], CellValue::Text("T5".into()));
        assert!(!rows[&2].contains_key(&1));
    }

    #[test]
    fn test_parse_sheet_without_addresses_uses_document_order() {
        let xml = br#"<worksheet><sheetData>
<row><c t="str"><v>Turma</v></c><c/><c t="str"><v>Ativos(as)</v></c></row>
<row><c><v>3</v></c><c><v>4</v></c><c><v>5</v></c></row>
</sheetData></worksheet>"#;
        let rows = parse_sheet(xml, &[]).unwrap();
        assert_eq!(rows[&0][&2], CellValue::Text("Ativos(as)".into()));
        assert_eq!(rows[&1][&1], CellValue::Number(4.0));
    }

    #[test]
    fn test_convert_value_shared_string_out_of_bounds() {
        let err = convert_value(Some("5".into()), Some("s"), &["only".into()]).unwrap_err();
        assert!(matches!(err, WorkbookError::SharedStringOutOfBounds(5)));
    }

    #[test]
    fn test_convert_value_bool() {
        assert_eq!(convert_value(Some("1".into()), Some("b"), &[]).unwrap(), Some(CellValue::Number(1.0)));
        assert_eq!(convert_value(Some("x".into()), Some("b"), &[]).unwrap(), None);
    }

    #[test]
    fn test_read_first_sheet_rejects_non_zip() {
        let err = read_first_sheet(b"Turma,Entradas\n1,2\n").unwrap_err();
        assert!(matches!(err, WorkbookError::NotZip(_)));
    }

    #[test]
    fn test_resolve_sheet_target() {
        let mut rels = HashMap::new();
        rels.insert("rId1".to_string(), "worksheets/sheet1.xml".to_string());
        let sheet = SheetDescriptor { rel_id: Some("rId1".into()), sheet_id: Some(1) };
        assert_eq!(resolve_sheet_target(&sheet, &rels), "xl/worksheets/sheet1.xml");

        let sheet = SheetDescriptor { rel_id: None, sheet_id: Some(3) };
        assert_eq!(resolve_sheet_target(&sheet, &rels), "xl/worksheets/sheet3.xml");
    }
}
