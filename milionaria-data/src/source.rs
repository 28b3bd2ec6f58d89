use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::NaiveDate;

use crate::error::DataFormatError;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const CSV_EXTENSIONS: &[&str] = &["csv", "txt"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Origine des tirages : un fichier local ou un fichier téléversé en mémoire.
#[derive(Debug, Clone)]
pub enum DataSource {
    Path(PathBuf),
    Upload { name: String, bytes: Vec<u8> },
}

impl DataSource {
    pub fn describe(&self) -> String {
        match self {
            DataSource::Path(p) => p.display().to_string(),
            DataSource::Upload { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date(s),
            _ => None,
        }
    }
}

/// Table brute : en-têtes + lignes de cellules typées, avant toute résolution de schéma.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }

    /// Colonne numérique : au moins une valeur, et toutes les valeurs non vides sont des nombres.
    pub fn is_numeric_column(&self, col: usize) -> bool {
        let mut seen = false;
        for row in 0..self.rows.len() {
            match self.cell(row, col) {
                Cell::Empty => {}
                Cell::Number(_) => seen = true,
                _ => return false,
            }
        }
        seen
    }
}

pub fn read_source(source: &DataSource) -> Result<RawTable, DataFormatError> {
    match source {
        DataSource::Path(path) => read_path(path),
        DataSource::Upload { name, bytes } => read_bytes(name, bytes),
    }
}

fn read_path(path: &Path) -> Result<RawTable, DataFormatError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        let workbook = open_workbook_auto(path)
            .map_err(|e| DataFormatError::Unreadable(format!("{}: {}", path.display(), e)))?;
        read_workbook(workbook)
    } else if CSV_EXTENSIONS.contains(&ext.as_str()) {
        let bytes = std::fs::read(path)
            .map_err(|e| DataFormatError::Unreadable(format!("{}: {}", path.display(), e)))?;
        read_csv(&bytes)
    } else {
        Err(DataFormatError::UnsupportedFormat(path.display().to_string()))
    }
}

fn read_bytes(name: &str, bytes: &[u8]) -> Result<RawTable, DataFormatError> {
    if is_spreadsheet(bytes) {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| DataFormatError::Unreadable(format!("{}: {}", name, e)))?;
        read_workbook(workbook)
    } else {
        read_csv(bytes)
    }
}

/// Signature zip (xlsx, ods) ou OLE (xls).
fn is_spreadsheet(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0])
}

fn read_workbook<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<RawTable, DataFormatError> {
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(DataFormatError::Empty)?
        .map_err(|e| DataFormatError::Unreadable(e.to_string()))?;
    raw_from_range(&range)
}

fn raw_from_range(range: &Range<Data>) -> Result<RawTable, DataFormatError> {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Err(DataFormatError::Empty),
    };
    let rows = rows
        .map(|r| r.iter().map(cell_from_data).collect())
        .collect();
    Ok(RawTable { headers, rows })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) | Data::DateTimeIso(s) => parse_text_cell(s),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Cell::Date(d.date()))
            .unwrap_or(Cell::Empty),
        Data::Empty => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}

fn read_csv(bytes: &[u8]) -> Result<RawTable, DataFormatError> {
    let delimiter = sniff_delimiter(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataFormatError::Unreadable(e.to_string()))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.is_empty() {
        return Err(DataFormatError::Empty);
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(record.iter().map(parse_text_cell).collect()),
            Err(e) => log::warn!("Ligne {} illisible, ignorée : {}", i + 2, e),
        }
    }
    Ok(RawTable { headers, rows })
}

/// Export des tableurs français : point-virgule ; sinon virgule.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or(&[]);
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    let commas = first_line.iter().filter(|&&b| b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

pub fn parse_text_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if s.is_empty() {
        return Cell::Empty;
    }
    if let Some(v) = parse_decimal(s) {
        return Cell::Number(v);
    }
    if let Some(d) = parse_date(s) {
        return Cell::Date(d);
    }
    Cell::Text(s.to_string())
}

pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let normalized = if s.contains(',') && !s.contains('.') {
        s.replace(',', ".")
    } else {
        s.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    // "2022-05-28 00:00:00" ou "2022-05-28T00:00:00"
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("42"), Some(42.0));
        assert_eq!(parse_decimal("3,80"), Some(3.8));
        assert_eq!(parse_decimal("  7.5 "), Some(7.5));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2022, 5, 28);
        assert_eq!(parse_date("2022-05-28"), expected);
        assert_eq!(parse_date("28/05/2022"), expected);
        assert_eq!(parse_date("2022-05-28 00:00:00"), expected);
        assert_eq!(parse_date("2022-05-28T00:00:00"), expected);
        assert_eq!(parse_date("hier"), None);
    }

    #[test]
    fn test_parse_text_cell() {
        assert_eq!(parse_text_cell("  "), Cell::Empty);
        assert_eq!(parse_text_cell("12"), Cell::Number(12.0));
        assert_eq!(
            parse_text_cell("01/06/2022"),
            Cell::Date(NaiveDate::from_ymd_opt(2022, 6, 1).unwrap())
        );
        assert_eq!(parse_text_cell("SAB"), Cell::Text("SAB".to_string()));
    }

    #[test]
    fn test_read_csv_semicolon() {
        let csv = b"Concurso;Data;Num1\n1;28/05/2022;7\n2;04/06/2022;9\n";
        let raw = read_csv(csv).unwrap();
        assert_eq!(raw.headers, vec!["Concurso", "Data", "Num1"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[1][2], Cell::Number(9.0));
        assert!(raw.is_numeric_column(0));
        assert!(!raw.is_numeric_column(1));
    }

    #[test]
    fn test_read_upload_csv() {
        let source = DataSource::Upload {
            name: "tirages.csv".to_string(),
            bytes: b"a,b\n1,2\n".to_vec(),
        };
        let raw = read_source(&source).unwrap();
        assert_eq!(raw.headers, vec!["a", "b"]);
        assert_eq!(raw.rows[0], vec![Cell::Number(1.0), Cell::Number(2.0)]);
    }

    #[test]
    fn test_read_path_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "1,hello").unwrap();
        let raw = read_source(&DataSource::Path(file.path().to_path_buf())).unwrap();
        assert_eq!(raw.rows.len(), 1);
        assert!(raw.is_numeric_column(0));
        assert!(!raw.is_numeric_column(1));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_source(&DataSource::Path(PathBuf::from("tirages.json"))).unwrap_err();
        assert!(matches!(err, DataFormatError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = read_source(&DataSource::Path(PathBuf::from("/nonexistent/x.csv"))).unwrap_err();
        assert!(matches!(err, DataFormatError::Unreadable(_)));
    }

    #[test]
    fn test_spreadsheet_signature() {
        assert!(is_spreadsheet(b"PK\x03\x04rest"));
        assert!(!is_spreadsheet(b"Concurso,Data"));
    }
}
