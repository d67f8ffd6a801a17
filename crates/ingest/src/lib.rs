//! Spreadsheet ingestion for bulk order uploads.
//!
//! Turns an uploaded binary buffer into a sequence of header-keyed rows.
//! Only the MIME types of legacy (.xls) and modern (.xlsx) Excel files are
//! accepted, a fixed size ceiling applies, and only the first sheet is read.
//! Field semantics are not checked here — that is the validation layer's
//! job.

use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// MIME type of legacy Excel files (.xls).
pub const XLS_MIME: &str = "application/vnd.ms-excel";
/// MIME type of Excel Open XML files (.xlsx).
pub const XLSX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// OLE Compound Document magic bytes (used by .xls)
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
/// ZIP archive magic bytes (used by .xlsx)
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// A file received from a multipart upload, as handed over by the HTTP
/// layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Declared content type is not in the spreadsheet allow-list.
    #[error("Only Excel files are allowed!")]
    UnsupportedType,
    /// File exceeds the configured size ceiling.
    #[error("The uploaded file is too large (limit {limit_bytes} bytes)")]
    TooLarge { limit_bytes: usize },
    /// The sheet produced zero data rows.
    #[error("The uploaded file is empty.")]
    Empty,
    /// The buffer could not be parsed as a spreadsheet.
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(String),
}

/// One data row of the first sheet, keyed by header column name.
///
/// `index` is the 1-based position among data rows (the header row is not
/// counted), used in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub index: usize,
    pub cells: HashMap<String, String>,
}

impl SheetRow {
    /// Returns the trimmed cell under `column`, or `None` when the column is
    /// absent or blank.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetFormat {
    Xls,
    Xlsx,
}

impl SheetFormat {
    fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic == OLE_MAGIC {
            Some(SheetFormat::Xls)
        } else if magic == ZIP_MAGIC {
            Some(SheetFormat::Xlsx)
        } else {
            None
        }
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "xls" => Some(SheetFormat::Xls),
            "xlsx" => Some(SheetFormat::Xlsx),
            _ => None,
        }
    }
}

/// Spreadsheet ingestor with an explicit, per-instance upload policy.
///
/// Constructed once from configuration and passed into the import
/// orchestrator, so limits stay per-request-testable instead of living in
/// process-wide state.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetIngestor {
    max_bytes: usize,
}

impl SpreadsheetIngestor {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// MIME allow-list check applied before any parsing.
    pub fn is_allowed_type(content_type: &str) -> bool {
        content_type == XLS_MIME || content_type == XLSX_MIME
    }

    /// Parses the first sheet of the uploaded file into header-keyed rows.
    ///
    /// # Errors
    /// * [`IngestError::UnsupportedType`] for a missing or disallowed MIME type.
    /// * [`IngestError::TooLarge`] above the size ceiling.
    /// * [`IngestError::Parse`] when the bytes are not a readable workbook.
    /// * [`IngestError::Empty`] when zero data rows are produced.
    pub fn read_rows(&self, file: &UploadedFile) -> Result<Vec<SheetRow>, IngestError> {
        match file.content_type.as_deref() {
            Some(ct) if Self::is_allowed_type(ct) => {}
            _ => return Err(IngestError::UnsupportedType),
        }
        if file.bytes.len() > self.max_bytes {
            return Err(IngestError::TooLarge {
                limit_bytes: self.max_bytes,
            });
        }

        let format = SheetFormat::from_magic_bytes(&file.bytes)
            .or_else(|| file.file_name.as_deref().and_then(SheetFormat::from_filename))
            .ok_or_else(|| IngestError::Parse("Unrecognized spreadsheet format".to_string()))?;
        debug!(?format, size = file.bytes.len(), "parsing uploaded spreadsheet");

        let rows = match format {
            SheetFormat::Xls => {
                let cursor = Cursor::new(file.bytes.as_slice());
                let mut workbook: Xls<_> = Xls::new(cursor)
                    .map_err(|e| IngestError::Parse(format!("Failed to open XLS: {e}")))?;
                first_sheet_rows(&mut workbook)?
            }
            SheetFormat::Xlsx => {
                let cursor = Cursor::new(file.bytes.as_slice());
                let mut workbook: Xlsx<_> = Xlsx::new(cursor)
                    .map_err(|e| IngestError::Parse(format!("Failed to open XLSX: {e}")))?;
                first_sheet_rows(&mut workbook)?
            }
        };

        if rows.is_empty() {
            return Err(IngestError::Empty);
        }
        Ok(rows)
    }
}

fn first_sheet_rows<RS, R>(workbook: &mut R) -> Result<Vec<SheetRow>, IngestError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let sheet_name = workbook
        .sheet_names()
        .into_iter()
        .next()
        .ok_or(IngestError::Empty)?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IngestError::Parse(format!("Failed to read sheet '{sheet_name}': {e}")))?;
    Ok(rows_from_range(&range))
}

/// Maps a sheet range into rows keyed by the header (first) row. Fully
/// empty data rows are skipped; data rows are indexed from 1.
fn rows_from_range(range: &Range<Data>) -> Vec<SheetRow> {
    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect(),
        None => return Vec::new(),
    };

    let mut rows = Vec::new();
    let mut index = 0;
    for row in rows_iter {
        let mut cells = HashMap::new();
        let mut has_value = false;
        for (header, cell) in headers.iter().zip(row.iter()) {
            if header.is_empty() {
                continue;
            }
            let text = cell_to_string(cell);
            if !text.trim().is_empty() {
                has_value = true;
            }
            cells.insert(header.clone(), text);
        }
        if !has_value {
            continue;
        }
        index += 1;
        rows.push(SheetRow { index, cells });
    }
    rows
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Whole floats print without the trailing ".0" so numeric cells
            // survive the string round-trip as integers.
            if f.fract() == 0.0 {
                format!("{f:.0}")
            } else {
                format!("{f}")
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_owned(),
        Data::DateTime(dt) => format!("{dt}"),
        Data::Error(e) => format!("#ERROR: {e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, bytes: Vec<u8>) -> UploadedFile {
        UploadedFile {
            file_name: Some("orders.xlsx".to_string()),
            content_type: Some(content_type.to_string()),
            bytes,
        }
    }

    #[test]
    fn test_mime_allow_list() {
        assert!(SpreadsheetIngestor::is_allowed_type(XLS_MIME));
        assert!(SpreadsheetIngestor::is_allowed_type(XLSX_MIME));
        assert!(!SpreadsheetIngestor::is_allowed_type("text/csv"));
        assert!(!SpreadsheetIngestor::is_allowed_type("application/pdf"));
    }

    #[test]
    fn test_rejects_disallowed_content_type() {
        let ingestor = SpreadsheetIngestor::new(1024);
        let err = ingestor
            .read_rows(&upload("text/csv", vec![0x50, 0x4B, 0x03, 0x04]))
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedType));
        assert_eq!(err.to_string(), "Only Excel files are allowed!");
    }

    #[test]
    fn test_rejects_missing_content_type() {
        let ingestor = SpreadsheetIngestor::new(1024);
        let file = UploadedFile {
            file_name: None,
            content_type: None,
            bytes: vec![0x50, 0x4B, 0x03, 0x04],
        };
        assert!(matches!(
            ingestor.read_rows(&file),
            Err(IngestError::UnsupportedType)
        ));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let ingestor = SpreadsheetIngestor::new(8);
        let err = ingestor
            .read_rows(&upload(XLSX_MIME, vec![0u8; 16]))
            .unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { limit_bytes: 8 }));
    }

    #[test]
    fn test_rejects_unrecognized_bytes() {
        let ingestor = SpreadsheetIngestor::new(1024);
        let file = UploadedFile {
            file_name: None,
            content_type: Some(XLSX_MIME.to_string()),
            bytes: vec![0x00, 0x01, 0x02, 0x03],
        };
        assert!(matches!(ingestor.read_rows(&file), Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_garbage_zip_payload_fails_to_parse() {
        let ingestor = SpreadsheetIngestor::new(1024);
        // Valid ZIP magic, invalid archive body.
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            ingestor.read_rows(&upload(XLSX_MIME, bytes)),
            Err(IngestError::Parse(_))
        ));
    }

    fn range_with(values: &[((u32, u32), Data)]) -> Range<Data> {
        let max_row = values.iter().map(|((r, _), _)| *r).max().unwrap_or(0);
        let max_col = values.iter().map(|((_, c), _)| *c).max().unwrap_or(0);
        let mut range = Range::new((0, 0), (max_row, max_col));
        for (pos, value) in values {
            range.set_value(*pos, value.clone());
        }
        range
    }

    #[test]
    fn test_rows_keyed_by_header() {
        let range = range_with(&[
            ((0, 0), Data::String("recipientName".to_string())),
            ((0, 1), Data::String("quantity".to_string())),
            ((1, 0), Data::String("Mona Hassan".to_string())),
            ((1, 1), Data::Float(2.0)),
            ((2, 0), Data::String("Ali Farouk".to_string())),
            ((2, 1), Data::Int(5)),
        ]);
        let rows = rows_from_range(&range);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].value("recipientName"), Some("Mona Hassan"));
        // Whole floats collapse to integer strings.
        assert_eq!(rows[0].value("quantity"), Some("2"));
        assert_eq!(rows[1].index, 2);
        assert_eq!(rows[1].value("quantity"), Some("5"));
        assert_eq!(rows[1].value("recipientEmail"), None);
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let range = range_with(&[
            ((0, 0), Data::String("recipientName".to_string())),
            ((1, 0), Data::Empty),
            ((2, 0), Data::String("Ali Farouk".to_string())),
        ]);
        let rows = rows_from_range(&range);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].value("recipientName"), Some("Ali Farouk"));
    }

    #[test]
    fn test_blank_cell_reads_as_absent() {
        let range = range_with(&[
            ((0, 0), Data::String("recipientName".to_string())),
            ((0, 1), Data::String("recipientPhone".to_string())),
            ((1, 0), Data::String("Mona".to_string())),
            ((1, 1), Data::String("   ".to_string())),
        ]);
        let rows = rows_from_range(&range);
        assert_eq!(rows[0].value("recipientPhone"), None);
    }

    #[test]
    fn test_header_only_sheet_has_no_rows() {
        let range = range_with(&[
            ((0, 0), Data::String("recipientName".to_string())),
            ((0, 1), Data::String("quantity".to_string())),
        ]);
        assert!(rows_from_range(&range).is_empty());
    }
}
