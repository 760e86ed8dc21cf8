use std::fmt;
use std::io::Cursor;
use std::path::Path;

use calamine::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::text::normalize_line_endings;

/// Printable runs shorter than this are dropped when scraping legacy `.doc` files.
const MIN_SCRAPED_RUN: usize = 8;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to read {format} document: {message}")]
    ExtractionFailed {
        format: DocumentFormat,
        message: String,
    },
}

impl ExtractError {
    pub fn failed(format: DocumentFormat, message: impl ToString) -> Self {
        Self::ExtractionFailed {
            format,
            message: message.to_string(),
        }
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Xlsx,
    Xls,
    Csv,
    PlainText,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "xlsx" | "xlsm" | "ods" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" => Some(Self::Csv),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel.sheet.macroenabled.12"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(Self::Xlsx),
            "application/vnd.ms-excel" => Some(Self::Xls),
            "text/csv" | "application/csv" => Some(Self::Csv),
            "text/plain" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Extension decides; the MIME type is only consulted when the name has none.
    pub fn detect(filename: &str, mime_type: Option<&str>) -> ExtractResult<Self> {
        if let Some(ext) = Path::new(filename).extension().and_then(|e| e.to_str()) {
            return Self::from_extension(ext)
                .ok_or_else(|| ExtractError::UnsupportedFormat(ext.to_lowercase()));
        }

        match mime_type {
            Some(mime) => {
                Self::from_mime(mime).ok_or_else(|| ExtractError::UnsupportedFormat(mime.to_string()))
            }
            None => Err(ExtractError::UnsupportedFormat("no extension".into())),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
            Self::PlainText => "txt",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a document yields: one text body, or a grid of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    Text(String),
    Table(Vec<Vec<String>>),
}

pub trait TextExtractor: Send + Sync {
    fn supported_formats(&self) -> &[DocumentFormat];

    fn can_extract(&self, format: DocumentFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    fn extract(&self, data: &[u8], format: DocumentFormat) -> ExtractResult<ExtractedContent>;
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::PlainText]
    }

    fn extract(&self, data: &[u8], _format: DocumentFormat) -> ExtractResult<ExtractedContent> {
        Ok(ExtractedContent::Text(String::from_utf8_lossy(data).into_owned()))
    }
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf]
    }

    fn extract(&self, data: &[u8], format: DocumentFormat) -> ExtractResult<ExtractedContent> {
        // pdf-extract panics on some malformed font tables
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data)) {
            Ok(Ok(text)) => Ok(ExtractedContent::Text(text)),
            Ok(Err(e)) => Err(ExtractError::failed(format, e)),
            Err(_) => Err(ExtractError::failed(format, "PDF reader crashed on malformed input")),
        }
    }
}

/// `.docx` through docx-rs. Legacy `.doc` files are tried the same way, then
/// scraped for printable text.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Docx, DocumentFormat::Doc]
    }

    fn extract(&self, data: &[u8], format: DocumentFormat) -> ExtractResult<ExtractedContent> {
        match docx_text(data) {
            Ok(text) => Ok(ExtractedContent::Text(text)),
            Err(e) if format == DocumentFormat::Doc => {
                tracing::warn!("Not a zipped Word document ({}), scraping legacy .doc text", e);
                let text = scrape_printable_text(data);
                if text.is_empty() {
                    Err(ExtractError::failed(format, "no readable text in legacy document"))
                } else {
                    Ok(ExtractedContent::Text(text))
                }
            }
            Err(e) => Err(ExtractError::failed(format, e)),
        }
    }
}

fn docx_text(data: &[u8]) -> Result<String, docx_rs::ReaderError> {
    let doc = docx_rs::read_docx(data)?;

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        let docx_rs::DocumentChild::Paragraph(p) = child else {
            continue;
        };

        let mut line = String::new();
        for child in p.children {
            if let docx_rs::ParagraphChild::Run(run) = child {
                for child in run.children {
                    match child {
                        docx_rs::RunChild::Text(t) => line.push_str(&t.text),
                        docx_rs::RunChild::Tab(_) => line.push('\t'),
                        docx_rs::RunChild::Break(_) => line.push('\n'),
                        _ => {}
                    }
                }
            }
        }
        paragraphs.push(line);
    }

    Ok(paragraphs.join("\n"))
}

fn scrape_printable_text(data: &[u8]) -> String {
    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();

    // NUL bytes are skipped so UTF-16LE ASCII text reads as contiguous runs
    for &byte in data.iter().filter(|&&b| b != 0) {
        if byte.is_ascii_graphic() || matches!(byte, b' ' | b'\t' | b'\r' | b'\n') {
            current.push(char::from(byte));
        } else {
            flush_run(&mut current, &mut runs);
        }
    }
    flush_run(&mut current, &mut runs);

    normalize_line_endings(&runs.join("\n"))
}

fn flush_run(current: &mut String, runs: &mut Vec<String>) {
    if current.trim().len() >= MIN_SCRAPED_RUN {
        runs.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// First worksheet of any workbook calamine can open, cells stringified.
pub struct SpreadsheetExtractor;

impl TextExtractor for SpreadsheetExtractor {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Xlsx, DocumentFormat::Xls]
    }

    fn extract(&self, data: &[u8], format: DocumentFormat) -> ExtractResult<ExtractedContent> {
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(data))
            .map_err(|e| ExtractError::failed(format, e))?;

        let Some(first) = workbook.sheet_names().first().cloned() else {
            return Ok(ExtractedContent::Table(Vec::new()));
        };

        let range = workbook
            .worksheet_range(&first)
            .map_err(|e| ExtractError::failed(format, e))?;

        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        Ok(ExtractedContent::Table(rows))
    }
}

fn cell_to_string(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        calamine::Data::DateTime(dt) => dt.to_string(),
        calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}

pub struct CsvExtractor;

impl TextExtractor for CsvExtractor {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Csv]
    }

    fn extract(&self, data: &[u8], format: DocumentFormat) -> ExtractResult<ExtractedContent> {
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record.map_err(|e| ExtractError::failed(format, e))?;
            rows.push(
                record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect(),
            );
        }

        Ok(ExtractedContent::Table(rows))
    }
}

/// The one place formats are registered. Later registrations win.
pub struct FormatDispatcher {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl FormatDispatcher {
    /// A dispatcher with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractors.insert(0, Box::new(extractor));
        self
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.find_extractor(format).is_some()
    }

    fn find_extractor(&self, format: DocumentFormat) -> Option<&dyn TextExtractor> {
        self.extractors
            .iter()
            .find(|e| e.can_extract(format))
            .map(|e| e.as_ref())
    }

    pub fn extract(&self, data: &[u8], format: DocumentFormat) -> ExtractResult<ExtractedContent> {
        let extractor = self
            .find_extractor(format)
            .ok_or_else(|| ExtractError::UnsupportedFormat(format.to_string()))?;

        extractor.extract(data, format)
    }
}

impl Default for FormatDispatcher {
    fn default() -> Self {
        Self::empty()
            .with_extractor(PlainTextExtractor)
            .with_extractor(CsvExtractor)
            .with_extractor(SpreadsheetExtractor)
            .with_extractor(DocxExtractor)
            .with_extractor(PdfExtractor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("doc"), Some(DocumentFormat::Doc));
        assert_eq!(DocumentFormat::from_extension("xlsm"), Some(DocumentFormat::Xlsx));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::PlainText));
        assert_eq!(DocumentFormat::from_extension("pptx"), None);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(
            DocumentFormat::from_mime("text/csv; charset=utf-8"),
            Some(DocumentFormat::Csv)
        );
        assert_eq!(
            DocumentFormat::from_mime("application/msword"),
            Some(DocumentFormat::Doc)
        );
        assert_eq!(DocumentFormat::from_mime("image/png"), None);
    }

    #[test]
    fn test_detect_prefers_extension() {
        assert_eq!(
            DocumentFormat::detect("bank.csv", Some("application/pdf")).unwrap(),
            DocumentFormat::Csv
        );
        assert_eq!(
            DocumentFormat::detect("upload", Some("application/pdf")).unwrap(),
            DocumentFormat::Pdf
        );

        let err = DocumentFormat::detect("slides.PPTX", Some("text/plain")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref ext) if ext == "pptx"));
        assert_eq!(err.to_string(), "Unsupported file format: pptx");
    }

    #[test]
    fn test_plain_text_is_lossy() {
        let content = PlainTextExtractor
            .extract(b"caf\xE9 question", DocumentFormat::PlainText)
            .unwrap();
        assert_eq!(content, ExtractedContent::Text("caf\u{FFFD} question".into()));
    }

    #[test]
    fn test_csv_quoting_and_ragged_rows() {
        let data = b"\xEF\xBB\xBFquestion,options,answer\n\"Pick one, please\",\"A:x|B:y\",A\nshort\n";
        let content = CsvExtractor.extract(data, DocumentFormat::Csv).unwrap();

        let ExtractedContent::Table(rows) = content else {
            panic!("expected a table");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "question");
        assert_eq!(rows[1][0], "Pick one, please");
        assert_eq!(rows[2], vec!["short".to_string()]);
    }

    #[test]
    fn test_csv_invalid_utf8_is_lossy() {
        let content = CsvExtractor
            .extract(b"question\nna\xEFve\n", DocumentFormat::Csv)
            .unwrap();
        let ExtractedContent::Table(rows) = content else {
            panic!("expected a table");
        };
        assert!(rows[1][0].contains('\u{FFFD}'));
    }

    #[test]
    fn test_docx_paragraphs() {
        let mut buf = Cursor::new(Vec::new());
        docx_rs::Docx::new()
            .add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("1. What is the dose?")))
            .add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("A. 5 mg")))
            .build()
            .pack(&mut buf)
            .unwrap();

        let content = DocxExtractor
            .extract(buf.get_ref(), DocumentFormat::Docx)
            .unwrap();
        assert_eq!(content, ExtractedContent::Text("1. What is the dose?\nA. 5 mg".into()));
    }

    #[test]
    fn test_legacy_doc_scrape() {
        let mut data = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x01, 0x02];
        data.extend(utf16le("Which organ produces insulin?\r"));
        data.extend([0x01, 0x02, 0x03]);
        data.extend(utf16le("A. Pancreas\r"));

        let content = DocxExtractor.extract(&data, DocumentFormat::Doc).unwrap();
        let ExtractedContent::Text(text) = content else {
            panic!("expected text");
        };
        assert!(text.contains("Which organ produces insulin?"));
        assert!(text.contains("A. Pancreas"));
    }

    #[test]
    fn test_corrupt_documents_fail() {
        assert!(matches!(
            DocxExtractor.extract(b"not a zip", DocumentFormat::Docx),
            Err(ExtractError::ExtractionFailed { format: DocumentFormat::Docx, .. })
        ));
        assert!(matches!(
            PdfExtractor.extract(b"definitely not a pdf", DocumentFormat::Pdf),
            Err(ExtractError::ExtractionFailed { format: DocumentFormat::Pdf, .. })
        ));
        assert!(SpreadsheetExtractor
            .extract(b"garbage", DocumentFormat::Xlsx)
            .is_err());
    }

    #[test]
    fn test_dispatcher_prefers_later_registration() {
        struct Canned;
        impl TextExtractor for Canned {
            fn supported_formats(&self) -> &[DocumentFormat] {
                &[DocumentFormat::Pdf]
            }
            fn extract(&self, _data: &[u8], _format: DocumentFormat) -> ExtractResult<ExtractedContent> {
                Ok(ExtractedContent::Text("canned".into()))
            }
        }

        let dispatcher = FormatDispatcher::default().with_extractor(Canned);
        assert_eq!(
            dispatcher.extract(b"%PDF", DocumentFormat::Pdf).unwrap(),
            ExtractedContent::Text("canned".into())
        );

        let empty = FormatDispatcher::empty();
        assert!(!empty.supports(DocumentFormat::Csv));
        assert!(matches!(
            empty.extract(b"a,b", DocumentFormat::Csv),
            Err(ExtractError::UnsupportedFormat(_))
        ));
    }
}
