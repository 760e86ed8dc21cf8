use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use super::dedup::Deduplicator;
use super::extractor::{Candidates, FieldExtractor};
use super::parser::{DocumentFormat, ExtractError, ExtractedContent, FormatDispatcher};
use super::segmenter::Segmenter;
use super::tabular::TabularParser;
use super::text::normalize_line_endings;
use crate::config::ImportConfig;
use crate::question::ParseResult;

pub const NO_TEXT_ERROR: &str = "No text could be extracted from document";
pub const NO_BLOCKS_ERROR: &str = "No question blocks found in document text";
pub const NO_ROWS_ERROR: &str = "Spreadsheet needs a header row and at least one data row";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Document bytes in, deduplicated questions out.
///
/// Holds no mutable state; one pipeline can serve concurrent callers.
pub struct ImportPipeline {
    dispatcher: FormatDispatcher,
    segmenter: Segmenter,
    extractor: FieldExtractor,
    deduplicator: Deduplicator,
    config: ImportConfig,
}

impl ImportPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ImportConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ImportConfig) -> Self {
        Self {
            dispatcher: FormatDispatcher::default(),
            segmenter: Segmenter::default(),
            extractor: FieldExtractor::new(&config),
            deduplicator: Deduplicator::new(config.similarity_threshold),
            config,
        }
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: FormatDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    #[must_use]
    pub fn with_field_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Fails only when the format is unsupported or the document cannot be
    /// read; problems with individual questions end up in `errors`.
    pub fn parse_document(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: Option<&str>,
    ) -> ImportResult<ParseResult> {
        let start = Instant::now();
        let format = DocumentFormat::detect(filename, mime_type)?;
        tracing::debug!("Parsing {} ({} bytes) as {}", filename, data.len(), format);

        let candidates = match self.dispatcher.extract(data, format)? {
            ExtractedContent::Text(raw) => {
                let text = normalize_line_endings(&raw);
                if text.trim().is_empty() {
                    tracing::warn!("{}: no text extracted", filename);
                    return Ok(ParseResult::failed(NO_TEXT_ERROR));
                }
                self.parse_text(&text)
            }
            ExtractedContent::Table(rows) => {
                let filled = rows
                    .iter()
                    .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
                    .count();
                if filled < 2 {
                    tracing::warn!("{}: only {} non-empty rows", filename, filled);
                    return Ok(ParseResult::failed(NO_ROWS_ERROR));
                }
                self.parse_table(&rows)
            }
        };

        let Candidates { questions, errors } = candidates;
        let mut questions: Vec<_> = questions
            .into_iter()
            .map(|q| q.with_source(filename.to_string()))
            .collect();

        if questions.len() > self.config.max_questions {
            tracing::warn!(
                "{}: {} questions found, keeping the first {}",
                filename,
                questions.len(),
                self.config.max_questions
            );
            questions.truncate(self.config.max_questions);
        }

        let outcome = self.deduplicator.dedup(questions);

        tracing::info!(
            "{}: {} questions, {} duplicates removed, {} errors in {}ms",
            filename,
            outcome.unique.len(),
            outcome.duplicates_removed,
            errors.len(),
            start.elapsed().as_millis()
        );

        Ok(ParseResult::new(outcome.unique, outcome.duplicates_removed, errors))
    }

    /// Segment a text body and extract one question per block.
    pub fn parse_text(&self, text: &str) -> Candidates {
        let mut candidates = Candidates::default();
        let blocks = self.segmenter.segment(text);
        if blocks.is_empty() {
            tracing::warn!("Text did not split into any question blocks");
            candidates.errors.push(NO_BLOCKS_ERROR.to_string());
        }
        for (idx, block) in blocks.iter().enumerate() {
            candidates.record("Block", idx + 1, self.extractor.parse_block(block));
        }
        candidates
    }

    pub fn parse_table(&self, rows: &[Vec<String>]) -> Candidates {
        TabularParser::new(&self.extractor, self.config.max_explanation_chars).parse(rows)
    }

    pub fn parse_file(&self, path: &Path) -> ImportResult<ParseResult> {
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.parse_document(&data, &filename, None)
    }

    pub fn parse_files<P: AsRef<Path>>(&self, paths: &[P]) -> BatchParseResult {
        let mut result = BatchParseResult::new();

        for path in paths {
            let path = path.as_ref();
            let path_str = path.to_string_lossy().to_string();

            match self.parse_file(path) {
                Ok(parsed) => result.add_success(path_str, parsed),
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path_str, e);
                    result.add_failure(path_str, e);
                }
            }
        }

        result
    }
}

impl Default for ImportPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct BatchParseResult {
    pub successful: Vec<(String, ParseResult)>,
    pub failed: Vec<(String, ImportError)>,
}

impl BatchParseResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add_success(&mut self, path: String, result: ParseResult) {
        self.successful.push((path, result));
    }

    fn add_failure(&mut self, path: String, error: ImportError) {
        self.failed.push((path, error));
    }

    pub fn success_count(&self) -> usize {
        self.successful.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total_questions(&self) -> usize {
        self.successful.iter().map(|(_, r)| r.total_found).sum()
    }
}
