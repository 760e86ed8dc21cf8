mod dedup;
mod extractor;
mod normalizer;
mod parser;
mod pipeline;
mod segmenter;
mod tabular;
mod text;

pub use dedup::{fingerprint, jaccard_similarity, DedupOutcome, Deduplicator};
pub use extractor::{
    clean_stem, default_answer_rules, extract_options, parse_answer_letters, AnswerRule,
    AnswerScope, BlockParts, Candidates, FieldExtractor, ItemError, ItemResult, OptionNumbering,
};
pub use normalizer::{normalize_category, normalize_difficulty, normalize_question_type};
pub use parser::{
    CsvExtractor, DocumentFormat, DocxExtractor, ExtractError, ExtractResult, ExtractedContent,
    FormatDispatcher, PdfExtractor, PlainTextExtractor, SpreadsheetExtractor, TextExtractor,
};
pub use pipeline::{
    BatchParseResult, ImportError, ImportPipeline, ImportResult, NO_BLOCKS_ERROR, NO_ROWS_ERROR,
    NO_TEXT_ERROR,
};
pub use segmenter::{split_paragraphs, MarkerStrategy, SegmentStrategy, Segmenter};
pub use tabular::{
    classify_header, parse_answer_cell, parse_option_list, ColumnRole, ColumnRoles, TabularParser,
};
pub use text::{collapse_whitespace, normalize_text, word_set};
