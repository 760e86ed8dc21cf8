pub mod config;
pub mod error;
pub mod ingest;
pub mod question;
pub mod storage;

pub use config::{ConfigError, ImportConfig};
pub use error::{Error, Result};
pub use ingest::{BatchParseResult, ImportError, ImportPipeline};
pub use question::{
    Category, Difficulty, ParseResult, ParsedQuestion, QuestionOption, QuestionType,
};
pub use storage::{ImportSummary, QuestionSink, QuestionStore, StoredQuestion};
