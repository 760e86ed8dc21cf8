//! Command-line interface for qbank.

pub mod import;
pub mod parse;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qbank_core::{ImportConfig, ImportError, ImportPipeline, ParseResult};

/// Errors printed per file before the rest are summarized
const MAX_ERRORS_SHOWN: usize = 10;

#[derive(Parser)]
#[command(name = "qbank")]
#[command(about = "Turn exam-prep documents into structured multiple-choice questions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse documents and print the extracted questions as JSON
    Parse {
        /// Documents to parse (pdf, docx, doc, xlsx, xls, csv, txt)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Print one JSON object per line instead of pretty output
        #[arg(long)]
        compact: bool,
    },

    /// Parse documents and store their questions in the question bank
    Import {
        /// Documents to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Question bank database (defaults to the user data directory)
        #[arg(long)]
        db: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// JSON file with import settings (otherwise QBANK_* environment variables apply)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum questions kept per document
    #[arg(long)]
    pub max_questions: Option<usize>,

    /// Stem similarity above which questions count as duplicates (0-1)
    #[arg(long)]
    pub similarity: Option<f64>,

    /// Reject free-text questions that name no correct answer instead of assuming option A
    #[arg(long)]
    pub require_answer: bool,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<ImportConfig> {
        let mut config = match &self.config {
            Some(path) => ImportConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ImportConfig::from_env(),
        };

        if let Some(max) = self.max_questions {
            config = config.with_max_questions(max);
        }
        if let Some(threshold) = self.similarity {
            config = config.with_similarity_threshold(threshold);
        }
        if self.require_answer {
            config = config.with_assume_first_option(false);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parse every file on the blocking pool; results come back in input order.
pub async fn parse_all(
    pipeline: Arc<ImportPipeline>,
    files: &[PathBuf],
) -> Result<Vec<(PathBuf, Result<ParseResult, ImportError>)>> {
    let handles: Vec<_> = files
        .iter()
        .cloned()
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            tokio::task::spawn_blocking(move || {
                let result = pipeline.parse_file(&path);
                (path, result)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.context("Parser task panicked")?);
    }
    Ok(results)
}

pub fn report_parse(path: &Path, result: &ParseResult) {
    eprintln!(
        "{}: {} questions, {} duplicates removed, {} errors",
        path.display(),
        result.questions.len(),
        result.duplicates_removed,
        result.error_count()
    );

    for error in result.errors.iter().take(MAX_ERRORS_SHOWN) {
        eprintln!("  {error}");
    }
    if result.errors.len() > MAX_ERRORS_SHOWN {
        eprintln!("  ... and {} more", result.errors.len() - MAX_ERRORS_SHOWN);
    }
}

pub fn report_failure(path: &Path, error: &ImportError) {
    eprintln!("{}: {error}", path.display());
}
