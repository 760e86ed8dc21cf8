//! `qbank import`: parse documents and store the questions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use qbank_core::{ImportPipeline, QuestionSink, QuestionStore};

use super::{parse_all, report_failure, report_parse, ConfigArgs};

const DB_FILE: &str = "questions.db";

fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("No user data directory available; pass --db")?
        .join("qbank");
    Ok(dir.join(DB_FILE))
}

pub async fn run(files: &[PathBuf], db: Option<&Path>, config: &ConfigArgs) -> Result<bool> {
    let config = config.load()?;
    let db_path = match db {
        Some(path) => path.to_path_buf(),
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = QuestionStore::open(&db_path.to_string_lossy())
        .await
        .with_context(|| format!("Failed to open question bank at {}", db_path.display()))?
        .with_similarity_threshold(config.similarity_threshold);
    let pipeline = Arc::new(ImportPipeline::with_config(config));

    let mut all_parsed = true;
    let mut imported = 0;
    let mut skipped = 0;

    for (path, outcome) in parse_all(pipeline, files).await? {
        match outcome {
            Ok(result) => {
                report_parse(&path, &result);
                let summary = store.import_questions(&result.questions).await?;
                eprintln!(
                    "  imported {}, skipped {} already in the bank",
                    summary.imported, summary.skipped
                );
                imported += summary.imported;
                skipped += summary.skipped;
            }
            Err(e) => {
                report_failure(&path, &e);
                all_parsed = false;
            }
        }
    }

    eprintln!(
        "Imported {imported} questions into {} ({skipped} skipped, {} total)",
        db_path.display(),
        store.count().await?
    );

    Ok(all_parsed)
}
