//! `qbank parse`: documents in, JSON out.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use qbank_core::{ImportPipeline, ParseResult};
use serde::Serialize;

use super::{parse_all, report_failure, report_parse, ConfigArgs};

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a ParseResult,
}

/// Returns false if any file could not be read or decoded at all.
pub async fn run(files: &[PathBuf], config: &ConfigArgs, compact: bool) -> Result<bool> {
    let pipeline = Arc::new(ImportPipeline::with_config(config.load()?));
    let mut all_parsed = true;

    for (path, outcome) in parse_all(pipeline, files).await? {
        match outcome {
            Ok(result) => {
                report_parse(&path, &result);

                let report = FileReport {
                    file: path.display().to_string(),
                    result: &result,
                };
                let json = if compact {
                    serde_json::to_string(&report)?
                } else {
                    serde_json::to_string_pretty(&report)?
                };
                println!("{json}");
            }
            Err(e) => {
                report_failure(&path, &e);
                all_parsed = false;
            }
        }
    }

    Ok(all_parsed)
}
