use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on questions kept from one document.
///
/// Applied before de-duplication so the quadratic similarity scan stays bounded.
pub const DEFAULT_MAX_QUESTIONS: usize = 1000;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MAX_EXPLANATION_CHARS: usize = 1000;
pub const DEFAULT_MIN_STEM_CHARS: usize = 10;

/// Tunables for one import pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Maximum number of candidate questions carried into de-duplication
    pub max_questions: usize,
    /// Jaccard similarity above which two stems are near-duplicates
    pub similarity_threshold: f64,
    /// Explanations are truncated to this many characters
    pub max_explanation_chars: usize,
    /// Cleaned stems shorter than this are rejected
    pub min_stem_chars: usize,
    /// When a free-text block names no correct answer, treat option A as correct.
    /// Silently produces possibly-wrong records; see DESIGN.md.
    pub assume_first_option: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_questions: DEFAULT_MAX_QUESTIONS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_explanation_chars: DEFAULT_MAX_EXPLANATION_CHARS,
            min_stem_chars: DEFAULT_MIN_STEM_CHARS,
            assume_first_option: true,
        }
    }
}

impl ImportConfig {
    /// Defaults overridden by `QBANK_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_max_questions(mut self, max: usize) -> Self {
        self.max_questions = max;
        self
    }

    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_assume_first_option(mut self, assume: bool) -> Self {
        self.assume_first_option = assume;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_questions == 0 {
            return Err(ConfigError::ZeroMaxQuestions);
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.similarity_threshold));
        }
        if self.max_explanation_chars == 0 {
            return Err(ConfigError::ZeroExplanationCap);
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = parse_var(&lookup, "QBANK_MAX_QUESTIONS") {
            self.max_questions = v;
        }
        if let Some(v) = parse_var(&lookup, "QBANK_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "QBANK_MAX_EXPLANATION_CHARS") {
            self.max_explanation_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "QBANK_MIN_STEM_CHARS") {
            self.min_stem_chars = v;
        }
        if let Some(v) = lookup("QBANK_ASSUME_FIRST_OPTION") {
            self.assume_first_option = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_questions must be at least 1")]
    ZeroMaxQuestions,
    #[error("similarity_threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("max_explanation_chars must be at least 1")]
    ZeroExplanationCap,
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}
