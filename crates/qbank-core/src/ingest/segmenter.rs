use std::sync::LazyLock;

use regex::Regex;

/// A marker split must leave more than this many substantial fragments.
const MIN_MARKER_FRAGMENTS: usize = 3;
/// Fragments at or under this many characters are noise.
const MIN_FRAGMENT_CHARS: usize = 20;
const MIN_PARAGRAPH_CHARS: usize = 50;

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d{1,4}\.[ \t]").unwrap());

static QUESTION_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bquestion\s*\d+\s*[:.]").unwrap());

static Q_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bQ\d+\s*[:.]").unwrap());

static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").unwrap());

static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// One way of cutting a text body into question blocks.
pub trait SegmentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when this strategy does not recognize the document's layout.
    fn try_split(&self, text: &str) -> Option<Vec<String>>;
}

/// Splits at every occurrence of a marker; each block runs to the next marker.
/// Text before the first marker is dropped.
#[derive(Debug, Clone)]
pub struct MarkerStrategy {
    name: &'static str,
    marker: Regex,
}

impl MarkerStrategy {
    #[must_use]
    pub fn new(name: &'static str, marker: Regex) -> Self {
        Self { name, marker }
    }

    /// `1.`, `2.`, ... at line starts.
    pub fn numbered() -> Self {
        Self::new("numbered", NUMBERED_RE.clone())
    }

    /// `Question 1:` / `Question 1.`
    pub fn question_label() -> Self {
        Self::new("question_label", QUESTION_LABEL_RE.clone())
    }

    /// `Q1:` / `Q1.`
    pub fn q_label() -> Self {
        Self::new("q_label", Q_LABEL_RE.clone())
    }

    /// `[1]`
    pub fn bracketed() -> Self {
        Self::new("bracketed", BRACKETED_RE.clone())
    }
}

impl SegmentStrategy for MarkerStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn try_split(&self, text: &str) -> Option<Vec<String>> {
        let starts: Vec<usize> = self.marker.find_iter(text).map(|m| m.start()).collect();

        let fragments: Vec<String> = starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(text.len());
                text[start..end].trim()
            })
            .filter(|fragment| fragment.chars().count() > MIN_FRAGMENT_CHARS)
            .map(str::to_string)
            .collect();

        (fragments.len() > MIN_MARKER_FRAGMENTS).then_some(fragments)
    }
}

/// Blank-line separated paragraphs longer than 50 characters.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
        .map(str::to_string)
        .collect()
}

/// Ordered marker strategies with a paragraph fallback. First success wins.
pub struct Segmenter {
    strategies: Vec<Box<dyn SegmentStrategy>>,
}

impl Segmenter {
    pub fn new(strategies: Vec<Box<dyn SegmentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Add a strategy after the existing ones.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl SegmentStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn segment(&self, text: &str) -> Vec<String> {
        for strategy in &self.strategies {
            if let Some(blocks) = strategy.try_split(text) {
                tracing::debug!(
                    "Segmented text into {} blocks using {}",
                    blocks.len(),
                    strategy.name()
                );
                return blocks;
            }
        }

        let blocks = split_paragraphs(text);
        tracing::debug!("No marker layout found, using {} paragraphs", blocks.len());
        blocks
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(vec![
            Box::new(MarkerStrategy::numbered()),
            Box::new(MarkerStrategy::question_label()),
            Box::new(MarkerStrategy::q_label()),
            Box::new(MarkerStrategy::bracketed()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_doc(count: usize) -> String {
        (1..=count)
            .map(|n| format!("{n}. What is the normal value for lab test number {n}?\nA. Low\nB. High\nAnswer: A\n"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_numbered_split() {
        let text = format!("Cardiology practice set\n\n{}", numbered_doc(5));
        let blocks = Segmenter::default().segment(&text);

        assert_eq!(blocks.len(), 5);
        assert!(blocks[0].starts_with("1. What is"));
        assert!(blocks[4].ends_with("Answer: A"));
        assert!(blocks.iter().all(|b| !b.contains("Cardiology")));
    }

    #[test]
    fn test_three_markers_are_not_enough() {
        let strategy = MarkerStrategy::numbered();
        assert!(strategy.try_split(&numbered_doc(3)).is_none());
        assert_eq!(strategy.try_split(&numbered_doc(4)).map(|b| b.len()), Some(4));
    }

    #[test]
    fn test_trivial_fragments_dropped() {
        let text = "1. tiny\n2. tiny\n3. A question long enough to keep?\n4. Another question long enough?\n5. Yet another reasonably long one?\n6. And a final long enough question?";
        let blocks = MarkerStrategy::numbered().try_split(text).unwrap();

        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].starts_with("3."));
    }

    #[test]
    fn test_question_label_split() {
        let text = (1..=4)
            .map(|n| format!("Question {n}: Which finding is expected here?\nA) Yes\nB) No"))
            .collect::<Vec<_>>()
            .join("\n");
        let blocks = Segmenter::default().segment(&text);

        assert_eq!(blocks.len(), 4);
        assert!(blocks[2].starts_with("Question 3:"));
    }

    #[test]
    fn test_q_label_and_bracketed_split() {
        let q_text = (1..=4)
            .map(|n| format!("Q{n}. Which finding is expected here? A. Yes B. No"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(MarkerStrategy::q_label().try_split(&q_text).map(|b| b.len()), Some(4));

        let bracket_text = (1..=4)
            .map(|n| format!("[{n}] Which finding is expected here? A. Yes B. No"))
            .collect::<Vec<_>>()
            .join(" ");
        let blocks = Segmenter::default().segment(&bracket_text);
        assert_eq!(blocks.len(), 4);
        assert!(blocks[3].starts_with("[4]"));
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "Which electrolyte is most affected by loop diuretics?\nA. Potassium\nB. Calcium\n\n\
                    short paragraph\n\n\
                    Which position is best for a patient in respiratory distress?\nA. Fowler\nB. Supine";
        let blocks = Segmenter::default().segment(text);

        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].starts_with("Which position"));
    }

    #[test]
    fn test_custom_strategy_after_defaults() {
        struct Everything;
        impl SegmentStrategy for Everything {
            fn name(&self) -> &'static str {
                "everything"
            }
            fn try_split(&self, text: &str) -> Option<Vec<String>> {
                Some(vec![text.to_string()])
            }
        }

        let segmenter = Segmenter::default().with_strategy(Everything);
        assert_eq!(segmenter.strategy_names().last(), Some(&"everything"));
        assert_eq!(segmenter.segment("short"), vec!["short".to_string()]);
    }
}
