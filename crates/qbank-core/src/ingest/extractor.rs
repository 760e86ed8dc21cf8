use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::text::{collapse_whitespace, truncate_chars};
use crate::config::ImportConfig;
use crate::question::{ParsedQuestion, QuestionOption, MAX_OPTION_LETTER};

/// Why one block or row was skipped. Rendered into `ParseResult::errors`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("no question text found")]
    MissingStem,
    #[error("question text too short ({length} characters, minimum {minimum})")]
    StemTooShort { length: usize, minimum: usize },
    #[error("found {0} option(s), at least 2 required")]
    TooFewOptions(usize),
    #[error("no correct answer could be determined")]
    NoCorrectAnswer,
    #[error("no question column in header row")]
    MissingStemColumn,
}

pub type ItemResult<T> = Result<T, ItemError>;

/// Questions recovered from one document plus one message per skipped item.
#[derive(Debug, Default)]
pub struct Candidates {
    pub questions: Vec<ParsedQuestion>,
    pub errors: Vec<String>,
}

impl Candidates {
    /// Keep the question, or record `"{label} {number}: {error}"`.
    pub fn record(&mut self, label: &str, number: usize, result: ItemResult<ParsedQuestion>) {
        match result {
            Ok(question) => self.questions.push(question),
            Err(e) => {
                tracing::debug!("Skipping {} {}: {}", label, number, e);
                self.errors.push(format!("{label} {number}: {e}"));
            }
        }
    }
}

// A line that opens the options list: "A.", "a)", "B:", "(C)", "**D.", "**E.**".
static OPTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:\*\*|__)?[ \t]*\(?[A-Fa-f][ \t]*[.):](?:\*\*|__)?(?:[ \t]+\S|[ \t]*$)")
        .unwrap()
});

static FIRST_NUMBERED_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*1[.)](?:[ \t]+\S|[ \t]*$)").unwrap());

static INLINE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+?)\s+(\(?A[.):]\s.*)$").unwrap());

static LINE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:\*\*|__)?[ \t]*\(?([A-Fa-f])[ \t]*[.):](?:\*\*|__)?(?:[ \t]+|$)")
        .unwrap()
});

static INLINE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(?:\*\*|__)?\(?([A-Fa-f])[.):](?:\*\*|__)?\s+").unwrap());

static NUMBERED_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*([1-6])[.)](?:[ \t]+|$)").unwrap());

// Start of the answer/explanation section that ends the options list.
static TERMINATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:\*\*|__)?[ \t]*(?:correct\s+answers?|answers?|explanation|rationale|correct|why)\b|\b(?:correct\s+answers?|answers?|explanation|rationale|correct)\s*[:=]|\b(?:the\s+)?correct\s+(?:answer|option|choice)s?\s+(?:is|are)\b",
    )
    .unwrap()
});

static ANSWER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)\banswers?\s*(?:is\s*)?[:=\-]\s*(.+)$").unwrap());

static CORRECT_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)\bcorrect\s*[:=\-]\s*(.+)$").unwrap());

static CORRECT_ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\bcorrect\s+(?:answers?|options?|choices?)\s*(?:is|are)?\s*[:=\-]?\s*(.+)$")
        .unwrap()
});

static BOLD_ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[ \t]*\(?([A-Fa-f])\)?(?:[.):]|\*\*)").unwrap());

static PAREN_ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([A-F])\)").unwrap());

// The keyword opens a line or a sentence, so "Explain why: ..." in a stem is not an explanation.
static EXPLANATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ims)(?:^|[.!?)\]][ \t]+)[ \t]*(?:\*\*|__)?[ \t]*(?:explanation|rationale|why)[ \t]*:(?:\*\*|__)?\s*(.*)",
    )
    .unwrap()
});

static NEXT_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]").unwrap());

static STEM_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:\[\d+\]\s*|\(?\d+[.)](?:\s+|$)|question\s*\d+\s*[:.)]?\s*|q\s?\d+\s*[:.)]\s*)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionNumbering {
    Letters,
    Digits,
}

/// A block cut into stem, options list and trailing answer/explanation text.
#[derive(Debug, Clone, Copy)]
pub struct BlockParts<'a> {
    pub whole: &'a str,
    pub stem: &'a str,
    pub options: &'a str,
    pub tail: &'a str,
    pub numbering: OptionNumbering,
}

impl<'a> BlockParts<'a> {
    pub fn split(block: &'a str) -> Self {
        let (stem, region, numbering) = line_boundary(block)
            .or_else(|| inline_boundary(block))
            .unwrap_or((block, "", OptionNumbering::Letters));

        let cut = TERMINATOR_RE
            .find(region)
            .map_or(region.len(), |m| m.start());

        Self {
            whole: block,
            stem,
            options: &region[..cut],
            tail: &region[cut..],
            numbering,
        }
    }
}

fn line_boundary(block: &str) -> Option<(&str, &str, OptionNumbering)> {
    let mut offset = 0;
    for (idx, line) in block.split_inclusive('\n').enumerate() {
        if idx > 0 {
            let trimmed = line.trim_end();
            if OPTION_LINE_RE.is_match(trimmed) {
                return Some((&block[..offset], &block[offset..], OptionNumbering::Letters));
            }
            if FIRST_NUMBERED_OPTION_RE.is_match(trimmed) {
                return Some((&block[..offset], &block[offset..], OptionNumbering::Digits));
            }
        }
        offset += line.len();
    }
    None
}

fn inline_boundary(block: &str) -> Option<(&str, &str, OptionNumbering)> {
    let caps = INLINE_SPLIT_RE.captures(block)?;
    let stem = caps.get(1)?.as_str();
    let region = caps.get(2)?.as_str();
    Some((stem, region, OptionNumbering::Letters))
}

/// Options from an options region, de-duplicated by letter and sorted.
pub fn extract_options(region: &str, numbering: OptionNumbering) -> Vec<QuestionOption> {
    let markers: Vec<(usize, usize, char)> = match numbering {
        OptionNumbering::Digits => marker_positions(&NUMBERED_MARKER_RE, region),
        OptionNumbering::Letters => {
            let by_line = marker_positions(&LINE_MARKER_RE, region);
            if by_line.len() >= 2 {
                by_line
            } else {
                marker_positions(&INLINE_MARKER_RE, region)
            }
        }
    };

    let mut options: BTreeMap<char, String> = BTreeMap::new();
    for (i, &(_, text_start, letter)) in markers.iter().enumerate() {
        let text_end = markers.get(i + 1).map_or(region.len(), |next| next.0);
        let text = clean_option_text(&region[text_start..text_end]);
        if !text.is_empty() {
            options.entry(letter).or_insert(text);
        }
    }

    options
        .into_iter()
        .map(|(letter, text)| QuestionOption::new(letter, text))
        .collect()
}

fn marker_positions(re: &Regex, region: &str) -> Vec<(usize, usize, char)> {
    re.captures_iter(region)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let marker = caps.get(1)?.as_str().chars().next()?;
            let letter = option_letter(marker, true)?;
            Some((whole.start(), whole.end(), letter))
        })
        .collect()
}

fn clean_option_text(raw: &str) -> String {
    collapse_whitespace(raw.trim().trim_matches(|c| c == '*' || c == '_'))
}

/// Uppercase option letter for a marker character; digits 1-6 map to A-F when allowed.
pub fn option_letter(c: char, accept_digits: bool) -> Option<char> {
    let upper = c.to_ascii_uppercase();
    if ('A'..=MAX_OPTION_LETTER).contains(&upper) {
        return Some(upper);
    }
    if accept_digits && ('1'..='6').contains(&c) {
        let offset = u8::try_from(c).ok()? - b'1';
        return Some(char::from(b'A' + offset));
    }
    None
}

/// Read answer letters from the start of `raw`: `"B"`, `"A, C"`, `"B and D"`, `"ACD"`.
///
/// Reading stops at the first word that is not a letter marker. A bare
/// lowercase letter followed by more words is treated as the article "a".
pub fn parse_answer_letters(raw: &str, accept_digits: bool) -> Vec<char> {
    let mut letters: Vec<char> = Vec::new();
    let mut pushed_article = false;

    let tokens = raw
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '/' | '&' | '|' | '+'))
        .filter(|t| !t.is_empty());

    for token in tokens {
        if token.eq_ignore_ascii_case("and") {
            continue;
        }
        let core = token.trim_matches(|c: char| {
            matches!(c, '(' | ')' | '[' | ']' | '.' | ':' | '*' | '"' | '\'' | '-')
        });
        if core.is_empty() {
            continue;
        }

        let Some(found) = token_letters(core, accept_digits) else {
            if pushed_article {
                letters.pop();
            }
            break;
        };

        pushed_article = false;
        for letter in found {
            if !letters.contains(&letter) {
                letters.push(letter);
                // "a" followed by more words is the article, not option A
                pushed_article = token == "a";
            }
        }
    }

    letters
}

fn token_letters(core: &str, accept_digits: bool) -> Option<Vec<char>> {
    let chars: Vec<char> = core.chars().collect();
    match chars.as_slice() {
        [c] => option_letter(*c, accept_digits).map(|l| vec![l]),
        many if many.len() <= 6 && many.iter().all(|c| ('A'..=MAX_OPTION_LETTER).contains(c)) => {
            Some(many.to_vec())
        }
        _ => None,
    }
}

/// Strip enumeration and "Question N:" / "QN:" prefixes, collapse whitespace.
pub fn clean_stem(raw: &str) -> String {
    let mut stem = raw.trim();
    for _ in 0..3 {
        match STEM_PREFIX_RE.find(stem) {
            Some(m) if m.end() > 0 => stem = stem[m.end()..].trim_start(),
            _ => break,
        }
    }
    collapse_whitespace(stem)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerScope {
    WholeBlock,
    /// Stem and trailing text only, so option markers like "(A)" are not read as answers.
    OutsideOptions,
    /// Every match in the block, accepted only when it singles out fewer letters than
    /// there are options. Markup applied to all option markers names no answer.
    Highlighted,
}

/// One way of spotting the correct answer. Group 1 of the regex holds the answer text.
#[derive(Debug, Clone)]
pub struct AnswerRule {
    pub name: &'static str,
    regex: Regex,
    scope: AnswerScope,
}

impl AnswerRule {
    #[must_use]
    pub fn new(name: &'static str, regex: Regex, scope: AnswerScope) -> Self {
        Self { name, regex, scope }
    }

    pub fn from_pattern(
        name: &'static str,
        pattern: &str,
        scope: AnswerScope,
    ) -> Result<Self, regex::Error> {
        Ok(Self::new(name, Regex::new(pattern)?, scope))
    }

    pub fn try_extract(&self, parts: &BlockParts<'_>) -> Option<Vec<char>> {
        let digits = parts.numbering == OptionNumbering::Digits;
        match self.scope {
            AnswerScope::WholeBlock => self.first_letters(parts.whole, digits),
            AnswerScope::OutsideOptions => self
                .first_letters(parts.stem, digits)
                .or_else(|| self.first_letters(parts.tail, digits)),
            AnswerScope::Highlighted => {
                let mut letters: Vec<char> = Vec::new();
                for caps in self.regex.captures_iter(parts.whole) {
                    let Some(m) = caps.get(1) else { continue };
                    for letter in parse_answer_letters(m.as_str(), digits) {
                        if !letters.contains(&letter) {
                            letters.push(letter);
                        }
                    }
                }
                let option_count = extract_options(parts.options, parts.numbering).len();
                (!letters.is_empty() && letters.len() < option_count.max(2)).then_some(letters)
            }
        }
    }

    fn first_letters(&self, text: &str, accept_digits: bool) -> Option<Vec<char>> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| parse_answer_letters(m.as_str(), accept_digits))
            .find(|letters| !letters.is_empty())
    }
}

/// Answer rules in priority order.
pub fn default_answer_rules() -> Vec<AnswerRule> {
    vec![
        AnswerRule::new("answer_label", ANSWER_LABEL_RE.clone(), AnswerScope::WholeBlock),
        AnswerRule::new("correct_label", CORRECT_LABEL_RE.clone(), AnswerScope::WholeBlock),
        AnswerRule::new("correct_answer", CORRECT_ANSWER_RE.clone(), AnswerScope::WholeBlock),
        AnswerRule::new("bold_letter", BOLD_ANSWER_RE.clone(), AnswerScope::Highlighted),
        AnswerRule::new("parenthesized_letter", PAREN_ANSWER_RE.clone(), AnswerScope::OutsideOptions),
    ]
}

/// Turns one free-text block into a question.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    answer_rules: Vec<AnswerRule>,
    min_stem_chars: usize,
    max_explanation_chars: usize,
    assume_first_option: bool,
}

impl FieldExtractor {
    #[must_use]
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            answer_rules: default_answer_rules(),
            min_stem_chars: config.min_stem_chars,
            max_explanation_chars: config.max_explanation_chars,
            assume_first_option: config.assume_first_option,
        }
    }

    /// Append a rule after the built-in ones.
    #[must_use]
    pub fn with_answer_rule(mut self, rule: AnswerRule) -> Self {
        self.answer_rules.push(rule);
        self
    }

    pub fn answer_rules(&self) -> &[AnswerRule] {
        &self.answer_rules
    }

    pub fn parse_block(&self, block: &str) -> ItemResult<ParsedQuestion> {
        let block = block.trim();
        let parts = BlockParts::split(block);

        let stem = self.checked_stem(parts.stem)?;

        let options = extract_options(parts.options, parts.numbering);
        if options.len() < 2 {
            return Err(ItemError::TooFewOptions(options.len()));
        }

        let mut answers = self.correct_answers(&parts, &options);
        if answers.is_empty() {
            if !self.assume_first_option {
                return Err(ItemError::NoCorrectAnswer);
            }
            tracing::debug!("No answer marker in block, assuming first option");
            answers.push(options[0].id.clone());
        }

        let explanation = self.extract_explanation(parts.whole);

        Ok(ParsedQuestion::new(stem, options, answers).with_explanation(explanation))
    }

    /// Cleaned stem, rejected when empty or shorter than the configured minimum.
    pub fn checked_stem(&self, raw: &str) -> ItemResult<String> {
        let stem = clean_stem(raw);
        let length = stem.chars().count();
        if length == 0 {
            return Err(ItemError::MissingStem);
        }
        if length < self.min_stem_chars {
            return Err(ItemError::StemTooShort {
                length,
                minimum: self.min_stem_chars,
            });
        }
        Ok(stem)
    }

    /// Ids named by the first rule that finds letters present in `options`.
    pub fn correct_answers(&self, parts: &BlockParts<'_>, options: &[QuestionOption]) -> Vec<String> {
        self.answer_rules
            .iter()
            .find_map(|rule| {
                let ids: Vec<String> = rule
                    .try_extract(parts)?
                    .into_iter()
                    .map(String::from)
                    .filter(|id| options.iter().any(|o| &o.id == id))
                    .collect();
                if ids.is_empty() {
                    None
                } else {
                    tracing::trace!(rule = rule.name, answers = ?ids, "Matched answer rule");
                    Some(ids)
                }
            })
            .unwrap_or_default()
    }

    pub fn extract_explanation(&self, text: &str) -> String {
        let Some(body) = EXPLANATION_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
        else {
            return String::new();
        };

        let end = NEXT_ITEM_RE
            .find_iter(body)
            .find(|m| m.start() > 0)
            .map_or(body.len(), |m| m.start());

        truncate_chars(&collapse_whitespace(&body[..end]), self.max_explanation_chars)
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(&ImportConfig::default())
    }
}
