use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::extractor::{
    extract_options, option_letter, parse_answer_letters, BlockParts, Candidates, FieldExtractor,
    ItemError, ItemResult, OptionNumbering,
};
use super::normalizer::{normalize_category, normalize_difficulty, normalize_question_type};
use super::text::{collapse_whitespace, normalize_text, truncate_chars};
use crate::question::{ParsedQuestion, QuestionOption};

/// Minimum normalized Levenshtein similarity for an answer cell to name an option by its text.
const TEXT_MATCH_THRESHOLD: f64 = 0.9;
const MAX_LIST_OPTIONS: usize = 6;
/// Longer cells are data, not column labels.
const MAX_HEADER_CHARS: usize = 40;

static OPTION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:option|choice|opt)?[\s_\-]*\(?([a-f1-6])\)?(?:[\s_\-]*text)?$").unwrap()
});

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?([A-Fa-f])\s*[.):]\s*").unwrap());

// "#", "No.", "Question #", "question_id", "Q Num", "item number"
static NUMBERING_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:question|item|q)?[\s_\-]*(?:#|no\.?|num|number|id)$").unwrap()
});

const IGNORED_HEADERS: &[&str] = &["item", "qid", "serial"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Ignored,
    QuestionType,
    Category,
    Difficulty,
    Explanation,
    Answer,
    Option(char),
    OptionsList,
    Stem,
}

/// Role of a header cell. Specific roles are tested before the stem role so
/// `question_type` or `question_id` never become the stem column.
pub fn classify_header(name: &str) -> Option<ColumnRole> {
    let name = name.trim().to_lowercase();
    if name.is_empty() || name.chars().count() > MAX_HEADER_CHARS || name.contains([':', '?']) {
        return None;
    }

    let has = |keys: &[&str]| keys.iter().any(|k| name.contains(k));

    let role = if IGNORED_HEADERS.contains(&name.as_str())
        || NUMBERING_HEADER_RE.is_match(&name)
        || name.ends_with("_id")
    {
        ColumnRole::Ignored
    } else if has(&["type"]) {
        ColumnRole::QuestionType
    } else if has(&["category", "topic"]) {
        ColumnRole::Category
    } else if has(&["difficulty", "level"]) {
        ColumnRole::Difficulty
    } else if has(&["explanation", "rationale"]) {
        ColumnRole::Explanation
    } else if has(&["answer", "correct"]) {
        ColumnRole::Answer
    } else if let Some(letter) = OPTION_HEADER_RE
        .captures(&name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .and_then(|c| option_letter(c, true))
    {
        ColumnRole::Option(letter)
    } else if has(&["option", "choice"]) {
        ColumnRole::OptionsList
    } else if has(&["question", "text", "stem", "prompt"]) {
        ColumnRole::Stem
    } else {
        return None;
    };

    Some(role)
}

/// Column indexes by role, first column wins for each role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub stem: Option<usize>,
    pub options: BTreeMap<char, usize>,
    pub options_list: Option<usize>,
    pub answer: Option<usize>,
    pub explanation: Option<usize>,
    pub category: Option<usize>,
    pub difficulty: Option<usize>,
    pub question_type: Option<usize>,
}

impl ColumnRoles {
    pub fn infer(header: &[String]) -> Self {
        let mut roles = Self::default();
        for (idx, name) in header.iter().enumerate() {
            let slot = match classify_header(name) {
                Some(ColumnRole::Stem) => &mut roles.stem,
                Some(ColumnRole::OptionsList) => &mut roles.options_list,
                Some(ColumnRole::Answer) => &mut roles.answer,
                Some(ColumnRole::Explanation) => &mut roles.explanation,
                Some(ColumnRole::Category) => &mut roles.category,
                Some(ColumnRole::Difficulty) => &mut roles.difficulty,
                Some(ColumnRole::QuestionType) => &mut roles.question_type,
                Some(ColumnRole::Option(letter)) => {
                    roles.options.entry(letter).or_insert(idx);
                    continue;
                }
                Some(ColumnRole::Ignored) | None => continue,
            };
            slot.get_or_insert(idx);
        }
        roles
    }

    /// Whether the row these roles came from looks like a header at all.
    pub fn is_header(&self) -> bool {
        self.stem.is_some()
            || self.answer.is_some()
            || self.options_list.is_some()
            || self.options.len() >= 2
    }
}

/// Maps grid rows onto questions, the first non-blank row being the header.
pub struct TabularParser<'a> {
    extractor: &'a FieldExtractor,
    max_explanation_chars: usize,
}

impl<'a> TabularParser<'a> {
    pub fn new(extractor: &'a FieldExtractor, max_explanation_chars: usize) -> Self {
        Self {
            extractor,
            max_explanation_chars,
        }
    }

    pub fn parse(&self, rows: &[Vec<String>]) -> Candidates {
        let mut candidates = Candidates::default();

        let Some(header_idx) = rows.iter().position(|row| !is_blank(row)) else {
            return candidates;
        };

        let roles = ColumnRoles::infer(&rows[header_idx]);
        if roles.is_header() {
            tracing::debug!("Inferred column roles: {:?}", roles);
            for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
                if !is_blank(row) {
                    candidates.record("Row", idx + 1, self.parse_row(row, &roles));
                }
            }
        } else {
            tracing::debug!("No header row detected, parsing each row as a text block");
            for (idx, row) in rows.iter().enumerate().skip(header_idx) {
                if !is_blank(row) {
                    candidates.record("Row", idx + 1, self.parse_row_as_block(row));
                }
            }
        }

        candidates
    }

    pub fn parse_row(&self, row: &[String], roles: &ColumnRoles) -> ItemResult<ParsedQuestion> {
        let stem_column = roles.stem.ok_or(ItemError::MissingStemColumn)?;
        let stem_cell = cell(row, Some(stem_column)).ok_or(ItemError::MissingStem)?;
        let parts = BlockParts::split(stem_cell);

        let direct_options = self.direct_options(row, roles);
        let (stem, options) = if direct_options.is_empty() {
            let stem = self.extractor.checked_stem(parts.stem)?;
            (stem, extract_options(parts.options, parts.numbering))
        } else {
            (self.extractor.checked_stem(stem_cell)?, direct_options)
        };
        if options.len() < 2 {
            return Err(ItemError::TooFewOptions(options.len()));
        }

        let answers = match cell(row, roles.answer) {
            Some(answer_cell) => parse_answer_cell(answer_cell, &options),
            None => self.extractor.correct_answers(&parts, &options),
        };
        if answers.is_empty() {
            return Err(ItemError::NoCorrectAnswer);
        }

        let explanation = match cell(row, roles.explanation) {
            Some(text) => truncate_chars(&collapse_whitespace(text), self.max_explanation_chars),
            None => self.extractor.extract_explanation(stem_cell),
        };

        let question_type = normalize_question_type(cell(row, roles.question_type), answers.len());

        Ok(ParsedQuestion::new(stem, options, answers)
            .with_explanation(explanation)
            .with_category(normalize_category(cell(row, roles.category)))
            .with_difficulty(normalize_difficulty(cell(row, roles.difficulty)))
            .with_question_type(question_type))
    }

    fn parse_row_as_block(&self, row: &[String]) -> ItemResult<ParsedQuestion> {
        let block = row
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.extractor.parse_block(&block)
    }

    fn direct_options(&self, row: &[String], roles: &ColumnRoles) -> Vec<QuestionOption> {
        if roles.options.len() >= 2 {
            return roles
                .options
                .iter()
                .filter_map(|(&letter, &col)| {
                    cell(row, Some(col)).map(|text| QuestionOption::new(letter, collapse_whitespace(text)))
                })
                .collect();
        }
        cell(row, roles.options_list).map_or_else(Vec::new, parse_option_list)
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

fn cell(row: &[String], col: Option<usize>) -> Option<&str> {
    let value = row.get(col?)?.trim();
    (!value.is_empty()).then_some(value)
}

/// Options packed into one cell: `"A:3|B:4|C:5"`, one per line, or `;`-separated.
///
/// Marked parts keep their letter; unmarked parts take the letter of their position.
pub fn parse_option_list(cell: &str) -> Vec<QuestionOption> {
    let separator = ['|', '\n', ';'].into_iter().find(|&sep| cell.contains(sep));
    let Some(separator) = separator else {
        let inline = extract_options(cell, OptionNumbering::Letters);
        if inline.is_empty() {
            // A lone option such as "A:Gallbladder"
            return list_options([cell.trim()]);
        }
        return inline;
    };

    list_options(cell.split(separator).map(str::trim).filter(|p| !p.is_empty()))
}

fn list_options<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<QuestionOption> {
    let mut options: BTreeMap<char, String> = BTreeMap::new();

    for (position, part) in parts.into_iter().enumerate() {
        let (letter, text) = match LIST_MARKER_RE.captures(part) {
            Some(caps) => {
                let marker = caps.get(1).and_then(|m| m.as_str().chars().next());
                let rest = caps.get(0).map_or(part, |m| &part[m.end()..]);
                (marker.and_then(|c| option_letter(c, false)), rest)
            }
            None if position < MAX_LIST_OPTIONS => {
                let offset = u8::try_from(position).unwrap_or(u8::MAX);
                (Some(char::from(b'A'.saturating_add(offset))), part)
            }
            None => (None, part),
        };

        let text = collapse_whitespace(text);
        if let Some(letter) = letter {
            if !text.is_empty() {
                options.entry(letter).or_insert(text);
            }
        }
    }

    options
        .into_iter()
        .map(|(letter, text)| QuestionOption::new(letter, text))
        .collect()
}

/// Option ids named by an answer cell.
///
/// Tries, in order: exact option text, letters or option numbers, then option
/// text by Levenshtein similarity.
pub fn parse_answer_cell(raw: &str, options: &[QuestionOption]) -> Vec<String> {
    let exact = match_option_text(raw, options, false);
    if !exact.is_empty() {
        return exact;
    }

    let letters: Vec<String> = parse_answer_letters(raw, true)
        .into_iter()
        .map(String::from)
        .filter(|id| options.iter().any(|o| &o.id == id))
        .collect();
    if !letters.is_empty() {
        return letters;
    }

    match_option_text(raw, options, true)
}

fn match_option_text(raw: &str, options: &[QuestionOption], fuzzy: bool) -> Vec<String> {
    let wanted: Vec<String> = raw
        .split(['|', ';', '\n'])
        .map(normalize_text)
        .filter(|p| !p.is_empty())
        .collect();

    let mut ids: Vec<String> = Vec::new();
    for part in &wanted {
        let Some(id) = find_option_by_text(part, options, fuzzy) else {
            return Vec::new();
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn find_option_by_text(wanted: &str, options: &[QuestionOption], fuzzy: bool) -> Option<String> {
    let normalized: Vec<(String, &QuestionOption)> = options
        .iter()
        .map(|o| (normalize_text(&o.text), o))
        .collect();

    if let Some((_, option)) = normalized.iter().find(|(text, _)| text == wanted) {
        return Some(option.id.clone());
    }
    if !fuzzy {
        return None;
    }

    normalized
        .iter()
        .map(|(text, option)| (strsim::normalized_levenshtein(text, wanted), *option))
        .filter(|(score, _)| *score >= TEXT_MATCH_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, option)| option.id.clone())
}
