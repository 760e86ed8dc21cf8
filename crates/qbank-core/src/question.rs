use serde::{Deserialize, Serialize};

/// Highest option letter a question may carry.
pub const MAX_OPTION_LETTER: char = 'F';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ManagementOfCare,
    SafetyAndInfectionControl,
    HealthPromotion,
    PsychosocialIntegrity,
    BasicCareAndComfort,
    Pharmacology,
    RiskReduction,
    PhysiologicalAdaptation,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Self; 9] = [
        Self::ManagementOfCare,
        Self::SafetyAndInfectionControl,
        Self::HealthPromotion,
        Self::PsychosocialIntegrity,
        Self::BasicCareAndComfort,
        Self::Pharmacology,
        Self::RiskReduction,
        Self::PhysiologicalAdaptation,
        Self::General,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagementOfCare => "management_of_care",
            Self::SafetyAndInfectionControl => "safety_and_infection_control",
            Self::HealthPromotion => "health_promotion",
            Self::PsychosocialIntegrity => "psychosocial_integrity",
            Self::BasicCareAndComfort => "basic_care_and_comfort",
            Self::Pharmacology => "pharmacology",
            Self::RiskReduction => "risk_reduction",
            Self::PhysiologicalAdaptation => "physiological_adaptation",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(crate::Error::InvalidDifficulty(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    SingleAnswer,
    MultipleAnswer,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleAnswer => "single_answer",
            Self::MultipleAnswer => "multiple_answer",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_answer" => Ok(Self::SingleAnswer),
            "multiple_answer" => Ok(Self::MultipleAnswer),
            _ => Err(crate::Error::InvalidQuestionType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(letter: char, text: impl Into<String>) -> Self {
        Self {
            id: letter.to_ascii_uppercase().to_string(),
            text: text.into(),
        }
    }
}

/// A single multiple-choice question recovered from an uploaded document.
///
/// Built fresh for every pipeline run and never mutated once it has been placed
/// in a [`ParseResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuestion {
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ParsedQuestion {
    #[must_use]
    pub fn new(text: String, options: Vec<QuestionOption>, correct_answers: Vec<String>) -> Self {
        let question_type = if correct_answers.len() > 1 {
            QuestionType::MultipleAnswer
        } else {
            QuestionType::SingleAnswer
        };

        Self {
            text,
            options,
            correct_answers,
            explanation: String::new(),
            category: Category::default(),
            difficulty: Difficulty::default(),
            question_type,
            source: None,
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: String) -> Self {
        self.explanation = explanation;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_question_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = question_type;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: String) -> Self {
        self.source = Some(source);
        self
    }

    pub fn has_option(&self, id: &str) -> bool {
        self.options.iter().any(|o| o.id == id)
    }

    /// At least two options and at least one correct answer, all referencing real options.
    pub fn is_valid(&self) -> bool {
        self.options.len() >= 2
            && !self.correct_answers.is_empty()
            && self.correct_answers.iter().all(|id| self.has_option(id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub questions: Vec<ParsedQuestion>,
    pub total_found: usize,
    pub duplicates_removed: usize,
    pub errors: Vec<String>,
}

impl ParseResult {
    #[must_use]
    pub fn new(questions: Vec<ParsedQuestion>, duplicates_removed: usize, errors: Vec<String>) -> Self {
        Self {
            total_found: questions.len(),
            questions,
            duplicates_removed,
            errors,
        }
    }

    /// A result carrying no questions and one document-level error.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::new(Vec::new(), 0, vec![error.into()])
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}
