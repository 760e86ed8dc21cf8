use crate::question::{Category, Difficulty, QuestionType};

/// Compact (letters-only, lowercase) synonyms for each canonical category.
///
/// Exact matches are tried first, then the first entry contained in the label,
/// so longer and more specific keys sit ahead of short stems.
const CATEGORY_SYNONYMS: &[(&str, Category)] = &[
    ("managementofcare", Category::ManagementOfCare),
    ("caremanagement", Category::ManagementOfCare),
    ("leadership", Category::ManagementOfCare),
    ("delegation", Category::ManagementOfCare),
    ("prioritization", Category::ManagementOfCare),
    ("safetyandinfectioncontrol", Category::SafetyAndInfectionControl),
    ("infectioncontrol", Category::SafetyAndInfectionControl),
    ("safety", Category::SafetyAndInfectionControl),
    ("healthpromotionandmaintenance", Category::HealthPromotion),
    ("healthpromotion", Category::HealthPromotion),
    ("growthanddevelopment", Category::HealthPromotion),
    ("prevention", Category::HealthPromotion),
    ("psychosocialintegrity", Category::PsychosocialIntegrity),
    ("psychosocial", Category::PsychosocialIntegrity),
    ("mentalhealth", Category::PsychosocialIntegrity),
    ("psychiatric", Category::PsychosocialIntegrity),
    ("basiccareandcomfort", Category::BasicCareAndComfort),
    ("basiccare", Category::BasicCareAndComfort),
    ("comfort", Category::BasicCareAndComfort),
    ("pharmacologicalandparenteraltherapies", Category::Pharmacology),
    ("pharmacologicaltherapies", Category::Pharmacology),
    ("pharmacology", Category::Pharmacology),
    ("medications", Category::Pharmacology),
    ("pharm", Category::Pharmacology),
    ("reductionofriskpotential", Category::RiskReduction),
    ("riskreduction", Category::RiskReduction),
    ("diagnostics", Category::RiskReduction),
    ("physiologicaladaptation", Category::PhysiologicalAdaptation),
    ("pathophysiology", Category::PhysiologicalAdaptation),
    ("medsurg", Category::PhysiologicalAdaptation),
    ("physiology", Category::PhysiologicalAdaptation),
    ("general", Category::General),
];

/// Map a free-form category label onto the canonical set.
///
/// Total: unknown or missing labels become [`Category::General`].
pub fn normalize_category(label: Option<&str>) -> Category {
    let Some(label) = label else {
        return Category::default();
    };

    let compact: String = label
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if compact.is_empty() {
        return Category::default();
    }

    let mut contained = None;
    for &(key, category) in CATEGORY_SYNONYMS {
        if compact == key {
            return category;
        }
        if contained.is_none() && compact.contains(key) {
            contained = Some(category);
        }
    }

    contained.unwrap_or_default()
}

/// Map a free-form difficulty label onto easy/medium/hard.
///
/// Substring rules: easy, low or 1 mean easy; hard, high or 3 mean hard;
/// everything else, including no label, is medium.
pub fn normalize_difficulty(label: Option<&str>) -> Difficulty {
    let Some(label) = label else {
        return Difficulty::default();
    };
    let label = label.to_lowercase();

    if ["easy", "low", "1"].iter().any(|k| label.contains(k)) {
        Difficulty::Easy
    } else if ["hard", "high", "3"].iter().any(|k| label.contains(k)) {
        Difficulty::Hard
    } else {
        Difficulty::Medium
    }
}

/// Question type from an explicit label when one is recognized, otherwise from
/// how many answers are marked correct.
pub fn normalize_question_type(label: Option<&str>, answer_count: usize) -> QuestionType {
    if let Some(label) = label {
        let label = label.to_lowercase();
        if ["multi", "select all", "sata", "checkbox"]
            .iter()
            .any(|k| label.contains(k))
        {
            return QuestionType::MultipleAnswer;
        }
        if label.contains("single") {
            return QuestionType::SingleAnswer;
        }
    }

    if answer_count > 1 {
        QuestionType::MultipleAnswer
    } else {
        QuestionType::SingleAnswer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_synonyms() {
        assert_eq!(
            normalize_category(Some("Pharmacological Therapies")),
            Category::Pharmacology
        );
        assert_eq!(normalize_category(Some("risk reduction")), Category::RiskReduction);
        assert_eq!(
            normalize_category(Some("Reduction of Risk Potential")),
            Category::RiskReduction
        );
        assert_eq!(
            normalize_category(Some("SAFETY & INFECTION-CONTROL")),
            Category::SafetyAndInfectionControl
        );
        assert_eq!(
            normalize_category(Some("care management")),
            Category::ManagementOfCare
        );
    }

    #[test]
    fn test_category_contained_stem() {
        assert_eq!(
            normalize_category(Some("Adult Pharm (Cardiac)")),
            Category::Pharmacology
        );
    }

    #[test]
    fn test_category_defaults() {
        assert_eq!(normalize_category(None), Category::General);
        assert_eq!(normalize_category(Some("")), Category::General);
        assert_eq!(normalize_category(Some("1234 !!")), Category::General);
        assert_eq!(normalize_category(Some("astrophysics")), Category::General);
    }

    #[test]
    fn test_difficulty() {
        assert_eq!(normalize_difficulty(Some("Easy")), Difficulty::Easy);
        assert_eq!(normalize_difficulty(Some("LOW")), Difficulty::Easy);
        assert_eq!(normalize_difficulty(Some("1")), Difficulty::Easy);
        assert_eq!(normalize_difficulty(Some("Hard")), Difficulty::Hard);
        assert_eq!(normalize_difficulty(Some("high")), Difficulty::Hard);
        assert_eq!(normalize_difficulty(Some("3")), Difficulty::Hard);
        assert_eq!(normalize_difficulty(Some("moderate")), Difficulty::Medium);
        assert_eq!(normalize_difficulty(Some("")), Difficulty::Medium);
        assert_eq!(normalize_difficulty(None), Difficulty::Medium);
    }

    #[test]
    fn test_normalizers_are_total() {
        let inputs = ["", " ", "\u{0}", "ümlaut", "🚑", "easy-hard", "3.14", "ПРИВЕТ"];
        for input in inputs {
            assert!(Category::ALL.contains(&normalize_category(Some(input))));
            let difficulty = normalize_difficulty(Some(input));
            assert!(matches!(
                difficulty,
                Difficulty::Easy | Difficulty::Medium | Difficulty::Hard
            ));
        }
    }

    #[test]
    fn test_question_type() {
        assert_eq!(
            normalize_question_type(Some("Multiple Response"), 1),
            QuestionType::MultipleAnswer
        );
        assert_eq!(
            normalize_question_type(Some("SATA"), 1),
            QuestionType::MultipleAnswer
        );
        assert_eq!(
            normalize_question_type(Some("single"), 3),
            QuestionType::SingleAnswer
        );
        assert_eq!(normalize_question_type(None, 2), QuestionType::MultipleAnswer);
        assert_eq!(normalize_question_type(Some("mcq"), 1), QuestionType::SingleAnswer);
    }
}
