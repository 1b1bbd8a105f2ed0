use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed recommendation categories. Free-text labels from the model are
/// folded onto these via [`RecommendationCategory::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Diet,
    Exercise,
    Lifestyle,
    Medication,
    Monitoring,
    General,
}

impl RecommendationCategory {
    pub const ALL: [RecommendationCategory; 6] = [
        RecommendationCategory::Diet,
        RecommendationCategory::Exercise,
        RecommendationCategory::Lifestyle,
        RecommendationCategory::Medication,
        RecommendationCategory::Monitoring,
        RecommendationCategory::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationCategory::Diet => "diet",
            RecommendationCategory::Exercise => "exercise",
            RecommendationCategory::Lifestyle => "lifestyle",
            RecommendationCategory::Medication => "medication",
            RecommendationCategory::Monitoring => "monitoring",
            RecommendationCategory::General => "general",
        }
    }

    /// Display label used in notification messages.
    pub fn label(self) -> &'static str {
        match self {
            RecommendationCategory::Diet => "Diet",
            RecommendationCategory::Exercise => "Exercise",
            RecommendationCategory::Lifestyle => "Lifestyle",
            RecommendationCategory::Medication => "Medication",
            RecommendationCategory::Monitoring => "Monitoring",
            RecommendationCategory::General => "General",
        }
    }

    /// Lenient read of a stored value. Unknown values fall back to `General`.
    pub fn from_db_value(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .unwrap_or(RecommendationCategory::General)
    }

    /// Map a free-text category label onto the fixed enumeration.
    ///
    /// Total: unknown or empty input yields `General`, never an error.
    /// Exact synonyms are tried first, then whole-word phrase containment
    /// so labels like "Nutrition & Hydration" still land on `Diet`.
    pub fn normalize(raw: &str) -> Self {
        let normalized = normalize_label(raw);
        if normalized.is_empty() {
            return RecommendationCategory::General;
        }

        if let Some((_, category)) = SYNONYMS.iter().find(|(label, _)| *label == normalized) {
            return *category;
        }

        let padded = format!(" {normalized} ");
        SYNONYMS
            .iter()
            .find(|(label, _)| padded.contains(&format!(" {label} ")))
            .map(|(_, category)| *category)
            .unwrap_or(RecommendationCategory::General)
    }
}

impl std::fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, turn separators into spaces and collapse whitespace.
fn normalize_label(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// Order matters for phrase containment: more specific phrases come first.
const SYNONYMS: &[(&str, RecommendationCategory)] = &[
    ("diet", RecommendationCategory::Diet),
    ("dietary", RecommendationCategory::Diet),
    ("nutrition", RecommendationCategory::Diet),
    ("nutritional", RecommendationCategory::Diet),
    ("food", RecommendationCategory::Diet),
    ("eating", RecommendationCategory::Diet),
    ("meal", RecommendationCategory::Diet),
    ("meals", RecommendationCategory::Diet),
    ("hydration", RecommendationCategory::Diet),
    ("weight management", RecommendationCategory::Diet),
    ("exercise", RecommendationCategory::Exercise),
    ("physical activity", RecommendationCategory::Exercise),
    ("activity", RecommendationCategory::Exercise),
    ("fitness", RecommendationCategory::Exercise),
    ("workout", RecommendationCategory::Exercise),
    ("training", RecommendationCategory::Exercise),
    ("movement", RecommendationCategory::Exercise),
    ("cardio", RecommendationCategory::Exercise),
    ("strength", RecommendationCategory::Exercise),
    ("medication", RecommendationCategory::Medication),
    ("medications", RecommendationCategory::Medication),
    ("medicine", RecommendationCategory::Medication),
    ("prescription", RecommendationCategory::Medication),
    ("drug", RecommendationCategory::Medication),
    ("drugs", RecommendationCategory::Medication),
    ("supplement", RecommendationCategory::Medication),
    ("supplements", RecommendationCategory::Medication),
    ("treatment", RecommendationCategory::Medication),
    ("monitoring", RecommendationCategory::Monitoring),
    ("preventive care", RecommendationCategory::Monitoring),
    ("preventative care", RecommendationCategory::Monitoring),
    ("cardiovascular health", RecommendationCategory::Monitoring),
    ("heart health", RecommendationCategory::Monitoring),
    ("blood pressure", RecommendationCategory::Monitoring),
    ("screening", RecommendationCategory::Monitoring),
    ("checkup", RecommendationCategory::Monitoring),
    ("check up", RecommendationCategory::Monitoring),
    ("follow up", RecommendationCategory::Monitoring),
    ("tracking", RecommendationCategory::Monitoring),
    ("testing", RecommendationCategory::Monitoring),
    ("lifestyle", RecommendationCategory::Lifestyle),
    ("sleep", RecommendationCategory::Lifestyle),
    ("stress", RecommendationCategory::Lifestyle),
    ("stress management", RecommendationCategory::Lifestyle),
    ("mental health", RecommendationCategory::Lifestyle),
    ("wellbeing", RecommendationCategory::Lifestyle),
    ("well being", RecommendationCategory::Lifestyle),
    ("wellness", RecommendationCategory::Lifestyle),
    ("habits", RecommendationCategory::Lifestyle),
    ("smoking", RecommendationCategory::Lifestyle),
    ("smoking cessation", RecommendationCategory::Lifestyle),
    ("alcohol", RecommendationCategory::Lifestyle),
    ("general", RecommendationCategory::General),
    ("other", RecommendationCategory::General),
];

#[cfg(test)]
mod tests {
    use super::RecommendationCategory;

    #[test]
    fn canonical_values_map_to_themselves() {
        for category in RecommendationCategory::ALL {
            assert_eq!(RecommendationCategory::normalize(category.as_str()), category);
        }
    }

    #[test]
    fn model_synonyms_are_folded_case_insensitively() {
        assert_eq!(
            RecommendationCategory::normalize("Nutrition"),
            RecommendationCategory::Diet
        );
        assert_eq!(
            RecommendationCategory::normalize("PHYSICAL ACTIVITY"),
            RecommendationCategory::Exercise
        );
        assert_eq!(
            RecommendationCategory::normalize("fitness"),
            RecommendationCategory::Exercise
        );
        assert_eq!(
            RecommendationCategory::normalize("Preventive Care"),
            RecommendationCategory::Monitoring
        );
        assert_eq!(
            RecommendationCategory::normalize("Cardiovascular Health"),
            RecommendationCategory::Monitoring
        );
        assert_eq!(
            RecommendationCategory::normalize("sleep_hygiene"),
            RecommendationCategory::Lifestyle
        );
    }

    #[test]
    fn compound_labels_match_on_whole_words() {
        assert_eq!(
            RecommendationCategory::normalize("Nutrition & Hydration"),
            RecommendationCategory::Diet
        );
        assert_eq!(
            RecommendationCategory::normalize("  blood-pressure   monitoring "),
            RecommendationCategory::Monitoring
        );
    }

    #[test]
    fn unknown_and_empty_labels_fall_back_to_general() {
        assert_eq!(
            RecommendationCategory::normalize("underwater basket weaving"),
            RecommendationCategory::General
        );
        assert_eq!(
            RecommendationCategory::normalize(""),
            RecommendationCategory::General
        );
        assert_eq!(
            RecommendationCategory::normalize("   ---  "),
            RecommendationCategory::General
        );
    }

    #[test]
    fn normalization_is_total_over_arbitrary_input() {
        let inputs = [
            "underwater basket weaving",
            "🚴",
            "Diet/Exercise",
            "dietitian",
            "x",
            "monitor",
        ];
        for input in inputs {
            let category = RecommendationCategory::normalize(input);
            assert!(RecommendationCategory::ALL.contains(&category));
            assert_ne!(category.as_str(), input);
        }
    }

    #[test]
    fn from_db_value_is_lenient() {
        assert_eq!(
            RecommendationCategory::from_db_value("exercise"),
            RecommendationCategory::Exercise
        );
        assert_eq!(
            RecommendationCategory::from_db_value("bogus"),
            RecommendationCategory::General
        );
    }
}
