//! Offline suggestion list used when the oracle is unavailable.

struct RuleGroup {
    keywords: &'static [&'static str],
    suggestions: &'static [&'static str],
}

const RULE_GROUPS: [RuleGroup; 2] = [
    RuleGroup {
        keywords: &["baby", "infant", "toddler", "child", "kid", "kids"],
        suggestions: &[
            "Children's fever/pain relief (age-appropriate dosing) for 1-2 courses.",
            "Children's cold medicine and fever patches in suitable quantities.",
            "Kids' thermometer, bandages, and antiseptic on hand.",
        ],
    },
    RuleGroup {
        keywords: &["pregnant", "pregnancy"],
        suggestions: &[
            "Keep a list of pregnancy-safe medications.",
            "Check prenatal vitamins and iron supplement stock.",
            "Prepare clinic contacts and insurance cards.",
        ],
    },
];

const BASE_SUGGESTIONS: [&str; 6] = [
    "Adult fever/pain relief for 2-3 doses per person.",
    "Basic digestive set: antacid, anti-diarrheal, and anti-nausea.",
    "Cold/flu medicine: 1-2 boxes for adults.",
    "Allergy medicine (antihistamine) 1 box.",
    "Restock antiseptic, bandages, and gauze.",
    "Thermometer (1), hand sanitizer, and wound ointment.",
];

pub fn base_suggestions() -> &'static [&'static str] {
    &BASE_SUGGESTIONS
}

/// Keyword-matched suggestions for a free-text household context.
///
/// The first matching rule group is prepended to the base list.
pub fn suggest(context: &str) -> Vec<String> {
    let normalized = context.to_lowercase();
    let matched = RULE_GROUPS.iter().find(|group| {
        group
            .keywords
            .iter()
            .any(|keyword| normalized.contains(keyword))
    });

    matched
        .map(|group| group.suggestions)
        .unwrap_or_default()
        .iter()
        .chain(BASE_SUGGESTIONS.iter())
        .map(|item| item.to_string())
        .collect()
}
