use crate::types::FamilyMember;

pub const PREP_PROMPT: &str = "You recommend household first-aid and medicine prep. Use the family profile, including ages, to tailor suggestions. Only suggest additional items beyond the default list. Use widely known medication names (generic plus common brand in parentheses when helpful). Each item must include a very detailed reason and a very detailed caution (6-8 full sentences each), with specific intended use, age considerations, dosing approach at a high level, typical scenarios, and key safety warnings or contraindications. Do not include treatment steps, manuals, or documents. End with one sentence starting with 'Reason:'. Reply in English. Output format: each item starts with '- ' and uses 'Name | Reason: ... | Caution: ...'. The final line starts with 'Reason: ...'.";

pub const CONVERSATION_PROMPT: &str = "You are an emergency response assistant. Respond calmly and concisely, prioritizing immediate safe actions. Reply in natural English.";

pub const CONVERSATION_OFFER_STEPS_PROMPT: &str = "You are an emergency response assistant. Respond calmly and concisely, prioritizing immediate safe actions. Do not list step-by-step instructions. End with one sentence: \"If you need step-by-step guidance, say so.\"";

pub const STEPS_PROMPT: &str = "You are an emergency response assistant. Respond calmly and concisely, prioritizing immediate safe actions. Provide 3-5 short steps, each one sentence (~20 words). Separate steps with new lines and do not number them. Ask only one brief follow-up question if truly needed. Reply in English.";

/// Reply used when the oracle returns nothing for a preparedness request.
pub const EMPTY_PREP_REPLY: &str = "Please prepare a basic household first-aid kit.";
/// Reply used when the oracle returns nothing for a voice request.
pub const EMPTY_VOICE_REPLY: &str = "Please briefly describe what is happening.";

/// Condition tags offered by the family profile form.
pub const HEALTH_CONDITIONS: [&str; 7] = [
    "Diabetes",
    "High blood pressure",
    "Low blood pressure",
    "Atopy",
    "Allergy",
    "Asthma",
    "Heart disease",
];

/// Prompt for an answer to the follow-up question that closed a step sequence.
pub fn follow_up(question: &str, answer: &str) -> String {
    format!("Follow-up to: \"{question}\" User answer: {answer}")
}

/// Context string sent with a preparedness request.
///
/// `Family size: N | <member> / <member> | <notes>`, with empty parts left out.
pub fn family_context(family_count: u32, members: &[FamilyMember], notes: &str) -> String {
    let summary = members
        .iter()
        .take(family_count as usize)
        .enumerate()
        .map(|(index, member)| describe_member(index, member))
        .collect::<Vec<_>>()
        .join(" / ");

    [format!("Family size: {family_count}"), summary, notes.to_string()]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn describe_member(index: usize, member: &FamilyMember) -> String {
    let label = if index == 0 {
        "User".to_string()
    } else {
        format!("Family {index}")
    };
    let name = match member.name.trim() {
        "" => "Unnamed",
        name => name,
    };

    let mut conditions: Vec<&str> = Vec::new();
    for condition in &member.conditions {
        let condition = condition.trim();
        if !condition.is_empty() && !conditions.contains(&condition) {
            conditions.push(condition);
        }
    }
    let conditions = if conditions.is_empty() {
        "Conditions: None".to_string()
    } else {
        format!("Conditions: {}", conditions.join(", "))
    };
    let notes = match member.notes.trim() {
        "" => "Notes: None".to_string(),
        notes => format!("Notes: {notes}"),
    };

    format!(
        "{label}: {name}, {}, {} years, {conditions}, {notes}",
        member.sex.label(),
        member.age
    )
}

#[cfg(test)]
mod tests {
    use super::{family_context, follow_up};
    use crate::types::{FamilyMember, Sex};

    fn member(name: &str, sex: Sex, age: u32) -> FamilyMember {
        FamilyMember {
            name: name.to_string(),
            sex,
            age,
            ..FamilyMember::default()
        }
    }

    #[test]
    fn follow_up_quotes_the_question() {
        assert_eq!(
            follow_up("Is the person breathing?", "yes"),
            "Follow-up to: \"Is the person breathing?\" User answer: yes"
        );
    }

    #[test]
    fn family_context_describes_each_member() {
        let mut parent = member("Dana", Sex::Female, 38);
        parent.conditions = vec!["Asthma".to_string(), "Asthma".to_string(), "Allergy".to_string()];
        let mut child = member("", Sex::Unspecified, 2);
        child.notes = "toddler, peanut allergy".to_string();

        let context = family_context(2, &[parent, child], "");
        assert_eq!(
            context,
            "Family size: 2 | User: Dana, Female, 38 years, Conditions: Asthma, Allergy, Notes: None / Family 1: Unnamed, Unspecified, 2 years, Conditions: None, Notes: toddler, peanut allergy"
        );
    }

    #[test]
    fn family_context_limits_members_and_appends_notes() {
        let members = vec![member("A", Sex::Male, 40), member("B", Sex::Female, 39)];
        let context = family_context(1, &members, "camping trip");
        assert!(context.starts_with("Family size: 1 | User: A, Male, 40 years"));
        assert!(!context.contains("Family 1"));
        assert!(context.ends_with(" | camping trip"));
    }

    #[test]
    fn family_context_without_members() {
        assert_eq!(family_context(3, &[], "  "), "Family size: 3");
    }
}
