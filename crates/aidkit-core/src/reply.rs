//! Best-effort parsing of free-text oracle replies.
//!
//! Suggestion replies follow the grammar the preparedness prompt asks for:
//!
//! ```text
//! - Name | Reason: ... | Caution: ...
//! - Name | Reason: ... | Caution: ...
//! Reason: overall sentence
//! ```
//!
//! Step replies are plain lines of short imperative sentences. Neither parser
//! fails: anything unexpected falls back to fixed boilerplate.

use crate::types::PrepItem;

pub const DEFAULT_ITEM_REASON: &str = "Recommended based on your household profile.";
pub const DEFAULT_ITEM_CAUTION: &str = "Follow label directions and consult a pharmacist if unsure.";
pub const DEFAULT_PREP_REASON: &str = "Recommended based on your family profile and notes.";

const LIST_MARKER: char = '-';
const REASON_LABEL: &str = "reason:";
const CAUTION_LABEL: &str = "caution:";
const SENTENCE_END: [char; 3] = ['.', '!', '?'];

/// Items and overall reason recovered from a suggestion-list reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionReply {
    pub items: Vec<PrepItem>,
    pub reason: String,
}

pub fn parse_suggestions(raw: &str) -> SuggestionReply {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let items = lines
        .iter()
        .filter(|line| line.starts_with(LIST_MARKER))
        .filter_map(|line| parse_suggestion_line(line))
        .collect();

    let reason = lines
        .iter()
        .find_map(|line| strip_label(line, REASON_LABEL))
        .filter(|reason| !reason.is_empty())
        .unwrap_or(DEFAULT_PREP_REASON)
        .to_string();

    SuggestionReply { items, reason }
}

/// Parse one `- Name | Reason: ... | Caution: ...` line.
pub fn parse_suggestion_line(line: &str) -> Option<PrepItem> {
    let line = line.trim();
    let cleaned = line.strip_prefix(LIST_MARKER).unwrap_or(line).trim();
    if cleaned.is_empty() {
        return None;
    }

    let parts: Vec<&str> = cleaned.split('|').map(str::trim).collect();
    let name = parts
        .first()
        .copied()
        .filter(|name| !name.is_empty())
        .unwrap_or(cleaned);
    let reason = parts
        .iter()
        .find_map(|part| strip_label(part, REASON_LABEL))
        .unwrap_or(DEFAULT_ITEM_REASON);
    let caution = parts
        .iter()
        .find_map(|part| strip_label(part, CAUTION_LABEL))
        .unwrap_or(DEFAULT_ITEM_CAUTION);

    Some(PrepItem {
        name: name.to_string(),
        reason: reason.to_string(),
        caution: caution.to_string(),
    })
}

/// Case-insensitive `label` prefix removal; returns the trimmed remainder.
fn strip_label<'a>(value: &'a str, label: &str) -> Option<&'a str> {
    let head = value.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    Some(value[label.len()..].trim())
}

/// Split a reply into spoken steps: one per sentence, in order.
///
/// Sentences end at `.`, `!` or `?`, which stay attached. A line made only of
/// terminators is kept whole. If nothing survives, the original text is the
/// only step.
pub fn split_steps(text: &str) -> Vec<String> {
    let mut steps = Vec::new();

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sentences = split_sentences(line);
        if sentences.is_empty() {
            steps.push(line.to_string());
            continue;
        }
        steps.extend(
            sentences
                .into_iter()
                .map(|sentence| sentence.trim().to_string())
                .filter(|sentence| !sentence.is_empty()),
        );
    }

    if steps.is_empty() {
        return vec![text.to_string()];
    }
    steps
}

/// Runs of non-terminator characters, each followed by at most one terminator.
/// Terminators with no preceding text are dropped.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in line.char_indices() {
        if SENTENCE_END.contains(&ch) {
            if let Some(begin) = start.take() {
                sentences.push(&line[begin..idx + ch.len_utf8()]);
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(begin) = start {
        sentences.push(&line[begin..]);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_ITEM_CAUTION, DEFAULT_ITEM_REASON, DEFAULT_PREP_REASON, parse_suggestion_line,
        parse_suggestions, split_steps,
    };

    #[test]
    fn parses_item_and_overall_reason() {
        let raw = "- Acetaminophen | Reason: for fever | Caution: do not exceed 4g/day\nReason: Overall, add these for flu season.";
        let reply = parse_suggestions(raw);
        assert_eq!(reply.items.len(), 1);
        let item = &reply.items[0];
        assert_eq!(item.name, "Acetaminophen");
        assert_eq!(item.reason, "for fever");
        assert_eq!(item.caution, "do not exceed 4g/day");
        assert_eq!(reply.reason, "Overall, add these for flu season.");
    }

    #[test]
    fn missing_fields_get_boilerplate() {
        let reply = parse_suggestions("Here you go:\n-   Oral rehydration salts\n\n");
        assert_eq!(reply.items.len(), 1);
        assert_eq!(reply.items[0].name, "Oral rehydration salts");
        assert_eq!(reply.items[0].reason, DEFAULT_ITEM_REASON);
        assert_eq!(reply.items[0].caution, DEFAULT_ITEM_CAUTION);
        assert_eq!(reply.reason, DEFAULT_PREP_REASON);
    }

    #[test]
    fn labels_are_case_insensitive_and_order_free() {
        let item =
            parse_suggestion_line("- Loratadine | CAUTION: may cause drowsiness | reason:allergies")
                .unwrap();
        assert_eq!(item.reason, "allergies");
        assert_eq!(item.caution, "may cause drowsiness");
    }

    #[test]
    fn bare_marker_lines_are_skipped() {
        let reply = parse_suggestions("-\n- \n- Saline | Reason: rinse");
        assert_eq!(reply.items.len(), 1);
        assert_eq!(reply.items[0].name, "Saline");
    }

    #[test]
    fn unstructured_reply_yields_no_items() {
        let reply = parse_suggestions("I cannot help with that.");
        assert!(reply.items.is_empty());
        assert_eq!(reply.reason, DEFAULT_PREP_REASON);
    }

    #[test]
    fn empty_overall_reason_uses_default() {
        let reply = parse_suggestions("- Zinc lozenges\nReason:   ");
        assert_eq!(reply.reason, DEFAULT_PREP_REASON);
    }

    #[test]
    fn splits_steps_by_line_and_sentence() {
        let steps = split_steps("Call emergency services. Apply pressure to the wound.\nStay calm.");
        assert_eq!(
            steps,
            vec![
                "Call emergency services.",
                "Apply pressure to the wound.",
                "Stay calm."
            ]
        );
    }

    #[test]
    fn keeps_unterminated_tail_and_question() {
        let steps = split_steps("Check breathing!\n\n\nIs the person awake?  Keep them warm");
        assert_eq!(
            steps,
            vec!["Check breathing!", "Is the person awake?", "Keep them warm"]
        );
    }

    #[test]
    fn repeated_terminators_collapse() {
        assert_eq!(split_steps("Wait!! Now."), vec!["Wait!", "Now."]);
        assert_eq!(split_steps("..."), vec!["..."]);
    }

    #[test]
    fn blank_text_is_a_single_step() {
        assert_eq!(split_steps("  \n "), vec!["  \n "]);
    }
}
