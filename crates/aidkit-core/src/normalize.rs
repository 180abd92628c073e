use crate::types::PrepItem;
use std::collections::HashSet;

/// Unit words that may sit between a trailing count and the end of an item string.
const UNIT_WORDS: [&str; 12] = [
    "bottles", "bottle", "packs", "pack", "boxes", "box", "tubes", "tube", "rolls", "roll", "pcs",
    "pc",
];

/// An item string split into its bare name and trailing count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuantity {
    pub name: String,
    pub count: Option<u32>,
}

/// Canonical comparison key: no whitespace or parentheses, lower case, ice/cold pack merged.
pub fn normalize_key(name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '(' && *ch != ')')
        .collect::<String>()
        .to_lowercase();
    compact.replace("coldpack", "icepack")
}

/// Split a trailing count (and optional unit word) off an item string.
pub fn parse_quantity(item: &str) -> ParsedQuantity {
    let cleaned: String = item.chars().filter(|ch| *ch != '(' && *ch != ')').collect();
    let cleaned = cleaned.trim();

    let without_unit = strip_unit_suffix(cleaned).trim_end();
    let digits_start = without_unit
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx);

    let Some(start) = digits_start else {
        return ParsedQuantity {
            name: cleaned.to_string(),
            count: None,
        };
    };

    // A count too large for u32 is still a count; only its value is lost.
    ParsedQuantity {
        name: without_unit[..start].trim().to_string(),
        count: without_unit[start..].parse().ok(),
    }
}

fn strip_unit_suffix(value: &str) -> &str {
    for unit in UNIT_WORDS {
        if value.len() < unit.len() {
            continue;
        }
        let split = value.len() - unit.len();
        if !value.is_char_boundary(split) {
            continue;
        }
        let (head, tail) = value.split_at(split);
        if tail.eq_ignore_ascii_case(unit) && head.trim_end().ends_with(|ch: char| ch.is_ascii_digit())
        {
            return head;
        }
    }
    value
}

/// Normalization keys of the default kit entries, quantities removed.
pub fn kit_keys(default_kit: &[String]) -> HashSet<String> {
    default_kit
        .iter()
        .map(|entry| normalize_key(&parse_quantity(entry).name))
        .collect()
}

pub fn is_in_kit(name: &str, keys: &HashSet<String>) -> bool {
    keys.contains(&normalize_key(&parse_quantity(name).name))
}

/// Drop suggestions already covered by the default kit, keeping order.
///
/// Repeats within `items` are dropped too: the first entry with a given
/// normalization key wins.
pub fn exclude_kit_items(items: Vec<PrepItem>, default_kit: &[String]) -> Vec<PrepItem> {
    let keys = kit_keys(default_kit);
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !is_in_kit(&item.name, &keys) && seen.insert(normalize_key(&item.name)))
        .collect()
}
