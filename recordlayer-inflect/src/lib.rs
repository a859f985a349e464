//! English inflection helpers used to derive collection names from type names.
//!
//! This crate is a small, pure string-to-string toolkit. It knows regular english
//! pluralization, a table of irregular words and a list of uncountable words, and it
//! turns `CamelCase` type names into `snake_case` table names.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer_inflect::tableize;
//!
//! assert_eq!(tableize("TestEntityThree"), "test_entity_threes");
//! assert_eq!(tableize("Person"), "people");
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_inflect;

use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use regex::Regex;

/// Pluralization rules, highest priority first. The first matching pattern wins.
static PLURAL_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)(quiz)$", "${1}zes"),
        (r"(?i)^(oxen)$", "${1}"),
        (r"(?i)^(ox)$", "${1}en"),
        (r"(?i)([ml])ice$", "${1}ice"),
        (r"(?i)([ml])ouse$", "${1}ice"),
        (r"(?i)(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
        (r"(?i)(x|ch|ss|sh)$", "${1}es"),
        (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
        (r"(?i)(hive)$", "${1}s"),
        (r"(?i)(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
        (r"(?i)sis$", "ses"),
        (r"(?i)([ti])a$", "${1}a"),
        (r"(?i)([ti])um$", "${1}a"),
        (r"(?i)(buffal|tomat|potat|her|ech)o$", "${1}oes"),
        (r"(?i)(bu)s$", "${1}ses"),
        (r"(?i)(alias|status)$", "${1}es"),
        (r"(?i)(octop|vir)i$", "${1}i"),
        (r"(?i)(octop|vir)us$", "${1}i"),
        (r"(?i)^(ax|test)is$", "${1}es"),
        (r"(?i)s$", "s"),
        (r"$", "s"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| {
        Regex::new(pattern)
            .ok()
            .map(|regex| (regex, replacement))
    })
    .collect()
});

/// Words whose plural form does not follow any rule.
const IRREGULARS: [(&str, &str); 7] = [
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("zombie", "zombies"),
];

/// Words that are identical in singular and plural.
const UNCOUNTABLES: [&str; 11] = [
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
    "news",
];

/// Converts a `CamelCase` (or mixed) identifier to `snake_case`.
pub fn underscore(word: &str) -> String {
    word.to_case(Case::Snake)
}

/// Returns the plural form of `word`.
///
/// Only the last `_`-separated segment is inflected, so `test_entity_person`
/// becomes `test_entity_people`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let (head, last) = match word.rfind('_') {
        Some(index) => word.split_at(index + 1),
        None => ("", word),
    };
    let lowered = last.to_lowercase();

    if UNCOUNTABLES.contains(&lowered.as_str()) {
        return word.to_string();
    }

    if let Some((_, plural)) = IRREGULARS
        .iter()
        .find(|(singular, _)| *singular == lowered)
    {
        return format!("{head}{}", match_leading_case(last, plural));
    }

    for (pattern, replacement) in PLURAL_RULES.iter() {
        if pattern.is_match(last) {
            return format!("{head}{}", pattern.replace(last, *replacement));
        }
    }

    word.to_string()
}

/// Derives a table (collection) name from a type name: underscored, then pluralized.
pub fn tableize(type_name: &str) -> String {
    pluralize(&underscore(type_name))
}

fn match_leading_case(original: &str, replacement: &str) -> String {
    match original.chars().next() {
        Some(first) if first.is_uppercase() => {
            let mut chars = replacement.chars();
            match chars.next() {
                Some(head) => head.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        _ => replacement.to_string(),
    }
}
