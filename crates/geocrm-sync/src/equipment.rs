//! Free-text equipment parsing.
//!
//! Roster cells list purchased items as e.g.
//! `"[COD123] Gerador x2; Compressor (1)"`. Each fragment is cleaned of
//! catalogue codes and split into an item name and an optional quantity.

use std::sync::LazyLock;

use regex::Regex;

use geocrm_core::{collapse_whitespace, normalize_name, EquipmentItem};

static FRAGMENT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,\n|]").expect("valid separator regex"));

/// Catalogue prefix such as `"P/2023/114 - "`.
static CODE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]/\d{4}/\d+\s*-\s*").expect("valid code prefix regex"));

/// Trailing quantity forms, tried in order: `"Item x2"`, `"Item (2)"`,
/// `"Item - 2"`, `"Item 2"`.
static QUANTITY_FORMS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"^(.*?)\s+[xX×]\s*(\d+)$").expect("valid multiplier regex"),
        Regex::new(r"^(.*?)\s*\((\d+)\)$").expect("valid parenthesized regex"),
        Regex::new(r"^(.*?)\s*[-–—]\s*(\d+)$").expect("valid dash regex"),
        Regex::new(r"^(.*?)\s+(\d+)$").expect("valid bare number regex"),
    ]
});

/// Strips catalogue codes and leading punctuation from one fragment.
fn clean_fragment(fragment: &str) -> String {
    let text = collapse_whitespace(fragment);
    let text = CODE_PREFIX.replace(&text, "");
    let text = match (text.find('['), text.find(']')) {
        (Some(open), Some(close)) if open < close => &text[close + 1..],
        _ => &text[..],
    };
    text.trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim()
        .to_string()
}

/// Splits a trailing quantity off a cleaned fragment.
fn split_quantity(fragment: &str) -> (String, Option<i32>) {
    for form in QUANTITY_FORMS.iter() {
        let Some(caps) = form.captures(fragment) else {
            continue;
        };
        let Ok(quantity) = caps[2].parse::<i32>() else {
            return (fragment.to_string(), None);
        };
        return (caps[1].to_string(), Some(quantity));
    }
    (fragment.to_string(), None)
}

fn trim_name(name: &str) -> String {
    name.trim()
        .trim_end_matches(['-', '–', '—', ':'])
        .trim()
        .to_string()
}

/// Parses an equipment cell into line items.
///
/// Fragments without a name are dropped. Items whose names normalize to the
/// same key are merged, summing their quantities; the first spelling wins.
#[must_use]
pub fn parse_equipment(text: &str) -> Vec<EquipmentItem> {
    let mut items: Vec<EquipmentItem> = Vec::new();
    let mut keys: Vec<String> = Vec::new();

    for fragment in FRAGMENT_SEPARATOR.split(text) {
        let cleaned = clean_fragment(fragment);
        if cleaned.is_empty() {
            continue;
        }
        let (name, quantity) = split_quantity(&cleaned);
        let name = trim_name(&name);
        if name.is_empty() {
            continue;
        }

        let key = normalize_name(&name);
        if let Some(pos) = keys.iter().position(|k| *k == key) {
            let existing = &mut items[pos];
            existing.quantity = match (existing.quantity, quantity) {
                (Some(a), Some(b)) => Some(a.saturating_add(b)),
                (a, b) => a.or(b),
            };
        } else {
            keys.push(key);
            items.push(EquipmentItem::new(name, quantity));
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: Option<i32>) -> EquipmentItem {
        EquipmentItem::new(name, quantity)
    }

    #[test]
    fn bracketed_code_and_quantity_forms() {
        assert_eq!(
            parse_equipment("[COD123] Gerador x2; Compressor (1)"),
            vec![item("Gerador", Some(2)), item("Compressor", Some(1))]
        );
    }

    #[test]
    fn dash_and_bare_quantities() {
        assert_eq!(
            parse_equipment("Forno — 3 | Batedeira 2\nMesa"),
            vec![item("Forno", Some(3)), item("Batedeira", Some(2)), item("Mesa", None)]
        );
    }

    #[test]
    fn catalogue_prefix_is_removed() {
        assert_eq!(
            parse_equipment("P/2023/114 - Freezer Horizontal X 4"),
            vec![item("Freezer Horizontal", Some(4))]
        );
    }

    #[test]
    fn leading_punctuation_and_empty_fragments_are_dropped() {
        assert_eq!(
            parse_equipment(" - Balança ;; ,  ; ..."),
            vec![item("Balança", None)]
        );
        assert!(parse_equipment("").is_empty());
        assert!(parse_equipment(" ; | - ").is_empty());
    }

    #[test]
    fn duplicate_names_are_merged() {
        assert_eq!(
            parse_equipment("Gerador x2; gerador (3); Mesa; MESA"),
            vec![item("Gerador", Some(5)), item("Mesa", None)]
        );
    }

    #[test]
    fn oversized_quantity_is_kept_in_the_name() {
        assert_eq!(
            parse_equipment("Gerador x99999999999"),
            vec![item("Gerador x99999999999", None)]
        );
    }

    #[test]
    fn trailing_separators_are_trimmed() {
        assert_eq!(parse_equipment("Compressor:"), vec![item("Compressor", None)]);
    }
}
