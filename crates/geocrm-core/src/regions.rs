//! Brazilian federative units and their two-letter codes.

use crate::text::normalize_name;

/// `(code, name)` for every federative unit.
const REGIONS: [(&str, &str); 27] = [
    ("AC", "Acre"),
    ("AL", "Alagoas"),
    ("AP", "Amapá"),
    ("AM", "Amazonas"),
    ("BA", "Bahia"),
    ("CE", "Ceará"),
    ("DF", "Distrito Federal"),
    ("ES", "Espírito Santo"),
    ("GO", "Goiás"),
    ("MA", "Maranhão"),
    ("MT", "Mato Grosso"),
    ("MS", "Mato Grosso do Sul"),
    ("MG", "Minas Gerais"),
    ("PA", "Pará"),
    ("PB", "Paraíba"),
    ("PR", "Paraná"),
    ("PE", "Pernambuco"),
    ("PI", "Piauí"),
    ("RJ", "Rio de Janeiro"),
    ("RN", "Rio Grande do Norte"),
    ("RS", "Rio Grande do Sul"),
    ("RO", "Rondônia"),
    ("RR", "Roraima"),
    ("SC", "Santa Catarina"),
    ("SP", "São Paulo"),
    ("SE", "Sergipe"),
    ("TO", "Tocantins"),
];

/// Resolves a region name or code to its two-letter code.
///
/// Accepts either the code itself (`"al"`, `"AL"`) or the full name with or
/// without accents (`"Alagoas"`, `"sao paulo"`). The country code `BR` is
/// never a region and yields `None`.
#[must_use]
pub fn region_code_for(value: &str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.len() == 2 {
        let upper = trimmed.to_ascii_uppercase();
        return REGIONS
            .iter()
            .find(|(code, _)| *code == upper)
            .map(|(code, _)| *code);
    }
    let wanted = normalize_name(trimmed);
    REGIONS
        .iter()
        .find(|(_, name)| normalize_name(name) == wanted)
        .map(|(code, _)| *code)
}

/// Extracts a region code from a CRM state label such as `"Alagoas (BR)"`.
///
/// The parenthesized suffix of these labels is the *country* code, so it is
/// stripped before lookup rather than being read as the region.
#[must_use]
pub fn region_code_from_state_label(label: &str) -> Option<&'static str> {
    let name = match label.rfind('(') {
        Some(idx) if label.trim_end().ends_with(')') => &label[..idx],
        _ => label,
    };
    region_code_for(name)
}
