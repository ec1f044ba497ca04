//! Name matching between roster labels and CRM partners.
//!
//! Names are compared after [`normalize_name`]. A label written as
//! `"Company, Person"` is tried whole and as its two halves.

use std::collections::HashSet;

use geocrm_core::{normalize_name, CrmPartner};

/// Fuzzy containment is only attempted for keys at least this long.
const MIN_FUZZY_LEN: usize = 3;

/// Normalized match candidates for a requested name: the whole label plus
/// the parts before and after the first comma. Empty and repeated
/// candidates are dropped.
#[must_use]
pub fn candidate_keys(requested: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(3);
    for raw in split_label(requested) {
        let key = normalize_name(raw);
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// The same candidates, trimmed but otherwise as typed, for CRM queries.
#[must_use]
pub fn lookup_names(requested: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(3);
    for raw in split_label(requested) {
        let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn split_label(requested: &str) -> Vec<&str> {
    let mut parts = vec![requested];
    if let Some((before, after)) = requested.split_once(',') {
        parts.push(before);
        parts.push(after);
    }
    parts
}

fn partner_keys(partner: &CrmPartner) -> [String; 2] {
    [
        normalize_name(&partner.display_name),
        normalize_name(&partner.name),
    ]
}

/// Customers before generic contacts, otherwise in input order.
fn customers_first(partners: &[CrmPartner]) -> Vec<&CrmPartner> {
    let mut ordered: Vec<&CrmPartner> = partners.iter().collect();
    ordered.sort_by_key(|p| !p.is_customer);
    ordered
}

/// A partner whose normalized display name or name equals one of the
/// requested candidates.
#[must_use]
pub fn find_exact_match<'a>(requested: &str, partners: &'a [CrmPartner]) -> Option<&'a CrmPartner> {
    let keys = candidate_keys(requested);
    customers_first(partners)
        .into_iter()
        .find(|partner| partner_keys(partner).iter().any(|k| keys.contains(k)))
}

/// Containment score between one partner key and one candidate: `1` when
/// the partner name contains the candidate, `0` when the candidate contains
/// the partner name, `None` when neither holds.
fn containment_score(partner_key: &str, candidate: &str) -> Option<u8> {
    if candidate.chars().count() < MIN_FUZZY_LEN || partner_key.chars().count() < MIN_FUZZY_LEN {
        return None;
    }
    if partner_key.contains(candidate) {
        Some(1)
    } else if candidate.contains(partner_key) {
        Some(0)
    } else {
        None
    }
}

/// Best partner for `requested`: an exact match if one exists, otherwise the
/// highest-scoring containment match, ties going to the longer partner name.
#[must_use]
pub fn find_match<'a>(requested: &str, partners: &'a [CrmPartner]) -> Option<&'a CrmPartner> {
    if let Some(exact) = find_exact_match(requested, partners) {
        return Some(exact);
    }

    let keys = candidate_keys(requested);
    let mut best: Option<(&CrmPartner, u8, usize)> = None;
    for partner in customers_first(partners) {
        for partner_key in partner_keys(partner) {
            let len = partner_key.chars().count();
            for candidate in &keys {
                let Some(score) = containment_score(&partner_key, candidate) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((_, best_score, best_len)) => (score, len) > (best_score, best_len),
                };
                if better {
                    best = Some((partner, score, len));
                }
            }
        }
    }
    best.map(|(partner, _, _)| partner)
}

/// Whether `requested` matches any name in `found` (normalized names), by
/// equality or containment in either direction.
#[must_use]
pub fn is_found(requested: &str, found: &HashSet<String>) -> bool {
    let keys = candidate_keys(requested);
    if keys.iter().any(|k| found.contains(k)) {
        return true;
    }
    found
        .iter()
        .any(|name| keys.iter().any(|k| containment_score(name, k).is_some()))
}
