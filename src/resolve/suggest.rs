// src/resolve/suggest.rs
// =============================================================================
// "Did you mean...?" for a mistyped folder name.
//
// Pure function over a list of sibling names, no filesystem access.
//
// A candidate is suggested when, ignoring case, either:
// - one name contains the other (e.g. "pdf" vs "pdf-tools"), or
// - the edit distance is at most 2 (e.g. "skils" vs "skills")
//
// Ordering: smallest edit distance first, ties broken lexicographically.
// =============================================================================

/// Upper bound on suggestions attached to a PathNotFound error
pub const MAX_SUGGESTIONS: usize = 5;

const MAX_TYPO_DISTANCE: usize = 2;

pub fn suggest(target: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = target.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &String)> = candidates
        .iter()
        .filter_map(|candidate| {
            let hay = candidate.to_lowercase();
            let distance = edit_distance(&needle, &hay);
            let overlaps = !hay.is_empty() && (hay.contains(&needle) || needle.contains(&hay));

            if overlaps || distance <= MAX_TYPO_DISTANCE {
                Some((distance, candidate))
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate.clone())
        .collect()
}

/// Levenshtein distance over chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
