//! Text normalization and greedy token-overlap F1.

/// Normalize an answer for comparison.
///
/// Trims, lowercases and collapses every whitespace run to a single space.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a string into normalized tokens.
pub fn tokens(s: &str) -> Vec<String> {
    normalize(s).split(' ').filter(|t| !t.is_empty()).map(String::from).collect()
}

/// Token-overlap F1 between a predicted answer and one gold answer.
///
/// Overlap is counted greedily: each predicted token, in order, claims the
/// first unclaimed gold token with the same text. A gold token can satisfy
/// at most one predicted token.
///
/// Two empty answers score 1.0; exactly one empty answer scores 0.0.
pub fn token_overlap_f1(predicted: &str, gold: &str) -> f64 {
    let predicted = tokens(predicted);
    let gold = tokens(gold);

    match (predicted.is_empty(), gold.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let mut consumed = vec![false; gold.len()];
    let mut overlap = 0usize;

    for token in &predicted {
        let claim = gold
            .iter()
            .enumerate()
            .find(|(j, g)| !consumed[*j] && *g == token)
            .map(|(j, _)| j);

        if let Some(j) = claim {
            consumed[j] = true;
            overlap += 1;
        }
    }

    let precision = overlap as f64 / predicted.len() as f64;
    let recall = overlap as f64 / gold.len() as f64;

    if precision + recall == 0.0 {
        return 0.0;
    }

    2.0 * precision * recall / (precision + recall)
}
