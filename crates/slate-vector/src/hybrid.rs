use std::collections::HashMap;

use slate_fulltext::ScoredId;

/// Combine full-text and vector rankings over the same document set as a
/// weighted sum of independently min-max-normalized scores. A document
/// present on only one side contributes 0 for the side it's missing from,
/// rather than being excluded. `text_weight + vector_weight` need not sum
/// to exactly 1, but the spec's default does: `(0.7, 0.3)`.
pub fn hybrid_search(
    text_scores: &[ScoredId],
    vector_scores: &[(String, f64)],
    text_weight: f64,
    vector_weight: f64,
) -> Vec<ScoredId> {
    let text = normalize(text_scores);
    let vector = normalize(vector_scores);

    let mut combined: HashMap<String, f64> = HashMap::new();
    for (id, score) in &text {
        *combined.entry(id.clone()).or_insert(0.0) += score * text_weight;
    }
    for (id, score) in &vector {
        *combined.entry(id.clone()).or_insert(0.0) += score * vector_weight;
    }

    let mut ranked: Vec<ScoredId> = combined.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Min-max normalize to `[0, 1]`. When every score is equal (including the
/// single-entry case), every entry normalizes to 1.0 — they're tied for
/// best on that side.
fn normalize(scores: &[(String, f64)]) -> Vec<(String, f64)> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = scores.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    scores
        .iter()
        .map(|(id, score)| (id.clone(), if range == 0.0 { 1.0 } else { (score - min) / range }))
        .collect()
}
