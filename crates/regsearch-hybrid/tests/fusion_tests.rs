use regsearch_core::doctree::TreeIndex;
use regsearch_core::types::{DefinitionEntry, SearchResult, UnitId};
use regsearch_hybrid::{
    build_context, capitalized_phrases, dedup_preserving_order, phrase_definitions, phrase_matches,
    reciprocal_rank_fusion, rrf_scores, ScoreFloor, RRF_K,
};

fn result(similarity: f32, reranked: Option<f32>) -> SearchResult {
    SearchResult {
        similarity_score: similarity,
        unit: UnitId { doc_id: "doc".into(), tree_index: TreeIndex::new(vec![0]), paragraph_index: 0, chunk_id: 0 },
        text: format!("{similarity}"),
        reranked_score: reranked,
    }
}

#[test]
fn item_first_everywhere_gets_maximum_score() {
    let lists = vec![vec!["a", "b", "c"], vec!["a", "c"], vec!["a", "b"]];
    let fused = rrf_scores(&lists, RRF_K);
    assert_eq!(fused[0].0, "a");
    assert!((fused[0].1 - 3.0 / 60.0).abs() < 1e-6);
    assert_eq!(reciprocal_rank_fusion(&lists)[0], "a");
}

#[test]
fn fusing_a_list_with_itself_keeps_order() {
    let list = vec!["x", "y", "z"];
    let once = reciprocal_rank_fusion(&[list.clone()]);
    let twice = reciprocal_rank_fusion(&[list.clone(), list.clone()]);
    assert_eq!(once, twice);
    assert_eq!(once, list);
    let s1 = rrf_scores(&[list.clone()], RRF_K);
    let s2 = rrf_scores(&[list.clone(), list], RRF_K);
    for (a, b) in s1.iter().zip(&s2) { assert!((2.0 * a.1 - b.1).abs() < 1e-6); }
}

#[test]
fn rrf_ties_keep_first_seen_order() {
    let lists = vec![vec!["p"], vec!["q"], vec!["r"]];
    assert_eq!(reciprocal_rank_fusion(&lists), vec!["p", "q", "r"]);
    assert!(reciprocal_rank_fusion::<&str>(&[]).is_empty());
}

#[test]
fn reranked_floor_keeps_scores_above_minus_two() {
    let results: Vec<SearchResult> = [-3.0, -1.0, 0.0, 1.0].iter().map(|s| result(0.9, Some(*s))).collect();
    let kept = ScoreFloor::default().apply(results);
    let scores: Vec<f32> = kept.iter().filter_map(|r| r.reranked_score).collect();
    assert_eq!(scores, vec![-1.0, 0.0, 1.0]);
}

#[test]
fn similarity_floor_applies_without_reranking() {
    let results = vec![result(0.2, None), result(0.3, None), result(0.31, None)];
    let kept = ScoreFloor::default().apply(results);
    assert_eq!(kept.len(), 1);
    assert!((kept[0].similarity_score - 0.31).abs() < 1e-6);
}

#[test]
fn capitalized_runs_are_extracted() {
    let phrases = capitalized_phrases("The Power Unit must comply with the Technical Regulations. See [Car] and \"Pit Lane\" rules.");
    assert!(phrases.contains(&"Power Unit".to_string()));
    assert!(phrases.contains(&"Technical Regulations".to_string()));
    assert!(phrases.contains(&"[Car]".to_string()));
    assert!(phrases.contains(&"Pit Lane".to_string()));
    assert!(!phrases.iter().any(|p| p.contains("must")));
}

#[test]
fn phrase_matching_is_literal_prefix() {
    assert!(phrase_matches("Power Unit", "\"Power Unit\": The internal combustion engine..."));
    assert!(phrase_matches("[Power Unit]", "Power Unit: The engine"));
    assert!(!phrase_matches("power unit", "\"Power Unit\": The engine"));
    assert!(!phrase_matches("Unit (A)", "Unit A"));
    assert!(phrase_matches("Unit (A)", "Unit (A) is"));
}

#[test]
fn phrase_definitions_skip_short_phrases() {
    let defs = vec![
        DefinitionEntry::new("\"Car\": A single-seat, open-wheel vehicle.", "Technical"),
        DefinitionEntry::new("\"Power Unit\": The internal combustion engine and its ancillaries.", "Technical"),
    ];
    let found = phrase_definitions(["The Car carries a Power Unit.", "A Power Unit again."], &defs);
    assert_eq!(found, vec!["\"Power Unit\": The internal combustion engine and its ancillaries. (from Technical)".to_string()]);
}

#[test]
fn dedup_keeps_first_occurrence() {
    assert_eq!(dedup_preserving_order(vec!["b", "a", "b", "c", "a"]), vec!["b", "a", "c"]);
}

#[test]
fn context_puts_definitions_before_regulations() {
    let ctx = build_context(Some("REGS"), Some("DEFS"));
    assert_eq!(ctx, "Here are some potentially useful definitions:\n\nDEFS\n\n---\n\nHere is potentially useful context from the regulations:\n\nREGS");
    assert_eq!(build_context(Some("REGS"), None), "Here is potentially useful context from the regulations:\n\nREGS");
}
