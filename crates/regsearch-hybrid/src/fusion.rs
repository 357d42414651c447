use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use regsearch_core::types::DefinitionEntry;

pub const RRF_K: f32 = 60.0;

/// Shortest phrase worth matching against definitions.
pub const MIN_PHRASE_CHARS: usize = 6;

/// Reciprocal rank fusion. An item at 0-indexed rank `r` of a list earns
/// `1 / (k + r)`; earnings add up across lists. Highest total first, ties in
/// first-seen order.
pub fn rrf_scores<T: Eq + Hash + Clone>(lists: &[Vec<T>], k: f32) -> Vec<(T, f32)> {
    let mut order: Vec<T> = Vec::new();
    let mut scores: HashMap<T, f32> = HashMap::new();
    for list in lists {
        for (rank, item) in list.iter().enumerate() {
            let score = scores.entry(item.clone()).or_insert_with(|| { order.push(item.clone()); 0.0 });
            *score += 1.0 / (k + rank as f32);
        }
    }
    let mut fused: Vec<(T, f32)> = order.into_iter().map(|item| { let s = scores[&item]; (item, s) }).collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

pub fn reciprocal_rank_fusion<T: Eq + Hash + Clone>(lists: &[Vec<T>]) -> Vec<T> {
    rrf_scores(lists, RRF_K).into_iter().map(|(item, _)| item).collect()
}

/// Drop repeats, keeping each item where it first appears.
pub fn dedup_preserving_order<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Capitalized function words that never open a phrase.
const PHRASE_STOP_WORDS: &[&str] = &["A", "All", "An", "Any", "Each", "For", "If", "In", "Of", "On", "See", "That", "The", "These", "This", "With"];

/// Runs of consecutive capitalized words, e.g. "Power Unit" or "[Car]".
/// Punctuation that ends a word also ends the run. Unique, first-seen order.
pub fn capitalized_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    let flush = |run: &mut Vec<&str>, phrases: &mut Vec<String>| {
        if !run.is_empty() { phrases.push(run.join(" ")); run.clear(); }
    };
    for raw in text.split_whitespace() {
        let word = raw.trim_start_matches(|c: char| c == '"' || c == '(' || c == '\'');
        let core = word.trim_end_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | ')' | '"' | '\'' | '?' | '!'));
        if word.len() != raw.len() { flush(&mut run, &mut phrases); }
        let capitalized = core.trim_start_matches('[').chars().next().is_some_and(|c| c.is_uppercase());
        let opens_with_stop_word = run.is_empty() && PHRASE_STOP_WORDS.contains(&core);
        if !capitalized || opens_with_stop_word { flush(&mut run, &mut phrases); continue; }
        run.push(core);
        if core.len() != word.len() { flush(&mut run, &mut phrases); }
    }
    flush(&mut run, &mut phrases);
    dedup_preserving_order(phrases)
}

/// Definitions whose text begins with `phrase` (square brackets removed),
/// optionally behind an opening quote. Literal, case-sensitive comparison.
pub fn phrase_matches(phrase: &str, definition: &str) -> bool {
    let needle: String = phrase.chars().filter(|c| *c != '[' && *c != ']').collect();
    if needle.is_empty() { return false; }
    definition.strip_prefix('"').unwrap_or(definition).starts_with(&needle)
}

/// Formatted definitions matched by any capitalized phrase long enough to count.
pub fn phrase_definitions<'a>(texts: impl IntoIterator<Item = &'a str>, definitions: &[DefinitionEntry]) -> Vec<String> {
    let mut found = Vec::new();
    for text in texts {
        for phrase in capitalized_phrases(text) {
            if phrase.chars().count() < MIN_PHRASE_CHARS { continue; }
            found.extend(definitions.iter().filter(|d| phrase_matches(&phrase, &d.text)).map(DefinitionEntry::formatted));
        }
    }
    dedup_preserving_order(found)
}
