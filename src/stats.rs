//! Accumulated word and word-pair frequencies
//!
//! These tables are the durable result of reading a corpus. They only ever
//! grow, and they grow by summation, so it doesn't matter how sentences were
//! batched or which thread counted them.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use crate::farm::{new_farm, FarmMap};
use crate::word::{Edge, Word};

/// Word → occurrences
pub type TokenStats = FarmMap<Word, u64>;
/// (child, head) → occurrences
pub type PairStats = FarmMap<Edge, u64>;

/// Everything counted from a corpus (or a single sentence)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub tokens: TokenStats,
    /// Direct dependency edges
    pub pairs: PairStats,
    /// Word → grandparent edges; never mixed with `pairs`
    pub skip_pairs: PairStats,
}

/// Partners per word, for each side of a category pair, most-combining first
#[derive(Debug, Clone, PartialEq)]
pub struct Combinations {
    pub child: Vec<(Word, u64)>,
    pub parent: Vec<(Word, u64)>,
}

fn add_all<K: ::std::hash::Hash + Eq>(into: &mut FarmMap<K, u64>, from: FarmMap<K, u64>) {
    if into.is_empty() {
        *into = from;
        return;
    }
    for (k, v) in from {
        *into.entry(k).or_insert(0) += v;
    }
}

/// Descending by count, then by word so the order is reproducible
pub(crate) fn rank<I: IntoIterator<Item = (Word, u64)>>(counts: I) -> Vec<(Word, u64)> {
    let mut ranked: Vec<(Word, u64)> = counts.into_iter().collect();
    ranked.sort_by(|(wa, ca), (wb, cb)| cb.cmp(ca).then_with(|| wa.cmp(wb)));
    ranked
}

impl CorpusStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum another set of counts into this one
    pub fn merge(&mut self, other: CorpusStats) {
        add_all(&mut self.tokens, other.tokens);
        add_all(&mut self.pairs, other.pairs);
        add_all(&mut self.skip_pairs, other.skip_pairs);
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Occurrences of all words
    pub fn total_tokens(&self) -> u64 {
        self.tokens.values().sum()
    }

    /// Occurrences per category, or with `unique` the number of distinct words
    pub fn category_counts(&self, unique: bool) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for (w, &ct) in &self.tokens {
            *counts.entry(w.category.clone()).or_insert(0) += if unique { 1 } else { ct };
        }
        counts
    }

    /// Occurrences per text, summed over the given categories (all if empty)
    pub fn token_counts(&self, categories: &[&str]) -> FarmMap<String, u64> {
        let mut counts = new_farm();
        for (w, &ct) in &self.tokens {
            if categories.is_empty() || categories.contains(&w.category.as_str()) {
                *counts.entry(w.text.clone()).or_insert(0) += ct;
            }
        }
        counts
    }

    /// Texts seen at least `threshold` times across all categories
    pub fn prune_tokens(&self, threshold: u64) -> HashSet<String> {
        self.token_counts(&[])
            .into_iter()
            .filter(|&(_, ct)| ct >= threshold)
            .map(|(t, _)| t)
            .collect()
    }

    /// Direct pairs whose child and head have the given categories (`*` for any)
    pub fn category_pairs<'a>(&'a self, child: &'a str, parent: &'a str)
        -> impl Iterator<Item = (&'a Edge, u64)> + 'a {
        self.pairs.iter()
            .filter(move |(e, _)| e.child.is_category(child) && e.parent.is_category(parent))
            .map(|(e, &ct)| (e, ct))
    }

    /// How much each child word combines with heads of `parent` category and
    /// vice versa. With `unique`, each distinct partner counts once.
    pub fn extract_combinations(&self, child: &str, parent: &str, unique: bool) -> Combinations {
        let mut child_to_parent: FarmMap<Word, u64> = new_farm();
        let mut parent_to_child: FarmMap<Word, u64> = new_farm();
        for (e, ct) in self.category_pairs(child, parent) {
            let weight = if unique { 1 } else { ct };
            *child_to_parent.entry(e.child.clone()).or_insert(0) += weight;
            *parent_to_child.entry(e.parent.clone()).or_insert(0) += weight;
        }
        Combinations {
            child: rank(child_to_parent),
            parent: rank(parent_to_child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(t: &str, c: &str) -> Word {
        Word::new(t, c)
    }

    fn sample() -> CorpusStats {
        let mut s = CorpusStats::new();
        s.tokens.insert(w("red", "ADJ"), 3);
        s.tokens.insert(w("big", "ADJ"), 1);
        s.tokens.insert(w("apple", "NOUN"), 2);
        s.tokens.insert(w("car", "NOUN"), 2);
        s.tokens.insert(w("red", "NOUN"), 1);
        s.pairs.insert(Edge::new(w("red", "ADJ"), w("apple", "NOUN")), 2);
        s.pairs.insert(Edge::new(w("red", "ADJ"), w("car", "NOUN")), 1);
        s.pairs.insert(Edge::new(w("big", "ADJ"), w("car", "NOUN")), 1);
        s
    }

    #[test]
    fn merge_is_order_independent() {
        let a = sample();
        let mut b = CorpusStats::new();
        b.tokens.insert(w("red", "ADJ"), 5);
        b.skip_pairs.insert(Edge::new(w("red", "ADJ"), w("go", "VERB")), 1);

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);
        assert_eq!(ab, ba);
        assert_eq!(ab.tokens[&w("red", "ADJ")], 8);
        assert_eq!(ab.skip_pairs.len(), 1);
    }

    #[test]
    fn counts_by_category() {
        let s = sample();
        let all = s.category_counts(false);
        assert_eq!(all["ADJ"], 4);
        assert_eq!(all["NOUN"], 5);
        let unique = s.category_counts(true);
        assert_eq!(unique["NOUN"], 3);
        assert_eq!(s.total_tokens(), 9);
    }

    #[test]
    fn token_counts_sum_over_categories() {
        let s = sample();
        assert_eq!(s.token_counts(&[])["red"], 4);
        assert_eq!(s.token_counts(&["NOUN"])["red"], 1);
        assert!(!s.token_counts(&["ADJ"]).contains_key("car"));
    }

    #[test]
    fn prunes_rare_texts() {
        let kept = sample().prune_tokens(2);
        assert!(kept.contains("red"));
        assert!(kept.contains("car"));
        assert!(!kept.contains("big"));
    }

    #[test]
    fn combinations_rank_partners() {
        let s = sample();
        let freq = s.extract_combinations("ADJ", "NOUN", false);
        assert_eq!(freq.child, vec![(w("red", "ADJ"), 3), (w("big", "ADJ"), 1)]);
        assert_eq!(freq.parent, vec![(w("apple", "NOUN"), 2), (w("car", "NOUN"), 2)]);

        let unique = s.extract_combinations("ADJ", "*", true);
        assert_eq!(unique.child[0], (w("red", "ADJ"), 2));
        assert_eq!(s.category_pairs("NOUN", "*").count(), 0);
    }
}
