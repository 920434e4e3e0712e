//! Digesting sentences into counts
//!
//! Everything here is a pure function of one sentence, so sentences can be
//! digested on any thread in any order. Summing the results happens in the
//! caller (see `CorpusStats::merge`).
use rayon::prelude::*;
use crate::sentence::Sentence;
use crate::stats::CorpusStats;
use crate::word::Edge;

/// Child → head edges. The root has no head and is never a child.
pub fn edges(sentence: &Sentence) -> impl Iterator<Item = Edge> + '_ {
    (0..sentence.words.len()).filter_map(move |i| {
        sentence.head_of(i)
            .map(|parent| Edge::new(sentence.words[i].word(), parent.word()))
    })
}

/// Child → grandparent edges, hopping over the direct head
///
/// Words attached to the root, and the root itself, have no grandparent.
pub fn skip_edges(sentence: &Sentence) -> impl Iterator<Item = Edge> + '_ {
    (0..sentence.words.len()).filter_map(move |i| {
        let h = sentence.words[i].head;
        if h == 0 {
            return None;
        }
        sentence.head_of(h - 1)
            .map(|grandparent| Edge::new(sentence.words[i].word(), grandparent.word()))
    })
}

/// Count the words, edges and skip edges of one sentence
pub fn digest_sentence(sentence: &Sentence) -> CorpusStats {
    let mut stats = CorpusStats::default();
    for w in &sentence.words {
        *stats.tokens.entry(w.word()).or_insert(0) += 1;
    }
    for edge in edges(sentence) {
        *stats.pairs.entry(edge).or_insert(0) += 1;
    }
    for edge in skip_edges(sentence) {
        *stats.skip_pairs.entry(edge).or_insert(0) += 1;
    }
    stats
}

/// Digest sentences in parallel on the current rayon pool and sum them
pub fn digest_batch(batch: &[Sentence]) -> CorpusStats {
    batch.par_iter()
        .map(digest_sentence)
        .reduce(CorpusStats::default, |mut left, right| { left.merge(right); left })
}
