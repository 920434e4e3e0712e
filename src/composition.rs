//! How freely one syntactic category combines with another
//!
//! Given finished corpus statistics and two categories (say ADJ as the child
//! and NOUN as the head), this builds ranked vocabularies for both sides and
//! derives, per word:
//!
//! * `combinations`: how many times it was seen with any partner, and
//!   `combinations_collapsed`: how many distinct partners it had;
//! * `entropy`: base-2 entropy of its distribution over partners, and
//!   `entropy_ceilinged`: the same divided by the most entropy its sample
//!   size allows;
//!
//! and per observed pair its pointwise mutual information. Each of these is
//! computed for direct dependency pairs and for skip pairs separately.
//!
//! Every derived column is computed at most once. Asking again is a no-op.
use ndarray::{Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use crate::errors::*;
use crate::farm::FarmMap;
use crate::stats::{self, CorpusStats, PairStats};
use crate::word::{Edge, Word};

/// Which pair table to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Direct,
    Skip,
}

/// What an adjacency matrix cell holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Statistic {
    /// How often the pair was seen
    Frequency,
    /// 1 if the pair was seen at all
    Unique,
}

/// Derived per-word columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Combinations,
    CombinationsCollapsed,
    SkipCombinations,
    SkipCombinationsCollapsed,
    Entropy,
    EntropyCeilinged,
    SkipEntropy,
    SkipEntropyCeilinged,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::Combinations => "combinations",
            Column::CombinationsCollapsed => "combinations_collapsed",
            Column::SkipCombinations => "skip_combinations",
            Column::SkipCombinationsCollapsed => "skip_combinations_collapsed",
            Column::Entropy => "entropy",
            Column::EntropyCeilinged => "entropy_ceilinged",
            Column::SkipEntropy => "skip_entropy",
            Column::SkipEntropyCeilinged => "skip_entropy_ceilinged",
        }
    }

    fn combinations(relation: Relation) -> (Column, Column) {
        match relation {
            Relation::Direct => (Column::Combinations, Column::CombinationsCollapsed),
            Relation::Skip => (Column::SkipCombinations, Column::SkipCombinationsCollapsed),
        }
    }

    fn entropy(relation: Relation) -> (Column, Column) {
        match relation {
            Relation::Direct => (Column::Entropy, Column::EntropyCeilinged),
            Relation::Skip => (Column::SkipEntropy, Column::SkipEntropyCeilinged),
        }
    }
}

/// Which categories to compare
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub child_category: String,
    pub parent_category: String,
    /// Words seen fewer times than this are left out, along with their pairs
    pub min_frequency: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            child_category: "ADJ".to_string(),
            parent_category: "NOUN".to_string(),
            min_frequency: 1,
        }
    }
}

impl AnalysisConfig {
    pub fn new<C: Into<String>, P: Into<String>>(child: C, parent: P) -> Self {
        AnalysisConfig {
            child_category: child.into(),
            parent_category: parent.into(),
            ..Default::default()
        }
    }
}

/// The words of one category, most frequent first, with derived columns
#[derive(Debug, Clone)]
pub struct TokenTable {
    pub category: String,
    words: Vec<Word>,
    freqs: Vec<u64>,
    index: FarmMap<Word, usize>,
    columns: BTreeMap<Column, Vec<f64>>,
}

impl TokenTable {
    fn ranked(category: &str, stats: &CorpusStats, min_frequency: u64) -> Self {
        let ranked = stats::rank(stats.tokens.iter()
            .filter(|&(w, &ct)| w.category == category && ct >= min_frequency)
            .map(|(w, &ct)| (w.clone(), ct)));
        let index = ranked.iter().enumerate().map(|(i, (w, _))| (w.clone(), i)).collect();
        let (words, freqs) = ranked.into_iter().unzip();
        TokenTable {
            category: category.to_string(),
            words,
            freqs,
            index,
            columns: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn freqs(&self) -> &[u64] {
        &self.freqs
    }

    /// Dense rank (0 = most frequent); the matrix index of this word
    pub fn rank_of(&self, word: &Word) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn freq_of(&self, word: &Word) -> Option<u64> {
        self.rank_of(word).map(|i| self.freqs[i])
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn column(&self, column: Column) -> Option<&[f64]> {
        self.columns.get(&column).map(|v| v.as_slice())
    }

    /// One derived value, if computed
    pub fn get(&self, word: &Word, column: Column) -> Option<f64> {
        let i = self.rank_of(word)?;
        self.columns.get(&column).map(|v| v[i])
    }

    /// Which columns have been computed so far
    pub fn computed(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.keys().copied()
    }

    /// Store a column unless it's already there. True if it was stored.
    fn insert_if_absent(&mut self, column: Column, values: Vec<f64>) -> bool {
        debug_assert_eq!(values.len(), self.len());
        if self.has(column) {
            return false;
        }
        self.columns.insert(column, values);
        true
    }
}

/// Observed pairs of the two categories, most frequent first, with PMI
#[derive(Debug, Clone)]
pub struct PairTable {
    pub relation: Relation,
    pairs: Vec<Edge>,
    freqs: Vec<u64>,
    index: FarmMap<Edge, usize>,
    pmi: Option<Vec<Option<f64>>>,
}

impl PairTable {
    fn filtered(relation: Relation, pairs: &PairStats, config: &AnalysisConfig, stats: &CorpusStats) -> Self {
        // Words missing from the token counts entirely are kept, so the matrix
        // can report them; rare words are dropped with their pairs.
        let rare = |w: &Word| stats.tokens.get(w).map_or(false, |&f| f < config.min_frequency);
        let mut kept: Vec<(Edge, u64)> = pairs.iter()
            .filter(|&(e, _)| e.child.category == config.child_category
                && e.parent.category == config.parent_category)
            .filter(|&(e, _)| !rare(&e.child) && !rare(&e.parent))
            .map(|(e, &ct)| (e.clone(), ct))
            .collect();
        kept.sort_by(|(ea, ca), (eb, cb)| cb.cmp(ca).then_with(|| ea.cmp(eb)));
        let index = kept.iter().enumerate().map(|(i, (e, _))| (e.clone(), i)).collect();
        let (pairs, freqs) = kept.into_iter().unzip();
        PairTable { relation, pairs, freqs, index, pmi: None }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[Edge] {
        &self.pairs
    }

    pub fn freqs(&self) -> &[u64] {
        &self.freqs
    }

    /// How often a pair was seen (0 if never)
    pub fn count(&self, pair: &Edge) -> u64 {
        self.index.get(pair).map_or(0, |&i| self.freqs[i])
    }

    pub fn pmi(&self) -> Option<&[Option<f64>]> {
        self.pmi.as_ref().map(|v| v.as_slice())
    }

    pub fn pmi_of(&self, pair: &Edge) -> Option<f64> {
        let i = *self.index.get(pair)?;
        self.pmi.as_ref()?[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Edge, u64)> {
        self.pairs.iter().zip(self.freqs.iter().copied())
    }
}

/// Base-2 Shannon entropy of a count vector. All zeros gives 0.
pub fn entropy(counts: ArrayView1<f64>) -> f64 {
    let total = counts.sum();
    if total <= 0.0 {
        return 0.0;
    }
    -counts.iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| { let p = c / total; p * p.log2() })
        .sum::<f64>()
}

/// Entropy divided by the most a word with `freq` occurrences could reach
/// among `other_axis` partners
///
/// The divisor is log2(freq) when freq < other_axis, else log2(other_axis).
/// When that's 0 the word can only have one partner, and the result is 0.
pub fn ceilinged(raw: f64, freq: u64, other_axis: usize) -> f64 {
    let denom = if freq < other_axis as u64 { freq } else { other_axis as u64 };
    let norm = (denom as f64).log2();
    if norm > 0.0 { raw / norm } else { 0.0 }
}

/// log2(joint · n / (freq_child · freq_parent)); None if any count is 0
pub fn pmi(joint: u64, freq_child: u64, freq_parent: u64, n: u64) -> Option<f64> {
    if joint == 0 || freq_child == 0 || freq_parent == 0 || n == 0 {
        return None;
    }
    Some((joint as f64).log2() - (freq_child as f64).log2()
        - (freq_parent as f64).log2() + (n as f64).log2())
}

/// Combination, entropy and PMI statistics between two categories
#[derive(Debug, Clone)]
pub struct CompositionAnalysis {
    config: AnalysisConfig,
    child: TokenTable,
    parent: TokenTable,
    pairs: PairTable,
    skip_pairs: PairTable,
    /// Occurrences of either category, before pruning
    n_tokens: u64,
    matrices: HashMap<(Relation, Statistic), Array2<f64>>,
}

impl CompositionAnalysis {
    /// Rank both vocabularies and collect their pairs. Nothing is derived yet.
    pub fn new(stats: &CorpusStats, config: AnalysisConfig) -> Self {
        let child = TokenTable::ranked(&config.child_category, stats, config.min_frequency);
        let parent = TokenTable::ranked(&config.parent_category, stats, config.min_frequency);
        let n_tokens = stats.tokens.iter()
            .filter(|(w, _)| w.category == config.child_category || w.category == config.parent_category)
            .map(|(_, &ct)| ct)
            .sum();
        let pairs = PairTable::filtered(Relation::Direct, &stats.pairs, &config, stats);
        let skip_pairs = PairTable::filtered(Relation::Skip, &stats.skip_pairs, &config, stats);
        info!("{} {} words, {} {} words, {} pairs, {} skip pairs",
            child.len(), config.child_category, parent.len(), config.parent_category,
            pairs.len(), skip_pairs.len());
        CompositionAnalysis {
            config,
            child,
            parent,
            pairs,
            skip_pairs,
            n_tokens,
            matrices: HashMap::new(),
        }
    }

    /// Combinations, then entropy, then PMI
    pub fn run_analyses(&mut self) -> Result<()> {
        self.compute_combinations();
        self.compute_entropy()?;
        self.compute_pmi()?;
        Ok(())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn child(&self) -> &TokenTable {
        &self.child
    }

    pub fn parent(&self) -> &TokenTable {
        &self.parent
    }

    pub fn pairs(&self, relation: Relation) -> &PairTable {
        match relation {
            Relation::Direct => &self.pairs,
            Relation::Skip => &self.skip_pairs,
        }
    }

    /// The N of PMI: occurrences of all words of either category
    pub fn n_tokens(&self) -> u64 {
        self.n_tokens
    }

    /// Partner totals and distinct partner counts, both sides, both relations
    pub fn compute_combinations(&mut self) {
        for &relation in &[Relation::Direct, Relation::Skip] {
            let (total_col, collapsed_col) = Column::combinations(relation);
            if self.child.has(total_col) && self.child.has(collapsed_col)
                && self.parent.has(total_col) && self.parent.has(collapsed_col) {
                continue;
            }
            info!("Counting {} for {} and {}", total_col.name(),
                self.config.child_category, self.config.parent_category);

            let table = match relation {
                Relation::Direct => &self.pairs,
                Relation::Skip => &self.skip_pairs,
            };
            let mut child_totals = vec![0.0; self.child.len()];
            let mut child_distinct = vec![0.0; self.child.len()];
            let mut parent_totals = vec![0.0; self.parent.len()];
            let mut parent_distinct = vec![0.0; self.parent.len()];
            for (e, ct) in table.iter() {
                if let Some(i) = self.child.rank_of(&e.child) {
                    child_totals[i] += ct as f64;
                    child_distinct[i] += 1.0;
                }
                if let Some(j) = self.parent.rank_of(&e.parent) {
                    parent_totals[j] += ct as f64;
                    parent_distinct[j] += 1.0;
                }
            }
            self.child.insert_if_absent(total_col, child_totals);
            self.child.insert_if_absent(collapsed_col, child_distinct);
            self.parent.insert_if_absent(total_col, parent_totals);
            self.parent.insert_if_absent(collapsed_col, parent_distinct);
        }
    }

    /// The |child vocabulary| × |parent vocabulary| matrix, built on first use
    pub fn adjacency_matrix(&mut self, relation: Relation, statistic: Statistic) -> Result<&Array2<f64>> {
        let key = (relation, statistic);
        if !self.matrices.contains_key(&key) {
            info!("Constructing {:?} {:?} adjacency matrix ({} × {})",
                relation, statistic, self.child.len(), self.parent.len());
            let matrix = build_matrix(&self.child, &self.parent, self.pairs(relation), statistic)?;
            self.matrices.insert(key, matrix);
        }
        Ok(&self.matrices[&key])
    }

    /// A matrix if it has been built already
    pub fn cached_matrix(&self, relation: Relation, statistic: Statistic) -> Option<&Array2<f64>> {
        self.matrices.get(&(relation, statistic))
    }

    /// Row (child) and column (parent) entropies, raw and ceilinged
    pub fn compute_entropy(&mut self) -> Result<()> {
        for &relation in &[Relation::Direct, Relation::Skip] {
            let (raw_col, ceil_col) = Column::entropy(relation);
            if self.child.has(raw_col) && self.child.has(ceil_col)
                && self.parent.has(raw_col) && self.parent.has(ceil_col) {
                continue;
            }
            self.adjacency_matrix(relation, Statistic::Frequency)?;
            let matrix = &self.matrices[&(relation, Statistic::Frequency)];
            let (n_rows, n_cols) = matrix.dim();

            info!("Computing {} for {}", raw_col.name(), self.config.child_category);
            let child_raw: Vec<f64> = matrix.outer_iter().map(entropy).collect();
            info!("Computing {} for {}", raw_col.name(), self.config.parent_category);
            let parent_raw: Vec<f64> = matrix.axis_iter(Axis(1)).map(entropy).collect();

            let child_ceil = child_raw.iter().zip(self.child.freqs())
                .map(|(&h, &f)| ceilinged(h, f, n_cols))
                .collect();
            let parent_ceil = parent_raw.iter().zip(self.parent.freqs())
                .map(|(&h, &f)| ceilinged(h, f, n_rows))
                .collect();

            self.child.insert_if_absent(raw_col, child_raw);
            self.child.insert_if_absent(ceil_col, child_ceil);
            self.parent.insert_if_absent(raw_col, parent_raw);
            self.parent.insert_if_absent(ceil_col, parent_ceil);
        }
        Ok(())
    }

    /// PMI of every observed pair, for both relations
    pub fn compute_pmi(&mut self) -> Result<()> {
        let n = self.n_tokens;
        let (child, parent) = (&self.child, &self.parent);
        for table in vec![&mut self.pairs, &mut self.skip_pairs] {
            if table.pmi.is_some() {
                continue;
            }
            info!("Computing {:?} PMI over {} pairs", table.relation, table.len());
            let mut values = Vec::with_capacity(table.len());
            for (e, ct) in table.iter() {
                let fc = child.freq_of(&e.child).ok_or_else(|| Error::Consistency(format!(
                    "{} is paired but missing from the {} vocabulary", e.child, child.category)))?;
                let fp = parent.freq_of(&e.parent).ok_or_else(|| Error::Consistency(format!(
                    "{} is paired but missing from the {} vocabulary", e.parent, parent.category)))?;
                values.push(pmi(ct, fc, fp, n));
            }
            table.pmi = Some(values);
        }
        Ok(())
    }

    /// Observed direct pairs involving a word with this text, either side
    pub fn inspect_neighborhood(&self, text: &str) -> Vec<(Edge, u64)> {
        self.pairs.iter()
            .filter(|(e, _)| e.child.text == text || e.parent.text == text)
            .map(|(e, ct)| (e.clone(), ct))
            .collect()
    }

    /// `n` observed direct pairs, uniformly with replacement
    pub fn sample_combinations<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<(Edge, u64)> {
        let indices: Vec<usize> = (0..self.pairs.len()).collect();
        (0..n)
            .filter_map(|_| indices.choose(rng))
            .map(|&i| (self.pairs.pairs[i].clone(), self.pairs.freqs[i]))
            .collect()
    }

    /// Draw up to `n` child and `n` parent words seen at least `min_freq`
    /// times (without replacement), zip them and report how often each
    /// resulting pair was actually seen
    pub fn generate_combinations<R: Rng + ?Sized>(&self, min_freq: u64, n: usize, rng: &mut R)
        -> Vec<(Edge, u64)> {
        let eligible = |table: &TokenTable| -> Vec<Word> {
            table.words().iter().zip(table.freqs())
                .filter(|&(_, &f)| f >= min_freq)
                .map(|(w, _)| w.clone())
                .collect()
        };
        let children = eligible(&self.child);
        let parents = eligible(&self.parent);
        let children: Vec<&Word> = children.choose_multiple(rng, n).collect();
        let parents: Vec<&Word> = parents.choose_multiple(rng, n).collect();
        children.into_iter().zip(parents)
            .map(|(c, p)| {
                let pair = Edge::new(c.clone(), p.clone());
                let ct = self.pairs.count(&pair);
                (pair, ct)
            })
            .collect()
    }
}

fn build_matrix(child: &TokenTable, parent: &TokenTable, pairs: &PairTable, statistic: Statistic)
    -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((child.len(), parent.len()));
    for (e, ct) in pairs.iter() {
        let i = child.rank_of(&e.child).ok_or_else(|| Error::Consistency(format!(
            "{} is paired but missing from the {} ranking", e.child, child.category)))?;
        let j = parent.rank_of(&e.parent).ok_or_else(|| Error::Consistency(format!(
            "{} is paired but missing from the {} ranking", e.parent, parent.category)))?;
        matrix[[i, j]] = match statistic {
            Statistic::Frequency => ct as f64,
            Statistic::Unique => 1.0,
        };
    }
    Ok(matrix)
}
