//! Words keyed by their syntactic category
use serde::{Deserialize, Serialize};
use std::fmt;

/// A token's surface text together with its category (UPOS) tag
///
/// "run" as a NOUN and "run" as a VERB are different words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub category: String,
}

impl Word {
    pub fn new<T: Into<String>, C: Into<String>>(text: T, category: C) -> Self {
        Word { text: text.into(), category: category.into() }
    }

    /// `*` matches any category
    pub fn is_category(&self, category: &str) -> bool {
        category == "*" || self.category == category
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.text, self.category)
    }
}

/// A dependent word and its head
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub child: Word,
    pub parent: Word,
}

impl Edge {
    pub fn new(child: Word, parent: Word) -> Self {
        Edge { child, parent }
    }
}
