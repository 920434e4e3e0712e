//! Compositionality statistics for dependency-parsed corpora
//!
//! Read a token-per-line corpus into word and word-pair counts (resumably, a
//! batch of sentences at a time), then measure how freely words of one
//! syntactic category combine with words of another.
//!
//! The binaries `cl-read` and `cl-compose` are thin wrappers around
//! [`reader::CorpusReader`] and [`composition::CompositionAnalysis`].


#[macro_use] extern crate log;
pub mod errors;
pub mod farm;
pub mod word;
pub mod schema;
pub mod sentence;
pub mod digest;
pub mod stats;
pub mod checkpoint;
pub mod reader;
pub mod composition;
pub mod numpy;
pub mod zipf;
