//! Grouping token records into sentences
//!
//! Records arrive flat, one per line. A sentence ends where the next record's
//! composite id (file, sentence_id) differs from the current one, so one
//! record of lookahead is enough and nothing is ever re-read.
use std::iter::Peekable;
use std::path::PathBuf;
use std::sync::Arc;
use crate::errors::*;
use crate::schema::{Schema, TokenRecord, Value};
use crate::word::Word;

/// One token of a parsed sentence
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceWord {
    pub text: String,
    pub category: String,
    /// 1-based index of the head in the same sentence, 0 for the root
    pub head: usize,
}

impl SentenceWord {
    pub fn new<T: Into<String>, C: Into<String>>(text: T, category: C, head: usize) -> Self {
        SentenceWord { text: text.into(), category: category.into(), head }
    }

    pub fn word(&self) -> Word {
        Word::new(self.text.clone(), self.category.clone())
    }
}

/// A dependency-parsed sentence
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sentence {
    pub words: Vec<SentenceWord>,
}

impl Sentence {
    pub fn new(words: Vec<SentenceWord>) -> Self {
        Sentence { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The head of the word at (0-based) `index`, if it has one
    pub fn head_of(&self, index: usize) -> Option<&SentenceWord> {
        match self.words.get(index)?.head {
            0 => None,
            h => self.words.get(h - 1),
        }
    }
}

/// Turns the records of one sentence into words with heads
///
/// This is where a dependency parser plugs in. Implementations are shared
/// across the reading thread only, but must not keep per-sentence state.
pub trait SentenceParser {
    fn parse(&self, records: &[TokenRecord]) -> Result<Sentence>;
}

impl<'a, P: SentenceParser + ?Sized> SentenceParser for &'a P {
    fn parse(&self, records: &[TokenRecord]) -> Result<Sentence> {
        (**self).parse(records)
    }
}

/// Reads an already-parsed sentence straight out of its columns
#[derive(Debug, Clone)]
pub struct ColumnParser {
    text: usize,
    category: usize,
    head: usize,
    lowercase: bool,
}

impl ColumnParser {
    /// Use the `text`, `upos` and `head` columns
    pub fn new(schema: &Schema, lowercase: bool) -> Result<Self> {
        ColumnParser::with_columns(schema, "text", "upos", "head", lowercase)
    }

    pub fn with_columns(schema: &Schema, text: &str, category: &str, head: &str, lowercase: bool)
        -> Result<Self> {
        let find = |name: &str| schema.index_of(name)
            .ok_or_else(|| Error::Config(format!("the format has no {:?} column", name)));
        Ok(ColumnParser {
            text: find(text)?,
            category: find(category)?,
            head: find(head)?,
            lowercase,
        })
    }
}

impl SentenceParser for ColumnParser {
    fn parse(&self, records: &[TokenRecord]) -> Result<Sentence> {
        let mut words = Vec::with_capacity(records.len());
        for rec in records {
            let complain = |reason: String| Error::parse(rec.source.as_path(), rec.line_number,
                rec.values.iter().map(Value::to_string).collect::<Vec<_>>().join(" "), reason);
            let text = rec.get(self.text).map(Value::to_string).unwrap_or_default();
            let category = rec.get(self.category).map(Value::to_string).unwrap_or_default();
            let head = match rec.get(self.head) {
                Some(&Value::Int(h)) if h >= 0 && (h as usize) <= records.len() => h as usize,
                Some(other) => return Err(complain(format!(
                    "head {} is outside of a {}-word sentence", other, records.len()))),
                None => return Err(complain("missing head column".to_string())),
            };
            let text = if self.lowercase { text.to_lowercase() } else { text };
            words.push(SentenceWord { text, category, head });
        }
        Ok(Sentence { words })
    }
}

/// A finished sentence and how many corpus lines went into it
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub sentence: Sentence,
    pub lines: usize,
    pub source: Arc<PathBuf>,
}

/// Groups a stream of records into sentences, one record of lookahead
pub struct SentenceAssembler<I: Iterator<Item = Result<TokenRecord>>, P> {
    records: Peekable<I>,
    parser: P,
    buffer: Vec<TokenRecord>,
}

impl<I, P> SentenceAssembler<I, P>
    where I: Iterator<Item = Result<TokenRecord>>, P: SentenceParser {
    pub fn new(records: I, parser: P) -> Self {
        SentenceAssembler {
            records: records.peekable(),
            parser,
            buffer: vec![],
        }
    }
}

impl<I, P> Iterator for SentenceAssembler<I, P>
    where I: Iterator<Item = Result<TokenRecord>>, P: SentenceParser {
    type Item = Result<Assembled>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            // End of input (None) and a broken next line both close the sentence.
            let boundary = match self.records.peek() {
                Some(Ok(next)) => next.composite_id() != record.composite_id(),
                _ => true,
            };
            self.buffer.push(record);
            if boundary {
                let records = ::std::mem::replace(&mut self.buffer, vec![]);
                let source = records[0].source.clone();
                return Some(self.parser.parse(&records)
                    .map(|sentence| Assembled { sentence, lines: records.len(), source }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(file: &str, lines: &[&str]) -> Vec<Result<TokenRecord>> {
        let schema = Schema::default();
        let source = Arc::new(PathBuf::from(file));
        lines.iter().enumerate()
            .map(|(i, l)| schema.segment(l, "\t", &source, i + 1))
            .collect()
    }

    fn parser() -> ColumnParser {
        ColumnParser::new(&Schema::default(), true).unwrap()
    }

    #[test]
    fn splits_on_sentence_id_changes() {
        let recs = records("a", &[
            "1\tThe\tthe\t1\t2\tDET\tdet",
            "1\tdog\tdog\t2\t3\tNOUN\tnsubj",
            "1\tbarks\tbark\t3\t0\tVERB\troot",
            "2\tRed\tred\t1\t2\tADJ\tamod",
            "2\tapples\tapple\t2\t0\tNOUN\troot",
            "3\tYes\tyes\t1\t0\tINTJ\troot",
        ]);
        let sentences: Vec<Assembled> = SentenceAssembler::new(recs.into_iter(), parser())
            .collect::<Result<_>>()
            .unwrap();
        let lengths: Vec<usize> = sentences.iter().map(|s| s.sentence.len()).collect();
        assert_eq!(lengths, vec![3, 2, 1]);
        assert_eq!(sentences.iter().map(|s| s.lines).sum::<usize>(), 6);
        assert_eq!(sentences[1].sentence.words[0].text, "red");
        assert_eq!(sentences[0].sentence.head_of(0).map(|w| w.text.as_str()), Some("dog"));
        assert_eq!(sentences[0].sentence.head_of(2), None);
    }

    #[test]
    fn same_id_in_another_file_is_another_sentence() {
        let mut recs = records("a", &["1\tHi\thi\t1\t0\tINTJ\troot"]);
        recs.extend(records("b", &["1\tYo\tyo\t1\t0\tINTJ\troot"]));
        let count = SentenceAssembler::new(recs.into_iter(), parser()).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn bad_heads_are_reported() {
        let recs = records("a", &["1\tHi\thi\t1\t5\tINTJ\troot"]);
        let mut it = SentenceAssembler::new(recs.into_iter(), parser());
        assert!(matches!(it.next(), Some(Err(Error::Parse { .. }))));
    }

    #[test]
    fn a_broken_lookahead_closes_the_sentence_first() {
        let recs = records("a", &[
            "1\tHi\thi\t1\t0\tINTJ\troot",
            "1\tthere",
        ]);
        let mut it = SentenceAssembler::new(recs.into_iter(), parser());
        assert_eq!(it.next().unwrap().unwrap().sentence.len(), 1);
        assert!(matches!(it.next(), Some(Err(Error::Parse { .. }))));
        assert!(it.next().is_none());
    }
}
