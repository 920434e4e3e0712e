//! Column layouts for token-per-line corpora, and splitting lines by them
//!
//! A schema is an ordered list of `name:type` columns. Lines are split by a
//! delimiter and each position is cast to its column's type. Every schema
//! needs a `sentence_id` column; that's how sentences are found.
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::errors::*;

/// The column every schema must have
pub const SENTENCE_ID: &str = "sentence_id";

/// What a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Str,
    Float,
}

impl FieldType {
    /// Read a type tag such as `int`. An empty tag means `str`.
    pub fn from_tag(tag: &str) -> Option<FieldType> {
        match tag {
            "int" => Some(FieldType::Int),
            "str" | "" => Some(FieldType::Str),
            "float" => Some(FieldType::Float),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Str => "str",
            FieldType::Float => "float",
        }
    }

    fn cast(self, raw: &str) -> ::std::result::Result<Value, String> {
        match self {
            FieldType::Int => raw.parse()
                .map(Value::Int)
                .map_err(|e| format!("{:?} is not an int ({})", raw, e)),
            FieldType::Float => raw.parse()
                .map(Value::Float)
                .map_err(|e| format!("{:?} is not a float ({})", raw, e)),
            FieldType::Str => Ok(Value::Str(raw.to_string())),
        }
    }
}

/// One cell of a token line
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
    Float(f64),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Str(ref s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(ref s) => write!(f, "{}", s),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Ordered, named, typed columns
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldType)>,
    sentence_id: usize,
}

impl Schema {
    pub fn new(fields: Vec<(String, FieldType)>) -> Result<Schema> {
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(other, _)| other == name) {
                return Err(Error::Config(format!("column {:?} is declared twice", name)));
            }
        }
        let sentence_id = fields.iter()
            .position(|(name, _)| name == SENTENCE_ID)
            .ok_or_else(|| Error::Config(format!(
                "the format must include a column like \"{}:int\", but {:?} has none",
                SENTENCE_ID,
                fields.iter().map(|(n, t)| format!("{}:{}", n, t.tag())).collect::<Vec<_>>())))?;
        Ok(Schema { fields, sentence_id })
    }

    /// Build a schema from `name:type` strings
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Schema> {
        let column = Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*([a-z]*)\s*$")
            .map_err(|e| Error::Other(format!("bad column pattern: {}", e)))?;
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = spec.as_ref();
            let captures = column.captures(spec)
                .ok_or_else(|| Error::Config(format!("{:?} is not of the form name:type", spec)))?;
            let field_type = FieldType::from_tag(&captures[2])
                .ok_or_else(|| Error::Config(format!(
                    "unknown type {:?} in {:?}; use int, str or float", &captures[2], spec)))?;
            fields.push((captures[1].to_string(), field_type));
        }
        Schema::new(fields)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.fields.get(index).map(|&(_, t)| t)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Split one line into a record. Extra trailing columns are ignored.
    pub fn segment(&self, line: &str, delimiter: &str, source: &Arc<PathBuf>, line_number: usize)
        -> Result<TokenRecord> {
        let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
        let row: Vec<&str> = trimmed.split(delimiter).collect();
        if row.len() < self.fields.len() {
            return Err(Error::parse(source.as_path(), line_number, line,
                format!("expected {} columns but found {}", self.fields.len(), row.len())));
        }
        let mut values = Vec::with_capacity(self.fields.len());
        for (raw, &(ref name, field_type)) in row.iter().zip(self.fields.iter()) {
            let value = field_type.cast(raw.trim())
                .map_err(|reason| Error::parse(source.as_path(), line_number, line,
                    format!("column {}: {}", name, reason)))?;
            values.push(value);
        }
        Ok(TokenRecord {
            source: source.clone(),
            line_number,
            values,
            sentence_id: self.sentence_id,
        })
    }
}

impl Default for Schema {
    /// The layout written by common dependency parsers: one token per line,
    /// tab separated
    fn default() -> Schema {
        Schema::new(vec![
            (SENTENCE_ID.to_string(), FieldType::Int),
            ("text".to_string(), FieldType::Str),
            ("lemma".to_string(), FieldType::Str),
            ("id".to_string(), FieldType::Int),
            ("head".to_string(), FieldType::Int),
            ("upos".to_string(), FieldType::Str),
            ("deprel".to_string(), FieldType::Str),
        ]).expect("default schema has a sentence_id")
    }
}

/// One token line, cast per the schema
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub source: Arc<PathBuf>,
    pub line_number: usize,
    pub values: Vec<Value>,
    sentence_id: usize,
}

impl TokenRecord {
    pub fn sentence_id(&self) -> &Value {
        &self.values[self.sentence_id]
    }

    /// Sentence ids restart in every file, so the file is part of the id
    pub fn composite_id(&self) -> (&Path, &Value) {
        (self.source.as_path(), self.sentence_id())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> Arc<PathBuf> {
        Arc::new(PathBuf::from("corpus.tsv"))
    }

    #[test]
    fn parses_column_specs() {
        let schema = Schema::parse(&["sentence_id:int", "text:str", "score:float", "extra:"]).unwrap();
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.index_of("text"), Some(1));
        assert_eq!(schema.field_type(2), Some(FieldType::Float));
        assert_eq!(schema.field_type(3), Some(FieldType::Str));
    }

    #[test]
    fn requires_sentence_id() {
        match Schema::parse(&["text:str", "head:int"]) {
            Err(Error::Config(msg)) => assert!(msg.contains("sentence_id")),
            other => panic!("expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(matches!(Schema::parse(&["sentence_id:int", "text"]), Err(Error::Config(_))));
        assert!(matches!(Schema::parse(&["sentence_id:int", "text:list"]), Err(Error::Config(_))));
        assert!(matches!(Schema::parse(&["sentence_id:int", "sentence_id:str"]), Err(Error::Config(_))));
    }

    #[test]
    fn segments_a_line() {
        let schema = Schema::default();
        let rec = schema.segment("2\tmother\tmother\t2\t0\tNOUN\troot\n", "\t", &src(), 7).unwrap();
        assert_eq!(rec.sentence_id(), &Value::Int(2));
        assert_eq!(rec.get(1).and_then(Value::as_str), Some("mother"));
        assert_eq!(rec.get(4).and_then(Value::as_int), Some(0));
        assert_eq!(rec.line_number, 7);
    }

    #[test]
    fn short_lines_are_parse_errors() {
        let schema = Schema::default();
        match schema.segment("2\tmother\tmother", "\t", &src(), 3) {
            Err(Error::Parse { line_number, ref line, ref file, .. }) => {
                assert_eq!(line_number, 3);
                assert_eq!(line, "2\tmother\tmother");
                assert_eq!(file, &PathBuf::from("corpus.tsv"));
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn uncastable_fields_are_parse_errors() {
        let schema = Schema::default();
        let res = schema.segment("two\tmother\tmother\t2\t0\tNOUN\troot", "\t", &src(), 1);
        assert!(matches!(res, Err(Error::Parse { .. })));
    }

    #[test]
    fn composite_ids_include_the_file() {
        let schema = Schema::parse(&["sentence_id:int", "text:str"]).unwrap();
        let a = schema.segment("1 x", " ", &Arc::new(PathBuf::from("a")), 1).unwrap();
        let b = schema.segment("1 y", " ", &Arc::new(PathBuf::from("b")), 1).unwrap();
        assert_eq!(a.sentence_id(), b.sentence_id());
        assert_ne!(a.composite_id(), b.composite_id());
    }
}
