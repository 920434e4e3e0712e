//! Resumable reading state, on disk
//!
//! A checkpoint file is a magic number, a format version, and the snapshot
//! encoded with bincode. Every snapshot field is optional on disk so a file
//! lacking some of them can be told apart from a damaged one. Files are
//! replaced atomically (write to a temporary file in the same directory, then
//! rename), so a crash leaves either the previous checkpoint or the new one.
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use crate::errors::*;
use crate::farm;
use crate::stats::{CorpusStats, PairStats, TokenStats};

const MAGIC: &[u8; 8] = b"CLCKPT\x01\x00";
const VERSION: u32 = 2;
const EXTENSION: &str = "ckpt";

/// Where reading stopped, and everything counted up to there
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Sorted input files
    pub files: Vec<PathBuf>,
    pub current_file: Option<PathBuf>,
    /// Non-blank lines already folded into `stats`
    pub lines_read: u64,
    pub sentences_seen: u64,
    /// Lines in the corpus (or the sentence limit), for progress reports
    pub total: Option<u64>,
    /// None for no limit
    pub sentence_limit: Option<u64>,
    pub stats: CorpusStats,
}

/// The on-disk layout, borrowed for writing
#[derive(Serialize)]
struct SnapshotRef<'a> {
    files: Option<&'a [PathBuf]>,
    current_file: Option<&'a Path>,
    lines_read: Option<u64>,
    sentences_seen: Option<u64>,
    total: Option<u64>,
    sentence_limit: Option<u64>,
    token_stats: Option<&'a TokenStats>,
    pair_stats: Option<&'a PairStats>,
    skip_pair_stats: Option<&'a PairStats>,
}

/// The on-disk layout, owned for reading. Field order matches `SnapshotRef`.
#[derive(Deserialize)]
struct Snapshot {
    files: Option<Vec<PathBuf>>,
    current_file: Option<PathBuf>,
    lines_read: Option<u64>,
    sentences_seen: Option<u64>,
    total: Option<u64>,
    sentence_limit: Option<u64>,
    token_stats: Option<TokenStats>,
    pair_stats: Option<PairStats>,
    skip_pair_stats: Option<PairStats>,
}

impl Snapshot {
    fn missing(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.files.is_none() { missing.push("files"); }
        if self.lines_read.is_none() { missing.push("lines_read"); }
        if self.sentences_seen.is_none() { missing.push("sentences_seen"); }
        if self.token_stats.is_none() { missing.push("token_stats"); }
        if self.pair_stats.is_none() { missing.push("pair_stats"); }
        if self.skip_pair_stats.is_none() { missing.push("skip_pair_stats"); }
        missing
    }
}

/// What came out of a checkpoint file
pub enum Decoded {
    Complete(Checkpoint),
    /// The file parsed, but these required fields were absent
    Missing(Vec<&'static str>),
}

impl Checkpoint {
    /// Serialize every field
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        bincode::serialize_into(&mut *writer, &VERSION)?;
        bincode::serialize_into(&mut *writer, &SnapshotRef {
            files: Some(&self.files),
            current_file: self.current_file.as_ref().map(|p| p.as_path()),
            lines_read: Some(self.lines_read),
            sentences_seen: Some(self.sentences_seen),
            total: self.total,
            sentence_limit: self.sentence_limit,
            token_stats: Some(&self.stats.tokens),
            pair_stats: Some(&self.stats.pairs),
            skip_pair_stats: Some(&self.stats.skip_pairs),
        })?;
        Ok(())
    }

    /// Parse a checkpoint. Damaged bytes are an error.
    pub fn decode(bytes: &[u8]) -> Result<Decoded> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::Cache("not a checkpoint file (bad magic number)".to_string()));
        }
        let damaged = |e: bincode::Error| Error::Cache(format!("checkpoint is damaged: {}", e));
        let body = &bytes[MAGIC.len()..];
        let version: u32 = bincode::deserialize(body).map_err(damaged)?;
        if version != VERSION {
            return Err(Error::Cache(format!(
                "checkpoint format {} is not supported (expected {})", version, VERSION)));
        }
        let snapshot: Snapshot = bincode::deserialize(&body[mem::size_of::<u32>()..])
            .map_err(damaged)?;

        let missing = snapshot.missing();
        if !missing.is_empty() {
            return Ok(Decoded::Missing(missing));
        }
        Ok(Decoded::Complete(Checkpoint {
            files: snapshot.files.unwrap_or_default(),
            current_file: snapshot.current_file,
            lines_read: snapshot.lines_read.unwrap_or_default(),
            sentences_seen: snapshot.sentences_seen.unwrap_or_default(),
            total: snapshot.total,
            sentence_limit: snapshot.sentence_limit,
            stats: CorpusStats {
                tokens: snapshot.token_stats.unwrap_or_default(),
                pairs: snapshot.pair_stats.unwrap_or_default(),
                skip_pairs: snapshot.skip_pair_stats.unwrap_or_default(),
            },
        }))
    }
}

/// Derive a checkpoint tag from the (sorted) input files
pub fn tag_for_files(files: &[PathBuf]) -> String {
    let joined = files.iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    farm::digest(&joined)
}

/// A directory of checkpoints, one file per tag
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        CheckpointStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", tag, EXTENSION))
    }

    /// Load the checkpoint for a tag
    ///
    /// Without `strict`, a missing checkpoint or one lacking required fields
    /// means starting fresh (`None`). With `strict`, both are errors.
    /// Damaged files are always errors.
    pub fn load(&self, tag: &str, strict: bool) -> Result<Option<Checkpoint>> {
        let path = self.path(tag);
        info!("Attempt loading checkpoint from {}", path.display());
        let mut bytes = vec![];
        match File::open(&path) {
            Ok(mut file) => { file.read_to_end(&mut bytes)?; }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                if strict {
                    return Err(Error::Cache(format!("no checkpoint at {}", path.display())));
                }
                info!("No checkpoint at {}, starting fresh", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        match Checkpoint::decode(&bytes)? {
            Decoded::Complete(checkpoint) => {
                info!("Loaded checkpoint {}: {} sentences, {} lines",
                    path.display(), checkpoint.sentences_seen, checkpoint.lines_read);
                Ok(Some(checkpoint))
            }
            Decoded::Missing(fields) => {
                if strict {
                    Err(Error::Cache(format!("checkpoint {} lacks {}", path.display(), fields.join(", "))))
                } else {
                    warn!("Checkpoint {} lacks {}; starting fresh", path.display(), fields.join(", "));
                    Ok(None)
                }
            }
        }
    }

    /// Replace the checkpoint for a tag, atomically
    pub fn save(&self, tag: &str, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(tag);
        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(&temp);
            checkpoint.encode(&mut writer)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| e.error)?;
        debug!("Checkpoint written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use tempfile::tempdir;
    use crate::word::{Edge, Word};

    fn sample() -> Checkpoint {
        let mut stats = CorpusStats::new();
        stats.tokens.insert(Word::new("red", "ADJ"), 4);
        stats.tokens.insert(Word::new("ünïcode", "NOUN"), 1);
        stats.pairs.insert(Edge::new(Word::new("red", "ADJ"), Word::new("ünïcode", "NOUN")), 1);
        Checkpoint {
            files: vec![PathBuf::from("/data/a.tsv"), PathBuf::from("/data/b.tsv")],
            current_file: Some(PathBuf::from("/data/b.tsv")),
            lines_read: 17,
            sentences_seen: 3,
            total: Some(40),
            sentence_limit: None,
            stats,
        }
    }

    #[test]
    fn saves_and_loads() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cache"));
        store.save("coca", &sample()).unwrap();
        assert_eq!(store.load("coca", true).unwrap(), Some(sample()));
        // Saving again replaces it
        let mut later = sample();
        later.lines_read = 30;
        store.save("coca", &later).unwrap();
        assert_eq!(store.load("coca", false).unwrap().unwrap().lines_read, 30);
    }

    #[test]
    fn missing_checkpoints_are_fresh_starts_unless_strict() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.load("nothing", false).unwrap(), None);
        assert!(matches!(store.load("nothing", true), Err(Error::Cache(_))));
    }

    #[test]
    fn missing_fields() {
        // A checkpoint with only lines_read filled in
        let mut bytes = MAGIC.to_vec();
        bincode::serialize_into(&mut bytes, &VERSION).unwrap();
        bincode::serialize_into(&mut bytes, &SnapshotRef {
            files: None,
            current_file: None,
            lines_read: Some(12),
            sentences_seen: None,
            total: None,
            sentence_limit: None,
            token_stats: None,
            pair_stats: None,
            skip_pair_stats: None,
        }).unwrap();

        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(store.path("partial"), &bytes).unwrap();
        assert_eq!(store.load("partial", false).unwrap(), None);
        match store.load("partial", true) {
            Err(Error::Cache(msg)) => {
                assert!(msg.contains("token_stats"));
                assert!(!msg.contains("lines_read"));
            }
            other => panic!("expected a cache error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn damaged_files_are_errors() {
        let mut bytes = vec![];
        sample().encode(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 5);
        assert!(matches!(Checkpoint::decode(&bytes), Err(Error::Cache(_))));
        assert!(matches!(Checkpoint::decode(b"garbage!"), Err(Error::Cache(_))));
        assert!(matches!(Checkpoint::decode(MAGIC), Err(Error::Cache(_))));

        // A file list claiming u64::MAX entries, then nothing
        let mut huge = MAGIC.to_vec();
        huge.write_u32::<LittleEndian>(VERSION).unwrap();
        huge.write_u8(1).unwrap();
        huge.write_u64::<LittleEndian>(u64::MAX).unwrap();
        assert!(matches!(Checkpoint::decode(&huge), Err(Error::Cache(_))));

        // A string claiming u64::MAX bytes
        let mut long = MAGIC.to_vec();
        long.write_u32::<LittleEndian>(VERSION).unwrap();
        long.write_u8(1).unwrap();
        long.write_u64::<LittleEndian>(1).unwrap();
        long.write_u64::<LittleEndian>(u64::MAX).unwrap();
        assert!(matches!(Checkpoint::decode(&long), Err(Error::Cache(_))));
    }

    #[test]
    fn other_format_versions_are_refused() {
        let mut bytes = MAGIC.to_vec();
        bytes.write_u32::<LittleEndian>(VERSION + 1).unwrap();
        match Checkpoint::decode(&bytes) {
            Err(Error::Cache(msg)) => assert!(msg.contains("not supported")),
            _ => panic!("expected a cache error"),
        }
    }

    #[test]
    fn tags_follow_the_file_list() {
        let a = vec![PathBuf::from("x"), PathBuf::from("y")];
        let b = vec![PathBuf::from("x"), PathBuf::from("z")];
        assert_eq!(tag_for_files(&a), tag_for_files(&a.clone()));
        assert_ne!(tag_for_files(&a), tag_for_files(&b));
    }
}
