//! Resumable, batched reading of a parsed corpus
//!
//! Files are read in sorted order. Sentences are collected into batches; each
//! batch is digested in parallel, summed into the running totals, and then
//! the whole state is checkpointed before the next batch starts. Rerunning
//! with the same input and tag picks up after the last checkpointed batch.
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use crate::checkpoint::{self, Checkpoint, CheckpointStore};
use crate::digest;
use crate::errors::*;
use crate::schema::{Schema, TokenRecord};
use crate::sentence::{ColumnParser, Sentence, SentenceAssembler, SentenceParser};
use crate::stats::CorpusStats;

/// How to read a corpus, and where to keep its checkpoints
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub schema: Schema,
    pub delimiter: String,
    pub lowercase: bool,
    /// Stop after this many sentences; None reads everything
    pub sentence_limit: Option<u64>,
    /// Sentences per batch; also how often checkpoints are written
    pub batch_size: usize,
    /// Digesting threads; None lets rayon decide
    pub workers: Option<usize>,
    pub checkpoint_dir: PathBuf,
    /// Checkpoint name; derived from the file list when None
    pub tag: Option<String>,
    /// Fail instead of starting fresh when the checkpoint is absent or incomplete
    pub require_checkpoint: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            schema: Schema::default(),
            delimiter: "\t".to_string(),
            lowercase: true,
            sentence_limit: None,
            batch_size: 1024,
            workers: None,
            checkpoint_dir: PathBuf::from("./cache/composlang"),
            tag: None,
            require_checkpoint: false,
        }
    }
}

/// Expand directories to the regular files they hold, then sort
pub fn resolve_files<I, P>(inputs: I) -> Result<Vec<PathBuf>>
    where I: IntoIterator<Item = P>, P: AsRef<Path> {
    let mut files = vec![];
    for input in inputs {
        let input = input.as_ref();
        let resolved = fs::canonicalize(input)
            .map_err(|e| Error::Config(format!("could not find files at {}: {}", input.display(), e)))?;
        if resolved.is_dir() {
            for entry in fs::read_dir(&resolved)? {
                let path = entry?.path();
                if path.is_file() {
                    files.push(path);
                }
            }
        } else {
            files.push(resolved);
        }
    }
    files.sort();
    files.dedup();
    if files.is_empty() {
        return Err(Error::Config("no input files to read".to_string()));
    }
    Ok(files)
}

fn reached(limit: Option<u64>, n: u64) -> bool {
    limit.map_or(false, |l| n >= l)
}

/// Non-blank lines of several files in turn, skipping a prefix, as records
struct LineStream<'a> {
    files: &'a [PathBuf],
    next_file: usize,
    current: Option<(Arc<PathBuf>, Lines<BufReader<File>>, usize)>,
    schema: &'a Schema,
    delimiter: &'a str,
    to_skip: u64,
}

impl<'a> LineStream<'a> {
    fn new(files: &'a [PathBuf], schema: &'a Schema, delimiter: &'a str, to_skip: u64) -> Self {
        LineStream { files, next_file: 0, current: None, schema, delimiter, to_skip }
    }
}

impl<'a> Iterator for LineStream<'a> {
    type Item = Result<TokenRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let path = self.files.get(self.next_file)?;
                self.next_file += 1;
                match File::open(path) {
                    Ok(f) => {
                        if self.to_skip == 0 {
                            info!("Processing {}", path.display());
                        }
                        self.current = Some((Arc::new(path.clone()), BufReader::new(f).lines(), 0));
                    }
                    Err(e) => return Some(Err(e.into())),
                }
            }
            let (source, lines, line_number) = self.current.as_mut()?;
            match lines.next() {
                None => {
                    self.current = None;
                }
                Some(Err(ref e)) if e.kind() == io::ErrorKind::InvalidData => {
                    *line_number += 1;
                    return Some(Err(Error::parse(source.as_path(), *line_number, "<invalid utf-8>",
                        "the line is not valid UTF-8")));
                }
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(line)) => {
                    *line_number += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    if self.to_skip > 0 {
                        self.to_skip -= 1;
                        if self.to_skip == 0 {
                            info!("Caught up with the checkpoint in {}", source.display());
                        }
                        continue;
                    }
                    return Some(self.schema.segment(&line, self.delimiter, source, *line_number));
                }
            }
        }
    }
}

/// Count the non-blank lines of every file
fn count_lines(files: &[PathBuf]) -> Result<u64> {
    let mut total = 0;
    for path in files {
        for line in BufReader::new(File::open(path)?).lines() {
            if !line?.trim().is_empty() {
                total += 1;
            }
        }
    }
    Ok(total)
}

/// Reads a corpus into `CorpusStats`, checkpointing after every batch
pub struct CorpusReader<P = ColumnParser> {
    config: ReaderConfig,
    parser: P,
    files: Vec<PathBuf>,
    tag: String,
    store: CheckpointStore,
    state: Checkpoint,
    pool: ThreadPool,
}

impl CorpusReader<ColumnParser> {
    /// Open a corpus that's already dependency parsed, one token per line
    pub fn open<I, Q>(inputs: I, config: ReaderConfig) -> Result<Self>
        where I: IntoIterator<Item = Q>, Q: AsRef<Path> {
        let parser = ColumnParser::new(&config.schema, config.lowercase)?;
        CorpusReader::open_with_parser(inputs, config, parser)
    }
}

impl<P: SentenceParser> CorpusReader<P> {
    /// Open a corpus with a custom parser, loading its checkpoint if any
    pub fn open_with_parser<I, Q>(inputs: I, config: ReaderConfig, parser: P) -> Result<Self>
        where I: IntoIterator<Item = Q>, Q: AsRef<Path> {
        if config.batch_size == 0 {
            return Err(Error::Config("the batch size must be at least 1".to_string()));
        }
        if config.delimiter.is_empty() {
            return Err(Error::Config("the delimiter can't be empty".to_string()));
        }
        if config.sentence_limit == Some(0) {
            return Err(Error::Config("a sentence limit of 0 would read nothing".to_string()));
        }
        let files = resolve_files(inputs)?;
        let tag = config.tag.clone().unwrap_or_else(|| checkpoint::tag_for_files(&files));
        let store = CheckpointStore::new(config.checkpoint_dir.clone());

        let mut state = match store.load(&tag, config.require_checkpoint)? {
            Some(state) => {
                if state.files != files {
                    return Err(Error::Cache(format!(
                        "checkpoint {} was written for {} other files; use another tag",
                        tag, state.files.len())));
                }
                state
            }
            None => Checkpoint { files: files.clone(), ..Checkpoint::default() },
        };
        // The limit given now wins, so a limited run can be extended later.
        if state.sentence_limit != config.sentence_limit {
            state.total = config.sentence_limit;
        }
        state.sentence_limit = config.sentence_limit;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers.unwrap_or(0))
            .build()?;
        info!("Opened {} files under tag {} ({} sentences already seen)",
            files.len(), tag, state.sentences_seen);
        Ok(CorpusReader { config, parser, files, tag, store, state, pool })
    }

    /// Read until the sentence limit or the end of the corpus
    pub fn run(&mut self) -> Result<()> {
        let limit = self.state.sentence_limit;
        if reached(limit, self.state.sentences_seen) {
            info!("Already saw {} sentences, nothing to do", self.state.sentences_seen);
            return Ok(());
        }
        if self.state.total.is_none() {
            let total = count_lines(&self.files)?;
            info!("Preparing to read {} lines", total);
            self.state.total = Some(total);
        }

        let CorpusReader { ref config, ref parser, ref files, ref tag, ref store, ref mut state, ref pool } = *self;
        let records = LineStream::new(files, &config.schema, &config.delimiter, state.lines_read);
        let mut batch: Vec<Sentence> = Vec::with_capacity(config.batch_size);
        let mut batch_lines = 0;
        let mut current = None;
        let mut anchor = Instant::now();

        for assembled in SentenceAssembler::new(records, parser) {
            let assembled = assembled?;
            batch.push(assembled.sentence);
            batch_lines += assembled.lines as u64;
            current = Some(assembled.source);

            if batch.len() >= config.batch_size
                || reached(limit, state.sentences_seen + batch.len() as u64) {
                commit(pool, store, tag, state, &mut batch, batch_lines, &current, &mut anchor)?;
                batch_lines = 0;
            }
            if reached(limit, state.sentences_seen) {
                break;
            }
        }
        if !batch.is_empty() {
            commit(pool, store, tag, state, &mut batch, batch_lines, &current, &mut anchor)?;
        }
        info!("Finished processing after seeing {} sentences", state.sentences_seen);
        Ok(())
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.state.stats
    }

    pub fn into_stats(self) -> CorpusStats {
        self.state.stats
    }

    pub fn sentences_seen(&self) -> u64 {
        self.state.sentences_seen
    }

    pub fn lines_read(&self) -> u64 {
        self.state.lines_read
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.state.current_file.as_ref().map(|p| p.as_path())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.store.path(&self.tag)
    }
}

/// Digest a batch, fold it into the totals and persist everything
#[allow(clippy::too_many_arguments)]
fn commit(pool: &ThreadPool, store: &CheckpointStore, tag: &str, state: &mut Checkpoint,
          batch: &mut Vec<Sentence>, lines: u64, current: &Option<Arc<PathBuf>>,
          anchor: &mut Instant) -> Result<()> {
    let sentences: &[Sentence] = batch;
    let local = pool.install(|| digest::digest_batch(sentences));
    state.stats.merge(local);
    state.lines_read += lines;
    state.sentences_seen += batch.len() as u64;
    state.current_file = current.as_ref().map(|p| p.as_ref().clone());
    store.save(tag, state)?;

    let elapsed = anchor.elapsed().as_secs_f64();
    info!("Processed a batch of {} sentences in {:.3} sec ({:.1} sents/sec)",
        batch.len(), elapsed, batch.len() as f64 / elapsed.max(1e-9));
    match (state.sentence_limit, state.total) {
        (Some(limit), _) => info!("{} of {} sentences", state.sentences_seen, limit),
        (None, Some(total)) => info!("{} of {} lines ({:.1}%)",
            state.lines_read, total, 100.0 * state.lines_read as f64 / total.max(1) as f64),
        (None, None) => {}
    }
    info!("Accumulated unique tokens: {}; unique pairs: {}; skip pairs: {}",
        state.stats.tokens.len(), state.stats.pairs.len(), state.stats.skip_pairs.len());
    batch.clear();
    *anchor = Instant::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        for l in lines {
            writeln!(f, "{}", l).unwrap();
        }
        path
    }

    #[test]
    fn streams_skip_blank_and_checkpointed_lines() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a", &["1\tx", "", "1\ty", "2\tz"]);
        let b = write(dir.path(), "b", &["  ", "1\tw"]);
        let files = vec![a, b];
        let schema = Schema::parse(&["sentence_id:int", "text:str"]).unwrap();
        let texts: Vec<String> = LineStream::new(&files, &schema, "\t", 2)
            .map(|r| r.unwrap().values[1].to_string())
            .collect();
        assert_eq!(texts, vec!["z", "w"]);
        assert_eq!(count_lines(&files).unwrap(), 4);
    }

    #[test]
    fn line_numbers_count_blank_lines() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a", &["", "1\tx"]);
        let files = vec![a];
        let schema = Schema::parse(&["sentence_id:int", "text:str"]).unwrap();
        let rec = LineStream::new(&files, &schema, "\t", 0).next().unwrap().unwrap();
        assert_eq!(rec.line_number, 2);
    }

    #[test]
    fn invalid_utf8_names_the_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1");
        fs::write(&path, b"1\tx\n\n2\tcaf\xe9\n").unwrap();
        let files = vec![path.clone()];
        let schema = Schema::parse(&["sentence_id:int", "text:str"]).unwrap();
        let mut records = LineStream::new(&files, &schema, "\t", 0);
        assert!(records.next().unwrap().is_ok());
        match records.next() {
            Some(Err(Error::Parse { file, line_number, .. })) => {
                assert_eq!(file, path);
                assert_eq!(line_number, 3);
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn resolves_directories_sorted() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.tsv", &[]);
        write(dir.path(), "a.tsv", &[]);
        fs::create_dir(dir.path().join("nested")).unwrap();
        let files = resolve_files(&[dir.path()]).unwrap();
        let names: Vec<String> = files.iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.tsv", "b.tsv"]);
        assert!(matches!(resolve_files(&[dir.path().join("absent")]), Err(Error::Config(_))));
        assert!(matches!(resolve_files(&[dir.path().join("nested")]), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_bad_configs() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a", &["1\tx\tx\t1\t0\tX\troot"]);
        let config = ReaderConfig { batch_size: 0, checkpoint_dir: dir.path().join("c"), ..Default::default() };
        assert!(matches!(CorpusReader::open(&[&a], config), Err(Error::Config(_))));
        let schema = Schema::parse(&["sentence_id:int", "text:str"]).unwrap();
        let config = ReaderConfig { schema, checkpoint_dir: dir.path().join("c"), ..Default::default() };
        // No upos or head column for the column parser
        assert!(matches!(CorpusReader::open(&[&a], config), Err(Error::Config(_))));
    }
}
