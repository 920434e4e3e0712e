//! Tally the words and dependency pairs of a parsed corpus
//!
//! Progress is checkpointed after every batch, so an interrupted run picks up
//! where it left off when started again with the same inputs.

// argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
// lastly, this library
extern crate composlang;

use std::path::PathBuf;
use composlang::errors::*;
use composlang::reader::{CorpusReader, ReaderConfig};
use composlang::schema::Schema;
use composlang::zipf;

pub fn main() {
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    if let Err(e) = inner_main() {
        error!("{}", e);
        eprintln!("Could not recover. Exiting: {}", e);
        ::std::process::exit(1);
    }
}

pub fn inner_main() -> Result<()> {
    env_logger::init();
    let args = app_from_crate!()
        .args_from_usage(
            "<input>... 'token-per-line corpus files, or directories of them'
            -t, --tag=[TAG] 'name of the checkpoint (defaults to a hash of the file list)'
            -n, --limit=[SENTENCES] 'stop after this many sentences in total'
            -b, --batch-size=[SENTENCES] 'sentences per batch, and per checkpoint'
            -c, --cache-dir=[DIR] 'where checkpoints are kept'
            -w, --workers=[THREADS] 'threads for counting (defaults to one per core)'
            -f, --format=[FIELDS] 'comma separated name:type columns, including sentence_id'
            -d, --delimiter=[DELIM] 'column separator (defaults to a tab)'
            --keep-case 'do not lowercase words'
            --require-checkpoint 'fail instead of starting over when there is no usable checkpoint'")
        .get_matches();

    let mut config = ReaderConfig::default();
    if let Some(fields) = args.value_of("format") {
        let fields: Vec<&str> = fields.split(',').collect();
        config.schema = Schema::parse(&fields)?;
    }
    if let Some(delimiter) = args.value_of("delimiter") {
        config.delimiter = delimiter.replace("\\t", "\t");
    }
    if args.is_present("limit") {
        config.sentence_limit = Some(value_t!(args, "limit", u64).unwrap_or_else(|e| e.exit()));
    }
    if args.is_present("batch-size") {
        config.batch_size = value_t!(args, "batch-size", usize).unwrap_or_else(|e| e.exit());
    }
    if args.is_present("workers") {
        config.workers = Some(value_t!(args, "workers", usize).unwrap_or_else(|e| e.exit()));
    }
    if let Some(dir) = args.value_of("cache-dir") {
        config.checkpoint_dir = PathBuf::from(dir);
    }
    config.tag = args.value_of("tag").map(String::from);
    config.lowercase = !args.is_present("keep-case");
    config.require_checkpoint = args.is_present("require-checkpoint");

    let inputs: Vec<&str> = args.values_of("input").map(|v| v.collect()).unwrap_or_default();
    let mut reader = CorpusReader::open(inputs, config)?;
    reader.run()?;

    let stats = reader.stats();
    println!("tag\t{}", reader.tag());
    println!("checkpoint\t{}", reader.checkpoint_path().display());
    println!("sentences\t{}", reader.sentences_seen());
    println!("lines\t{}", reader.lines_read());
    println!("tokens\t{}", stats.total_tokens());
    println!("unique tokens\t{}", stats.tokens.len());
    println!("unique pairs\t{}", stats.pairs.len());
    println!("unique skip pairs\t{}", stats.skip_pairs.len());
    let unique = stats.category_counts(true);
    for (category, count) in stats.category_counts(false) {
        println!("category {}\t{}\t{} distinct", category, count, unique.get(&category).unwrap_or(&0));
    }

    let freqs: Vec<u64> = stats.tokens.values().copied().collect();
    match zipf::fit(&freqs) {
        Ok(fit) => println!("zipf slope\t{:.4}\tintercept\t{:.4}\tr\t{:.4}", fit.slope, fit.intercept, fit.r),
        Err(e) => info!("Skipping the rank/frequency fit: {}", e),
    }
    Ok(())
}
