//! Measure how freely words of one category combine with words of another
//!
//! Loads the counts saved by `cl-read`, then prints the per-word tables
//! (combinations, entropy) and the strongest pairs by PMI. With `--output`,
//! the four adjacency matrices are written as Numpy files, each with the word
//! lists giving its rows and columns.

// argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
extern crate rand;
// lastly, this library
extern crate composlang;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use rand::rngs::StdRng;
use rand::SeedableRng;
use composlang::checkpoint::CheckpointStore;
use composlang::composition::{AnalysisConfig, Column, CompositionAnalysis, Relation, Statistic, TokenTable};
use composlang::errors::*;
use composlang::numpy;
use composlang::reader::ReaderConfig;

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
            "<tag> 'name of the checkpoint written by cl-read'
            -c, --cache-dir=[DIR] 'where checkpoints are kept'
            --child=[CATEGORY] 'category of the dependent word (default ADJ)'
            --parent=[CATEGORY] 'category of its head (default NOUN)'
            -m, --min-frequency=[COUNT] 'ignore words seen fewer times than this'
            -k, --top=[ROWS] 'how many rows of each table to print (default 10)'
            -o, --output=[DIR] 'write adjacency matrices and word lists here'
            -i, --inspect=[WORD] 'list the observed pairs involving this word'
            -s, --sample=[PAIRS] 'print this many randomly drawn observed pairs'
            --seed=[SEED] 'seed for --sample'")
        .get_matches();

    let cache_dir = args.value_of("cache-dir").map(Path::new)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ReaderConfig::default().checkpoint_dir);
    let tag = args.value_of("tag").unwrap_or_default();
    let checkpoint = CheckpointStore::new(cache_dir).load(tag, true)?
        .ok_or_else(|| Error::Cache(format!("no usable checkpoint for {}", tag)))?;
    info!("{} sentences from {} files", checkpoint.sentences_seen, checkpoint.files.len());

    let mut config = AnalysisConfig::default();
    if let Some(child) = args.value_of("child") {
        config.child_category = child.to_string();
    }
    if let Some(parent) = args.value_of("parent") {
        config.parent_category = parent.to_string();
    }
    if args.is_present("min-frequency") {
        config.min_frequency = value_t!(args, "min-frequency", u64).unwrap_or_else(|e| e.exit());
    }
    let top = if args.is_present("top") {
        value_t!(args, "top", usize).unwrap_or_else(|e| e.exit())
    } else {
        10
    };

    let mut analysis = CompositionAnalysis::new(&checkpoint.stats, config);
    analysis.run_analyses()?;

    print_tokens(analysis.child(), top);
    print_tokens(analysis.parent(), top);
    for &relation in &[Relation::Direct, Relation::Skip] {
        let pairs = analysis.pairs(relation);
        println!("\n{:?} pairs: {}", relation, pairs.len());
        println!("child\tparent\tfrequency\tpmi");
        let pmi = pairs.pmi().unwrap_or(&[]);
        for (i, (edge, ct)) in pairs.iter().enumerate().take(top) {
            let score = pmi.get(i).cloned().unwrap_or(None)
                .map_or_else(|| "-".to_string(), |p| format!("{:.4}", p));
            println!("{}\t{}\t{}\t{}", edge.child, edge.parent, ct, score);
        }
    }

    if let Some(word) = args.value_of("inspect") {
        println!("\nPairs involving {:?}", word);
        for (edge, ct) in analysis.inspect_neighborhood(word) {
            println!("{}\t{}\t{}", edge.child, edge.parent, ct);
        }
    }
    if args.is_present("sample") {
        let n = value_t!(args, "sample", usize).unwrap_or_else(|e| e.exit());
        let mut rng = if args.is_present("seed") {
            StdRng::seed_from_u64(value_t!(args, "seed", u64).unwrap_or_else(|e| e.exit()))
        } else {
            StdRng::from_entropy()
        };
        println!("\nSample of {} pairs", n);
        for (edge, ct) in analysis.sample_combinations(n, &mut rng) {
            println!("{}\t{}\t{}", edge.child, edge.parent, ct);
        }
    }

    if let Some(output) = args.value_of("output") {
        let output = Path::new(output);
        fs::create_dir_all(output)?;
        write_words(&output.join("child_words.txt"), analysis.child())?;
        write_words(&output.join("parent_words.txt"), analysis.parent())?;
        for &relation in &[Relation::Direct, Relation::Skip] {
            for &statistic in &[Statistic::Frequency, Statistic::Unique] {
                let name = format!("{:?}_{:?}.npy", relation, statistic).to_lowercase();
                let matrix = analysis.adjacency_matrix(relation, statistic)?;
                numpy::write_matrix(output.join(&name), matrix)?;
                info!("Wrote {}", output.join(&name).display());
            }
        }
    }
    Ok(())
}

fn print_tokens(table: &TokenTable, top: usize) {
    let columns: Vec<Column> = table.computed().collect();
    println!("\n{} words: {}", table.category, table.len());
    let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
    println!("word\tfrequency\t{}", names.join("\t"));
    for (word, freq) in table.words().iter().zip(table.freqs()).take(top) {
        let values: Vec<String> = columns.iter()
            .map(|&c| table.get(word, c).map_or_else(|| "-".to_string(), |x| format!("{:.4}", x)))
            .collect();
        println!("{}\t{}\t{}", word.text, freq, values.join("\t"));
    }
}

/// One word per line, in matrix order
fn write_words(path: &Path, table: &TokenTable) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for word in table.words() {
        writeln!(writer, "{}", word.text)?;
    }
    writer.flush()?;
    Ok(())
}
