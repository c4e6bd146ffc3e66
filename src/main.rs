use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use op2_reader::{MatrixData, Op2Reader, ReadOptions, TableContent};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect the tables of an OP2 result file", long_about = None)]
struct Args {
    /// The OP2 file to read.
    file: PathBuf,

    /// Only read result data for these subcase ids (repeatable).
    #[arg(long = "subcase", value_name = "ID")]
    subcases: Vec<i32>,

    /// Read this unknown table as a matrix (repeatable).
    #[arg(long = "matrix", value_name = "NAME")]
    matrices: Vec<String>,

    /// Read every unknown table as a matrix instead of failing.
    #[arg(long)]
    skip_unknown_matrices: bool,

    /// Run a sizing pass before reading.
    #[arg(long)]
    two_pass: bool,

    /// Append a verbose trace of the read to this file.
    #[arg(long, value_name = "PATH")]
    debug_file: Option<PathBuf>,

    /// Keep the raw records of tables without a handler.
    #[arg(long)]
    raw: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let options = ReadOptions {
        subcases: (!args.subcases.is_empty()).then(|| args.subcases.iter().copied().collect()),
        additional_matrices: args.matrices.iter().cloned().collect::<HashSet<_>>(),
        skip_unknown_matrices: args.skip_unknown_matrices,
        two_pass: args.two_pass,
        retain_raw_tables: args.raw,
        debug_file: args.debug_file.clone(),
    };

    println!("Reading OP2 file: {}", args.file.display());
    println!("{}", "=".repeat(60));

    let outcome = match Op2Reader::new(options).read_file(&args.file) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("\nERROR: Failed to read OP2 file");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("\nFile Information:");
    println!("  Byte order: {}", outcome.endian);
    println!("  Header: {:?}", outcome.header.post);
    println!("  Dialect: {:?}", outcome.header.dialect);
    if let Some(version) = &outcome.header.version {
        println!("  Version: {}", version);
    }

    println!("\nTables ({}):", outcome.table_names.len());
    for span in &outcome.spans {
        println!("  {:<8} bytes {}..{}", span.name, span.start, span.end);
    }

    let mut kept: Vec<_> = outcome.tables.iter().collect();
    kept.sort_by(|a, b| a.0.cmp(b.0));
    if !kept.is_empty() {
        println!("\nDecoded Content:");
    }
    for (name, content) in kept {
        match content {
            TableContent::Matrix(m) => {
                let shape = match &m.data {
                    MatrixData::Dense(values) => format!("dense {:?}", values.shape()),
                    MatrixData::Flat { values, .. } => format!("flat [{}]", values.len()),
                    MatrixData::Absent => "no values".to_string(),
                };
                println!(
                    "  {:<8} matrix {} x {} {:?}, {} nonzeros, {}",
                    name, m.rows, m.cols, m.precision, m.nnz, shape
                );
            }
            TableContent::Raw(t) => {
                println!("  {:<8} raw, {} records", name, t.records.len());
            }
        }
    }

    if !outcome.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &outcome.warnings {
            println!("  {}", warning);
        }
    }
}
