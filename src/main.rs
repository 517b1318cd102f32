use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;

use tboxscan::fasta::SequenceIndex;
use tboxscan::infernal::read_report_file;
use tboxscan::output::write_predictions_file;
use tboxscan::predict::{PredictConfig, TboxPredictor};
use tboxscan::thermo::ViennaRna;

/// tboxscan - translational T-box prediction from INFERNAL hits
///
/// Reads a cmsearch alignment report, locates stem 1, the specifier loop,
/// the antiterminator and the discriminator of every hit, and maps them onto
/// the source sequences.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// INFERNAL cmsearch output (plain or bgzip-compressed)
    #[clap(value_name = "INFERNAL")]
    infernal: PathBuf,

    /// Output CSV file
    #[clap(value_name = "OUTPUT")]
    output: PathBuf,

    /// FASTA file with the sequences searched by INFERNAL
    #[clap(short = 'f', long = "fasta")]
    fasta: Option<PathBuf>,

    /// Hits scoring below this get a LOW_SCORE warning
    #[clap(short = 'c', long = "score-cutoff", default_value = "15")]
    score_cutoff: f64,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value = "4")]
    threads: usize,

    /// Skip terminator and antiterminator folding
    #[clap(long = "no-thermo")]
    no_thermo: bool,

    /// RNAfold executable
    #[clap(long = "rnafold", default_value = "RNAfold")]
    rnafold: PathBuf,

    /// RNAeval executable
    #[clap(long = "rnaeval", default_value = "RNAeval")]
    rnaeval: PathBuf,

    /// Folding temperature in degrees Celsius
    #[clap(long = "temperature", default_value = "37")]
    temperature: f64,

    /// Verbosity (-v info, -vv debug)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Set up rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    let hits = read_report_file(&args.infernal)?;
    info!("Read {} hits from {}", hits.len(), args.infernal.display());

    let fasta = match &args.fasta {
        Some(path) => {
            let index = SequenceIndex::from_path(path)?;
            info!("Read {} sequences from {}", index.len(), path.display());
            Some(index)
        }
        None => None,
    };

    let config = PredictConfig {
        score_cutoff: args.score_cutoff,
        thermo: !args.no_thermo,
        source: args.fasta.as_ref().map(|p| p.display().to_string()),
    };
    let oracle = ViennaRna::new()
        .with_rnafold(&args.rnafold)
        .with_rnaeval(&args.rnaeval)
        .with_temperature(args.temperature);
    let predictor = TboxPredictor::new(config).with_oracle(Box::new(oracle));

    let predictions = predictor.predict(hits, fasta.as_ref());
    write_predictions_file(
        &args.output,
        &predictions,
        predictor.config().source.as_deref(),
    )?;
    info!(
        "Wrote {} rows to {}",
        predictions.len(),
        args.output.display()
    );

    Ok(())
}
