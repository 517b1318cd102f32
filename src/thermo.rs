//! Thermodynamic view of a T-box: terminator and antiterminator folds.
//!
//! Folding itself is delegated to a [`FoldingOracle`]; [`ViennaRna`] drives
//! the ViennaRNA command line tools. Oracle failures never abort a hit, they
//! leave the affected columns empty and keep the error text.

use crate::features::FeatureSet;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

/// Residues from the antiterminator start through the discriminator, kept
/// unpaired in the terminator conformation
pub const ANTITERMINATOR_LEAD: usize = 10;

/// Paired base, an unpaired run of at least four, paired base
static BULGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(][.]{4,}[(]").expect("valid bulge pattern"));
static DISCRIMINATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[TU]GG[ACGTU]").expect("valid discriminator pattern"));

const BAD_ANTITERM_STEM: &str = "BAD_ANTITERM_STEM";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fold {
    pub structure: String,
    pub energy: Option<f64>,
    /// Whatever the folding program reported on stderr
    pub errors: String,
}

impl Fold {
    fn failed(error: &anyhow::Error) -> Self {
        Fold {
            errors: format!("{error:#}"),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub energy: Option<f64>,
    pub errors: String,
}

/// Secondary-structure prediction and free-energy evaluation.
///
/// Calls are synchronous and side-effect free; an `Err` is a missing result.
pub trait FoldingOracle: Sync {
    /// Minimum free energy structure of `sequence`
    fn fold(&self, sequence: &str) -> Result<Fold>;

    /// Fold under a dot-bracket constraint where `x` forbids pairing
    fn fold_constrained(&self, sequence: &str, constraints: &str) -> Result<Fold>;

    /// Free energy of `sequence` in the given `structure`
    fn eval(&self, sequence: &str, structure: &str) -> Result<Evaluation>;
}

/// ViennaRNA `RNAfold`/`RNAeval` run as subprocesses
#[derive(Debug, Clone)]
pub struct ViennaRna {
    rnafold: PathBuf,
    rnaeval: PathBuf,
    temperature: f64,
}

impl Default for ViennaRna {
    fn default() -> Self {
        ViennaRna {
            rnafold: PathBuf::from("RNAfold"),
            rnaeval: PathBuf::from("RNAeval"),
            temperature: 37.0,
        }
    }
}

impl ViennaRna {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rnafold<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.rnafold = path.into();
        self
    }

    pub fn with_rnaeval<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.rnaeval = path.into();
        self
    }

    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature = celsius;
        self
    }

    /// Feed `input` on stdin, return (stdout, stderr)
    fn run(&self, program: &Path, args: &[&str], input: &str) -> Result<(String, String)> {
        let temperature = self.temperature.to_string();
        let mut child = Command::new(program)
            .args(["-T", temperature.as_str()])
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .with_context(|| format!("Failed to write to {}", program.display()))?;
        }
        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                single_line(&stderr)
            );
        }
        Ok((stdout, stderr))
    }
}

impl FoldingOracle for ViennaRna {
    fn fold(&self, sequence: &str) -> Result<Fold> {
        let (stdout, stderr) = self.run(&self.rnafold, &["--noPS"], sequence)?;
        parse_fold_output(&stdout, &stderr)
    }

    fn fold_constrained(&self, sequence: &str, constraints: &str) -> Result<Fold> {
        let input = format!("{sequence}\n{constraints}");
        let (stdout, stderr) = self.run(&self.rnafold, &["--noPS", "-C"], &input)?;
        parse_fold_output(&stdout, &stderr)
    }

    fn eval(&self, sequence: &str, structure: &str) -> Result<Evaluation> {
        let input = format!("{sequence}\n{structure}");
        let (stdout, stderr) = self.run(&self.rnaeval, &[], &input)?;
        parse_eval_output(&stdout, &stderr)
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `(-12.30)` or `-12.30)` -> -12.3
fn parse_energy(token: &str) -> Option<f64> {
    token
        .trim_matches(|c| c == '(' || c == ')')
        .parse()
        .ok()
}

/// The structure line is the last line of RNAfold output: `..((...)). (-1.20)`
pub fn parse_fold_output(stdout: &str, stderr: &str) -> Result<Fold> {
    let lines: Vec<&str> = stdout.split('\n').collect();
    if lines.len() < 2 {
        bail!("no structure in RNAfold output: {}", single_line(stderr));
    }
    let mut fields = lines[lines.len() - 2].split_whitespace();
    let structure = fields
        .next()
        .ok_or_else(|| anyhow!("empty structure line in RNAfold output"))?;
    let energy = fields.last().and_then(parse_energy);

    Ok(Fold {
        structure: structure.to_string(),
        energy,
        errors: single_line(stderr),
    })
}

/// RNAeval prints the structure followed by the energy as the last token
pub fn parse_eval_output(stdout: &str, stderr: &str) -> Result<Evaluation> {
    let token = stdout
        .split_whitespace()
        .last()
        .ok_or_else(|| anyhow!("no energy in RNAeval output: {}", single_line(stderr)))?;
    Ok(Evaluation {
        energy: parse_energy(token),
        errors: single_line(stderr),
    })
}

/// `text[start..end]` with both ends clamped; `None` when nothing is left
fn clamped_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    let end = end.min(text.len());
    if start >= end {
        return None;
    }
    text.get(start..end)
}

/// Hard constraints for refolding an antiterminator.
///
/// Everything 3' of the last closing bracket (plus one) is forced unpaired,
/// as is the `UGGN` discriminator sitting in the first bulge of four or more
/// unpaired residues. Returns `None` without such a bulge or discriminator.
pub fn antiterminator_constraints(sequence: &str, structure: &str) -> Option<String> {
    let keep = match structure.rfind(')') {
        Some(i) if i > 0 => i + 2,
        _ => structure.len() + 1,
    }
    .min(structure.len());

    let bulge = BULGE.find(structure)?;
    let window_start = (bulge.start() + 1).min(sequence.len());
    let window = sequence.get(window_start..bulge.end().min(sequence.len()))?;
    let discriminator = DISCRIMINATOR.find(window)?;

    let mut constraints: Vec<u8> = structure.as_bytes()[..keep].to_vec();
    constraints.resize(structure.len(), b'x');
    let from = window_start + discriminator.start();
    let to = (from + discriminator.len()).min(constraints.len());
    constraints[from.min(to)..to].fill(b'x');

    String::from_utf8(constraints).ok()
}

/// Refold the antiterminator under [`antiterminator_constraints`]. The base
/// right before the discriminator must come out paired, otherwise the error
/// text gains `BAD_ANTITERM_STEM`.
pub fn refold_antiterminator<O: FoldingOracle + ?Sized>(
    oracle: &O,
    sequence: &str,
    structure: &str,
) -> Option<Fold> {
    let constraints = antiterminator_constraints(sequence, structure)?;
    let mut fold = oracle
        .fold_constrained(sequence, &constraints)
        .unwrap_or_else(|e| {
            warn!("Constrained antiterminator fold failed: {e:#}");
            Fold::failed(&e)
        });
    if fold.structure.as_bytes().get(3) != Some(&b'(') {
        fold.errors.push_str(BAD_ANTITERM_STEM);
    }
    Some(fold)
}

/// Splice `tail` onto the whole-T-box structure at the antiterminator.
///
/// `antiterm_start` is 1-based. Returns the spliced structure and the
/// 1-based position of its first pair at or after the splice point.
pub fn splice_structure(
    antiterm_start: usize,
    whole: &str,
    tail: &str,
) -> Option<(String, Option<usize>)> {
    let start = antiterm_start.checked_sub(1).filter(|&s| s > 0)?;
    let prefix = whole.get(..start.min(whole.len()))?;
    let spliced = format!("{prefix}{tail}");
    let first_pair = spliced
        .get(start..)
        .and_then(|rest| rest.find('('))
        .map(|i| start + i + 1);
    Some((spliced, first_pair))
}

/// Thermodynamic columns of one hit; `None` where an input was missing or
/// the oracle produced nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermoAnalysis {
    pub term_sequence: Option<String>,
    pub term_structure: Option<String>,
    pub term_errors: String,
    pub antiterm_term_sequence: Option<String>,
    pub infernal_antiterminator_structure: Option<String>,
    pub vienna_antiterminator: Option<Fold>,
    pub terminator_structure: Option<String>,
    pub terminator_energy: Option<f64>,
    pub terminator_errors: String,
    pub whole_term_structure: Option<String>,
    pub term_start: Option<usize>,
    pub folded_antiterm_structure: Option<String>,
}

/// Fold the terminator and refold the antiterminator of a projected hit.
///
/// `source` is the full FASTA sequence, `whole` the resolved dot-bracket
/// structure over it, and `term_end` the 1-based terminator end.
pub fn analyze<O: FoldingOracle + ?Sized>(
    oracle: &O,
    source: &str,
    whole: Option<&str>,
    features: &FeatureSet,
    term_end: usize,
) -> ThermoAnalysis {
    let mut analysis = ThermoAnalysis::default();

    analysis.term_sequence = features
        .discrim_end
        .and_then(|discrim_end| clamped_slice(source, discrim_end, term_end))
        .map(str::to_string);
    if let Some(term_sequence) = &analysis.term_sequence {
        match oracle.fold(term_sequence) {
            Ok(fold) => {
                analysis.term_errors = fold.errors;
                analysis.term_structure = Some(fold.structure);
            }
            Err(e) => {
                warn!("Terminator fold failed: {e:#}");
                analysis.term_errors = format!("{e:#}");
            }
        }
    }

    let antiterm_from = features.antiterm_start.map(|a| a.saturating_sub(1));
    analysis.antiterm_term_sequence = antiterm_from
        .and_then(|from| clamped_slice(source, from, term_end))
        .map(str::to_string);
    analysis.infernal_antiterminator_structure = antiterm_from
        .zip(whole)
        .and_then(|(from, whole)| clamped_slice(whole, from, term_end))
        .map(str::to_string);

    if let (Some(sequence), Some(structure)) = (
        &analysis.antiterm_term_sequence,
        &analysis.infernal_antiterminator_structure,
    ) {
        analysis.vienna_antiterminator = refold_antiterminator(oracle, sequence, structure);
    }

    analysis.terminator_structure = analysis
        .term_structure
        .as_ref()
        .map(|s| format!("{}{s}", ".".repeat(ANTITERMINATOR_LEAD)));
    if let (Some(sequence), Some(structure)) =
        (&analysis.antiterm_term_sequence, &analysis.terminator_structure)
    {
        match oracle.eval(sequence, structure) {
            Ok(evaluation) => {
                analysis.terminator_energy = evaluation.energy;
                analysis.terminator_errors = evaluation.errors;
            }
            Err(e) => {
                warn!("Terminator evaluation failed: {e:#}");
                analysis.terminator_errors = format!("{e:#}");
            }
        }
    }

    if let (Some(antiterm_start), Some(whole)) = (features.antiterm_start, whole) {
        if let Some(terminator) = &analysis.terminator_structure {
            if let Some((spliced, term_start)) = splice_structure(antiterm_start, whole, terminator)
            {
                analysis.whole_term_structure = Some(spliced);
                analysis.term_start = term_start;
            }
        }
        analysis.folded_antiterm_structure = analysis
            .vienna_antiterminator
            .as_ref()
            .filter(|fold| !fold.structure.is_empty())
            .and_then(|fold| splice_structure(antiterm_start, whole, &fold.structure))
            .map(|(spliced, _)| spliced);
    } else {
        debug!("No antiterminator start or whole structure; skipping splices");
    }

    analysis
}
