//! CSV output table.
//!
//! One row per [`Prediction`], under a fixed header. Missing coordinates are
//! written as `-1`, missing text and energies as empty fields.

use crate::predict::Prediction;
use crate::thermo::Fold;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Value of the `type` column
const TBOX_TYPE: &str = "Translational";

#[derive(Debug, Serialize)]
struct Row<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "FASTA_sequence")]
    fasta_sequence: Option<&'a str>,
    #[serde(rename = "Rank")]
    rank: Option<u32>,
    #[serde(rename = "E_value")]
    e_value: Option<f64>,
    #[serde(rename = "Score")]
    score: Option<f64>,
    #[serde(rename = "Bias")]
    bias: Option<f64>,
    #[serde(rename = "Tbox_start")]
    tbox_start: i64,
    #[serde(rename = "Tbox_end")]
    tbox_end: i64,
    #[serde(rename = "CM_accuracy")]
    cm_accuracy: Option<f64>,
    #[serde(rename = "GC")]
    gc: Option<f64>,
    #[serde(rename = "Sequence")]
    sequence: Option<&'a str>,
    #[serde(rename = "Structure")]
    structure: Option<&'a str>,
    s1_start: i64,
    s1_loop_start: i64,
    s1_loop_end: i64,
    s1_end: i64,
    antiterm_start: i64,
    antiterm_end: i64,
    term_start: i64,
    term_end: i64,
    codon_start: i64,
    codon_end: i64,
    codon: &'a str,
    codon_region: &'a str,
    discrim_start: i64,
    discrim_end: i64,
    discriminator: &'a str,
    warnings: String,
    #[serde(rename = "type")]
    tbox_type: &'a str,
    source: Option<&'a str>,
    whole_antiterm_structure: Option<&'a str>,
    other_stems: Option<String>,
    whole_antiterm_warnings: Option<String>,
    term_sequence: Option<&'a str>,
    term_structure: Option<&'a str>,
    terminator_energy: Option<f64>,
    term_errors: Option<&'a str>,
    antiterm_term_sequence: Option<&'a str>,
    infernal_antiterminator_structure: Option<&'a str>,
    vienna_antiterminator_structure: Option<&'a str>,
    vienna_antiterminator_energy: Option<f64>,
    vienna_antiterminator_errors: Option<&'a str>,
    terminator_structure: Option<&'a str>,
    terminator_errors: Option<&'a str>,
    whole_term_structure: Option<&'a str>,
    folded_antiterm_structure: Option<&'a str>,
}

fn coordinate(position: Option<usize>) -> i64 {
    position.map_or(-1, |p| p as i64)
}

/// `[[3, 8], [10, 14]]`
fn render_stems(stems: &[[usize; 2]]) -> String {
    let inner: Vec<String> = stems
        .iter()
        .map(|[open, close]| format!("[{open}, {close}]"))
        .collect();
    format!("[{}]", inner.join(", "))
}

impl<'a> Row<'a> {
    fn new(prediction: &'a Prediction, source: Option<&'a str>) -> Self {
        let hit = prediction.hit.as_ref();
        let features = &prediction.features;
        let resolved = prediction.resolved.as_ref();
        let thermo = prediction.thermo.as_ref();
        let vienna: Option<&Fold> = thermo.and_then(|t| t.vienna_antiterminator.as_ref());

        Row {
            name: &prediction.name,
            fasta_sequence: prediction.fasta_sequence.as_deref(),
            rank: hit.map(|h| h.rank),
            e_value: hit.map(|h| h.e_value),
            score: hit.map(|h| h.score),
            bias: hit.map(|h| h.bias),
            tbox_start: coordinate(hit.map(|h| h.start)),
            tbox_end: coordinate(hit.map(|h| h.end)),
            cm_accuracy: hit.map(|h| h.cm_accuracy),
            gc: hit.map(|h| h.gc),
            sequence: hit.map(|h| h.sequence.as_str()),
            structure: hit.map(|h| h.structure.as_str()),
            s1_start: coordinate(features.s1_start),
            s1_loop_start: coordinate(features.s1_loop_start),
            s1_loop_end: coordinate(features.s1_loop_end),
            s1_end: coordinate(features.s1_end),
            antiterm_start: coordinate(features.antiterm_start),
            antiterm_end: coordinate(features.antiterm_end),
            term_start: coordinate(thermo.and_then(|t| t.term_start)),
            term_end: coordinate(prediction.term_end),
            codon_start: coordinate(features.codon_start),
            codon_end: coordinate(features.codon_end),
            codon: &features.codon,
            codon_region: &features.codon_region,
            discrim_start: coordinate(features.discrim_start),
            discrim_end: coordinate(features.discrim_end),
            discriminator: &features.discriminator,
            warnings: features.warnings.to_string(),
            tbox_type: TBOX_TYPE,
            source,
            whole_antiterm_structure: resolved.map(|r| r.dot_structure.as_str()),
            other_stems: resolved.map(|r| render_stems(&r.stems)),
            whole_antiterm_warnings: resolved.map(|r| r.diagnostics_text()),
            term_sequence: thermo.and_then(|t| t.term_sequence.as_deref()),
            term_structure: thermo.and_then(|t| t.term_structure.as_deref()),
            terminator_energy: thermo.and_then(|t| t.terminator_energy),
            term_errors: thermo.map(|t| t.term_errors.as_str()),
            antiterm_term_sequence: thermo.and_then(|t| t.antiterm_term_sequence.as_deref()),
            infernal_antiterminator_structure: thermo
                .and_then(|t| t.infernal_antiterminator_structure.as_deref()),
            vienna_antiterminator_structure: vienna.map(|f| f.structure.as_str()),
            vienna_antiterminator_energy: vienna.and_then(|f| f.energy),
            vienna_antiterminator_errors: vienna.map(|f| f.errors.as_str()),
            terminator_structure: thermo.and_then(|t| t.terminator_structure.as_deref()),
            terminator_errors: thermo.map(|t| t.terminator_errors.as_str()),
            whole_term_structure: thermo.and_then(|t| t.whole_term_structure.as_deref()),
            folded_antiterm_structure: thermo.and_then(|t| t.folded_antiterm_structure.as_deref()),
        }
    }
}

/// Write the prediction table with its header row
pub fn write_predictions<W: Write>(
    writer: W,
    predictions: &[Prediction],
    source: Option<&str>,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for prediction in predictions {
        csv_writer
            .serialize(Row::new(prediction, source))
            .with_context(|| format!("Failed to write row for {}", prediction.name))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the prediction table to `path`
pub fn write_predictions_file<P: AsRef<Path>>(
    path: P,
    predictions: &[Prediction],
    source: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_predictions(BufWriter::new(file), predictions, source)
}
