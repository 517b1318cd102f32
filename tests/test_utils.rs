#![allow(dead_code)]
/// Utility functions for testing
use std::fs;
use std::path::Path;

/// Consensus structure of a complete translational T-box hit
pub const TBOX_STRUCTURE: &str = ":::<<<<___>>>>,,,<<<<<<---->>>>>>:::";

/// Generate a random RNA sequence of given length
pub fn generate_rna_sequence(length: usize) -> String {
    use rand::{thread_rng, Rng};
    let bases = ['A', 'C', 'G', 'U'];
    let mut rng = thread_rng();

    (0..length).map(|_| bases[rng.gen_range(0..4)]).collect()
}

/// Aligned residues for [`TBOX_STRUCTURE`] with `UGG` right after the `----` run
pub fn tbox_alignment() -> String {
    let mut seq = "ACGU".repeat(9).into_bytes();
    seq[27..30].copy_from_slice(b"UGG");
    String::from_utf8(seq).expect("ASCII")
}

/// One hit in a cmsearch report
pub struct HitBlock<'a> {
    pub name: &'a str,
    pub rank: u32,
    pub score: f64,
    pub start: usize,
    pub end: usize,
    pub structure: &'a str,
    pub sequence: &'a str,
}

impl HitBlock<'_> {
    /// Render the `>>` block exactly as cmsearch lays it out
    pub fn render(&self) -> String {
        let pad = " ".repeat(self.name.len() + 8);
        let mut text = String::new();
        text.push_str(&format!(">> {}  Bacillus subtilis subsp. subtilis str. 168\n", self.name));
        text.push_str(" rank     E-value  score  bias mdl mdl from   mdl to       seq from      seq to       acc trunc   gc\n");
        text.push_str(" ----   --------- ------ ----- --- -------- --------    -------- --------      ---- -----  ----\n");
        text.push_str(&format!(
            "  ({}) !   1.3e-{:02}   {:.1}   0.1  cm        1      {}  []        {}      {} + ..    0.92    no 0.41\n",
            self.rank,
            10 + self.rank,
            self.score,
            self.structure.len(),
            self.start,
            self.end
        ));
        text.push('\n');
        text.push_str(&format!("{pad}{} NC\n", " ".repeat(self.structure.len())));
        text.push_str(&format!("{pad}{} CS\n", self.structure));
        text.push_str(&format!(
            "{:>width$} 1 {} {}\n",
            "RF00230",
            self.sequence.to_lowercase(),
            self.structure.len(),
            width = self.name.len() + 6
        ));
        text.push_str(&format!("{pad}{}\n", self.sequence));
        text.push_str(&format!(
            "  {} {} {} {}\n",
            self.name, self.start, self.sequence, self.end
        ));
        text.push_str(&format!("{pad}{} PP\n", "*".repeat(self.sequence.len())));
        text.push('\n');
        text
    }
}

/// Full report: search header, the hit blocks, and the trailer
pub fn render_report(blocks: &[HitBlock]) -> String {
    let mut text = String::new();
    text.push_str("# cmsearch :: search CM(s) against a sequence database\n");
    text.push_str("# INFERNAL 1.1.4 (Dec 2020)\n");
    text.push_str("Query:       T-box  [CLEN=250]\n");
    text.push_str("Accession:   RF00230\n");
    text.push_str("Hit alignments:\n");
    for block in blocks {
        text.push_str(&block.render());
    }
    text.push_str("Internal CM pipeline statistics summary:\n");
    text.push_str("//\n[ok]\n");
    text
}

/// Generate a FASTA file with specified sequences
pub fn create_fasta_file(path: &Path, sequences: &[(&str, &str)]) {
    let mut content = String::new();
    for (name, seq) in sequences {
        content.push_str(&format!(">{name}\n{seq}\n"));
    }
    fs::write(path, content).expect("Failed to write FASTA file");
}

/// 100 A upstream, the hit as DNA, 14 C downstream; the hit spans 101..=136
pub fn tbox_source() -> String {
    format!(
        "{}{}{}",
        "A".repeat(100),
        tbox_alignment().replace('U', "T"),
        "C".repeat(14)
    )
}
