use crate::alphabet::{
    all_nucleotides, is_nucleotide, EXTERNAL, HAIRPIN_CLOSE, HAIRPIN_LOOP, HAIRPIN_OPEN, INSERT,
    STEM_SEPARATOR,
};
use anyhow::{bail, Result};
use std::fmt;

/// Conserved start of the discriminator (the tRNA acceptor-pairing UGGN)
const DISCRIMINATOR_PREFIX: &[u8] = b"UGG";
const DISCRIMINATOR_LEN: usize = 4;
const CODON_LEN: usize = 3;
/// Interior-loop run in the antiterminator that precedes the discriminator
const DISCRIMINATOR_LOOP: &[u8] = b"---";

/// Per-hit warning kinds, rendered as `TOKEN;` in the output table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureWarning {
    BadSecStruct,
    NoStem1Start,
    NoStem1End,
    NoSpecStart,
    NoSpecEnd,
    BadCodon,
    NoCodon,
    NoAntitermStart,
    BadDiscrim,
    NoAntitermEnd,
    LowScore,
    LengthMismatch,
}

impl FeatureWarning {
    pub fn token(&self) -> &'static str {
        match self {
            FeatureWarning::BadSecStruct => "BAD_SEC_STRUCT",
            FeatureWarning::NoStem1Start => "NO_STEM1_START",
            FeatureWarning::NoStem1End => "NO_STEM1_END",
            FeatureWarning::NoSpecStart => "NO_SPEC_START",
            FeatureWarning::NoSpecEnd => "NO_SPEC_END",
            FeatureWarning::BadCodon => "BAD_CODON",
            FeatureWarning::NoCodon => "NO_CODON",
            FeatureWarning::NoAntitermStart => "NO_ANTITERM_START",
            FeatureWarning::BadDiscrim => "BAD_DISCRIM",
            FeatureWarning::NoAntitermEnd => "NO_ANTITERM_END",
            FeatureWarning::LowScore => "LOW_SCORE",
            FeatureWarning::LengthMismatch => "LENGTH_MISMATCH",
        }
    }
}

impl fmt::Display for FeatureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Ordered, append-only warning list owned by one hit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(Vec<FeatureWarning>);

impl Warnings {
    pub fn push(&mut self, warning: FeatureWarning) {
        self.0.push(warning);
    }

    pub fn contains(&self, warning: FeatureWarning) -> bool {
        self.0.contains(&warning)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureWarning> {
        self.0.iter()
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for warning in &self.0 {
            write!(f, "{warning};")?;
        }
        Ok(())
    }
}

/// How far along the T-box architecture the scan got before a landmark was missing.
///
/// The landmarks are visited in 5'->3' order; every step is still attempted
/// after a failure, but the state only advances while each landmark in the
/// chain has been found, so a partial hit reads as "reached K, stuck".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ScanState {
    #[default]
    Start,
    Stem1,
    SpecifierLoop,
    Codon,
    Antiterminator,
    Discriminator,
    Complete,
}

impl ScanState {
    fn next(self) -> Option<ScanState> {
        match self {
            ScanState::Start => Some(ScanState::Stem1),
            ScanState::Stem1 => Some(ScanState::SpecifierLoop),
            ScanState::SpecifierLoop => Some(ScanState::Codon),
            ScanState::Codon => Some(ScanState::Antiterminator),
            ScanState::Antiterminator => Some(ScanState::Discriminator),
            ScanState::Discriminator => Some(ScanState::Complete),
            ScanState::Complete => None,
        }
    }
}

/// T-box landmarks of one hit.
///
/// Positions are 1-based; `None` means the landmark was not found. They are
/// alignment positions straight out of [`locate_features`] and become source
/// sequence coordinates once [`crate::projector::project_features`] ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub s1_start: Option<usize>,
    pub s1_loop_start: Option<usize>,
    pub s1_loop_end: Option<usize>,
    pub s1_end: Option<usize>,
    pub antiterm_start: Option<usize>,
    pub antiterm_end: Option<usize>,
    pub discrim_start: Option<usize>,
    pub discrim_end: Option<usize>,
    /// Only known after projection
    pub codon_start: Option<usize>,
    pub codon_end: Option<usize>,
    pub codon: String,
    pub codon_region: String,
    pub discriminator: String,
    pub warnings: Warnings,
    pub reached: ScanState,
}

impl FeatureSet {
    /// Feature set for a hit that could not be scanned at all
    pub fn unscanned(warning: FeatureWarning) -> Self {
        let mut features = FeatureSet::default();
        features.warnings.push(warning);
        features
    }
}

/// Start of every `first .* last` occurrence, where `.*` is a run of insert dots
fn pattern_starts(structure: &[u8], first: u8, last: u8) -> impl Iterator<Item = usize> + '_ {
    (0..structure.len()).filter(move |&i| {
        if structure[i] != first {
            return false;
        }
        let mut j = i + 1;
        while j < structure.len() && structure[j] == INSERT {
            j += 1;
        }
        j < structure.len() && structure[j] == last
    })
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn as_signed(position: Option<usize>) -> isize {
    position.map_or(-1, |p| p as isize)
}

struct FeatureScan<'a> {
    seq: &'a [u8],
    structure: &'a [u8],
    features: FeatureSet,
    // 0-based positions before offsets are applied
    s1_start: Option<usize>,
    s1_end: Option<usize>,
    loop_start: Option<usize>,
    loop_end: Option<usize>,
    antiterm_start: Option<usize>,
    antiterm_end: Option<usize>,
    discrim_start: Option<usize>,
}

impl<'a> FeatureScan<'a> {
    fn new(seq: &'a [u8], structure: &'a [u8]) -> Self {
        FeatureScan {
            seq,
            structure,
            features: FeatureSet::default(),
            s1_start: None,
            s1_end: None,
            loop_start: None,
            loop_end: None,
            antiterm_start: None,
            antiterm_end: None,
            discrim_start: None,
        }
    }

    fn warn(&mut self, warning: FeatureWarning) {
        self.features.warnings.push(warning);
    }

    fn reach(&mut self, state: ScanState) {
        if self.features.reached.next() == Some(state) {
            self.features.reached = state;
        }
    }

    fn check_start(&mut self) {
        match self.structure.first() {
            Some(&EXTERNAL) | Some(&HAIRPIN_OPEN) => {}
            _ => self.warn(FeatureWarning::BadSecStruct),
        }
    }

    fn stem1(&mut self) {
        self.s1_start = self.structure.iter().position(|&c| c == HAIRPIN_OPEN);
        if self.s1_start.is_none() {
            self.warn(FeatureWarning::NoStem1Start);
        }

        // First `>,` (possibly `>.,`)
        self.s1_end = pattern_starts(self.structure, HAIRPIN_CLOSE, STEM_SEPARATOR).next();
        if self.s1_end.is_none() {
            self.warn(FeatureWarning::NoStem1End);
        }

        if self.s1_start.is_some() && self.s1_end.is_some() {
            self.reach(ScanState::Stem1);
        }
    }

    fn specifier_loop(&mut self) {
        self.loop_start = pattern_starts(self.structure, HAIRPIN_OPEN, HAIRPIN_LOOP).next();
        if self.loop_start.is_none() {
            self.warn(FeatureWarning::NoSpecStart);
        }

        // The loop has to close inside stem 1
        let s1_end = as_signed(self.s1_end);
        self.loop_end = pattern_starts(self.structure, HAIRPIN_LOOP, HAIRPIN_CLOSE)
            .next()
            .filter(|&end| (end as isize) < s1_end);
        if self.loop_end.is_none() {
            self.warn(FeatureWarning::NoSpecEnd);
        }

        if self.loop_start.is_some() && self.loop_end.is_some() {
            self.reach(ScanState::SpecifierLoop);
        }
    }

    /// Specifier codon: the three residues before the last loop position
    fn codon(&mut self) {
        let Some(loop_end) = self.loop_end else {
            self.warn(FeatureWarning::NoCodon);
            return;
        };
        if loop_end as isize <= as_signed(self.loop_start) {
            self.warn(FeatureWarning::NoCodon);
            return;
        }

        let from = loop_end.saturating_sub(CODON_LEN);
        let codon = &self.seq[from..loop_end];
        self.features.codon = String::from_utf8_lossy(codon).into_owned();
        if codon.len() != CODON_LEN || !all_nucleotides(codon) {
            self.warn(FeatureWarning::BadCodon);
            return;
        }

        // Nearest residue on either side, for +1/-1 reading frame calls
        let before = (0..from).rev().find(|&i| is_nucleotide(self.seq[i]));
        let after = (loop_end..self.seq.len()).find(|&i| is_nucleotide(self.seq[i]));
        if let (Some(before), Some(after)) = (before, after) {
            let mut region = String::with_capacity(CODON_LEN + 2);
            region.push(self.seq[before] as char);
            region.push_str(&self.features.codon);
            region.push(self.seq[after] as char);
            self.features.codon_region = region;
        }
        self.reach(ScanState::Codon);
    }

    fn antiterminator_start(&mut self) {
        // Last `,<` (possibly `,.<`)
        self.antiterm_start = pattern_starts(self.structure, STEM_SEPARATOR, HAIRPIN_OPEN).last();
        match self.antiterm_start {
            Some(_) => self.reach(ScanState::Antiterminator),
            None => self.warn(FeatureWarning::NoAntitermStart),
        }
    }

    /// Discriminator: the residues right after the antiterminator's interior loop
    fn discriminator(&mut self) {
        if let Some(antiterm_start) = self.antiterm_start {
            let dashes = find_from(self.structure, DISCRIMINATOR_LOOP, antiterm_start + 3);
            if let Some(dashes) = dashes {
                let mut run_end = dashes;
                while run_end < self.structure.len() && self.structure[run_end] == b'-' {
                    run_end += 1;
                }
                let to = (run_end + DISCRIMINATOR_LEN).min(self.seq.len());
                self.discrim_start = Some(run_end);
                self.features.discriminator =
                    String::from_utf8_lossy(&self.seq[run_end.min(to)..to]).into_owned();
            }
        }

        let discrim = self.features.discriminator.as_bytes();
        if discrim.len() == DISCRIMINATOR_LEN
            && discrim.starts_with(DISCRIMINATOR_PREFIX)
            && all_nucleotides(discrim)
        {
            self.reach(ScanState::Discriminator);
        } else {
            self.warn(FeatureWarning::BadDiscrim);
        }
    }

    fn antiterminator_end(&mut self) {
        // First `>:`; the 3' end is sometimes cut off, then take the last `>`
        self.antiterm_end = pattern_starts(self.structure, HAIRPIN_CLOSE, EXTERNAL)
            .next()
            .or_else(|| self.structure.iter().rposition(|&c| c == HAIRPIN_CLOSE));
        match self.antiterm_end {
            Some(_) => self.reach(ScanState::Complete),
            None => self.warn(FeatureWarning::NoAntitermEnd),
        }
    }

    /// Shift to the caller's coordinate base; each landmark keeps its own convention
    fn finish(mut self, offset: usize) -> FeatureSet {
        let shift = |p: Option<usize>, extra: usize| p.map(|p| p + offset + extra);
        self.features.s1_start = shift(self.s1_start, 0);
        self.features.s1_loop_start = shift(self.loop_start, 1);
        self.features.s1_loop_end = shift(self.loop_end, 0);
        self.features.s1_end = shift(self.s1_end, 0);
        self.features.antiterm_start = shift(self.antiterm_start, 1);
        self.features.antiterm_end = shift(self.antiterm_end, 0);
        self.features.discrim_start = shift(self.discrim_start, 0);
        self.features.discrim_end = shift(self.discrim_start, DISCRIMINATOR_LEN - 1);
        self.features
    }
}

/// Locate stem 1, the specifier loop and codon, the antiterminator and the
/// discriminator of a translational T-box from its INFERNAL alignment.
///
/// `offset` converts 0-based alignment indices into the caller's coordinates
/// (1 for 1-based alignment positions). Missing landmarks are reported as
/// warnings; only a sequence/structure length mismatch is an error.
pub fn locate_features(sequence: &str, structure: &str, offset: usize) -> Result<FeatureSet> {
    if sequence.len() != structure.len() {
        bail!(
            "Sequence length ({}) is not equal to structure length ({})",
            sequence.len(),
            structure.len()
        );
    }

    let mut scan = FeatureScan::new(sequence.as_bytes(), structure.as_bytes());
    scan.check_start();
    scan.stem1();
    scan.specifier_loop();
    scan.codon();
    scan.antiterminator_start();
    scan.discriminator();
    scan.antiterminator_end();
    Ok(scan.finish(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STRUCTURE: &str = ":::<<<<___>>>>,,,<<<<<<---->>>>>>:::";

    /// All-ACGU sequence with UGG placed right after the `----` run
    fn sequence() -> String {
        let mut seq: Vec<u8> = b"ACGUACGUACGUACGUACGUACGUACGUACGUACGU".to_vec();
        seq[27..30].copy_from_slice(b"UGG");
        String::from_utf8(seq).unwrap()
    }

    #[test]
    fn test_complete_tbox() {
        let features = locate_features(&sequence(), STRUCTURE, 1).unwrap();
        assert!(features.warnings.is_empty(), "{}", features.warnings);
        assert_eq!(features.warnings.to_string(), "");
        assert_eq!(features.s1_start, Some(4));
        assert_eq!(features.s1_loop_start, Some(8));
        assert_eq!(features.s1_loop_end, Some(10));
        assert_eq!(features.s1_end, Some(14));
        assert_eq!(features.antiterm_start, Some(18));
        assert_eq!(features.antiterm_end, Some(33));
        assert_eq!(features.discrim_start, Some(28));
        assert_eq!(features.discrim_end, Some(31));
        assert_eq!(features.discriminator, "UGGG");
        assert_eq!(features.codon, "GUA");
        assert_eq!(features.codon_region, "CGUAC");
        assert_eq!(features.reached, ScanState::Complete);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let err = locate_features("ACGU", ":::", 1).unwrap_err();
        assert!(err.to_string().contains("not equal"));
    }

    #[test]
    fn test_no_closing_symbol() {
        let structure = ":::<<<<___,,,<<<<----::::";
        let seq = "A".repeat(structure.len());
        let features = locate_features(&seq, structure, 1).unwrap();
        assert_eq!(features.antiterm_end, None);
        assert!(features.warnings.contains(FeatureWarning::NoAntitermEnd));
        assert!(features.warnings.contains(FeatureWarning::NoStem1End));
        assert!(features.warnings.contains(FeatureWarning::NoSpecEnd));
        assert_eq!(features.reached, ScanState::Start);
    }

    #[test]
    fn test_antiterminator_end_falls_back_to_last_close() {
        let structure = ":::<<<<___>>>>,,,<<<<<<---->>>>>>";
        let seq = &sequence()[..structure.len()];
        let features = locate_features(seq, structure, 0).unwrap();
        assert_eq!(features.antiterm_end, Some(structure.len() - 1));
        assert!(!features.warnings.contains(FeatureWarning::NoAntitermEnd));
    }

    #[test]
    fn test_bad_start_symbol() {
        let structure = ",,<<<<___>>>>,,,";
        let seq = "G".repeat(structure.len());
        let features = locate_features(&seq, structure, 1).unwrap();
        assert!(features.warnings.contains(FeatureWarning::BadSecStruct));
    }

    #[test]
    fn test_bad_codon_keeps_codon_text() {
        let structure = ":<<<<_____>>>>,";
        let seq = "AAAAAAA-GAAAAAA";
        let features = locate_features(seq, structure, 1).unwrap();
        assert_eq!(features.codon, "A-G");
        assert!(features.warnings.contains(FeatureWarning::BadCodon));
        assert_eq!(features.reached, ScanState::SpecifierLoop);
    }

    #[test]
    fn test_missing_antiterminator_flags_discriminator() {
        let structure = ":<<<<___>>>>:";
        let seq = "ACGUACGUACGUA";
        let features = locate_features(seq, structure, 1).unwrap();
        assert!(features.warnings.contains(FeatureWarning::NoAntitermStart));
        assert!(features.warnings.contains(FeatureWarning::BadDiscrim));
        assert_eq!(features.discrim_start, None);
        assert_eq!(features.discrim_end, None);
    }

    #[test]
    fn test_warnings_render_in_order() {
        let mut warnings = Warnings::default();
        warnings.push(FeatureWarning::NoCodon);
        warnings.push(FeatureWarning::LowScore);
        assert_eq!(warnings.to_string(), "NO_CODON;LOW_SCORE;");
    }
}
