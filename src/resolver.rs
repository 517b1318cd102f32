use crate::alphabet::{bracket_counts, normalize_structure, transcribe, Normalized, FILLER, GAP};
use crate::pair_table::PairTable;
use nom::{
    bytes::complete::{tag, take_until},
    character::complete::{char, one_of},
    combinator::map_res,
    sequence::{delimited, terminated},
    IResult,
};
use log::debug;
use std::fmt;

/// Loop shapes too small to be real hairpins; collapsed in this order
const DEGENERATE_LOOPS: [(&str, &str); 3] =
    [("(..)", "...."), ("(.)", "..."), ("(())", "....")];

/// Conditions noticed while cleaning a hit's structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Diagnostic {
    UnequalBracketsInInput,
    UnequalLengths,
    BracketStructureChanged,
    BracketsChangedToDots,
    FastaMismatch,
    UnequalBrackets,
    TruncationExceedsSource,
}

impl Diagnostic {
    pub fn token(&self) -> &'static str {
        match self {
            Diagnostic::UnequalBracketsInInput => "unequal_number_of_brackets_in_input",
            Diagnostic::UnequalLengths => "unequal_lengths_structure_and_sequence",
            Diagnostic::BracketStructureChanged => "bracket_structure_was_changed",
            Diagnostic::BracketsChangedToDots => "changed_some_brackets_to_dots",
            Diagnostic::FastaMismatch => "fasta_and_sequence_do_not_match",
            Diagnostic::UnequalBrackets => "unequal_number_of_brackets",
            Diagnostic::TruncationExceedsSource => "truncation_longer_than_fasta",
        }
    }

    /// Informational notes, as opposed to warnings about the input
    pub fn is_message(&self) -> bool {
        matches!(
            self,
            Diagnostic::BracketStructureChanged | Diagnostic::BracketsChangedToDots
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Gap-free sequence/structure pair covering the whole source sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStructure {
    /// Uppercase RNA, flanks and truncations filled in, gaps removed
    pub sequence: String,
    /// INFERNAL alphabet, column-aligned with `sequence`
    pub structure: String,
    /// Plain dot-bracket with degenerate loops opened up
    pub dot_structure: String,
    /// Top-level helices as 1-based `[open, close]` spans
    pub stems: Vec<[usize; 2]>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedStructure {
    pub fn has(&self, diagnostic: Diagnostic) -> bool {
        self.diagnostics.contains(&diagnostic)
    }

    /// Stem 3 of the T-box, taken as the final top-level stem once there are
    /// more than two. This is a positional guess: hits with extra stems
    /// (e.g. a stem 2A/B split into two helices) will return the wrong one.
    pub fn stem_three(&self) -> Option<[usize; 2]> {
        if self.stems.len() > 2 {
            self.stems.last().copied()
        } else {
            None
        }
    }

    /// Space-separated diagnostic tokens, notes before warnings
    pub fn diagnostics_text(&self) -> String {
        let messages = self.diagnostics.iter().filter(|d| d.is_message());
        let warnings = self.diagnostics.iter().filter(|d| !d.is_message());
        messages
            .chain(warnings)
            .map(Diagnostic::token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `*[ 12]*`, or `*[ 12]>` at the end of a hit, yields the residue count
fn truncation_marker(input: &[u8]) -> IResult<&[u8], i64> {
    terminated(
        delimited(
            tag("*["),
            map_res(take_until("]"), |inner: &[u8]| {
                std::str::from_utf8(inner)
                    .ok()
                    .and_then(|count| count.trim().parse::<i64>().ok())
                    .ok_or(())
            }),
            char(']'),
        ),
        one_of("*>"),
    )(input)
}

/// Alignment rebuilt with its truncations filled in
struct FilledAlignment {
    sequence: Vec<u8>,
    structure: Vec<u8>,
    /// A marker claimed more residues than the whole source holds
    oversized: bool,
}

/// Splice the source residues hidden behind `*[ N]*` markers back in.
///
/// The source offset of a marker is its column in the rebuilt sequence minus
/// the gaps already emitted, since the rebuilt prefix covers the source
/// residue for residue apart from gaps. The structure gets `N` filler
/// symbols in the same span; a non-positive count just drops the marker.
/// Counts are capped at the source length.
fn fill_truncations(source: &[u8], seq: &[u8], structure: &[u8]) -> FilledAlignment {
    let mut out_seq: Vec<u8> = Vec::with_capacity(source.len().max(seq.len()));
    let mut out_structure: Vec<u8> = Vec::with_capacity(out_seq.capacity());
    let mut oversized = false;
    let mut gaps = 0;
    let mut i = 0;

    while i < seq.len() {
        let tail = &seq[i..];
        let marker = truncation_marker(tail)
            .ok()
            .map(|(rest, n)| (tail.len() - rest.len(), n));

        if let Some((width, missing)) = marker {
            if missing > 0 {
                let mut missing = usize::try_from(missing).unwrap_or(usize::MAX);
                if missing > source.len() {
                    debug!(
                        "Truncation of {missing} residues capped at source length {}",
                        source.len()
                    );
                    missing = source.len();
                    oversized = true;
                }
                let from = (out_seq.len() - gaps).min(source.len());
                let to = (from + missing).min(source.len());
                out_seq.extend(transcribe(&source[from..to]));
                out_structure.extend(std::iter::repeat(FILLER).take(missing));
            }
            i += width;
            continue;
        }

        out_seq.push(seq[i]);
        if seq[i] == GAP {
            gaps += 1;
        }
        if let Some(&c) = structure.get(i) {
            out_structure.push(c);
        }
        i += 1;
    }
    if structure.len() > seq.len() {
        out_structure.extend_from_slice(&structure[seq.len()..]);
    }

    FilledAlignment {
        sequence: out_seq,
        structure: out_structure,
        oversized,
    }
}

struct GapRemoval {
    sequence: Vec<u8>,
    structure: Vec<u8>,
    dot: Vec<u8>,
    structure_changed: bool,
    corrected_brackets: bool,
}

/// Drop every gap column. A gap sitting on a bracket takes its pair with it:
/// the partner becomes unpaired unless it is a gap as well.
fn remove_gaps(sequence: &[u8], structure: &[u8], dot: &[u8], pairs: &PairTable) -> GapRemoval {
    let mut structure_out = structure.to_vec();
    let mut dot_out = dot.to_vec();
    let mut delete = vec![false; sequence.len().max(structure.len())];
    let mut structure_changed = false;
    let mut corrected_brackets = false;

    for (index, _) in sequence.iter().enumerate().filter(|&(_, &c)| c == GAP) {
        delete[index] = true;
        let Some(&symbol) = dot.get(index) else {
            continue;
        };
        if !Normalized::from_dot(symbol).is_bracket() {
            continue;
        }
        structure_changed = true;
        if let Some(partner) = pairs.partner(index) {
            if sequence.get(partner) != Some(&GAP) {
                structure_out[partner] = b'.';
                dot_out[partner] = b'.';
                corrected_brackets = true;
            }
        }
    }

    let keep = |bytes: Vec<u8>| -> Vec<u8> {
        bytes
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !delete.get(*i).copied().unwrap_or(false))
            .map(|(_, c)| c)
            .collect()
    };

    GapRemoval {
        sequence: keep(sequence.to_vec()),
        structure: keep(structure_out),
        dot: keep(dot_out),
        structure_changed,
        corrected_brackets,
    }
}

/// Rebuild a hit's alignment over the full source sequence.
///
/// `start`/`end` are the hit's 1-based inclusive coordinates. Flanks outside
/// the hit are added back as filler-annotated source residues, truncation
/// markers are filled from the source, gap columns are removed (unpairing
/// orphaned partners) and the structure is reduced to plain dot-bracket.
/// Returns `None` when the source, sequence or structure is missing.
pub fn resolve_structure(
    source: &str,
    start: usize,
    end: usize,
    sequence: &str,
    structure: &str,
) -> Option<ResolvedStructure> {
    if source.is_empty() || sequence.is_empty() || structure.is_empty() || start == 0 {
        return None;
    }
    let mut diagnostics = Vec::new();

    let (opens, closes) = bracket_counts(structure.as_bytes());
    if opens != closes {
        diagnostics.push(Diagnostic::UnequalBracketsInInput);
    }

    // Byte offsets throughout: the source may carry non-ASCII junk
    let source = source.as_bytes();
    let mut processed_sequence: Vec<u8> = Vec::with_capacity(source.len());
    let mut processed_structure: Vec<u8> = Vec::with_capacity(source.len());
    let upstream = &source[..(start - 1).min(source.len())];
    processed_sequence.extend(transcribe(upstream));
    processed_structure.extend(std::iter::repeat(FILLER).take(upstream.len()));
    processed_sequence.extend_from_slice(sequence.as_bytes());
    processed_structure.extend_from_slice(structure.as_bytes());
    if end < source.len() {
        let downstream = &source[end..];
        processed_sequence.extend(transcribe(downstream));
        processed_structure.extend(std::iter::repeat(FILLER).take(downstream.len()));
    }

    let filled = fill_truncations(source, &processed_sequence, &processed_structure);
    if filled.oversized {
        diagnostics.push(Diagnostic::TruncationExceedsSource);
    }
    if filled.sequence.len() != filled.structure.len() {
        diagnostics.push(Diagnostic::UnequalLengths);
    }

    let filled_sequence = filled.sequence.to_ascii_uppercase();
    let filled_structure = String::from_utf8_lossy(&filled.structure).into_owned();
    let dot = normalize_structure(&filled_structure);
    let pairs = PairTable::with_symbols(&dot, &filled_structure);

    let removal = remove_gaps(
        &filled_sequence,
        filled_structure.as_bytes(),
        dot.as_bytes(),
        &pairs,
    );
    if removal.structure_changed {
        diagnostics.push(Diagnostic::BracketStructureChanged);
    }
    if removal.corrected_brackets {
        diagnostics.push(Diagnostic::BracketsChangedToDots);
    }

    if transcribe(source).to_ascii_uppercase() != removal.sequence {
        diagnostics.push(Diagnostic::FastaMismatch);
    }
    let sequence = String::from_utf8_lossy(&removal.sequence).into_owned();
    let structure = String::from_utf8_lossy(&removal.structure).into_owned();

    let mut dot_structure = String::from_utf8_lossy(&removal.dot).into_owned();
    for (pattern, replacement) in DEGENERATE_LOOPS {
        dot_structure = dot_structure.replace(pattern, replacement);
    }

    let (opens, closes) = bracket_counts(dot_structure.as_bytes());
    if opens != closes {
        diagnostics.push(Diagnostic::UnequalBrackets);
    }

    let stems = PairTable::with_symbols(&dot_structure, &structure).top_level_stems();

    Some(ResolvedStructure {
        sequence,
        structure,
        dot_structure,
        stems,
        diagnostics,
    })
}
