//! Symbol classes for INFERNAL alignment strings
//!
//! INFERNAL annotates consensus structure with an extended dot-bracket
//! alphabet (WUSS): several bracket flavours for paired columns, several
//! punctuation marks for unpaired columns, plus `~` for truncated or
//! flanking regions. The target sequence line uses `ACGU`, `-` for gaps and
//! `*[ N]*` tokens for truncated stretches.

/// Alignment gap in the sequence line
pub const GAP: u8 = b'-';

/// Filler used in the structure for flanking and truncated regions
pub const FILLER: u8 = b'~';

/// Hairpin brackets and loop marks used by the T-box landmarks
pub const HAIRPIN_OPEN: u8 = b'<';
pub const HAIRPIN_CLOSE: u8 = b'>';
pub const HAIRPIN_LOOP: u8 = b'_';
pub const EXTERNAL: u8 = b':';
pub const STEM_SEPARATOR: u8 = b',';
pub const INSERT: u8 = b'.';

const OPENING: &[u8] = b"<{[(";
const CLOSING: &[u8] = b">}])";

/// True for RNA nucleotides in either case
pub fn is_nucleotide(c: u8) -> bool {
    matches!(c, b'A' | b'a' | b'C' | b'c' | b'G' | b'g' | b'U' | b'u')
}

/// True when every symbol of `s` is a nucleotide
pub fn all_nucleotides(s: &[u8]) -> bool {
    s.iter().all(|&c| is_nucleotide(c))
}

/// DNA to RNA, preserving case. Works on raw bytes so sequences with stray
/// non-ASCII symbols pass through untouched.
pub fn transcribe(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .map(|&c| match c {
            b'T' => b'U',
            b't' => b'u',
            other => other,
        })
        .collect()
}

/// One symbol of a normalized (single bracket pair) structure.
///
/// Normalization collapses every WUSS bracket flavour onto one pair. This is
/// only sound because nesting in T-box models is homogeneous: a pair opened
/// with `<` is never closed by `]`. Callers must not feed structures with
/// interleaved bracket flavours (pseudoknots written as brackets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    Open,
    Close,
    Unpaired,
}

impl Normalized {
    pub fn from_symbol(c: u8) -> Self {
        if OPENING.contains(&c) {
            Normalized::Open
        } else if CLOSING.contains(&c) {
            Normalized::Close
        } else {
            Normalized::Unpaired
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Normalized::Open => '(',
            Normalized::Close => ')',
            Normalized::Unpaired => '.',
        }
    }

    pub fn from_dot(c: u8) -> Self {
        match c {
            b'(' => Normalized::Open,
            b')' => Normalized::Close,
            _ => Normalized::Unpaired,
        }
    }

    pub fn is_bracket(self) -> bool {
        self != Normalized::Unpaired
    }
}

/// Rewrite an INFERNAL structure as plain dot-bracket (`(`, `)`, `.`)
pub fn normalize_structure(structure: &str) -> String {
    structure
        .bytes()
        .map(|c| Normalized::from_symbol(c).as_char())
        .collect()
}

/// Count opening and closing symbols of any bracket flavour
pub fn bracket_counts(structure: &[u8]) -> (usize, usize) {
    structure
        .iter()
        .fold((0, 0), |(open, close), &c| match Normalized::from_symbol(c) {
            Normalized::Open => (open + 1, close),
            Normalized::Close => (open, close + 1),
            Normalized::Unpaired => (open, close),
        })
}
