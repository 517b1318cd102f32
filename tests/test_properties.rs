/// Property-based tests for pairing, position mapping and structure cleanup
///
/// Uses proptest to check invariants that must hold for any input, not
/// just the hand-picked cases in the unit tests.
use proptest::prelude::*;
use tboxscan::alphabet::{bracket_counts, normalize_structure};
use tboxscan::pair_table::PairTable;
use tboxscan::position_map::PositionMapping;
use tboxscan::resolver::{resolve_structure, Diagnostic};

/// Balanced dot-bracket string built from a depth walk
fn balanced_structure() -> impl Strategy<Value = String> {
    prop::collection::vec(0u8..3, 0..120).prop_map(|steps| {
        let mut out = String::new();
        let mut depth = 0usize;
        for step in steps {
            match step {
                0 => {
                    out.push('(');
                    depth += 1;
                }
                1 if depth > 0 => {
                    out.push(')');
                    depth -= 1;
                }
                _ => out.push('.'),
            }
        }
        out.extend(std::iter::repeat(')').take(depth));
        out
    })
}

/// Balanced structure with a lowercase RNA sequence of the same length
fn structure_with_sequence() -> impl Strategy<Value = (String, String)> {
    balanced_structure().prop_flat_map(|structure| {
        let bases = prop::sample::select(b"acgu".to_vec());
        let residues = prop::collection::vec(bases, structure.len())
            .prop_map(|bytes| String::from_utf8(bytes).unwrap());
        (Just(structure), residues)
    })
}

/// Alignment text: residues, gaps and `[ N]` skip tokens
fn alignment_string() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[ACGUacgu]{1,8}",
        "-{1,4}",
        (1usize..500).prop_map(|n| format!("*[ {n}]*")),
    ];
    prop::collection::vec(piece, 0..20).prop_map(|pieces| pieces.concat())
}

/// Property: partner(partner(i)) == i for every matched bracket
#[test]
fn prop_pair_table_is_symmetric() {
    proptest!(|(structure in balanced_structure())| {
        let table = PairTable::from_dot(&structure);
        prop_assert_eq!(table.unmatched().count(), 0);
        for i in 0..structure.len() {
            if let Some(j) = table.partner(i) {
                prop_assert_eq!(table.partner(j), Some(i));
                prop_assert_ne!(i, j);
            }
        }
    });
}

/// Property: pairing never nests across another pair (no crossing arcs)
#[test]
fn prop_pairs_do_not_cross() {
    proptest!(|(structure in balanced_structure())| {
        let table = PairTable::from_dot(&structure);
        for i in 0..structure.len() {
            let Some(j) = table.partner(i) else { continue };
            if j < i { continue; }
            for k in i + 1..j {
                if let Some(l) = table.partner(k) {
                    prop_assert!(l > i && l < j, "pair {}-{} crosses {}-{}", i, j, k, l);
                }
            }
        }
    });
}

/// Property: building the mapping twice gives the same table
#[test]
fn prop_position_mapping_is_idempotent() {
    proptest!(|(alignment in alignment_string(), offset in 0usize..100_000)| {
        let first = PositionMapping::build(&alignment, offset);
        let second = PositionMapping::build(&alignment, offset);
        prop_assert_eq!(first, second);
    });
}

/// Property: one entry per column, starting at the offset, never decreasing
#[test]
fn prop_position_mapping_is_monotone() {
    proptest!(|(alignment in alignment_string(), offset in 0usize..100_000)| {
        let mapping = PositionMapping::build(&alignment, offset);
        prop_assert_eq!(mapping.len(), alignment.len());
        let positions = mapping.as_slice();
        if let Some(&first) = positions.first() {
            prop_assert!(first >= offset);
        }
        for window in positions.windows(2) {
            prop_assert!(window[0] <= window[1]);
        }
    });
}

/// Property: unbalanced structures are reported, never panic
#[test]
fn prop_resolver_reports_unbalanced_structures() {
    proptest!(|(structure in "[<>:,_.]{1,80}", seed in "[ACGU]{80}")| {
        let (opens, closes) = bracket_counts(normalize_structure(&structure).as_bytes());
        let sequence = &seed[..structure.len()];
        let source = sequence.replace('U', "T");

        let resolved = resolve_structure(&source, 1, source.len(), sequence, &structure);
        prop_assert!(resolved.is_some());
        let resolved = resolved.unwrap();
        if opens != closes {
            prop_assert!(resolved.has(Diagnostic::UnequalBracketsInInput));
            prop_assert!(resolved.has(Diagnostic::UnequalBrackets));
        }
    });
}

/// Property: no markers and no gaps means nothing to change
#[test]
fn prop_resolver_identity_without_gaps() {
    proptest!(|((structure, sequence) in structure_with_sequence())| {
        prop_assume!(!structure.is_empty());
        let structure = structure.replace('(', "<").replace(')', ">");
        let source = sequence.to_uppercase().replace('U', "T");

        let resolved = resolve_structure(&source, 1, source.len(), &sequence, &structure).unwrap();
        prop_assert_eq!(&resolved.sequence, &sequence.to_uppercase());
        prop_assert_eq!(&resolved.structure, &structure);
        prop_assert!(!resolved.has(Diagnostic::BracketStructureChanged));
        prop_assert!(!resolved.has(Diagnostic::BracketsChangedToDots));
        prop_assert!(!resolved.has(Diagnostic::FastaMismatch));
        prop_assert!(!resolved.has(Diagnostic::UnequalLengths));
    });
}
