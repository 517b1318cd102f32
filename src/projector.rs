use crate::features::FeatureSet;
use crate::position_map::PositionMapping;
use log::debug;

/// Look up `index`, clamping to the last column when it runs off the table
fn lookup(mapping: &PositionMapping, index: usize, landmark: &str) -> Option<usize> {
    let last = mapping.len().checked_sub(1)?;
    if index > last {
        debug!(
            "{landmark} column {index} outside mapping of {} columns; clamped",
            mapping.len()
        );
    }
    mapping.get(index.min(last))
}

/// Move every located landmark from alignment columns to source coordinates.
///
/// Landmarks stored as 1-based alignment columns come out as 1-based source
/// positions: `mapping[c]` is the 0-based source index of column `c`, which
/// is the 1-based index of column `c - 1`. The codon span is read off the
/// loop end (`-3`, `-1`) and the discriminator end off its start (`+3`)
/// before either is overwritten.
pub fn project_features(features: &mut FeatureSet, mapping: &PositionMapping) {
    if mapping.is_empty() {
        return;
    }
    let map = |position: Option<usize>, landmark: &str| {
        position
            .filter(|&p| p > 0)
            .and_then(|p| lookup(mapping, p, landmark))
    };

    if let Some(s1_start) = map(features.s1_start, "s1_start") {
        features.s1_start = Some(s1_start);
    }
    if let Some(loop_start) = map(features.s1_loop_start, "s1_loop_start") {
        features.s1_loop_start = Some(loop_start);
    }
    if let Some(loop_end) = features.s1_loop_end.filter(|&p| p > 0) {
        features.codon_start = lookup(mapping, loop_end.saturating_sub(3), "codon_start");
        features.codon_end = lookup(mapping, loop_end.saturating_sub(1), "codon_end");
        features.s1_loop_end = lookup(mapping, loop_end, "s1_loop_end");
    }
    if let Some(s1_end) = map(features.s1_end, "s1_end") {
        features.s1_end = Some(s1_end);
    }
    if let Some(antiterm_start) = map(features.antiterm_start, "antiterm_start") {
        features.antiterm_start = Some(antiterm_start);
    }
    if let Some(discrim_start) = features.discrim_start.filter(|&p| p > 0) {
        features.discrim_start = lookup(mapping, discrim_start, "discrim_start");
        features.discrim_end = lookup(mapping, discrim_start + 3, "discrim_end");
    }
    if let Some(antiterm_end) = map(features.antiterm_end, "antiterm_end") {
        features.antiterm_end = Some(antiterm_end);
    }
}
