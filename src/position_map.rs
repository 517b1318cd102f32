use crate::alphabet::is_nucleotide;
use log::debug;

/// Lookup table from alignment column to source-sequence coordinate.
///
/// Built once from an INFERNAL target line. Residues advance the source
/// counter by one; `[ N]` tokens (the count inside `*[ N]*` truncation
/// markers) advance it by `N`; everything else (gaps, `*`, spaces) maps to
/// the current counter without advancing it. Every column of a bracketed
/// token maps to the counter after the skip, so the table is monotonically
/// non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMapping {
    positions: Vec<usize>,
}

impl PositionMapping {
    pub fn build(alignment: &str, offset: usize) -> Self {
        let bytes = alignment.as_bytes();
        let mut positions = Vec::with_capacity(bytes.len());
        let mut counter = offset;
        // Column where the open `[` of the current token sits
        let mut token_start: Option<usize> = None;

        for (i, &c) in bytes.iter().enumerate() {
            if let Some(start) = token_start {
                positions.push(counter);
                if c == b']' {
                    let digits = String::from_utf8_lossy(&bytes[start + 1..i]);
                    let skipped = match digits.trim().parse::<usize>() {
                        Ok(n) => n,
                        Err(_) => {
                            debug!("Unreadable gap count '{digits}' at column {start}");
                            0
                        }
                    };
                    counter += skipped;
                    positions[start..=i].fill(counter);
                    token_start = None;
                }
            } else if is_nucleotide(c) {
                positions.push(counter);
                counter += 1;
            } else {
                if c == b'[' {
                    token_start = Some(i);
                }
                positions.push(counter);
            }
        }

        PositionMapping { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.positions.get(index).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.positions
    }
}
