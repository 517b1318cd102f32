/// One covariance-model match reported by cmsearch/cmscan
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HitRecord {
    pub name: String,
    pub rank: u32,
    pub e_value: f64,
    pub score: f64,
    pub bias: f64,
    /// 1-based first residue of the hit in the source sequence
    pub start: usize,
    /// Last residue of the hit (inclusive, so also the exclusive 0-based end)
    pub end: usize,
    pub cm_accuracy: f64,
    pub gc: f64,
    /// Target line of the alignment: residues, `-` gaps and `*[ N]*` tokens
    pub sequence: String,
    /// Consensus structure line, column-aligned with `sequence`
    pub structure: String,
    /// Set when the sequence and structure lines could not be reconciled
    pub parse_error: bool,
}

impl HitRecord {
    /// Sequence and structure lines line up column for column
    pub fn is_consistent(&self) -> bool {
        self.sequence.len() == self.structure.len()
    }

    /// Offset that turns alignment positions into source coordinates
    pub fn base_offset(&self) -> usize {
        self.start.saturating_sub(1)
    }
}
