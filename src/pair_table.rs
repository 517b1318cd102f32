use crate::alphabet::Normalized;

/// One bracket of a normalized structure and what it pairs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSlot {
    pub symbol: Normalized,
    pub index: usize,
    pub partner: Option<usize>,
    /// Symbol at the partner position in the un-normalized structure
    pub partner_symbol: Option<u8>,
}

/// Base-pair partners for every bracket of a dot-bracket string.
///
/// Unpaired positions have no slot. Brackets without a partner keep a slot
/// with `partner == None`; that only happens for unbalanced input.
///
/// Every bracket flavour of the extended alphabet is folded into `(`/`)`
/// before pairing, so the input must nest homogeneously: a `<` is never
/// closed by a `]`. INFERNAL consensus structures for T-boxes satisfy this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairTable {
    slots: Vec<Option<PairSlot>>,
}

impl PairTable {
    /// Pair a normalized (`(`, `)`, `.`) structure
    pub fn from_dot(dot: &str) -> Self {
        Self::build(dot.as_bytes(), dot.as_bytes())
    }

    /// Pair `dot`, recording partner symbols from the original `structure`
    pub fn with_symbols(dot: &str, structure: &str) -> Self {
        Self::build(dot.as_bytes(), structure.as_bytes())
    }

    fn build(dot: &[u8], structure: &[u8]) -> Self {
        let mut slots: Vec<Option<PairSlot>> = dot
            .iter()
            .enumerate()
            .map(|(index, &c)| {
                let symbol = Normalized::from_dot(c);
                symbol.is_bracket().then_some(PairSlot {
                    symbol,
                    index,
                    partner: None,
                    partner_symbol: None,
                })
            })
            .collect();

        // A close pairs with the nearest unmatched open, which is where the
        // forward depth count of that open first returns to zero.
        let mut open: Vec<usize> = Vec::new();
        for (index, &c) in dot.iter().enumerate() {
            match Normalized::from_dot(c) {
                Normalized::Open => open.push(index),
                Normalized::Close => {
                    if let Some(left) = open.pop() {
                        if let Some(slot) = slots[left].as_mut() {
                            slot.partner = Some(index);
                            slot.partner_symbol = structure.get(index).copied();
                        }
                        if let Some(slot) = slots[index].as_mut() {
                            slot.partner = Some(left);
                            slot.partner_symbol = structure.get(left).copied();
                        }
                    }
                }
                Normalized::Unpaired => {}
            }
        }

        PairTable { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&PairSlot> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn partner(&self, index: usize) -> Option<usize> {
        self.slot(index).and_then(|s| s.partner)
    }

    /// Brackets left without a partner
    pub fn unmatched(&self) -> impl Iterator<Item = &PairSlot> {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.partner.is_none())
    }

    /// Outermost helices as 1-based `[open, close]` spans, 5' to 3'.
    ///
    /// The scan jumps from each open bracket straight to its partner, so
    /// nested helices are not reported separately. Open brackets without a
    /// partner are skipped.
    pub fn top_level_stems(&self) -> Vec<[usize; 2]> {
        let mut stems = Vec::new();
        let mut index = 0;
        while index + 1 < self.slots.len() {
            if let Some(slot) = &self.slots[index] {
                if slot.symbol == Normalized::Open {
                    if let Some(partner) = slot.partner {
                        stems.push([slot.index + 1, partner + 1]);
                        index = partner;
                    }
                }
            }
            index += 1;
        }
        stems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_pairs() {
        let table = PairTable::from_dot("((.))");
        assert_eq!(table.partner(0), Some(4));
        assert_eq!(table.partner(1), Some(3));
        assert_eq!(table.partner(3), Some(1));
        assert_eq!(table.partner(4), Some(0));
        assert_eq!(table.partner(2), None);
        assert!(table.slot(2).is_none());
    }

    #[test]
    fn test_partner_symbol_from_original() {
        let table = PairTable::with_symbols("(.)", "<_>");
        let slot = table.slot(0).unwrap();
        assert_eq!(slot.partner_symbol, Some(b'>'));
        assert_eq!(table.slot(2).unwrap().partner_symbol, Some(b'<'));
    }

    #[test]
    fn test_unbalanced_input() {
        let table = PairTable::from_dot("(()");
        assert_eq!(table.partner(0), None);
        assert_eq!(table.partner(1), Some(2));
        assert_eq!(table.unmatched().count(), 1);

        let table = PairTable::from_dot("())(");
        assert_eq!(table.partner(0), Some(1));
        assert_eq!(table.partner(2), None);
        assert_eq!(table.partner(3), None);
    }

    #[test]
    fn test_top_level_stems() {
        let table = PairTable::from_dot("..((..)).((.))..");
        assert_eq!(table.top_level_stems(), vec![[3, 8], [10, 14]]);
    }

    #[test]
    fn test_top_level_skips_nested() {
        let table = PairTable::from_dot("(.(..).)..(.)");
        assert_eq!(table.top_level_stems(), vec![[1, 8], [11, 13]]);
    }
}
