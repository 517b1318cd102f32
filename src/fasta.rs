use crate::infernal::open_input;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use noodles::fasta;
use std::io::BufRead;
use std::path::Path;

/// Source sequences keyed by record name, in file order.
///
/// The name is the first word of the FASTA header, which is what cmsearch
/// prints as the target name of a hit.
#[derive(Debug, Clone, Default)]
pub struct SequenceIndex {
    sequences: IndexMap<String, String>,
}

impl SequenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every record of a FASTA stream
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = SequenceIndex::new();
        let mut reader = fasta::io::Reader::new(reader);

        for result in reader.records() {
            let record = result.context("Failed to read FASTA record")?;
            let name = String::from_utf8_lossy(record.name()).into_owned();
            let sequence = String::from_utf8_lossy(record.sequence().as_ref()).into_owned();
            debug!("Loaded {name} ({} bp)", sequence.len());
            index.insert(name, sequence);
        }

        Ok(index)
    }

    /// Read a FASTA file, bgzip-compressed when it ends in `.gz`/`.bgz`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_input(path)?;
        Self::from_reader(reader)
            .with_context(|| format!("Failed to parse FASTA file {}", path.display()))
    }

    /// Add a record; a repeated name keeps the first sequence
    pub fn insert(&mut self, name: String, sequence: String) {
        if self.sequences.contains_key(&name) {
            warn!("Duplicate FASTA record {name}; keeping the first one");
            return;
        }
        self.sequences.insert(name, sequence);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.sequences.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sequences.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// `(name, sequence)` pairs in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sequences
            .iter()
            .map(|(name, seq)| (name.as_str(), seq.as_str()))
    }
}
