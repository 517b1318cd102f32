use crate::fasta::SequenceIndex;
use crate::features::{locate_features, FeatureSet, FeatureWarning};
use crate::hit::HitRecord;
use crate::position_map::PositionMapping;
use crate::projector::project_features;
use crate::resolver::{resolve_structure, ResolvedStructure};
use crate::thermo::{self, FoldingOracle, ThermoAnalysis, ViennaRna};
use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;

/// Prediction configuration
#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub score_cutoff: f64, // -c/--score-cutoff
    pub thermo: bool,      // off with --no-thermo
    /// Label written to the `source` column, normally the FASTA path
    pub source: Option<String>,
}

impl Default for PredictConfig {
    fn default() -> Self {
        PredictConfig {
            score_cutoff: 15.0,
            thermo: true,
            source: None,
        }
    }
}

/// One output row: a FASTA record and/or a hit with everything derived from it
#[derive(Debug, Clone, Default)]
pub struct Prediction {
    pub name: String,
    pub fasta_sequence: Option<String>,
    pub hit: Option<HitRecord>,
    pub features: FeatureSet,
    pub term_end: Option<usize>,
    pub resolved: Option<ResolvedStructure>,
    pub thermo: Option<ThermoAnalysis>,
}

impl Prediction {
    fn from_hit(hit: HitRecord, features: FeatureSet, fasta_sequence: Option<String>) -> Self {
        Prediction {
            name: hit.name.clone(),
            fasta_sequence,
            hit: Some(hit),
            features,
            ..Default::default()
        }
    }

    /// FASTA record with no surviving hit
    fn without_hit(name: &str, sequence: &str) -> Self {
        Prediction {
            name: name.to_string(),
            fasta_sequence: Some(sequence.to_string()),
            ..Default::default()
        }
    }
}

/// Translational T-box predictor over a batch of INFERNAL hits
pub struct TboxPredictor {
    config: PredictConfig,
    oracle: Box<dyn FoldingOracle>,
}

impl TboxPredictor {
    pub fn new(config: PredictConfig) -> Self {
        TboxPredictor {
            config,
            oracle: Box::new(ViennaRna::default()),
        }
    }

    pub fn with_oracle(mut self, oracle: Box<dyn FoldingOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_score_cutoff(mut self, score_cutoff: f64) -> Self {
        self.config.score_cutoff = score_cutoff;
        self
    }

    pub fn with_thermo(mut self, thermo: bool) -> Self {
        self.config.thermo = thermo;
        self
    }

    pub fn config(&self) -> &PredictConfig {
        &self.config
    }

    /// Features of one hit in alignment coordinates. A hit whose sequence and
    /// structure lines disagree in length gets no features, only a warning.
    pub fn locate(&self, hit: &HitRecord) -> FeatureSet {
        let mut features = match locate_features(&hit.sequence, &hit.structure, 1) {
            Ok(features) => features,
            Err(e) => {
                warn!("{} (rank {}): {e}", hit.name, hit.rank);
                FeatureSet::unscanned(FeatureWarning::LengthMismatch)
            }
        };
        if hit.score < self.config.score_cutoff {
            features.warnings.push(FeatureWarning::LowScore);
        }
        features
    }

    /// Full pipeline: locate, deduplicate, merge onto the FASTA, project and
    /// resolve. Rows follow FASTA order when a FASTA is given, hit order
    /// otherwise.
    pub fn predict(&self, hits: Vec<HitRecord>, fasta: Option<&SequenceIndex>) -> Vec<Prediction> {
        info!("Locating T-box features in {} hits", hits.len());
        let located: Vec<(HitRecord, FeatureSet)> = hits
            .into_par_iter()
            .map(|hit| {
                let features = self.locate(&hit);
                (hit, features)
            })
            .collect();

        let located = deduplicate(located);
        info!("{} hits after deduplication", located.len());

        let rows = match fasta {
            Some(fasta) => merge_with_fasta(located, fasta),
            None => located
                .into_iter()
                .map(|(hit, features)| Prediction::from_hit(hit, features, None))
                .collect(),
        };

        info!("Deriving coordinates for {} rows", rows.len());
        rows.into_par_iter().map(|row| self.derive(row)).collect()
    }

    /// Source coordinates, structure cleanup and thermodynamics for one row
    fn derive(&self, mut prediction: Prediction) -> Prediction {
        let Some(hit) = &prediction.hit else {
            return prediction;
        };
        prediction.term_end = Some(hit.end);

        let mapping = PositionMapping::build(&hit.sequence, hit.base_offset());
        project_features(&mut prediction.features, &mapping);

        let Some(source) = &prediction.fasta_sequence else {
            return prediction;
        };
        prediction.resolved =
            resolve_structure(source, hit.start, hit.end, &hit.sequence, &hit.structure);
        if prediction.resolved.is_none() {
            debug!("{}: nothing to resolve", hit.name);
        }

        if self.config.thermo {
            let whole = prediction
                .resolved
                .as_ref()
                .map(|resolved| resolved.dot_structure.as_str());
            prediction.thermo = Some(thermo::analyze(
                self.oracle.as_ref(),
                source,
                whole,
                &prediction.features,
                hit.end,
            ));
        }
        prediction
    }
}

/// Keep the first hit of every distinct alignment sequence
fn deduplicate(located: Vec<(HitRecord, FeatureSet)>) -> Vec<(HitRecord, FeatureSet)> {
    let mut seen = HashSet::new();
    let total = located.len();
    let kept: Vec<_> = located
        .into_iter()
        .filter(|(hit, _)| seen.insert(hit.sequence.clone()))
        .collect();
    if kept.len() < total {
        debug!("Dropped {} duplicate hits", total - kept.len());
    }
    kept
}

/// Left join of the hits onto the FASTA records
fn merge_with_fasta(
    located: Vec<(HitRecord, FeatureSet)>,
    fasta: &SequenceIndex,
) -> Vec<Prediction> {
    let mut by_name: IndexMap<String, Vec<(HitRecord, FeatureSet)>> = IndexMap::new();
    for (hit, features) in located {
        by_name
            .entry(hit.name.clone())
            .or_default()
            .push((hit, features));
    }

    let mut rows = Vec::with_capacity(fasta.len().max(by_name.len()));
    for (name, sequence) in fasta.iter() {
        match by_name.swap_remove(name) {
            Some(hits) => rows.extend(hits.into_iter().map(|(hit, features)| {
                Prediction::from_hit(hit, features, Some(sequence.to_string()))
            })),
            None => rows.push(Prediction::without_hit(name, sequence)),
        }
    }

    for (name, hits) in &by_name {
        warn!(
            "Dropping {} hit(s) on {name}: no such record in the FASTA file",
            hits.len()
        );
    }
    rows
}
