use rand::Rng;

use crate::error::{Error, Result};
use crate::keys::ChordAndAccidentals;

/// Weight of one candidate given its suffix and accidental degrees. Weights
/// at or below zero make a candidate unselectable.
pub type WeightingFn = fn(suffix: &str, accidental_degrees: &[u8]) -> f64;

/// A named chord-selection policy: an optional weighting over candidates
/// plus optional suffix white/blacklists. Flavours are immutable values
/// shared read-only across generation calls; a whitelist always wins over
/// a blacklist.
#[derive(Debug, Clone, Copy)]
pub struct Flavour {
    pub name: &'static str,
    pub weighting: Option<WeightingFn>,
    pub whitelist: Option<&'static [&'static str]>,
    pub blacklist: Option<&'static [&'static str]>,
}

impl PartialEq for Flavour {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn is_over_chord(suffix: &str) -> bool {
    suffix.contains('/')
}

fn constant_weight(_: &str, _: &[u8]) -> f64 {
    1.0
}

fn balanced_weight(suffix: &str, degrees: &[u8]) -> f64 {
    (5.0 - degrees.len() as f64).max(1.0) + if is_over_chord(suffix) { 2.0 } else { 0.0 }
}

fn weird_weight(_: &str, degrees: &[u8]) -> f64 {
    1.0 + degrees.len() as f64
}

pub const MAX_POWER: Flavour = Flavour {
    name: "MAX POWER!",
    weighting: None,
    whitelist: Some(&["5"]),
    blacklist: None,
};

pub const BASIC: Flavour = Flavour {
    name: "Basic",
    weighting: None,
    whitelist: Some(&["5", "major", "minor", "sus4", "maj7"]),
    blacklist: None,
};

pub const BALANCED: Flavour = Flavour {
    name: "Balanced",
    weighting: Some(balanced_weight),
    whitelist: None,
    blacklist: Some(&[
        "sus2sus4", "maj7b5", "dim", "dim7", "m7b5", "alt", "aug", "aug7", "7b5",
    ]),
};

pub const EXTREMELY_WEIRD: Flavour = Flavour {
    name: "Extremely weird",
    weighting: Some(weird_weight),
    whitelist: None,
    blacklist: None,
};

/// The flavours offered by the picker, in display order.
pub const FLAVOUR_CHOICES: [Flavour; 4] = [MAX_POWER, BASIC, BALANCED, EXTREMELY_WEIRD];

/// A flavour applied to a concrete candidate set: filtered candidates plus
/// a cumulative-weight table for sampling.
#[derive(Debug, Clone)]
pub struct ChordSelector {
    candidates: Vec<ChordAndAccidentals>,
    cumulative: Vec<f64>,
    total: f64,
}

impl ChordSelector {
    /// Filter `candidates` through the flavour's suffix lists and precompute
    /// cumulative weights. An empty or weightless result is an error: it
    /// means the constraint combination is unsatisfiable, and silently
    /// defaulting would hide that from the caller.
    pub fn build(flavour: &Flavour, candidates: &[ChordAndAccidentals]) -> Result<ChordSelector> {
        let keep = |suffix: &str| match (flavour.whitelist, flavour.blacklist) {
            (Some(whitelist), _) => whitelist.contains(&suffix),
            (None, Some(blacklist)) => !blacklist.contains(&suffix),
            (None, None) => true,
        };
        let candidates: Vec<ChordAndAccidentals> = candidates
            .iter()
            .filter(|c| keep(&c.chord.suffix))
            .cloned()
            .collect();
        let empty = || Error::EmptyCandidateSet {
            flavour: flavour.name.to_string(),
        };
        if candidates.is_empty() {
            return Err(empty());
        }

        let weighting = flavour.weighting.unwrap_or(constant_weight);
        let mut cumulative = Vec::with_capacity(candidates.len());
        let mut total = 0.0;
        for candidate in &candidates {
            let weight = weighting(&candidate.chord.suffix, &candidate.accidental_degrees);
            // non-finite or negative weights would corrupt the table
            total += if weight.is_finite() { weight.max(0.0) } else { 0.0 };
            cumulative.push(total);
        }
        if total <= 0.0 {
            return Err(empty());
        }
        Ok(ChordSelector {
            candidates,
            cumulative,
            total,
        })
    }

    pub fn candidates(&self) -> &[ChordAndAccidentals] {
        &self.candidates
    }

    /// Draw one candidate, biased by the cumulative weights. Upper-bound
    /// search: the first index whose cumulative weight strictly exceeds the
    /// draw, so zero-weight candidates are never selected.
    pub fn choose<R: Rng>(&self, rng: &mut R) -> &ChordAndAccidentals {
        let needle = rng.gen_range(0.0..self.total);
        let index = self.cumulative.partition_point(|&w| w <= needle);
        &self.candidates[index.min(self.candidates.len() - 1)]
    }
}
