//! Event-mixing pool for combinatorial-background estimation.
//!
//! Events are only mixed with events of similar geometry: the pool is keyed
//! by a flat bin index over (vertex z, centrality, event-plane angle). Each
//! bin keeps a bounded FIFO of recent event snapshots; mixed pairs are drawn
//! between the current event's identified tracks and a random snapshot from
//! the same bin. The caller draws its partner before inserting the current
//! event, so an event never mixes with itself.

use std::collections::{HashMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::builder::invariant_mass_ptetaphi;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MixingConfig {
    pub n_vz_bins: usize,
    pub n_centrality_bins: usize,
    /// 1 disables event-plane binning
    pub n_event_plane_bins: usize,
    /// Snapshots retained per bin
    pub buffer_size: usize,
    /// Mixed pairs drawn per event and channel
    pub pairs_per_event: usize,
    /// Sampling RNG seed, fixed for reproducibility
    pub seed: u64,
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            n_vz_bins: 10,
            n_centrality_bins: 9,
            n_event_plane_bins: 1,
            buffer_size: 20,
            pairs_per_event: 1000,
            seed: 20260815,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// (pt, eta, phi) summary of one identified track; enough to rebuild its
/// momentum vector for mass sampling.
pub type TrackSummary = (f64, f64, f64);

/// What the pool retains of a processed event: header bits plus the
/// species-filtered track summaries.
#[derive(Clone, Debug, Default)]
pub struct EventSnapshot {
    pub event_id: i32,
    pub protons: Vec<TrackSummary>,
    pub pions: Vec<TrackSummary>,
    pub kaons_pos: Vec<TrackSummary>,
    pub kaons_neg: Vec<TrackSummary>,
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

pub struct MixingPool {
    config: MixingConfig,
    bins: HashMap<usize, VecDeque<EventSnapshot>>,
    rng: ChaCha8Rng,
}

/// Uniform bin of `v` over [min, max), clamped into range.
fn component_bin(v: f64, min: f64, max: f64, n: usize) -> usize {
    let raw = ((v - min) / (max - min) * n as f64).floor();
    if raw < 0.0 {
        0
    } else {
        (raw as usize).min(n - 1)
    }
}

impl MixingPool {
    pub fn new(config: MixingConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            bins: HashMap::new(),
            rng,
        }
    }

    /// Flat bin index of an event. Event-plane binning participates only
    /// when configured and when ψ₂ is valid (ψ₂ ∈ [0, π); negative means
    /// unmeasured).
    pub fn bin_index(&self, vz: f64, centrality: f64, psi2: f64) -> usize {
        let c = &self.config;
        let vz_bin = component_bin(vz, -100.0, 100.0, c.n_vz_bins);
        let cent_bin = component_bin(centrality, 0.0, 100.0, c.n_centrality_bins);
        let ep_bin = if c.n_event_plane_bins > 1 && psi2 >= 0.0 {
            component_bin(psi2, 0.0, std::f64::consts::PI, c.n_event_plane_bins)
        } else {
            0
        };
        vz_bin + c.n_vz_bins * (cent_bin + c.n_centrality_bins * ep_bin)
    }

    /// Append a snapshot to its bin, evicting the oldest beyond capacity.
    pub fn insert(&mut self, bin: usize, snapshot: EventSnapshot) {
        let queue = self.bins.entry(bin).or_default();
        queue.push_back(snapshot);
        while queue.len() > self.config.buffer_size {
            queue.pop_front();
        }
    }

    /// Random snapshot from the bin, or `None` while the bin is empty.
    /// Returns a copy so the caller can keep filling the pool.
    pub fn draw_partner(&mut self, bin: usize) -> Option<EventSnapshot> {
        let queue = self.bins.get(&bin)?;
        if queue.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..queue.len());
        queue.get(idx).cloned()
    }

    /// Sample mixed-pair invariant masses between two track lists, drawing
    /// `pairs_per_event` pairs uniformly with replacement. Either list empty
    /// yields no pairs.
    pub fn mixed_masses(
        &mut self,
        list_a: &[TrackSummary],
        list_b: &[TrackSummary],
        mass_a: f64,
        mass_b: f64,
    ) -> Vec<f64> {
        if list_a.is_empty() || list_b.is_empty() {
            return Vec::new();
        }
        let n = self.config.pairs_per_event;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let a = list_a[self.rng.gen_range(0..list_a.len())];
            let b = list_b[self.rng.gen_range(0..list_b.len())];
            out.push(invariant_mass_ptetaphi(a, b, mass_a, mass_b));
        }
        out
    }

    /// Total snapshots currently held across all bins.
    pub fn len(&self) -> usize {
        self.bins.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.bins.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
