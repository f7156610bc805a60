//! Histogram accumulation sink.
//!
//! The pipeline talks to an [`Accumulator`] trait so tests can swap in
//! counting doubles. The production implementation, [`HistogramSet`], owns
//! plain uniform-binning histograms keyed by name; lookups in deterministic
//! order, serializable to JSON for downstream plotting. Filling a name that
//! was never booked is a no-op, logged once per name.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Sink for scalar and 2-D fills.
pub trait Accumulator {
    fn fill(&mut self, name: &str, x: f64);
    fn fill2(&mut self, name: &str, x: f64, y: f64);
}

// ---------------------------------------------------------------------------
// 1-D histogram
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct Hist1 {
    pub n_bins: usize,
    pub min: f64,
    pub max: f64,
    pub bins: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
    pub entries: u64,
    /// Running sum of filled values, for a cheap mean
    pub sum: f64,
}

impl Hist1 {
    pub fn new(n_bins: usize, min: f64, max: f64) -> Self {
        Self {
            n_bins,
            min,
            max,
            bins: vec![0; n_bins],
            underflow: 0,
            overflow: 0,
            entries: 0,
            sum: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.entries += 1;
        self.sum += x;
        if x < self.min {
            self.underflow += 1;
        } else if x >= self.max {
            self.overflow += 1;
        } else {
            let idx = ((x - self.min) / (self.max - self.min) * self.n_bins as f64) as usize;
            self.bins[idx.min(self.n_bins - 1)] += 1;
        }
    }

    pub fn mean(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.sum / self.entries as f64
        }
    }

    /// In-range entry count.
    pub fn integral(&self) -> u64 {
        self.bins.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// 2-D histogram
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct Hist2 {
    pub n_bins_x: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub n_bins_y: usize,
    pub min_y: f64,
    pub max_y: f64,
    /// Row-major, y outer
    pub bins: Vec<u64>,
    pub out_of_range: u64,
    pub entries: u64,
}

impl Hist2 {
    pub fn new(
        n_bins_x: usize,
        min_x: f64,
        max_x: f64,
        n_bins_y: usize,
        min_y: f64,
        max_y: f64,
    ) -> Self {
        Self {
            n_bins_x,
            min_x,
            max_x,
            n_bins_y,
            min_y,
            max_y,
            bins: vec![0; n_bins_x * n_bins_y],
            out_of_range: 0,
            entries: 0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.entries += 1;
        if x < self.min_x || x >= self.max_x || y < self.min_y || y >= self.max_y {
            self.out_of_range += 1;
            return;
        }
        let ix = ((x - self.min_x) / (self.max_x - self.min_x) * self.n_bins_x as f64) as usize;
        let iy = ((y - self.min_y) / (self.max_y - self.min_y) * self.n_bins_y as f64) as usize;
        let ix = ix.min(self.n_bins_x - 1);
        let iy = iy.min(self.n_bins_y - 1);
        self.bins[iy * self.n_bins_x + ix] += 1;
    }

    pub fn integral(&self) -> u64 {
        self.bins.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Named histogram set
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
pub struct HistogramSet {
    pub h1: BTreeMap<String, Hist1>,
    pub h2: BTreeMap<String, Hist2>,
    #[serde(skip)]
    missing: HashSet<String>,
}

impl HistogramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book1(&mut self, name: &str, n_bins: usize, min: f64, max: f64) {
        self.h1.insert(name.to_owned(), Hist1::new(n_bins, min, max));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn book2(
        &mut self,
        name: &str,
        nx: usize,
        min_x: f64,
        max_x: f64,
        ny: usize,
        min_y: f64,
        max_y: f64,
    ) {
        self.h2
            .insert(name.to_owned(), Hist2::new(nx, min_x, max_x, ny, min_y, max_y));
    }

    /// Everything the reconstruction pipeline fills.
    pub fn standard() -> Self {
        let mut set = Self::new();

        // bookkeeping: 0 processed, 1 accepted, 2 Lambda, 3 Phi,
        // 4 mixed Lambda, 5 mixed Phi
        set.book1("hN", 10, 0.0, 10.0);

        // event level
        set.book1("hVz", 200, -200.0, 200.0);
        set.book1("hVzDiff", 100, -10.0, 10.0);
        set.book1("hRefMult", 1000, 0.0, 1000.0);
        set.book1("hCentrality", 100, 0.0, 100.0);
        set.book1("hPsi2", 120, 0.0, std::f64::consts::PI);
        set.book1("hTofMult", 500, 0.0, 500.0);
        set.book2("hVxVy", 100, -5.0, 5.0, 100, -5.0, 5.0);
        set.book2("hRefMultVsVz", 100, -100.0, 100.0, 100, 0.0, 1000.0);

        // track level
        set.book1("hPt", 200, 0.0, 10.0);
        set.book1("hEta", 100, -2.0, 2.0);
        set.book1("hPhi", 120, -std::f64::consts::PI, std::f64::consts::PI);
        set.book1("hNHitsFit", 50, 0.0, 50.0);
        set.book1("hNHitsRatio", 60, 0.0, 1.2);
        set.book1("hDca", 100, 0.0, 5.0);
        set.book1("hChi2", 100, 0.0, 10.0);
        set.book1("hCharge", 5, -2.5, 2.5);
        set.book2("hNSigmaPionVsP", 100, 0.0, 5.0, 100, -10.0, 10.0);
        set.book2("hNSigmaKaonVsP", 100, 0.0, 5.0, 100, -10.0, 10.0);
        set.book2("hNSigmaProtonVsP", 100, 0.0, 5.0, 100, -10.0, 10.0);

        // Lambda channel
        set.book1("hLambdaMass", 200, 1.07, 1.17);
        set.book1("hLambdaPt", 100, 0.0, 10.0);
        set.book1("hLambdaEta", 100, -2.0, 2.0);
        set.book1("hLambdaPhi", 120, -std::f64::consts::PI, std::f64::consts::PI);
        set.book1("hLambdaDcaDaughters", 100, 0.0, 2.0);
        set.book1("hLambdaDcaV0", 100, 0.0, 2.0);
        set.book1("hLambdaCosPointing", 100, 0.99, 1.0);
        set.book1("hLambdaDecayLength", 100, 0.0, 50.0);
        set.book1("hLambdaMassMixed", 200, 1.07, 1.17);
        set.book2("hLambdaMassVsPt", 100, 0.0, 10.0, 200, 1.07, 1.17);

        // Phi channel
        set.book1("hKaonMult", 50, 0.0, 50.0);
        set.book1("hPhiMass", 200, 0.98, 1.08);
        set.book1("hPhiMassCut", 200, 0.98, 1.08);
        set.book1("hPhiMassAll", 200, 0.98, 1.08);
        set.book1("hPhiMassMixed", 200, 0.98, 1.08);
        set.book1("hPhiPt", 100, 0.0, 10.0);
        set.book1("hPhiOpeningAngle", 100, 0.0, std::f64::consts::PI);
        set.book1("hPhiRapidity", 100, -2.0, 2.0);
        set.book2("hPhiMassVsPt", 100, 0.0, 10.0, 200, 0.98, 1.08);

        set
    }

    pub fn get1(&self, name: &str) -> Option<&Hist1> {
        self.h1.get(name)
    }

    pub fn get2(&self, name: &str) -> Option<&Hist2> {
        self.h2.get(name)
    }

    fn warn_missing(&mut self, name: &str) {
        if self.missing.insert(name.to_owned()) {
            warn!(name, "fill to unbooked histogram ignored");
        }
    }
}

impl Accumulator for HistogramSet {
    fn fill(&mut self, name: &str, x: f64) {
        match self.h1.get_mut(name) {
            Some(h) => h.fill(x),
            None => self.warn_missing(name),
        }
    }

    fn fill2(&mut self, name: &str, x: f64, y: f64) {
        match self.h2.get_mut(name) {
            Some(h) => h.fill(x, y),
            None => self.warn_missing(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Records every fill; lets tests assert on exactly what the pipeline sent.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub fills: Vec<(String, f64)>,
    pub fills2: Vec<(String, f64, f64)>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many 1-D fills landed on `name`.
    pub fn count(&self, name: &str) -> usize {
        self.fills.iter().filter(|(n, _)| n == name).count()
    }

    /// Values of the 1-D fills on `name`, in fill order.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.fills
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl Accumulator for CountingSink {
    fn fill(&mut self, name: &str, x: f64) {
        self.fills.push((name.to_owned(), x));
    }

    fn fill2(&mut self, name: &str, x: f64, y: f64) {
        self.fills2.push((name.to_owned(), x, y));
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl Accumulator for NullSink {
    fn fill(&mut self, _name: &str, _x: f64) {}
    fn fill2(&mut self, _name: &str, _x: f64, _y: f64) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hist1_bins_edges_and_flows() {
        let mut h = Hist1::new(10, 0.0, 10.0);
        h.fill(0.0); // first bin, lower edge inclusive
        h.fill(9.999); // last bin
        h.fill(10.0); // upper edge goes to overflow
        h.fill(-0.1);
        assert_eq!(h.bins[0], 1);
        assert_eq!(h.bins[9], 1);
        assert_eq!(h.overflow, 1);
        assert_eq!(h.underflow, 1);
        assert_eq!(h.entries, 4);
        assert_eq!(h.integral(), 2);
        assert_abs_diff_eq!(h.mean(), (0.0 + 9.999 + 10.0 - 0.1) / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn hist2_maps_to_expected_cell() {
        let mut h = Hist2::new(4, 0.0, 4.0, 2, 0.0, 2.0);
        h.fill(2.5, 1.5); // ix=2, iy=1
        assert_eq!(h.bins[1 * 4 + 2], 1);
        h.fill(5.0, 0.5);
        assert_eq!(h.out_of_range, 1);
        assert_eq!(h.integral(), 1);
    }

    #[test]
    fn unknown_name_is_noop() {
        let mut set = HistogramSet::standard();
        set.fill("hDoesNotExist", 1.0);
        set.fill("hDoesNotExist", 2.0);
        set.fill2("hAlsoMissing", 1.0, 2.0);
        assert!(set.get1("hDoesNotExist").is_none());
        // booked ones still work
        set.fill("hVz", 12.0);
        assert_eq!(set.get1("hVz").unwrap().entries, 1);
    }

    #[test]
    fn standard_set_books_the_pipeline_names() {
        let set = HistogramSet::standard();
        for name in [
            "hN", "hVz", "hRefMult", "hPt", "hLambdaMass", "hLambdaMassMixed",
            "hPhiMass", "hPhiMassCut", "hPhiMassAll", "hPhiMassMixed", "hPsi2",
        ] {
            assert!(set.get1(name).is_some(), "missing {name}");
        }
        for name in ["hVxVy", "hRefMultVsVz", "hLambdaMassVsPt", "hPhiMassVsPt"] {
            assert!(set.get2(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn counting_sink_records_in_order() {
        let mut sink = CountingSink::new();
        sink.fill("a", 1.0);
        sink.fill("b", 2.0);
        sink.fill("a", 3.0);
        assert_eq!(sink.count("a"), 2);
        assert_eq!(sink.values("a"), vec![1.0, 3.0]);
    }
}
