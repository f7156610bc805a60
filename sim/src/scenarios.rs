//! Scenario definitions.
//!
//! Each scenario is a named set of per-event generation rates. All scenarios
//! are deterministic given the same seed.

use serde::{Deserialize, Serialize};

/// Which pre-defined scenario to generate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Moderate multiplicity, a little of everything
    MinBias,
    /// High multiplicity central collisions — combinatorics stress test
    Central,
    /// Several Lambdas per event, light background
    LambdaEnriched,
    /// Several Phis per event, light background
    PhiEnriched,
    /// Pure background, no injected signal
    BackgroundOnly,
}

/// A fully configured event-generation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    /// Mean background primaries per event (Poisson)
    pub mean_background: f64,
    /// Mean injected Lambda decays per event (Poisson)
    pub mean_lambdas: f64,
    /// Mean injected Phi decays per event (Poisson)
    pub mean_phis: f64,
    /// Vertex z spread, uniform in ±this (cm)
    pub vz_spread: f64,
    /// Solenoid field (kilogauss, signed)
    pub b_field: f64,
    /// Centrality sampling window (percent)
    pub min_centrality: f64,
    pub max_centrality: f64,
    /// Fraction of tracks carrying a TOF match
    pub tof_match_fraction: f64,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::MinBias => Self {
                name: "min_bias".into(),
                seed,
                mean_background: 80.0,
                mean_lambdas: 0.5,
                mean_phis: 0.3,
                vz_spread: 60.0,
                b_field: 4.98,
                min_centrality: 0.0,
                max_centrality: 80.0,
                tof_match_fraction: 0.6,
            },
            ScenarioKind::Central => Self {
                name: "central".into(),
                seed,
                mean_background: 400.0,
                mean_lambdas: 2.0,
                mean_phis: 1.0,
                vz_spread: 40.0,
                b_field: 4.98,
                min_centrality: 0.0,
                max_centrality: 10.0,
                tof_match_fraction: 0.6,
            },
            ScenarioKind::LambdaEnriched => Self {
                name: "lambda_enriched".into(),
                seed,
                mean_background: 30.0,
                mean_lambdas: 4.0,
                mean_phis: 0.0,
                vz_spread: 30.0,
                b_field: 4.98,
                min_centrality: 20.0,
                max_centrality: 60.0,
                tof_match_fraction: 0.7,
            },
            ScenarioKind::PhiEnriched => Self {
                name: "phi_enriched".into(),
                seed,
                mean_background: 30.0,
                mean_lambdas: 0.0,
                mean_phis: 4.0,
                vz_spread: 30.0,
                b_field: 4.98,
                min_centrality: 20.0,
                max_centrality: 60.0,
                tof_match_fraction: 0.7,
            },
            ScenarioKind::BackgroundOnly => Self {
                name: "background_only".into(),
                seed,
                mean_background: 100.0,
                mean_lambdas: 0.0,
                mean_phis: 0.0,
                vz_spread: 60.0,
                b_field: 4.98,
                min_centrality: 0.0,
                max_centrality: 80.0,
                tof_match_fraction: 0.6,
            },
        }
    }
}
