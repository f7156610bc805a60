//! Fundamental types used across the entire workspace.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in helix geometry.
// ---------------------------------------------------------------------------

/// 3-vector for positions (cm) and momenta (GeV/c)
pub type Vec3 = Vector3<f64>;

// ---------------------------------------------------------------------------
// Particle rest masses (GeV/c²), PDG values truncated as in the analysis
// ---------------------------------------------------------------------------

pub const PROTON_MASS: f64 = 0.938272;
pub const PION_MASS: f64 = 0.139570;
pub const KAON_MASS: f64 = 0.493677;
pub const LAMBDA_MASS: f64 = 1.115683;
pub const PHI_MASS: f64 = 1.019461;

/// Sentinel for missing TOF quantities (beta, mass²).
pub const TOF_INVALID: f64 = -999.0;

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// A charged-particle track at its point of closest approach to the readout.
///
/// Immutable once built for a given event. Positions in cm, momenta in GeV/c.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    /// Global track origin (cm)
    pub origin: Vec3,
    /// Global momentum at the origin (GeV/c)
    pub momentum: Vec3,
    /// Charge, ±1
    pub charge: i32,
    /// Number of fitted hits
    pub n_hits_fit: i16,
    /// Maximum number of possible hits
    pub n_hits_max: i16,
    /// Number of hits used for dE/dx
    pub n_hits_dedx: i16,
    /// Distance of closest approach to the primary vertex (cm)
    pub dca: f64,
    /// Track fit chi²/ndf
    pub chi2: f64,
    /// TPC nSigma for the pion hypothesis
    pub nsigma_pion: f64,
    /// TPC nSigma for the kaon hypothesis
    pub nsigma_kaon: f64,
    /// TPC nSigma for the proton hypothesis
    pub nsigma_proton: f64,
    /// TOF beta ([`TOF_INVALID`] when unmatched)
    pub beta: f64,
    /// TOF mass² in (GeV/c²)² ([`TOF_INVALID`] when unmatched)
    pub mass2: f64,
    /// Whether the track has a TOF match
    pub tof_match: bool,
}

impl Track {
    /// Transverse momentum (GeV/c).
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }

    /// Total momentum magnitude (GeV/c).
    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }

    /// Pseudorapidity. Returns 0 for a vanishing momentum.
    pub fn eta(&self) -> f64 {
        let p = self.p();
        let pz = self.momentum.z;
        if p <= pz.abs() {
            return 0.0;
        }
        0.5 * ((p + pz) / (p - pz)).ln()
    }

    /// Azimuthal angle (rad).
    pub fn phi(&self) -> f64 {
        self.momentum.y.atan2(self.momentum.x)
    }

    /// Ratio of fitted hits to possible hits.
    pub fn hits_ratio(&self) -> f64 {
        if self.n_hits_max == 0 {
            return 0.0;
        }
        f64::from(self.n_hits_fit) / f64::from(self.n_hits_max)
    }

    /// All geometric/kinematic fields are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.origin.iter().all(|v| v.is_finite())
            && self.momentum.iter().all(|v| v.is_finite())
            && self.dca.is_finite()
            && self.chi2.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Collision-level attributes. Owns nothing; the per-event track list is
/// passed alongside and discarded once the event has been processed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub run_id: i32,
    pub event_id: i32,
    /// Primary vertex (cm)
    pub vertex: Vec3,
    /// VPD vertex z (cm), used for pileup rejection
    pub vz_vpd: f64,
    /// Reference multiplicity
    pub ref_mult: i32,
    /// Centrality in percent, -1 when not computed
    pub centrality: f64,
    /// Magnetic field (kilogauss, signed)
    pub b_field: f64,
    /// Second-order Q-vector components, if provided upstream
    pub qx: f64,
    pub qy: f64,
    /// Second-order event-plane angle (rad), if provided upstream
    pub psi2: f64,
}

impl Event {
    /// Radial vertex position in the transverse plane (cm).
    pub fn vr(&self) -> f64 {
        self.vertex.x.hypot(self.vertex.y)
    }

    /// Vertex and field are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.vertex.iter().all(|v| v.is_finite()) && self.b_field.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
