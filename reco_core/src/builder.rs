//! Generic opposite-sign pair candidate builder.
//!
//! One builder serves both decay topologies: a weak V0 decay (Lambda → p π−)
//! whose daughters originate from a displaced vertex, and a strong resonance
//! (Phi → K+ K−) whose daughters come straight from the primary vertex. The
//! shared machinery is the cross product over sign-separated track lists, the
//! two-helix closest approach and the invariant-mass evaluation at the DCA
//! points; only the topology block differs.

use crate::dca::closest_approach;
use crate::helix::Helix;
use crate::selection::{LambdaCuts, PhiCuts};
use crate::types::{Event, Track, Vec3, KAON_MASS, PION_MASS, PROTON_MASS};

// ---------------------------------------------------------------------------
// Pair kinematics
// ---------------------------------------------------------------------------

/// Invariant mass of a two-particle system from the daughter momenta and rest
/// masses (GeV/c²). Symmetric in its arguments.
pub fn invariant_mass(p1: &Vec3, p2: &Vec3, m1: f64, m2: f64) -> f64 {
    let e1 = (p1.norm_squared() + m1 * m1).sqrt();
    let e2 = (p2.norm_squared() + m2 * m2).sqrt();
    let e = e1 + e2;
    let p = p1 + p2;
    (e * e - p.norm_squared()).max(0.0).sqrt()
}

/// Invariant mass from (pt, eta, phi) summaries, for mixed-event sampling
/// where full vectors are not kept.
pub fn invariant_mass_ptetaphi(
    a: (f64, f64, f64),
    b: (f64, f64, f64),
    m1: f64,
    m2: f64,
) -> f64 {
    let to_vec = |(pt, eta, phi): (f64, f64, f64)| {
        Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh())
    };
    invariant_mass(&to_vec(a), &to_vec(b), m1, m2)
}

/// Opening angle between two momenta (rad). A vanishing momentum makes the
/// angle undefined; report the maximal angle π so such pairs fail any
/// realistic window cut.
pub fn opening_angle(p1: &Vec3, p2: &Vec3) -> f64 {
    let mag = p1.norm() * p2.norm();
    if mag < 1e-10 {
        return std::f64::consts::PI;
    }
    (p1.dot(p2) / mag).clamp(-1.0, 1.0).acos()
}

/// Rapidity of the pair system. Returns exactly 0.0 when E ≤ |pz|, which can
/// only happen through rounding for physical masses.
pub fn pair_rapidity(p1: &Vec3, p2: &Vec3, m1: f64, m2: f64) -> f64 {
    let e = (p1.norm_squared() + m1 * m1).sqrt() + (p2.norm_squared() + m2 * m2).sqrt();
    let pz = p1.z + p2.z;
    if e <= pz.abs() {
        return 0.0;
    }
    0.5 * ((e + pz) / (e - pz)).ln()
}

// ---------------------------------------------------------------------------
// Hypothesis and candidate types
// ---------------------------------------------------------------------------

/// Which geometric picture applies to a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopologyKind {
    /// Displaced weak-decay vertex (Lambda)
    V0,
    /// Prompt decay at the primary vertex (Phi)
    Resonance,
}

/// Everything the builder needs to know about one decay channel.
#[derive(Clone, Debug)]
pub struct PairHypothesis {
    pub label: &'static str,
    /// Rest mass assigned to the positive daughter (GeV/c²)
    pub mass_pos: f64,
    /// Rest mass assigned to the negative daughter (GeV/c²)
    pub mass_neg: f64,
    /// Reject DCA solutions with |s| beyond this (cm)
    pub max_path_length: f64,
    /// Reject pairs whose mutual DCA exceeds this (cm)
    pub max_daughter_dca: f64,
    pub topology: TopologyKind,
}

impl PairHypothesis {
    /// Lambda → p + π− channel.
    pub fn lambda(cuts: &LambdaCuts) -> Self {
        Self {
            label: "Lambda",
            mass_pos: PROTON_MASS,
            mass_neg: PION_MASS,
            max_path_length: cuts.max_path_length,
            max_daughter_dca: cuts.max_daughter_dca,
            topology: TopologyKind::V0,
        }
    }

    /// Phi → K+ + K− channel.
    pub fn phi(cuts: &PhiCuts) -> Self {
        Self {
            label: "Phi",
            mass_pos: KAON_MASS,
            mass_neg: KAON_MASS,
            max_path_length: cuts.max_path_length,
            max_daughter_dca: cuts.max_dca_kk,
            topology: TopologyKind::Resonance,
        }
    }
}

/// Topology-specific quantities of an accepted pair.
#[derive(Clone, Copy, Debug)]
pub enum Topology {
    V0 {
        /// Reconstructed decay vertex (cm)
        vertex: Vec3,
        /// Distance from the primary vertex to the decay vertex (cm)
        decay_length: f64,
        /// Cosine of the angle between flight line and momentum
        cos_pointing: f64,
        /// DCA of the reconstructed parent trajectory to the PV (cm)
        dca_to_pv: f64,
    },
    Resonance {
        /// Opening angle between the daughter momenta (rad)
        opening_angle: f64,
        /// Rapidity of the pair system
        rapidity: f64,
    },
}

/// One accepted opposite-sign pair. Immutable once built.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub label: &'static str,
    /// Invariant mass (GeV/c²)
    pub mass: f64,
    /// Combined momentum at the decay point (GeV/c)
    pub momentum: Vec3,
    /// Mutual DCA of the daughters (cm)
    pub dca_daughters: f64,
    /// Index of the positive daughter in the caller's list
    pub pos_index: usize,
    /// Index of the negative daughter in the caller's list
    pub neg_index: usize,
    pub topology: Topology,
}

impl Candidate {
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }

    pub fn eta(&self) -> f64 {
        let p = self.momentum.norm();
        let pz = self.momentum.z;
        if p <= pz.abs() {
            return 0.0;
        }
        0.5 * ((p + pz) / (p - pz)).ln()
    }

    pub fn phi(&self) -> f64 {
        self.momentum.y.atan2(self.momentum.x)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Pair every positive track with every negative track under the given
/// hypothesis. Infeasible geometry skips the pair silently; only accepted
/// candidates allocate.
pub fn build_candidates(
    hyp: &PairHypothesis,
    positives: &[&Track],
    negatives: &[&Track],
    event: &Event,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    if positives.is_empty() || negatives.is_empty() {
        return out;
    }

    // helices for the inner loop are built once per event
    let neg_helices: Vec<Helix> = negatives
        .iter()
        .map(|t| Helix::new(t.momentum, t.origin, event.b_field, t.charge))
        .collect();

    for (i, pos) in positives.iter().enumerate() {
        if pos.charge <= 0 {
            continue;
        }
        let pos_helix = Helix::new(pos.momentum, pos.origin, event.b_field, pos.charge);
        for (j, neg) in negatives.iter().enumerate() {
            if neg.charge >= 0 {
                continue;
            }
            let dca = match closest_approach(&pos_helix, &neg_helices[j]) {
                Some(d) => d,
                None => continue,
            };
            if dca.s1.abs() > hyp.max_path_length || dca.s2.abs() > hyp.max_path_length {
                continue;
            }
            if dca.separation > hyp.max_daughter_dca {
                continue;
            }

            let p_pos = pos_helix.momentum_at(dca.s1);
            let p_neg = neg_helices[j].momentum_at(dca.s2);
            let momentum = p_pos + p_neg;
            let mass = invariant_mass(&p_pos, &p_neg, hyp.mass_pos, hyp.mass_neg);

            let topology = match hyp.topology {
                TopologyKind::V0 => {
                    let vertex = dca.midpoint();
                    let flight = vertex - event.vertex;
                    let p_mag = momentum.norm();
                    if p_mag < 1e-5 {
                        continue;
                    }
                    let cos_pointing =
                        flight.dot(&momentum) / (flight.norm() * p_mag + 1e-10);
                    let dca_to_pv = (event.vertex - vertex).cross(&momentum).norm() / p_mag;
                    Topology::V0 {
                        vertex,
                        decay_length: flight.norm(),
                        cos_pointing,
                        dca_to_pv,
                    }
                }
                TopologyKind::Resonance => Topology::Resonance {
                    opening_angle: opening_angle(&p_pos, &p_neg),
                    rapidity: pair_rapidity(&p_pos, &p_neg, hyp.mass_pos, hyp.mass_neg),
                },
            };

            out.push(Candidate {
                label: hyp.label,
                mass,
                momentum,
                dca_daughters: dca.separation,
                pos_index: i,
                neg_index: j,
                topology,
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LAMBDA_MASS, TOF_INVALID};
    use approx::assert_abs_diff_eq;

    fn track(px: f64, py: f64, pz: f64, x: f64, y: f64, z: f64, charge: i32) -> Track {
        Track {
            origin: Vec3::new(x, y, z),
            momentum: Vec3::new(px, py, pz),
            charge,
            n_hits_fit: 35,
            n_hits_max: 45,
            n_hits_dedx: 25,
            dca: 1.0,
            chi2: 1.2,
            nsigma_pion: 0.0,
            nsigma_kaon: 0.0,
            nsigma_proton: 0.0,
            beta: TOF_INVALID,
            mass2: TOF_INVALID,
            tof_match: false,
        }
    }

    fn event() -> Event {
        Event {
            run_id: 1,
            event_id: 1,
            vertex: Vec3::zeros(),
            vz_vpd: 0.0,
            ref_mult: 100,
            centrality: 30.0,
            b_field: 4.98,
            qx: 0.0,
            qy: 0.0,
            psi2: -999.0,
        }
    }

    #[test]
    fn invariant_mass_is_symmetric_and_recovers_rest_mass() {
        let p1 = Vec3::new(0.6, 0.1, 0.05);
        let p2 = Vec3::new(0.3, -0.1, -0.02);
        let a = invariant_mass(&p1, &p2, PROTON_MASS, PION_MASS);
        let b = invariant_mass(&p2, &p1, PION_MASS, PROTON_MASS);
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);

        // back-to-back equal momenta in the parent rest frame
        let q = Vec3::new(0.101, 0.0, 0.0); // p* of Lambda -> p pi
        let m = invariant_mass(&q, &(-q), PROTON_MASS, PION_MASS);
        assert_abs_diff_eq!(m, LAMBDA_MASS, epsilon = 1e-3);
    }

    #[test]
    fn opening_angle_bounds_and_guard() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_abs_diff_eq!(opening_angle(&x, &y), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(opening_angle(&x, &x), 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(opening_angle(&x, &(-x)), std::f64::consts::PI, epsilon = 1e-7);
        assert_eq!(opening_angle(&Vec3::zeros(), &x), std::f64::consts::PI);
    }

    #[test]
    fn pair_rapidity_guard_returns_exact_zero() {
        // massless daughters along z make E == |pz|
        let p1 = Vec3::new(0.0, 0.0, 1.0);
        let p2 = Vec3::new(0.0, 0.0, 2.0);
        assert_eq!(pair_rapidity(&p1, &p2, 0.0, 0.0), 0.0);
        // a physical pair at midrapidity
        let q = Vec3::new(0.5, 0.0, 0.0);
        assert_abs_diff_eq!(pair_rapidity(&q, &(-q), KAON_MASS, KAON_MASS), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn ptetaphi_mass_matches_vector_mass() {
        let p1 = Vec3::new(0.6, 0.1, 0.05);
        let p2 = Vec3::new(0.3, -0.1, -0.02);
        let summary = |p: &Vec3| {
            let pt = p.x.hypot(p.y);
            let eta = 0.5 * ((p.norm() + p.z) / (p.norm() - p.z)).ln();
            (pt, eta, p.y.atan2(p.x))
        };
        let a = invariant_mass(&p1, &p2, KAON_MASS, KAON_MASS);
        let b = invariant_mass_ptetaphi(summary(&p1), summary(&p2), KAON_MASS, KAON_MASS);
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }

    #[test]
    fn v0_pair_from_common_vertex_is_reconstructed() {
        let decay = Vec3::new(1.0, 0.0, 0.0);
        let proton = track(0.6, 0.1, 0.05, decay.x, decay.y, decay.z, 1);
        let pion = track(0.3, -0.1, -0.02, decay.x, decay.y, decay.z, -1);
        let hyp = PairHypothesis::lambda(&LambdaCuts::default());
        let cands = build_candidates(&hyp, &[&proton], &[&pion], &event());
        assert_eq!(cands.len(), 1);
        let c = &cands[0];
        assert!(c.dca_daughters < 1e-2);
        // momenta barely rotate over the ~zero path to the DCA point, so the
        // candidate mass matches the mass of the input momenta
        let expected = invariant_mass(
            &proton.momentum,
            &pion.momentum,
            PROTON_MASS,
            PION_MASS,
        );
        assert_abs_diff_eq!(c.mass, expected, epsilon = 1e-4);
        match c.topology {
            Topology::V0 { vertex, decay_length, cos_pointing, dca_to_pv } => {
                assert!((vertex - decay).norm() < 0.1);
                assert_abs_diff_eq!(decay_length, 1.0, epsilon = 0.1);
                // daughters emitted from a point on the flight line point back
                assert!(cos_pointing > 0.99, "cos pointing {cos_pointing}");
                assert!(dca_to_pv < 0.2, "dca to pv {dca_to_pv}");
            }
            Topology::Resonance { .. } => panic!("expected V0 topology"),
        }
    }

    #[test]
    fn sign_recheck_drops_mislabelled_tracks() {
        let decay = Vec3::new(1.0, 0.0, 0.0);
        let wrong_sign = track(0.6, 0.1, 0.05, decay.x, decay.y, decay.z, -1);
        let pion = track(0.3, -0.1, -0.02, decay.x, decay.y, decay.z, -1);
        let hyp = PairHypothesis::lambda(&LambdaCuts::default());
        let cands = build_candidates(&hyp, &[&wrong_sign], &[&pion], &event());
        assert!(cands.is_empty());
    }

    #[test]
    fn far_separated_tracks_yield_no_candidate() {
        // the only near-miss winding sits hundreds of cm down the pion helix,
        // beyond the path-length cap
        let proton = track(0.6, 0.1, 0.05, 1.0, 0.0, 0.0, 1);
        let pion = track(0.3, -0.1, -0.02, 1.0, 0.0, 50.0, -1);
        let hyp = PairHypothesis::lambda(&LambdaCuts::default());
        let cands = build_candidates(&hyp, &[&proton], &[&pion], &event());
        assert!(cands.is_empty());
    }
}
