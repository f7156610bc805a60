//! Collision-event generator.
//!
//! Produces (Event, tracks) pairs with:
//! - Poisson-distributed background primaries with a thermal-ish pt spectrum
//! - injected Lambda → p π− decays at a displaced vertex (cτ sampling)
//! - injected Phi → K+ K− decays at the primary vertex
//! - per-track dE/dx nSigma and TOF responses consistent with the species
//!
//! Track DCA values are computed from the same helix model the
//! reconstruction uses, so injected signal survives its own cuts.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use reco_core::helix::Helix;
use reco_core::types::{
    Event, Track, Vec3, KAON_MASS, LAMBDA_MASS, PHI_MASS, PION_MASS, PROTON_MASS, TOF_INVALID,
};

use crate::scenarios::Scenario;

/// Lambda cτ (cm).
const LAMBDA_CTAU: f64 = 7.89;

/// Species label used to shape PID responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Species {
    Pion,
    Kaon,
    Proton,
}

impl Species {
    fn mass(self) -> f64 {
        match self {
            Species::Pion => PION_MASS,
            Species::Kaon => KAON_MASS,
            Species::Proton => PROTON_MASS,
        }
    }
}

pub struct EventGenerator {
    scenario: Scenario,
    rng: ChaCha8Rng,
    next_event_id: i32,
}

impl EventGenerator {
    pub fn new(scenario: Scenario) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        Self {
            scenario,
            rng,
            next_event_id: 1,
        }
    }

    /// Generate the next event with its track list.
    pub fn next_event(&mut self) -> (Event, Vec<Track>) {
        let s = self.scenario.clone();
        let vertex = Vec3::new(
            self.uniform(-0.1, 0.1),
            self.uniform(-0.1, 0.1),
            self.uniform(-s.vz_spread, s.vz_spread),
        );
        let vz_vpd = vertex.z + self.uniform(-1.0, 1.0);
        let centrality = self.uniform(s.min_centrality, s.max_centrality);

        let mut tracks = Vec::new();

        let n_background = self.poisson(s.mean_background);
        for _ in 0..n_background {
            let species = match self.rng.gen_range(0u8..10) {
                0..=6 => Species::Pion,
                7..=8 => Species::Kaon,
                _ => Species::Proton,
            };
            let momentum = self.thermal_momentum(0.3);
            let charge = if self.rng.gen::<bool>() { 1 } else { -1 };
            let origin = vertex
                + Vec3::new(
                    self.uniform(-0.2, 0.2),
                    self.uniform(-0.2, 0.2),
                    self.uniform(-0.2, 0.2),
                );
            tracks.push(self.make_track(momentum, origin, charge, species, vertex, s.b_field));
        }

        for _ in 0..self.poisson(s.mean_lambdas) {
            self.inject_lambda(vertex, s.b_field, &mut tracks);
        }
        for _ in 0..self.poisson(s.mean_phis) {
            self.inject_phi(vertex, s.b_field, &mut tracks);
        }

        let ref_mult =
            ((100.0 - centrality) * 6.0 + self.gauss() * 10.0).round().max(0.0) as i32;

        let event = Event {
            run_id: 20_000_001,
            event_id: self.next_event_id,
            vertex,
            vz_vpd,
            ref_mult,
            centrality,
            b_field: s.b_field,
            qx: 0.0,
            qy: 0.0,
            psi2: -999.0,
        };
        self.next_event_id += 1;
        (event, tracks)
    }

    // -----------------------------------------------------------------------
    // Signal injection
    // -----------------------------------------------------------------------

    fn inject_lambda(&mut self, vertex: Vec3, b_field: f64, tracks: &mut Vec<Track>) {
        let parent = self.thermal_momentum(0.45);
        let (p_proton, p_pion) =
            self.two_body_decay(parent, LAMBDA_MASS, PROTON_MASS, PION_MASS);

        // decay point from an exponential proper-time draw
        let beta_gamma = parent.norm() / LAMBDA_MASS;
        let length = (beta_gamma * LAMBDA_CTAU * -self.rng.gen::<f64>().ln()).min(50.0);
        let decay_point = vertex + length * parent.normalize();

        tracks.push(self.make_track(p_proton, decay_point, 1, Species::Proton, vertex, b_field));
        tracks.push(self.make_track(p_pion, decay_point, -1, Species::Pion, vertex, b_field));
    }

    fn inject_phi(&mut self, vertex: Vec3, b_field: f64, tracks: &mut Vec<Track>) {
        let parent = self.thermal_momentum(0.4);
        let (p_kp, p_km) = self.two_body_decay(parent, PHI_MASS, KAON_MASS, KAON_MASS);
        tracks.push(self.make_track(p_kp, vertex, 1, Species::Kaon, vertex, b_field));
        tracks.push(self.make_track(p_km, vertex, -1, Species::Kaon, vertex, b_field));
    }

    /// Isotropic two-body decay of a parent with lab momentum `parent`.
    fn two_body_decay(&mut self, parent: Vec3, m: f64, m1: f64, m2: f64) -> (Vec3, Vec3) {
        let p_star = ((m * m - (m1 + m2).powi(2)) * (m * m - (m1 - m2).powi(2))).sqrt()
            / (2.0 * m);
        let cos_theta = self.uniform(-1.0, 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let phi = self.uniform(0.0, std::f64::consts::TAU);
        let q = p_star * Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

        let e1 = (p_star * p_star + m1 * m1).sqrt();
        let e2 = (p_star * p_star + m2 * m2).sqrt();
        (
            boost(q, e1, parent, m),
            boost(-q, e2, parent, m),
        )
    }

    // -----------------------------------------------------------------------
    // Track assembly
    // -----------------------------------------------------------------------

    fn make_track(
        &mut self,
        momentum: Vec3,
        origin: Vec3,
        charge: i32,
        species: Species,
        primary_vertex: Vec3,
        b_field: f64,
    ) -> Track {
        // DCA measured the same way the reconstruction will measure it
        let helix = Helix::new(momentum, origin, b_field, charge);
        let dca = helix.distance_to_point(&primary_vertex);

        let own = 0.8 * self.gauss();
        let other = || 5.0;
        let (nsigma_pion, nsigma_kaon, nsigma_proton) = match species {
            Species::Pion => (own, other(), other()),
            Species::Kaon => (other(), own, other()),
            Species::Proton => (other(), other(), own),
        };

        let (beta, mass2, tof_match) = if self.rng.gen::<f64>() < self.scenario.tof_match_fraction
        {
            let m = species.mass();
            let p2 = momentum.norm_squared();
            let beta_true = (p2 / (p2 + m * m)).sqrt();
            (
                beta_true + 0.01 * self.gauss(),
                m * m + 0.02 * self.gauss(),
                true,
            )
        } else {
            (TOF_INVALID, TOF_INVALID, false)
        };

        let n_hits_max = self.rng.gen_range(40i16..=45);
        let n_hits_fit = self.rng.gen_range(25i16..=n_hits_max);

        Track {
            origin,
            momentum,
            charge,
            n_hits_fit,
            n_hits_max,
            n_hits_dedx: n_hits_fit - 5,
            dca,
            chi2: 0.8 + self.rng.gen::<f64>() * 1.5,
            nsigma_pion,
            nsigma_kaon,
            nsigma_proton,
            beta,
            mass2,
            tof_match,
        }
    }

    /// Momentum with an exponential pt spectrum of slope `t` (GeV/c), flat
    /// pseudorapidity in ±1 and flat azimuth.
    fn thermal_momentum(&mut self, t: f64) -> Vec3 {
        let pt = (0.15 + t * -self.rng.gen::<f64>().ln()).min(5.0);
        let eta = self.uniform(-1.0, 1.0);
        let phi = self.uniform(-std::f64::consts::PI, std::f64::consts::PI);
        Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh())
    }

    // -----------------------------------------------------------------------
    // Sampling primitives
    // -----------------------------------------------------------------------

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.rng.gen::<f64>() * (hi - lo)
    }

    /// Standard normal via Box-Muller.
    fn gauss(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(1e-12);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Poisson draw: product-of-uniforms inversion for small means, normal
    /// approximation above that.
    fn poisson(&mut self, lambda: f64) -> usize {
        if lambda <= 0.0 {
            return 0;
        }
        if lambda > 30.0 {
            return (lambda + lambda.sqrt() * self.gauss()).round().max(0.0) as usize;
        }
        let threshold = (-lambda).exp();
        let mut n = 0usize;
        let mut prod = self.rng.gen::<f64>();
        while prod > threshold && n < 200 {
            prod *= self.rng.gen::<f64>();
            n += 1;
        }
        n
    }
}

/// Boost a rest-frame momentum `q` (energy `e`) into the lab frame of a
/// parent with lab momentum `parent` and mass `m`.
fn boost(q: Vec3, e: f64, parent: Vec3, m: f64) -> Vec3 {
    let p_mag = parent.norm();
    if p_mag < 1e-12 {
        return q;
    }
    let e_parent = (p_mag * p_mag + m * m).sqrt();
    let gamma = e_parent / m;
    let n = parent / p_mag;
    let q_par = q.dot(&n);
    let beta = p_mag / e_parent;
    q + ((gamma - 1.0) * q_par + gamma * beta * e) * n
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};
    use approx::assert_abs_diff_eq;
    use reco_core::builder::invariant_mass;

    fn generator(kind: ScenarioKind) -> EventGenerator {
        EventGenerator::new(Scenario::build(kind, 42))
    }

    #[test]
    fn same_seed_reproduces_events() {
        let (ev_a, tr_a) = generator(ScenarioKind::MinBias).next_event();
        let (ev_b, tr_b) = generator(ScenarioKind::MinBias).next_event();
        assert_eq!(ev_a.vertex, ev_b.vertex);
        assert_eq!(tr_a.len(), tr_b.len());
        assert_eq!(tr_a[0].momentum, tr_b[0].momentum);
    }

    #[test]
    fn injected_lambda_daughters_carry_the_parent_mass() {
        let mut gen = generator(ScenarioKind::LambdaEnriched);
        // daughters of an injected Lambda share a displaced origin
        let mut found = 0;
        for _ in 0..20 {
            let (ev, tracks) = gen.next_event();
            for p in tracks.iter().filter(|t| t.charge > 0 && t.nsigma_proton.abs() < 3.0) {
                for pi in tracks.iter().filter(|t| t.charge < 0 && t.nsigma_pion.abs() < 3.0) {
                    if (p.origin - pi.origin).norm() > 1e-9 {
                        continue;
                    }
                    if (p.origin - ev.vertex).norm() < 0.3 {
                        continue; // a background coincidence, not a decay
                    }
                    let m = invariant_mass(&p.momentum, &pi.momentum, PROTON_MASS, PION_MASS);
                    assert_abs_diff_eq!(m, LAMBDA_MASS, epsilon = 1e-6);
                    found += 1;
                }
            }
        }
        assert!(found > 0, "no injected Lambda found in 20 events");
    }

    #[test]
    fn injected_phi_daughters_carry_the_parent_mass() {
        let mut gen = generator(ScenarioKind::PhiEnriched);
        let mut found = 0;
        for _ in 0..20 {
            let (ev, tracks) = gen.next_event();
            for kp in tracks.iter().filter(|t| t.charge > 0 && t.nsigma_kaon.abs() < 3.0) {
                for km in tracks.iter().filter(|t| t.charge < 0 && t.nsigma_kaon.abs() < 3.0) {
                    if kp.origin != ev.vertex || km.origin != ev.vertex {
                        continue;
                    }
                    let m = invariant_mass(&kp.momentum, &km.momentum, KAON_MASS, KAON_MASS);
                    if (m - PHI_MASS).abs() < 1e-6 {
                        found += 1;
                    }
                }
            }
        }
        assert!(found > 0, "no injected Phi found in 20 events");
    }

    #[test]
    fn background_only_has_no_common_displaced_origins() {
        let mut gen = generator(ScenarioKind::BackgroundOnly);
        let (_, tracks) = gen.next_event();
        assert!(!tracks.is_empty());
        for (i, a) in tracks.iter().enumerate() {
            for b in tracks.iter().skip(i + 1) {
                assert!((a.origin - b.origin).norm() > 1e-12);
            }
        }
    }

    #[test]
    fn track_dca_matches_helix_geometry() {
        let mut gen = generator(ScenarioKind::MinBias);
        let (ev, tracks) = gen.next_event();
        let t = &tracks[0];
        let helix = Helix::new(t.momentum, t.origin, ev.b_field, t.charge);
        assert_abs_diff_eq!(t.dca, helix.distance_to_point(&ev.vertex), epsilon = 1e-9);
    }
}
