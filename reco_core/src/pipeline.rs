//! Single-threaded event-at-a-time reconstruction pipeline.
//!
//! Lifecycle: construct with an [`AnalysisConfig`] and a sink, feed events
//! through [`Pipeline::process_event`], then [`Pipeline::finalize`] for the
//! run totals. Event N is fully processed before event N+1 arrives; the only
//! state carried across events is the mixing pool and the counters.

use serde::Serialize;
use tracing::{debug, warn};

use crate::accumulator::Accumulator;
use crate::builder::{
    build_candidates, invariant_mass, Candidate, PairHypothesis, Topology,
};
use crate::mixing::{EventSnapshot, MixingPool, TrackSummary};
use crate::selection::{
    in_phi_mass_window, pass_event_cuts, pass_kaon_cuts, pass_lambda_topology,
    pass_phi_pair_cuts, pass_pion_cuts, pass_proton_cuts, pass_track_cuts,
    AnalysisConfig,
};
use crate::types::{Event, Track, KAON_MASS, PION_MASS, PROTON_MASS};

/// Everything reconstructed from one event.
#[derive(Debug, Default)]
pub struct CandidateBatch {
    /// Event survived the event-level cuts
    pub accepted: bool,
    pub lambdas: Vec<Candidate>,
    pub phis: Vec<Candidate>,
    /// Second-order event-plane angle in [0, π), or -999 when unmeasured
    pub psi2: f64,
    pub mixed_lambda_pairs: usize,
    pub mixed_phi_pairs: usize,
}

/// Run totals returned by [`Pipeline::finalize`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub events_processed: u64,
    pub events_accepted: u64,
    pub lambda_candidates: u64,
    pub phi_candidates: u64,
    pub mixed_lambda_pairs: u64,
    pub mixed_phi_pairs: u64,
}

pub struct Pipeline<S: Accumulator> {
    config: AnalysisConfig,
    sink: S,
    pool: MixingPool,
    report: RunReport,
}

impl<S: Accumulator> Pipeline<S> {
    pub fn new(config: AnalysisConfig, sink: S) -> Self {
        let pool = MixingPool::new(config.mixing.clone());
        Self {
            config,
            sink,
            pool,
            report: RunReport::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Reconstruct one event. Malformed input is skipped with a warning.
    pub fn process_event(&mut self, event: &Event, tracks: &[Track]) -> CandidateBatch {
        let mut batch = CandidateBatch {
            psi2: -999.0,
            ..Default::default()
        };
        self.report.events_processed += 1;
        self.sink.fill("hN", 0.0);

        if !event.is_finite() {
            warn!(
                run = event.run_id,
                event = event.event_id,
                "non-finite event header, skipping"
            );
            return batch;
        }

        // pre-cut event QA
        self.sink.fill("hVz", event.vertex.z);
        self.sink.fill2("hVxVy", event.vertex.x, event.vertex.y);
        self.sink.fill("hRefMult", f64::from(event.ref_mult));
        self.sink
            .fill2("hRefMultVsVz", event.vertex.z, f64::from(event.ref_mult));
        if event.vz_vpd.abs() < self.config.event.max_abs_vz_vpd {
            self.sink.fill("hVzDiff", event.vertex.z - event.vz_vpd);
        }

        if !pass_event_cuts(event, tracks.len(), &self.config.event) {
            return batch;
        }
        batch.accepted = true;
        self.report.events_accepted += 1;
        self.sink.fill("hN", 1.0);
        if event.centrality >= 0.0 {
            self.sink.fill("hCentrality", event.centrality);
        }

        // track loop: QA, Q-vector, species lists
        let mut protons: Vec<&Track> = Vec::new();
        let mut pions: Vec<&Track> = Vec::new();
        let mut kaons_pos: Vec<&Track> = Vec::new();
        let mut kaons_neg: Vec<&Track> = Vec::new();
        let mut qx = 0.0;
        let mut qy = 0.0;
        let mut n_ep_tracks = 0usize;
        let mut tof_mult = 0usize;

        for track in tracks {
            if !track.is_finite() {
                debug!(event = event.event_id, "non-finite track skipped");
                continue;
            }
            if track.tof_match {
                tof_mult += 1;
            }
            let pt = track.pt();
            let eta = track.eta();
            if pass_track_cuts(track, &self.config.track) {
                self.sink.fill("hPt", pt);
                self.sink.fill("hEta", eta);
                self.sink.fill("hPhi", track.phi());
                self.sink.fill("hNHitsFit", f64::from(track.n_hits_fit));
                self.sink.fill("hNHitsRatio", track.hits_ratio());
                self.sink.fill("hDca", track.dca);
                self.sink.fill("hChi2", track.chi2);
                self.sink.fill("hCharge", f64::from(track.charge));
                let p = track.p();
                self.sink.fill2("hNSigmaPionVsP", p, track.nsigma_pion);
                self.sink.fill2("hNSigmaKaonVsP", p, track.nsigma_kaon);
                self.sink.fill2("hNSigmaProtonVsP", p, track.nsigma_proton);

                let phi_cuts = &self.config.phi;
                if pt >= phi_cuts.min_pt_ep
                    && pt <= phi_cuts.max_pt_ep
                    && eta.abs() <= phi_cuts.max_eta_ep
                {
                    let phi = track.phi();
                    qx += pt * (2.0 * phi).cos();
                    qy += pt * (2.0 * phi).sin();
                    n_ep_tracks += 1;
                }
            }

            // decay daughters bypass the primary-track quality cuts
            if pass_proton_cuts(track, &self.config.lambda) {
                protons.push(track);
            }
            if pass_pion_cuts(track, &self.config.lambda) {
                pions.push(track);
            }
            if pass_kaon_cuts(track, &self.config.track, &self.config.phi) {
                if track.charge > 0 {
                    kaons_pos.push(track);
                } else {
                    kaons_neg.push(track);
                }
            }
        }
        self.sink.fill("hTofMult", tof_mult as f64);

        // event plane: upstream value wins, otherwise our own Q-vector
        batch.psi2 = if event.psi2 >= 0.0 {
            event.psi2
        } else if n_ep_tracks > 0 {
            let mut psi = 0.5 * qy.atan2(qx);
            if psi < 0.0 {
                psi += std::f64::consts::PI;
            }
            psi
        } else {
            -999.0
        };
        if batch.psi2 >= 0.0 {
            self.sink.fill("hPsi2", batch.psi2);
        }

        self.reconstruct_lambdas(event, &protons, &pions, &mut batch);
        self.reconstruct_phis(event, &kaons_pos, &kaons_neg, &mut batch);
        self.mix_event(event, &protons, &pions, &kaons_pos, &kaons_neg, &mut batch);

        batch
    }

    fn reconstruct_lambdas(
        &mut self,
        event: &Event,
        protons: &[&Track],
        pions: &[&Track],
        batch: &mut CandidateBatch,
    ) {
        let hyp = PairHypothesis::lambda(&self.config.lambda);
        for cand in build_candidates(&hyp, protons, pions, event) {
            let Topology::V0 {
                decay_length,
                cos_pointing,
                dca_to_pv,
                ..
            } = cand.topology
            else {
                continue;
            };
            if !pass_lambda_topology(dca_to_pv, cos_pointing, &self.config.lambda) {
                continue;
            }
            self.sink.fill("hLambdaMass", cand.mass);
            self.sink.fill("hLambdaPt", cand.pt());
            self.sink.fill("hLambdaEta", cand.eta());
            self.sink.fill("hLambdaPhi", cand.phi());
            self.sink.fill("hLambdaDcaDaughters", cand.dca_daughters);
            self.sink.fill("hLambdaDcaV0", dca_to_pv);
            self.sink.fill("hLambdaCosPointing", cos_pointing);
            self.sink.fill("hLambdaDecayLength", decay_length);
            self.sink.fill2("hLambdaMassVsPt", cand.pt(), cand.mass);
            self.sink.fill("hN", 2.0);
            self.report.lambda_candidates += 1;
            batch.lambdas.push(cand);
        }
    }

    fn reconstruct_phis(
        &mut self,
        event: &Event,
        kaons_pos: &[&Track],
        kaons_neg: &[&Track],
        batch: &mut CandidateBatch,
    ) {
        self.sink
            .fill("hKaonMult", (kaons_pos.len() + kaons_neg.len()) as f64);

        // all-combinations spectrum straight from the primary momenta
        for kp in kaons_pos {
            for km in kaons_neg {
                let m = invariant_mass(&kp.momentum, &km.momentum, KAON_MASS, KAON_MASS);
                self.sink.fill("hPhiMassAll", m);
            }
        }

        let hyp = PairHypothesis::phi(&self.config.phi);
        for cand in build_candidates(&hyp, kaons_pos, kaons_neg, event) {
            let Topology::Resonance {
                opening_angle,
                rapidity,
            } = cand.topology
            else {
                continue;
            };
            self.sink.fill("hPhiMass", cand.mass);
            if !pass_phi_pair_cuts(opening_angle, rapidity, &self.config.phi) {
                continue;
            }
            self.sink.fill("hPhiMassCut", cand.mass);
            self.sink.fill("hPhiPt", cand.pt());
            self.sink.fill("hPhiOpeningAngle", opening_angle);
            self.sink.fill("hPhiRapidity", rapidity);
            self.sink.fill2("hPhiMassVsPt", cand.pt(), cand.mass);
            if in_phi_mass_window(cand.mass, &self.config.phi) {
                self.sink.fill("hN", 3.0);
            }
            self.report.phi_candidates += 1;
            batch.phis.push(cand);
        }
    }

    /// Draw a mixing partner from the event's bin, then insert the event.
    /// The ordering guarantees an event never pairs with itself.
    fn mix_event(
        &mut self,
        event: &Event,
        protons: &[&Track],
        pions: &[&Track],
        kaons_pos: &[&Track],
        kaons_neg: &[&Track],
        batch: &mut CandidateBatch,
    ) {
        let summarize = |list: &[&Track]| -> Vec<TrackSummary> {
            list.iter().map(|t| (t.pt(), t.eta(), t.phi())).collect()
        };
        let snapshot = EventSnapshot {
            event_id: event.event_id,
            protons: summarize(protons),
            pions: summarize(pions),
            kaons_pos: summarize(kaons_pos),
            kaons_neg: summarize(kaons_neg),
        };

        let bin = self
            .pool
            .bin_index(event.vertex.z, event.centrality, batch.psi2);

        if let Some(partner) = self.pool.draw_partner(bin) {
            let lambda_masses =
                self.pool
                    .mixed_masses(&snapshot.protons, &partner.pions, PROTON_MASS, PION_MASS);
            for m in &lambda_masses {
                self.sink.fill("hLambdaMassMixed", *m);
            }
            batch.mixed_lambda_pairs = lambda_masses.len();
            self.report.mixed_lambda_pairs += lambda_masses.len() as u64;

            let phi_masses = self.pool.mixed_masses(
                &snapshot.kaons_pos,
                &partner.kaons_neg,
                KAON_MASS,
                KAON_MASS,
            );
            for m in &phi_masses {
                self.sink.fill("hPhiMassMixed", *m);
            }
            batch.mixed_phi_pairs = phi_masses.len();
            self.report.mixed_phi_pairs += phi_masses.len() as u64;
        }

        self.pool.insert(bin, snapshot);
    }

    /// Run totals; drains the mixing pool.
    pub fn finalize(&mut self) -> RunReport {
        self.pool.clear();
        self.report.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::CountingSink;
    use crate::types::{Vec3, TOF_INVALID};

    fn track(px: f64, py: f64, pz: f64, origin: Vec3, charge: i32) -> Track {
        Track {
            origin,
            momentum: Vec3::new(px, py, pz),
            charge,
            n_hits_fit: 35,
            n_hits_max: 45,
            n_hits_dedx: 25,
            dca: 1.0,
            chi2: 1.2,
            nsigma_pion: 9.0,
            nsigma_kaon: 9.0,
            nsigma_proton: 9.0,
            beta: TOF_INVALID,
            mass2: TOF_INVALID,
            tof_match: false,
        }
    }

    fn event() -> Event {
        Event {
            run_id: 19001,
            event_id: 1,
            vertex: Vec3::zeros(),
            vz_vpd: 0.0,
            ref_mult: 200,
            centrality: 30.0,
            b_field: 4.98,
            qx: 0.0,
            qy: 0.0,
            psi2: -999.0,
        }
    }

    /// Proton and pion emitted from a common displaced vertex.
    fn lambda_daughters() -> (Track, Track) {
        let decay = Vec3::new(1.0, 0.0, 0.0);
        let mut proton = track(0.6, 0.1, 0.05, decay, 1);
        proton.nsigma_proton = 0.5;
        let mut pion = track(0.3, -0.1, -0.02, decay, -1);
        pion.nsigma_pion = -0.5;
        (proton, pion)
    }

    fn pipeline() -> Pipeline<CountingSink> {
        Pipeline::new(AnalysisConfig::default(), CountingSink::new())
    }

    #[test]
    fn lambda_is_reconstructed_end_to_end() {
        let mut pipe = pipeline();
        let (proton, pion) = lambda_daughters();
        let batch = pipe.process_event(&event(), &[proton, pion]);
        assert!(batch.accepted);
        assert_eq!(batch.lambdas.len(), 1);
        assert_eq!(pipe.sink().count("hLambdaMass"), 1);
        assert_eq!(pipe.sink().count("hLambdaCosPointing"), 1);
        let report = pipe.finalize();
        assert_eq!(report.lambda_candidates, 1);
        assert_eq!(report.events_accepted, 1);
    }

    #[test]
    fn phi_is_reconstructed_end_to_end() {
        let mut pipe = pipeline();
        // nearly collinear kaon pair: small opening angle, mass near the
        // Phi peak (~1.012 GeV for this geometry)
        let mut kp = track(1.0, 0.1, 0.05, Vec3::zeros(), 1);
        kp.nsigma_kaon = 0.3;
        kp.dca = 0.5;
        let mut km = track(1.0, -0.1, -0.05, Vec3::zeros(), -1);
        km.nsigma_kaon = -0.3;
        km.dca = 0.5;
        let batch = pipe.process_event(&event(), &[kp, km]);
        assert_eq!(batch.phis.len(), 1);
        assert_eq!(pipe.sink().count("hPhiMass"), 1);
        assert_eq!(pipe.sink().count("hPhiMassCut"), 1);
        assert_eq!(pipe.sink().count("hPhiMassAll"), 1);
        let mass = pipe.sink().values("hPhiMass")[0];
        assert!((0.99..=1.05).contains(&mass), "mass {mass}");
        assert_eq!(pipe.finalize().phi_candidates, 1);
    }

    #[test]
    fn no_kaons_means_no_phi_fills() {
        let mut pipe = pipeline();
        let (proton, pion) = lambda_daughters(); // nsigma_kaon = 9, never kaons
        let batch = pipe.process_event(&event(), &[proton, pion]);
        assert!(batch.phis.is_empty());
        assert_eq!(pipe.sink().count("hPhiMass"), 0);
        assert_eq!(pipe.sink().count("hPhiMassAll"), 0);
        assert_eq!(pipe.sink().values("hKaonMult"), vec![0.0]);
    }

    #[test]
    fn event_cuts_reject_before_track_processing() {
        let mut pipe = pipeline();
        let mut ev = event();
        ev.vertex.z = 150.0;
        let (proton, pion) = lambda_daughters();
        let batch = pipe.process_event(&ev, &[proton, pion]);
        assert!(!batch.accepted);
        assert_eq!(pipe.sink().count("hVz"), 1); // pre-cut QA still fills
        assert_eq!(pipe.sink().count("hPt"), 0);
        assert_eq!(pipe.finalize().events_accepted, 0);
    }

    #[test]
    fn malformed_event_is_skipped_without_panicking() {
        let mut pipe = pipeline();
        let mut ev = event();
        ev.vertex.x = f64::NAN;
        let batch = pipe.process_event(&ev, &[]);
        assert!(!batch.accepted);
        let report = pipe.finalize();
        assert_eq!(report.events_processed, 1);
        assert_eq!(report.events_accepted, 0);
    }

    #[test]
    fn psi2_computed_from_q_vector_and_folded() {
        let mut pipe = pipeline();
        // one mid-rapidity track at phi = 2.0 rad inside the EP window;
        // psi2 = atan2 result folded into [0, pi) equals phi mod pi
        let t = track(0.5 * 2.0f64.cos(), 0.5 * 2.0f64.sin(), 0.0, Vec3::zeros(), 1);
        let batch = pipe.process_event(&event(), &[t]);
        assert!((batch.psi2 - 2.0).abs() < 1e-9, "psi2 {}", batch.psi2);
        assert!(batch.psi2 >= 0.0 && batch.psi2 < std::f64::consts::PI);
        assert_eq!(pipe.sink().count("hPsi2"), 1);
    }

    #[test]
    fn event_never_mixes_with_itself() {
        let mut pipe = pipeline();
        let (proton, pion) = lambda_daughters();
        let tracks = vec![proton, pion];

        let first = pipe.process_event(&event(), &tracks);
        assert_eq!(first.mixed_lambda_pairs, 0, "empty pool, nothing to mix");

        let mut ev2 = event();
        ev2.event_id = 2;
        let second = pipe.process_event(&ev2, &tracks);
        assert_eq!(
            second.mixed_lambda_pairs,
            AnalysisConfig::default().mixing.pairs_per_event
        );
        assert_eq!(
            pipe.sink().count("hLambdaMassMixed"),
            second.mixed_lambda_pairs
        );
    }

    #[test]
    fn finalize_reports_and_clears_pool() {
        let mut pipe = pipeline();
        let (proton, pion) = lambda_daughters();
        pipe.process_event(&event(), &[proton, pion]);
        let report = pipe.finalize();
        assert_eq!(report.events_processed, 1);
        assert!(pipe.pool.is_empty());
    }
}
