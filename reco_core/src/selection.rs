//! Selection cuts and their stateless predicates.
//!
//! Every cut group is a plain struct with public fields, serde-deserializable
//! with per-field defaults so a partial config file overrides only what it
//! names. Comparison conventions follow the detector analysis they encode:
//! a quantity strictly beyond the cut rejects, boundary equality passes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::mixing::MixingConfig;
use crate::types::{Event, Track};

// ---------------------------------------------------------------------------
// Event-level cuts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCuts {
    /// |vz| acceptance (cm)
    pub max_vz: f64,
    /// Transverse vertex radius acceptance (cm)
    pub max_vr: f64,
    pub min_ref_mult: i32,
    pub max_ref_mult: i32,
    /// Pileup rejection: |vz - vzVpd| window (cm)
    pub max_vz_diff: f64,
    /// vzVpd values beyond this are treated as "no VPD measurement" (cm)
    pub max_abs_vz_vpd: f64,
    /// Track-multiplicity guard, 0 disables
    pub max_n_tracks: usize,
}

impl Default for EventCuts {
    fn default() -> Self {
        Self {
            max_vz: 100.0,
            max_vr: 2.0,
            min_ref_mult: 0,
            max_ref_mult: 1000,
            max_vz_diff: 3.0,
            max_abs_vz_vpd: 200.0,
            max_n_tracks: 0,
        }
    }
}

/// Event acceptance. The VPD comparison only applies when the VPD vertex is
/// itself valid.
pub fn pass_event_cuts(event: &Event, n_tracks: usize, cuts: &EventCuts) -> bool {
    if event.vertex.z.abs() > cuts.max_vz {
        return false;
    }
    if event.vr() > cuts.max_vr {
        return false;
    }
    if event.ref_mult < cuts.min_ref_mult || event.ref_mult > cuts.max_ref_mult {
        return false;
    }
    if event.vz_vpd.abs() < cuts.max_abs_vz_vpd
        && (event.vertex.z - event.vz_vpd).abs() > cuts.max_vz_diff
    {
        return false;
    }
    if cuts.max_n_tracks > 0 && n_tracks > cuts.max_n_tracks {
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Track quality cuts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackCuts {
    pub min_nhits_fit: i16,
    /// nHitsFit / nHitsMax
    pub min_nhits_ratio: f64,
    pub min_nhits_dedx: i16,
    /// DCA to the primary vertex (cm)
    pub max_dca: f64,
    pub max_eta: f64,
    pub min_pt: f64,
    pub max_pt: f64,
    pub max_chi2: f64,
}

impl Default for TrackCuts {
    fn default() -> Self {
        Self {
            min_nhits_fit: 15,
            min_nhits_ratio: 0.52,
            min_nhits_dedx: 10,
            max_dca: 3.0,
            max_eta: 1.0,
            min_pt: 0.2,
            max_pt: 10.0,
            max_chi2: 3.0,
        }
    }
}

pub fn pass_track_cuts(track: &Track, cuts: &TrackCuts) -> bool {
    if track.n_hits_fit < cuts.min_nhits_fit {
        return false;
    }
    if track.hits_ratio() < cuts.min_nhits_ratio {
        return false;
    }
    if track.n_hits_dedx < cuts.min_nhits_dedx {
        return false;
    }
    if track.dca > cuts.max_dca {
        return false;
    }
    if track.eta().abs() > cuts.max_eta {
        return false;
    }
    let pt = track.pt();
    if pt < cuts.min_pt || pt > cuts.max_pt {
        return false;
    }
    if track.chi2 > cuts.max_chi2 {
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// PID cuts
// ---------------------------------------------------------------------------

/// Per-species dE/dx nSigma limits and TOF mass² windows, (GeV/c²)².
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PidCuts {
    pub nsigma_pion: f64,
    pub nsigma_kaon: f64,
    pub nsigma_proton: f64,
    pub min_mass2_pion: f64,
    pub max_mass2_pion: f64,
    pub min_mass2_kaon: f64,
    pub max_mass2_kaon: f64,
    pub min_mass2_proton: f64,
    pub max_mass2_proton: f64,
    /// Demand a TOF match for every identified track
    pub require_tof: bool,
}

impl Default for PidCuts {
    fn default() -> Self {
        Self {
            nsigma_pion: 2.0,
            nsigma_kaon: 2.0,
            nsigma_proton: 2.0,
            min_mass2_pion: -0.06,
            max_mass2_pion: 0.1,
            min_mass2_kaon: 0.15,
            max_mass2_kaon: 0.35,
            min_mass2_proton: 0.75,
            max_mass2_proton: 1.1,
            require_tof: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Lambda channel cuts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LambdaCuts {
    pub nsigma_proton: f64,
    pub nsigma_pion: f64,
    /// Daughters of a displaced decay must NOT point at the PV (cm)
    pub min_dca_proton: f64,
    pub min_dca_pion: f64,
    /// Mutual DCA of the daughter pair (cm)
    pub max_daughter_dca: f64,
    /// DCA of the reconstructed V0 to the PV (cm)
    pub max_dca_v0: f64,
    pub min_cos_pointing: f64,
    /// DCA solutions with |s| beyond this are unphysical (cm)
    pub max_path_length: f64,
}

impl Default for LambdaCuts {
    fn default() -> Self {
        Self {
            nsigma_proton: 2.0,
            nsigma_pion: 2.0,
            min_dca_proton: 0.5,
            min_dca_pion: 0.8,
            max_daughter_dca: 1.0,
            max_dca_v0: 1.0,
            min_cos_pointing: 0.995,
            max_path_length: 100.0,
        }
    }
}

/// Proton leg of the Lambda. Secondary daughters are exempt from the primary
/// track-quality cuts; the displaced-vertex DCA requirement replaces them.
pub fn pass_proton_cuts(track: &Track, cuts: &LambdaCuts) -> bool {
    track.charge > 0
        && track.nsigma_proton.abs() <= cuts.nsigma_proton
        && track.dca >= cuts.min_dca_proton
}

/// Pion leg of the Lambda.
pub fn pass_pion_cuts(track: &Track, cuts: &LambdaCuts) -> bool {
    track.charge < 0
        && track.nsigma_pion.abs() <= cuts.nsigma_pion
        && track.dca >= cuts.min_dca_pion
}

/// Topological acceptance of a built V0 candidate.
pub fn pass_lambda_topology(dca_to_pv: f64, cos_pointing: f64, cuts: &LambdaCuts) -> bool {
    dca_to_pv <= cuts.max_dca_v0 && cos_pointing >= cuts.min_cos_pointing
}

// ---------------------------------------------------------------------------
// Phi channel cuts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PhiCuts {
    pub nsigma_kaon: f64,
    pub min_mass2_kaon: f64,
    pub max_mass2_kaon: f64,
    /// Prompt daughters: DCA to the PV stays small (cm)
    pub max_dca_kaon: f64,
    /// Mutual DCA of the kaon pair (cm); wide open by default
    pub max_dca_kk: f64,
    /// Reporting window around the Phi mass (GeV/c²)
    pub min_inv_mass: f64,
    pub max_inv_mass: f64,
    pub min_opening_angle: f64,
    pub max_opening_angle: f64,
    pub min_pair_rapidity: f64,
    pub max_pair_rapidity: f64,
    /// Event-plane Q-vector track window
    pub min_pt_ep: f64,
    pub max_pt_ep: f64,
    pub max_eta_ep: f64,
    pub max_path_length: f64,
    /// Require a TOF match for kaon identification
    pub require_tof: bool,
}

impl Default for PhiCuts {
    fn default() -> Self {
        Self {
            nsigma_kaon: 2.0,
            min_mass2_kaon: 0.15,
            max_mass2_kaon: 0.35,
            max_dca_kaon: 2.0,
            max_dca_kk: 999.0,
            min_inv_mass: 0.99,
            max_inv_mass: 1.05,
            min_opening_angle: 0.0,
            max_opening_angle: 0.5,
            min_pair_rapidity: -0.8,
            max_pair_rapidity: 0.8,
            min_pt_ep: 0.2,
            max_pt_ep: 2.0,
            max_eta_ep: 1.0,
            max_path_length: 100.0,
            require_tof: false,
        }
    }
}

/// Kaon identification: full primary-track quality, prompt DCA, dE/dx nSigma,
/// and a TOF mass² window whenever a match exists.
pub fn pass_kaon_cuts(track: &Track, track_cuts: &TrackCuts, cuts: &PhiCuts) -> bool {
    if !pass_track_cuts(track, track_cuts) {
        return false;
    }
    if track.dca > cuts.max_dca_kaon {
        return false;
    }
    if track.nsigma_kaon.abs() > cuts.nsigma_kaon {
        return false;
    }
    if cuts.require_tof && !track.tof_match {
        return false;
    }
    if track.tof_match
        && (track.mass2 < cuts.min_mass2_kaon || track.mass2 > cuts.max_mass2_kaon)
    {
        return false;
    }
    true
}

/// Kinematic acceptance of a kaon pair. Inclusive windows.
pub fn pass_phi_pair_cuts(opening_angle: f64, rapidity: f64, cuts: &PhiCuts) -> bool {
    opening_angle >= cuts.min_opening_angle
        && opening_angle <= cuts.max_opening_angle
        && rapidity >= cuts.min_pair_rapidity
        && rapidity <= cuts.max_pair_rapidity
}

/// Invariant-mass reporting window; separates "in peak" fills from the raw
/// spectrum, never gates candidate counting.
pub fn in_phi_mass_window(mass: f64, cuts: &PhiCuts) -> bool {
    mass >= cuts.min_inv_mass && mass <= cuts.max_inv_mass
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// The full analysis configuration, passed explicitly to the pipeline at
/// construction. No global state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub event: EventCuts,
    pub track: TrackCuts,
    pub pid: PidCuts,
    pub lambda: LambdaCuts,
    pub phi: PhiCuts,
    pub mixing: MixingConfig,
}

impl AnalysisConfig {
    /// Read a JSON config file. Any missing field falls back to its default;
    /// an unreadable or unparseable file falls back entirely, with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "config parse failed, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "config not readable, using defaults");
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Vec3, TOF_INVALID};

    fn good_track() -> Track {
        Track {
            origin: Vec3::zeros(),
            momentum: Vec3::new(0.5, 0.2, 0.1),
            charge: 1,
            n_hits_fit: 30,
            n_hits_max: 45,
            n_hits_dedx: 20,
            dca: 1.0,
            chi2: 1.5,
            nsigma_pion: 0.0,
            nsigma_kaon: 0.0,
            nsigma_proton: 0.0,
            beta: TOF_INVALID,
            mass2: TOF_INVALID,
            tof_match: false,
        }
    }

    fn good_event() -> Event {
        Event {
            run_id: 1,
            event_id: 1,
            vertex: Vec3::new(0.1, 0.1, 10.0),
            vz_vpd: 11.0,
            ref_mult: 200,
            centrality: 30.0,
            b_field: 4.98,
            qx: 0.0,
            qy: 0.0,
            psi2: -999.0,
        }
    }

    #[test]
    fn event_boundary_equality_passes() {
        let cuts = EventCuts::default();
        let mut ev = good_event();
        assert!(pass_event_cuts(&ev, 100, &cuts));
        ev.vertex.z = 100.0;
        ev.vz_vpd = 100.0;
        assert!(pass_event_cuts(&ev, 100, &cuts));
        ev.vertex.z = 100.0001;
        assert!(!pass_event_cuts(&ev, 100, &cuts));
    }

    #[test]
    fn vpd_comparison_skipped_when_vpd_invalid() {
        let cuts = EventCuts::default();
        let mut ev = good_event();
        ev.vz_vpd = -999.0; // no VPD measurement
        assert!(pass_event_cuts(&ev, 100, &cuts));
        ev.vz_vpd = 50.0; // valid but far from vz
        assert!(!pass_event_cuts(&ev, 100, &cuts));
    }

    #[test]
    fn max_n_tracks_zero_means_unlimited() {
        let mut cuts = EventCuts::default();
        let ev = good_event();
        assert!(pass_event_cuts(&ev, 100_000, &cuts));
        cuts.max_n_tracks = 500;
        assert!(!pass_event_cuts(&ev, 100_000, &cuts));
        assert!(pass_event_cuts(&ev, 500, &cuts));
    }

    #[test]
    fn track_cut_boundaries() {
        let cuts = TrackCuts::default();
        let mut t = good_track();
        assert!(pass_track_cuts(&t, &cuts));
        t.n_hits_fit = 15;
        assert!(pass_track_cuts(&t, &cuts));
        t.n_hits_fit = 14;
        assert!(!pass_track_cuts(&t, &cuts));
        t.n_hits_fit = 30;
        t.dca = 3.0;
        assert!(pass_track_cuts(&t, &cuts));
        t.dca = 3.1;
        assert!(!pass_track_cuts(&t, &cuts));
    }

    #[test]
    fn lambda_legs_need_displaced_dca() {
        let cuts = LambdaCuts::default();
        let mut p = good_track();
        p.dca = 0.6;
        assert!(pass_proton_cuts(&p, &cuts));
        p.dca = 0.4; // too prompt for a decay daughter
        assert!(!pass_proton_cuts(&p, &cuts));

        let mut pi = good_track();
        pi.charge = -1;
        pi.dca = 0.8;
        assert!(pass_pion_cuts(&pi, &cuts));
        pi.charge = 1;
        assert!(!pass_pion_cuts(&pi, &cuts));
    }

    #[test]
    fn kaon_tof_window_applies_only_when_matched() {
        let track_cuts = TrackCuts::default();
        let cuts = PhiCuts::default();
        let mut k = good_track();
        assert!(pass_kaon_cuts(&k, &track_cuts, &cuts));
        k.tof_match = true;
        k.mass2 = 0.24; // kaon mass squared
        assert!(pass_kaon_cuts(&k, &track_cuts, &cuts));
        k.mass2 = 0.9; // proton-like
        assert!(!pass_kaon_cuts(&k, &track_cuts, &cuts));

        let mut strict = cuts.clone();
        strict.require_tof = true;
        k.tof_match = false;
        assert!(!pass_kaon_cuts(&k, &track_cuts, &strict));
    }

    #[test]
    fn phi_pair_windows_are_inclusive() {
        let cuts = PhiCuts::default();
        assert!(pass_phi_pair_cuts(0.5, 0.8, &cuts));
        assert!(pass_phi_pair_cuts(0.0, -0.8, &cuts));
        assert!(!pass_phi_pair_cuts(0.51, 0.0, &cuts));
        assert!(!pass_phi_pair_cuts(0.2, 0.81, &cuts));
        assert!(in_phi_mass_window(1.019, &cuts));
        assert!(!in_phi_mass_window(1.06, &cuts));
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let text = r#"{ "event": { "max_vz": 30.0 }, "phi": { "nsigma_kaon": 3.0 } }"#;
        let cfg: AnalysisConfig = serde_json::from_str(text).unwrap();
        assert_eq!(cfg.event.max_vz, 30.0);
        assert_eq!(cfg.event.max_vr, 2.0);
        assert_eq!(cfg.phi.nsigma_kaon, 3.0);
        assert_eq!(cfg.lambda.min_cos_pointing, 0.995);
    }

    #[test]
    fn unreadable_config_falls_back_to_defaults() {
        let cfg = AnalysisConfig::load_or_default(Path::new("/nonexistent/cuts.json"));
        assert_eq!(cfg.track.min_nhits_fit, 15);
    }
}
