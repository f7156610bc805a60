//! Charged-particle helix in a uniform axial magnetic field.
//!
//! # Parametrization
//! A track with transverse momentum pT, charge q in a field B (kilogauss)
//! curves with
//!
//! κ [1/cm] = C·|q·B| / pT,   C = 2.99792458e-4 (GeV/c)·kG⁻¹·cm⁻¹
//!
//! and winds with helicity h = −sign(q·B). Position along the trajectory is a
//! function of the signed path length `s` (cm):
//!
//! x(s) = x₀ + (cos(φ + α) − cos φ)/κ,   α = s·h·κ·cos λ
//! y(s) = y₀ + (sin(φ + α) − sin φ)/κ
//! z(s) = z₀ + s·sin λ
//!
//! where λ is the dip angle and φ the phase (transverse momentum direction
//! minus h·π/2). When κ vanishes (zero field or zero charge) the trajectory
//! degenerates to a straight line and the limiting form is used.
//!
//! The representation is an ephemeral, stateless function of a track: cheap
//! to rebuild on demand, never mutated.

use crate::types::Vec3;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Momentum-to-curvature conversion constant, (GeV/c) per kilogauss per cm.
pub const B_FIELD_CONVERSION: f64 = 2.99792458e-4;

/// Below this curvature the trajectory is treated as a straight line.
const SINGULAR_CURVATURE: f64 = 1e-12;

/// Convergence target for the point-projection Newton iteration (cm).
const POINT_PRECISION: f64 = 1e-8;
const MAX_NEWTON_ITERATIONS: usize = 30;

/// Helical trajectory of one charged particle.
#[derive(Clone, Debug)]
pub struct Helix {
    origin: Vec3,
    /// Transverse momentum magnitude (GeV/c); constant along the helix
    pt: f64,
    /// Longitudinal momentum (GeV/c); constant along the helix
    pz: f64,
    /// Curvature κ ≥ 0 (1/cm); 0 for a straight line
    curvature: f64,
    /// Winding sense h = ±1
    h: f64,
    phase: f64,
    cos_phase: f64,
    sin_phase: f64,
    cos_dip: f64,
    sin_dip: f64,
    singular: bool,
}

impl Helix {
    /// Build the helix of a track with global `momentum` (GeV/c) at `origin`
    /// (cm), for a signed field `b_kilogauss` and charge ±1.
    ///
    /// Always well-defined; a vanishing transverse momentum or field yields
    /// the straight-line limit.
    pub fn new(momentum: Vec3, origin: Vec3, b_kilogauss: f64, charge: i32) -> Self {
        let pt = momentum.x.hypot(momentum.y);
        let q = f64::from(charge);
        let h = if q * b_kilogauss > 0.0 { -1.0 } else { 1.0 };
        let phase = if momentum.x == 0.0 && momentum.y == 0.0 {
            FRAC_PI_4 * (1.0 - 2.0 * h)
        } else {
            momentum.y.atan2(momentum.x) - h * FRAC_PI_2
        };
        let dip = momentum.z.atan2(pt);
        let curvature = if pt > 0.0 {
            (B_FIELD_CONVERSION * q * b_kilogauss).abs() / pt
        } else {
            0.0
        };
        Self {
            origin,
            pt,
            pz: momentum.z,
            curvature,
            h,
            phase,
            cos_phase: phase.cos(),
            sin_phase: phase.sin(),
            cos_dip: dip.cos(),
            sin_dip: dip.sin(),
            singular: curvature < SINGULAR_CURVATURE,
        }
    }

    /// Straight-line limit (zero field or zero curvature)?
    pub fn is_singular(&self) -> bool {
        self.singular
    }

    /// Curvature κ (1/cm), zero for a straight line.
    pub fn curvature(&self) -> f64 {
        self.curvature
    }

    /// Track origin the helix was built from.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Path length of one full turn (cm); infinite for a straight line.
    pub fn period(&self) -> f64 {
        if self.singular {
            f64::INFINITY
        } else {
            (2.0 * PI / (self.curvature * self.cos_dip)).abs()
        }
    }

    /// Center of the transverse-plane circle. Meaningless for a line.
    pub fn center(&self) -> (f64, f64) {
        (
            self.origin.x - self.cos_phase / self.curvature,
            self.origin.y - self.sin_phase / self.curvature,
        )
    }

    /// Unit direction of a straight-line helix (constant along the line).
    pub fn line_direction(&self) -> Vec3 {
        Vec3::new(
            -self.cos_dip * self.sin_phase,
            self.cos_dip * self.cos_phase,
            self.sin_dip,
        )
    }

    /// Position at signed path length `s` (cm). Defined for all finite `s`.
    pub fn at(&self, s: f64) -> Vec3 {
        if self.singular {
            return self.origin + s * self.line_direction();
        }
        let alpha = s * self.h * self.curvature * self.cos_dip;
        Vec3::new(
            self.origin.x + ((self.phase + alpha).cos() - self.cos_phase) / self.curvature,
            self.origin.y + ((self.phase + alpha).sin() - self.sin_phase) / self.curvature,
            self.origin.z + s * self.sin_dip,
        )
    }

    /// Momentum vector at signed path length `s` (GeV/c). The transverse and
    /// longitudinal magnitudes are constants of the motion; only the
    /// transverse direction rotates.
    pub fn momentum_at(&self, s: f64) -> Vec3 {
        let alpha = s * self.h * self.curvature * self.cos_dip;
        let psi = self.phase + alpha + self.h * FRAC_PI_2;
        Vec3::new(self.pt * psi.cos(), self.pt * psi.sin(), self.pz)
    }

    /// Unit tangent at path length `s`.
    fn tangent(&self, s: f64) -> Vec3 {
        let alpha = s * self.h * self.curvature * self.cos_dip;
        let t = self.phase + alpha;
        Vec3::new(
            -t.sin() * self.h * self.cos_dip,
            t.cos() * self.h * self.cos_dip,
            self.sin_dip,
        )
    }

    /// Path length to the transverse-plane point (x, y), from the arc angle
    /// swept between the origin and the point projected onto the circle.
    /// Principal value only; the 3D projection adds period scanning on top.
    pub fn path_length_2d(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.origin.x;
        let dy = y - self.origin.y;
        if self.singular {
            return (dy * self.cos_phase - dx * self.sin_phase) / self.cos_dip;
        }
        let sin_alpha = dy * self.cos_phase - dx * self.sin_phase;
        let cos_alpha = 1.0 / self.curvature + dx * self.cos_phase + dy * self.sin_phase;
        sin_alpha.atan2(cos_alpha) / (self.h * self.curvature * self.cos_dip)
    }

    /// Path length at the closest approach to a space point.
    ///
    /// Seeded by the transverse-plane arc solution, corrected for the winding
    /// period, then polished with Newton iterations on
    /// F(s) = (at(s) − p)·tangent(s).
    pub fn path_length_to_point(&self, p: &Vec3) -> f64 {
        let d = p - self.origin;
        if self.singular {
            return self.cos_dip * (self.cos_phase * d.y - self.sin_phase * d.x)
                + self.sin_dip * d.z;
        }

        let mut s = self.path_length_2d(p.x, p.y);

        // The 2D solution can be off by whole turns; check a few neighbors.
        let ds = self.period();
        let mut best = (self.at(s) - p).norm();
        for j in 1..=3 {
            for cand in [s + j as f64 * ds, s - j as f64 * ds] {
                let dist = (self.at(cand) - p).norm();
                if dist < best {
                    best = dist;
                    s = cand;
                }
            }
        }

        for _ in 0..MAX_NEWTON_ITERATIONS {
            let r = self.at(s) - p;
            let t = self.tangent(s);
            let f = r.dot(&t);
            // t'(s) points to the circle center with magnitude κ·cos²λ
            let alpha = self.phase + s * self.h * self.curvature * self.cos_dip;
            let ttick = -self.curvature * self.cos_dip * self.cos_dip
                * Vec3::new(alpha.cos(), alpha.sin(), 0.0);
            let fprime = t.dot(&t) + r.dot(&ttick);
            if fprime.abs() < 1e-20 {
                break;
            }
            let step = f / fprime;
            s -= step;
            if step.abs() < POINT_PRECISION {
                break;
            }
        }
        s
    }

    /// Distance of closest approach to a space point (cm).
    pub fn distance_to_point(&self, p: &Vec3) -> f64 {
        (self.at(self.path_length_to_point(p)) - p).norm()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
