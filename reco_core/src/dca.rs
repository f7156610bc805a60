//! Pair distance of closest approach between two helices.
//!
//! The transverse projection of each helix is a circle, so a good seed for
//! the 3D minimum comes from intersecting (or nearly touching) the two
//! circles. The seed is then refined with a shrinking-interval scan over the
//! path length of the first helix, evaluating the exact 3D distance to the
//! second helix at every probe.
//!
//! Straight-line tracks (zero field) get a closed-form line-line solution
//! instead. Mixed singular/curved pairs are rejected as infeasible rather
//! than handled approximately.

use crate::helix::Helix;
use crate::types::Vec3;

/// Scan terminates once the probe spacing falls below this (cm).
const MIN_STEP: f64 = 1e-3;
/// Initial bracket around the seed is at least this wide (cm).
const MIN_RANGE: f64 = 10.0;
/// Hard cap on scan rounds; pathological geometries give up with the best
/// point found so far instead of looping.
const MAX_SCAN_ROUNDS: usize = 200;

/// Result of a two-helix closest-approach computation.
#[derive(Clone, Copy, Debug)]
pub struct PairDca {
    /// Path length on the first helix at the minimum (cm)
    pub s1: f64,
    /// Path length on the second helix at the minimum (cm)
    pub s2: f64,
    /// Point on the first helix (cm)
    pub point1: Vec3,
    /// Point on the second helix (cm)
    pub point2: Vec3,
    /// Distance between the two points (cm)
    pub separation: f64,
}

impl PairDca {
    /// Midpoint between the two closest-approach points; used as the decay
    /// vertex estimate.
    pub fn midpoint(&self) -> Vec3 {
        0.5 * (self.point1 + self.point2)
    }
}

/// Compute the mutual closest approach of two trajectories.
///
/// Returns `None` when no meaningful solution exists: parallel straight
/// lines, coincident circle centers, or a singular/curved mismatch.
pub fn closest_approach(h1: &Helix, h2: &Helix) -> Option<PairDca> {
    match (h1.is_singular(), h2.is_singular()) {
        (true, true) => line_line(h1, h2),
        (false, false) => helix_helix(h1, h2),
        _ => None,
    }
}

fn finish(h1: &Helix, h2: &Helix, s1: f64, s2: f64) -> PairDca {
    let point1 = h1.at(s1);
    let point2 = h2.at(s2);
    PairDca {
        s1,
        s2,
        point1,
        point2,
        separation: (point1 - point2).norm(),
    }
}

/// Closed-form closest approach of two straight lines.
fn line_line(h1: &Helix, h2: &Helix) -> Option<PairDca> {
    let a = h1.line_direction();
    let b = h2.line_direction();
    let dx = h2.origin() - h1.origin();
    let ab = a.dot(&b);
    let denom = ab * ab - 1.0;
    if denom.abs() < 1e-12 {
        // parallel or antiparallel: no unique minimum
        return None;
    }
    let g = dx.dot(&a);
    let k = dx.dot(&b);
    let s2 = (k - ab * g) / denom;
    let s1 = g + s2 * ab;
    Some(finish(h1, h2, s1, s2))
}

/// Seed path lengths on `h1` from the transverse circle-circle geometry.
fn transverse_seed(h1: &Helix, h2: &Helix) -> Option<f64> {
    let r1 = 1.0 / h1.curvature();
    let r2 = 1.0 / h2.curvature();
    let (x1, y1) = h1.center();
    let (x2, y2) = h2.center();
    let dd = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
    if dd < 1e-9 {
        // concentric circles, every azimuth is equidistant
        return None;
    }

    let cos_alpha = (r1 * r1 + dd * dd - r2 * r2) / (2.0 * r1 * dd);
    let (sx, sy) = if cos_alpha.abs() <= 1.0 {
        // circles intersect: two candidate points, take the one with the
        // smaller full 3D separation
        let sin_alpha = (1.0 - cos_alpha * cos_alpha).sqrt();
        let ux = (x2 - x1) / dd;
        let uy = (y2 - y1) / dd;
        let pa = (
            x1 + r1 * (ux * cos_alpha - uy * sin_alpha),
            y1 + r1 * (uy * cos_alpha + ux * sin_alpha),
        );
        let pb = (
            x1 + r1 * (ux * cos_alpha + uy * sin_alpha),
            y1 + r1 * (uy * cos_alpha - ux * sin_alpha),
        );
        let dist = |p: (f64, f64)| {
            let s1 = h1.path_length_2d(p.0, p.1);
            let s2 = h2.path_length_to_point(&h1.at(s1));
            (h1.at(s1) - h2.at(s2)).norm()
        };
        if dist(pa) <= dist(pb) {
            pa
        } else {
            pb
        }
    } else {
        // circles disjoint or nested: take the tangent point on h1 along
        // the line of centers
        let rsign = if dd < r1 + r2 { -1.0 } else { 1.0 };
        (
            x1 + rsign * r1 * (x2 - x1) / dd,
            y1 + rsign * r1 * (y2 - y1) / dd,
        )
    };
    Some(h1.path_length_2d(sx, sy))
}

/// Shrinking-interval scan around the seed: bracket, probe 10 points,
/// recenter on the best probe, shrink, repeat. The bracket slides when the
/// minimum sits at a border.
fn helix_helix(h1: &Helix, h2: &Helix) -> Option<PairDca> {
    let seed = transverse_seed(h1, h2)?;

    let dist_at = |s1: f64| -> (f64, f64) {
        let s2 = h2.path_length_to_point(&h1.at(s1));
        ((h1.at(s1) - h2.at(s2)).norm(), s2)
    };

    let (mut dmin, mut s2_best) = dist_at(seed);
    let mut s1_best = seed;

    let range = (2.0 * dmin).max(MIN_RANGE);
    let mut lo = seed - 0.5 * range;
    let mut ds = range / 10.0;

    let mut rounds = 0;
    while ds > MIN_STEP && rounds < MAX_SCAN_ROUNDS {
        rounds += 1;
        let mut local_d = f64::INFINITY;
        let mut local_idx = 0usize;
        let mut local_s1 = lo;
        let mut local_s2 = 0.0;
        for i in 0..=10 {
            let s1 = lo + i as f64 * ds;
            let (d, s2) = dist_at(s1);
            if d < local_d {
                local_d = d;
                local_idx = i;
                local_s1 = s1;
                local_s2 = s2;
            }
        }
        if local_d < dmin {
            dmin = local_d;
            s1_best = local_s1;
            s2_best = local_s2;
        }
        if local_idx == 0 {
            // minimum at the lower border: slide the window down
            lo -= 8.0 * ds;
        } else if local_idx == 10 {
            lo += 8.0 * ds;
        } else {
            // minimum interior: rebracket to the two neighboring cells
            lo = local_s1 - ds;
            ds = 2.0 * ds / 10.0;
        }
    }

    Some(finish(h1, h2, s1_best, s2_best))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
