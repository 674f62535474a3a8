//! Cleaning and thinning raw point sets before they are placed on the globe.
//!
//! Stages run in a fixed order: outlier clamping, fixed-radius clustering, WGS-84
//! curvature correction of the elevation channel, then stride decimation.

use crate::geo::{ellipsoidal_radius, haversine_central_angle_deg, wgs84};
use crate::model::GeoPoint;
use rayon::prelude::*;

/// Cluster radius as a great-circle angle, in degrees.
pub const CLUSTER_RADIUS_DEG: f64 = 0.05;

/// Fraction of the point count used as the decimation stride.
pub const SIMPLIFICATION_FACTOR: f64 = 0.6;

/// Per-axis population mean and standard deviation (latitude, longitude, elevation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStats {
    pub mean: [f64; 3],
    pub std_dev: [f64; 3],
}

impl AxisStats {
    /// `None` for an empty input.
    pub fn fit(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let n = points.len() as f64;
        let mut mean = [0.0; 3];
        let mut std_dev = [0.0; 3];

        for axis in 0..3 {
            mean[axis] = points.iter().map(|p| p.axis(axis)).sum::<f64>() / n;
            let var = points
                .iter()
                .map(|p| (p.axis(axis) - mean[axis]).powi(2))
                .sum::<f64>()
                / n;
            std_dev[axis] = var.sqrt();
        }

        Some(Self { mean, std_dev })
    }

    /// Clamps every value further than 3σ from the mean into `[mean - 2σ, mean + 2σ]`.
    /// Returns how many values were moved.
    ///
    /// Reapplying the same statistics changes nothing: clamped values sit within 2σ.
    pub fn apply(&self, points: &mut [GeoPoint]) -> usize {
        let mut moved = 0;
        for p in points.iter_mut() {
            for axis in 0..3 {
                let (mean, sd) = (self.mean[axis], self.std_dev[axis]);
                let v = p.axis_mut(axis);
                if (*v - mean).abs() > 3.0 * sd {
                    *v = v.clamp(mean - 2.0 * sd, mean + 2.0 * sd);
                    moved += 1;
                }
            }
        }
        moved
    }
}

/// Fits statistics on `points` and clamps its outliers. The point count is preserved.
pub fn correct_outliers(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut out = points.to_vec();
    if let Some(stats) = AxisStats::fit(points) {
        stats.apply(&mut out);
    }
    out
}

/// Greedy single-pass grouping in input order.
///
/// Each unvisited point seeds a cluster and absorbs every later-unvisited point whose
/// great-circle angle to the seed is at most `radius_deg`. O(n²) distance evaluations.
pub fn cluster_members(points: &[GeoPoint], radius_deg: f64) -> Vec<Vec<usize>> {
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seed = points[i];
        let mut members = vec![i];
        for j in (i + 1)..points.len() {
            if visited[j] {
                continue;
            }
            let d = haversine_central_angle_deg(
                seed.latitude,
                seed.longitude,
                points[j].latitude,
                points[j].longitude,
            );
            if d <= radius_deg {
                visited[j] = true;
                members.push(j);
            }
        }
        clusters.push(members);
    }

    clusters
}

/// Replaces each cluster with the arithmetic mean of its members.
pub fn cluster(points: &[GeoPoint], radius_deg: f64) -> Vec<GeoPoint> {
    cluster_members(points, radius_deg)
        .iter()
        .map(|members| centroid(points, members))
        .collect()
}

fn centroid(points: &[GeoPoint], members: &[usize]) -> GeoPoint {
    let n = members.len() as f64;
    let (lat, lon, ele) = members.iter().fold((0.0, 0.0, 0.0), |acc, &i| {
        let p = points[i];
        (acc.0 + p.latitude, acc.1 + p.longitude, acc.2 + p.elevation)
    });
    GeoPoint::new(lat / n, lon / n, ele / n)
}

/// Recomputes elevation as the WGS-84 ellipsoidal radius minus the equatorial radius.
/// Latitude and longitude are untouched.
pub fn correct_curvature(points: &[GeoPoint]) -> Vec<GeoPoint> {
    points
        .par_iter()
        .map(|p| GeoPoint {
            elevation: ellipsoidal_radius(p.latitude, p.longitude, p.elevation) - wgs84::A,
            ..*p
        })
        .collect()
}

/// Decimation stride for `n` points: `max(1, floor(n * factor))`.
pub fn lod_stride(n: usize, factor: f64) -> usize {
    ((n as f64 * factor).floor() as usize).max(1)
}

/// Keeps every stride-th point starting with the first. Two or fewer points pass through.
pub fn decimate(points: &[GeoPoint], factor: f64) -> Vec<GeoPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let stride = lod_stride(points.len(), factor);
    points.iter().step_by(stride).copied().collect()
}

/// Counts after each stage, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessReport {
    pub input: usize,
    pub clamped_values: usize,
    pub clusters: usize,
    pub output: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    pub cluster_radius_deg: f64,
    pub simplification_factor: f64,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            cluster_radius_deg: CLUSTER_RADIUS_DEG,
            simplification_factor: SIMPLIFICATION_FACTOR,
        }
    }
}

impl Preprocessor {
    pub fn run(&self, raw: &[GeoPoint]) -> (Vec<GeoPoint>, PreprocessReport) {
        let mut report = PreprocessReport { input: raw.len(), ..Default::default() };

        let Some(stats) = AxisStats::fit(raw) else {
            log::warn!("Preprocessing skipped: empty point set");
            return (Vec::new(), report);
        };

        let mut cleaned = raw.to_vec();
        report.clamped_values = stats.apply(&mut cleaned);

        let clustered = cluster(&cleaned, self.cluster_radius_deg);
        report.clusters = clustered.len();

        let corrected = correct_curvature(&clustered);
        let out = decimate(&corrected, self.simplification_factor);
        report.output = out.len();

        log::info!(
            "Preprocessed {} points: {} values clamped, {} clusters, {} kept",
            report.input,
            report.clamped_values,
            report.clusters,
            report.output
        );

        (out, report)
    }
}

/// Runs the full pipeline with default parameters.
pub fn preprocess(raw: &[GeoPoint]) -> Vec<GeoPoint> {
    Preprocessor::default().run(raw).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pt(lat: f64, lon: f64, ele: f64) -> GeoPoint {
        GeoPoint::new(lat, lon, ele)
    }

    #[test]
    fn outlier_clamped_into_two_sigma() {
        let mut pts: Vec<_> = (0..19).map(|i| pt(i as f64 * 0.1, 0.0, 0.0)).collect();
        pts.push(pt(1.0, 0.0, 100.0));

        let stats = AxisStats::fit(&pts).unwrap();
        let out = correct_outliers(&pts);
        let e = out[19].elevation;
        let (m, s) = (stats.mean[2], stats.std_dev[2]);

        assert!(e < 100.0);
        assert!((e - (m + 2.0 * s)).abs() < 1e-9);
        assert_eq!(out.len(), pts.len());
        assert_eq!(&out[..19], &pts[..19]);
    }

    #[test]
    fn constant_axis_is_untouched() {
        let pts = vec![pt(5.0, 5.0, 1.0); 6];
        assert_eq!(correct_outliers(&pts), pts);
    }

    #[test]
    fn clustering_merges_near_points_only() {
        let pts = [pt(10.0, 10.0, 0.0), pt(10.01, 10.01, 2.0), pt(20.0, 20.0, 0.0)];
        let out = cluster(&pts, CLUSTER_RADIUS_DEG);
        assert_eq!(out.len(), 2);
        assert!((out[0].latitude - 10.005).abs() < 1e-12);
        assert!((out[0].elevation - 1.0).abs() < 1e-12);
        assert_eq!(out[1], pts[2]);
    }

    #[test]
    fn curvature_uses_ellipsoid_radius() {
        let out = correct_curvature(&[pt(0.0, 0.0, 0.0), pt(90.0, 0.0, 0.0)]);
        assert!(out[0].elevation.abs() < 1e-6);
        assert!((out[1].elevation - (wgs84::B - wgs84::A)).abs() < 1e-6);
        assert_eq!(out[1].latitude, 90.0);
    }

    #[test]
    fn decimation_small_inputs() {
        let two = [pt(0.0, 0.0, 0.0), pt(1.0, 1.0, 0.0)];
        assert_eq!(decimate(&two, SIMPLIFICATION_FACTOR), two.to_vec());
        assert!(decimate(&[], SIMPLIFICATION_FACTOR).is_empty());

        let ten: Vec<_> = (0..10).map(|i| pt(i as f64, 0.0, 0.0)).collect();
        let out = decimate(&ten, SIMPLIFICATION_FACTOR);
        assert_eq!(lod_stride(10, SIMPLIFICATION_FACTOR), 6);
        assert_eq!(out, vec![ten[0], ten[6]]);
    }

    #[test]
    fn empty_input_passes_through() {
        let (out, report) = Preprocessor::default().run(&[]);
        assert!(out.is_empty());
        assert_eq!(report, PreprocessReport::default());
    }

    fn points() -> impl Strategy<Value = Vec<GeoPoint>> {
        prop::collection::vec(
            (-80.0f64..80.0, -179.0f64..179.0, -100.0f64..100.0)
                .prop_map(|(a, b, c)| GeoPoint::new(a, b, c)),
            0..60,
        )
    }

    proptest! {
        #[test]
        fn outlier_clamp_is_idempotent(pts in points()) {
            if let Some(stats) = AxisStats::fit(&pts) {
                let mut once = pts.clone();
                stats.apply(&mut once);
                let mut twice = once.clone();
                prop_assert_eq!(stats.apply(&mut twice), 0);
                prop_assert_eq!(once, twice);
            }
        }

        #[test]
        fn small_sets_refit_idempotent(pts in prop::collection::vec(
            (-80.0f64..80.0, -179.0f64..179.0, 0.0f64..1.0)
                .prop_map(|(a, b, c)| GeoPoint::new(a, b, c)),
            1..=9,
        )) {
            let once = correct_outliers(&pts);
            prop_assert_eq!(correct_outliers(&once), once);
        }

        #[test]
        fn clustering_shrinks_and_stays_in_hull(pts in points(), radius in 0.0f64..30.0) {
            let groups = cluster_members(&pts, radius);
            let centres = cluster(&pts, radius);
            prop_assert!(centres.len() <= pts.len());
            prop_assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), pts.len());

            for (members, c) in groups.iter().zip(&centres) {
                for axis in 0..3 {
                    let lo = members.iter().map(|&i| pts[i].axis(axis)).fold(f64::INFINITY, f64::min);
                    let hi = members.iter().map(|&i| pts[i].axis(axis)).fold(f64::NEG_INFINITY, f64::max);
                    prop_assert!(c.axis(axis) >= lo - 1e-9 && c.axis(axis) <= hi + 1e-9);
                }
            }
        }

        #[test]
        fn decimation_length(pts in points()) {
            let out = decimate(&pts, SIMPLIFICATION_FACTOR);
            if pts.len() <= 2 {
                prop_assert_eq!(out.len(), pts.len());
            } else {
                let n = lod_stride(pts.len(), SIMPLIFICATION_FACTOR);
                prop_assert_eq!(out.len(), (pts.len() + n - 1) / n);
                prop_assert_eq!(out[0], pts[0]);
            }
        }
    }
}
