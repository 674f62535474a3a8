use globe_core::instancing::data_point_coordinates;
use globe_core::preprocess::{AxisStats, Preprocessor, CLUSTER_RADIUS_DEG};
use globe_core::{geo, preprocess, FeatureKind, GeoPoint, InstanceTransformBuilder};

#[test]
fn duplicate_pair_and_elevation_outlier() {
    let raw = [
        GeoPoint::new(35.0, 139.0, 0.02),
        GeoPoint::new(35.0, 139.0, 0.02),
        GeoPoint::new(35.0, 139.0, 900.0),
    ];

    // A lone value among n points sits at most sqrt(n - 1) population sigmas out,
    // so with three points nothing crosses the 3 sigma line.
    let stats = AxisStats::fit(&raw).unwrap();
    let z = (900.0 - stats.mean[2]) / stats.std_dev[2];
    assert!((z - 2f64.sqrt()).abs() < 1e-9, "z = {z}");

    let (out, report) = Preprocessor::default().run(&raw);
    assert_eq!(report.clamped_values, 0);
    assert_eq!(report.clusters, 1);
    assert_eq!(out.len(), 1);
}

#[test]
fn elevation_outlier_is_clamped_before_clustering() {
    // The duplicate pair and the spike share a position; nine inliers are spread
    // 5 degrees apart so they stay separate clusters. Twelve points put the lone
    // spike sqrt(11) sigmas out.
    let mut raw = vec![
        GeoPoint::new(35.0, 139.0, 0.02),
        GeoPoint::new(35.0, 139.0, 0.02),
        GeoPoint::new(35.0, 139.0, 900.0),
    ];
    raw.extend((1..=9).map(|i| GeoPoint::new(35.0 + 5.0 * i as f64, 139.0 + 2.0 * i as f64, 0.02)));

    let stats = AxisStats::fit(&raw).unwrap();
    let (mean, sd) = (stats.mean[2], stats.std_dev[2]);
    assert!((900.0 - mean).abs() > 3.0 * sd);

    let mut cleaned = raw.clone();
    assert_eq!(stats.apply(&mut cleaned), 1);
    let e = cleaned[2].elevation;
    assert!((e - (mean + 2.0 * sd)).abs() < 1e-9, "clamped to {e}");

    let (out, report) = Preprocessor::default().run(&raw);
    assert_eq!(report.clamped_values, 1);
    // Pair and spike merge into one cluster beside the nine inliers.
    assert_eq!(report.clusters, 10);
    assert!(out.len() <= 2, "{out:?}");
    assert_eq!(report.input, 12);
}

#[test]
fn far_apart_points_survive_clustering() {
    let raw: Vec<_> = (0..12)
        .map(|i| GeoPoint::new(-50.0 + i as f64 * 8.0, i as f64 * 25.0 - 150.0, 0.0))
        .collect();

    let (out, report) = Preprocessor::default().run(&raw);
    assert_eq!(report.clusters, 12);
    // Stride floor(12 * 0.6) = 7 keeps indices 0 and 7.
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].latitude, raw[0].latitude);
    assert_eq!(out[1].longitude, raw[7].longitude);
}

#[test]
fn clustering_radius_is_an_angle() {
    // 0.09 degrees of longitude at 60N is about 0.045 degrees of arc.
    let pts = [GeoPoint::new(60.0, 10.0, 0.0), GeoPoint::new(60.0, 10.09, 0.0)];
    let d = geo::haversine_central_angle_deg(60.0, 10.0, 60.0, 10.09);
    assert!(d < CLUSTER_RADIUS_DEG);
    assert_eq!(preprocess::cluster(&pts, CLUSTER_RADIUS_DEG).len(), 1);
}

#[test]
fn preprocessed_points_become_markers_on_the_globe() {
    let raw = globe_core::instancing::demo_points(4);
    let cleaned = globe_core::preprocess(&raw);
    assert!(!cleaned.is_empty() && cleaned.len() < raw.len());

    let coords = data_point_coordinates(&cleaned, 1.0 / geo::wgs84::A);
    let transforms = InstanceTransformBuilder::new(4).build(FeatureKind::General, &coords);
    assert_eq!(transforms.len(), cleaned.len());

    for t in &transforms {
        let r = t.matrix().w_axis.truncate().length();
        assert!(r > 1.0 && r < 1.02, "marker radius {r}");
    }
}
