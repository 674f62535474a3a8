//! Background threads that prepare textures and marker data. Results travel to the
//! render thread over a channel and are bound to GPU resources only there.

use crossbeam_channel::Sender;
use globe_core::{
    geo::wgs84,
    instancing::{data_point_coordinates, demo_features, demo_points},
    FeatureKind, InstanceBatch, InstanceTransformBuilder, Preprocessor, TextureAsset, TextureSet,
    TextureSynthesizer, WeatherData,
};
use std::{
    sync::Arc,
    thread,
    time::Instant,
};

pub enum WorkerMsg {
    Textures(Arc<TextureSet>),
    /// Result of the single diffuse retry; `None` if it failed again.
    DiffuseRetry(Option<TextureAsset>),
    /// The base marker layers, replacing any earlier set.
    Instances(Vec<InstanceBatch>),
    /// Markers for a clicked region; `None` when the fetch produced nothing.
    Region(Option<Vec<InstanceBatch>>),
    Weather(Option<WeatherData>),
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetOptions {
    pub seed: u64,
    /// Include the vegetation, building and landmark layers.
    pub instancing: bool,
    pub preprocess: bool,
}

fn deliver(tx: &Sender<WorkerMsg>, msg: WorkerMsg) {
    if tx.send(msg).is_err() {
        log::debug!("Render thread gone; dropping worker result");
    }
}

pub fn spawn_textures(tx: Sender<WorkerMsg>, seed: u64) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let t0 = Instant::now();
        let set = TextureSet::synthesize(seed);
        log::info!(
            "Synthesized earth maps in {:.2?} ({} substituted)",
            t0.elapsed(),
            set.substituted.len()
        );
        deliver(&tx, WorkerMsg::Textures(Arc::new(set)));
    })
}

/// Regenerates the diffuse map once, no larger than `max_dimension` wide.
pub fn retry_diffuse(tx: Sender<WorkerMsg>, seed: u64, max_dimension: u32) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (width, height) = retry_size(max_dimension);
        log::info!("Retrying diffuse map at {width}x{height}");
        let asset = TextureSynthesizer::new(seed).with_size(width, height).generate_diffuse();
        if asset.is_none() {
            log::warn!("Diffuse retry failed; keeping the placeholder");
        }
        deliver(&tx, WorkerMsg::DiffuseRetry(asset));
    })
}

fn retry_size(max_dimension: u32) -> (u32, u32) {
    let width = globe_core::texture::TEXTURE_WIDTH.min(max_dimension).max(2);
    (width, (width / 2).max(1))
}

pub fn spawn_dataset(tx: Sender<WorkerMsg>, options: DatasetOptions) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let batches = build_dataset(options);
        log::info!(
            "Prepared {} marker layers ({} instances)",
            batches.len(),
            batches.iter().map(|b| b.transforms.len()).sum::<usize>()
        );
        deliver(&tx, WorkerMsg::Instances(batches));
    })
}

/// The feature layers (when enabled) followed by one layer of data points.
///
/// Preprocessed points carry elevations in meters; raw demo points are already
/// in globe radii.
pub fn build_dataset(options: DatasetOptions) -> Vec<InstanceBatch> {
    let mut builder = InstanceTransformBuilder::new(options.seed);
    let mut batches = Vec::new();

    if options.instancing {
        for (kind, coords) in demo_features(options.seed) {
            batches.push(builder.build_batch(kind, &coords));
        }
    }

    let raw = demo_points(options.seed);
    let coords = if options.preprocess {
        let (points, _) = Preprocessor::default().run(&raw);
        data_point_coordinates(&points, 1.0 / wgs84::A)
    } else {
        data_point_coordinates(&raw, 1.0)
    };
    batches.push(builder.build_batch(FeatureKind::General, &coords));

    batches
}

/// Turns fetched features into marker layers for the render thread.
pub fn region_callback(tx: Sender<WorkerMsg>, seed: u64) -> impl FnOnce(Option<Vec<globe_core::GeoFeature>>) + Send {
    move |features| {
        let batches = features.map(|features| {
            log::info!("Region fetch returned {} features", features.len());
            InstanceTransformBuilder::new(seed).build_feature_batches(&features)
        });
        deliver(&tx, WorkerMsg::Region(batches));
    }
}

pub fn weather_callback(tx: Sender<WorkerMsg>) -> impl FnOnce(Option<WeatherData>) + Send {
    move |weather| deliver(&tx, WorkerMsg::Weather(weather))
}

#[cfg(test)]
mod tests {
    use super::*;
    use globe_core::{GeoCoordinate, GeoFeature};
    use std::{collections::BTreeMap, time::Duration};

    #[test]
    fn dataset_has_feature_layers_then_points() {
        let batches = build_dataset(DatasetOptions { seed: 5, instancing: true, preprocess: false });
        let kinds: Vec<_> = batches.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            [FeatureKind::Vegetation, FeatureKind::Building, FeatureKind::Landmark, FeatureKind::General]
        );
        assert_eq!(batches[0].transforms.len(), 1000);
        assert_eq!(batches[3].transforms.len(), 100);
    }

    #[test]
    fn preprocessing_shrinks_the_point_layer() {
        let batches = build_dataset(DatasetOptions { seed: 5, instancing: false, preprocess: true });
        assert_eq!(batches.len(), 1);
        let points = &batches[0];
        assert!(!points.is_empty() && points.transforms.len() < 100);

        // Every marker stays just above the unit sphere.
        for t in &points.transforms {
            let r = t.matrix().w_axis.truncate().length();
            assert!((0.99..1.02).contains(&r), "radius {r}");
        }
    }

    #[test]
    fn retry_size_respects_device_limit() {
        assert_eq!(retry_size(16_384), (2048, 1024));
        assert_eq!(retry_size(1024), (1024, 512));
        assert_eq!(retry_size(0), (2, 1));
    }

    #[test]
    fn region_callback_builds_batches() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let feature = GeoFeature {
            id: 1,
            kind: FeatureKind::Building,
            coordinate: GeoCoordinate::new(10.0, 20.0, 0.01),
            properties: BTreeMap::new(),
        };

        region_callback(tx.clone(), 1)(Some(vec![feature]));
        region_callback(tx, 1)(None);

        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(WorkerMsg::Region(Some(b))) => {
                assert_eq!(b.len(), 1);
                assert_eq!(b[0].kind, FeatureKind::Building);
            }
            _ => panic!("expected region batches"),
        }
        assert!(matches!(rx.recv_timeout(Duration::from_secs(1)), Ok(WorkerMsg::Region(None))));
    }

    #[test]
    fn texture_thread_delivers_a_full_set() {
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_textures(tx, 7).join().unwrap();
        match rx.try_recv() {
            Ok(WorkerMsg::Textures(set)) => assert_eq!(set.diffuse.width, 2048),
            _ => panic!("expected textures"),
        }
    }
}
