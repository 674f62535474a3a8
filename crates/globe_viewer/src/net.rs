//! Map-feature and weather fetches on a dedicated network thread.
//!
//! Requests arrive over a channel and run one at a time on a current-thread tokio
//! runtime. Each request carries a single-shot callback that receives `None` on any
//! failure; there is no retry.

use crossbeam_channel::{Receiver, Sender};
use globe_core::{BoundingBox, FeatureKind, GeoCoordinate, GeoFeature, WeatherData};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use thiserror::Error;

const USER_AGENT: &str = concat!("globe_viewer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("response is missing `{0}`")]
    Missing(&'static str),
    #[error("no weather API key configured")]
    NoApiKey,
}

/// Shared flag that stops a fetch from delivering data once set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub type Callback<T> = Box<dyn FnOnce(Option<T>) + Send + 'static>;

pub enum FetchRequest {
    Features {
        bbox: BoundingBox,
        token: CancelToken,
        callback: Callback<Vec<GeoFeature>>,
    },
    Weather {
        location: GeoCoordinate,
        token: CancelToken,
        callback: Callback<WeatherData>,
    },
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub overpass_url: String,
    pub weather_url: String,
    pub weather_api_key: Option<String>,
    pub timeout: Duration,
}

/// Handle for submitting fetches. Dropping it ends the network thread.
pub struct NetClient {
    tx: Sender<FetchRequest>,
}

impl NetClient {
    pub fn spawn(endpoints: Endpoints) -> (Self, thread::JoinHandle<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || {
            if let Err(e) = run_network_thread(endpoints, rx) {
                log::error!("Network thread stopped: {e:#}");
            }
        });
        (Self { tx }, handle)
    }

    /// Features inside `bbox`. The returned token cancels delivery.
    pub fn load_external_feature_data(
        &self,
        bbox: BoundingBox,
        callback: impl FnOnce(Option<Vec<GeoFeature>>) + Send + 'static,
    ) -> CancelToken {
        let token = CancelToken::new();
        self.submit(FetchRequest::Features { bbox, token: token.clone(), callback: Box::new(callback) });
        token
    }

    pub fn load_weather_data(
        &self,
        location: GeoCoordinate,
        callback: impl FnOnce(Option<WeatherData>) + Send + 'static,
    ) -> CancelToken {
        let token = CancelToken::new();
        self.submit(FetchRequest::Weather { location, token: token.clone(), callback: Box::new(callback) });
        token
    }

    fn submit(&self, request: FetchRequest) {
        if let Err(e) = self.tx.send(request) {
            log::warn!("Network thread is gone; fetch dropped");
            // The callback still fires once, with no data.
            match e.into_inner() {
                FetchRequest::Features { callback, .. } => callback(None),
                FetchRequest::Weather { callback, .. } => callback(None),
            }
        }
    }
}

fn run_network_thread(endpoints: Endpoints, rx: Receiver<FetchRequest>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?;

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(endpoints.timeout)
        .build()?;

    for request in rx.iter() {
        match request {
            FetchRequest::Features { bbox, token, callback } => {
                let result = rt.block_on(deliver(&token, "features", fetch_features(&http, &endpoints, bbox)));
                if !token.is_cancelled() {
                    callback(result);
                }
            }
            FetchRequest::Weather { location, token, callback } => {
                let result = rt.block_on(deliver(&token, "weather", fetch_weather(&http, &endpoints, location)));
                if !token.is_cancelled() {
                    callback(result);
                }
            }
        }
    }

    log::debug!("Network thread finished");
    Ok(())
}

async fn deliver<T>(
    token: &CancelToken,
    what: &str,
    fut: impl std::future::Future<Output = Result<T, FetchError>>,
) -> Option<T> {
    if token.is_cancelled() {
        log::debug!("Skipping cancelled {what} fetch");
        return None;
    }
    match fut.await {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Fetching {what} failed: {e}");
            None
        }
    }
}

/// Overpass QL for every `natural` element in the box, south/west/north/east order.
pub fn overpass_query(bbox: &BoundingBox) -> String {
    let b = format!("{},{},{},{}", bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon);
    format!(
        "[out:json];(node[\"natural\"]({b});way[\"natural\"]({b});relation[\"natural\"]({b}););out body;>;out skel qt;"
    )
}

async fn fetch_features(
    http: &reqwest::Client,
    endpoints: &Endpoints,
    bbox: BoundingBox,
) -> Result<Vec<GeoFeature>, FetchError> {
    let response = http
        .post(&endpoints.overpass_url)
        .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(overpass_query(&bbox))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }

    let features = response.json::<OverpassResponse>().await?.into_features();
    log::info!("Fetched {} features for {:?}", features.len(), bbox);
    Ok(features)
}

async fn fetch_weather(
    http: &reqwest::Client,
    endpoints: &Endpoints,
    location: GeoCoordinate,
) -> Result<WeatherData, FetchError> {
    let key = endpoints.weather_api_key.as_deref().ok_or(FetchError::NoApiKey)?;

    let response = http
        .get(&endpoints.weather_url)
        .query(&[
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("appid", key.to_string()),
            ("units", "metric".to_string()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }

    response.json::<WeatherResponse>().await?.into_weather(location)
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl OverpassResponse {
    /// Nodes with a position become features; ways, relations and bare nodes are skipped.
    fn into_features(self) -> Vec<GeoFeature> {
        self.elements
            .into_iter()
            .filter(|e| e.kind == "node")
            .filter_map(|e| {
                let (lat, lon) = (e.lat?, e.lon?);
                Some(GeoFeature {
                    id: e.id,
                    kind: FeatureKind::classify(&e.tags),
                    coordinate: GeoCoordinate::new(lat, lon, 0.0),
                    properties: e.tags,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: WeatherMain,
    wind: WeatherWind,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherWind {
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

impl WeatherResponse {
    fn into_weather(self, location: GeoCoordinate) -> Result<WeatherData, FetchError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or(FetchError::Missing("weather[0]"))?
            .description;

        Ok(WeatherData {
            temperature: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            condition,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
    };

    fn parse_overpass(body: &[u8]) -> serde_json::Result<Vec<GeoFeature>> {
        serde_json::from_slice::<OverpassResponse>(body).map(OverpassResponse::into_features)
    }

    fn parse_weather(body: &[u8], location: GeoCoordinate) -> Result<WeatherData, FetchError> {
        let response: WeatherResponse = serde_json::from_slice(body).unwrap();
        response.into_weather(location)
    }

    /// Answers a single HTTP request with `body` as JSON, then closes.
    fn serve_once(body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            stream.flush().unwrap();

            format!("{}{}", request_line.trim_end(), String::from_utf8_lossy(&payload))
        });

        (url, handle)
    }

    #[test]
    fn overpass_body_lists_box_in_swne_order() {
        let q = overpass_query(&BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert!(q.starts_with("[out:json];"));
        assert!(q.contains("node[\"natural\"](1,2,3,4);"));
        assert!(q.contains("relation[\"natural\"](1,2,3,4);"));
        assert!(q.ends_with("out body;>;out skel qt;"));
    }

    #[test]
    fn overpass_nodes_are_classified() {
        let body = br#"{"elements":[
            {"type":"node","id":1,"lat":48.85,"lon":2.29,"tags":{"tourism":"attraction"}},
            {"type":"node","id":2,"lat":48.86,"lon":2.30,"tags":{"natural":"tree"}},
            {"type":"node","id":3,"lat":48.87,"lon":2.31},
            {"type":"way","id":4,"nodes":[1,2]},
            {"type":"node","id":5,"tags":{"building":"yes"}}
        ]}"#;

        let features = parse_overpass(body).unwrap();
        let kinds: Vec<_> = features.iter().map(|f| (f.id, f.kind)).collect();
        assert_eq!(
            kinds,
            vec![(1, FeatureKind::Landmark), (2, FeatureKind::Vegetation), (3, FeatureKind::General)]
        );
        assert_eq!(features[0].properties["tourism"], "attraction");
        assert_eq!(features[1].coordinate, GeoCoordinate::new(48.86, 2.30, 0.0));
    }

    #[test]
    fn overpass_without_elements_is_rejected() {
        assert!(parse_overpass(br#"{"version":0.6}"#).is_err());
        assert!(parse_overpass(b"not json").is_err());
    }

    #[test]
    fn weather_wind_direction_defaults_to_zero() {
        let at = GeoCoordinate::new(51.5, -0.12, 0.0);
        let body = br#"{"main":{"temp":12.5,"humidity":81},"wind":{"speed":4.1},
                        "weather":[{"description":"light rain"},{"description":"mist"}]}"#;

        let w = parse_weather(body, at).unwrap();
        assert_eq!(w.temperature, 12.5);
        assert_eq!(w.humidity, 81.0);
        assert_eq!(w.wind_direction, 0.0);
        assert_eq!(w.condition, "light rain");
        assert_eq!(w.location, at);
    }

    #[test]
    fn weather_needs_a_condition() {
        let body = br#"{"main":{"temp":1,"humidity":2},"wind":{"speed":3,"deg":90},"weather":[]}"#;
        assert!(matches!(
            parse_weather(body, GeoCoordinate::new(0.0, 0.0, 0.0)),
            Err(FetchError::Missing(_))
        ));
    }

    #[test]
    fn cancelled_token_is_shared() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn weather_is_decoded_from_the_http_body() {
        let (url, server) = serve_once(
            r#"{"main":{"temp":21.0,"humidity":40},"wind":{"speed":2.5,"deg":270},"weather":[{"description":"clear sky"}]}"#,
        );
        let (client, handle) = NetClient::spawn(Endpoints {
            overpass_url: url.clone(),
            weather_url: url,
            weather_api_key: Some("k3y".into()),
            timeout: Duration::from_secs(5),
        });

        let (tx, rx) = crossbeam_channel::bounded(1);
        let at = GeoCoordinate::new(45.0, 7.5, 0.0);
        client.load_weather_data(at, move |w| {
            let _ = tx.send(w);
        });

        let w = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!((w.temperature, w.wind_direction), (21.0, 270.0));
        assert_eq!(w.condition, "clear sky");
        assert_eq!(w.location, at);

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /?lat=45&lon=7.5&appid=k3y&units=metric"), "{request}");
        drop(client);
        handle.join().unwrap();
    }

    #[test]
    fn features_are_decoded_from_the_http_body() {
        let (url, server) = serve_once(
            r#"{"elements":[{"type":"node","id":7,"lat":1.5,"lon":2.5,"tags":{"natural":"tree"}},{"type":"way","id":8}]}"#,
        );
        let (client, handle) = NetClient::spawn(Endpoints {
            overpass_url: url.clone(),
            weather_url: url,
            weather_api_key: None,
            timeout: Duration::from_secs(5),
        });

        let (tx, rx) = crossbeam_channel::bounded(1);
        client.load_external_feature_data(BoundingBox::new(1.0, 2.0, 3.0, 4.0), move |f| {
            let _ = tx.send(f);
        });

        let features = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!((features[0].id, features[0].kind), (7, FeatureKind::Vegetation));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST / "), "{request}");
        assert!(request.ends_with("out body;>;out skel qt;"), "{request}");
        drop(client);
        handle.join().unwrap();
    }

    #[test]
    fn non_json_body_yields_none() {
        let (url, server) = serve_once("<html>busy</html>");
        let (client, handle) = NetClient::spawn(Endpoints {
            overpass_url: url.clone(),
            weather_url: url,
            weather_api_key: None,
            timeout: Duration::from_secs(5),
        });

        let (tx, rx) = crossbeam_channel::bounded(1);
        client.load_external_feature_data(BoundingBox::new(0.0, 0.0, 1.0, 1.0), move |f| {
            let _ = tx.send(f);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), None);
        server.join().unwrap();
        drop(client);
        handle.join().unwrap();
    }

    #[test]
    fn missing_key_yields_none_without_network() {
        let (client, handle) = NetClient::spawn(Endpoints {
            overpass_url: "http://127.0.0.1:9/".into(),
            weather_url: "http://127.0.0.1:9/".into(),
            weather_api_key: None,
            timeout: Duration::from_millis(200),
        });

        let (tx, rx) = crossbeam_channel::bounded(1);
        client.load_weather_data(GeoCoordinate::new(0.0, 0.0, 0.0), move |w| {
            let _ = tx.send(w);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), None);
        drop(client);
        handle.join().unwrap();
    }

    #[test]
    fn cancelled_fetch_never_calls_back() {
        let endpoints = Endpoints {
            overpass_url: "http://127.0.0.1:9/".into(),
            weather_url: "http://127.0.0.1:9/".into(),
            weather_api_key: None,
            timeout: Duration::from_millis(200),
        };

        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let token = CancelToken::new();
        token.cancel();
        req_tx
            .send(FetchRequest::Features {
                bbox: BoundingBox::around(0.0, 0.0, 0.5),
                token,
                callback: Box::new(move |f| {
                    let _ = tx.send(f);
                }),
            })
            .unwrap();
        drop(req_tx);

        run_network_thread(endpoints, req_rx).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
