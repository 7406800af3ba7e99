use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wx_relay::config::{Config, StationConfig, TopicConfig};
use wx_relay::error::{FetchError, FetchErrorKind, PublishError};
use wx_relay::jobs::{register_jobs, run_job, JobOutcome, JobSpec};
use wx_relay::message::{MessageShape, OutboundMessage};
use wx_relay::reading::StationReading;
use wx_relay::redpanda::{Ack, MessagePublisher};
use wx_relay::scheduler::{Cadence, Scheduler};
use wx_relay::station::{Endpoint, StationClient, StationSource};

const STATION_BODY: &str = concat!(
    r#"{"thp":{"tempC":21.5,"tempF":70.7,"humidity":55,"pressure":1013.2},"#,
    r#""wind":{"speed":3.1,"direction":180},"rain":{"hour":0,"daily":1.2},"#,
    r#""uv":{"index":4},"lightning":{"distance":0}}"#
);

/// Serve `app` on an ephemeral loopback port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn station_client(url: &str) -> StationClient {
    StationClient::new(&StationConfig {
        url: url.to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

/// A loopback URL nobody is listening on.
async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    fn sent(&self) -> Vec<(String, Value)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, bytes)| (topic.clone(), serde_json::from_slice(bytes).unwrap()))
            .collect()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, message: &OutboundMessage, topic: &str) -> Result<Ack, PublishError> {
        let bytes = message.encode()?;
        let mut sent = self.sent.lock().unwrap();
        sent.push((topic.to_string(), bytes));
        Ok(Ack {
            topic: topic.to_string(),
            partition: 0,
            offset: sent.len() as i64 - 1,
        })
    }
}

/// Station wrapper that remembers how every fetch ended.
struct CountingStation<S> {
    inner: S,
    results: Mutex<Vec<Result<(), FetchErrorKind>>>,
}

#[async_trait]
impl<S: StationSource> StationSource for CountingStation<S> {
    async fn fetch(&self, endpoint: Endpoint) -> Result<StationReading, FetchError> {
        let result = self.inner.fetch(endpoint).await;
        self.results
            .lock()
            .unwrap()
            .push(result.as_ref().map(|_| ()).map_err(|e| e.kind()));
        result
    }
}

fn thermal_job() -> JobSpec {
    JobSpec::defaults(&TopicConfig::default())
        .into_iter()
        .find(|j| j.shape == MessageShape::Thermal)
        .unwrap()
}

#[tokio::test]
async fn thermal_job_publishes_thp_payload_to_its_topic_only() {
    let url = serve(Router::new().route("/", get(|| async { STATION_BODY }))).await;
    let station = station_client(&url);
    let publisher = RecordingPublisher::default();

    let outcome = run_job(&thermal_job(), &station, &publisher).await;

    assert!(matches!(outcome, JobOutcome::Published(ref ack) if ack.topic == "wxTHP"));
    assert_eq!(
        publisher.sent(),
        vec![(
            "wxTHP".to_string(),
            json!({"tempC": 21.5, "tempF": 70.7, "humidity": 55, "pressure": 1013.2})
        )]
    );
}

#[tokio::test]
async fn unified_job_reads_daily_summary_endpoint() {
    let app = Router::new()
        .route("/", get(|| async { r#"{"uv":{"index":1}}"# }))
        .route(
            "/m",
            get(|| async { r#"{"uv":{"index":9},"lightning":{"strike":true,"distance":3}}"# }),
        );
    let url = serve(app).await;
    let station = station_client(&url);
    let publisher = RecordingPublisher::default();
    let unified = JobSpec::defaults(&TopicConfig::default())
        .into_iter()
        .find(|j| j.shape == MessageShape::Unified)
        .unwrap();

    run_job(&unified, &station, &publisher).await;

    let sent = publisher.sent();
    assert_eq!(sent.len(), 1);
    let (topic, payload) = &sent[0];
    assert_eq!(topic, "wxTopic");
    assert_eq!(payload["uvIndex"], json!(9));
    assert_eq!(payload["lightning"], json!(3));
    assert!(payload.get("strike").is_none());
    assert!(payload["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn malformed_body_is_a_decode_error_and_nothing_is_published() {
    let url = serve(Router::new().route("/", get(|| async { "<html>rebooting</html>" }))).await;
    let station = station_client(&url);
    let publisher = RecordingPublisher::default();

    let outcome = run_job(&thermal_job(), &station, &publisher).await;

    assert_eq!(outcome, JobOutcome::FetchFailed(FetchErrorKind::Decode));
    assert!(publisher.sent().is_empty());
}

#[tokio::test]
async fn server_error_is_a_transport_error() {
    let app = Router::new().route(
        "/",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "busy") }),
    );
    let url = serve(app).await;

    let err = station_client(&url).fetch(Endpoint::Current).await.unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Transport);
}

#[tokio::test]
async fn empty_document_is_a_zero_reading() {
    let url = serve(Router::new().route("/", get(|| async { "{}" }))).await;
    let publisher = RecordingPublisher::default();
    let rain = JobSpec::defaults(&TopicConfig::default())
        .into_iter()
        .find(|j| j.shape == MessageShape::Rain)
        .unwrap();

    run_job(&rain, &station_client(&url), &publisher).await;

    assert_eq!(
        publisher.sent(),
        vec![("wxRain".to_string(), json!({"hour": 0, "daily": 0}))]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_station_never_stops_the_scheduler() {
    let station = Arc::new(CountingStation {
        inner: station_client(&closed_url().await),
        results: Mutex::new(Vec::new()),
    });
    let publisher = Arc::new(RecordingPublisher::default());

    let specs = ["wind", "thermal", "rain"]
        .into_iter()
        .zip([MessageShape::Wind, MessageShape::Thermal, MessageShape::Rain])
        .map(|(name, shape)| JobSpec {
            name,
            cadence: Cadence::Every(Duration::from_millis(100)),
            shape,
            topic: format!("test-{}", name),
            endpoint: Endpoint::Current,
        })
        .collect();

    let scheduler = register_jobs(Scheduler::new(), specs, station.clone(), publisher.clone());
    let stats = scheduler.stats();
    scheduler.run(tokio::time::sleep(Duration::from_millis(1_250))).await;
    // let the last in-flight fetches settle
    tokio::time::sleep(Duration::from_millis(300)).await;

    let fired: u64 = stats.iter().map(|(_, s)| s.snapshot().fired).sum();
    assert!(fired >= 10, "expected at least 10 firings, got {}", fired);

    let results = station.results.lock().unwrap().clone();
    assert!(results.len() >= 10);
    assert!(results
        .iter()
        .all(|r| *r == Err(FetchErrorKind::Transport)));
    assert!(publisher.sent().is_empty());
}

/// Config is read from the process environment once, at startup.
#[test]
#[serial]
fn config_from_environment() {
    let keys = [
        "STATION_URL",
        "KAFKA_BROKERS",
        "REDPANDA_BROKERS",
        "DEBUG",
        "TOPIC_WIND",
    ];
    let original: Vec<_> = keys.iter().map(|k| (*k, std::env::var(k).ok())).collect();

    for k in keys {
        std::env::remove_var(k);
    }
    std::env::set_var("STATION_URL", "http://station.local/");
    std::env::set_var("KAFKA_BROKERS", "kafka-0:9092,kafka-1:9092");
    std::env::set_var("DEBUG", "on");
    std::env::set_var("TOPIC_WIND", "wind-test");

    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.station.url, "http://station.local");
    assert_eq!(cfg.redpanda.broker_list(), vec!["kafka-0:9092", "kafka-1:9092"]);
    assert!(cfg.debug);
    assert_eq!(cfg.topics.wind, "wind-test");
    assert_eq!(cfg.topics.thermal, "wxTHP");

    std::env::remove_var("STATION_URL");
    assert!(Config::from_env().is_err(), "missing STATION_URL must be fatal");

    for (k, v) in original {
        match v {
            Some(v) => std::env::set_var(k, v),
            None => std::env::remove_var(k),
        }
    }
}
