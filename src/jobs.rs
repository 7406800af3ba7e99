use crate::config::TopicConfig;
use crate::error::{FetchErrorKind, PublishErrorKind};
use crate::message::{project, MessageShape};
use crate::redpanda::{Ack, MessagePublisher};
use crate::scheduler::{Cadence, Scheduler};
use crate::station::{Endpoint, StationSource};
use chrono::NaiveTime;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// One relay job: how often it runs, what it reads and where it publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: &'static str,
    pub cadence: Cadence,
    pub shape: MessageShape,
    pub topic: String,
    pub endpoint: Endpoint,
}

impl JobSpec {
    /// The four standard jobs: wind every second, thermal every five seconds,
    /// rain every minute and the unified daily summary at local midnight.
    pub fn defaults(topics: &TopicConfig) -> Vec<JobSpec> {
        vec![
            JobSpec {
                name: "wind",
                cadence: Cadence::Every(Duration::from_secs(1)),
                shape: MessageShape::Wind,
                topic: topics.wind.clone(),
                endpoint: Endpoint::Current,
            },
            JobSpec {
                name: "thermal",
                cadence: Cadence::Every(Duration::from_secs(5)),
                shape: MessageShape::Thermal,
                topic: topics.thermal.clone(),
                endpoint: Endpoint::Current,
            },
            JobSpec {
                name: "rain",
                cadence: Cadence::Every(Duration::from_secs(60)),
                shape: MessageShape::Rain,
                topic: topics.rain.clone(),
                endpoint: Endpoint::Current,
            },
            JobSpec {
                name: "unified",
                cadence: Cadence::DailyAt(NaiveTime::MIN),
                shape: MessageShape::Unified,
                topic: topics.unified.clone(),
                endpoint: Endpoint::DailySummary,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Published(Ack),
    FetchFailed(FetchErrorKind),
    PublishFailed(PublishErrorKind),
}

/// Fetch, project and publish once. Every failure is logged here and
/// reported as an outcome; nothing propagates to the scheduler.
pub async fn run_job<S, P>(spec: &JobSpec, station: &S, publisher: &P) -> JobOutcome
where
    S: StationSource + ?Sized,
    P: MessagePublisher + ?Sized,
{
    let reading = match station.fetch(spec.endpoint).await {
        Ok(reading) => reading,
        Err(e) => {
            warn!(job = spec.name, step = "fetch", error = %e, "station fetch failed");
            return JobOutcome::FetchFailed(e.kind());
        }
    };

    let message = project(&reading, spec.shape);

    match publisher.publish(&message, &spec.topic).await {
        Ok(ack) => {
            trace!(job = spec.name, topic = %spec.topic, offset = ack.offset, "job complete");
            JobOutcome::Published(ack)
        }
        Err(e) => {
            let step = match e.kind() {
                PublishErrorKind::Encode => "encode",
                PublishErrorKind::BrokerWrite => "publish",
            };
            warn!(job = spec.name, topic = %spec.topic, step, error = %e, "publish failed");
            JobOutcome::PublishFailed(e.kind())
        }
    }
}

/// Bind each job to `scheduler`, sharing one station client and one
/// publisher across all of them.
pub fn register_jobs(
    mut scheduler: Scheduler,
    specs: Vec<JobSpec>,
    station: Arc<dyn StationSource>,
    publisher: Arc<dyn MessagePublisher>,
) -> Scheduler {
    for spec in specs {
        let spec = Arc::new(spec);
        let (name, cadence) = (spec.name, spec.cadence);
        let station = station.clone();
        let publisher = publisher.clone();
        scheduler = scheduler.job(name, cadence, move || {
            let spec = spec.clone();
            let station = station.clone();
            let publisher = publisher.clone();
            async move {
                run_job(&spec, station.as_ref(), publisher.as_ref()).await;
            }
        });
    }
    scheduler
}
