//! Timer and dispatch for relay jobs.
//!
//! Each job gets its own driver task. A firing spawns the job body as a
//! separate task unless the previous run of the same job is still in
//! flight, in which case the firing is dropped. Distinct jobs never wait on
//! each other.

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed period, first firing immediately.
    Every(Duration),
    /// Once a day at the given local wall-clock time.
    DailyAt(NaiveTime),
}

/// First occurrence of the wall-clock time `at` strictly after `after`, in
/// `after`'s time zone. When `at` falls into a DST gap the firing moves one
/// hour later.
pub fn next_daily<Tz: TimeZone>(at: NaiveTime, after: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = after.timezone();
    let mut date = after.date_naive();
    loop {
        let local = date.and_time(at);
        let candidate = tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| {
                tz.from_local_datetime(&(local + chrono::Duration::hours(1)))
                    .earliest()
            });
        if let Some(candidate) = candidate {
            if candidate > *after {
                return candidate;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return after.clone(),
        };
    }
}

/// Call `fire` at every daily occurrence of `at`, reading the wall clock
/// through `now`. Each wait is measured against a fresh clock reading, so a
/// late wake-up never fires the same occurrence twice.
async fn drive_daily<Tz, N, F>(name: &'static str, at: NaiveTime, now: N, mut fire: F)
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
    N: Fn() -> DateTime<Tz>,
    F: FnMut(&DateTime<Tz>),
{
    let mut after = now();
    loop {
        let next = next_daily(at, &after);
        debug!(job = name, next = %next, "next daily run");
        let wait = (next.clone() - now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        fire(&next);
        after = next;
    }
}

/// Set while a job run is in flight.
#[derive(Debug, Clone, Default)]
pub struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit(self.0.clone()))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases its [`RunGuard`] on drop, including when the job panics.
#[derive(Debug)]
pub struct RunPermit(Arc<AtomicBool>);

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct JobStats {
    fired: AtomicU64,
    skipped: AtomicU64,
    completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobStatsSnapshot {
    pub fired: u64,
    pub skipped: u64,
    pub completed: u64,
}

impl JobStats {
    pub fn snapshot(&self) -> JobStatsSnapshot {
        JobStatsSnapshot {
            fired: self.fired.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }
}

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type JobTask = Arc<dyn Fn() -> JobFuture + Send + Sync>;

#[derive(Clone)]
struct ScheduledJob {
    name: &'static str,
    cadence: Cadence,
    task: JobTask,
    guard: RunGuard,
    stats: Arc<JobStats>,
}

impl ScheduledJob {
    fn dispatch(&self) {
        let Some(permit) = self.guard.try_acquire() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(job = self.name, "previous run still in progress; skipping");
            return;
        };
        self.stats.fired.fetch_add(1, Ordering::Relaxed);
        let run = (self.task)();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            let _permit = permit;
            run.await;
            stats.completed.fetch_add(1, Ordering::Relaxed);
        });
    }

    async fn drive(self) {
        match self.cadence {
            Cadence::Every(period) => {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    self.dispatch();
                }
            }
            Cadence::DailyAt(at) => {
                drive_daily(self.name, at, Local::now, |_| self.dispatch()).await;
            }
        }
    }
}

pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    shutdown_grace: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long [`Scheduler::run`] waits for in-flight runs after shutdown.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Register `task` to run on `cadence`. The closure builds a fresh
    /// future for every firing.
    pub fn job<F, Fut>(mut self, name: &'static str, cadence: Cadence, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: JobTask = Arc::new(move || Box::pin(task()) as JobFuture);
        self.jobs.push(ScheduledJob {
            name,
            cadence,
            task,
            guard: RunGuard::default(),
            stats: Arc::new(JobStats::default()),
        });
        self
    }

    pub fn stats(&self) -> Vec<(&'static str, Arc<JobStats>)> {
        self.jobs.iter().map(|j| (j.name, j.stats.clone())).collect()
    }

    /// Drive every job until `shutdown` resolves. No job fires after that;
    /// runs already in flight get up to the shutdown grace period to finish
    /// before this returns.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let stats = self.stats();
        let guards: Vec<RunGuard> = self.jobs.iter().map(|j| j.guard.clone()).collect();
        let grace = self.shutdown_grace;
        let drivers: Vec<JoinHandle<()>> = self
            .jobs
            .into_iter()
            .map(|job| {
                info!(job = job.name, cadence = ?job.cadence, "scheduling job");
                tokio::spawn(job.drive())
            })
            .collect();

        shutdown.await;

        for driver in drivers {
            driver.abort();
        }

        let deadline = tokio::time::Instant::now() + grace;
        while guards.iter().any(RunGuard::is_running) {
            if tokio::time::Instant::now() >= deadline {
                warn!(grace = ?grace, "runs still in flight after shutdown grace; abandoning them");
                break;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
        for (name, stats) in stats {
            let s = stats.snapshot();
            info!(
                job = name,
                fired = s.fired,
                skipped = s.skipped,
                completed = s.completed,
                "job stopped"
            );
        }
    }
}
