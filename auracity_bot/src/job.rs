use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use poise::async_trait;
use poise::serenity_prelude as serenity;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug_span, event, Instrument, Level};

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

use crate::queue::MessageQueue;
use crate::status::StatusPoller;

pub(crate) type JobResult = anyhow::Result<()>;

const SECONDS_PER_DAY: u64 = 86_400;

/// When a job wants to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every night at local midnight.
    Daily,
    /// On a fixed interval, starting right away. Missed ticks are skipped.
    Every(Duration),
}

#[async_trait]
pub trait Job<A = JobArgs>: Send + Sync {
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    /// Daily jobs normally wait for the first midnight, this runs them once when the loop starts.
    fn run_at_startup(&self) -> bool {
        false
    }

    async fn run(&self, args: &A) -> JobResult;
}

/// Everything a background job gets to work with.
pub struct JobArgs {
    pub db_pool: SqlitePool,
    pub config: BotConfig,
    pub discord: serenity::Context,
    pub queue: MessageQueue,
    pub status: Arc<StatusPoller>,
}

/// Start one independent loop per job.
///
/// Loops never stop on their own, a failing run is logged and the job waits for its next turn.
pub(crate) fn job_scheduler<A>(jobs: Vec<Box<dyn Job<A>>>, args: Arc<A>) -> Vec<JoinHandle<()>>
    where A: Send + Sync + 'static
{
    if jobs.is_empty() {
        event!(Level::INFO, "Job queue is empty. Skipping...");
        return Vec::new();
    }

    event!(Level::INFO, "Starting {} background jobs", jobs.len());

    jobs.into_iter()
        .map(|job| {
            let span = debug_span!("auracity.jobs", job = job.name());
            tokio::spawn(job_loop(job, args.clone()).instrument(span))
        })
        .collect()
}

async fn job_loop<A>(job: Box<dyn Job<A>>, args: Arc<A>)
    where A: Send + Sync + 'static
{
    match job.schedule() {
        Schedule::Daily => {
            if job.run_at_startup() {
                run_once(job.as_ref(), &args).await;
            }

            loop {
                let wait = until_next_midnight(&Local::now());
                event!(Level::DEBUG, "Waiting for the next run of {} in: {}", job.name(), describe_duration(wait));

                tokio::time::sleep(wait).await;
                run_once(job.as_ref(), &args).await;
            }
        }
        Schedule::Every(period) => {
            // a zero period would make the interval panic
            let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                run_once(job.as_ref(), &args).await;
            }
        }
    }
}

async fn run_once<A>(job: &dyn Job<A>, args: &A) {
    match job.run(args).await {
        Ok(()) => event!(Level::DEBUG, "Job {} completed successfully", job.name()),
        Err(e) => event!(Level::ERROR, "Encountered an error during background job {}: {:?}", job.name(), e),
    }
}

/// Time left until the next local midnight. Exactly at midnight this is a full day.
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let full_day = Duration::from_secs(SECONDS_PER_DAY);

    let next_midnight = now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest());

    match next_midnight {
        Some(midnight) => (midnight - now.clone()).to_std().unwrap_or(full_day),
        // the day has no midnight, e.g. a DST switch at 00:00
        None => full_day,
    }
}

/// Human readable duration, e.g. `1 day, 2 hours, 5 seconds`.
pub fn describe_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / SECONDS_PER_DAY;
    let hours = (total % SECONDS_PER_DAY) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(4);
    for (value, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        if value > 0 {
            parts.push(plural(value, unit));
        }
    }

    if seconds > 0 || parts.is_empty() {
        parts.push(plural(seconds, "second"));
    }

    parts.join(", ")
}

fn plural(value: u64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}
