//! services/notifier/src/scheduler.rs
//!
//! Runs notification passes: on demand, and once a day at a fixed Paris time
//! from a polling background task. At most one pass runs at any moment.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Europe::Paris;
use compliance_core::{NotificationPipeline, PassReport};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Current wall-clock time in Europe/Paris.
pub fn paris_now() -> NaiveDateTime {
    Utc::now().with_timezone(&Paris).naive_local()
}

/// Current calendar date in Europe/Paris; the evaluation date of a pass.
pub fn paris_today() -> NaiveDate {
    paris_now().date()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("A notification pass is already running")]
    AlreadyRunning,
    #[error("The notification pass task failed: {0}")]
    Failed(String),
}

/// What started a pass, for the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled => f.write_str("scheduled"),
            Trigger::Manual => f.write_str("manual"),
        }
    }
}

//=========================================================================================
// PassRunner
//=========================================================================================

/// Owns the pipeline and the "already running" flag shared by all triggers.
pub struct PassRunner {
    pipeline: Arc<NotificationPipeline>,
    running: Arc<AtomicBool>,
}

/// Clears the running flag when the pass ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PassRunner {
    pub fn new(pipeline: Arc<NotificationPipeline>) -> Self {
        Self {
            pipeline,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs a pass for today's Paris date.
    pub async fn run_now(&self, trigger: Trigger) -> Result<PassReport, TriggerError> {
        self.run_on(paris_today(), trigger).await
    }

    /// Runs a pass with an explicit evaluation date, held constant for the
    /// whole pass.
    ///
    /// The pass runs on its own task: dropping the returned future (a client
    /// hanging up, for instance) does not stop it halfway through delivery.
    pub async fn run_on(
        &self,
        today: NaiveDate,
        trigger: Trigger,
    ) -> Result<PassReport, TriggerError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(%trigger, "Notification pass already in progress; skipping this trigger");
            return Err(TriggerError::AlreadyRunning);
        }
        let guard = RunningGuard(self.running.clone());
        let pipeline = self.pipeline.clone();

        let run_id = Uuid::new_v4();
        let span = info_span!("notification_pass", %run_id, %today, %trigger);
        let pass = tokio::spawn(
            async move {
                let _guard = guard;
                info!("Starting notification pass");
                let report = pipeline.run_pass(today).await;
                info!("{}", report.summary());
                report
            }
            .instrument(span),
        );

        pass.await.map_err(|e| TriggerError::Failed(e.to_string()))
    }
}

//=========================================================================================
// Daily Schedule
//=========================================================================================

/// Decides when the daily pass is due: the first poll at or after `at`
/// on a Paris day that has not had its scheduled run yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    last_run: Option<NaiveDate>,
}

impl DailySchedule {
    /// A schedule created after today's run time waits for tomorrow.
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        let last_run = (now.time() >= at).then(|| now.date());
        Self { at, last_run }
    }

    /// True once per day; marks the day as done when it fires.
    pub fn due(&mut self, now: NaiveDateTime) -> bool {
        let today = now.date();
        if now.time() >= self.at && self.last_run != Some(today) {
            self.last_run = Some(today);
            true
        } else {
            false
        }
    }
}

/// Spawns the polling loop as a background tokio task. It stops when
/// `shutdown` is cancelled.
pub fn spawn_daily_scheduler(
    runner: Arc<PassRunner>,
    at: NaiveTime,
    poll: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Scheduler started (daily pass at {} Europe/Paris, check every {}s)",
            at.format("%H:%M"),
            poll.as_secs()
        );
        let mut schedule = DailySchedule::new(at, paris_now());
        let mut interval = tokio::time::interval(poll);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopped");
                    break;
                }
                _ = interval.tick() => {}
            }

            if schedule.due(paris_now()) {
                if let Err(e) = runner.run_now(Trigger::Scheduled).await {
                    warn!("Scheduled notification pass skipped: {}", e);
                }
            }
        }
    })
}
