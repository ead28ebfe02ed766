use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use dl_core::{Error, Result, ScheduleConfig};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::health::{HealthMonitor, HealthReport};
use crate::pipeline::PipelineRunner;

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const WEEKDAYS: [Weekday; 5] = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];

/// Fires at `at` local time, on `weekday` only or every day when `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub weekday: Option<Weekday>,
    pub at: NaiveTime,
}

impl Trigger {
    /// First firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>, timezone: FixedOffset) -> Option<DateTime<Utc>> {
        let local = now.with_timezone(&timezone);
        let mut date = local.date_naive();
        if local.time() >= self.at {
            date = date.succ_opt()?;
        }
        if let Some(weekday) = self.weekday {
            while date.weekday() != weekday {
                date = date.succ_opt()?;
            }
        }
        let at = date.and_time(self.at).and_local_timezone(timezone).single()?;
        Some(at.with_timezone(&Utc))
    }
}

/// One rule per weekday Monday to Friday, or a single daily rule.
pub fn triggers(config: &ScheduleConfig) -> Vec<Trigger> {
    if config.weekdays_only {
        WEEKDAYS
            .iter()
            .map(|day| Trigger {
                weekday: Some(*day),
                at: config.run_time,
            })
            .collect()
    } else {
        vec![Trigger {
            weekday: None,
            at: config.run_time,
        }]
    }
}

pub fn next_run_after(triggers: &[Trigger], timezone: FixedOffset, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    triggers
        .iter()
        .filter_map(|trigger| trigger.next_after(now, timezone))
        .min()
}

#[derive(Debug)]
struct TriggerState {
    triggers: Vec<Trigger>,
    timezone: FixedOffset,
    next_run: Option<DateTime<Utc>>,
}

impl TriggerState {
    fn new(triggers: Vec<Trigger>, timezone: FixedOffset, now: DateTime<Utc>) -> Self {
        let next_run = next_run_after(&triggers, timezone, now);
        Self {
            triggers,
            timezone,
            next_run,
        }
    }

    /// True when a run is due at `now`; moves on to the following firing.
    fn poll(&mut self, now: DateTime<Utc>) -> bool {
        match self.next_run {
            Some(at) if at <= now => {
                self.next_run = next_run_after(&self.triggers, self.timezone, now);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleInfo {
    pub enabled: bool,
    pub running: bool,
    pub run_time: NaiveTime,
    pub timezone: String,
    pub weekdays_only: bool,
    pub topics: Option<Vec<String>>,
    pub retry_attempts: u32,
    pub next_run: Option<DateTime<Utc>>,
    pub rule_count: usize,
}

/// Runs the pipeline on a calendar, retrying failed runs.
#[derive(Debug)]
pub struct Scheduler {
    config: ScheduleConfig,
    runner: Arc<dyn PipelineRunner>,
    health: Arc<Mutex<HealthMonitor>>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig, runner: Arc<dyn PipelineRunner>) -> Self {
        Self {
            config,
            runner,
            health: Arc::new(Mutex::new(HealthMonitor::new())),
            running: Arc::new(AtomicBool::new(false)),
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_health_monitor(mut self, monitor: HealthMonitor) -> Self {
        self.health = Arc::new(Mutex::new(monitor));
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn health(&self) -> HealthReport {
        self.health.lock().await.check()
    }

    /// Run now with the retry policy, as a trigger would.
    pub async fn run_with_retry(&self) -> bool {
        run_with_retry(self.runner.as_ref(), &self.config, &self.health).await
    }

    pub fn schedule_info(&self) -> ScheduleInfo {
        let rules = if self.config.enabled {
            triggers(&self.config)
        } else {
            Vec::new()
        };
        ScheduleInfo {
            enabled: self.config.enabled,
            running: self.is_running(),
            run_time: self.config.run_time,
            timezone: self.config.timezone_name.clone(),
            weekdays_only: self.config.weekdays_only,
            topics: self.config.topics.clone(),
            retry_attempts: self.config.retry_attempts,
            next_run: next_run_after(&rules, self.config.timezone, Utc::now()),
            rule_count: rules.len(),
        }
    }

    /// Spawn the polling task. Fails when scheduling is disabled or the task
    /// is already running.
    pub fn start(&self) -> Result<SchedulerHandle> {
        if !self.config.enabled {
            return Err(Error::Schedule("scheduler is disabled".to_string()));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::Schedule("scheduler is already running".to_string()));
        }

        let rules = triggers(&self.config);
        info!(
            run_time = %self.config.run_time.format("%H:%M"),
            timezone = %self.config.timezone_name,
            weekdays_only = self.config.weekdays_only,
            rules = rules.len(),
            "scheduled daily runs"
        );
        let mut state = TriggerState::new(rules, self.config.timezone, Utc::now());

        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let runner = Arc::clone(&self.runner);
        let config = self.config.clone();
        let health = Arc::clone(&self.health);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;

        let join = tokio::spawn(async move {
            info!("scheduler started");
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel_rx.recv() => {
                        info!("scheduler shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        if state.poll(Utc::now()) {
                            run_with_retry(runner.as_ref(), &config, &health).await;
                            if let Some(next) = state.next_run {
                                info!(next_run = %next, "next scheduled run");
                            }
                        }
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("scheduler stopped");
        });

        Ok(SchedulerHandle {
            cancel_tx,
            join,
            running: Arc::clone(&self.running),
        })
    }
}

pub struct SchedulerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Signal the task and wait up to five seconds for it to finish; a run
    /// still in flight after that is aborted.
    pub async fn stop(self) -> Result<()> {
        let _ = self.cancel_tx.send(());
        let abort = self.join.abort_handle();

        let result = match tokio::time::timeout(STOP_TIMEOUT, self.join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Schedule(format!("scheduler task failed: {}", e))),
            Err(_) => {
                warn!(timeout_secs = STOP_TIMEOUT.as_secs(), "scheduler did not stop in time, aborting");
                abort.abort();
                Ok(())
            }
        };
        self.running.store(false, Ordering::SeqCst);
        result
    }
}

/// Attempt a run up to `retry_attempts` times, sleeping `retry_delay`
/// between attempts. The outcome is recorded on `health` once.
async fn run_with_retry(runner: &dyn PipelineRunner, config: &ScheduleConfig, health: &Mutex<HealthMonitor>) -> bool {
    info!("starting scheduled learning feed generation");
    let attempts = config.retry_attempts.max(1);

    for attempt in 1..=attempts {
        info!(attempt, attempts, "scheduled run attempt");
        match runner.run(config.topics.as_deref()).await {
            Ok(report) => {
                if report.wrote_nothing() {
                    warn!(materials = report.materials, "scheduled run wrote no entries");
                }
                info!(entries_created = report.created.len(), "scheduled generation completed");
                health.lock().await.record_success();
                return true;
            }
            Err(e) => error!(attempt, error = %e, "attempt failed"),
        }

        if attempt < attempts {
            info!(delay_secs = config.retry_delay.as_secs(), "waiting before retry");
            tokio::time::sleep(config.retry_delay).await;
        }
    }

    error!(attempts, "all scheduled attempts failed");
    health.lock().await.record_failure();
    false
}
