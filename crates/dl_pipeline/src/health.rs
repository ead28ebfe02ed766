use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
const STALE_AFTER_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub issues: Vec<String>,
}

/// Outcome history of scheduled runs. Kept in memory only.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    last_success: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            last_success: None,
            consecutive_failures: 0,
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
        }
    }

    pub fn with_max_failures(mut self, max_consecutive_failures: u32) -> Self {
        self.max_consecutive_failures = max_consecutive_failures.max(1);
        self
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self) {
        self.record_success_at(Utc::now());
    }

    pub fn record_success_at(&mut self, at: DateTime<Utc>) {
        self.last_success = Some(at);
        self.consecutive_failures = 0;
        info!("health: successful run recorded");
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        warn!(consecutive_failures = self.consecutive_failures, "health: failure recorded");
        if self.is_alerting() {
            error!(
                consecutive_failures = self.consecutive_failures,
                "ALERT: repeated scheduled run failures"
            );
        }
    }

    pub fn is_alerting(&self) -> bool {
        self.consecutive_failures >= self.max_consecutive_failures
    }

    pub fn check(&self) -> HealthReport {
        self.check_at(Utc::now())
    }

    /// Stale and failing are independent; critical wins the status when
    /// both hold, and both issues are listed.
    pub fn check_at(&self, now: DateTime<Utc>) -> HealthReport {
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();

        if let Some(last) = self.last_success {
            let since = now - last;
            if since > Duration::hours(STALE_AFTER_HOURS) {
                status = HealthStatus::Warning;
                issues.push(format!(
                    "no successful run in {:.1} hours",
                    since.num_seconds() as f64 / 3600.0
                ));
            }
        }

        if self.is_alerting() {
            status = HealthStatus::Critical;
            issues.push(format!("{} consecutive failures", self.consecutive_failures));
        }

        HealthReport {
            status,
            last_success: self.last_success,
            consecutive_failures: self.consecutive_failures,
            issues,
        }
    }
}
