pub mod health;
pub mod pipeline;
pub mod scheduler;

pub use health::{HealthMonitor, HealthReport, HealthStatus};
pub use pipeline::{LearningPipeline, PipelineError, PipelineRunner, RunReport, RunSettings};
pub use scheduler::{next_run_after, triggers, ScheduleInfo, Scheduler, SchedulerHandle, Trigger};

pub mod prelude {
    pub use super::health::{HealthMonitor, HealthReport, HealthStatus};
    pub use super::pipeline::{LearningPipeline, PipelineError, PipelineRunner, RunReport};
    pub use super::scheduler::{Scheduler, SchedulerHandle};
}
