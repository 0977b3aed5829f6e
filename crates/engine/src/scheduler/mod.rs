//! Time-driven automation.
//!
//! Each sweep runs in its own task on its own interval. A sweep finds the
//! tournaments its predicate matches and calls the controller as
//! [`Actor::System`](crate::action_log::Actor::System). Failures are logged
//! and picked up again on the next tick; status writes are compare-and-set,
//! so two sweeps or a sweep and an admin racing on one tournament leave a
//! single winner.

mod reminders;
mod sweeps;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval};
use tracing::{error, info};

use crate::error::LifecycleResult;
use crate::lifecycle::LifecycleController;

pub use reminders::{
    CollectingReminderSink, LogReminderSink, ReminderBatch, ReminderSink, ReminderSweep,
    ReminderWindow,
};
pub use sweeps::{
    ArchiveSweep, CheckInSweep, LateRegistrationSweep, NoShowSweep, OpenRegistrationSweep,
    PrizePoolSweep, PurgeActionLogSweep,
};

/// What one pass of a sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows the predicate selected.
    pub matched: usize,
    /// Rows the action was applied to.
    pub applied: usize,
    /// Rows whose action failed; retried next tick.
    pub failed: usize,
}

#[async_trait]
pub trait Sweep: Send {
    fn name(&self) -> &'static str;

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport>;
}

pub struct SweepService<S> {
    sweep: S,
    interval: Interval,
}

impl<S: Sweep> SweepService<S> {
    pub fn new(sweep: S, period: Duration) -> Self {
        Self {
            sweep,
            interval: interval(period),
        }
    }

    pub async fn run(&mut self) {
        info!("Starting {} sweep", self.sweep.name());

        loop {
            self.interval.tick().await;

            match self.sweep.run_once(Utc::now()).await {
                Ok(report) if report.applied > 0 || report.failed > 0 => {
                    info!(
                        "{} sweep: {} matched, {} applied, {} failed",
                        self.sweep.name(),
                        report.matched,
                        report.applied,
                        report.failed
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Error running {} sweep: {}", self.sweep.name(), e),
            }
        }
    }
}

pub fn spawn_sweep<S: Sweep + 'static>(sweep: S, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut service = SweepService::new(sweep, period);
        service.run().await;
    })
}

/// Start every sweep with the intervals from the controller's config.
pub fn spawn_scheduler(
    controller: LifecycleController,
    reminder_sink: Arc<dyn ReminderSink>,
) -> Vec<JoinHandle<()>> {
    let config = controller.config().clone();
    let periods = &config.sweeps;

    vec![
        spawn_sweep(
            OpenRegistrationSweep::new(controller.clone()),
            periods.open_registration,
        ),
        spawn_sweep(CheckInSweep::new(controller.clone()), periods.start_check_in),
        spawn_sweep(NoShowSweep::new(controller.clone()), periods.exclude_no_shows),
        spawn_sweep(
            LateRegistrationSweep::new(controller.clone()),
            periods.close_late_registration,
        ),
        spawn_sweep(
            ArchiveSweep::new(controller.clone(), config.archive_after_days),
            periods.archive,
        ),
        spawn_sweep(
            PurgeActionLogSweep::new(controller.clone(), config.action_log_retention_months),
            periods.purge_action_log,
        ),
        spawn_sweep(
            ReminderSweep::new(controller.clone(), reminder_sink),
            periods.reminders,
        ),
        spawn_sweep(PrizePoolSweep::new(controller), periods.prize_pool),
    ]
}
