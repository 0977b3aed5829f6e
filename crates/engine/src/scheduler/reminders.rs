use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use infra::models::{RegistrationStatus, TournamentStatus};

use super::{Sweep, SweepReport};
use crate::error::LifecycleResult;
use crate::lifecycle::LifecycleController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderWindow {
    /// 23 to 24 hours before the start.
    DayBefore,
    /// 55 to 65 minutes before the start.
    HourBefore,
}

impl ReminderWindow {
    pub fn for_lead(until_start: Duration) -> Option<Self> {
        if until_start >= Duration::hours(23) && until_start <= Duration::hours(24) {
            Some(ReminderWindow::DayBefore)
        } else if until_start >= Duration::minutes(55) && until_start <= Duration::minutes(65) {
            Some(ReminderWindow::HourBefore)
        } else {
            None
        }
    }
}

/// Players to remind about one tournament.
#[derive(Debug, Clone)]
pub struct ReminderBatch {
    pub tournament_id: Uuid,
    pub tournament_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub window: ReminderWindow,
    pub recipients: Vec<Uuid>,
}

/// Where reminder batches go. Delivery itself happens outside the engine.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn deliver(
        &self,
        batch: &ReminderBatch,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes batches to the log.
pub struct LogReminderSink;

#[async_trait]
impl ReminderSink for LogReminderSink {
    async fn deliver(
        &self,
        batch: &ReminderBatch,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Reminder ({:?}) for tournament {} at {} to {} players",
            batch.window,
            batch.tournament_name,
            batch.scheduled_at,
            batch.recipients.len()
        );
        Ok(())
    }
}

/// Keeps batches in memory.
#[derive(Default)]
pub struct CollectingReminderSink {
    batches: Mutex<Vec<ReminderBatch>>,
}

impl CollectingReminderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<ReminderBatch> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl ReminderSink for CollectingReminderSink {
    async fn deliver(
        &self,
        batch: &ReminderBatch,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.batches.lock().push(batch.clone());
        Ok(())
    }
}

const PRE_START: [TournamentStatus; 4] = [
    TournamentStatus::Upcoming,
    TournamentStatus::RegistrationOpen,
    TournamentStatus::CheckIn,
    TournamentStatus::Finalizing,
];

pub struct ReminderSweep {
    controller: LifecycleController,
    sink: Arc<dyn ReminderSink>,
    sent: HashSet<(Uuid, ReminderWindow)>,
}

impl ReminderSweep {
    pub fn new(controller: LifecycleController, sink: Arc<dyn ReminderSink>) -> Self {
        Self {
            controller,
            sink,
            sent: HashSet::new(),
        }
    }
}

#[async_trait]
impl Sweep for ReminderSweep {
    fn name(&self) -> &'static str {
        "reminders"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let pending = self
            .controller
            .ledger()
            .list_tournaments_by_status(&PRE_START)
            .await?;

        // Forget tournaments that started or went away.
        let live: HashSet<Uuid> = pending.iter().map(|t| t.id).collect();
        self.sent.retain(|(id, _)| live.contains(id));

        let mut report = SweepReport::default();
        for t in pending {
            let Some(window) = ReminderWindow::for_lead(t.scheduled_at - now) else {
                continue;
            };
            if self.sent.contains(&(t.id, window)) {
                continue;
            }
            report.matched += 1;

            let recipients: Vec<Uuid> = match self.controller.ledger().list_registrations(t.id).await {
                Ok(registrations) => registrations
                    .into_iter()
                    .filter(|r| {
                        matches!(
                            r.status,
                            RegistrationStatus::Registered | RegistrationStatus::Paid
                        )
                    })
                    .map(|r| r.user_id)
                    .collect(),
                Err(e) => {
                    report.failed += 1;
                    warn!("reminders sweep failed for tournament {}: {}", t.id, e);
                    continue;
                }
            };

            if !recipients.is_empty() {
                let batch = ReminderBatch {
                    tournament_id: t.id,
                    tournament_name: t.name.clone(),
                    scheduled_at: t.scheduled_at,
                    window,
                    recipients,
                };
                if let Err(e) = self.sink.deliver(&batch).await {
                    report.failed += 1;
                    warn!("Failed to hand off reminders for tournament {}: {}", t.id, e);
                    continue;
                }
                report.applied += 1;
            }

            self.sent.insert((t.id, window));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_windows() {
        assert_eq!(
            ReminderWindow::for_lead(Duration::minutes(23 * 60 + 30)),
            Some(ReminderWindow::DayBefore)
        );
        assert_eq!(
            ReminderWindow::for_lead(Duration::minutes(60)),
            Some(ReminderWindow::HourBefore)
        );
        assert_eq!(ReminderWindow::for_lead(Duration::minutes(70)), None);
        assert_eq!(ReminderWindow::for_lead(Duration::hours(12)), None);
        assert_eq!(ReminderWindow::for_lead(Duration::minutes(-5)), None);
    }
}
