use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use infra::models::{TournamentRow, TournamentStatus};

use super::{Sweep, SweepReport};
use crate::action_log::Actor;
use crate::error::{LifecycleError, LifecycleResult, Outcome};
use crate::lifecycle::LifecycleController;

const OPEN_REGISTRATION_LEAD: i64 = 7 * 24 * 60;
const CHECK_IN_LEAD: i64 = 60;
const NO_SHOW_LEAD: i64 = 10;

/// Auto-open tournaments that start within a week and have not started yet.
pub fn should_open_registration(t: &TournamentRow, now: DateTime<Utc>) -> bool {
    t.status == TournamentStatus::Upcoming
        && t.auto_open_registration
        && t.scheduled_at > now
        && t.scheduled_at <= now + Duration::minutes(OPEN_REGISTRATION_LEAD)
}

pub fn should_start_check_in(t: &TournamentRow, now: DateTime<Utc>) -> bool {
    t.status == TournamentStatus::RegistrationOpen
        && t.scheduled_at <= now + Duration::minutes(CHECK_IN_LEAD)
}

pub fn should_exclude_no_shows(t: &TournamentRow, now: DateTime<Utc>) -> bool {
    t.status == TournamentStatus::CheckIn
        && t.auto_exclude_no_show
        && t.scheduled_at <= now + Duration::minutes(NO_SHOW_LEAD)
}

pub fn should_close_late_registration(t: &TournamentRow, now: DateTime<Utc>) -> bool {
    t.status == TournamentStatus::LateRegistration
        && t.auto_close_registration
        && t.late_registration_ends_at.is_some_and(|ends| ends <= now)
}

pub fn should_archive(t: &TournamentRow, now: DateTime<Utc>, after: Duration) -> bool {
    t.status == TournamentStatus::Completed
        && t.finished_at.is_some_and(|finished| finished < now - after)
}

/// Fold one tournament's result into the report. A lost compare-and-set is
/// neither applied nor failed.
fn tally<T>(
    report: &mut SweepReport,
    sweep: &str,
    tournament_id: Uuid,
    result: LifecycleResult<Outcome<T>>,
) {
    match result {
        Ok(_) => report.applied += 1,
        Err(LifecycleError::InvalidTransition { status, .. }) => {
            debug!(
                "{} sweep skipped tournament {}: already {}",
                sweep,
                tournament_id,
                status.as_str()
            );
        }
        Err(e) => {
            report.failed += 1;
            warn!("{} sweep failed for tournament {}: {}", sweep, tournament_id, e);
        }
    }
}

async fn matching(
    controller: &LifecycleController,
    status: TournamentStatus,
    predicate: impl Fn(&TournamentRow) -> bool,
) -> LifecycleResult<Vec<TournamentRow>> {
    Ok(controller
        .ledger()
        .list_tournaments_by_status(&[status])
        .await?
        .into_iter()
        .filter(|t| predicate(t))
        .collect())
}

pub struct OpenRegistrationSweep {
    controller: LifecycleController,
}

impl OpenRegistrationSweep {
    pub fn new(controller: LifecycleController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Sweep for OpenRegistrationSweep {
    fn name(&self) -> &'static str {
        "open_registration"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let due = matching(&self.controller, TournamentStatus::Upcoming, |t| {
            should_open_registration(t, now)
        })
        .await?;

        let mut report = SweepReport {
            matched: due.len(),
            ..Default::default()
        };
        for t in due {
            let result = self.controller.open_registration(t.id, Actor::System).await;
            tally(&mut report, self.name(), t.id, result);
        }
        Ok(report)
    }
}

pub struct CheckInSweep {
    controller: LifecycleController,
}

impl CheckInSweep {
    pub fn new(controller: LifecycleController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Sweep for CheckInSweep {
    fn name(&self) -> &'static str {
        "start_check_in"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let due = matching(&self.controller, TournamentStatus::RegistrationOpen, |t| {
            should_start_check_in(t, now)
        })
        .await?;

        let mut report = SweepReport {
            matched: due.len(),
            ..Default::default()
        };
        for t in due {
            let result = self.controller.open_check_in(t.id, Actor::System).await;
            tally(&mut report, self.name(), t.id, result);
        }
        Ok(report)
    }
}

pub struct NoShowSweep {
    controller: LifecycleController,
}

impl NoShowSweep {
    pub fn new(controller: LifecycleController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Sweep for NoShowSweep {
    fn name(&self) -> &'static str {
        "exclude_no_shows"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let due = matching(&self.controller, TournamentStatus::CheckIn, |t| {
            should_exclude_no_shows(t, now)
        })
        .await?;

        let mut report = SweepReport {
            matched: due.len(),
            ..Default::default()
        };
        for t in due {
            let result = self.controller.exclude_no_shows(t.id, Actor::System).await;
            tally(&mut report, self.name(), t.id, result);
        }
        Ok(report)
    }
}

pub struct LateRegistrationSweep {
    controller: LifecycleController,
}

impl LateRegistrationSweep {
    pub fn new(controller: LifecycleController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Sweep for LateRegistrationSweep {
    fn name(&self) -> &'static str {
        "close_late_registration"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let due = matching(&self.controller, TournamentStatus::LateRegistration, |t| {
            should_close_late_registration(t, now)
        })
        .await?;

        let mut report = SweepReport {
            matched: due.len(),
            ..Default::default()
        };
        for t in due {
            let result = self
                .controller
                .close_late_registration(t.id, Actor::System)
                .await;
            tally(&mut report, self.name(), t.id, result);
        }
        Ok(report)
    }
}

pub struct ArchiveSweep {
    controller: LifecycleController,
    after: Duration,
}

impl ArchiveSweep {
    pub fn new(controller: LifecycleController, after_days: i64) -> Self {
        Self {
            controller,
            after: Duration::days(after_days),
        }
    }
}

#[async_trait]
impl Sweep for ArchiveSweep {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let after = self.after;
        let due = matching(&self.controller, TournamentStatus::Completed, |t| {
            should_archive(t, now, after)
        })
        .await?;

        let mut report = SweepReport {
            matched: due.len(),
            ..Default::default()
        };
        for t in due {
            let result = self.controller.archive(t.id, Actor::System).await;
            tally(&mut report, self.name(), t.id, result);
        }
        Ok(report)
    }
}

pub struct PurgeActionLogSweep {
    controller: LifecycleController,
    retention: Months,
}

impl PurgeActionLogSweep {
    pub fn new(controller: LifecycleController, retention_months: u32) -> Self {
        Self {
            controller,
            retention: Months::new(retention_months),
        }
    }
}

#[async_trait]
impl Sweep for PurgeActionLogSweep {
    fn name(&self) -> &'static str {
        "purge_action_log"
    }

    async fn run_once(&mut self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let cutoff = now.checked_sub_months(self.retention).unwrap_or(now);
        let purged = self.controller.action_log().purge_older_than(cutoff).await? as usize;

        Ok(SweepReport {
            matched: purged,
            applied: purged,
            failed: 0,
        })
    }
}

/// Keeps `prize_pool_cents` equal to the sum of confirmed payments.
pub struct PrizePoolSweep {
    controller: LifecycleController,
}

impl PrizePoolSweep {
    pub fn new(controller: LifecycleController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Sweep for PrizePoolSweep {
    fn name(&self) -> &'static str {
        "prize_pool"
    }

    async fn run_once(&mut self, _now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        let open = self
            .controller
            .ledger()
            .list_tournaments_by_status(&[
                TournamentStatus::Upcoming,
                TournamentStatus::RegistrationOpen,
                TournamentStatus::CheckIn,
                TournamentStatus::Finalizing,
                TournamentStatus::Started,
                TournamentStatus::LateRegistration,
                TournamentStatus::InProgress,
                TournamentStatus::Finished,
            ])
            .await?;

        let mut report = SweepReport {
            matched: open.len(),
            ..Default::default()
        };
        for t in open {
            match self.controller.refresh_prize_pool(t.id).await {
                Ok(total) if total != t.prize_pool_cents => report.applied += 1,
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!("prize_pool sweep failed for tournament {}: {}", t.id, e);
                }
            }
        }
        Ok(report)
    }
}
