//! Tournament lifecycle controller.
//!
//! Every operation loads the tournament, checks the transition table, and
//! writes the new status with a compare-and-set. Action log entries, stats
//! and rankings are secondary: their failures are collected in the returned
//! [`Outcome`] instead of failing the call.

mod payments;
mod players;
mod queries;
mod registration;
mod results;
mod start;
pub mod transitions;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use infra::ledger::StatusUpdate;
use infra::models::TournamentRow;
use infra::LedgerStore;

use crate::action_log::ActionLog;
use crate::config::EngineConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::payments::PaymentLedger;
use crate::points::PointStructureResolver;
use crate::seating::{SeatLayout, SeatingEngine};

pub use payments::ConfirmReport;
pub use queries::{Standing, TournamentStats};
pub use registration::NoShowReport;
pub use results::{CreditedPlayer, FinalizeOptions, FinalizeReport, FinishReport, PointAdjustment};
pub use start::StartReport;
pub use transitions::Operation;

#[derive(Clone)]
pub struct LifecycleController {
    ledger: Arc<dyn LedgerStore>,
    config: Arc<EngineConfig>,
    seating: SeatingEngine,
    payments: PaymentLedger,
    points: PointStructureResolver,
    log: ActionLog,
}

impl LifecycleController {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        let layout = SeatLayout {
            seats_per_table: config.seats_per_table,
            max_tables: config.max_tables,
        };
        let log = ActionLog::new(ledger.clone());

        Self {
            seating: SeatingEngine::new(ledger.clone(), layout),
            payments: PaymentLedger::new(ledger.clone(), log.clone()),
            points: PointStructureResolver::new(ledger.clone()),
            log,
            config: Arc::new(config),
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn seating(&self) -> &SeatingEngine {
        &self.seating
    }

    pub fn payments(&self) -> &PaymentLedger {
        &self.payments
    }

    pub fn points(&self) -> &PointStructureResolver {
        &self.points
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.log
    }

    async fn load(&self, tournament_id: Uuid) -> LifecycleResult<TournamentRow> {
        self.ledger
            .get_tournament(tournament_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("tournament", tournament_id))
    }

    /// Load the tournament and check `operation` is allowed in its status.
    async fn load_for(
        &self,
        tournament_id: Uuid,
        operation: Operation,
    ) -> LifecycleResult<TournamentRow> {
        let tournament = self.load(tournament_id).await?;
        transitions::check(tournament.status, operation)?;
        Ok(tournament)
    }

    /// Compare-and-set the status `operation` leads to from `tournament`'s
    /// current one.
    async fn advance(
        &self,
        tournament: &TournamentRow,
        operation: Operation,
        mut update: StatusUpdate,
    ) -> LifecycleResult<TournamentRow> {
        update.status = transitions::check(tournament.status, operation)?;

        match self
            .ledger
            .transition_tournament(tournament.id, tournament.status, &update)
            .await?
        {
            Some(updated) => Ok(updated),
            None => Err(self.lost_race(tournament.id, operation).await),
        }
    }

    /// Error for a compare-and-set that found the status already changed.
    async fn lost_race(&self, tournament_id: Uuid, operation: Operation) -> LifecycleError {
        match self.load(tournament_id).await {
            Ok(current) => {
                debug!(
                    "Lost race on {} for tournament {}: now {}",
                    operation,
                    tournament_id,
                    current.status.as_str()
                );
                LifecycleError::InvalidTransition {
                    status: current.status,
                    operation,
                }
            }
            Err(e) => e,
        }
    }
}
