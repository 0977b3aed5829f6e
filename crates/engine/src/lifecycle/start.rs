use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use infra::ledger::{SeatPlacement, StatusUpdate};
use infra::models::{RegistrationStatus, TournamentRow, TournamentStatus};

use super::{LifecycleController, Operation};
use crate::action_log::{ActionType, Actor};
use crate::error::{LifecycleError, LifecycleResult, Outcome};
use crate::seating::shuffle_players;

#[derive(Debug)]
pub struct StartReport {
    pub tournament: TournamentRow,
    pub seats: Vec<SeatPlacement>,
}

impl StartReport {
    pub fn tables_used(&self) -> usize {
        self.seats
            .iter()
            .map(|s| s.table_number)
            .max()
            .unwrap_or(0) as usize
    }
}

impl LifecycleController {
    /// Shuffle the paid players onto tables and start the tournament.
    ///
    /// Status, seats and `playing` registrations are written together; a
    /// concurrent start loses the compare-and-set and writes nothing.
    pub async fn start(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<StartReport>> {
        let tournament = self.load_for(tournament_id, Operation::Start).await?;

        let mut players: Vec<Uuid> = self
            .ledger
            .list_registrations(tournament_id)
            .await?
            .into_iter()
            .filter(|r| r.status == RegistrationStatus::Paid)
            .map(|r| r.user_id)
            .collect();

        if players.is_empty() {
            return Err(LifecycleError::NoPaidPlayers);
        }

        shuffle_players(&mut players);
        let seats = self.seating.layout().initial_seats(&players)?;

        let Some(started) = self
            .ledger
            .apply_start(tournament_id, tournament.status, &seats)
            .await?
        else {
            return Err(self.lost_race(tournament_id, Operation::Start).await);
        };

        let report = StartReport {
            tournament: started,
            seats,
        };
        info!(
            "Started tournament {} with {} players on {} tables",
            tournament_id,
            report.seats.len(),
            report.tables_used()
        );

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::StartTournament,
                None,
                json!({
                    "players": report.seats.len(),
                    "tables": report.tables_used(),
                }),
            )
            .await;

        Ok(Outcome::new(report, degradations))
    }

    /// Undo a start: seats removed, `playing` back to `paid`, status back to
    /// `upcoming`.
    pub async fn cancel_tournament_start(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<TournamentRow>> {
        let tournament = self.load_for(tournament_id, Operation::CancelStart).await?;

        let Some(reverted) = self
            .ledger
            .cancel_start(tournament_id, tournament.status)
            .await?
        else {
            return Err(self.lost_race(tournament_id, Operation::CancelStart).await);
        };
        info!("Cancelled start of tournament {}", tournament_id);

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::CancelStart,
                None,
                json!({ "from": tournament.status }),
            )
            .await;

        Ok(Outcome::new(reverted, degradations))
    }

    pub async fn open_late_registration(
        &self,
        tournament_id: Uuid,
        ends_at: DateTime<Utc>,
        actor: Actor,
    ) -> LifecycleResult<Outcome<TournamentRow>> {
        if ends_at <= Utc::now() {
            return Err(LifecycleError::PreconditionFailed(
                "late registration must end in the future".to_string(),
            ));
        }

        let tournament = self.load(tournament_id).await?;
        let update = StatusUpdate {
            late_registration_ends_at: Some(ends_at),
            ..StatusUpdate::to(TournamentStatus::LateRegistration)
        };
        let updated = self
            .advance(&tournament, Operation::OpenLateRegistration, update)
            .await?;
        info!(
            "Opened late registration for tournament {} until {}",
            tournament_id, ends_at
        );

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::OpenLateRegistration,
                None,
                json!({ "ends_at": ends_at }),
            )
            .await;

        Ok(Outcome::new(updated, degradations))
    }

    pub async fn close_late_registration(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<TournamentRow>> {
        let tournament = self.load(tournament_id).await?;
        let updated = self
            .advance(
                &tournament,
                Operation::CloseLateRegistration,
                StatusUpdate::to(TournamentStatus::InProgress),
            )
            .await?;
        info!("Closed late registration for tournament {}", tournament_id);

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::CloseRegistration,
                None,
                json!({ "deadline": tournament.late_registration_ends_at }),
            )
            .await;

        Ok(Outcome::new(updated, degradations))
    }
}
