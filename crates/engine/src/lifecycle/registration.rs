use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use infra::ledger::{NewPointBand, NewRegistration, NewTournament, StatusUpdate};
use infra::models::{
    PointBandRow, RegistrationRow, RegistrationStatus, RegistrationType, TournamentRow,
    TournamentStatus,
};
use infra::LedgerError;

use super::{LifecycleController, Operation};
use crate::action_log::{ActionType, Actor};
use crate::error::{LifecycleError, LifecycleResult, Outcome};

/// Result of excluding no-shows.
#[derive(Debug)]
pub struct NoShowReport {
    pub tournament: TournamentRow,
    pub excluded: Vec<Uuid>,
}

impl LifecycleController {
    pub async fn create_tournament(&self, data: &NewTournament) -> LifecycleResult<TournamentRow> {
        if data.max_players < 1 {
            return Err(LifecycleError::PreconditionFailed(
                "max_players must be at least 1".to_string(),
            ));
        }

        let tournament = self.ledger.create_tournament(data).await?;
        info!("Created tournament {} ({})", tournament.name, tournament.id);
        Ok(tournament)
    }

    async fn count_active(&self, tournament_id: Uuid) -> LifecycleResult<usize> {
        Ok(self
            .ledger
            .list_registrations(tournament_id)
            .await?
            .iter()
            .filter(|r| r.status.holds_spot())
            .count())
    }

    /// Sign a player up. During late registration the entry is typed `late`.
    pub async fn register_player(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        registration_type: RegistrationType,
        actor: Actor,
    ) -> LifecycleResult<Outcome<RegistrationRow>> {
        let tournament = self.load_for(tournament_id, Operation::Register).await?;

        if self
            .ledger
            .get_registration(tournament_id, user_id)
            .await?
            .is_some()
        {
            return Err(LifecycleError::PreconditionFailed(format!(
                "player {} is already registered",
                user_id
            )));
        }

        if self.count_active(tournament_id).await? >= tournament.max_players as usize {
            return Err(LifecycleError::CapacityExceeded(format!(
                "tournament {} is full ({} players)",
                tournament_id, tournament.max_players
            )));
        }

        let late = tournament.status == TournamentStatus::LateRegistration;
        let registration = self
            .ledger
            .create_registration(&NewRegistration {
                tournament_id,
                user_id,
                registration_type: if late {
                    RegistrationType::Late
                } else {
                    registration_type
                },
                is_late_entry: late,
            })
            .await
            .map_err(|e| match e {
                LedgerError::Conflict(msg) => LifecycleError::PreconditionFailed(msg),
                other => other.into(),
            })?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::RegisterPlayer,
                Some(user_id),
                json!({ "registration_type": registration.registration_type, "late": late }),
            )
            .await;

        Ok(Outcome::new(registration, degradations))
    }

    /// Withdraw an entry that has not been paid yet.
    pub async fn unregister_player(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<()>> {
        self.load_for(tournament_id, Operation::Unregister).await?;

        let registration = self
            .ledger
            .get_registration(tournament_id, user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("registration for player", user_id))?;

        if registration.status != RegistrationStatus::Registered {
            return Err(LifecycleError::PreconditionFailed(format!(
                "cannot unregister a {} entry",
                registration.status.as_str()
            )));
        }

        self.ledger.delete_registration(tournament_id, user_id).await?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::UnregisterPlayer,
                Some(user_id),
                json!({}),
            )
            .await;

        Ok(Outcome::new((), degradations))
    }

    pub async fn open_registration(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<TournamentRow>> {
        let tournament = self.load(tournament_id).await?;
        let updated = self
            .advance(
                &tournament,
                Operation::OpenRegistration,
                StatusUpdate::to(TournamentStatus::RegistrationOpen),
            )
            .await?;
        info!("Opened registration for tournament {}", tournament_id);

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::OpenRegistration,
                None,
                json!({ "scheduled_at": updated.scheduled_at }),
            )
            .await;

        Ok(Outcome::new(updated, degradations))
    }

    pub async fn open_check_in(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<TournamentRow>> {
        let tournament = self.load(tournament_id).await?;
        let update = StatusUpdate {
            check_in_opened_at: Some(Utc::now()),
            ..StatusUpdate::to(TournamentStatus::CheckIn)
        };
        let updated = self
            .advance(&tournament, Operation::OpenCheckIn, update)
            .await?;
        info!("Opened check-in for tournament {}", tournament_id);

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::StartCheckIn,
                None,
                json!({}),
            )
            .await;

        Ok(Outcome::new(updated, degradations))
    }

    /// Move the tournament to `finalizing` and every still-`registered` entry
    /// to `no_show` in one write. Nothing is marked if the status changed
    /// since it was read.
    pub async fn exclude_no_shows(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<NoShowReport>> {
        let tournament = self.load_for(tournament_id, Operation::ExcludeNoShows).await?;

        let Some((updated, excluded)) = self
            .ledger
            .apply_no_show_exclusion(tournament_id, tournament.status)
            .await?
        else {
            return Err(self.lost_race(tournament_id, Operation::ExcludeNoShows).await);
        };
        info!(
            "Excluded {} no-shows from tournament {}",
            excluded.len(),
            tournament_id
        );

        let mut degradations = Vec::new();
        for registration in &excluded {
            self.log
                .record_into(
                    &mut degradations,
                    tournament_id,
                    actor,
                    ActionType::MarkNoShow,
                    Some(registration.user_id),
                    json!({}),
                )
                .await;
        }

        Ok(Outcome::new(
            NoShowReport {
                tournament: updated,
                excluded: excluded.iter().map(|r| r.user_id).collect(),
            },
            degradations,
        ))
    }

    /// Undo a no-show mark, putting the entry back to `registered`.
    pub async fn reinstate_no_show(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<RegistrationRow>> {
        let tournament = self
            .load_for(tournament_id, Operation::ReinstateNoShow)
            .await?;

        let registration = self
            .ledger
            .get_registration(tournament_id, user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("registration for player", user_id))?;

        if registration.status != RegistrationStatus::NoShow {
            return Err(LifecycleError::PreconditionFailed(format!(
                "player {} is {}, not a no-show",
                user_id,
                registration.status.as_str()
            )));
        }

        if self.count_active(tournament_id).await? >= tournament.max_players as usize {
            return Err(LifecycleError::CapacityExceeded(format!(
                "tournament {} is full ({} players)",
                tournament_id, tournament.max_players
            )));
        }

        let updated = self
            .ledger
            .update_registration_status(tournament_id, user_id, RegistrationStatus::Registered)
            .await?
            .ok_or_else(|| LifecycleError::not_found("registration for player", user_id))?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::ReinstateNoShow,
                Some(user_id),
                json!({}),
            )
            .await;

        Ok(Outcome::new(updated, degradations))
    }

    /// Validate and replace the tournament's point bands.
    pub async fn set_point_structure(
        &self,
        tournament_id: Uuid,
        bands: &[NewPointBand],
    ) -> LifecycleResult<Vec<PointBandRow>> {
        self.load_for(tournament_id, Operation::SetPointStructure)
            .await?;
        self.points.set_point_structure(tournament_id, bands).await
    }
}
