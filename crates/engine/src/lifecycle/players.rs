use std::collections::HashSet;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use infra::ledger::{EliminationUpdate, SeatPlacement};
use infra::models::{RegistrationStatus, SeatAssignmentRow};

use super::{LifecycleController, Operation};
use crate::action_log::{ActionType, Actor};
use crate::error::{LifecycleError, LifecycleResult, Outcome};

impl LifecycleController {
    /// Seat a paid player into a running tournament as a late entry.
    ///
    /// Safe to repeat: an already seated player keeps their seat.
    pub async fn seat_player(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<SeatAssignmentRow>> {
        self.load_for(tournament_id, Operation::SeatPlayer).await?;

        let registration = self
            .ledger
            .get_registration(tournament_id, user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("registration for player", user_id))?;

        if !matches!(
            registration.status,
            RegistrationStatus::Paid | RegistrationStatus::Playing
        ) {
            return Err(LifecycleError::PreconditionFailed(format!(
                "player {} is {}, not paid",
                user_id,
                registration.status.as_str()
            )));
        }

        let seat = self.seat_late_entry(tournament_id, user_id).await?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::SeatPlayer,
                Some(user_id),
                json!({ "table": seat.table_number, "seat": seat.seat_number }),
            )
            .await;

        Ok(Outcome::new(seat, degradations))
    }

    /// Flag late entry, seat, mark `playing`. Every step is an idempotent
    /// write so a failed run can simply be repeated. A player who already
    /// holds a seat keeps it and is not flagged.
    pub(super) async fn seat_late_entry(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LifecycleResult<SeatAssignmentRow> {
        let existing = self
            .ledger
            .get_seat_assignment(tournament_id, user_id)
            .await?;
        if existing.is_none() {
            self.ledger.set_late_entry(tournament_id, user_id).await?;
        }

        let seat = match existing {
            Some(seat) => seat,
            None => {
                self.seating
                    .assign_seat_to_player(tournament_id, user_id)
                    .await?
            }
        };
        self.ledger
            .update_registration_status(tournament_id, user_id, RegistrationStatus::Playing)
            .await?;
        Ok(seat)
    }

    async fn seat_of(&self, tournament_id: Uuid, user_id: Uuid) -> LifecycleResult<SeatAssignmentRow> {
        self.ledger
            .get_seat_assignment(tournament_id, user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("seat assignment for player", user_id))
    }

    /// Record a bust-out. A repeated call overwrites the previous place and
    /// points.
    pub async fn eliminate_player(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        finish_place: i32,
        points_earned: i32,
        actor: Actor,
    ) -> LifecycleResult<Outcome<SeatAssignmentRow>> {
        self.load_for(tournament_id, Operation::EliminatePlayer)
            .await?;

        if finish_place < 1 {
            return Err(LifecycleError::PreconditionFailed(format!(
                "finish place {} must be at least 1",
                finish_place
            )));
        }
        if points_earned < 0 {
            return Err(LifecycleError::PreconditionFailed(format!(
                "points earned {} must not be negative",
                points_earned
            )));
        }

        self.seat_of(tournament_id, user_id).await?;
        let seat = self
            .ledger
            .update_elimination(
                tournament_id,
                user_id,
                &EliminationUpdate {
                    is_eliminated: true,
                    finish_place: Some(finish_place),
                    points_earned,
                },
            )
            .await?
            .ok_or_else(|| LifecycleError::not_found("seat assignment for player", user_id))?;
        info!(
            "Eliminated player {} in place {} from tournament {}",
            user_id, finish_place, tournament_id
        );

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::EliminatePlayer,
                Some(user_id),
                json!({ "finish_place": finish_place, "points_earned": points_earned }),
            )
            .await;

        Ok(Outcome::new(seat, degradations))
    }

    /// Put an eliminated player back in play.
    pub async fn revive_player(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<SeatAssignmentRow>> {
        self.load_for(tournament_id, Operation::RevivePlayer).await?;

        let previous = self.seat_of(tournament_id, user_id).await?;
        let seat = self
            .ledger
            .update_elimination(
                tournament_id,
                user_id,
                &EliminationUpdate {
                    is_eliminated: false,
                    finish_place: None,
                    points_earned: 0,
                },
            )
            .await?
            .ok_or_else(|| LifecycleError::not_found("seat assignment for player", user_id))?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::RestorePlayer,
                Some(user_id),
                json!({ "previous_place": previous.finish_place }),
            )
            .await;

        Ok(Outcome::new(seat, degradations))
    }

    pub async fn award_bonus_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        bonus_points: i32,
        actor: Actor,
    ) -> LifecycleResult<Outcome<SeatAssignmentRow>> {
        self.load_for(tournament_id, Operation::AwardBonus).await?;

        let seat = self
            .ledger
            .set_bonus_points(tournament_id, user_id, bonus_points)
            .await?
            .ok_or_else(|| LifecycleError::not_found("seat assignment for player", user_id))?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::AwardBonus,
                Some(user_id),
                json!({ "bonus_points": bonus_points }),
            )
            .await;

        Ok(Outcome::new(seat, degradations))
    }

    /// Overwrite (table, seat) for the listed players in one write. Targets
    /// are not checked against each other.
    pub async fn rebalance_tables(
        &self,
        tournament_id: Uuid,
        moves: &[SeatPlacement],
        actor: Actor,
    ) -> LifecycleResult<Outcome<Vec<SeatAssignmentRow>>> {
        self.load_for(tournament_id, Operation::RebalanceTables)
            .await?;

        let layout = self.seating.layout();
        if let Some(bad) = moves
            .iter()
            .find(|m| !layout.contains(m.table_number, m.seat_number))
        {
            return Err(LifecycleError::PreconditionFailed(format!(
                "table {} seat {} is outside the room",
                bad.table_number, bad.seat_number
            )));
        }

        let seated: HashSet<Uuid> = self
            .ledger
            .list_seat_assignments(tournament_id)
            .await?
            .into_iter()
            .map(|s| s.user_id)
            .collect();
        if let Some(missing) = moves.iter().find(|m| !seated.contains(&m.user_id)) {
            return Err(LifecycleError::not_found(
                "seat assignment for player",
                missing.user_id,
            ));
        }

        let moved = self.ledger.apply_seat_moves(tournament_id, moves).await?;
        info!(
            "Rebalanced {} players in tournament {}",
            moved.len(),
            tournament_id
        );

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::RebalanceTables,
                None,
                json!({
                    "moves": moves
                        .iter()
                        .map(|m| json!({
                            "user_id": m.user_id,
                            "table": m.table_number,
                            "seat": m.seat_number,
                        }))
                        .collect::<Vec<_>>(),
                }),
            )
            .await;

        Ok(Outcome::new(moved, degradations))
    }
}
