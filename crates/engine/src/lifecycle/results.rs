use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use infra::ledger::{NewResult, StatsDelta, StatusUpdate};
use infra::models::{
    RegistrationStatus, ScoringMode, SeatAssignmentRow, TournamentResultRow, TournamentRow,
    TournamentStatus,
};

use super::{LifecycleController, Operation};
use crate::action_log::{ActionType, Actor};
use crate::error::{LifecycleError, LifecycleResult, Outcome};
use crate::points::resolve_place;

/// A player whose statistics were credited at finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditedPlayer {
    pub user_id: Uuid,
    pub finish_place: Option<i32>,
    pub points: i32,
}

#[derive(Debug)]
pub struct FinishReport {
    pub tournament: TournamentRow,
    /// Seating as it stood when the tournament finished.
    pub seating: Vec<SeatAssignmentRow>,
    pub credited: Vec<CreditedPlayer>,
    /// Paid players who never got a seat.
    pub cancelled: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PointAdjustment {
    pub user_id: Uuid,
    pub points: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    pub auto_calculate_points: bool,
    pub manual_adjustments: Vec<PointAdjustment>,
}

#[derive(Debug)]
pub struct FinalizeReport {
    pub tournament: TournamentRow,
    pub results: Vec<TournamentResultRow>,
}

impl LifecycleController {
    /// Close the tournament and credit everyone who played.
    ///
    /// The `finished` status is committed first and is never rolled back.
    /// Each player is then processed on their own: a failure is logged,
    /// collected as a degradation, and the remaining players still get
    /// credited.
    pub async fn finish_tournament(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<FinishReport>> {
        let tournament = self.load(tournament_id).await?;
        let update = StatusUpdate {
            finished_at: Some(Utc::now()),
            ..StatusUpdate::to(TournamentStatus::Finished)
        };
        let finished = self
            .advance(&tournament, Operation::Finish, update)
            .await?;
        info!("Finished tournament {}", tournament_id);

        let mut degradations = Vec::new();
        let seating = match self.ledger.list_seat_assignments(tournament_id).await {
            Ok(seating) => seating,
            Err(e) => {
                warn!("Failed to load seating of finished tournament {}: {}", tournament_id, e);
                degradations.push(LifecycleError::degraded("finish_tournament", e));
                Vec::new()
            }
        };
        let registrations = match self.ledger.list_registrations(tournament_id).await {
            Ok(registrations) => registrations,
            Err(e) => {
                warn!(
                    "Failed to load registrations of finished tournament {}: {}",
                    tournament_id, e
                );
                degradations.push(LifecycleError::degraded("finish_tournament", e));
                Vec::new()
            }
        };

        let seats: HashMap<Uuid, &SeatAssignmentRow> =
            seating.iter().map(|s| (s.user_id, s)).collect();
        let mut credited = Vec::new();
        let mut cancelled = Vec::new();

        for registration in registrations.iter().filter(|r| {
            matches!(
                r.status,
                RegistrationStatus::Paid | RegistrationStatus::Playing
            )
        }) {
            let user_id = registration.user_id;
            let step = match seats.get(&user_id) {
                None => self
                    .ledger
                    .update_registration_status(tournament_id, user_id, RegistrationStatus::Cancelled)
                    .await
                    .map(|_| cancelled.push(user_id)),
                Some(seat) => {
                    let points = match finished.scoring_mode {
                        ScoringMode::SeatPoints => seat.total_points(),
                        ScoringMode::PointBands => 0,
                    };
                    self.credit_finisher(tournament_id, seat, points)
                        .await
                        .map(|_| {
                            credited.push(CreditedPlayer {
                                user_id,
                                finish_place: seat.finish_place,
                                points,
                            })
                        })
                }
            };

            if let Err(e) = step {
                warn!(
                    "Failed to settle player {} in finished tournament {}: {}",
                    user_id, tournament_id, e
                );
                degradations.push(LifecycleError::degraded(
                    "finish_tournament",
                    format!("player {user_id}: {e}"),
                ));
            }
        }

        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::FinishTournament,
                None,
                json!({
                    "seated": seating.len(),
                    "credited": credited.len(),
                    "cancelled": cancelled.len(),
                }),
            )
            .await;

        Ok(Outcome::new(
            FinishReport {
                tournament: finished,
                seating,
                credited,
                cancelled,
            },
            degradations,
        ))
    }

    async fn credit_finisher(
        &self,
        tournament_id: Uuid,
        seat: &SeatAssignmentRow,
        points: i32,
    ) -> Result<(), infra::LedgerError> {
        self.ledger
            .update_registration_status(
                tournament_id,
                seat.user_id,
                RegistrationStatus::Participated,
            )
            .await?;
        self.ledger
            .increment_user_stats(
                seat.user_id,
                &StatsDelta {
                    tournaments_played: 1,
                    points: i64::from(points),
                    wins: i32::from(seat.finish_place == Some(1)),
                    finish_place: seat.finish_place,
                },
            )
            .await?;
        Ok(())
    }

    /// Write final results and complete the tournament. Only the first call
    /// on a finished tournament succeeds.
    ///
    /// Band results are written before the status changes, so a failure there
    /// leaves the tournament `finished` and the call can be retried. Stats,
    /// manual adjustments and the ranking recompute run after and degrade.
    pub async fn finalize_results(
        &self,
        tournament_id: Uuid,
        admin_id: Uuid,
        options: FinalizeOptions,
    ) -> LifecycleResult<Outcome<FinalizeReport>> {
        let tournament = self
            .load_for(tournament_id, Operation::FinalizeResults)
            .await?;
        let actor = Actor::Admin(admin_id);

        if options.auto_calculate_points && tournament.scoring_mode != ScoringMode::PointBands {
            return Err(LifecycleError::PreconditionFailed(format!(
                "tournament {} is not scored by point bands",
                tournament_id
            )));
        }

        let mut band_results = Vec::new();
        if options.auto_calculate_points {
            let bands = self.points.bands_for(tournament_id).await?;
            let prize_pool = self.payments.prize_pool_total(tournament_id).await?;

            for seat in self.ledger.list_seat_assignments(tournament_id).await? {
                let Some(place) = seat.finish_place else {
                    continue;
                };
                let award = resolve_place(&bands, place);
                let share = bands
                    .iter()
                    .find(|b| b.place_from <= place && place <= b.place_to)
                    .map(|b| (b.place_to - b.place_from + 1) as f64)
                    .unwrap_or(1.0);
                let prize_cents =
                    (prize_pool as f64 * award.prize_percentage / 100.0 / share).floor() as i64;

                let row = self
                    .ledger
                    .upsert_result(&NewResult {
                        tournament_id,
                        user_id: seat.user_id,
                        finish_place: Some(place),
                        points: award.points,
                        prize_cents,
                    })
                    .await?;
                band_results.push(row);
            }
        }

        let update = StatusUpdate {
            completed_at: Some(Utc::now()),
            ..StatusUpdate::to(TournamentStatus::Completed)
        };
        let completed = self
            .advance(&tournament, Operation::FinalizeResults, update)
            .await?;
        info!(
            "Finalized tournament {} with {} band results",
            tournament_id,
            band_results.len()
        );

        let mut degradations = Vec::new();
        for result in &band_results {
            let delta = StatsDelta {
                points: i64::from(result.points),
                ..Default::default()
            };
            if let Err(e) = self.ledger.increment_user_stats(result.user_id, &delta).await {
                warn!(
                    "Failed to credit {} band points to player {}: {}",
                    result.points, result.user_id, e
                );
                degradations.push(LifecycleError::degraded(
                    "finalize_results",
                    format!("player {}: {e}", result.user_id),
                ));
            }
        }

        for adjustment in &options.manual_adjustments {
            if let Err(e) = self.apply_adjustment(tournament_id, adjustment).await {
                warn!(
                    "Failed to adjust points for player {} in tournament {}: {}",
                    adjustment.user_id, tournament_id, e
                );
                degradations.push(LifecycleError::degraded(
                    "adjust_points",
                    format!("player {}: {e}", adjustment.user_id),
                ));
                continue;
            }

            self.log
                .record_into(
                    &mut degradations,
                    tournament_id,
                    actor,
                    ActionType::AdjustPoints,
                    Some(adjustment.user_id),
                    json!({ "points": adjustment.points, "reason": adjustment.reason }),
                )
                .await;
        }

        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::FinalizeResults,
                None,
                json!({
                    "auto_calculate_points": options.auto_calculate_points,
                    "band_results": band_results.len(),
                    "adjustments": options.manual_adjustments.len(),
                }),
            )
            .await;

        if let Err(e) = self.ledger.recompute_rankings().await {
            warn!("Failed to recompute rankings after finalizing {}: {}", tournament_id, e);
            degradations.push(LifecycleError::degraded("recompute_rankings", e));
        }

        let results = match self.ledger.list_results(tournament_id).await {
            Ok(results) => results,
            Err(e) => {
                degradations.push(LifecycleError::degraded("finalize_results", e));
                band_results
            }
        };

        Ok(Outcome::new(
            FinalizeReport {
                tournament: completed,
                results,
            },
            degradations,
        ))
    }

    async fn apply_adjustment(
        &self,
        tournament_id: Uuid,
        adjustment: &PointAdjustment,
    ) -> Result<(), infra::LedgerError> {
        self.ledger
            .add_result_points(tournament_id, adjustment.user_id, adjustment.points)
            .await?;
        self.ledger
            .increment_user_stats(
                adjustment.user_id,
                &StatsDelta {
                    points: i64::from(adjustment.points),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    pub async fn archive(
        &self,
        tournament_id: Uuid,
        actor: Actor,
    ) -> LifecycleResult<Outcome<TournamentRow>> {
        let tournament = self.load(tournament_id).await?;
        let archived = self
            .advance(
                &tournament,
                Operation::Archive,
                StatusUpdate::to(TournamentStatus::Archived),
            )
            .await?;
        info!("Archived tournament {}", tournament_id);

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                actor,
                ActionType::ArchiveTournament,
                None,
                json!({ "finished_at": tournament.finished_at }),
            )
            .await;

        Ok(Outcome::new(archived, degradations))
    }
}
