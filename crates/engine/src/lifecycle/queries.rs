use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use infra::models::{
    ActionLogRow, RegistrationRow, RegistrationStatus, SeatAssignmentRow, TournamentRow,
};

use super::LifecycleController;
use crate::error::LifecycleResult;

/// One line of a tournament's final or provisional standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub user_id: Uuid,
    pub finish_place: Option<i32>,
    pub points: i32,
    pub prize_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentStats {
    pub registrations_by_status: BTreeMap<&'static str, usize>,
    pub seated: usize,
    pub eliminated: usize,
    pub remaining: usize,
    pub tables_in_use: usize,
    pub prize_pool_cents: i64,
    pub confirmed_payments_cents: i64,
}

impl LifecycleController {
    pub async fn get_tournament(&self, tournament_id: Uuid) -> LifecycleResult<TournamentRow> {
        self.load(tournament_id).await
    }

    pub async fn get_seating(&self, tournament_id: Uuid) -> LifecycleResult<Vec<SeatAssignmentRow>> {
        self.load(tournament_id).await?;
        Ok(self.ledger.list_seat_assignments(tournament_id).await?)
    }

    /// Stored result rows, or standings derived from the seating when the
    /// tournament has not been finalized with results.
    pub async fn get_tournament_results(&self, tournament_id: Uuid) -> LifecycleResult<Vec<Standing>> {
        self.load(tournament_id).await?;

        let results = self.ledger.list_results(tournament_id).await?;
        if !results.is_empty() {
            return Ok(results
                .into_iter()
                .map(|r| Standing {
                    user_id: r.user_id,
                    finish_place: r.finish_place,
                    points: r.points,
                    prize_cents: r.prize_cents,
                })
                .collect());
        }

        let mut standings: Vec<Standing> = self
            .ledger
            .list_seat_assignments(tournament_id)
            .await?
            .into_iter()
            .map(|s| Standing {
                user_id: s.user_id,
                finish_place: s.finish_place,
                points: s.total_points(),
                prize_cents: 0,
            })
            .collect();
        standings.sort_by(|a, b| {
            let place = |s: &Standing| s.finish_place.unwrap_or(i32::MAX);
            place(a).cmp(&place(b)).then(b.points.cmp(&a.points))
        });
        Ok(standings)
    }

    pub async fn get_tournament_stats(&self, tournament_id: Uuid) -> LifecycleResult<TournamentStats> {
        let tournament = self.load(tournament_id).await?;
        let registrations = self.ledger.list_registrations(tournament_id).await?;
        let seating = self.ledger.list_seat_assignments(tournament_id).await?;

        let mut registrations_by_status = BTreeMap::new();
        for registration in &registrations {
            *registrations_by_status
                .entry(registration.status.as_str())
                .or_insert(0) += 1;
        }

        let eliminated = seating.iter().filter(|s| s.is_eliminated).count();
        let tables_in_use = seating
            .iter()
            .filter(|s| !s.is_eliminated)
            .map(|s| s.table_number)
            .collect::<HashSet<_>>()
            .len();

        Ok(TournamentStats {
            registrations_by_status,
            seated: seating.len(),
            eliminated,
            remaining: seating.len() - eliminated,
            tables_in_use,
            prize_pool_cents: tournament.prize_pool_cents,
            confirmed_payments_cents: self.payments.confirmed_total(tournament_id).await?,
        })
    }

    pub async fn get_players_by_status(
        &self,
        tournament_id: Uuid,
        status: RegistrationStatus,
    ) -> LifecycleResult<Vec<RegistrationRow>> {
        self.load(tournament_id).await?;
        Ok(self
            .ledger
            .list_registrations(tournament_id)
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    pub async fn get_actions(&self, tournament_id: Uuid) -> LifecycleResult<Vec<ActionLogRow>> {
        self.log.entries_for(tournament_id).await
    }
}
