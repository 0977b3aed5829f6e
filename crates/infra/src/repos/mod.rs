pub mod action_log;
pub mod payments;
pub mod point_bands;
pub mod registrations;
pub mod results;
pub mod seat_assignments;
pub mod tournaments;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{
    EliminationUpdate, LedgerStore, NewAction, NewPayment, NewPointBand, NewRegistration,
    NewResult, NewTournament, RefundRecord, SeatPlacement, StatsDelta, StatusUpdate,
};
use crate::models::{
    ActionLogRow, PaymentRow, PointBandRow, RegistrationRow, RegistrationStatus,
    SeatAssignmentRow, TournamentResultRow, TournamentRow, TournamentStatus, UserStatsRow,
};

/// Postgres-backed ledger. Multi-row operations run in one transaction each.
#[derive(Clone)]
pub struct PgLedger {
    db: PgPool,
}

impl PgLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn conflict_on_unique(err: sqlx::Error, what: &str) -> LedgerError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            LedgerError::Conflict(what.to_string())
        }
        _ => LedgerError::Database(err),
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn create_tournament(&self, data: &NewTournament) -> LedgerResult<TournamentRow> {
        Ok(tournaments::create(&self.db, data).await?)
    }

    async fn get_tournament(&self, id: Uuid) -> LedgerResult<Option<TournamentRow>> {
        Ok(tournaments::get_by_id(&self.db, id).await?)
    }

    async fn list_tournaments_by_status(
        &self,
        statuses: &[TournamentStatus],
    ) -> LedgerResult<Vec<TournamentRow>> {
        Ok(tournaments::list_by_status(&self.db, statuses).await?)
    }

    async fn transition_tournament(
        &self,
        id: Uuid,
        expected: TournamentStatus,
        update: &StatusUpdate,
    ) -> LedgerResult<Option<TournamentRow>> {
        Ok(tournaments::transition(&self.db, id, expected, update).await?)
    }

    async fn update_prize_pool(&self, id: Uuid, prize_pool_cents: i64) -> LedgerResult<()> {
        Ok(tournaments::update_prize_pool(&self.db, id, prize_pool_cents).await?)
    }

    async fn create_registration(&self, data: &NewRegistration) -> LedgerResult<RegistrationRow> {
        registrations::create(&self.db, data)
            .await
            .map_err(|e| conflict_on_unique(e, "player already registered for this tournament"))
    }

    async fn get_registration(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<RegistrationRow>> {
        Ok(registrations::get_by_tournament_and_user(&self.db, tournament_id, user_id).await?)
    }

    async fn list_registrations(&self, tournament_id: Uuid) -> LedgerResult<Vec<RegistrationRow>> {
        Ok(registrations::list_by_tournament(&self.db, tournament_id).await?)
    }

    async fn update_registration_status(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        status: RegistrationStatus,
    ) -> LedgerResult<Option<RegistrationRow>> {
        Ok(registrations::update_status(&self.db, tournament_id, user_id, status).await?)
    }

    async fn set_late_entry(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<RegistrationRow>> {
        Ok(registrations::set_late_entry(&self.db, tournament_id, user_id).await?)
    }

    async fn delete_registration(&self, tournament_id: Uuid, user_id: Uuid) -> LedgerResult<bool> {
        Ok(registrations::delete(&self.db, tournament_id, user_id).await?)
    }

    async fn apply_no_show_exclusion(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
    ) -> LedgerResult<Option<(TournamentRow, Vec<RegistrationRow>)>> {
        let mut tx = self.db.begin().await?;

        let Some(tournament) = tournaments::transition(
            &mut *tx,
            tournament_id,
            expected,
            &StatusUpdate::to(TournamentStatus::Finalizing),
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let excluded = registrations::update_status_where(
            &mut *tx,
            tournament_id,
            RegistrationStatus::Registered,
            RegistrationStatus::NoShow,
        )
        .await?;

        tx.commit().await?;
        Ok(Some((tournament, excluded)))
    }

    async fn list_seat_assignments(
        &self,
        tournament_id: Uuid,
    ) -> LedgerResult<Vec<SeatAssignmentRow>> {
        Ok(seat_assignments::list_for_tournament(&self.db, tournament_id).await?)
    }

    async fn get_seat_assignment(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<SeatAssignmentRow>> {
        Ok(seat_assignments::get_for_user(&self.db, tournament_id, user_id).await?)
    }

    async fn upsert_seat_assignment(
        &self,
        tournament_id: Uuid,
        placement: &SeatPlacement,
    ) -> LedgerResult<SeatAssignmentRow> {
        Ok(seat_assignments::upsert(&self.db, tournament_id, placement).await?)
    }

    async fn update_elimination(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        update: &EliminationUpdate,
    ) -> LedgerResult<Option<SeatAssignmentRow>> {
        Ok(seat_assignments::update_elimination(&self.db, tournament_id, user_id, update).await?)
    }

    async fn set_bonus_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        bonus_points: i32,
    ) -> LedgerResult<Option<SeatAssignmentRow>> {
        Ok(seat_assignments::set_bonus_points(&self.db, tournament_id, user_id, bonus_points).await?)
    }

    async fn apply_seat_moves(
        &self,
        tournament_id: Uuid,
        moves: &[SeatPlacement],
    ) -> LedgerResult<Vec<SeatAssignmentRow>> {
        let mut tx = self.db.begin().await?;

        let mut moved = Vec::with_capacity(moves.len());
        for placement in moves {
            if let Some(row) = seat_assignments::move_seat(&mut *tx, tournament_id, placement).await? {
                moved.push(row);
            }
        }

        tx.commit().await?;
        Ok(moved)
    }

    async fn apply_start(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
        seats: &[SeatPlacement],
    ) -> LedgerResult<Option<TournamentRow>> {
        let mut tx = self.db.begin().await?;

        let Some(tournament) = tournaments::transition(
            &mut *tx,
            tournament_id,
            expected,
            &StatusUpdate::to(TournamentStatus::Started),
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        for placement in seats {
            seat_assignments::upsert(&mut *tx, tournament_id, placement).await?;
        }

        let user_ids: Vec<Uuid> = seats.iter().map(|s| s.user_id).collect();
        registrations::set_playing_for_users(&mut *tx, tournament_id, &user_ids).await?;

        tx.commit().await?;
        Ok(Some(tournament))
    }

    async fn cancel_start(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
    ) -> LedgerResult<Option<TournamentRow>> {
        let mut tx = self.db.begin().await?;

        let Some(tournament) = tournaments::transition(
            &mut *tx,
            tournament_id,
            expected,
            &StatusUpdate::to(TournamentStatus::Upcoming),
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        seat_assignments::delete_for_tournament(&mut *tx, tournament_id).await?;
        registrations::update_status_where(
            &mut *tx,
            tournament_id,
            RegistrationStatus::Playing,
            RegistrationStatus::Paid,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(tournament))
    }

    async fn record_payment_confirmation(
        &self,
        payment: &NewPayment,
    ) -> LedgerResult<(RegistrationRow, PaymentRow)> {
        let mut tx = self.db.begin().await?;

        let registration = registrations::update_status(
            &mut *tx,
            payment.tournament_id,
            payment.user_id,
            RegistrationStatus::Paid,
        )
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        let payment_row = payments::create(&mut *tx, payment).await?;

        tx.commit().await?;
        Ok((registration, payment_row))
    }

    async fn get_payment(&self, id: Uuid) -> LedgerResult<Option<PaymentRow>> {
        Ok(payments::get_by_id(&self.db, id).await?)
    }

    async fn list_payments_for_registration(
        &self,
        registration_id: Uuid,
    ) -> LedgerResult<Vec<PaymentRow>> {
        Ok(payments::list_by_registration(&self.db, registration_id).await?)
    }

    async fn list_payments_for_tournament(
        &self,
        tournament_id: Uuid,
    ) -> LedgerResult<Vec<PaymentRow>> {
        Ok(payments::list_by_tournament(&self.db, tournament_id).await?)
    }

    async fn mark_payment_refunded(
        &self,
        id: Uuid,
        refund: &RefundRecord,
    ) -> LedgerResult<Option<PaymentRow>> {
        Ok(payments::mark_refunded(&self.db, id, refund).await?)
    }

    async fn replace_point_structure(
        &self,
        tournament_id: Uuid,
        bands: &[NewPointBand],
    ) -> LedgerResult<Vec<PointBandRow>> {
        let mut tx = self.db.begin().await?;

        point_bands::delete_by_tournament(&mut *tx, tournament_id).await?;
        let mut rows = Vec::with_capacity(bands.len());
        for band in bands {
            rows.push(point_bands::create(&mut *tx, tournament_id, band).await?);
        }

        tx.commit().await?;
        Ok(rows)
    }

    async fn list_point_bands(&self, tournament_id: Uuid) -> LedgerResult<Vec<PointBandRow>> {
        Ok(point_bands::list_by_tournament(&self.db, tournament_id).await?)
    }

    async fn append_action(&self, action: &NewAction) -> LedgerResult<ActionLogRow> {
        Ok(action_log::append(&self.db, action).await?)
    }

    async fn list_actions(&self, tournament_id: Uuid) -> LedgerResult<Vec<ActionLogRow>> {
        Ok(action_log::list_by_tournament(&self.db, tournament_id).await?)
    }

    async fn purge_actions_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        Ok(action_log::delete_before(&self.db, cutoff).await?)
    }

    async fn increment_user_stats(
        &self,
        user_id: Uuid,
        delta: &StatsDelta,
    ) -> LedgerResult<UserStatsRow> {
        Ok(results::increment_user_stats(&self.db, user_id, delta).await?)
    }

    async fn get_user_stats(&self, user_id: Uuid) -> LedgerResult<Option<UserStatsRow>> {
        Ok(results::get_user_stats(&self.db, user_id).await?)
    }

    async fn upsert_result(&self, result: &NewResult) -> LedgerResult<TournamentResultRow> {
        Ok(results::upsert(&self.db, result).await?)
    }

    async fn add_result_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        points: i32,
    ) -> LedgerResult<TournamentResultRow> {
        Ok(results::add_points(&self.db, tournament_id, user_id, points).await?)
    }

    async fn list_results(&self, tournament_id: Uuid) -> LedgerResult<Vec<TournamentResultRow>> {
        Ok(results::list_by_tournament(&self.db, tournament_id).await?)
    }

    async fn recompute_rankings(&self) -> LedgerResult<u64> {
        Ok(results::recompute_rankings(&self.db).await?)
    }
}
