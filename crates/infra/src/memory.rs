//! In-process ledger for tests. Built under `cfg(test)` or the `test-util`
//! feature.
//!
//! Every trait method takes the lock once, so the multi-row operations are
//! atomic with respect to each other just like their Postgres transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{
    EliminationUpdate, LedgerStore, NewAction, NewPayment, NewPointBand, NewRegistration,
    NewResult, NewTournament, RefundRecord, SeatPlacement, StatsDelta, StatusUpdate,
};
use crate::models::{
    ActionLogRow, PaymentRow, PaymentStatus, PointBandRow, RegistrationRow, RegistrationStatus,
    SeatAssignmentRow, TournamentResultRow, TournamentRow, TournamentStatus, UserStatsRow,
};

/// Failure that the next matching write will report instead of applying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Every statistics increment for this user fails.
    UserStats(Uuid),
    /// The next seat upsert for this user fails, once.
    SeatWrite(Uuid),
    /// Every action log append fails.
    ActionLog,
    /// Another writer moves this tournament to the given status just before
    /// the next compare-and-set on it, once.
    ConcurrentStatus(Uuid, TournamentStatus),
}

#[derive(Default)]
struct State {
    tournaments: HashMap<Uuid, TournamentRow>,
    registrations: Vec<RegistrationRow>,
    seats: Vec<SeatAssignmentRow>,
    payments: Vec<PaymentRow>,
    bands: Vec<PointBandRow>,
    actions: Vec<ActionLogRow>,
    stats: HashMap<Uuid, UserStatsRow>,
    results: Vec<TournamentResultRow>,
}

impl State {
    fn registration_mut(&mut self, tournament_id: Uuid, user_id: Uuid) -> Option<&mut RegistrationRow> {
        self.registrations
            .iter_mut()
            .find(|r| r.tournament_id == tournament_id && r.user_id == user_id)
    }

    fn seat_mut(&mut self, tournament_id: Uuid, user_id: Uuid) -> Option<&mut SeatAssignmentRow> {
        self.seats
            .iter_mut()
            .find(|s| s.tournament_id == tournament_id && s.user_id == user_id)
    }

    fn transition(
        &mut self,
        id: Uuid,
        expected: TournamentStatus,
        update: &StatusUpdate,
    ) -> Option<TournamentRow> {
        let tournament = self.tournaments.get_mut(&id)?;
        if tournament.status != expected {
            return None;
        }

        tournament.status = update.status;
        if let Some(at) = update.check_in_opened_at {
            tournament.check_in_opened_at = Some(at);
        }
        if let Some(at) = update.late_registration_ends_at {
            tournament.late_registration_ends_at = Some(at);
        }
        if let Some(at) = update.finished_at {
            tournament.finished_at = Some(at);
        }
        if let Some(at) = update.completed_at {
            tournament.completed_at = Some(at);
        }
        tournament.updated_at = Utc::now();
        Some(tournament.clone())
    }

    fn upsert_seat(&mut self, tournament_id: Uuid, placement: &SeatPlacement) -> SeatAssignmentRow {
        let now = Utc::now();
        if let Some(seat) = self.seat_mut(tournament_id, placement.user_id) {
            seat.table_number = placement.table_number;
            seat.seat_number = placement.seat_number;
            seat.updated_at = now;
            return seat.clone();
        }

        let row = SeatAssignmentRow {
            id: Uuid::new_v4(),
            tournament_id,
            user_id: placement.user_id,
            table_number: placement.table_number,
            seat_number: placement.seat_number,
            is_eliminated: false,
            finish_place: None,
            points_earned: 0,
            bonus_points: 0,
            eliminated_at: None,
            assigned_at: now,
            updated_at: now,
        };
        self.seats.push(row.clone());
        row
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    state: RwLock<State>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Insert or replace a tournament row as-is, timestamps included.
    pub fn seed_tournament(&self, row: TournamentRow) {
        self.state.write().tournaments.insert(row.id, row);
    }

    /// Insert an action log row as-is, timestamps included.
    pub fn seed_action(&self, row: ActionLogRow) {
        self.state.write().actions.push(row);
    }

    /// Apply a pending `ConcurrentStatus` write for `tournament_id`.
    fn interleave(&self, state: &mut State, tournament_id: Uuid) {
        let mut faults = self.faults.lock();
        let Some(index) = faults
            .iter()
            .position(|f| matches!(f, Fault::ConcurrentStatus(id, _) if *id == tournament_id))
        else {
            return;
        };
        if let Fault::ConcurrentStatus(_, status) = faults.remove(index) {
            if let Some(tournament) = state.tournaments.get_mut(&tournament_id) {
                tournament.status = status;
                tournament.updated_at = Utc::now();
            }
        }
    }

    fn check_fault(&self, matches: impl Fn(&Fault) -> bool, once: bool) -> LedgerResult<()> {
        let mut faults = self.faults.lock();
        if let Some(index) = faults.iter().position(|f| matches(f)) {
            let fault = if once {
                faults.remove(index)
            } else {
                faults[index].clone()
            };
            return Err(LedgerError::Unavailable(format!("injected fault: {fault:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_tournament(&self, data: &NewTournament) -> LedgerResult<TournamentRow> {
        let now = Utc::now();
        let row = TournamentRow {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            scheduled_at: data.scheduled_at,
            max_players: data.max_players,
            buy_in_cents: data.buy_in_cents,
            status: TournamentStatus::Upcoming,
            prize_pool_cents: 0,
            scoring_mode: data.scoring_mode,
            auto_open_registration: data.auto_open_registration,
            auto_close_registration: data.auto_close_registration,
            auto_exclude_no_show: data.auto_exclude_no_show,
            check_in_opened_at: None,
            late_registration_ends_at: None,
            finished_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state.write().tournaments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_tournament(&self, id: Uuid) -> LedgerResult<Option<TournamentRow>> {
        Ok(self.state.read().tournaments.get(&id).cloned())
    }

    async fn list_tournaments_by_status(
        &self,
        statuses: &[TournamentStatus],
    ) -> LedgerResult<Vec<TournamentRow>> {
        let mut rows: Vec<TournamentRow> = self
            .state
            .read()
            .tournaments
            .values()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.scheduled_at);
        Ok(rows)
    }

    async fn transition_tournament(
        &self,
        id: Uuid,
        expected: TournamentStatus,
        update: &StatusUpdate,
    ) -> LedgerResult<Option<TournamentRow>> {
        let mut state = self.state.write();
        self.interleave(&mut state, id);
        Ok(state.transition(id, expected, update))
    }

    async fn update_prize_pool(&self, id: Uuid, prize_pool_cents: i64) -> LedgerResult<()> {
        if let Some(tournament) = self.state.write().tournaments.get_mut(&id) {
            tournament.prize_pool_cents = prize_pool_cents;
            tournament.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_registration(&self, data: &NewRegistration) -> LedgerResult<RegistrationRow> {
        let mut state = self.state.write();
        if state
            .registration_mut(data.tournament_id, data.user_id)
            .is_some()
        {
            return Err(LedgerError::Conflict(
                "player already registered for this tournament".to_string(),
            ));
        }

        let now = Utc::now();
        let row = RegistrationRow {
            id: Uuid::new_v4(),
            tournament_id: data.tournament_id,
            user_id: data.user_id,
            status: RegistrationStatus::Registered,
            registration_type: data.registration_type,
            is_late_entry: data.is_late_entry,
            registered_at: now,
            updated_at: now,
        };
        state.registrations.push(row.clone());
        Ok(row)
    }

    async fn get_registration(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<RegistrationRow>> {
        Ok(self
            .state
            .read()
            .registrations
            .iter()
            .find(|r| r.tournament_id == tournament_id && r.user_id == user_id)
            .cloned())
    }

    async fn list_registrations(&self, tournament_id: Uuid) -> LedgerResult<Vec<RegistrationRow>> {
        Ok(self
            .state
            .read()
            .registrations
            .iter()
            .filter(|r| r.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn update_registration_status(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        status: RegistrationStatus,
    ) -> LedgerResult<Option<RegistrationRow>> {
        let mut state = self.state.write();
        Ok(state.registration_mut(tournament_id, user_id).map(|r| {
            r.status = status;
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn set_late_entry(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<RegistrationRow>> {
        let mut state = self.state.write();
        Ok(state.registration_mut(tournament_id, user_id).map(|r| {
            r.is_late_entry = true;
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn delete_registration(&self, tournament_id: Uuid, user_id: Uuid) -> LedgerResult<bool> {
        let mut state = self.state.write();
        let before = state.registrations.len();
        state
            .registrations
            .retain(|r| !(r.tournament_id == tournament_id && r.user_id == user_id));
        Ok(state.registrations.len() < before)
    }

    async fn apply_no_show_exclusion(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
    ) -> LedgerResult<Option<(TournamentRow, Vec<RegistrationRow>)>> {
        let mut state = self.state.write();
        self.interleave(&mut state, tournament_id);
        let Some(tournament) = state.transition(
            tournament_id,
            expected,
            &StatusUpdate::to(TournamentStatus::Finalizing),
        ) else {
            return Ok(None);
        };

        let now = Utc::now();
        let excluded = state
            .registrations
            .iter_mut()
            .filter(|r| {
                r.tournament_id == tournament_id && r.status == RegistrationStatus::Registered
            })
            .map(|r| {
                r.status = RegistrationStatus::NoShow;
                r.updated_at = now;
                r.clone()
            })
            .collect();
        Ok(Some((tournament, excluded)))
    }

    async fn list_seat_assignments(
        &self,
        tournament_id: Uuid,
    ) -> LedgerResult<Vec<SeatAssignmentRow>> {
        let mut rows: Vec<SeatAssignmentRow> = self
            .state
            .read()
            .seats
            .iter()
            .filter(|s| s.tournament_id == tournament_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.table_number, s.seat_number));
        Ok(rows)
    }

    async fn get_seat_assignment(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<SeatAssignmentRow>> {
        Ok(self
            .state
            .read()
            .seats
            .iter()
            .find(|s| s.tournament_id == tournament_id && s.user_id == user_id)
            .cloned())
    }

    async fn upsert_seat_assignment(
        &self,
        tournament_id: Uuid,
        placement: &SeatPlacement,
    ) -> LedgerResult<SeatAssignmentRow> {
        self.check_fault(|f| *f == Fault::SeatWrite(placement.user_id), true)?;
        Ok(self.state.write().upsert_seat(tournament_id, placement))
    }

    async fn update_elimination(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        update: &EliminationUpdate,
    ) -> LedgerResult<Option<SeatAssignmentRow>> {
        let now = Utc::now();
        let mut state = self.state.write();
        Ok(state.seat_mut(tournament_id, user_id).map(|s| {
            s.is_eliminated = update.is_eliminated;
            s.finish_place = update.finish_place;
            s.points_earned = update.points_earned;
            s.eliminated_at = update.is_eliminated.then_some(now);
            s.updated_at = now;
            s.clone()
        }))
    }

    async fn set_bonus_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        bonus_points: i32,
    ) -> LedgerResult<Option<SeatAssignmentRow>> {
        let mut state = self.state.write();
        Ok(state.seat_mut(tournament_id, user_id).map(|s| {
            s.bonus_points = bonus_points;
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn apply_seat_moves(
        &self,
        tournament_id: Uuid,
        moves: &[SeatPlacement],
    ) -> LedgerResult<Vec<SeatAssignmentRow>> {
        let now = Utc::now();
        let mut state = self.state.write();
        let mut moved = Vec::with_capacity(moves.len());
        for placement in moves {
            if let Some(seat) = state.seat_mut(tournament_id, placement.user_id) {
                seat.table_number = placement.table_number;
                seat.seat_number = placement.seat_number;
                seat.updated_at = now;
                moved.push(seat.clone());
            }
        }
        Ok(moved)
    }

    async fn apply_start(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
        seats: &[SeatPlacement],
    ) -> LedgerResult<Option<TournamentRow>> {
        let mut state = self.state.write();
        self.interleave(&mut state, tournament_id);
        let Some(tournament) = state.transition(
            tournament_id,
            expected,
            &StatusUpdate::to(TournamentStatus::Started),
        ) else {
            return Ok(None);
        };

        let now = Utc::now();
        for placement in seats {
            state.upsert_seat(tournament_id, placement);
            if let Some(registration) = state.registration_mut(tournament_id, placement.user_id) {
                registration.status = RegistrationStatus::Playing;
                registration.updated_at = now;
            }
        }
        Ok(Some(tournament))
    }

    async fn cancel_start(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
    ) -> LedgerResult<Option<TournamentRow>> {
        let mut state = self.state.write();
        self.interleave(&mut state, tournament_id);
        let Some(tournament) = state.transition(
            tournament_id,
            expected,
            &StatusUpdate::to(TournamentStatus::Upcoming),
        ) else {
            return Ok(None);
        };

        let now = Utc::now();
        state.seats.retain(|s| s.tournament_id != tournament_id);
        for registration in state
            .registrations
            .iter_mut()
            .filter(|r| r.tournament_id == tournament_id && r.status == RegistrationStatus::Playing)
        {
            registration.status = RegistrationStatus::Paid;
            registration.updated_at = now;
        }
        Ok(Some(tournament))
    }

    async fn record_payment_confirmation(
        &self,
        payment: &NewPayment,
    ) -> LedgerResult<(RegistrationRow, PaymentRow)> {
        let now = Utc::now();
        let mut state = self.state.write();

        let registration = state
            .registration_mut(payment.tournament_id, payment.user_id)
            .map(|r| {
                r.status = RegistrationStatus::Paid;
                r.updated_at = now;
                r.clone()
            })
            .ok_or(LedgerError::Database(sqlx::Error::RowNotFound))?;

        let row = PaymentRow {
            id: Uuid::new_v4(),
            registration_id: payment.registration_id,
            tournament_id: payment.tournament_id,
            user_id: payment.user_id,
            amount_cents: payment.amount_cents,
            method: payment.method.clone(),
            status: payment.status,
            notes: payment.notes.clone(),
            confirmed_by: payment.confirmed_by,
            refund_reason: None,
            refunded_by: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };
        state.payments.push(row.clone());
        Ok((registration, row))
    }

    async fn get_payment(&self, id: Uuid) -> LedgerResult<Option<PaymentRow>> {
        Ok(self
            .state
            .read()
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list_payments_for_registration(
        &self,
        registration_id: Uuid,
    ) -> LedgerResult<Vec<PaymentRow>> {
        Ok(self
            .state
            .read()
            .payments
            .iter()
            .filter(|p| p.registration_id == registration_id)
            .cloned()
            .collect())
    }

    async fn list_payments_for_tournament(
        &self,
        tournament_id: Uuid,
    ) -> LedgerResult<Vec<PaymentRow>> {
        Ok(self
            .state
            .read()
            .payments
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn mark_payment_refunded(
        &self,
        id: Uuid,
        refund: &RefundRecord,
    ) -> LedgerResult<Option<PaymentRow>> {
        let mut state = self.state.write();
        Ok(state.payments.iter_mut().find(|p| p.id == id).map(|p| {
            p.status = PaymentStatus::Refunded;
            p.refund_reason = refund.reason.clone();
            p.refunded_by = refund.refunded_by;
            p.refunded_at = Some(refund.refunded_at);
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn replace_point_structure(
        &self,
        tournament_id: Uuid,
        bands: &[NewPointBand],
    ) -> LedgerResult<Vec<PointBandRow>> {
        let now = Utc::now();
        let mut state = self.state.write();
        state.bands.retain(|b| b.tournament_id != tournament_id);

        let rows: Vec<PointBandRow> = bands
            .iter()
            .map(|band| PointBandRow {
                id: Uuid::new_v4(),
                tournament_id,
                place_from: band.place_from,
                place_to: band.place_to,
                points: band.points,
                prize_percentage: band.prize_percentage,
                created_at: now,
            })
            .collect();
        state.bands.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn list_point_bands(&self, tournament_id: Uuid) -> LedgerResult<Vec<PointBandRow>> {
        let mut rows: Vec<PointBandRow> = self
            .state
            .read()
            .bands
            .iter()
            .filter(|b| b.tournament_id == tournament_id)
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.place_from);
        Ok(rows)
    }

    async fn append_action(&self, action: &NewAction) -> LedgerResult<ActionLogRow> {
        self.check_fault(|f| *f == Fault::ActionLog, false)?;

        let row = ActionLogRow {
            id: Uuid::new_v4(),
            tournament_id: action.tournament_id,
            actor_kind: action.actor_kind,
            admin_id: action.admin_id,
            action_type: action.action_type.clone(),
            target_user_id: action.target_user_id,
            details: action.details.clone(),
            created_at: Utc::now(),
        };
        self.state.write().actions.push(row.clone());
        Ok(row)
    }

    async fn list_actions(&self, tournament_id: Uuid) -> LedgerResult<Vec<ActionLogRow>> {
        Ok(self
            .state
            .read()
            .actions
            .iter()
            .filter(|a| a.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn purge_actions_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        let mut state = self.state.write();
        let before = state.actions.len();
        state.actions.retain(|a| a.created_at >= cutoff);
        Ok((before - state.actions.len()) as u64)
    }

    async fn increment_user_stats(
        &self,
        user_id: Uuid,
        delta: &StatsDelta,
    ) -> LedgerResult<UserStatsRow> {
        self.check_fault(|f| *f == Fault::UserStats(user_id), false)?;

        let now = Utc::now();
        let mut state = self.state.write();
        let stats = state.stats.entry(user_id).or_insert_with(|| UserStatsRow {
            user_id,
            tournaments_played: 0,
            total_points: 0,
            wins: 0,
            best_finish: None,
            ranking: None,
            updated_at: now,
        });

        stats.tournaments_played += delta.tournaments_played;
        stats.total_points += delta.points;
        stats.wins += delta.wins;
        stats.best_finish = match (stats.best_finish, delta.finish_place) {
            (Some(best), Some(place)) => Some(best.min(place)),
            (best, place) => best.or(place),
        };
        stats.updated_at = now;
        Ok(stats.clone())
    }

    async fn get_user_stats(&self, user_id: Uuid) -> LedgerResult<Option<UserStatsRow>> {
        Ok(self.state.read().stats.get(&user_id).cloned())
    }

    async fn upsert_result(&self, result: &NewResult) -> LedgerResult<TournamentResultRow> {
        let now = Utc::now();
        let mut state = self.state.write();
        if let Some(existing) = state
            .results
            .iter_mut()
            .find(|r| r.tournament_id == result.tournament_id && r.user_id == result.user_id)
        {
            existing.finish_place = result.finish_place;
            existing.points = result.points;
            existing.prize_cents = result.prize_cents;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = TournamentResultRow {
            id: Uuid::new_v4(),
            tournament_id: result.tournament_id,
            user_id: result.user_id,
            finish_place: result.finish_place,
            points: result.points,
            prize_cents: result.prize_cents,
            created_at: now,
            updated_at: now,
        };
        state.results.push(row.clone());
        Ok(row)
    }

    async fn add_result_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        points: i32,
    ) -> LedgerResult<TournamentResultRow> {
        let now = Utc::now();
        let mut state = self.state.write();
        if let Some(existing) = state
            .results
            .iter_mut()
            .find(|r| r.tournament_id == tournament_id && r.user_id == user_id)
        {
            existing.points += points;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = TournamentResultRow {
            id: Uuid::new_v4(),
            tournament_id,
            user_id,
            finish_place: None,
            points,
            prize_cents: 0,
            created_at: now,
            updated_at: now,
        };
        state.results.push(row.clone());
        Ok(row)
    }

    async fn list_results(&self, tournament_id: Uuid) -> LedgerResult<Vec<TournamentResultRow>> {
        let mut rows: Vec<TournamentResultRow> = self
            .state
            .read()
            .results
            .iter()
            .filter(|r| r.tournament_id == tournament_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let place = |r: &TournamentResultRow| r.finish_place.unwrap_or(i32::MAX);
            place(a).cmp(&place(b)).then(b.points.cmp(&a.points))
        });
        Ok(rows)
    }

    async fn recompute_rankings(&self) -> LedgerResult<u64> {
        let mut state = self.state.write();
        let mut keys: Vec<(i64, i32, Uuid)> = state
            .stats
            .values()
            .map(|s| (s.total_points, s.wins, s.user_id))
            .collect();
        keys.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut position = 0;
        let mut previous: Option<(i64, i32)> = None;
        for (points, wins, user_id) in &keys {
            if previous != Some((*points, *wins)) {
                position += 1;
                previous = Some((*points, *wins));
            }
            if let Some(stats) = state.stats.get_mut(user_id) {
                stats.ranking = Some(position);
            }
        }
        Ok(keys.len() as u64)
    }
}
