//! Storage contract for tournaments and everything keyed by them.
//!
//! Methods that touch more than one row are single calls so that each
//! implementation can run them inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::models::{
    ActionLogRow, ActorKind, PaymentRow, PaymentStatus, PointBandRow, RegistrationRow,
    RegistrationStatus, RegistrationType, ScoringMode, SeatAssignmentRow, TournamentResultRow,
    TournamentRow, TournamentStatus, UserStatsRow,
};

#[derive(Debug, Clone)]
pub struct NewTournament {
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub max_players: i32,
    pub buy_in_cents: i32,
    pub scoring_mode: ScoringMode,
    pub auto_open_registration: bool,
    pub auto_close_registration: bool,
    pub auto_exclude_no_show: bool,
}

/// Status write plus the timestamps that travel with it. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: TournamentStatus,
    pub check_in_opened_at: Option<DateTime<Utc>>,
    pub late_registration_ends_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn to(status: TournamentStatus) -> Self {
        Self {
            status,
            check_in_opened_at: None,
            late_registration_ends_at: None,
            finished_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub registration_type: RegistrationType,
    pub is_late_entry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPlacement {
    pub user_id: Uuid,
    pub table_number: i32,
    pub seat_number: i32,
}

#[derive(Debug, Clone)]
pub struct EliminationUpdate {
    pub is_eliminated: bool,
    pub finish_place: Option<i32>,
    pub points_earned: i32,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub registration_id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i32,
    pub method: String,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub confirmed_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub reason: Option<String>,
    pub refunded_by: Option<Uuid>,
    pub refunded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPointBand {
    pub place_from: i32,
    pub place_to: i32,
    pub points: i32,
    pub prize_percentage: f64,
}

#[derive(Debug, Clone)]
pub struct NewAction {
    pub tournament_id: Uuid,
    pub actor_kind: ActorKind,
    pub admin_id: Option<Uuid>,
    pub action_type: String,
    pub target_user_id: Option<Uuid>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct StatsDelta {
    pub tournaments_played: i32,
    pub points: i64,
    pub wins: i32,
    pub finish_place: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewResult {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub finish_place: Option<i32>,
    pub points: i32,
    pub prize_cents: i64,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- tournaments ---

    async fn create_tournament(&self, data: &NewTournament) -> LedgerResult<TournamentRow>;

    async fn get_tournament(&self, id: Uuid) -> LedgerResult<Option<TournamentRow>>;

    async fn list_tournaments_by_status(
        &self,
        statuses: &[TournamentStatus],
    ) -> LedgerResult<Vec<TournamentRow>>;

    /// Compare-and-set on the current status. Returns `None` when the row is
    /// missing or no longer in `expected`.
    async fn transition_tournament(
        &self,
        id: Uuid,
        expected: TournamentStatus,
        update: &StatusUpdate,
    ) -> LedgerResult<Option<TournamentRow>>;

    async fn update_prize_pool(&self, id: Uuid, prize_pool_cents: i64) -> LedgerResult<()>;

    // --- registrations ---

    /// Fails with `Conflict` when the (tournament, user) pair already exists.
    async fn create_registration(&self, data: &NewRegistration) -> LedgerResult<RegistrationRow>;

    async fn get_registration(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<RegistrationRow>>;

    async fn list_registrations(&self, tournament_id: Uuid) -> LedgerResult<Vec<RegistrationRow>>;

    async fn update_registration_status(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        status: RegistrationStatus,
    ) -> LedgerResult<Option<RegistrationRow>>;

    async fn set_late_entry(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<RegistrationRow>>;

    async fn delete_registration(&self, tournament_id: Uuid, user_id: Uuid) -> LedgerResult<bool>;

    /// Status to `finalizing` and every `registered` entry to `no_show`,
    /// returning the tournament and the moved rows. Returns `None` (and
    /// writes nothing) if the status CAS fails.
    async fn apply_no_show_exclusion(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
    ) -> LedgerResult<Option<(TournamentRow, Vec<RegistrationRow>)>>;

    // --- seat assignments ---

    async fn list_seat_assignments(
        &self,
        tournament_id: Uuid,
    ) -> LedgerResult<Vec<SeatAssignmentRow>>;

    async fn get_seat_assignment(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LedgerResult<Option<SeatAssignmentRow>>;

    /// Insert, or move the user's existing assignment to the given seat.
    async fn upsert_seat_assignment(
        &self,
        tournament_id: Uuid,
        placement: &SeatPlacement,
    ) -> LedgerResult<SeatAssignmentRow>;

    async fn update_elimination(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        update: &EliminationUpdate,
    ) -> LedgerResult<Option<SeatAssignmentRow>>;

    async fn set_bonus_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        bonus_points: i32,
    ) -> LedgerResult<Option<SeatAssignmentRow>>;

    /// Overwrites (table, seat) for each listed user that already has an
    /// assignment. Users without one are skipped.
    async fn apply_seat_moves(
        &self,
        tournament_id: Uuid,
        moves: &[SeatPlacement],
    ) -> LedgerResult<Vec<SeatAssignmentRow>>;

    /// Status to `started`, seats inserted, seated registrations `playing`.
    /// Returns `None` (and writes nothing) if the status CAS fails.
    async fn apply_start(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
        seats: &[SeatPlacement],
    ) -> LedgerResult<Option<TournamentRow>>;

    /// Seats deleted, `playing` registrations back to `paid`, status to
    /// `upcoming`. Returns `None` (and writes nothing) if the status CAS fails.
    async fn cancel_start(
        &self,
        tournament_id: Uuid,
        expected: TournamentStatus,
    ) -> LedgerResult<Option<TournamentRow>>;

    // --- payments ---

    /// Registration to `paid` and the payment row inserted together.
    async fn record_payment_confirmation(
        &self,
        payment: &NewPayment,
    ) -> LedgerResult<(RegistrationRow, PaymentRow)>;

    async fn get_payment(&self, id: Uuid) -> LedgerResult<Option<PaymentRow>>;

    async fn list_payments_for_registration(
        &self,
        registration_id: Uuid,
    ) -> LedgerResult<Vec<PaymentRow>>;

    async fn list_payments_for_tournament(
        &self,
        tournament_id: Uuid,
    ) -> LedgerResult<Vec<PaymentRow>>;

    async fn mark_payment_refunded(
        &self,
        id: Uuid,
        refund: &RefundRecord,
    ) -> LedgerResult<Option<PaymentRow>>;

    // --- point structures ---

    async fn replace_point_structure(
        &self,
        tournament_id: Uuid,
        bands: &[NewPointBand],
    ) -> LedgerResult<Vec<PointBandRow>>;

    async fn list_point_bands(&self, tournament_id: Uuid) -> LedgerResult<Vec<PointBandRow>>;

    // --- action log ---

    async fn append_action(&self, action: &NewAction) -> LedgerResult<ActionLogRow>;

    async fn list_actions(&self, tournament_id: Uuid) -> LedgerResult<Vec<ActionLogRow>>;

    async fn purge_actions_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64>;

    // --- statistics & results ---

    async fn increment_user_stats(
        &self,
        user_id: Uuid,
        delta: &StatsDelta,
    ) -> LedgerResult<UserStatsRow>;

    async fn get_user_stats(&self, user_id: Uuid) -> LedgerResult<Option<UserStatsRow>>;

    async fn upsert_result(&self, result: &NewResult) -> LedgerResult<TournamentResultRow>;

    /// Adds to an existing result row, creating one without a place if absent.
    async fn add_result_points(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        points: i32,
    ) -> LedgerResult<TournamentResultRow>;

    async fn list_results(&self, tournament_id: Uuid) -> LedgerResult<Vec<TournamentResultRow>>;

    /// Rewrites every user's `ranking` from total points. Returns rows ranked.
    async fn recompute_rankings(&self) -> LedgerResult<u64>;
}
