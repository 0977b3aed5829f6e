use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "tournament_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Upcoming,
    RegistrationOpen,
    CheckIn,
    LateRegistration,
    Started,
    InProgress,
    Finalizing,
    Finished,
    Completed,
    Archived,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "upcoming",
            TournamentStatus::RegistrationOpen => "registration_open",
            TournamentStatus::CheckIn => "check_in",
            TournamentStatus::LateRegistration => "late_registration",
            TournamentStatus::Started => "started",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Finalizing => "finalizing",
            TournamentStatus::Finished => "finished",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Archived => "archived",
        }
    }

    /// Seats exist and play is underway.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            TournamentStatus::Started
                | TournamentStatus::LateRegistration
                | TournamentStatus::InProgress
        )
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(TournamentStatus::Upcoming),
            "registration_open" => Ok(TournamentStatus::RegistrationOpen),
            "check_in" => Ok(TournamentStatus::CheckIn),
            "late_registration" => Ok(TournamentStatus::LateRegistration),
            "started" => Ok(TournamentStatus::Started),
            "in_progress" => Ok(TournamentStatus::InProgress),
            "finalizing" => Ok(TournamentStatus::Finalizing),
            "finished" => Ok(TournamentStatus::Finished),
            "completed" => Ok(TournamentStatus::Completed),
            "archived" => Ok(TournamentStatus::Archived),
            _ => Err(format!("Unknown tournament status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "scoring_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Points come from the seat assignment at finish time.
    SeatPoints,
    /// Points come from the tournament's point bands at finalize time.
    PointBands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "registration_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Paid,
    Playing,
    Participated,
    NoShow,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Paid => "paid",
            RegistrationStatus::Playing => "playing",
            RegistrationStatus::Participated => "participated",
            RegistrationStatus::NoShow => "no_show",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    /// Counts against the tournament's capacity.
    pub fn holds_spot(&self) -> bool {
        !matches!(
            self,
            RegistrationStatus::NoShow | RegistrationStatus::Cancelled
        )
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(RegistrationStatus::Registered),
            "paid" => Ok(RegistrationStatus::Paid),
            "playing" => Ok(RegistrationStatus::Playing),
            "participated" => Ok(RegistrationStatus::Participated),
            "no_show" => Ok(RegistrationStatus::NoShow),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            _ => Err(format!("Unknown registration status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "registration_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    Standard,
    Onsite,
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "actor_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Admin,
    System,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TournamentRow {
    pub id: Uuid,
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub max_players: i32,
    pub buy_in_cents: i32,
    pub status: TournamentStatus,
    pub prize_pool_cents: i64,
    pub scoring_mode: ScoringMode,
    pub auto_open_registration: bool,
    pub auto_close_registration: bool,
    pub auto_exclude_no_show: bool,
    pub check_in_opened_at: Option<DateTime<Utc>>,
    pub late_registration_ends_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub status: RegistrationStatus,
    pub registration_type: RegistrationType,
    pub is_late_entry: bool,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeatAssignmentRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub table_number: i32,
    pub seat_number: i32,
    pub is_eliminated: bool,
    pub finish_place: Option<i32>,
    pub points_earned: i32,
    pub bonus_points: i32,
    pub eliminated_at: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatAssignmentRow {
    /// Points credited at finish: performance points only count once the
    /// player has been eliminated with a recorded place.
    pub fn total_points(&self) -> i32 {
        if self.is_eliminated {
            self.points_earned + self.bonus_points
        } else {
            self.bonus_points
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i32,
    pub method: String,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub confirmed_by: Option<Uuid>,
    pub refund_reason: Option<String>,
    pub refunded_by: Option<Uuid>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PointBandRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub place_from: i32,
    pub place_to: i32,
    pub points: i32,
    pub prize_percentage: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActionLogRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub actor_kind: ActorKind,
    pub admin_id: Option<Uuid>,
    pub action_type: String,
    pub target_user_id: Option<Uuid>,
    pub details: serde_json::Value, // JSONB field
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserStatsRow {
    pub user_id: Uuid,
    pub tournaments_played: i32,
    pub total_points: i64,
    pub wins: i32,
    pub best_finish: Option<i32>,
    pub ranking: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TournamentResultRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub finish_place: Option<i32>,
    pub points: i32,
    pub prize_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
