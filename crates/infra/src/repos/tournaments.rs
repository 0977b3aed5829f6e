use sqlx::{PgExecutor, Result as SqlxResult};
use uuid::Uuid;

use crate::ledger::{NewTournament, StatusUpdate};
use crate::models::{TournamentRow, TournamentStatus};

const COLUMNS: &str = "id, name, scheduled_at, max_players, buy_in_cents, status, prize_pool_cents,
       scoring_mode, auto_open_registration, auto_close_registration, auto_exclude_no_show,
       check_in_opened_at, late_registration_ends_at, finished_at, completed_at,
       created_at, updated_at";

pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    data: &NewTournament,
) -> SqlxResult<TournamentRow> {
    let sql = format!(
        r#"
        INSERT INTO tournaments (
            name, scheduled_at, max_players, buy_in_cents, status, scoring_mode,
            auto_open_registration, auto_close_registration, auto_exclude_no_show
        )
        VALUES ($1, $2, $3, $4, 'upcoming', $5, $6, $7, $8)
        RETURNING {COLUMNS}
        "#
    );

    sqlx::query_as::<_, TournamentRow>(&sql)
        .bind(&data.name)
        .bind(data.scheduled_at)
        .bind(data.max_players)
        .bind(data.buy_in_cents)
        .bind(data.scoring_mode)
        .bind(data.auto_open_registration)
        .bind(data.auto_close_registration)
        .bind(data.auto_exclude_no_show)
        .fetch_one(executor)
        .await
}

pub async fn get_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> SqlxResult<Option<TournamentRow>> {
    let sql = format!("SELECT {COLUMNS} FROM tournaments WHERE id = $1");

    sqlx::query_as::<_, TournamentRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_by_status<'e>(
    executor: impl PgExecutor<'e>,
    statuses: &[TournamentStatus],
) -> SqlxResult<Vec<TournamentRow>> {
    let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    let sql = format!(
        r#"
        SELECT {COLUMNS}
        FROM tournaments
        WHERE status::text = ANY($1)
        ORDER BY scheduled_at ASC
        "#
    );

    sqlx::query_as::<_, TournamentRow>(&sql)
        .bind(statuses)
        .fetch_all(executor)
        .await
}

/// Status compare-and-set. Timestamps left `NULL` in the update keep their
/// stored value.
pub async fn transition<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    expected: TournamentStatus,
    update: &StatusUpdate,
) -> SqlxResult<Option<TournamentRow>> {
    let sql = format!(
        r#"
        UPDATE tournaments
        SET status = $3,
            check_in_opened_at = COALESCE($4, check_in_opened_at),
            late_registration_ends_at = COALESCE($5, late_registration_ends_at),
            finished_at = COALESCE($6, finished_at),
            completed_at = COALESCE($7, completed_at),
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {COLUMNS}
        "#
    );

    sqlx::query_as::<_, TournamentRow>(&sql)
        .bind(id)
        .bind(expected)
        .bind(update.status)
        .bind(update.check_in_opened_at)
        .bind(update.late_registration_ends_at)
        .bind(update.finished_at)
        .bind(update.completed_at)
        .fetch_optional(executor)
        .await
}

pub async fn update_prize_pool<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    prize_pool_cents: i64,
) -> SqlxResult<()> {
    sqlx::query("UPDATE tournaments SET prize_pool_cents = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(prize_pool_cents)
        .execute(executor)
        .await?;
    Ok(())
}
