use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::ledger::NewRegistration;
use crate::models::{RegistrationRow, RegistrationStatus};

pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    data: &NewRegistration,
) -> Result<RegistrationRow> {
    let row = sqlx::query_as::<_, RegistrationRow>(
        r#"
        INSERT INTO tournament_registrations (tournament_id, user_id, status, registration_type, is_late_entry)
        VALUES ($1, $2, 'registered', $3, $4)
        RETURNING id, tournament_id, user_id, status, registration_type, is_late_entry, registered_at, updated_at
        "#,
    )
    .bind(data.tournament_id)
    .bind(data.user_id)
    .bind(data.registration_type)
    .bind(data.is_late_entry)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

pub async fn get_by_tournament_and_user<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
) -> Result<Option<RegistrationRow>> {
    let row = sqlx::query_as::<_, RegistrationRow>(
        r#"
        SELECT id, tournament_id, user_id, status, registration_type, is_late_entry, registered_at, updated_at
        FROM tournament_registrations
        WHERE tournament_id = $1 AND user_id = $2
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

pub async fn list_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> Result<Vec<RegistrationRow>> {
    let rows = sqlx::query_as::<_, RegistrationRow>(
        r#"
        SELECT id, tournament_id, user_id, status, registration_type, is_late_entry, registered_at, updated_at
        FROM tournament_registrations
        WHERE tournament_id = $1
        ORDER BY registered_at ASC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

pub async fn update_status<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
    status: RegistrationStatus,
) -> Result<Option<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(
        r#"
        UPDATE tournament_registrations
        SET status = $3, updated_at = NOW()
        WHERE tournament_id = $1 AND user_id = $2
        RETURNING id, tournament_id, user_id, status, registration_type, is_late_entry, registered_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .bind(status)
    .fetch_optional(executor)
    .await
}

/// Bulk status change for every registration currently in `from`.
pub async fn update_status_where<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    from: RegistrationStatus,
    to: RegistrationStatus,
) -> Result<Vec<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(
        r#"
        UPDATE tournament_registrations
        SET status = $3, updated_at = NOW()
        WHERE tournament_id = $1 AND status = $2
        RETURNING id, tournament_id, user_id, status, registration_type, is_late_entry, registered_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
}

pub async fn set_playing_for_users<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_ids: &[Uuid],
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE tournament_registrations
        SET status = 'playing', updated_at = NOW()
        WHERE tournament_id = $1 AND user_id = ANY($2)
        "#,
    )
    .bind(tournament_id)
    .bind(user_ids)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn set_late_entry<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
) -> Result<Option<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(
        r#"
        UPDATE tournament_registrations
        SET is_late_entry = true, updated_at = NOW()
        WHERE tournament_id = $1 AND user_id = $2
        RETURNING id, tournament_id, user_id, status, registration_type, is_late_entry, registered_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn delete<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM tournament_registrations WHERE tournament_id = $1 AND user_id = $2",
    )
    .bind(tournament_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
