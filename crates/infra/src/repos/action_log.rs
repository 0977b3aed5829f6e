use crate::ledger::NewAction;
use crate::models::ActionLogRow;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Result as SqlxResult};
use uuid::Uuid;

/// Insert a new action log entry and return it.
pub async fn append<'e>(
    executor: impl PgExecutor<'e>,
    action: &NewAction,
) -> SqlxResult<ActionLogRow> {
    sqlx::query_as::<_, ActionLogRow>(
        "INSERT INTO tournament_action_log
         (tournament_id, actor_kind, admin_id, action_type, target_user_id, details)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, tournament_id, actor_kind, admin_id, action_type, target_user_id, details, created_at",
    )
    .bind(action.tournament_id)
    .bind(action.actor_kind)
    .bind(action.admin_id)
    .bind(&action.action_type)
    .bind(action.target_user_id)
    .bind(&action.details)
    .fetch_one(executor)
    .await
}

/// List action log entries for a tournament, oldest first.
pub async fn list_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> SqlxResult<Vec<ActionLogRow>> {
    sqlx::query_as::<_, ActionLogRow>(
        "SELECT id, tournament_id, actor_kind, admin_id, action_type, target_user_id, details, created_at
         FROM tournament_action_log
         WHERE tournament_id = $1
         ORDER BY created_at ASC",
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await
}

/// Retention sweep: drop every entry created before `cutoff`.
pub async fn delete_before<'e>(
    executor: impl PgExecutor<'e>,
    cutoff: DateTime<Utc>,
) -> SqlxResult<u64> {
    let result = sqlx::query("DELETE FROM tournament_action_log WHERE created_at < $1")
        .bind(cutoff)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
