use crate::ledger::{EliminationUpdate, SeatPlacement};
use crate::models::SeatAssignmentRow;
use sqlx::{PgExecutor, Result as SqlxResult};
use uuid::Uuid;

/// Upsert keyed by (tournament, user). Moving an existing row keeps its
/// elimination state.
pub async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    placement: &SeatPlacement,
) -> SqlxResult<SeatAssignmentRow> {
    sqlx::query_as::<_, SeatAssignmentRow>(
        r#"
        INSERT INTO seat_assignments (tournament_id, user_id, table_number, seat_number)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (tournament_id, user_id)
        DO UPDATE SET table_number = EXCLUDED.table_number,
                      seat_number = EXCLUDED.seat_number,
                      updated_at = NOW()
        RETURNING id, tournament_id, user_id, table_number, seat_number, is_eliminated,
                  finish_place, points_earned, bonus_points, eliminated_at, assigned_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(placement.user_id)
    .bind(placement.table_number)
    .bind(placement.seat_number)
    .fetch_one(executor)
    .await
}

pub async fn get_for_user<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
) -> SqlxResult<Option<SeatAssignmentRow>> {
    sqlx::query_as::<_, SeatAssignmentRow>(
        r#"
        SELECT id, tournament_id, user_id, table_number, seat_number, is_eliminated,
               finish_place, points_earned, bonus_points, eliminated_at, assigned_at, updated_at
        FROM seat_assignments
        WHERE tournament_id = $1 AND user_id = $2
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_for_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> SqlxResult<Vec<SeatAssignmentRow>> {
    sqlx::query_as::<_, SeatAssignmentRow>(
        r#"
        SELECT id, tournament_id, user_id, table_number, seat_number, is_eliminated,
               finish_place, points_earned, bonus_points, eliminated_at, assigned_at, updated_at
        FROM seat_assignments
        WHERE tournament_id = $1
        ORDER BY table_number ASC, seat_number ASC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await
}

pub async fn update_elimination<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
    update: &EliminationUpdate,
) -> SqlxResult<Option<SeatAssignmentRow>> {
    sqlx::query_as::<_, SeatAssignmentRow>(
        r#"
        UPDATE seat_assignments
        SET is_eliminated = $3,
            finish_place = $4,
            points_earned = $5,
            eliminated_at = CASE WHEN $3 THEN NOW() ELSE NULL END,
            updated_at = NOW()
        WHERE tournament_id = $1 AND user_id = $2
        RETURNING id, tournament_id, user_id, table_number, seat_number, is_eliminated,
                  finish_place, points_earned, bonus_points, eliminated_at, assigned_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .bind(update.is_eliminated)
    .bind(update.finish_place)
    .bind(update.points_earned)
    .fetch_optional(executor)
    .await
}

pub async fn set_bonus_points<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
    bonus_points: i32,
) -> SqlxResult<Option<SeatAssignmentRow>> {
    sqlx::query_as::<_, SeatAssignmentRow>(
        r#"
        UPDATE seat_assignments
        SET bonus_points = $3, updated_at = NOW()
        WHERE tournament_id = $1 AND user_id = $2
        RETURNING id, tournament_id, user_id, table_number, seat_number, is_eliminated,
                  finish_place, points_earned, bonus_points, eliminated_at, assigned_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .bind(bonus_points)
    .fetch_optional(executor)
    .await
}

pub async fn move_seat<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    placement: &SeatPlacement,
) -> SqlxResult<Option<SeatAssignmentRow>> {
    sqlx::query_as::<_, SeatAssignmentRow>(
        r#"
        UPDATE seat_assignments
        SET table_number = $3, seat_number = $4, updated_at = NOW()
        WHERE tournament_id = $1 AND user_id = $2
        RETURNING id, tournament_id, user_id, table_number, seat_number, is_eliminated,
                  finish_place, points_earned, bonus_points, eliminated_at, assigned_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(placement.user_id)
    .bind(placement.table_number)
    .bind(placement.seat_number)
    .fetch_optional(executor)
    .await
}

pub async fn delete_for_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> SqlxResult<u64> {
    let result = sqlx::query("DELETE FROM seat_assignments WHERE tournament_id = $1")
        .bind(tournament_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
