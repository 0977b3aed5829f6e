use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::ledger::{NewResult, StatsDelta};
use crate::models::{TournamentResultRow, UserStatsRow};

pub async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    data: &NewResult,
) -> Result<TournamentResultRow> {
    let row = sqlx::query_as::<_, TournamentResultRow>(
        r#"
        INSERT INTO tournament_results (tournament_id, user_id, finish_place, points, prize_cents)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (tournament_id, user_id)
        DO UPDATE SET finish_place = EXCLUDED.finish_place,
                      points = EXCLUDED.points,
                      prize_cents = EXCLUDED.prize_cents,
                      updated_at = NOW()
        RETURNING id, tournament_id, user_id, finish_place, points, prize_cents, created_at, updated_at
        "#,
    )
    .bind(data.tournament_id)
    .bind(data.user_id)
    .bind(data.finish_place)
    .bind(data.points)
    .bind(data.prize_cents)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

pub async fn add_points<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    user_id: Uuid,
    points: i32,
) -> Result<TournamentResultRow> {
    let row = sqlx::query_as::<_, TournamentResultRow>(
        r#"
        INSERT INTO tournament_results (tournament_id, user_id, finish_place, points, prize_cents)
        VALUES ($1, $2, NULL, $3, 0)
        ON CONFLICT (tournament_id, user_id)
        DO UPDATE SET points = tournament_results.points + EXCLUDED.points,
                      updated_at = NOW()
        RETURNING id, tournament_id, user_id, finish_place, points, prize_cents, created_at, updated_at
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .bind(points)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

pub async fn list_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> Result<Vec<TournamentResultRow>> {
    let rows = sqlx::query_as::<_, TournamentResultRow>(
        r#"
        SELECT id, tournament_id, user_id, finish_place, points, prize_cents, created_at, updated_at
        FROM tournament_results
        WHERE tournament_id = $1
        ORDER BY finish_place ASC NULLS LAST, points DESC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

pub async fn increment_user_stats<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    delta: &StatsDelta,
) -> Result<UserStatsRow> {
    let row = sqlx::query_as::<_, UserStatsRow>(
        r#"
        INSERT INTO user_stats (user_id, tournaments_played, total_points, wins, best_finish)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id)
        DO UPDATE SET tournaments_played = user_stats.tournaments_played + EXCLUDED.tournaments_played,
                      total_points = user_stats.total_points + EXCLUDED.total_points,
                      wins = user_stats.wins + EXCLUDED.wins,
                      best_finish = CASE
                          WHEN EXCLUDED.best_finish IS NULL THEN user_stats.best_finish
                          WHEN user_stats.best_finish IS NULL THEN EXCLUDED.best_finish
                          ELSE LEAST(user_stats.best_finish, EXCLUDED.best_finish)
                      END,
                      updated_at = NOW()
        RETURNING user_id, tournaments_played, total_points, wins, best_finish, ranking, updated_at
        "#,
    )
    .bind(user_id)
    .bind(delta.tournaments_played)
    .bind(delta.points)
    .bind(delta.wins)
    .bind(delta.finish_place)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

pub async fn get_user_stats<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Option<UserStatsRow>> {
    sqlx::query_as::<_, UserStatsRow>(
        r#"
        SELECT user_id, tournaments_played, total_points, wins, best_finish, ranking, updated_at
        FROM user_stats
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Dense ranking by total points, ties broken by wins.
pub async fn recompute_rankings<'e>(executor: impl PgExecutor<'e>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE user_stats us
        SET ranking = ranked.position
        FROM (
            SELECT user_id,
                   DENSE_RANK() OVER (ORDER BY total_points DESC, wins DESC)::int AS position
            FROM user_stats
        ) ranked
        WHERE us.user_id = ranked.user_id
        "#,
    )
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
