use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::ledger::NewPointBand;
use crate::models::PointBandRow;

pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
    band: &NewPointBand,
) -> Result<PointBandRow> {
    sqlx::query_as::<_, PointBandRow>(
        r#"
        INSERT INTO point_structures (tournament_id, place_from, place_to, points, prize_percentage)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, tournament_id, place_from, place_to, points, prize_percentage, created_at
        "#,
    )
    .bind(tournament_id)
    .bind(band.place_from)
    .bind(band.place_to)
    .bind(band.points)
    .bind(band.prize_percentage)
    .fetch_one(executor)
    .await
}

pub async fn list_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> Result<Vec<PointBandRow>> {
    sqlx::query_as::<_, PointBandRow>(
        r#"
        SELECT id, tournament_id, place_from, place_to, points, prize_percentage, created_at
        FROM point_structures
        WHERE tournament_id = $1
        ORDER BY place_from ASC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await
}

pub async fn delete_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM point_structures WHERE tournament_id = $1")
        .bind(tournament_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
