use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::ledger::{NewPayment, RefundRecord};
use crate::models::PaymentRow;

pub async fn create<'e>(executor: impl PgExecutor<'e>, data: &NewPayment) -> Result<PaymentRow> {
    sqlx::query_as::<_, PaymentRow>(
        r#"
        INSERT INTO payments (
            registration_id, tournament_id, user_id, amount_cents, method, status, notes, confirmed_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, registration_id, tournament_id, user_id, amount_cents, method, status, notes,
                  confirmed_by, refund_reason, refunded_by, refunded_at, created_at, updated_at
        "#,
    )
    .bind(data.registration_id)
    .bind(data.tournament_id)
    .bind(data.user_id)
    .bind(data.amount_cents)
    .bind(&data.method)
    .bind(data.status)
    .bind(&data.notes)
    .bind(data.confirmed_by)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<PaymentRow>> {
    sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, registration_id, tournament_id, user_id, amount_cents, method, status, notes,
               confirmed_by, refund_reason, refunded_by, refunded_at, created_at, updated_at
        FROM payments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn list_by_registration<'e>(
    executor: impl PgExecutor<'e>,
    registration_id: Uuid,
) -> Result<Vec<PaymentRow>> {
    sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, registration_id, tournament_id, user_id, amount_cents, method, status, notes,
               confirmed_by, refund_reason, refunded_by, refunded_at, created_at, updated_at
        FROM payments
        WHERE registration_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(registration_id)
    .fetch_all(executor)
    .await
}

pub async fn list_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: Uuid,
) -> Result<Vec<PaymentRow>> {
    sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, registration_id, tournament_id, user_id, amount_cents, method, status, notes,
               confirmed_by, refund_reason, refunded_by, refunded_at, created_at, updated_at
        FROM payments
        WHERE tournament_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await
}

pub async fn mark_refunded<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    refund: &RefundRecord,
) -> Result<Option<PaymentRow>> {
    sqlx::query_as::<_, PaymentRow>(
        r#"
        UPDATE payments
        SET status = 'refunded',
            refund_reason = $2,
            refunded_by = $3,
            refunded_at = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, registration_id, tournament_id, user_id, amount_cents, method, status, notes,
                  confirmed_by, refund_reason, refunded_by, refunded_at, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(&refund.reason)
    .bind(refund.refunded_by)
    .bind(refund.refunded_at)
    .fetch_optional(executor)
    .await
}
