use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use infra::ledger::{NewPayment, RefundRecord};
use infra::models::{PaymentRow, PaymentStatus, RegistrationRow, RegistrationStatus};
use infra::LedgerStore;

use crate::action_log::{ActionLog, ActionType, Actor};
use crate::error::{LifecycleError, LifecycleResult, Outcome};

/// Parameters for a payment confirmation.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub amount_cents: i32,
    pub method: String,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct PaymentLedger {
    ledger: Arc<dyn LedgerStore>,
    log: ActionLog,
}

impl PaymentLedger {
    pub fn new(ledger: Arc<dyn LedgerStore>, log: ActionLog) -> Self {
        Self { ledger, log }
    }

    /// Mark the registration paid and insert a confirmed payment, in one
    /// transaction.
    pub async fn record_confirmation(
        &self,
        registration: &RegistrationRow,
        admin_id: Uuid,
        details: &PaymentDetails,
    ) -> LifecycleResult<(RegistrationRow, PaymentRow)> {
        let payment = NewPayment {
            registration_id: registration.id,
            tournament_id: registration.tournament_id,
            user_id: registration.user_id,
            amount_cents: details.amount_cents,
            method: details.method.clone(),
            status: PaymentStatus::Confirmed,
            notes: details.notes.clone(),
            confirmed_by: Some(admin_id),
        };

        Ok(self.ledger.record_payment_confirmation(&payment).await?)
    }

    /// Most recent payment recorded against a registration.
    pub async fn latest_for_registration(
        &self,
        registration_id: Uuid,
    ) -> LifecycleResult<Option<PaymentRow>> {
        Ok(self
            .ledger
            .list_payments_for_registration(registration_id)
            .await?
            .into_iter()
            .max_by_key(|p| p.created_at))
    }

    /// Turn a confirmed payment into a refunded one. A registration that is
    /// still `paid` with no other confirmed payment goes back to `registered`.
    pub async fn refund(
        &self,
        payment: &PaymentRow,
        admin_id: Uuid,
        reason: Option<String>,
    ) -> LifecycleResult<Outcome<PaymentRow>> {
        if payment.status != PaymentStatus::Confirmed {
            return Err(LifecycleError::PreconditionFailed(format!(
                "payment {} is not confirmed",
                payment.id
            )));
        }

        let refund = RefundRecord {
            reason: reason.clone(),
            refunded_by: Some(admin_id),
            refunded_at: Utc::now(),
        };
        let refunded = self
            .ledger
            .mark_payment_refunded(payment.id, &refund)
            .await?
            .ok_or_else(|| LifecycleError::not_found("payment", payment.id))?;

        let still_confirmed = self
            .ledger
            .list_payments_for_registration(payment.registration_id)
            .await?
            .iter()
            .any(|p| p.status == PaymentStatus::Confirmed);

        if !still_confirmed {
            if let Some(registration) = self
                .ledger
                .get_registration(payment.tournament_id, payment.user_id)
                .await?
            {
                if registration.status == RegistrationStatus::Paid {
                    self.ledger
                        .update_registration_status(
                            payment.tournament_id,
                            payment.user_id,
                            RegistrationStatus::Registered,
                        )
                        .await?;
                }
            }
        }

        info!(
            "Refunded payment {} for player {} in tournament {}",
            payment.id, payment.user_id, payment.tournament_id
        );

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                payment.tournament_id,
                Actor::Admin(admin_id),
                ActionType::RefundPayment,
                Some(payment.user_id),
                json!({
                    "payment_id": payment.id,
                    "amount_cents": payment.amount_cents,
                    "reason": reason,
                }),
            )
            .await;

        Ok(Outcome::new(refunded, degradations))
    }

    pub async fn payments_for(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LifecycleResult<Vec<PaymentRow>> {
        match self.ledger.get_registration(tournament_id, user_id).await? {
            Some(registration) => Ok(self
                .ledger
                .list_payments_for_registration(registration.id)
                .await?),
            None => Ok(Vec::new()),
        }
    }

    /// Prize pool: each paid, playing or participated registration counted
    /// once, at the amount of its latest confirmed payment.
    pub async fn prize_pool_total(&self, tournament_id: Uuid) -> LifecycleResult<i64> {
        let payments = self.ledger.list_payments_for_tournament(tournament_id).await?;

        Ok(self
            .ledger
            .list_registrations(tournament_id)
            .await?
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    RegistrationStatus::Paid
                        | RegistrationStatus::Playing
                        | RegistrationStatus::Participated
                )
            })
            .filter_map(|r| {
                payments
                    .iter()
                    .filter(|p| p.registration_id == r.id && p.status == PaymentStatus::Confirmed)
                    .max_by_key(|p| p.created_at)
            })
            .map(|p| i64::from(p.amount_cents))
            .sum())
    }

    /// Raw sum of every confirmed payment row, repeats included.
    pub async fn confirmed_total(&self, tournament_id: Uuid) -> LifecycleResult<i64> {
        Ok(self
            .ledger
            .list_payments_for_tournament(tournament_id)
            .await?
            .iter()
            .filter(|p| p.status == PaymentStatus::Confirmed)
            .map(|p| i64::from(p.amount_cents))
            .sum())
    }
}
