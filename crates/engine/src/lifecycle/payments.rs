use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use infra::models::{PaymentRow, RegistrationRow, RegistrationStatus, SeatAssignmentRow};

use super::{LifecycleController, Operation};
use crate::action_log::{ActionType, Actor};
use crate::config::PaymentRepeatPolicy;
use crate::error::{LifecycleError, LifecycleResult, Outcome};
use crate::payments::PaymentDetails;

#[derive(Debug)]
pub struct ConfirmReport {
    pub registration: RegistrationRow,
    pub payment: PaymentRow,
    /// Set when the tournament was already running and the player got a seat.
    pub seat: Option<SeatAssignmentRow>,
    /// True when the repeat policy returned an existing payment untouched.
    pub reused: bool,
}

impl LifecycleController {
    /// Confirm a player's buy-in.
    ///
    /// Registration status and payment row are written in one transaction.
    /// If the tournament is already running the player is then seated as a
    /// late entry. When that second step fails the error is returned but the
    /// payment stays recorded; `seat_player` (or
    /// `SeatingEngine::assign_seat_to_player`) completes it later.
    pub async fn confirm_payment(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        admin_id: Uuid,
        details: PaymentDetails,
    ) -> LifecycleResult<Outcome<ConfirmReport>> {
        let tournament = self
            .load_for(tournament_id, Operation::ConfirmPayment)
            .await?;

        let registration = self
            .ledger
            .get_registration(tournament_id, user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("registration for player", user_id))?;

        if !registration.status.holds_spot() || registration.status == RegistrationStatus::Participated {
            return Err(LifecycleError::PreconditionFailed(format!(
                "cannot confirm payment for a {} entry",
                registration.status.as_str()
            )));
        }

        let already_paid = matches!(
            registration.status,
            RegistrationStatus::Paid | RegistrationStatus::Playing
        );
        if already_paid {
            match self.config.payment_repeat_policy {
                PaymentRepeatPolicy::Allow => {}
                PaymentRepeatPolicy::Reject => {
                    return Err(LifecycleError::PreconditionFailed(format!(
                        "payment for player {} already confirmed",
                        user_id
                    )));
                }
                PaymentRepeatPolicy::Ignore => {
                    if let Some(payment) =
                        self.payments.latest_for_registration(registration.id).await?
                    {
                        return Ok(Outcome::clean(ConfirmReport {
                            registration,
                            payment,
                            seat: None,
                            reused: true,
                        }));
                    }
                }
            }
        }

        let (_, payment) = self
            .payments
            .record_confirmation(&registration, admin_id, &details)
            .await?;

        let mut degradations = Vec::new();
        self.log
            .record_into(
                &mut degradations,
                tournament_id,
                Actor::Admin(admin_id),
                ActionType::ConfirmPayment,
                Some(user_id),
                json!({
                    "payment_id": payment.id,
                    "amount_cents": payment.amount_cents,
                    "method": payment.method,
                    "repeat": already_paid,
                }),
            )
            .await;

        let confirmed = self
            .ledger
            .get_registration(tournament_id, user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("registration for player", user_id))?;
        if confirmed.status != RegistrationStatus::Paid {
            return Err(LifecycleError::InvariantViolation(format!(
                "registration for player {} is {} after payment confirmation",
                user_id,
                confirmed.status.as_str()
            )));
        }
        info!(
            "Confirmed payment of {} cents for player {} in tournament {}",
            payment.amount_cents, user_id, tournament_id
        );

        let mut report = ConfirmReport {
            registration: confirmed,
            payment,
            seat: None,
            reused: false,
        };

        if tournament.status.is_running() {
            let seat = self
                .seat_late_entry(tournament_id, user_id)
                .await
                .inspect_err(|e| {
                    warn!(
                        "Payment {} committed but seating player {} failed: {}",
                        report.payment.id, user_id, e
                    );
                })?;

            self.log
                .record_into(
                    &mut degradations,
                    tournament_id,
                    Actor::Admin(admin_id),
                    ActionType::SeatPlayer,
                    Some(user_id),
                    json!({ "table": seat.table_number, "seat": seat.seat_number, "late_entry": true }),
                )
                .await;

            if let Some(registration) = self.ledger.get_registration(tournament_id, user_id).await? {
                report.registration = registration;
            }
            report.seat = Some(seat);
        }

        Ok(Outcome::new(report, degradations))
    }

    /// Refund a confirmed payment.
    pub async fn refund_payment(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
        reason: Option<String>,
    ) -> LifecycleResult<Outcome<PaymentRow>> {
        let payment = self
            .ledger
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("payment", payment_id))?;

        self.load_for(payment.tournament_id, Operation::RefundPayment)
            .await?;

        self.payments.refund(&payment, admin_id, reason).await
    }

    /// Recompute the prize pool from paid registrations and store it.
    pub async fn refresh_prize_pool(&self, tournament_id: Uuid) -> LifecycleResult<i64> {
        let total = self.payments.prize_pool_total(tournament_id).await?;
        self.ledger.update_prize_pool(tournament_id, total).await?;
        Ok(total)
    }
}
