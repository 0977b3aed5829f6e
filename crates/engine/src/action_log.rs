//! Append-only audit trail of lifecycle operations.
//!
//! Recording never decides the fate of the operation that triggered it: a
//! failed append is logged and handed back as a degradation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use infra::ledger::NewAction;
use infra::models::{ActionLogRow, ActorKind};
use infra::LedgerStore;

use crate::error::{LifecycleError, LifecycleResult};

/// Who triggered an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin(Uuid),
    /// The automation scheduler.
    System,
}

impl Actor {
    pub fn kind(&self) -> ActorKind {
        match self {
            Actor::Admin(_) => ActorKind::Admin,
            Actor::System => ActorKind::System,
        }
    }

    pub fn admin_id(&self) -> Option<Uuid> {
        match self {
            Actor::Admin(id) => Some(*id),
            Actor::System => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    RegisterPlayer,
    UnregisterPlayer,
    OpenRegistration,
    StartCheckIn,
    MarkNoShow,
    ReinstateNoShow,
    StartTournament,
    CancelStart,
    OpenLateRegistration,
    CloseRegistration,
    ConfirmPayment,
    RefundPayment,
    SeatPlayer,
    EliminatePlayer,
    RestorePlayer,
    AwardBonus,
    RebalanceTables,
    FinishTournament,
    FinalizeResults,
    AdjustPoints,
    ArchiveTournament,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RegisterPlayer => "register_player",
            ActionType::UnregisterPlayer => "unregister_player",
            ActionType::OpenRegistration => "open_registration",
            ActionType::StartCheckIn => "start_check_in",
            ActionType::MarkNoShow => "mark_no_show",
            ActionType::ReinstateNoShow => "reinstate_no_show",
            ActionType::StartTournament => "start_tournament",
            ActionType::CancelStart => "cancel_start",
            ActionType::OpenLateRegistration => "open_late_registration",
            ActionType::CloseRegistration => "close_registration",
            ActionType::ConfirmPayment => "confirm_payment",
            ActionType::RefundPayment => "refund_payment",
            ActionType::SeatPlayer => "seat_player",
            ActionType::EliminatePlayer => "eliminate_player",
            ActionType::RestorePlayer => "restore_player",
            ActionType::AwardBonus => "award_bonus",
            ActionType::RebalanceTables => "rebalance_tables",
            ActionType::FinishTournament => "finish_tournament",
            ActionType::FinalizeResults => "finalize_results",
            ActionType::AdjustPoints => "adjust_points",
            ActionType::ArchiveTournament => "archive_tournament",
        }
    }
}

#[derive(Clone)]
pub struct ActionLog {
    ledger: Arc<dyn LedgerStore>,
}

impl ActionLog {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Append an entry. On failure the error is logged and returned as a
    /// `NonCriticalDegradation` for the caller to collect.
    pub async fn record(
        &self,
        tournament_id: Uuid,
        actor: Actor,
        action_type: ActionType,
        target_user_id: Option<Uuid>,
        details: Value,
    ) -> Result<ActionLogRow, LifecycleError> {
        let entry = NewAction {
            tournament_id,
            actor_kind: actor.kind(),
            admin_id: actor.admin_id(),
            action_type: action_type.as_str().to_string(),
            target_user_id,
            details,
        };

        self.ledger.append_action(&entry).await.map_err(|e| {
            warn!(
                "Failed to record {} for tournament {}: {}",
                action_type.as_str(),
                tournament_id,
                e
            );
            LifecycleError::degraded(action_type.as_str(), e)
        })
    }

    /// Like `record`, pushing any failure onto `degradations`.
    pub async fn record_into(
        &self,
        degradations: &mut Vec<LifecycleError>,
        tournament_id: Uuid,
        actor: Actor,
        action_type: ActionType,
        target_user_id: Option<Uuid>,
        details: Value,
    ) {
        if let Err(e) = self
            .record(tournament_id, actor, action_type, target_user_id, details)
            .await
        {
            degradations.push(e);
        }
    }

    pub async fn entries_for(&self, tournament_id: Uuid) -> LifecycleResult<Vec<ActionLogRow>> {
        Ok(self.ledger.list_actions(tournament_id).await?)
    }

    /// Delete every entry older than `cutoff`. Returns the number removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> LifecycleResult<u64> {
        Ok(self.ledger.purge_actions_before(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra::{Fault, MemoryLedger};
    use serde_json::json;

    #[tokio::test]
    async fn test_system_actor_has_no_admin_id() {
        let ledger = Arc::new(MemoryLedger::new());
        let log = ActionLog::new(ledger.clone());
        let tournament_id = Uuid::new_v4();

        let row = log
            .record(
                tournament_id,
                Actor::System,
                ActionType::OpenRegistration,
                None,
                json!({}),
            )
            .await
            .unwrap();

        assert_eq!(row.actor_kind, ActorKind::System);
        assert_eq!(row.admin_id, None);
        assert_eq!(row.action_type, "open_registration");
    }

    #[tokio::test]
    async fn test_failed_append_becomes_degradation() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.inject_fault(Fault::ActionLog);
        let log = ActionLog::new(ledger.clone());

        let mut degradations = Vec::new();
        log.record_into(
            &mut degradations,
            Uuid::new_v4(),
            Actor::Admin(Uuid::new_v4()),
            ActionType::AwardBonus,
            None,
            json!({ "points": 10 }),
        )
        .await;

        assert_eq!(degradations.len(), 1);
        assert!(matches!(
            &degradations[0],
            LifecycleError::NonCriticalDegradation { operation, .. } if operation == "award_bonus"
        ));
    }
}
