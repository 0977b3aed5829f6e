use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use engine::payments::PaymentDetails;
use engine::{Actor, EngineConfig, LifecycleController};
use infra::ledger::NewTournament;
use infra::models::{RegistrationType, ScoringMode, TournamentRow};
use infra::MemoryLedger;

pub struct TestEnv {
    pub ledger: Arc<MemoryLedger>,
    pub controller: LifecycleController,
    pub admin_id: Uuid,
}

impl TestEnv {
    pub fn admin(&self) -> Actor {
        Actor::Admin(self.admin_id)
    }
}

pub fn setup() -> TestEnv {
    setup_with(EngineConfig::default())
}

pub fn setup_with(config: EngineConfig) -> TestEnv {
    let ledger = Arc::new(MemoryLedger::new());
    let controller = LifecycleController::new(ledger.clone(), config);

    TestEnv {
        ledger,
        controller,
        admin_id: Uuid::new_v4(),
    }
}

pub fn tournament_data(max_players: i32, scoring_mode: ScoringMode) -> NewTournament {
    NewTournament {
        name: format!("Test Tournament {}", Uuid::new_v4()),
        scheduled_at: Utc::now() + Duration::days(2),
        max_players,
        buy_in_cents: 5000,
        scoring_mode,
        auto_open_registration: true,
        auto_close_registration: true,
        auto_exclude_no_show: true,
    }
}

pub async fn create_test_tournament(env: &TestEnv, max_players: i32) -> TournamentRow {
    env.controller
        .create_tournament(&tournament_data(max_players, ScoringMode::SeatPoints))
        .await
        .expect("Failed to create tournament")
}

pub fn cash(amount_cents: i32) -> PaymentDetails {
    PaymentDetails {
        amount_cents,
        method: "cash".to_string(),
        notes: None,
    }
}

/// Register `count` fresh players and return their ids.
#[allow(dead_code)]
pub async fn register_players(env: &TestEnv, tournament_id: Uuid, count: usize) -> Vec<Uuid> {
    let mut players = Vec::with_capacity(count);
    for _ in 0..count {
        let user_id = Uuid::new_v4();
        env.controller
            .register_player(tournament_id, user_id, RegistrationType::Standard, env.admin())
            .await
            .expect("Failed to register player");
        players.push(user_id);
    }
    players
}

/// Register and confirm payment for `count` fresh players.
#[allow(dead_code)]
pub async fn register_paid_players(env: &TestEnv, tournament_id: Uuid, count: usize) -> Vec<Uuid> {
    let players = register_players(env, tournament_id, count).await;
    for user_id in &players {
        env.controller
            .confirm_payment(tournament_id, *user_id, env.admin_id, cash(5000))
            .await
            .expect("Failed to confirm payment");
    }
    players
}

/// A started tournament with `count` seated players.
#[allow(dead_code)]
pub async fn started_tournament(env: &TestEnv, count: usize) -> (TournamentRow, Vec<Uuid>) {
    let tournament = create_test_tournament(env, count.max(1) as i32).await;
    let players = register_paid_players(env, tournament.id, count).await;
    let outcome = env
        .controller
        .start(tournament.id, env.admin())
        .await
        .expect("Failed to start tournament");
    (outcome.value.tournament, players)
}
