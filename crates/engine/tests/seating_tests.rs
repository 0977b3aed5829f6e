mod common;

use std::collections::HashSet;

use common::*;
use engine::seating::{SeatLayout, SeatingEngine};
use engine::{EngineConfig, LifecycleError};
use uuid::Uuid;

#[tokio::test]
async fn test_assign_seat_never_repeats_until_capacity() {
    let env = setup();
    let (tournament, _) = started_tournament(&env, 1).await;
    let seating = env.controller.seating();

    let mut taken: HashSet<(i32, i32)> = env
        .controller
        .get_seating(tournament.id)
        .await
        .unwrap()
        .iter()
        .map(|s| (s.table_number, s.seat_number))
        .collect();

    while taken.len() < 180 {
        let seat = seating
            .assign_seat_to_player(tournament.id, Uuid::new_v4())
            .await
            .unwrap();
        assert!(
            taken.insert((seat.table_number, seat.seat_number)),
            "seat {:?} handed out twice",
            (seat.table_number, seat.seat_number)
        );
        assert!((1..=20).contains(&seat.table_number));
        assert!((1..=9).contains(&seat.seat_number));
    }

    let err = seating
        .assign_seat_to_player(tournament.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CapacityExceeded(_)));
}

#[tokio::test]
async fn test_assign_seat_is_idempotent() {
    let env = setup();
    let (tournament, players) = started_tournament(&env, 3).await;
    let seating = env.controller.seating();

    let before = env
        .controller
        .get_seating(tournament.id)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.user_id == players[1])
        .unwrap();
    let again = seating
        .assign_seat_to_player(tournament.id, players[1])
        .await
        .unwrap();

    assert_eq!(again.id, before.id);
    assert_eq!(
        (again.table_number, again.seat_number),
        (before.table_number, before.seat_number)
    );
    assert_eq!(env.controller.get_seating(tournament.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_free_seat_search_fills_gaps_first() {
    let env = setup();
    let (tournament, players) = started_tournament(&env, 12).await;

    // Rebalance one player away from table 1 seat 1 to open a hole there.
    let seat_one = env
        .controller
        .get_seating(tournament.id)
        .await
        .unwrap()
        .into_iter()
        .find(|s| (s.table_number, s.seat_number) == (1, 1))
        .unwrap();
    assert!(players.contains(&seat_one.user_id));
    env.controller
        .rebalance_tables(
            tournament.id,
            &[infra::ledger::SeatPlacement {
                user_id: seat_one.user_id,
                table_number: 5,
                seat_number: 9,
            }],
            env.admin(),
        )
        .await
        .unwrap();

    let seat = env
        .controller
        .seating()
        .assign_seat_to_player(tournament.id, Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!((seat.table_number, seat.seat_number), (1, 1));
}

#[tokio::test]
async fn test_small_room_layout_from_config() {
    let env = setup_with(EngineConfig {
        seats_per_table: 2,
        max_tables: 2,
        ..EngineConfig::default()
    });
    let tournament = create_test_tournament(&env, 10).await;
    register_paid_players(&env, tournament.id, 5).await;

    let err = env.controller.start(tournament.id, env.admin()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::CapacityExceeded(_)));

    let engine = SeatingEngine::new(
        env.ledger.clone(),
        SeatLayout {
            seats_per_table: 2,
            max_tables: 1,
        },
    );
    let other = Uuid::new_v4();
    engine.assign_seat_to_player(other, Uuid::new_v4()).await.unwrap();
    engine.assign_seat_to_player(other, Uuid::new_v4()).await.unwrap();
    assert!(engine
        .assign_seat_to_player(other, Uuid::new_v4())
        .await
        .is_err());
}
