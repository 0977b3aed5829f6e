mod common;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use common::*;
use engine::{Actor, LifecycleError};
use infra::ledger::SeatPlacement;
use infra::models::{ActorKind, RegistrationStatus, RegistrationType, TournamentStatus};
use infra::{Fault, LedgerStore};
use uuid::Uuid;

#[tokio::test]
async fn test_start_two_player_scenario() {
    let env = setup();
    let tournament = create_test_tournament(&env, 2).await;
    let players = register_paid_players(&env, tournament.id, 2).await;

    let outcome = env.controller.start(tournament.id, env.admin()).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(outcome.value.tournament.status, TournamentStatus::Started);

    let seating = env.controller.get_seating(tournament.id).await.unwrap();
    assert_eq!(seating.len(), 2);
    let seats: HashSet<(i32, i32)> = seating
        .iter()
        .map(|s| (s.table_number, s.seat_number))
        .collect();
    assert_eq!(seats, HashSet::from([(1, 1), (1, 2)]));

    for user_id in players {
        let registration = env
            .ledger
            .get_registration(tournament.id, user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Playing);
    }
}

#[tokio::test]
async fn test_start_seats_every_paid_player_by_position() {
    let env = setup();
    let tournament = create_test_tournament(&env, 30).await;
    let paid = register_paid_players(&env, tournament.id, 23).await;
    let unpaid = register_players(&env, tournament.id, 3).await;

    env.controller.start(tournament.id, env.admin()).await.unwrap();

    let seating = env.controller.get_seating(tournament.id).await.unwrap();
    assert_eq!(seating.len(), paid.len());

    let seated: HashSet<Uuid> = seating.iter().map(|s| s.user_id).collect();
    assert_eq!(seated, paid.iter().copied().collect::<HashSet<_>>());
    assert!(unpaid.iter().all(|u| !seated.contains(u)));

    // Positions 0..n map to table i/9+1, seat i%9+1 for some ordering.
    let expected: HashSet<(i32, i32)> = (0..paid.len())
        .map(|i| ((i / 9) as i32 + 1, (i % 9) as i32 + 1))
        .collect();
    let actual: HashSet<(i32, i32)> = seating
        .iter()
        .map(|s| (s.table_number, s.seat_number))
        .collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_start_without_paid_players_fails() {
    let env = setup();
    let tournament = create_test_tournament(&env, 10).await;
    register_players(&env, tournament.id, 4).await;

    let err = env.controller.start(tournament.id, env.admin()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NoPaidPlayers));
    assert!(err.is_precondition_failed());

    let current = env.controller.get_tournament(tournament.id).await.unwrap();
    assert_eq!(current.status, TournamentStatus::Upcoming);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let env = setup();
    let (tournament, _) = started_tournament(&env, 5).await;

    let err = env.controller.start(tournament.id, env.admin()).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            status: TournamentStatus::Started,
            ..
        }
    ));
    assert_eq!(env.controller.get_seating(tournament.id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_cancel_start_scenario() {
    let env = setup();
    let (tournament, players) = started_tournament(&env, 4).await;

    let outcome = env
        .controller
        .cancel_tournament_start(tournament.id, env.admin())
        .await
        .unwrap();
    assert_eq!(outcome.value.status, TournamentStatus::Upcoming);

    assert!(env.controller.get_seating(tournament.id).await.unwrap().is_empty());
    let paid = env
        .controller
        .get_players_by_status(tournament.id, RegistrationStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.len(), players.len());
}

#[tokio::test]
async fn test_registration_capacity_and_duplicates() {
    let env = setup();
    let tournament = create_test_tournament(&env, 2).await;
    let players = register_players(&env, tournament.id, 2).await;

    let err = env
        .controller
        .register_player(tournament.id, players[0], RegistrationType::Standard, env.admin())
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    let err = env
        .controller
        .register_player(tournament.id, Uuid::new_v4(), RegistrationType::Onsite, env.admin())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CapacityExceeded(_)));

    env.controller
        .unregister_player(tournament.id, players[1], env.admin())
        .await
        .unwrap();
    env.controller
        .register_player(tournament.id, Uuid::new_v4(), RegistrationType::Onsite, env.admin())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_paid_entry_cannot_unregister() {
    let env = setup();
    let tournament = create_test_tournament(&env, 4).await;
    let players = register_paid_players(&env, tournament.id, 1).await;

    let err = env
        .controller
        .unregister_player(tournament.id, players[0], env.admin())
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[tokio::test]
async fn test_check_in_and_no_show_flow() {
    let env = setup();
    let tournament = create_test_tournament(&env, 10).await;
    let paid = register_paid_players(&env, tournament.id, 2).await;
    let absent = register_players(&env, tournament.id, 3).await;

    env.controller
        .open_registration(tournament.id, Actor::System)
        .await
        .unwrap();
    let checked_in = env
        .controller
        .open_check_in(tournament.id, Actor::System)
        .await
        .unwrap();
    assert!(checked_in.value.check_in_opened_at.is_some());

    let outcome = env
        .controller
        .exclude_no_shows(tournament.id, Actor::System)
        .await
        .unwrap();
    assert_eq!(outcome.value.tournament.status, TournamentStatus::Finalizing);
    assert_eq!(
        outcome.value.excluded.iter().copied().collect::<HashSet<_>>(),
        absent.iter().copied().collect::<HashSet<_>>()
    );

    let no_show_logs = env
        .controller
        .get_actions(tournament.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.action_type == "mark_no_show")
        .collect::<Vec<_>>();
    assert_eq!(no_show_logs.len(), absent.len());
    assert!(no_show_logs
        .iter()
        .all(|a| a.actor_kind == ActorKind::System && a.admin_id.is_none()));

    // Reinstated players are back in and start can still run from finalizing.
    env.controller
        .reinstate_no_show(tournament.id, absent[0], env.admin())
        .await
        .unwrap();
    let err = env
        .controller
        .reinstate_no_show(tournament.id, paid[0], env.admin())
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    let started = env.controller.start(tournament.id, env.admin()).await.unwrap();
    assert_eq!(started.value.seats.len(), paid.len());
}

#[tokio::test]
async fn test_no_show_exclusion_loses_race_to_start() {
    let env = setup();
    let tournament = create_test_tournament(&env, 10).await;
    register_paid_players(&env, tournament.id, 1).await;
    let absent = register_players(&env, tournament.id, 2).await;
    env.controller
        .open_registration(tournament.id, env.admin())
        .await
        .unwrap();
    env.controller
        .open_check_in(tournament.id, env.admin())
        .await
        .unwrap();

    env.ledger.inject_fault(Fault::ConcurrentStatus(
        tournament.id,
        TournamentStatus::Started,
    ));
    let err = env
        .controller
        .exclude_no_shows(tournament.id, Actor::System)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            status: TournamentStatus::Started,
            ..
        }
    ));

    for user_id in &absent {
        let registration = env
            .ledger
            .get_registration(tournament.id, *user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Registered);
    }
    let actions = env.controller.get_actions(tournament.id).await.unwrap();
    assert!(actions.iter().all(|a| a.action_type != "mark_no_show"));
}

#[tokio::test]
async fn test_elimination_revive_and_bonus() {
    let env = setup();
    let (tournament, players) = started_tournament(&env, 3).await;
    let user_id = players[0];

    let seat = env
        .controller
        .eliminate_player(tournament.id, user_id, 3, 20, env.admin())
        .await
        .unwrap()
        .value;
    assert!(seat.is_eliminated);
    assert_eq!(seat.finish_place, Some(3));

    // Last write wins.
    let seat = env
        .controller
        .eliminate_player(tournament.id, user_id, 2, 40, env.admin())
        .await
        .unwrap()
        .value;
    assert_eq!((seat.finish_place, seat.points_earned), (Some(2), 40));

    let seat = env
        .controller
        .revive_player(tournament.id, user_id, env.admin())
        .await
        .unwrap()
        .value;
    assert!(!seat.is_eliminated);
    assert_eq!(seat.finish_place, None);
    assert!(seat.eliminated_at.is_none());

    let seat = env
        .controller
        .award_bonus_points(tournament.id, user_id, 15, env.admin())
        .await
        .unwrap()
        .value;
    assert_eq!(seat.bonus_points, 15);

    let err = env
        .controller
        .eliminate_player(tournament.id, Uuid::new_v4(), 1, 0, env.admin())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
}

#[tokio::test]
async fn test_seat_operations_need_running_tournament() {
    let env = setup();
    let tournament = create_test_tournament(&env, 4).await;
    let players = register_paid_players(&env, tournament.id, 1).await;

    let err = env
        .controller
        .eliminate_player(tournament.id, players[0], 1, 10, env.admin())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            status: TournamentStatus::Upcoming,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rebalance_overwrites_seats() {
    let env = setup();
    let (tournament, players) = started_tournament(&env, 10).await;

    let moves = vec![
        SeatPlacement {
            user_id: players[0],
            table_number: 3,
            seat_number: 1,
        },
        SeatPlacement {
            user_id: players[1],
            table_number: 3,
            seat_number: 2,
        },
    ];
    let moved = env
        .controller
        .rebalance_tables(tournament.id, &moves, env.admin())
        .await
        .unwrap()
        .value;
    assert_eq!(moved.len(), 2);

    let seat = env
        .ledger
        .get_seat_assignment(tournament.id, players[1])
        .await
        .unwrap()
        .unwrap();
    assert_eq!((seat.table_number, seat.seat_number), (3, 2));

    let outside = [SeatPlacement {
        user_id: players[2],
        table_number: 1,
        seat_number: 10,
    }];
    let err = env
        .controller
        .rebalance_tables(tournament.id, &outside, env.admin())
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    let stranger = [SeatPlacement {
        user_id: Uuid::new_v4(),
        table_number: 2,
        seat_number: 5,
    }];
    let err = env
        .controller
        .rebalance_tables(tournament.id, &stranger, env.admin())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
}

#[tokio::test]
async fn test_late_registration_entries_are_late() {
    let env = setup();
    let (tournament, _) = started_tournament(&env, 2).await;

    let err = env
        .controller
        .open_late_registration(tournament.id, Utc::now() - Duration::minutes(1), env.admin())
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    let opened = env
        .controller
        .open_late_registration(tournament.id, Utc::now() + Duration::hours(1), env.admin())
        .await
        .unwrap()
        .value;
    assert_eq!(opened.status, TournamentStatus::LateRegistration);

    // Capacity was sized to the starting field; make room for one more.
    let late_user = Uuid::new_v4();
    let err = env
        .controller
        .register_player(tournament.id, late_user, RegistrationType::Standard, env.admin())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CapacityExceeded(_)));

    let env = setup();
    let roomy = create_test_tournament(&env, 10).await;
    register_paid_players(&env, roomy.id, 2).await;
    env.controller.start(roomy.id, env.admin()).await.unwrap();
    env.controller
        .open_late_registration(roomy.id, Utc::now() + Duration::hours(1), env.admin())
        .await
        .unwrap();

    let registration = env
        .controller
        .register_player(roomy.id, late_user, RegistrationType::Standard, env.admin())
        .await
        .unwrap()
        .value;
    assert_eq!(registration.registration_type, RegistrationType::Late);
    assert!(registration.is_late_entry);

    let closed = env
        .controller
        .close_late_registration(roomy.id, env.admin())
        .await
        .unwrap()
        .value;
    assert_eq!(closed.status, TournamentStatus::InProgress);
}

#[tokio::test]
async fn test_stats_query_counts() {
    let env = setup();
    let tournament = create_test_tournament(&env, 20).await;
    let paid = register_paid_players(&env, tournament.id, 11).await;
    register_players(&env, tournament.id, 2).await;
    env.controller.start(tournament.id, env.admin()).await.unwrap();

    env.controller
        .eliminate_player(tournament.id, paid[0], 11, 0, env.admin())
        .await
        .unwrap();

    let stats = env.controller.get_tournament_stats(tournament.id).await.unwrap();
    assert_eq!(stats.seated, 11);
    assert_eq!(stats.eliminated, 1);
    assert_eq!(stats.remaining, 10);
    assert_eq!(stats.registrations_by_status.get("playing"), Some(&11));
    assert_eq!(stats.registrations_by_status.get("registered"), Some(&2));
    assert_eq!(stats.confirmed_payments_cents, 11 * 5000);
    assert!(stats.tables_in_use >= 1 && stats.tables_in_use <= 2);
}

#[tokio::test]
async fn test_missing_tournament_is_not_found() {
    let env = setup();
    let err = env
        .controller
        .start(Uuid::new_v4(), env.admin())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
}
