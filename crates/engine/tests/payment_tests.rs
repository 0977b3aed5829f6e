mod common;

use chrono::{Duration, Utc};
use common::*;
use engine::{EngineConfig, LifecycleError, PaymentRepeatPolicy};
use infra::models::{PaymentStatus, RegistrationStatus, RegistrationType};
use infra::{Fault, LedgerStore};
use uuid::Uuid;

#[tokio::test]
async fn test_double_confirm_records_two_payments() {
    let env = setup();
    let tournament = create_test_tournament(&env, 4).await;
    let players = register_players(&env, tournament.id, 1).await;
    let user_id = players[0];

    for _ in 0..2 {
        let outcome = env
            .controller
            .confirm_payment(tournament.id, user_id, env.admin_id, cash(5000))
            .await
            .unwrap();
        assert_eq!(outcome.value.registration.status, RegistrationStatus::Paid);
        assert!(!outcome.value.reused);
    }

    let payments = env
        .controller
        .payments()
        .payments_for(tournament.id, user_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Confirmed));
    assert_eq!(
        env.controller
            .payments()
            .confirmed_total(tournament.id)
            .await
            .unwrap(),
        10_000
    );
    assert_eq!(
        env.controller
            .payments()
            .prize_pool_total(tournament.id)
            .await
            .unwrap(),
        5_000
    );
}

#[tokio::test]
async fn test_repeat_policy_reject() {
    let env = setup_with(EngineConfig {
        payment_repeat_policy: PaymentRepeatPolicy::Reject,
        ..EngineConfig::default()
    });
    let tournament = create_test_tournament(&env, 4).await;
    let players = register_paid_players(&env, tournament.id, 1).await;

    let err = env
        .controller
        .confirm_payment(tournament.id, players[0], env.admin_id, cash(5000))
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    let payments = env
        .controller
        .payments()
        .payments_for(tournament.id, players[0])
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
}

#[tokio::test]
async fn test_repeat_policy_ignore_returns_existing() {
    let env = setup_with(EngineConfig {
        payment_repeat_policy: PaymentRepeatPolicy::Ignore,
        ..EngineConfig::default()
    });
    let tournament = create_test_tournament(&env, 4).await;
    let players = register_players(&env, tournament.id, 1).await;

    let first = env
        .controller
        .confirm_payment(tournament.id, players[0], env.admin_id, cash(5000))
        .await
        .unwrap();
    let second = env
        .controller
        .confirm_payment(tournament.id, players[0], env.admin_id, cash(7000))
        .await
        .unwrap();

    assert!(second.value.reused);
    assert_eq!(second.value.payment.id, first.value.payment.id);
    assert_eq!(second.value.payment.amount_cents, 5000);
}

#[tokio::test]
async fn test_confirm_unknown_registration_is_not_found() {
    let env = setup();
    let tournament = create_test_tournament(&env, 4).await;

    let err = env
        .controller
        .confirm_payment(tournament.id, Uuid::new_v4(), env.admin_id, cash(5000))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
}

#[tokio::test]
async fn test_late_confirm_seats_player() {
    let env = setup();
    let tournament = create_test_tournament(&env, 10).await;
    register_paid_players(&env, tournament.id, 3).await;
    env.controller.start(tournament.id, env.admin()).await.unwrap();
    env.controller
        .open_late_registration(tournament.id, Utc::now() + Duration::hours(1), env.admin())
        .await
        .unwrap();

    let late_user = Uuid::new_v4();
    env.controller
        .register_player(tournament.id, late_user, RegistrationType::Standard, env.admin())
        .await
        .unwrap();
    let outcome = env
        .controller
        .confirm_payment(tournament.id, late_user, env.admin_id, cash(5000))
        .await
        .unwrap();

    let seat = outcome.value.seat.expect("late entry should be seated");
    assert_eq!((seat.table_number, seat.seat_number), (1, 4));
    assert_eq!(outcome.value.registration.status, RegistrationStatus::Playing);
    assert!(outcome.value.registration.is_late_entry);
}

#[tokio::test]
async fn test_seat_failure_leaves_payment_and_reconciles() {
    let env = setup();
    let tournament = create_test_tournament(&env, 10).await;
    register_paid_players(&env, tournament.id, 2).await;
    env.controller.start(tournament.id, env.admin()).await.unwrap();
    env.controller
        .open_late_registration(tournament.id, Utc::now() + Duration::hours(1), env.admin())
        .await
        .unwrap();

    let late_user = Uuid::new_v4();
    env.controller
        .register_player(tournament.id, late_user, RegistrationType::Standard, env.admin())
        .await
        .unwrap();

    env.ledger.inject_fault(Fault::SeatWrite(late_user));
    let err = env
        .controller
        .confirm_payment(tournament.id, late_user, env.admin_id, cash(5000))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Ledger(_)));

    // Payment committed, player unseated.
    let registration = env
        .ledger
        .get_registration(tournament.id, late_user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status, RegistrationStatus::Paid);
    assert!(env
        .ledger
        .get_seat_assignment(tournament.id, late_user)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        env.controller
            .payments()
            .payments_for(tournament.id, late_user)
            .await
            .unwrap()
            .len(),
        1
    );

    // Re-running the seat assignment completes the entry.
    let seat = env
        .controller
        .seating()
        .assign_seat_to_player(tournament.id, late_user)
        .await
        .unwrap();
    assert_eq!((seat.table_number, seat.seat_number), (1, 3));

    let seated = env
        .controller
        .seat_player(tournament.id, late_user, env.admin())
        .await
        .unwrap();
    assert_eq!(seated.value.id, seat.id);
    let registration = env
        .ledger
        .get_registration(tournament.id, late_user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status, RegistrationStatus::Playing);
}

#[tokio::test]
async fn test_refund_reverts_unseated_registration() {
    let env = setup();
    let tournament = create_test_tournament(&env, 4).await;
    let players = register_paid_players(&env, tournament.id, 1).await;

    let payment = env
        .controller
        .payments()
        .payments_for(tournament.id, players[0])
        .await
        .unwrap()
        .remove(0);

    let refunded = env
        .controller
        .refund_payment(payment.id, env.admin_id, Some("changed plans".to_string()))
        .await
        .unwrap()
        .value;
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.refunded_by, Some(env.admin_id));
    assert_eq!(refunded.refund_reason.as_deref(), Some("changed plans"));

    let registration = env
        .ledger
        .get_registration(tournament.id, players[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status, RegistrationStatus::Registered);

    let err = env
        .controller
        .refund_payment(payment.id, env.admin_id, None)
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());

    assert_eq!(
        env.controller
            .refresh_prize_pool(tournament.id)
            .await
            .unwrap(),
        0
    );
}
