use super::*;
use crate::core::errors::{ErrorKind, LedgerError};
use crate::core::models::payment::{PaymentAction, PaymentStatus};
use crate::infrastructure::notifications::LedgerEvent;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_pending_payment_walks_to_confirmed() {
    let service = create_test_service();
    seed_trip(&service).await;

    let payment = service
        .create_pending_payment(GROUP, "b", "b", "a", dec!(30))
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.paid_at, None);

    let sent = service
        .transition_payment(&payment.id, PaymentAction::Send, "b")
        .await
        .unwrap();
    assert_eq!(sent.status, PaymentStatus::PaymentSent);

    let confirmed = service
        .transition_payment(&payment.id, PaymentAction::Confirm, "a")
        .await
        .unwrap();
    assert_eq!(confirmed.status, PaymentStatus::Confirmed);
    assert!(confirmed.paid_at.is_some());

    let stored = service.storage().get_payment(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored, confirmed);
    let group = service.storage().get_group(GROUP).await.unwrap().unwrap();
    assert_eq!(group.last_global_confirmation_at, confirmed.paid_at);
}

#[tokio::test]
async fn test_only_debtor_creates_payments() {
    let service = create_test_service();
    seed_trip(&service).await;

    let err = service
        .create_pending_payment(GROUP, "a", "b", "a", dec!(30))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotPaymentDebtor("b".into()));
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = service
        .record_payment_sent(GROUP, "c", "b", "a", dec!(30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(service.list_payments(GROUP, "a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_input_validation() {
    let service = create_test_service();
    seed_trip(&service).await;

    let self_pay = service.create_pending_payment(GROUP, "b", "b", "b", dec!(5)).await;
    assert_eq!(self_pay.unwrap_err(), LedgerError::SelfPayment);

    let zero = service.create_pending_payment(GROUP, "b", "b", "a", dec!(0)).await;
    assert_eq!(zero.unwrap_err().kind(), ErrorKind::Validation);

    let too_fine = service.create_pending_payment(GROUP, "b", "b", "a", dec!(1.001)).await;
    assert!(matches!(too_fine, Err(LedgerError::InvalidAmount(_))));

    let outsider = service.create_pending_payment(GROUP, "b", "b", "zed", dec!(5)).await;
    assert!(matches!(outsider, Err(LedgerError::InvalidInput(field, _)) if field == "to_user_id"));

    let not_member = service.create_pending_payment(GROUP, "zed", "zed", "a", dec!(5)).await;
    assert_eq!(not_member.unwrap_err(), LedgerError::NotGroupMember("zed".into()));
}

#[tokio::test]
async fn test_wrong_party_cannot_transition() {
    let service = create_test_service();
    seed_trip(&service).await;
    let payment = service
        .create_pending_payment(GROUP, "b", "b", "a", dec!(30))
        .await
        .unwrap();

    let err = service
        .transition_payment(&payment.id, PaymentAction::Send, "a")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    service
        .transition_payment(&payment.id, PaymentAction::Send, "b")
        .await
        .unwrap();

    for caller in ["b", "c"] {
        let err = service
            .transition_payment(&payment.id, PaymentAction::Confirm, caller)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::NotPaymentCreditor("a".into()));
    }
    let stored = service.storage().get_payment(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::PaymentSent);
}

#[tokio::test]
async fn test_terminal_payments_reject_every_action() {
    let service = create_test_service();
    seed_trip(&service).await;
    add_equal_expense(&service, "a", dec!(90), date(2024, 3, 10), &["a", "b", "c"]).await;

    let confirmed = settle(&service, "b", "a", dec!(30)).await;
    let rejected = service.record_payment_sent(GROUP, "c", "c", "a", dec!(30)).await.unwrap();
    service
        .transition_payment(&rejected.id, PaymentAction::Reject, "a")
        .await
        .unwrap();

    for id in [&confirmed.id, &rejected.id] {
        for (action, caller) in [
            (PaymentAction::Send, "b"),
            (PaymentAction::Send, "c"),
            (PaymentAction::Confirm, "a"),
            (PaymentAction::Reject, "a"),
        ] {
            let err = service.transition_payment(id, action, caller).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict, "{} on {}", action, id);
        }
    }
}

#[tokio::test]
async fn test_confirm_from_pending_is_a_conflict() {
    let service = create_test_service();
    seed_trip(&service).await;
    let payment = service
        .create_pending_payment(GROUP, "b", "b", "a", dec!(30))
        .await
        .unwrap();

    let err = service
        .transition_payment(&payment.id, PaymentAction::Confirm, "a")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidPaymentTransition { .. }));
}

#[tokio::test]
async fn test_unknown_payment_is_not_found() {
    let service = create_test_service();
    let err = service
        .transition_payment("missing", PaymentAction::Confirm, "a")
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::PaymentNotFound("missing".into()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_succeed_once() {
    let service = Arc::new(create_test_service());
    seed_trip(&service).await;
    add_equal_expense(&service, "a", dec!(90), date(2024, 3, 10), &["a", "b", "c"]).await;
    let payment = service.record_payment_sent(GROUP, "b", "b", "a", dec!(30)).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let id = payment.id.clone();
            tokio::spawn(async move { service.transition_payment(&id, PaymentAction::Confirm, "a").await })
        })
        .collect();

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(p) => {
                assert_eq!(p.status, PaymentStatus::Confirmed);
                confirmed += 1;
            }
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(confirmed, 1);

    let events = service.notifier().events().await;
    let confirmations = events
        .iter()
        .filter(|e| matches!(e, LedgerEvent::PaymentConfirmed { .. }))
        .count();
    assert_eq!(confirmations, 1);

    let report = service
        .get_balances(GROUP, "a", crate::core::models::period::DateRange::default())
        .await
        .unwrap();
    assert_eq!(report.balance_of("b"), Some(dec!(0)));
}

#[tokio::test]
async fn test_racing_confirm_and_reject_on_one_task() {
    let service = create_test_service();
    seed_trip(&service).await;
    let payment = service.record_payment_sent(GROUP, "b", "b", "a", dec!(30)).await.unwrap();

    let (confirm, reject) = tokio::join!(
        service.transition_payment(&payment.id, PaymentAction::Confirm, "a"),
        service.transition_payment(&payment.id, PaymentAction::Reject, "a"),
    );
    assert!(confirm.is_ok() != reject.is_ok());
    let loser = confirm.err().or(reject.err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_notifications_follow_transitions() {
    let service = create_test_service();
    seed_trip(&service).await;
    let payment = service
        .create_pending_payment(GROUP, "b", "b", "a", dec!(30))
        .await
        .unwrap();
    service
        .transition_payment(&payment.id, PaymentAction::Send, "b")
        .await
        .unwrap();
    service
        .transition_payment(&payment.id, PaymentAction::Reject, "a")
        .await
        .unwrap();

    let names: Vec<_> = service
        .notifier()
        .events()
        .await
        .iter()
        .map(|e| e.name())
        .collect();
    assert_eq!(names, ["payment_sent", "payment_rejected"]);
}

#[tokio::test]
async fn test_notifier_outage_does_not_fail_the_transition() {
    let service = create_test_service();
    seed_trip(&service).await;
    let payment = service.record_payment_sent(GROUP, "b", "b", "a", dec!(30)).await.unwrap();

    service.notifier().set_failing(true);
    let confirmed = service
        .transition_payment(&payment.id, PaymentAction::Confirm, "a")
        .await
        .unwrap();
    assert_eq!(confirmed.status, PaymentStatus::Confirmed);
    let stored = service.storage().get_payment(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Confirmed);
}

#[tokio::test]
async fn test_confirmation_survives_failed_group_stamp() {
    let service = create_test_service();
    seed_trip(&service).await;
    let sent = service
        .record_payment_sent(GROUP, "b", "b", "a", dec!(30))
        .await
        .unwrap();
    service.storage().store().drop_table("groups").await;

    let confirmed = service
        .transition_payment(&sent.id, PaymentAction::Confirm, "a")
        .await
        .unwrap();
    assert_eq!(confirmed.status, PaymentStatus::Confirmed);

    let stored = service.storage().get_payment(&sent.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Confirmed);
    let events = service.notifier().events().await;
    assert!(matches!(
        events.last(),
        Some(LedgerEvent::PaymentConfirmed { payment_id, .. }) if *payment_id == sent.id
    ));
}
