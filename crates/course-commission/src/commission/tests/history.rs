use super::common::*;
use chrono::Duration;
use std::sync::Arc;

use crate::commission::domain::{DetailUpdate, TransactionId};
use crate::commission::error::{CommissionError, ConflictReason};
use crate::commission::repository::{CommissionRepository, PendingChange, RepositoryError};
use crate::commission::settlement::SettlementRequest;
use crate::commission::snapshot::ConfigurationSnapshot;
use crate::commission::CourseId;

fn settlement_request(transaction_id: &str, amount: Option<u64>) -> SettlementRequest {
    SettlementRequest {
        transaction_id: TransactionId(transaction_id.to_string()),
        course_id: COURSE_X,
        category_id: CATEGORY_Y,
        purchased_at: now(),
        amount,
    }
}

#[test]
fn every_write_appends_a_revision() {
    let (service, repository, _, h1) = seeded_service();
    assert_eq!(repository.revision_count(), 3);

    let genesis = repository
        .at_revision(0)
        .expect("readable")
        .expect("genesis kept");
    assert_eq!(genesis.header_count(), 0);
    let first = repository
        .at_revision(1)
        .expect("readable")
        .expect("kept");
    assert!(first.header(h1).expect("header").details.is_empty());
    assert!(repository.at_revision(99).expect("readable").is_none());

    // Rejected writes leave no trace.
    let _ = service.create_detail(h1, general(0, 3));
    assert_eq!(repository.revision_count(), 3);
    assert_eq!(service.snapshot().expect("snapshot").revision, 2);
}

#[test]
fn historical_resolution_uses_configuration_of_the_time() {
    let (service, _, clock, h1) = seeded_service();
    let detail_id = service
        .get_header(h1)
        .expect("header")
        .details
        .first()
        .expect("detail")
        .id;
    let settled_config_time = service.now();

    clock.advance(Duration::hours(1));
    service
        .update_detail(
            detail_id,
            DetailUpdate {
                platform_rate: Some(40),
                ..DetailUpdate::default()
            },
        )
        .expect("rate raised");

    let current = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("resolves");
    assert_eq!(current.rate.platform_rate(), 40);

    let historical = service
        .resolve_as_of(
            COURSE_X,
            CATEGORY_Y,
            now(),
            settled_config_time + Duration::minutes(5),
        )
        .expect("resolves");
    assert_eq!(historical.rate.platform_rate(), 30);
    assert!(historical.revision < current.revision);

    let before_anything = service
        .resolve_as_of(COURSE_X, CATEGORY_Y, now(), now() - Duration::days(30))
        .expect_err("nothing configured yet");
    assert!(matches!(
        before_anything,
        CommissionError::NoApplicableRule { .. }
    ));
}

#[test]
fn commit_against_stale_revision_is_rejected() {
    let (_, repository, _, _) = seeded_service();
    let current = repository.current().expect("snapshot");

    let change = PendingChange {
        base_revision: current.revision - 1,
        snapshot: ConfigurationSnapshot::clone(&current),
        recorded_at: now(),
    };
    match repository.commit(change) {
        Err(RepositoryError::StaleRevision { expected, actual }) => {
            assert_eq!(expected, current.revision - 1);
            assert_eq!(actual, current.revision);
        }
        other => panic!("expected stale revision, got {other:?}"),
    }

    let mapped = CommissionError::from(RepositoryError::StaleRevision {
        expected: 1,
        actual: 2,
    });
    assert!(matches!(
        mapped,
        CommissionError::Conflict(ConflictReason::StaleRevision { .. })
    ));
    assert!(matches!(
        CommissionError::from(RepositoryError::Contention),
        CommissionError::Conflict(ConflictReason::WriteContention)
    ));
}

#[test]
fn concurrent_writers_never_lose_updates() {
    let (service, _, _, h1) = seeded_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                let mut outcomes = Vec::new();
                for attempt in 0..10u64 {
                    let course = CourseId(10_000 + worker * 100 + attempt);
                    outcomes.push(service.create_detail(h1, for_course(course, 20, 0)));
                }
                outcomes
            })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        for outcome in handle.join().expect("worker finished") {
            match outcome {
                Ok(_) => committed += 1,
                Err(CommissionError::Conflict(
                    ConflictReason::StaleRevision { .. } | ConflictReason::WriteContention,
                )) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
    }

    let header = service.get_header(h1).expect("header");
    assert!(committed > 0);
    assert_eq!(header.details.len(), committed + 1);
}

#[test]
fn settlement_pins_rate_and_splits_amount() {
    let (service, repository, _, h1) = seeded_service();
    let settlement = service
        .settle(settlement_request("tx-1001", Some(1_999)))
        .expect("settled");

    assert_eq!(settlement.resolution.rate.platform_rate(), 30);
    let split = settlement.split.expect("amount given");
    assert_eq!(split.platform, 599);
    assert_eq!(split.instructor, 1_400);
    assert_eq!(split.platform + split.instructor, 1_999);
    assert!(repository
        .is_detail_used(settlement.resolution.detail_id)
        .expect("ledger readable"));

    // Raising the rate afterwards does not touch an already settled transaction.
    service
        .update_detail(
            settlement.resolution.detail_id,
            DetailUpdate {
                platform_rate: Some(45),
                ..DetailUpdate::default()
            },
        )
        .expect("rate raised");
    let replay = service
        .settle(settlement_request("tx-1001", Some(1_999)))
        .expect("replayed");
    assert_eq!(replay, settlement);

    let fresh = service
        .settle(settlement_request("tx-1002", None))
        .expect("settled");
    assert_eq!(fresh.resolution.rate.platform_rate(), 45);
    assert!(fresh.split.is_none());
    assert_eq!(fresh.resolution.header_id, h1);
}

#[test]
fn late_settlement_after_rollover_resolves_the_expired_rule() {
    let (service, _, clock) = build_service();
    let rollover = now() + Duration::hours(1);
    let outgoing = service
        .create_header(windowed_header("Outgoing", None, Some(rollover)))
        .expect("header");
    let old_rule = service
        .create_detail(outgoing.id, general(30, 1))
        .expect("detail");

    clock.advance(Duration::hours(2));

    // An open-ended successor would also cover purchases made before the rollover.
    let unbounded = service
        .create_header(header("Unbounded successor"))
        .expect("header");
    match service.create_detail(unbounded.id, general(25, 1)) {
        Err(CommissionError::Validation { field, .. }) => assert_eq!(field, "priority"),
        other => panic!("expected priority clash, got {other:?}"),
    }

    let successor = service
        .create_header(windowed_header(
            "Successor",
            Some(rollover + Duration::seconds(1)),
            None,
        ))
        .expect("header");
    let new_rule = service
        .create_detail(successor.id, general(25, 1))
        .expect("detail after rollover");

    let mut late = settlement_request("tx-4001", Some(1_000));
    late.purchased_at = now() + Duration::minutes(30);
    let late = service.settle(late).expect("late purchase settles");
    assert_eq!(late.resolution.detail_id, old_rule.id);
    assert_eq!(late.resolution.rate.platform_rate(), 30);

    let mut current = settlement_request("tx-4002", None);
    current.purchased_at = service.now();
    let current = service.settle(current).expect("current purchase settles");
    assert_eq!(current.resolution.detail_id, new_rule.id);
}

#[test]
fn used_details_cannot_be_deleted() {
    let (service, _, _, h1) = seeded_service();
    let settlement = service
        .settle(settlement_request("tx-2001", None))
        .expect("settled");
    let used = settlement.resolution.detail_id;

    match service.delete_detail(used) {
        Err(CommissionError::Conflict(ConflictReason::DetailInUse { detail_id })) => {
            assert_eq!(detail_id, used)
        }
        other => panic!("expected detail in use, got {other:?}"),
    }
    assert!(matches!(
        service.delete_header(h1),
        Err(CommissionError::Conflict(ConflictReason::DetailInUse { .. }))
    ));

    // Deactivating keeps history intact and is allowed.
    let retired = service
        .update_detail(
            used,
            DetailUpdate {
                is_active: Some(false),
                ..DetailUpdate::default()
            },
        )
        .expect("deactivated");
    assert!(!retired.is_active);
}

#[test]
fn failed_resolution_records_nothing() {
    let (service, repository, _) = build_service();
    let err = service
        .settle(settlement_request("tx-3001", Some(500)))
        .expect_err("no rules yet");
    assert!(matches!(err, CommissionError::NoApplicableRule { .. }));
    assert!(repository
        .settlement(&TransactionId("tx-3001".to_string()))
        .expect("ledger readable")
        .is_none());
}
