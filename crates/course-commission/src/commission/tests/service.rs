use super::common::*;
use chrono::Duration;

use crate::commission::domain::{DetailUpdate, HeaderStatus, HeaderUpdate, ScopeKind};
use crate::commission::error::{CommissionError, ConflictReason};
use crate::commission::listing::{DetailQuery, DetailSort, HeaderQuery, HeaderSort};
use crate::commission::CourseId;

#[test]
fn walkthrough_scenarios_resolve_expected_rates() {
    let (service, _, _, h1) = seeded_service();

    let general = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("general rule applies");
    assert_eq!(
        (general.rate.platform_rate(), general.rate.instructor_rate()),
        (30, 70)
    );

    service
        .create_detail(h1, for_category(CATEGORY_Y, 25, 1))
        .expect("category detail created");
    let category = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("category rule applies");
    assert_eq!(
        (category.rate.platform_rate(), category.rate.instructor_rate()),
        (25, 75)
    );

    service
        .create_detail(h1, for_course(COURSE_X, 20, 5))
        .expect("course detail created");
    let course = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("course rule applies");
    assert_eq!(
        (course.rate.platform_rate(), course.rate.instructor_rate()),
        (20, 80)
    );

    let expired = service
        .update_header(
            h1,
            HeaderUpdate {
                end_date: Some(Some(yesterday())),
                ..HeaderUpdate::default()
            },
        )
        .expect("end date moved into the past");
    assert_eq!(expired.status, HeaderStatus::Expired);
    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, now()),
        Err(CommissionError::NoApplicableRule { .. })
    ));
}

#[test]
fn out_of_range_rates_are_rejected() {
    let (service, _, _, h1) = seeded_service();
    for platform_rate in [0, 100, -3, 250] {
        match service.create_detail(h1, for_course(COURSE_X, platform_rate, 9)) {
            Err(CommissionError::Validation { field, .. }) => assert_eq!(field, "platform_rate"),
            other => panic!("expected validation error for {platform_rate}, got {other:?}"),
        }
    }
    assert_eq!(
        service.get_header(h1).expect("header").details.len(),
        1,
        "rejected details must not be stored"
    );
}

#[test]
fn course_scope_wins_regardless_of_priority() {
    let (service, _, _, h1) = seeded_service();
    service
        .create_detail(h1, for_category(CATEGORY_Y, 25, 1_000))
        .expect("category detail");
    let course = service
        .create_detail(h1, for_course(COURSE_X, 12, -1_000))
        .expect("course detail");

    let resolution = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("resolves");
    assert_eq!(resolution.detail_id, course.id);
    assert_eq!(resolution.scope.kind(), ScopeKind::Course);
}

#[test]
fn higher_priority_wins_within_a_scope() {
    let (service, _, _, _) = seeded_service();
    let promo = service.create_header(header("Promo")).expect("header");
    let preferred = service
        .create_detail(promo.id, general(18, 2))
        .expect("detail");

    let resolution = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("resolves");
    assert_eq!(resolution.detail_id, preferred.id);
    assert_eq!(resolution.header_id, promo.id);
}

#[test]
fn ended_headers_stop_contributing() {
    let (service, _, clock) = build_service();
    let seasonal = service
        .create_header(windowed_header(
            "Summer",
            None,
            Some(now() + Duration::hours(1)),
        ))
        .expect("header");
    service
        .create_detail(seasonal.id, general(40, 0))
        .expect("detail");

    assert!(service.resolve(COURSE_X, CATEGORY_Y, now()).is_ok());

    clock.advance(Duration::hours(2));
    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, service.now()),
        Err(CommissionError::NoApplicableRule { .. })
    ));
    // The resolution instant is explicit, so the window is still honoured for earlier sales.
    assert!(service.resolve(COURSE_X, CATEGORY_Y, now()).is_ok());
}

#[test]
fn scheduled_headers_apply_only_once_started() {
    let (service, _, _) = build_service();
    let start = now() + Duration::days(2);
    let launch = service
        .create_header(windowed_header("Launch", Some(start), None))
        .expect("header");
    assert_eq!(launch.status, HeaderStatus::Scheduled);
    service
        .create_detail(launch.id, for_course(COURSE_X, 10, 0))
        .expect("detail on scheduled header");

    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, now()),
        Err(CommissionError::NoApplicableRule { .. })
    ));
    let later = service
        .resolve(COURSE_X, CATEGORY_Y, start)
        .expect("resolves once started");
    assert_eq!(later.rate.platform_rate(), 10);
}

#[test]
fn creating_then_deleting_unused_detail_leaves_resolution_unchanged() {
    let (service, _, _, h1) = seeded_service();
    let before = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("resolves");

    let temporary = service
        .create_detail(h1, for_course(COURSE_X, 5, 0))
        .expect("detail");
    service.delete_detail(temporary.id).expect("deleted");

    let after = service
        .resolve(COURSE_X, CATEGORY_Y, now())
        .expect("resolves");
    assert_eq!(after.detail_id, before.detail_id);
    assert_eq!(after.rate, before.rate);
}

#[test]
fn duplicate_scope_and_priority_in_overlapping_windows_is_rejected() {
    let (service, _, _, h1) = seeded_service();
    match service.create_detail(h1, general(35, 1)) {
        Err(CommissionError::Validation { field, .. }) => assert_eq!(field, "priority"),
        other => panic!("expected priority clash, got {other:?}"),
    }

    let rival = service.create_header(header("Rival")).expect("header");
    assert!(matches!(
        service.create_detail(rival.id, general(35, 1)),
        Err(CommissionError::Validation {
            field: "priority",
            ..
        })
    ));
}

#[test]
fn duplicate_priority_allowed_when_windows_do_not_meet() {
    let (service, _, _) = build_service();
    let spring = service
        .create_header(windowed_header(
            "Spring",
            None,
            Some(now() + Duration::days(10)),
        ))
        .expect("header");
    let autumn = service
        .create_header(windowed_header(
            "Autumn",
            Some(now() + Duration::days(11)),
            None,
        ))
        .expect("header");

    service
        .create_detail(spring.id, general(30, 1))
        .expect("spring detail");
    service
        .create_detail(autumn.id, general(28, 1))
        .expect("autumn detail does not clash");

    // A paused header does not count either.
    let paused = service.create_header(header("Paused")).expect("header");
    service
        .set_status(paused.id, HeaderStatus::Inactive, None)
        .expect("paused");
    service
        .create_detail(paused.id, general(50, 1))
        .expect("inactive header detail");

    // Re-activating it would make the rules tie.
    match service.set_status(paused.id, HeaderStatus::Active, None) {
        Err(CommissionError::Validation { field, .. }) => assert_eq!(field, "priority"),
        other => panic!("expected priority clash, got {other:?}"),
    }
}

#[test]
fn detail_scope_must_name_at_most_one_target() {
    let (service, _, _, h1) = seeded_service();
    let mut input = for_course(COURSE_X, 20, 3);
    input.category_id = Some(CATEGORY_Y);

    match service.create_detail(h1, input) {
        Err(CommissionError::Validation { field, .. }) => assert_eq!(field, "scope"),
        other => panic!("expected scope validation, got {other:?}"),
    }
}

#[test]
fn header_validation_covers_name_and_window() {
    let (service, _, _) = build_service();

    assert!(matches!(
        service.create_header(header("   ")),
        Err(CommissionError::Validation { field: "name", .. })
    ));
    assert!(matches!(
        service.create_header(windowed_header(
            "Backwards",
            Some(now() + Duration::days(3)),
            Some(now() + Duration::days(1)),
        )),
        Err(CommissionError::Validation {
            field: "end_date",
            ..
        })
    ));
    assert!(matches!(
        service.create_header(windowed_header("Late", None, Some(yesterday()))),
        Err(CommissionError::Validation {
            field: "end_date",
            ..
        })
    ));
}

#[test]
fn expired_headers_reject_writes() {
    let (service, _, clock) = build_service();
    let short = service
        .create_header(windowed_header(
            "Flash sale",
            None,
            Some(now() + Duration::minutes(30)),
        ))
        .expect("header");
    let detail = service
        .create_detail(short.id, general(45, 0))
        .expect("detail");

    clock.advance(Duration::hours(1));

    let expected = ConflictReason::HeaderExpired {
        header_id: short.id,
    };
    match service.create_detail(short.id, for_course(COURSE_X, 10, 0)) {
        Err(CommissionError::Conflict(reason)) => assert_eq!(reason, expected),
        other => panic!("expected conflict, got {other:?}"),
    }
    match service.update_header(
        short.id,
        HeaderUpdate {
            end_date: Some(None),
            ..HeaderUpdate::default()
        },
    ) {
        Err(CommissionError::Conflict(reason)) => assert_eq!(reason, expected),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(matches!(
        service.update_detail(
            detail.id,
            DetailUpdate {
                priority: Some(4),
                ..DetailUpdate::default()
            }
        ),
        Err(CommissionError::Conflict(ConflictReason::HeaderExpired { .. }))
    ));
    assert!(matches!(
        service.set_status(short.id, HeaderStatus::Inactive, None),
        Err(CommissionError::Conflict(_))
    ));

    // Unused details may still be cleaned up.
    service
        .delete_detail(detail.id)
        .expect("unused detail removed");
}

#[test]
fn stale_expected_version_is_a_conflict() {
    let (service, _, _, h1) = seeded_service();
    let current = service.get_header(h1).expect("header");

    let renamed = service
        .update_header(
            h1,
            HeaderUpdate {
                name: Some("Default split".to_string()),
                expected_version: Some(current.version),
                ..HeaderUpdate::default()
            },
        )
        .expect("version matches");
    assert_eq!(renamed.version, current.version + 1);

    match service.update_header(
        h1,
        HeaderUpdate {
            description: Some(Some("late edit".to_string())),
            expected_version: Some(current.version),
            ..HeaderUpdate::default()
        },
    ) {
        Err(CommissionError::Conflict(ConflictReason::StaleVersion {
            expected, actual, ..
        })) => {
            assert_eq!(expected, current.version);
            assert_eq!(actual, renamed.version);
        }
        other => panic!("expected stale version, got {other:?}"),
    }
}

#[test]
fn update_header_clears_nullable_fields() {
    let (service, _, _) = build_service();
    let header = service
        .create_header(windowed_header(
            "Holiday",
            None,
            Some(now() + Duration::days(5)),
        ))
        .expect("header");
    assert!(header.description.is_some());

    let updated = service
        .update_header(
            header.id,
            HeaderUpdate {
                description: Some(None),
                end_date: Some(None),
                ..HeaderUpdate::default()
            },
        )
        .expect("updated");
    assert!(updated.description.is_none());
    assert!(updated.end_date.is_none());
    assert_eq!(updated.status, HeaderStatus::Active);
}

#[test]
fn operator_toggle_switches_resolution_on_and_off() {
    let (service, _, _, h1) = seeded_service();

    let paused = service
        .set_status(h1, HeaderStatus::Inactive, None)
        .expect("paused");
    assert_eq!(paused.status, HeaderStatus::Inactive);
    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, now()),
        Err(CommissionError::NoApplicableRule { .. })
    ));

    let resumed = service
        .set_status(h1, HeaderStatus::Active, Some(paused.version))
        .expect("resumed");
    assert_eq!(resumed.status, HeaderStatus::Active);
    assert!(service.resolve(COURSE_X, CATEGORY_Y, now()).is_ok());

    let unchanged = service
        .set_status(h1, HeaderStatus::Active, None)
        .expect("no-op toggle");
    assert_eq!(unchanged.version, resumed.version);
}

#[test]
fn paused_header_stays_paused_across_date_edits_and_sweeps() {
    let (service, _, clock, h1) = seeded_service();
    service
        .set_status(h1, HeaderStatus::Inactive, None)
        .expect("paused");

    let moved = service
        .update_header(
            h1,
            HeaderUpdate {
                start_date: Some(Some(now() + Duration::days(1))),
                ..HeaderUpdate::default()
            },
        )
        .expect("start pushed back");
    assert_eq!(moved.status, HeaderStatus::Scheduled);
    assert!(moved.paused);

    clock.advance(Duration::days(2));
    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, service.now()),
        Err(CommissionError::NoApplicableRule { .. })
    ));

    let report = service.sweep().expect("sweep");
    assert_eq!(report.activated, vec![h1]);
    let swept = service.get_header(h1).expect("header");
    assert_eq!(swept.status, HeaderStatus::Inactive);
    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, service.now()),
        Err(CommissionError::NoApplicableRule { .. })
    ));

    service
        .set_status(h1, HeaderStatus::Active, None)
        .expect("resumed");
    assert!(service.resolve(COURSE_X, CATEGORY_Y, service.now()).is_ok());
}

#[test]
fn derived_statuses_cannot_be_set_or_toggled() {
    let (service, _, _, h1) = seeded_service();
    assert!(matches!(
        service.set_status(h1, HeaderStatus::Expired, None),
        Err(CommissionError::Validation {
            field: "status",
            ..
        })
    ));

    let upcoming = service
        .create_header(windowed_header(
            "Upcoming",
            Some(now() + Duration::days(1)),
            None,
        ))
        .expect("header");
    match service.set_status(upcoming.id, HeaderStatus::Inactive, None) {
        Err(CommissionError::Conflict(ConflictReason::StatusNotToggleable { status, .. })) => {
            assert_eq!(status, HeaderStatus::Scheduled)
        }
        other => panic!("expected not toggleable, got {other:?}"),
    }
}

#[test]
fn default_status_applies_to_open_headers_only() {
    let (service, _, _) = build_service();
    let service = service.with_default_status(HeaderStatus::Inactive);

    let open = service.create_header(header("Draft")).expect("header");
    assert_eq!(open.status, HeaderStatus::Inactive);

    let future = service
        .create_header(windowed_header(
            "Future",
            Some(now() + Duration::days(1)),
            None,
        ))
        .expect("header");
    assert_eq!(future.status, HeaderStatus::Scheduled);
}

#[test]
fn deleting_header_removes_its_details() {
    let (service, _, _, h1) = seeded_service();
    let removed = service.delete_header(h1).expect("deleted");
    assert_eq!(removed.details.len(), 1);

    assert!(matches!(
        service.get_header(h1),
        Err(CommissionError::HeaderNotFound(id)) if id == h1
    ));
    let details = service
        .list_details(&DetailQuery::default())
        .expect("listing");
    assert_eq!(details.total, 0);
}

#[test]
fn missing_records_surface_not_found() {
    let (service, _, _, _) = seeded_service();
    assert!(matches!(
        service.delete_header(crate::commission::HeaderId(404)),
        Err(CommissionError::HeaderNotFound(_))
    ));
    assert!(matches!(
        service.delete_detail(crate::commission::DetailId(404)),
        Err(CommissionError::DetailNotFound(_))
    ));
    assert!(matches!(
        service.create_detail(crate::commission::HeaderId(404), general(30, 0)),
        Err(CommissionError::HeaderNotFound(_))
    ));
}

#[test]
fn listings_filter_sort_and_paginate() {
    let (service, _, clock, h1) = seeded_service();
    clock.advance(Duration::minutes(1));
    let second = service.create_header(header("Alpha")).expect("header");
    clock.advance(Duration::minutes(1));
    let third = service
        .create_header(windowed_header(
            "Zeta",
            Some(service.now() + Duration::days(3)),
            None,
        ))
        .expect("header");

    let newest = service
        .list_headers(&HeaderQuery::default())
        .expect("listing");
    let ids: Vec<_> = newest.items.iter().map(|view| view.id).collect();
    assert_eq!(ids, vec![third.id, second.id, h1]);

    let by_name = service
        .list_headers(&HeaderQuery {
            sort: HeaderSort::Name,
            ..HeaderQuery::default()
        })
        .expect("listing");
    let names: Vec<_> = by_name.items.iter().map(|view| view.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "H1", "Zeta"]);

    let scheduled = service
        .list_headers(&HeaderQuery {
            status: Some(HeaderStatus::Scheduled),
            ..HeaderQuery::default()
        })
        .expect("listing");
    assert_eq!(scheduled.total, 1);
    assert_eq!(scheduled.items[0].id, third.id);

    for priority in 2..=6 {
        service
            .create_detail(second.id, for_course(CourseId(900 + priority as u64), 20, priority))
            .expect("detail");
    }
    let courses = service
        .list_details(&DetailQuery {
            scope: Some(ScopeKind::Course),
            sort: DetailSort::PriorityAsc,
            page: Some(2),
            per_page: Some(2),
            ..DetailQuery::default()
        })
        .expect("listing");
    assert_eq!(courses.total, 5);
    assert_eq!(courses.total_pages, 3);
    let priorities: Vec<_> = courses.items.iter().map(|view| view.priority).collect();
    assert_eq!(priorities, vec![4, 5]);

    let under_h1 = service
        .list_details(&DetailQuery {
            header_id: Some(h1),
            ..DetailQuery::default()
        })
        .expect("listing");
    assert_eq!(under_h1.total, 1);
    assert_eq!(under_h1.items[0].scope, ScopeKind::General);
}

#[test]
fn sweep_persists_transitions_once() {
    let (service, _, clock) = build_service();
    let launch = service
        .create_header(windowed_header(
            "Launch",
            Some(now() + Duration::hours(1)),
            Some(now() + Duration::days(1)),
        ))
        .expect("header");

    assert!(service.sweep().expect("sweep").is_empty());

    clock.advance(Duration::hours(2));
    let report = service.sweep().expect("sweep");
    assert_eq!(report.activated, vec![launch.id]);
    assert!(report.revision.is_some());
    assert_eq!(
        service.get_header(launch.id).expect("header").status,
        HeaderStatus::Active
    );

    let repeat = service.sweep().expect("sweep");
    assert!(repeat.is_empty());
    assert!(repeat.revision.is_none());

    clock.advance(Duration::days(2));
    let report = service.sweep().expect("sweep");
    assert_eq!(report.expired, vec![launch.id]);
    assert_eq!(
        service.get_header(launch.id).expect("header").status,
        HeaderStatus::Expired
    );
}

#[test]
fn stats_count_headers_and_details() {
    let (service, _, _, h1) = seeded_service();
    service
        .create_detail(h1, for_category(CATEGORY_Y, 25, 1))
        .expect("detail");
    let paused = service
        .create_detail(
            h1,
            crate::commission::NewDetail {
                is_active: false,
                ..for_course(COURSE_X, 20, 5)
            },
        )
        .expect("detail");
    service
        .create_header(windowed_header(
            "Upcoming",
            Some(now() + Duration::days(1)),
            None,
        ))
        .expect("header");

    let stats = service.stats().expect("stats");
    assert_eq!(stats.total_headers, 2);
    assert_eq!(stats.active_headers, 1);
    assert_eq!(stats.scheduled_headers, 1);
    assert_eq!(stats.total_details, 3);
    assert_eq!(stats.active_details, 2);
    assert_eq!(stats.inactive_details, 1);
    assert_eq!(stats.course_details, 1);
    assert_eq!(stats.category_details, 1);
    assert_eq!(stats.general_details, 1);

    let snapshot = service.snapshot().expect("snapshot");
    assert!(!snapshot.detail(paused.id).expect("stored").is_active);
}

#[test]
fn unavailable_repository_surfaces_repository_errors() {
    let service = crate::commission::CommissionService::new(
        std::sync::Arc::new(UnavailableRepository),
        std::sync::Arc::new(crate::commission::FixedClock::new(now())),
    );
    let err = service
        .create_header(header("Offline"))
        .expect_err("store offline");
    assert_eq!(err.code(), "repository_unavailable");
    assert!(matches!(
        service.resolve(COURSE_X, CATEGORY_Y, now()),
        Err(CommissionError::Repository(_))
    ));
}
