use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::commission::clock::FixedClock;
use crate::commission::domain::{CategoryId, CourseId, HeaderId, NewDetail, NewHeader};
use crate::commission::repository::{
    CommissionRepository, InMemoryCommissionRepository, PendingChange, RepositoryError,
};
use crate::commission::settlement::Settlement;
use crate::commission::snapshot::ConfigurationSnapshot;
use crate::commission::stats::StatsCache;
use crate::commission::{commission_router, CommissionService, DetailId, TransactionId};

pub(super) const COURSE_X: CourseId = CourseId(101);
pub(super) const CATEGORY_Y: CategoryId = CategoryId(7);

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn build_service() -> (
    CommissionService<InMemoryCommissionRepository>,
    Arc<InMemoryCommissionRepository>,
    FixedClock,
) {
    let repository = Arc::new(InMemoryCommissionRepository::new());
    let clock = FixedClock::new(now());
    let service = CommissionService::new(repository.clone(), Arc::new(clock.clone()));
    (service, repository, clock)
}

pub(super) fn header(name: &str) -> NewHeader {
    NewHeader {
        name: name.to_string(),
        ..NewHeader::default()
    }
}

pub(super) fn windowed_header(
    name: &str,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
) -> NewHeader {
    NewHeader {
        name: name.to_string(),
        description: Some(format!("{name} window")),
        start_date,
        end_date,
    }
}

pub(super) fn general(platform_rate: i32, priority: i32) -> NewDetail {
    NewDetail {
        course_id: None,
        category_id: None,
        platform_rate,
        priority,
        is_active: true,
    }
}

pub(super) fn for_category(category_id: CategoryId, platform_rate: i32, priority: i32) -> NewDetail {
    NewDetail {
        category_id: Some(category_id),
        ..general(platform_rate, priority)
    }
}

pub(super) fn for_course(course_id: CourseId, platform_rate: i32, priority: i32) -> NewDetail {
    NewDetail {
        course_id: Some(course_id),
        ..general(platform_rate, priority)
    }
}

/// Header H1 with the general (30,70) rule from the first walkthrough scenario.
pub(super) fn seeded_service() -> (
    CommissionService<InMemoryCommissionRepository>,
    Arc<InMemoryCommissionRepository>,
    FixedClock,
    HeaderId,
) {
    let (service, repository, clock) = build_service();
    let h1 = service.create_header(header("H1")).expect("header created");
    service
        .create_detail(h1.id, general(30, 1))
        .expect("detail created");
    (service, repository, clock, h1.id)
}

pub(super) fn yesterday() -> DateTime<Utc> {
    now() - Duration::days(1)
}

pub(super) fn commission_router_with_service(
    service: CommissionService<InMemoryCommissionRepository>,
) -> axum::Router {
    commission_router(
        Arc::new(service),
        Arc::new(StatsCache::new(Duration::seconds(30))),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_conflict_response(response: &Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

/// Repository whose backing store is offline.
pub(super) struct UnavailableRepository;

impl CommissionRepository for UnavailableRepository {
    fn current(&self) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn at_revision(
        &self,
        _revision: u64,
    ) -> Result<Option<Arc<ConfigurationSnapshot>>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn as_of(&self, _instant: DateTime<Utc>) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _change: PendingChange) -> Result<Arc<ConfigurationSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_settlement(&self, _settlement: Settlement) -> Result<Settlement, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn settlement(&self, _id: &TransactionId) -> Result<Option<Settlement>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn is_detail_used(&self, _id: DetailId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
