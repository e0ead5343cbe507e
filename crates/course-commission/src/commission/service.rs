use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::domain::{
    CategoryId, CommissionDetail, CommissionHeader, CourseId, DetailId, DetailScope,
    DetailUpdate, DetailView, HeaderId, HeaderStatus, HeaderUpdate, HeaderView, NewDetail,
    NewHeader,
};
use super::error::{CommissionError, ConflictReason};
use super::guard;
use super::listing::{self, DetailQuery, HeaderQuery, Page};
use super::rate::RatePair;
use super::repository::{CommissionRepository, PendingChange};
use super::resolution::{self, Resolution, ResolutionContext};
use super::settlement::{Settlement, SettlementRequest};
use super::snapshot::ConfigurationSnapshot;
use super::stats::{self, CommissionStats};

/// Header transitions persisted by a status sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub activated: Vec<HeaderId>,
    pub expired: Vec<HeaderId>,
    /// Revision committed by the sweep, `None` when nothing changed.
    pub revision: Option<u64>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty() && self.expired.is_empty()
    }
}

/// Validation gate in front of the repository plus the read-side entry points.
pub struct CommissionService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    default_status: HeaderStatus,
}

impl<R> CommissionService<R>
where
    R: CommissionRepository + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            default_status: HeaderStatus::Active,
        }
    }

    /// Status given to new headers whose window is already open.
    pub fn with_default_status(mut self, status: HeaderStatus) -> Self {
        if status.is_operator_controlled() {
            self.default_status = status;
        } else {
            warn!(
                status = status.label(),
                "ignoring non-operator default header status"
            );
        }
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> Result<Arc<ConfigurationSnapshot>, CommissionError> {
        Ok(self.repository.current()?)
    }

    pub fn create_header(&self, input: NewHeader) -> Result<CommissionHeader, CommissionError> {
        let name = guard::normalize_name(&input.name)?;
        guard::validate_window(input.start_date, input.end_date)?;
        let default_status = self.default_status;

        let header = self.write("create_header", |snapshot, now| {
            if input.end_date.is_some_and(|end| end < now) {
                return Err(CommissionError::validation(
                    "end_date",
                    "must not be in the past",
                ));
            }

            let scheduled = input.start_date.is_some_and(|start| start > now);
            let mut header = CommissionHeader {
                id: snapshot.next_header_id(),
                name,
                description: guard::normalize_description(input.description),
                status: HeaderStatus::Active,
                paused: !scheduled && default_status == HeaderStatus::Inactive,
                start_date: input.start_date,
                end_date: input.end_date,
                details: Vec::new(),
                version: 1,
                created_at: now,
                updated_at: now,
            };
            header.status = header.effective_status(now);
            snapshot.insert_header(header.clone());
            Ok(header)
        })?;

        info!(header_id = %header.id, status = header.status.label(), "commission header created");
        Ok(header)
    }

    pub fn update_header(
        &self,
        header_id: HeaderId,
        update: HeaderUpdate,
    ) -> Result<CommissionHeader, CommissionError> {
        let name = update
            .name
            .as_deref()
            .map(guard::normalize_name)
            .transpose()?;

        let header = self.write("update_header", |snapshot, now| {
            let header = writable_header(snapshot, header_id, now)?;
            check_version(header, update.expected_version)?;

            if let Some(name) = name {
                header.name = name;
            }
            if let Some(description) = update.description {
                header.description = guard::normalize_description(description);
            }
            if let Some(start_date) = update.start_date {
                header.start_date = start_date;
            }
            if let Some(end_date) = update.end_date {
                header.end_date = end_date;
            }
            guard::validate_window(header.start_date, header.end_date)?;

            header.status = header.effective_status(now);
            header.version += 1;
            header.updated_at = now;
            Ok(header.clone())
        })?;

        info!(
            header_id = %header.id,
            status = header.status.label(),
            version = header.version,
            "commission header updated"
        );
        Ok(header)
    }

    /// Operator ACTIVE/INACTIVE toggle. SCHEDULED and EXPIRED are never set by hand.
    pub fn set_status(
        &self,
        header_id: HeaderId,
        status: HeaderStatus,
        expected_version: Option<u64>,
    ) -> Result<CommissionHeader, CommissionError> {
        if !status.is_operator_controlled() {
            return Err(CommissionError::validation(
                "status",
                format!("{} is derived from the header dates", status.label()),
            ));
        }

        let header = self.write("set_status", |snapshot, now| {
            let header = writable_header(snapshot, header_id, now)?;
            check_version(header, expected_version)?;

            let current = header.effective_status(now);
            if !current.is_operator_controlled() {
                return Err(CommissionError::Conflict(
                    ConflictReason::StatusNotToggleable {
                        header_id,
                        status: current,
                    },
                ));
            }

            if current != status {
                header.paused = status == HeaderStatus::Inactive;
                header.status = status;
                header.version += 1;
                header.updated_at = now;
            }
            Ok(header.clone())
        })?;

        info!(header_id = %header.id, status = status.label(), "commission header status set");
        Ok(header)
    }

    pub fn delete_header(&self, header_id: HeaderId) -> Result<CommissionHeader, CommissionError> {
        let removed = self.write("delete_header", |snapshot, _| {
            snapshot
                .remove_header(header_id)
                .ok_or(CommissionError::HeaderNotFound(header_id))
        })?;

        info!(
            header_id = %removed.id,
            details = removed.details.len(),
            "commission header deleted"
        );
        Ok(removed)
    }

    pub fn get_header(&self, header_id: HeaderId) -> Result<CommissionHeader, CommissionError> {
        let snapshot = self.repository.current()?;
        snapshot
            .header(header_id)
            .cloned()
            .ok_or(CommissionError::HeaderNotFound(header_id))
    }

    pub fn create_detail(
        &self,
        header_id: HeaderId,
        input: NewDetail,
    ) -> Result<CommissionDetail, CommissionError> {
        let scope = DetailScope::from_ids(input.course_id, input.category_id)?;
        let rate = RatePair::new(input.platform_rate)?;

        let detail = self.write("create_detail", |snapshot, now| {
            writable_header(snapshot, header_id, now)?;

            let detail = CommissionDetail {
                id: snapshot.next_detail_id(),
                header_id,
                scope,
                rate,
                priority: input.priority,
                is_active: input.is_active,
                created_at: now,
                updated_at: now,
            };
            snapshot.push_detail(detail.clone());
            touch_header(snapshot, header_id, now);
            Ok(detail)
        })?;

        info!(
            detail_id = %detail.id,
            header_id = %header_id,
            scope = ?detail.scope.kind(),
            rate = %detail.rate,
            priority = detail.priority,
            "commission detail created"
        );
        Ok(detail)
    }

    pub fn update_detail(
        &self,
        detail_id: DetailId,
        update: DetailUpdate,
    ) -> Result<CommissionDetail, CommissionError> {
        let rate = update.platform_rate.map(RatePair::new).transpose()?;

        let detail = self.write("update_detail", |snapshot, now| {
            let header_id = snapshot
                .owner_of(detail_id)
                .ok_or(CommissionError::DetailNotFound(detail_id))?;
            writable_header(snapshot, header_id, now)?;

            let detail = snapshot
                .detail_mut(detail_id)
                .ok_or(CommissionError::DetailNotFound(detail_id))?;
            if let Some(rate) = rate {
                detail.rate = rate;
            }
            if let Some(priority) = update.priority {
                detail.priority = priority;
            }
            if let Some(is_active) = update.is_active {
                detail.is_active = is_active;
            }
            detail.updated_at = now;
            let updated = detail.clone();

            touch_header(snapshot, header_id, now);
            Ok(updated)
        })?;

        info!(
            detail_id = %detail.id,
            rate = %detail.rate,
            priority = detail.priority,
            is_active = detail.is_active,
            "commission detail updated"
        );
        Ok(detail)
    }

    pub fn delete_detail(&self, detail_id: DetailId) -> Result<CommissionDetail, CommissionError> {
        let removed = self.write("delete_detail", |snapshot, now| {
            let removed = snapshot
                .remove_detail(detail_id)
                .ok_or(CommissionError::DetailNotFound(detail_id))?;
            touch_header(snapshot, removed.header_id, now);
            Ok(removed)
        })?;

        info!(detail_id = %removed.id, header_id = %removed.header_id, "commission detail deleted");
        Ok(removed)
    }

    pub fn list_headers(&self, query: &HeaderQuery) -> Result<Page<HeaderView>, CommissionError> {
        let snapshot = self.repository.current()?;
        Ok(listing::list_headers(&snapshot, query, self.clock.now()))
    }

    pub fn list_details(&self, query: &DetailQuery) -> Result<Page<DetailView>, CommissionError> {
        let snapshot = self.repository.current()?;
        Ok(listing::list_details(&snapshot, query))
    }

    /// Resolve against the current configuration.
    pub fn resolve(
        &self,
        course_id: CourseId,
        category_id: CategoryId,
        at: DateTime<Utc>,
    ) -> Result<Resolution, CommissionError> {
        let snapshot = self.repository.current()?;
        resolve_logged(&snapshot, course_id, category_id, at)
    }

    /// Resolve against the configuration that was current at `as_of`, for payout audits.
    pub fn resolve_as_of(
        &self,
        course_id: CourseId,
        category_id: CategoryId,
        at: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<Resolution, CommissionError> {
        let snapshot = self.repository.as_of(as_of)?;
        debug!(revision = snapshot.revision, %as_of, "historical resolution");
        resolve_logged(&snapshot, course_id, category_id, at)
    }

    /// Billing entry point: resolve once, record the outcome, and pin the winning detail.
    pub fn settle(&self, request: SettlementRequest) -> Result<Settlement, CommissionError> {
        if let Some(existing) = self.repository.settlement(&request.transaction_id)? {
            debug!(transaction_id = %request.transaction_id, "settlement replayed");
            return Ok(existing);
        }

        let snapshot = self.repository.current()?;
        let resolution = resolve_logged(
            &snapshot,
            request.course_id,
            request.category_id,
            request.purchased_at,
        )?;

        let settlement = Settlement {
            transaction_id: request.transaction_id,
            resolution,
            split: request.amount.map(|amount| resolution.rate.split(amount)),
            purchased_at: request.purchased_at,
            settled_at: self.clock.now(),
        };
        let stored = self.repository.record_settlement(settlement)?;

        info!(
            transaction_id = %stored.transaction_id,
            detail_id = %stored.resolution.detail_id,
            rate = %stored.resolution.rate,
            revision = stored.resolution.revision,
            "transaction settled"
        );
        Ok(stored)
    }

    pub fn stats(&self) -> Result<CommissionStats, CommissionError> {
        let snapshot = self.repository.current()?;
        Ok(stats::aggregate(&snapshot, self.clock.now()))
    }

    /// Persist time-derived status transitions. Running it twice in a row commits once at most.
    pub fn sweep(&self) -> Result<SweepReport, CommissionError> {
        let now = self.clock.now();
        let current = self.repository.current()?;
        let pending = current
            .headers()
            .any(|header| header.effective_status(now) != header.status);
        if !pending {
            return Ok(SweepReport::default());
        }

        let report = self.write("sweep", |snapshot, now| {
            let mut report = SweepReport::default();
            for header in snapshot.headers_mut() {
                let derived = header.effective_status(now);
                if derived == header.status {
                    continue;
                }
                match derived {
                    HeaderStatus::Expired => report.expired.push(header.id),
                    HeaderStatus::Active | HeaderStatus::Inactive => {
                        report.activated.push(header.id)
                    }
                    HeaderStatus::Scheduled => {}
                }
                header.status = derived;
                header.version += 1;
                header.updated_at = now;
            }
            Ok(report)
        });

        let mut report = report?;
        report.revision = Some(self.repository.current()?.revision);
        info!(
            activated = report.activated.len(),
            expired = report.expired.len(),
            "header status sweep applied"
        );
        Ok(report)
    }

    fn write<T>(
        &self,
        action: &'static str,
        mutate: impl FnOnce(&mut ConfigurationSnapshot, DateTime<Utc>) -> Result<T, CommissionError>,
    ) -> Result<T, CommissionError> {
        let now = self.clock.now();
        let current = self.repository.current()?;
        let mut next = ConfigurationSnapshot::clone(&current);

        let value = mutate(&mut next, now)?;
        guard::ensure_unambiguous(&next)?;

        let committed = self
            .repository
            .commit(PendingChange {
                base_revision: current.revision,
                snapshot: next,
                recorded_at: now,
            })
            .map_err(|err| {
                warn!(action, error = %err, "configuration write rejected");
                CommissionError::from(err)
            })?;

        debug!(action, revision = committed.revision, "configuration committed");
        Ok(value)
    }
}

fn resolve_logged(
    snapshot: &ConfigurationSnapshot,
    course_id: CourseId,
    category_id: CategoryId,
    at: DateTime<Utc>,
) -> Result<Resolution, CommissionError> {
    let context = ResolutionContext {
        course_id,
        category_id,
        at,
    };
    match resolution::resolve(snapshot, &context) {
        Ok(resolution) => {
            debug!(
                %course_id,
                %category_id,
                detail_id = %resolution.detail_id,
                rate = %resolution.rate,
                "commission resolved"
            );
            Ok(resolution)
        }
        Err(err) => {
            // Both cases mean the configuration has a hole or a tie operators must fix.
            error!(%course_id, %category_id, %at, revision = snapshot.revision, error = %err, "commission resolution failed");
            Err(err)
        }
    }
}

fn writable_header(
    snapshot: &mut ConfigurationSnapshot,
    header_id: HeaderId,
    now: DateTime<Utc>,
) -> Result<&mut CommissionHeader, CommissionError> {
    let header = snapshot
        .header_mut(header_id)
        .ok_or(CommissionError::HeaderNotFound(header_id))?;
    if header.is_expired_at(now) {
        return Err(CommissionError::Conflict(ConflictReason::HeaderExpired {
            header_id,
        }));
    }
    Ok(header)
}

fn check_version(header: &CommissionHeader, expected: Option<u64>) -> Result<(), CommissionError> {
    match expected {
        Some(expected) if expected != header.version => Err(CommissionError::Conflict(
            ConflictReason::StaleVersion {
                header_id: header.id,
                expected,
                actual: header.version,
            },
        )),
        _ => Ok(()),
    }
}

fn touch_header(snapshot: &mut ConfigurationSnapshot, header_id: HeaderId, now: DateTime<Utc>) {
    if let Some(header) = snapshot.header_mut(header_id) {
        header.version += 1;
        header.updated_at = now;
    }
}
