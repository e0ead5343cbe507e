use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{HeaderStatus, ScopeKind};
use super::snapshot::ConfigurationSnapshot;

/// Dashboard counters derived from one configuration snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionStats {
    pub revision: u64,
    pub total_headers: usize,
    pub active_headers: usize,
    pub inactive_headers: usize,
    pub scheduled_headers: usize,
    pub expired_headers: usize,
    pub total_details: usize,
    pub active_details: usize,
    pub inactive_details: usize,
    pub course_details: usize,
    pub category_details: usize,
    pub general_details: usize,
}

/// Count headers by the status effective at `at`, and details by flag and scope.
pub fn aggregate(snapshot: &ConfigurationSnapshot, at: DateTime<Utc>) -> CommissionStats {
    let mut stats = CommissionStats {
        revision: snapshot.revision,
        ..CommissionStats::default()
    };

    for header in snapshot.headers() {
        stats.total_headers += 1;
        match header.effective_status(at) {
            HeaderStatus::Active => stats.active_headers += 1,
            HeaderStatus::Inactive => stats.inactive_headers += 1,
            HeaderStatus::Scheduled => stats.scheduled_headers += 1,
            HeaderStatus::Expired => stats.expired_headers += 1,
        }
    }

    for detail in snapshot.details() {
        stats.total_details += 1;
        if detail.is_active {
            stats.active_details += 1;
        } else {
            stats.inactive_details += 1;
        }
        match detail.scope.kind() {
            ScopeKind::Course => stats.course_details += 1,
            ScopeKind::Category => stats.category_details += 1,
            ScopeKind::General => stats.general_details += 1,
        }
    }

    stats
}

#[derive(Debug, Clone, Copy)]
struct CachedStats {
    computed_at: DateTime<Utc>,
    stats: CommissionStats,
}

/// Memoizes the latest stats for a bounded window; a new revision invalidates immediately.
#[derive(Debug)]
pub struct StatsCache {
    window: Duration,
    entry: Mutex<Option<CachedStats>>,
}

impl StatsCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entry: Mutex::new(None),
        }
    }

    pub fn get_or_compute(
        &self,
        snapshot: &ConfigurationSnapshot,
        now: DateTime<Utc>,
    ) -> CommissionStats {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = *entry {
            let fresh = now >= cached.computed_at && now - cached.computed_at < self.window;
            if fresh && cached.stats.revision == snapshot.revision {
                return cached.stats;
            }
        }

        let stats = aggregate(snapshot, now);
        *entry = Some(CachedStats {
            computed_at: now,
            stats,
        });
        stats
    }
}
